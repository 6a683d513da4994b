//! Benchmarks for low-level DSP primitives.

mod bandlimited;
mod decimator;
mod envelope;
mod wavetable;

pub use bandlimited::bench_bandlimited;
pub use decimator::bench_decimator;
pub use envelope::bench_envelope;
pub use wavetable::bench_wavetable;

//! Whole-engine benchmarks.
//!
//! These render through `Synth::process` with a realistic number of held
//! voices, one group per render path.

mod synth;

pub use synth::bench_synth;

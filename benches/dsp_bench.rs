//! Benchmarks for the table builders, per-sample primitives and the engine.
//!
//! Run with: cargo bench
//!
//! Reference timing at 48kHz sample rate:
//!   - 64 samples  = 1.33ms deadline
//!   - 128 samples = 2.67ms deadline
//!   - 256 samples = 5.33ms deadline
//!   - 512 samples = 10.67ms deadline
//!
//! Benchmark groups:
//!   - dsp/*        Table synthesis, mipmaps, envelope, decimator
//!   - scenarios/*  Full engine renders across quality / oversampling modes

use criterion::{criterion_group, criterion_main};

mod dsp;
mod scenarios;

/// Common buffer sizes used in audio applications.
pub const BLOCK_SIZES: &[usize] = &[64, 128, 256, 512];

criterion_group!(
    benches,
    // Table builders and primitives
    dsp::bench_wavetable,
    dsp::bench_bandlimited,
    dsp::bench_envelope,
    dsp::bench_decimator,
    // Whole engine
    scenarios::bench_synth,
);
criterion_main!(benches);

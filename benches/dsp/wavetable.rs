//! Benchmarks for raw waveform synthesis and the full bank build.

use std::hint::black_box;

use criterion::Criterion;
use chiptone_dsp::dsp::wavetable::{synthesize, TableLength, ToneMask, WaveformTableBank};

pub fn bench_wavetable(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/wavetable");

    group.bench_function("synthesize_all_partials", |b| {
        b.iter(|| synthesize(black_box(ToneMask::ALL), true, black_box(TableLength::L256)))
    });

    // 90 tables, done once per engine
    group.bench_function("bank_build", |b| b.iter(WaveformTableBank::build));

    group.finish();
}

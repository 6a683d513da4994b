//! Benchmarks for the mipmap builder and per-sample table selection.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use chiptone_dsp::dsp::{
    bandlimited::{apply_lowpass_with_taper, BandlimitedSet, Normalization},
    wavetable::{TableLength, ToneMask, WaveformTableBank},
};

pub fn bench_bandlimited(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/bandlimited");
    let bank = WaveformTableBank::build();
    let base = bank.get(ToneMask::ALL, true, TableLength::L128);

    // Rebuild cost on a quality change
    for quality in [1usize, 4, 8] {
        group.bench_with_input(BenchmarkId::new("build", quality), &quality, |b, &q| {
            b.iter(|| BandlimitedSet::build(black_box(base), q, Normalization::MatchRms))
        });
    }

    group.bench_function("pre_high_cut", |b| {
        b.iter(|| apply_lowpass_with_taper(black_box(base), 166, 12, Normalization::MatchRms))
    });

    // Called once per voice per sample on the bandlimited path
    let set = BandlimitedSet::build(base, 8, Normalization::MatchRms);
    group.bench_function("choose", |b| {
        let mut f0 = 30.0f32;
        b.iter(|| {
            f0 = if f0 > 12_000.0 { 30.0 } else { f0 * 1.01 };
            set.choose(black_box(f0), 48_000.0)
        })
    });

    group.finish();
}

//! Benchmarks for the full render loop.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use chiptone_dsp::{HqMode, PreHighCutMode, Synth, SynthParams};

use crate::BLOCK_SIZES;

const CHORD: [u8; 8] = [36, 48, 55, 60, 64, 67, 72, 79];

fn playing(params: SynthParams) -> Synth {
    let mut synth = Synth::new(48_000.0);
    synth.set_params(params);
    synth.set_vibrato_depth_semis(0.2);
    for note in CHORD {
        synth.note_on(note, 100);
    }
    synth
}

pub fn bench_synth(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/synth");
    let base = SynthParams::default()
        .with_tone_mask(15)
        .with_adsr(0.001, 0.1, 0.8, 0.5)
        .with_gain(0.2);

    let cases = [
        // stepped table read, no mipmap
        ("direct", base),
        ("bandlimited", base.with_bandlimit_quality(4)),
        (
            "bandlimited_auto2x",
            base.with_bandlimit_quality(4)
                .with_hq_mode(HqMode::Auto2x)
                .with_pre_high_cut(PreHighCutMode::ByMaxNote, 84),
        ),
        ("force8x", base.with_bandlimit_quality(8).with_hq_mode(HqMode::Force8x)),
    ];

    for &size in BLOCK_SIZES {
        let mut left = vec![0.0f32; size];
        let mut right = vec![0.0f32; size];

        for (name, params) in cases {
            let mut synth = playing(params);
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter(|| {
                    synth.process(black_box(&mut left), black_box(&mut right));
                })
            });
        }

        // noise adds one PRNG draw per frame
        let mut noisy = playing(base);
        noisy.set_noise_add(0.5);
        group.bench_with_input(BenchmarkId::new("direct_noise", size), &size, |b, _| {
            b.iter(|| {
                noisy.process(black_box(&mut left), black_box(&mut right));
            })
        });
    }

    group.finish();
}

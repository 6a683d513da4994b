//! Benchmarks for the oversampling FIR decimator.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use chiptone_dsp::dsp::decimator::Decimator;

use crate::BLOCK_SIZES;

pub fn bench_decimator(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/decimator");

    for &size in BLOCK_SIZES {
        for ratio in [2usize, 4, 8] {
            let mut decimator = Decimator::new();
            decimator.configure(ratio);
            let mut buffer = vec![0.0f32; size];
            let id = BenchmarkId::new(format!("{ratio}x"), size);
            group.bench_with_input(id, &size, |b, _| {
                b.iter(|| {
                    for (n, out) in buffer.iter_mut().enumerate() {
                        for k in 0..ratio {
                            decimator.push(if (n + k) % 7 < 3 { 0.5 } else { -0.5 });
                        }
                        *out = decimator.output();
                    }
                    black_box(&buffer);
                })
            });
        }
    }

    group.finish();
}

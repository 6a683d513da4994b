use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::{dsp::wavetable::WaveformTable, TABLE_SIZE};

/*
Bandlimited Mipmaps
===================

A stepped table played back at a high pitch aliases: its harmonics land
above Nyquist and fold back as inharmonic noise. The cure is to keep several
copies of the table with progressively fewer harmonics and pick the one that
fits under Nyquist for the note being played.

Vocabulary
----------

  harmonic cutoff   Highest multiple of the fundamental kept in a copy.
                    A 512-sample table holds harmonics 1..256.

  bands per octave  How densely cutoffs are spaced. 1 gives 2,4,8,...,256;
                    8 gives a cutoff every ~9% in harmonic number.

  taper             Raised-cosine ramp over the last few bins below the
                    cutoff. A brick wall rings (Gibbs) and makes crossfades
                    between neighbours audibly "zip"; the ramp smooths both.

  harmonic limit    (sample_rate / 2) / f0. How many harmonics fit under
                    Nyquist at the current pitch.


Building a Copy
---------------

    table --FFT--> X[k]
    for k in 1..=N/2:
        k > H            X[k] = X[N-k] = 0
        H-6 <= k <= H    X[k], X[N-k] *= 0.5 * (1 + cos(pi * t))
    X --IFFT / N--> table'
    table' *= base_rms / rms(table')      (or: clamp peak to 1)

Conjugate bins are scaled together so the result stays real.


Choosing Tables at Playback
---------------------------

    limit = (sr / 2) / f0

    limit <= cutoffs[0]     -> (0, 0, 0)
    limit >= cutoffs[last]  -> (last, last, 0)
    otherwise               -> bracketing pair (lo, hi), with
                               t = (limit - c_lo) / (c_hi - c_lo)
                               mix = 3t^2 - 2t^3

Output is (1 - mix) * table[lo] + mix * table[hi]. Rising pitch lowers the
limit, so the chosen indices move towards the dull end of the set.

All of this is O(N log N) per copy and only runs on configuration change.
*/

/// Highest harmonic a 512-sample table can carry.
pub const MAX_HARMONIC: usize = TABLE_SIZE / 2;
/// Lowest cutoff in any mipmap.
pub const MIN_HARMONIC: usize = 2;
/// Taper width used for mipmap levels.
pub const MIPMAP_TAPER_BINS: usize = 6;

/// How a truncated table is brought back to level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    /// Scale to the RMS energy of the source table.
    MatchRms,
    /// Only scale down, and only if the peak exceeds 1.
    ClampPeak,
}

/// Ascending, de-duplicated cutoffs from 2 up to exactly 256.
pub fn harmonic_cutoffs(bands_per_octave: usize) -> Vec<usize> {
    let bands = bands_per_octave.clamp(1, 8);
    let step = 2.0_f32.powf(1.0 / bands as f32);

    let mut cutoffs = vec![MIN_HARMONIC];
    let mut current = MIN_HARMONIC as f32;
    while current < MAX_HARMONIC as f32 {
        current *= step;
        let cutoff = (current.round() as usize).clamp(MIN_HARMONIC, MAX_HARMONIC);
        if cutoffs.last() != Some(&cutoff) {
            cutoffs.push(cutoff);
        }
        if cutoff >= MAX_HARMONIC {
            break;
        }
    }
    if cutoffs.last() != Some(&MAX_HARMONIC) {
        cutoffs.push(MAX_HARMONIC);
    }
    cutoffs
}

/// Raised cosine falling from 1 at t=0 to 0 at t=1.
#[inline]
fn raised_cosine(t: f32) -> f32 {
    0.5 * (1.0 + (PI * t).cos())
}

/// Spectrum of one table, kept around so several cutoffs can be cut from it.
pub struct HarmonicSpectrum {
    bins: Vec<Complex<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    base_rms: f32,
}

impl HarmonicSpectrum {
    pub fn analyze(base: &WaveformTable) -> Self {
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(TABLE_SIZE);
        let inverse = planner.plan_fft_inverse(TABLE_SIZE);

        let mut bins: Vec<Complex<f32>> = base
            .samples()
            .iter()
            .map(|&v| Complex::new(v, 0.0))
            .collect();
        forward.process(&mut bins);

        Self {
            bins,
            inverse,
            base_rms: base.rms(),
        }
    }

    pub fn base_rms(&self) -> f32 {
        self.base_rms
    }

    /// Magnitude of harmonic `k` (bin k of the forward transform).
    pub fn magnitude(&self, harmonic: usize) -> f32 {
        self.bins[harmonic % TABLE_SIZE].norm()
    }

    /// Zero every harmonic above `cutoff`, taper the `taper_bins` below it,
    /// and transform back.
    pub fn truncate(
        &self,
        cutoff: usize,
        taper_bins: usize,
        normalization: Normalization,
    ) -> WaveformTable {
        let nyquist = TABLE_SIZE / 2;
        let cutoff = cutoff.clamp(1, nyquist);
        let mut bins = self.bins.clone();

        // cutoff == nyquist keeps everything
        if cutoff < nyquist {
            let taper_start = cutoff.saturating_sub(taper_bins).max(1);
            let span = (cutoff - taper_start).max(1) as f32;
            for k in 1..=nyquist {
                let weight = if k > cutoff {
                    0.0
                } else if k >= taper_start {
                    raised_cosine((k - taper_start) as f32 / span)
                } else {
                    continue;
                };
                bins[k] *= weight;
                if k != nyquist {
                    bins[TABLE_SIZE - k] *= weight;
                }
            }
        }

        self.inverse.process(&mut bins);

        let scale = 1.0 / TABLE_SIZE as f32;
        let mut samples = [0.0f32; TABLE_SIZE];
        for (sample, bin) in samples.iter_mut().zip(&bins) {
            *sample = bin.re * scale;
        }

        let mut table = WaveformTable::from_samples(samples);
        normalize(&mut table, normalization, self.base_rms);
        table
    }
}

fn normalize(table: &mut WaveformTable, normalization: Normalization, target_rms: f32) {
    let gain = match normalization {
        Normalization::MatchRms => {
            let rms = table.rms();
            if rms > 1e-12 {
                target_rms / rms
            } else {
                1.0
            }
        }
        Normalization::ClampPeak => {
            let peak = table.peak();
            if peak > 1.0 {
                1.0 / peak
            } else {
                1.0
            }
        }
    };
    if gain != 1.0 {
        let mut samples = *table.samples();
        for v in samples.iter_mut() {
            *v *= gain;
        }
        *table = WaveformTable::from_samples(samples);
    }
}

/// Single spectral low-pass of `base`, used for the pre-filtered table.
pub fn apply_lowpass_with_taper(
    base: &WaveformTable,
    cutoff: usize,
    taper_bins: usize,
    normalization: Normalization,
) -> WaveformTable {
    HarmonicSpectrum::analyze(base).truncate(cutoff, taper_bins, normalization)
}

/// Tables picked for one voice at one pitch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableChoice {
    pub lower: usize,
    pub upper: usize,
    /// Weight of `upper`, 0..1.
    pub mix: f32,
}

impl TableChoice {
    fn single(index: usize) -> Self {
        Self {
            lower: index,
            upper: index,
            mix: 0.0,
        }
    }
}

/// Harmonic-truncated copies of one base table, dullest first.
pub struct BandlimitedSet {
    cutoffs: Vec<usize>,
    tables: Vec<WaveformTable>,
    base_rms: f32,
}

impl BandlimitedSet {
    pub fn build(
        base: &WaveformTable,
        bands_per_octave: usize,
        normalization: Normalization,
    ) -> Self {
        let cutoffs = harmonic_cutoffs(bands_per_octave);
        let spectrum = HarmonicSpectrum::analyze(base);
        let tables = cutoffs
            .iter()
            .map(|&cutoff| spectrum.truncate(cutoff, MIPMAP_TAPER_BINS, normalization))
            .collect();

        Self {
            cutoffs,
            tables,
            base_rms: spectrum.base_rms(),
        }
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn cutoffs(&self) -> &[usize] {
        &self.cutoffs
    }

    pub fn cutoff(&self, index: usize) -> usize {
        self.cutoffs[index]
    }

    pub fn table(&self, index: usize) -> &WaveformTable {
        &self.tables[index]
    }

    pub fn base_rms(&self) -> f32 {
        self.base_rms
    }

    /// Pick the two tables bracketing the harmonic limit at `f0`.
    pub fn choose(&self, f0: f32, sample_rate: f32) -> TableChoice {
        let last = self.cutoffs.len() - 1;
        let lowest = self.cutoffs[0] as f32;
        let highest = self.cutoffs[last] as f32;

        let limit = if f0 > 0.0 {
            (sample_rate * 0.5) / f0
        } else {
            highest
        };

        if limit <= lowest {
            return TableChoice::single(0);
        }
        if limit >= highest {
            return TableChoice::single(last);
        }

        // first cutoff >= limit; lowest < limit < highest keeps this in 1..=last
        let upper = self
            .cutoffs
            .partition_point(|&cutoff| (cutoff as f32) < limit);
        let lower = upper - 1;

        let c_lo = self.cutoffs[lower] as f32;
        let c_hi = self.cutoffs[upper] as f32;
        let t = ((limit - c_lo) / (c_hi - c_lo)).clamp(0.0, 1.0);

        TableChoice {
            lower,
            upper,
            mix: t * t * (3.0 - 2.0 * t),
        }
    }
}

use std::f32::consts::TAU;

/*
FIR Decimator
=============

An oversampled voice produces `os` sub-samples per output sample. Before
keeping one of them we low-pass the stream so content above the output
Nyquist does not fold back.

    sub-samples ──push──→ [ circular delay line ] ──taps──→ output (once per frame)

Filter design (Hamming-windowed sinc, linear phase):

    os   taps   cutoff (cycles per oversampled sample)
    --   ----   ------------------------------------
     2    17    0.45 / 2
     4    25    0.45 / 4
     8    33    0.45 / 8

    h[n] = w[n] * 2fc * sinc(2π fc (n - M/2)),  w[n] = 0.54 - 0.46 cos(2π n / M)

Coefficients are scaled so they sum to 1 (unity DC gain). The delay line is a
fixed 128-slot ring, so nothing allocates when the ratio changes.
*/

const RING: usize = 128;

pub struct Decimator {
    ratio: usize,
    taps: usize,
    write: usize,
    delay: [f32; RING],
    coeffs: [f32; RING],
}

impl Decimator {
    pub fn new() -> Self {
        Self {
            ratio: 1,
            taps: 0,
            write: 0,
            delay: [0.0; RING],
            coeffs: [0.0; RING],
        }
    }

    pub fn ratio(&self) -> usize {
        self.ratio
    }

    pub fn taps(&self) -> usize {
        self.taps
    }

    pub fn coefficients(&self) -> &[f32] {
        &self.coeffs[..self.taps]
    }

    /// Select the oversampling ratio. Same ratio is a no-op; anything else
    /// rebuilds the taps and clears the delay line.
    pub fn configure(&mut self, ratio: usize) {
        let ratio = ratio.clamp(1, 8);
        if ratio == self.ratio && self.taps > 0 {
            return;
        }
        self.ratio = ratio;
        self.reset();

        self.taps = match ratio {
            2 => 17,
            4 => 25,
            8 => 33,
            _ => 1,
        };
        design_lowpass(self.taps, 0.45 / ratio as f32, &mut self.coeffs);
    }

    pub fn reset(&mut self) {
        self.write = 0;
        self.delay.fill(0.0);
    }

    #[inline]
    pub fn push(&mut self, sample: f32) {
        self.write = (self.write + 1) & (RING - 1);
        self.delay[self.write] = sample;
    }

    /// Filtered value at the newest sample.
    #[inline]
    pub fn output(&self) -> f32 {
        if self.taps == 0 {
            return self.delay[self.write];
        }
        let mut acc = 0.0;
        let mut read = self.write;
        for &h in &self.coeffs[..self.taps] {
            acc += h * self.delay[read];
            read = (read + RING - 1) & (RING - 1);
        }
        acc
    }
}

impl Default for Decimator {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn sinc(x: f32) -> f32 {
    if x.abs() < 1e-6 {
        1.0
    } else {
        x.sin() / x
    }
}

/// Hamming-windowed sinc low-pass with unity DC gain.
fn design_lowpass(taps: usize, cutoff: f32, out: &mut [f32; RING]) {
    out.fill(0.0);
    if taps <= 1 {
        out[0] = 1.0;
        return;
    }
    let order = (taps - 1) as f32;
    let mid = (taps - 1) / 2;

    let mut sum = 0.0;
    for (n, h) in out.iter_mut().take(taps).enumerate() {
        let window = 0.54 - 0.46 * (TAU * n as f32 / order).cos();
        let x = TAU * cutoff * (n as f32 - mid as f32);
        *h = window * 2.0 * cutoff * sinc(x);
        sum += *h;
    }
    if sum.abs() > 1e-9 {
        for h in out.iter_mut().take(taps) {
            *h /= sum;
        }
    }
}

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::TABLE_SIZE;

/*
Stepped Waveform Tables
=======================

The tone generator we emulate does not produce sines or saws. Each voice
sums up to four square-ish "partials", every one of them a staircase whose
steps follow a saturating tanh curve. Which partials sound is chosen by a
4-bit tone mask.

Vocabulary
----------

  partial     One gated step-function. Partial n flips sign every
              1/2^(n+1) of the period: half, quarter, eighth, sixteenth.

  tone mask   Bits 0..3 enable partials 1..4. Values 1..15 are legal; the
              empty mask is clamped to 1.

  grid        The effective table length a voice addresses the table at
              (64, 128 or 256 samples per period). Stored tables are always
              512 samples long; a coarser grid reads every 8th/4th/2nd sample.

  quantized   Optional 4-bit output: every sample snapped to one of the 15
              symmetric levels k/7, k = -7..7.


Partial Layout (512 samples)
----------------------------

    partial  weight  segment  sign pattern
    -------  ------  -------  -----------------------
       1      1.00     256    + -
       2      0.60     128    - + - +
       4      0.50      64    - + - + - + - +
       8      0.45      32    - + - + ... (16 blocks)

Inside every segment the amplitude walks down a tanh curve sampled at
x = x_offset + dx * (pos / group). The grid decides the step width:

    grid  x_offset   group  dx
    ----  --------   -----  ------
     64   -0.375       4    0.25
    128   -0.4375      2    0.125
    256   -0.46875     1    0.0625

so the same staircase shape survives whichever grid the voice reads.

The summed waveform is peak-normalized to [-1, 1]. All 15 masks x 2
quantization states x 3 grids are built once when the bank is created and
never touched again.
*/

/// Which of the four partial generators are summed into a table.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ToneMask(u8);

impl ToneMask {
    pub const ALL: ToneMask = ToneMask(15);

    /// Clamp any integer into the legal mask range 1..=15.
    pub fn new(mask: i32) -> Self {
        Self(mask.clamp(1, 15) as u8)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    /// True if partial `index` (0..4) is enabled.
    #[inline]
    pub fn has(self, index: usize) -> bool {
        self.0 & (1 << index) != 0
    }
}

impl Default for ToneMask {
    fn default() -> Self {
        Self(1)
    }
}

/// Effective playback grid of a table.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TableLength {
    L64,
    #[default]
    L128,
    L256,
}

impl TableLength {
    pub const ALL: [TableLength; 3] = [TableLength::L64, TableLength::L128, TableLength::L256];

    /// Snap an arbitrary length to the nearest supported grid at or above it.
    pub fn from_len(len: usize) -> Self {
        if len <= 64 {
            TableLength::L64
        } else if len <= 128 {
            TableLength::L128
        } else {
            TableLength::L256
        }
    }

    pub fn len(self) -> usize {
        match self {
            TableLength::L64 => 64,
            TableLength::L128 => 128,
            TableLength::L256 => 256,
        }
    }

    /// Distance between stored samples when reading at this grid.
    #[inline]
    pub fn stride(self) -> usize {
        TABLE_SIZE / self.len()
    }

    fn slot(self) -> usize {
        match self {
            TableLength::L64 => 0,
            TableLength::L128 => 1,
            TableLength::L256 => 2,
        }
    }

    /// (x_offset, group) of the step curve sampling for this grid.
    fn step_grid(self) -> (f32, usize) {
        match self {
            TableLength::L64 => (-0.375, 4),
            TableLength::L128 => (-0.4375, 2),
            TableLength::L256 => (-0.46875, 1),
        }
    }
}

/// One period of a waveform, 512 samples, immutable once built.
#[derive(Clone, PartialEq)]
pub struct WaveformTable {
    samples: [f32; TABLE_SIZE],
}

impl WaveformTable {
    pub fn from_samples(samples: [f32; TABLE_SIZE]) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[f32; TABLE_SIZE] {
        &self.samples
    }

    /// Direct lookup, wrapping the index into the table.
    #[inline]
    pub fn at(&self, index: usize) -> f32 {
        self.samples[index & (TABLE_SIZE - 1)]
    }

    pub fn rms(&self) -> f32 {
        let energy: f64 = self.samples.iter().map(|&v| v as f64 * v as f64).sum();
        (energy / TABLE_SIZE as f64).sqrt() as f32
    }

    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, &v| acc.max(v.abs()))
    }
}

impl std::fmt::Debug for WaveformTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaveformTable")
            .field("rms", &self.rms())
            .field("peak", &self.peak())
            .finish()
    }
}

struct Partial {
    segment: usize,
    weight: f32,
    // sign of the first block; blocks alternate from there
    leading_sign: f32,
}

const PARTIALS: [Partial; 4] = [
    Partial { segment: TABLE_SIZE / 2, weight: 1.0, leading_sign: 1.0 },
    Partial { segment: TABLE_SIZE / 4, weight: 0.6, leading_sign: -1.0 },
    Partial { segment: TABLE_SIZE / 8, weight: 0.5, leading_sign: -1.0 },
    Partial { segment: TABLE_SIZE / 16, weight: 0.45, leading_sign: -1.0 },
];

impl Partial {
    #[inline]
    fn sample(&self, k: usize, x_offset: f32, group: usize, dx: f32) -> f32 {
        let pos = k % self.segment;
        let x = x_offset + dx * (pos / group) as f32;
        let sign = if (k / self.segment) % 2 == 0 {
            self.leading_sign
        } else {
            -self.leading_sign
        };
        sign * step_curve(x) * self.weight
    }
}

/// Saturating step curve, ~200 at x=0 falling towards 0 near x=15.
fn step_curve(x: f32) -> f32 {
    const A: f32 = 3.0;
    const B: f32 = 6.4 / 15.0;
    ((0.5 * (A - B * x)).tanh() / (0.5 * A).tanh() + 1.0) * 100.0
}

/// Snap to the nearest of the 15 levels k/7.
#[inline]
pub fn quantize_4bit(v: f32) -> f32 {
    ((v * 7.0).round() / 7.0).clamp(-1.0, 1.0)
}

/// Build one table for `mask` addressed at `length`.
pub fn synthesize(mask: ToneMask, quantized: bool, length: TableLength) -> WaveformTable {
    let (x_offset, group) = length.step_grid();
    let dx = (16 * group) as f32 / (TABLE_SIZE / 2) as f32;

    let mut samples = [0.0f32; TABLE_SIZE];
    for (k, sample) in samples.iter_mut().enumerate() {
        *sample = PARTIALS
            .iter()
            .enumerate()
            .filter(|(bit, _)| mask.has(*bit))
            .map(|(_, partial)| partial.sample(k, x_offset, group, dx))
            .sum();
    }

    let peak = samples.iter().fold(0.0f32, |acc, &v| acc.max(v.abs()));
    if peak > 0.0 {
        for v in samples.iter_mut() {
            *v /= peak;
        }
    }

    if quantized {
        for v in samples.iter_mut() {
            *v = quantize_4bit(*v);
        }
    }

    WaveformTable::from_samples(samples)
}

/// Every raw table the engine can play, built once.
pub struct WaveformTableBank {
    tables: Vec<WaveformTable>,
}

impl WaveformTableBank {
    const MASKS: usize = 15;

    pub fn build() -> Self {
        let mut tables = Vec::with_capacity(TableLength::ALL.len() * 2 * Self::MASKS);
        for length in TableLength::ALL {
            for quantized in [false, true] {
                for bits in 1..=Self::MASKS as i32 {
                    tables.push(synthesize(ToneMask::new(bits), quantized, length));
                }
            }
        }
        Self { tables }
    }

    #[inline]
    fn slot(mask: ToneMask, quantized: bool, length: TableLength) -> usize {
        (length.slot() * 2 + quantized as usize) * Self::MASKS + (mask.bits() as usize - 1)
    }

    pub fn get(&self, mask: ToneMask, quantized: bool, length: TableLength) -> &WaveformTable {
        &self.tables[Self::slot(mask, quantized, length)]
    }
}

impl Default for WaveformTableBank {
    fn default() -> Self {
        Self::build()
    }
}

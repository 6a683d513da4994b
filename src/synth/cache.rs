use tracing::debug;

use crate::{
    dsp::{
        bandlimited::{apply_lowpass_with_taper, BandlimitedSet, Normalization, MAX_HARMONIC},
        wavetable::{TableLength, ToneMask, WaveformTable, WaveformTableBank},
    },
    midi_note_to_freq,
    synth::params::{PreHighCutMode, SynthParams},
};

/*
Derived Table Cache
===================

Three layers sit between the parameters and what a voice reads:

    raw table          picked from the bank by (mask, quantize, length)
        │
    effective table    raw, or raw through a spectral low-pass (pre-high-cut)
        │
    bandlimited set    mipmap of the effective table (quality > 0 only)

Every layer is a pure function of a small key. `set_params` builds a new
`CacheKey`, diffs it against the previous one, and rebuilds only the layers
whose inputs moved. Rebuilt layers replace the old ones wholesale.

    raw key changed        -> effective + bandlimited
    pre-cut changed        -> effective + bandlimited
    quality changed        -> bandlimited

The pre-cut is stored resolved (cutoff + taper), not as the mode, so
anything that moves the resolved cutoff (max note, vibrato depth, sample
rate) invalidates it through the same comparison.
*/

/// Headroom on top of the vibrato excursion when estimating the highest pitch.
pub const VIBRATO_GUARD_MARGIN: f32 = 1.05;

/// Worst-case pitch multiplier reached by vibrato of `depth_semis`.
#[inline]
pub fn vibrato_guard(depth_semis: f32) -> f32 {
    (depth_semis / 12.0).exp2() * VIBRATO_GUARD_MARGIN
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawKey {
    pub mask: ToneMask,
    pub quantized: bool,
    pub length: TableLength,
}

impl Default for RawKey {
    fn default() -> Self {
        Self {
            mask: ToneMask::default(),
            quantized: true,
            length: TableLength::default(),
        }
    }
}

/// Resolved pre-high-cut filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreCut {
    Off,
    Lowpass { cutoff: usize, taper: usize },
}

impl PreCut {
    pub fn resolve(
        mode: PreHighCutMode,
        max_note: u8,
        vibrato_depth_semis: f32,
        sample_rate: f32,
    ) -> Self {
        let nyquist = MAX_HARMONIC as f32;
        match mode {
            PreHighCutMode::Off => PreCut::Off,
            PreHighCutMode::Fixed => PreCut::Lowpass {
                cutoff: (0.65 * nyquist).round() as usize,
                taper: 12,
            },
            PreHighCutMode::ByMaxNote => {
                let f0_max = midi_note_to_freq(max_note.min(127));
                let guard = vibrato_guard(vibrato_depth_semis);
                let allowed = if f0_max > 0.0 {
                    (sample_rate * 0.5) / (f0_max * guard)
                } else {
                    nyquist
                };
                let cutoff = allowed.clamp(1.0, nyquist).floor() as usize;
                // narrow cuts get a gentler ramp
                let taper = if cutoff < 16 { 8 } else { 12 };
                PreCut::Lowpass { cutoff, taper }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheKey {
    pub raw: RawKey,
    pub pre_cut: PreCut,
    pub quality: usize,
}

impl CacheKey {
    pub fn new(params: &SynthParams, vibrato_depth_semis: f32, sample_rate: f32) -> Self {
        Self {
            raw: RawKey {
                mask: params.tone_mask,
                quantized: params.quantize,
                length: params.table_length,
            },
            pre_cut: PreCut::resolve(
                params.pre_high_cut,
                params.max_note,
                vibrato_depth_semis,
                sample_rate,
            ),
            quality: params.bandlimit_quality.min(8),
        }
    }
}

/// Which cache layers must be rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RebuildPlan {
    pub raw: bool,
    pub effective: bool,
    pub bandlimited: bool,
}

impl RebuildPlan {
    pub fn diff(previous: Option<&CacheKey>, next: &CacheKey) -> Self {
        let Some(previous) = previous else {
            return Self {
                raw: true,
                effective: true,
                bandlimited: true,
            };
        };
        let raw = previous.raw != next.raw;
        let effective = raw || previous.pre_cut != next.pre_cut;
        let bandlimited = effective || previous.quality != next.quality;
        Self {
            raw,
            effective,
            bandlimited,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.raw || self.effective || self.bandlimited)
    }
}

/// Effective table source: the bank's raw table or an owned filtered copy.
pub enum EffectiveTable {
    Raw,
    PreFiltered(WaveformTable),
}

pub struct TableCache {
    key: Option<CacheKey>,
    raw: RawKey,
    effective: EffectiveTable,
    bandlimited: Option<BandlimitedSet>,
}

impl TableCache {
    pub fn new() -> Self {
        Self {
            key: None,
            raw: RawKey::default(),
            effective: EffectiveTable::Raw,
            bandlimited: None,
        }
    }

    /// Forget everything; the next `update` rebuilds every layer.
    pub fn invalidate(&mut self) {
        self.key = None;
        self.effective = EffectiveTable::Raw;
        self.bandlimited = None;
    }

    pub fn key(&self) -> Option<&CacheKey> {
        self.key.as_ref()
    }

    pub fn update(&mut self, bank: &WaveformTableBank, next: CacheKey) -> RebuildPlan {
        let plan = RebuildPlan::diff(self.key.as_ref(), &next);
        self.raw = next.raw;

        if plan.raw {
            debug!(
                mask = next.raw.mask.bits(),
                quantized = next.raw.quantized,
                length = next.raw.length.len(),
                "selected raw table"
            );
        }

        if plan.effective {
            self.effective = match next.pre_cut {
                PreCut::Off => EffectiveTable::Raw,
                PreCut::Lowpass { cutoff, taper } => {
                    debug!(cutoff, taper, "rebuilding pre-filtered table");
                    let raw = bank.get(next.raw.mask, next.raw.quantized, next.raw.length);
                    EffectiveTable::PreFiltered(apply_lowpass_with_taper(
                        raw,
                        cutoff,
                        taper,
                        Normalization::MatchRms,
                    ))
                }
            };
        }

        if plan.bandlimited {
            self.bandlimited = if next.quality > 0 {
                let set = BandlimitedSet::build(
                    self.effective(bank),
                    next.quality,
                    Normalization::MatchRms,
                );
                debug!(quality = next.quality, bands = set.len(), "rebuilt bandlimited set");
                Some(set)
            } else {
                None
            };
        }

        self.key = Some(next);
        plan
    }

    pub fn effective<'a>(&'a self, bank: &'a WaveformTableBank) -> &'a WaveformTable {
        match &self.effective {
            EffectiveTable::Raw => bank.get(self.raw.mask, self.raw.quantized, self.raw.length),
            EffectiveTable::PreFiltered(table) => table,
        }
    }

    pub fn is_pre_filtered(&self) -> bool {
        matches!(self.effective, EffectiveTable::PreFiltered(_))
    }

    /// Mipmap of the effective table, None when bandlimiting is off.
    pub fn bandlimited(&self) -> Option<&BandlimitedSet> {
        self.bandlimited.as_ref()
    }
}

impl Default for TableCache {
    fn default() -> Self {
        Self::new()
    }
}

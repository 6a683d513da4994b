#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    dsp::{
        envelope::AdsrParams,
        wavetable::{TableLength, ToneMask},
    },
    MAX_VOICES,
};

/// Internal oversampling policy for the bandlimited render path.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HqMode {
    #[default]
    Off,
    /// 2x only when a voice is close to the top of its harmonic budget.
    Auto2x,
    Force2x,
    Force4x,
    Force8x,
}

impl HqMode {
    /// Host index 0..=4, clamped.
    pub fn from_index(index: i32) -> Self {
        match index.clamp(0, 4) {
            0 => HqMode::Off,
            1 => HqMode::Auto2x,
            2 => HqMode::Force2x,
            3 => HqMode::Force4x,
            _ => HqMode::Force8x,
        }
    }

    /// Oversampling ratio when forced, None for Off/Auto.
    pub fn forced_ratio(self) -> Option<usize> {
        match self {
            HqMode::Force2x => Some(2),
            HqMode::Force4x => Some(4),
            HqMode::Force8x => Some(8),
            HqMode::Off | HqMode::Auto2x => None,
        }
    }
}

/// Optional static low-pass applied to the raw table before anything else.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreHighCutMode {
    #[default]
    Off,
    /// Gentle cut at ~65% of the table Nyquist.
    Fixed,
    /// Cut whatever the highest expected note would alias.
    ByMaxNote,
}

impl PreHighCutMode {
    /// Host index 0..=2, clamped.
    pub fn from_index(index: i32) -> Self {
        match index.clamp(0, 2) {
            0 => PreHighCutMode::Off,
            1 => PreHighCutMode::Fixed,
            _ => PreHighCutMode::ByMaxNote,
        }
    }
}

/// Everything a host configures on the engine, except the per-sample
/// modulation (bend, detune, vibrato, noise) which lives on `Synth`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthParams {
    pub tone_mask: ToneMask,
    pub adsr: AdsrParams,
    pub gain: f32,
    /// 1..=32
    pub polyphony: usize,
    pub quantize: bool,
    pub table_length: TableLength,
    /// 0 = off, 1..=8 bands per octave
    pub bandlimit_quality: usize,
    pub hq_mode: HqMode,
    pub pre_high_cut: PreHighCutMode,
    /// 0..=127, only used by `PreHighCutMode::ByMaxNote`
    pub max_note: u8,
}

impl Default for SynthParams {
    fn default() -> Self {
        Self {
            tone_mask: ToneMask::default(),
            adsr: AdsrParams::default(),
            gain: 0.5,
            polyphony: MAX_VOICES,
            quantize: true,
            table_length: TableLength::L128,
            bandlimit_quality: 0,
            hq_mode: HqMode::Off,
            pre_high_cut: PreHighCutMode::Off,
            max_note: 64,
        }
    }
}

impl SynthParams {
    /// Clamp every field into its legal range. Never rejects.
    pub fn sanitized(self) -> Self {
        Self {
            adsr: self.adsr.sanitized(),
            gain: if self.gain.is_finite() {
                self.gain.max(0.0)
            } else {
                Self::default().gain
            },
            polyphony: self.polyphony.clamp(1, MAX_VOICES),
            bandlimit_quality: self.bandlimit_quality.min(8),
            max_note: self.max_note.min(127),
            ..self
        }
    }

    pub fn with_tone_mask(mut self, mask: i32) -> Self {
        self.tone_mask = ToneMask::new(mask);
        self
    }

    pub fn with_adsr(mut self, attack: f32, decay: f32, sustain: f32, release: f32) -> Self {
        self.adsr = AdsrParams::new(attack, decay, sustain, release);
        self
    }

    pub fn with_gain(mut self, gain: f32) -> Self {
        self.gain = gain;
        self
    }

    pub fn with_polyphony(mut self, voices: usize) -> Self {
        self.polyphony = voices;
        self
    }

    pub fn with_quantize(mut self, quantize: bool) -> Self {
        self.quantize = quantize;
        self
    }

    pub fn with_table_length(mut self, len: usize) -> Self {
        self.table_length = TableLength::from_len(len);
        self
    }

    pub fn with_bandlimit_quality(mut self, quality: usize) -> Self {
        self.bandlimit_quality = quality;
        self
    }

    pub fn with_hq_mode(mut self, mode: HqMode) -> Self {
        self.hq_mode = mode;
        self
    }

    pub fn with_pre_high_cut(mut self, mode: PreHighCutMode, max_note: u8) -> Self {
        self.pre_high_cut = mode;
        self.max_note = max_note;
        self
    }
}

/// Clamp a float into `range`, mapping NaN/inf to `fallback`.
#[inline]
pub(crate) fn clamp_finite(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitized_clamps_every_field() {
        let params = SynthParams {
            gain: -2.0,
            polyphony: 0,
            bandlimit_quality: 50,
            max_note: 200,
            adsr: AdsrParams {
                attack: -1.0,
                decay: 0.1,
                sustain: 1.5,
                release: 0.2,
            },
            ..SynthParams::default()
        }
        .sanitized();

        assert_eq!(params.gain, 0.0);
        assert_eq!(params.polyphony, 1);
        assert_eq!(params.bandlimit_quality, 8);
        assert_eq!(params.max_note, 127);
        assert_eq!(params.adsr.attack, 0.0);
        assert_eq!(params.adsr.sustain, 1.0);

        let too_many = SynthParams::default().with_polyphony(64).sanitized();
        assert_eq!(too_many.polyphony, MAX_VOICES);
    }

    #[test]
    fn mode_indices_are_clamped() {
        assert_eq!(HqMode::from_index(-1), HqMode::Off);
        assert_eq!(HqMode::from_index(1), HqMode::Auto2x);
        assert_eq!(HqMode::from_index(9), HqMode::Force8x);
        assert_eq!(HqMode::Force4x.forced_ratio(), Some(4));
        assert_eq!(HqMode::Auto2x.forced_ratio(), None);
        assert_eq!(PreHighCutMode::from_index(7), PreHighCutMode::ByMaxNote);
        assert_eq!(PreHighCutMode::from_index(1), PreHighCutMode::Fixed);
    }

    #[test]
    fn non_finite_floats_fall_back() {
        assert_eq!(clamp_finite(f32::NAN, -0.5, 0.5, 0.0), 0.0);
        assert_eq!(clamp_finite(3.0, -0.5, 0.5, 0.0), 0.5);
        let params = SynthParams::default().with_gain(f32::INFINITY).sanitized();
        assert_eq!(params.gain, 0.5);
    }
}

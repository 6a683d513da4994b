pub mod dsp; // Allocation-free signal primitives
pub mod synth; // Voice management, caches and polyphony

pub use synth::engine::Synth;
pub use synth::params::{HqMode, PreHighCutMode, SynthParams};

/// Length of every stored waveform table (the 256-grid doubled).
pub const TABLE_SIZE: usize = 512;
/// Fixed size of the voice pool.
pub const MAX_VOICES: usize = 32;
/// Fallback used whenever a host hands us a sample rate <= 1.
pub const DEFAULT_SAMPLE_RATE: f32 = 48_000.0;
/// Envelope stages shorter than this collapse to an instant transition.
pub(crate) const MIN_STAGE_TIME: f32 = 1e-5;
/// Release snaps to silence once the level falls under this.
pub(crate) const RELEASE_FLOOR: f32 = 1e-5;

/// Sanitize a host sample rate.
#[inline]
pub(crate) fn sanitize_sample_rate(sample_rate: f32) -> f32 {
    if sample_rate > 1.0 && sample_rate.is_finite() {
        sample_rate
    } else {
        DEFAULT_SAMPLE_RATE
    }
}

/// Convert MIDI note number to frequency in Hz.
/// A4 = 440 Hz = MIDI note 69
#[inline]
pub fn midi_note_to_freq(note: u8) -> f32 {
    440.0 * 2.0_f32.powf((note as f32 - 69.0) / 12.0)
}

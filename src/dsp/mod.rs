//! Low-level DSP primitives used by the synth layer.
//!
//! Everything that runs per sample here is allocation-free and realtime-safe.
//! The two exceptions are table construction (`wavetable`) and spectrum
//! truncation (`bandlimited`), which only ever run from configuration calls.

/// Harmonic-truncated table mipmaps and spectral low-pass.
pub mod bandlimited;
/// FIR decimator for internally oversampled voices.
pub mod decimator;
/// Attack/decay/sustain/release envelope generator.
pub mod envelope;
/// Sine LFO driving vibrato.
pub mod lfo;
/// Deterministic xorshift noise source.
pub mod noise;
/// Stepped waveform table synthesis.
pub mod wavetable;

pub use envelope::EnvelopeState;

//! Sine LFO used for vibrato.

use std::f32::consts::TAU;

use crate::{sanitize_sample_rate, DEFAULT_SAMPLE_RATE};

/*
Vibrato LFO
===========

A free-running sine at control rate (0..16 Hz). It is shared by every voice,
so all notes wobble in phase, and it keeps running whether or not a note is
held.

Each sample the current value sin(phase) is read first and the phase is
advanced afterwards:

    value = sin(phase)
    phase += TAU * rate / sample_rate
    if phase > TAU { phase -= TAU }

so the very first sample after a reset is exactly 0 (no pitch offset).
*/

pub struct SineLfo {
    phase: f32,
    rate_hz: f32,
    sample_rate: f32,
}

impl SineLfo {
    pub fn new(rate_hz: f32) -> Self {
        Self {
            phase: 0.0,
            rate_hz,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sanitize_sample_rate(sample_rate);
    }

    pub fn set_rate(&mut self, rate_hz: f32) {
        self.rate_hz = rate_hz;
    }

    pub fn rate(&self) -> f32 {
        self.rate_hz
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Current value, then advance one sample.
    #[inline]
    pub fn next_value(&mut self) -> f32 {
        let value = self.phase.sin();
        self.phase += TAU * self.rate_hz / self.sample_rate;
        if self.phase > TAU {
            self.phase -= TAU;
        }
        value
    }
}

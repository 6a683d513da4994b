#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{sanitize_sample_rate, DEFAULT_SAMPLE_RATE, MIN_STAGE_TIME, RELEASE_FLOOR};

/*
ADSR Envelope Implementation
============================

Per-voice amplitude state machine. One call to `next_sample` per output
sample; the returned level multiplies the oscillator.

Vocabulary
----------

  level       Current output value, 0.0 to 1.0.

  stage       Idle, Attack, Decay, Sustain or Release.

  gate        Note on/off. Gate high always (re)enters Attack. Gate low
              enters Release from any non-idle stage.

  step        Per-sample change, 1 / (stage_seconds * sample_rate). Stages
              shorter than 10us use a step of 1.0, i.e. they finish in one
              sample.


The Shape
---------

  Level
    1.0 ┐     ╱╲
        │    ╱  ╲___________
    S   │   ╱               ╲
        │  ╱                 ╲__
    0.0 └─╱─────────────────────‾‾──→ Time
        Attack Decay  Sustain  Release

Attack and decay are linear ramps:

    attack:  level += step_a                       until level >= 1
    decay:   level -= step_d * (1 - sustain)        until level <= sustain

so attack takes attack_seconds and decay takes decay_seconds regardless of
the sustain level.

Release is NOT linear. Each sample removes a fixed fraction of what is left:

    release: level -= step_r * level                until level <= 1e-5

which is a one-pole decay with time constant release_seconds. After
release_seconds the level sits at ~37% of where it started; it reaches the
1e-5 floor after roughly ln(level / 1e-5) time constants and then snaps to
0 and goes Idle.


The State Machine
-----------------

    Idle ──gate on──→ Attack ──level=1──→ Decay ──level=S──→ Sustain
     ↑                  │                   │                  │
     │                  └──────gate off─────┴──────────────────┤
     │                                                         ↓
     └────────────────────level <= 1e-5───────────────────── Release

Gate on from any stage (including Release) re-enters Attack WITHOUT
resetting the level, so a retriggered or stolen voice ramps up from where
it was instead of clicking to zero.
*/

/// Envelope times in seconds and the sustain level.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdsrParams {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl Default for AdsrParams {
    fn default() -> Self {
        Self {
            attack: 0.01,
            decay: 0.1,
            sustain: 0.7,
            release: 0.2,
        }
    }
}

impl AdsrParams {
    pub fn new(attack: f32, decay: f32, sustain: f32, release: f32) -> Self {
        Self {
            attack,
            decay,
            sustain,
            release,
        }
        .sanitized()
    }

    /// Negative times become 0, sustain is clamped to 0..1, NaN falls back to defaults.
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        let time = |t: f32, fallback: f32| if t.is_finite() { t.max(0.0) } else { fallback };
        Self {
            attack: time(self.attack, defaults.attack),
            decay: time(self.decay, defaults.decay),
            sustain: if self.sustain.is_finite() {
                self.sustain.clamp(0.0, 1.0)
            } else {
                defaults.sustain
            },
            release: time(self.release, defaults.release),
        }
    }
}

/// The current stage of the envelope state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeState {
    Idle,    // level = 0, voice can be reused
    Attack,  // ramping up to 1.0
    Decay,   // ramping down to sustain
    Sustain, // holding while the gate is high
    Release, // gate low, decaying towards 0
}

pub struct Envelope {
    params: AdsrParams,
    sample_rate: f32,

    stage: EnvelopeState,
    level: f32,
}

impl Envelope {
    pub fn new() -> Self {
        Self {
            params: AdsrParams::default(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            stage: EnvelopeState::Idle,
            level: 0.0,
        }
    }

    pub fn adsr(attack: f32, decay: f32, sustain: f32, release: f32) -> Self {
        Self {
            params: AdsrParams::new(attack, decay, sustain, release),
            ..Self::new()
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: f32) -> Self {
        self.set_sample_rate(sample_rate);
        self
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sanitize_sample_rate(sample_rate);
    }

    pub fn set_params(&mut self, params: AdsrParams) {
        self.params = params.sanitized();
    }

    pub fn params(&self) -> AdsrParams {
        self.params
    }

    /// Gate high enters Attack from wherever we are; gate low enters Release.
    pub fn gate(&mut self, on: bool) {
        if on {
            self.stage = EnvelopeState::Attack;
        } else if self.stage != EnvelopeState::Idle {
            self.stage = EnvelopeState::Release;
        }
    }

    #[inline]
    fn step(&self, seconds: f32) -> f32 {
        if seconds <= MIN_STAGE_TIME {
            1.0
        } else {
            1.0 / (seconds * self.sample_rate)
        }
    }

    /// Advance one sample and return the new level.
    pub fn next_sample(&mut self) -> f32 {
        match self.stage {
            EnvelopeState::Idle => {
                self.level = 0.0;
            }

            EnvelopeState::Attack => {
                self.level += self.step(self.params.attack);
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = EnvelopeState::Decay;
                }
            }

            EnvelopeState::Decay => {
                let target = self.params.sustain;
                self.level -= self.step(self.params.decay) * (1.0 - target);
                if self.level <= target {
                    self.level = target;
                    self.stage = EnvelopeState::Sustain;
                }
            }

            EnvelopeState::Sustain => {}

            EnvelopeState::Release => {
                self.level -= self.step(self.params.release) * self.level.max(0.0);
                if self.level <= RELEASE_FLOOR {
                    self.level = 0.0;
                    self.stage = EnvelopeState::Idle;
                }
            }
        }

        debug_assert!((0.0..=1.0).contains(&self.level));
        self.level
    }

    /// Render a block of envelope values into the buffer.
    pub fn render(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.next_sample();
        }
    }

    /// Returns true in every stage except Idle.
    pub fn is_active(&self) -> bool {
        self.stage != EnvelopeState::Idle
    }

    pub fn reset(&mut self) {
        self.stage = EnvelopeState::Idle;
        self.level = 0.0;
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn state(&self) -> EnvelopeState {
        self.stage
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new()
    }
}

use tracing::{debug, trace};

use crate::{
    dsp::{
        bandlimited::{BandlimitedSet, TableChoice},
        lfo::SineLfo, noise::XorShift32,
        wavetable::WaveformTableBank,
    },
    sanitize_sample_rate,
    synth::{
        allocator::{RoundRobin, VoiceStealer},
        cache::{vibrato_guard, CacheKey, RebuildPlan, TableCache},
        message::{MessageReceiver, SynthMessage},
        params::{clamp_finite, HqMode, SynthParams},
        voice::Voice,
    },
    DEFAULT_SAMPLE_RATE, MAX_VOICES,
};

/*
Synth
=====

Owns the table bank, the derived-table cache, a fixed pool of 32 voices and
the modulation state shared by all of them.

Threading: nothing in here locks. `process` never allocates and never
rebuilds a table; `setup` and `set_params` may do both and must be
serialized with `process` by the caller (control thread, or between
blocks).

Per sample:

    lfo    = sin(vibrato_phase)                   (then advance the phase)
    ratio  = 2^((bend + detune + depth * lfo) / 12)

    for each active voice in 0..polyphony:
        quality == 0   direct read of the effective table
        otherwise      f = f0 * ratio * guard
                       pick (lo, hi, mix) from the mipmap for f
                       oversample (forced, or Auto near the top / limit)
                       crossfaded or split-oversampled render

    s = sum * gain
    noise:  y = (s + d * |s| * u) / (1 + d),  u uniform in [-1, 1)
    left = right = y

`guard` = 2^(depth / 12) * 1.05 estimates the highest pitch vibrato can
reach, so table selection stays conservative through the whole LFO cycle.
*/

pub const DEFAULT_VIBRATO_RATE_HZ: f32 = 5.0;
/// Four octaves either way.
pub const MAX_PITCH_BEND_SEMIS: f32 = 48.0;
/// Auto2x engages when the upper table's cutoff is this close to the limit.
const AUTO_HQ_HARMONIC_MARGIN: f32 = 4.0;

pub struct Synth<S: VoiceStealer = RoundRobin> {
    sample_rate: f32,
    bank: WaveformTableBank,
    cache: TableCache,
    voices: Vec<Voice>,
    stealer: S,
    params: SynthParams,

    pitch_bend_semis: f32,
    detune_semis: f32,
    vibrato_depth_semis: f32,
    vibrato: SineLfo,
    noise_add: f32,
    rng: XorShift32,
}

impl Synth<RoundRobin> {
    pub fn new(sample_rate: f32) -> Self {
        Self::with_stealer(sample_rate, RoundRobin::new())
    }
}

impl Default for Synth<RoundRobin> {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE)
    }
}

impl<S: VoiceStealer> Synth<S> {
    pub fn with_stealer(sample_rate: f32, stealer: S) -> Self {
        let mut synth = Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            bank: WaveformTableBank::build(),
            cache: TableCache::new(),
            voices: (0..MAX_VOICES)
                .map(|_| Voice::new(DEFAULT_SAMPLE_RATE))
                .collect(),
            stealer,
            params: SynthParams::default(),
            pitch_bend_semis: 0.0,
            detune_semis: 0.0,
            vibrato_depth_semis: 0.0,
            vibrato: SineLfo::new(DEFAULT_VIBRATO_RATE_HZ),
            noise_add: 0.0,
            rng: XorShift32::from_sample_rate(DEFAULT_SAMPLE_RATE),
        };
        synth.setup(sample_rate);
        synth
    }

    /// (Re)start at `sample_rate`: silences every voice, reseeds the noise,
    /// and rebuilds the derived tables from scratch.
    pub fn setup(&mut self, sample_rate: f32) {
        self.sample_rate = sanitize_sample_rate(sample_rate);
        debug!(sample_rate = self.sample_rate, "synth setup");

        for voice in &mut self.voices {
            voice.kill();
            voice.set_sample_rate(self.sample_rate);
            voice.set_table_length(self.params.table_length);
            voice.set_adsr(self.params.adsr);
        }
        self.stealer.reset();
        self.vibrato.set_sample_rate(self.sample_rate);
        self.vibrato.reset();
        self.rng = XorShift32::from_sample_rate(self.sample_rate);

        self.cache.invalidate();
        self.refresh_tables();
    }

    fn refresh_tables(&mut self) -> RebuildPlan {
        let key = CacheKey::new(&self.params, self.vibrato_depth_semis, self.sample_rate);
        self.cache.update(&self.bank, key)
    }

    /// Apply a new configuration, rebuilding only the tables whose inputs
    /// changed. Not realtime-safe when tables are rebuilt.
    ///
    /// With `PreHighCutMode::ByMaxNote` the cut also depends on the current
    /// vibrato depth, so call this again after changing the depth.
    pub fn set_params(&mut self, params: SynthParams) {
        let params = params.sanitized();
        let previous = std::mem::replace(&mut self.params, params);

        if params.adsr != previous.adsr {
            for voice in &mut self.voices {
                voice.set_adsr(params.adsr);
            }
        }
        if params.table_length != previous.table_length {
            for voice in &mut self.voices {
                voice.set_table_length(params.table_length);
            }
        }

        let mut cut = 0;
        for voice in &mut self.voices[params.polyphony..] {
            if voice.is_active() {
                voice.kill();
                cut += 1;
            }
        }
        if cut > 0 {
            debug!(polyphony = params.polyphony, cut, "voices cut by polyphony change");
        }

        let plan = self.refresh_tables();
        if !plan.is_empty() {
            debug!(?plan, "derived tables refreshed");
        }
    }

    pub fn params(&self) -> &SynthParams {
        &self.params
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Current mipmap, if bandlimiting is on.
    pub fn bandlimited_set(&self) -> Option<&BandlimitedSet> {
        self.cache.bandlimited()
    }

    fn polyphony(&self) -> usize {
        self.params.polyphony.clamp(1, MAX_VOICES)
    }

    pub fn note_on(&mut self, note: u8, velocity: u8) {
        let note = note.min(127);
        let velocity = velocity.min(127);
        let limit = self.polyphony();

        let slot = match self.voices[..limit].iter().position(|v| !v.is_active()) {
            Some(free) => free,
            None => {
                let victim = self.stealer.pick_victim(limit).min(limit - 1);
                trace!(victim, stolen = self.voices[victim].note(), "stealing voice");
                victim
            }
        };

        trace!(slot, note, velocity, "note on");
        self.voices[slot].note_on(note, velocity);
    }

    /// Release every voice playing `note`. Unknown notes are ignored.
    pub fn note_off(&mut self, note: u8) {
        let note = note.min(127);
        for voice in self
            .voices
            .iter_mut()
            .filter(|v| v.is_active() && v.note() == note)
        {
            voice.note_off();
        }
    }

    pub fn all_notes_off(&mut self) {
        for voice in self.voices.iter_mut().filter(|v| v.is_active()) {
            voice.note_off();
        }
    }

    pub fn set_pitch_bend_semis(&mut self, semis: f32) {
        self.pitch_bend_semis =
            clamp_finite(semis, -MAX_PITCH_BEND_SEMIS, MAX_PITCH_BEND_SEMIS, 0.0);
    }

    pub fn set_detune_semis(&mut self, semis: f32) {
        self.detune_semis = clamp_finite(semis, -0.5, 0.5, 0.0);
    }

    pub fn set_vibrato_depth_semis(&mut self, semis: f32) {
        self.vibrato_depth_semis = clamp_finite(semis, 0.0, 0.5, 0.0);
    }

    pub fn set_vibrato_rate_hz(&mut self, hz: f32) {
        self.vibrato
            .set_rate(clamp_finite(hz, 0.0, 16.0, DEFAULT_VIBRATO_RATE_HZ));
    }

    /// Noise amplitude relative to |signal|, 0..100.
    pub fn set_noise_add(&mut self, ratio: f32) {
        self.noise_add = clamp_finite(ratio, 0.0, 100.0, 0.0);
    }

    pub fn handle_message(&mut self, message: SynthMessage) {
        match message {
            SynthMessage::NoteOn { note, velocity } => self.note_on(note, velocity),
            SynthMessage::NoteOff { note } => self.note_off(note),
            SynthMessage::PitchBend { semis } => self.set_pitch_bend_semis(semis),
            SynthMessage::Detune { semis } => self.set_detune_semis(semis),
            SynthMessage::VibratoDepth { semis } => self.set_vibrato_depth_semis(semis),
            SynthMessage::VibratoRate { hz } => self.set_vibrato_rate_hz(hz),
            SynthMessage::NoiseAdd { ratio } => self.set_noise_add(ratio),
            SynthMessage::AllNotesOff => self.all_notes_off(),
        }
    }

    /// Drain every pending event. Allocation-free.
    pub fn handle_messages<R: MessageReceiver>(&mut self, rx: &mut R) {
        while let Some(message) = rx.pop() {
            self.handle_message(message);
        }
    }

    pub fn active_voice_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    /// Notes of every sounding voice, in slot order.
    pub fn voice_notes(&self) -> impl Iterator<Item = u8> + '_ {
        self.voices
            .iter()
            .filter(|v| v.is_active())
            .map(|v| v.note())
    }

    /// Render `min(out_l.len(), out_r.len())` frames. Both buffers get the
    /// same mono signal.
    pub fn process(&mut self, out_l: &mut [f32], out_r: &mut [f32]) {
        let frames = out_l.len().min(out_r.len());
        let limit = self.polyphony();
        let gain = self.params.gain;
        let hq_mode = self.params.hq_mode;
        let sample_rate = self.sample_rate;
        let offset_semis = self.pitch_bend_semis + self.detune_semis;
        let depth = self.vibrato_depth_semis;
        let guard = vibrato_guard(depth);

        let noise = self.noise_add;
        // s + d|s| peaks at (1 + d) |s|
        let compensation = if noise > 0.0 { 1.0 / (1.0 + noise) } else { 1.0 };

        let table = self.cache.effective(&self.bank);
        let mipmap = if self.params.bandlimit_quality > 0 {
            self.cache.bandlimited()
        } else {
            None
        };

        for (left, right) in out_l[..frames].iter_mut().zip(out_r[..frames].iter_mut()) {
            let lfo = self.vibrato.next_value();
            let pitch_ratio = ((offset_semis + depth * lfo) / 12.0).exp2();

            let mut sum = 0.0;
            for voice in self.voices[..limit].iter_mut().filter(|v| v.is_active()) {
                sum += match mipmap {
                    None => voice.render(table, pitch_ratio),
                    Some(set) => {
                        render_bandlimited(voice, set, pitch_ratio, guard, sample_rate, hq_mode)
                    }
                };
            }

            let signal = sum * gain;
            let out = if noise > 0.0 {
                let u = self.rng.next_bipolar();
                (signal + noise * signal.abs() * u) * compensation
            } else {
                signal
            };

            *left = out;
            *right = out;
        }
    }
}

/// Internal oversampling for one voice. Auto2x engages near the top of the
/// mipmap or when the upper table's cutoff sits close to the harmonic limit.
fn oversample_ratio(
    hq_mode: HqMode,
    set: &BandlimitedSet,
    choice: &TableChoice,
    guarded_f0: f32,
    sample_rate: f32,
) -> usize {
    match hq_mode.forced_ratio() {
        Some(ratio) => ratio,
        None if hq_mode == HqMode::Auto2x => {
            let limit = (sample_rate * 0.5) / guarded_f0.max(1e-6);
            let near_top = choice.upper + 1 >= set.len() - 1;
            let near_limit =
                (set.cutoff(choice.upper) as f32 - limit).abs() < AUTO_HQ_HARMONIC_MARGIN;
            if near_top || near_limit {
                2
            } else {
                1
            }
        }
        None => 1,
    }
}

fn render_bandlimited(
    voice: &mut Voice,
    set: &BandlimitedSet,
    pitch_ratio: f32,
    guard: f32,
    sample_rate: f32,
    hq_mode: HqMode,
) -> f32 {
    let guarded_f0 = voice.base_freq() * pitch_ratio * guard;
    let choice = set.choose(guarded_f0, sample_rate);
    let a = set.table(choice.lower);
    let b = set.table(choice.upper);

    let ratio = oversample_ratio(hq_mode, set, &choice, guarded_f0, sample_rate);

    if ratio <= 1 {
        voice.render_from_two_tables(a, b, choice.mix, pitch_ratio)
    } else {
        voice.render_oversampled(a, b, choice.mix, pitch_ratio, ratio)
    }
}

use crate::{
    dsp::{
        decimator::Decimator,
        envelope::{AdsrParams, Envelope, EnvelopeState},
        wavetable::{TableLength, WaveformTable},
    },
    midi_note_to_freq, sanitize_sample_rate, DEFAULT_SAMPLE_RATE, TABLE_SIZE,
};

/*
Voice
=====

One note: a phase accumulator over the effective table length, an ADSR and
a decimator for the oversampled path. Voices never own tables; the engine
lends them the table(s) for the current sample.

  phase        0 <= phase < len, where len is the grid (64/128/256).
  increment    len * f0 / sample_rate per sample at pitch ratio 1.
  read index   floor(phase) * (512 / len). No interpolation: the source
               is a staircase and we keep it one.

Render paths
------------

  direct       one table, one read per sample
  crossfaded   two mipmap levels read at the same index and blended
  oversampled  envelope once, then `os` reads at increment / os pushed into
               the decimator, filtered value read once:

                 level = env.next()
                 repeat os: dec.push(read()); phase += inc / os
                 out = dec.output() * level * velocity
*/

pub struct Voice {
    sample_rate: f32,
    length: TableLength,
    envelope: Envelope,
    decimator: Decimator,

    note: u8,
    velocity: f32,
    base_freq: f32,
    base_increment: f32,
    phase: f32,
    active: bool,
}

impl Voice {
    pub fn new(sample_rate: f32) -> Self {
        let sample_rate = sanitize_sample_rate(sample_rate);
        Self {
            sample_rate,
            length: TableLength::default(),
            envelope: Envelope::new().with_sample_rate(sample_rate),
            decimator: Decimator::new(),
            note: 0,
            velocity: 0.0,
            base_freq: 440.0,
            base_increment: 0.0,
            phase: 0.0,
            active: false,
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sanitize_sample_rate(sample_rate);
        self.envelope.set_sample_rate(self.sample_rate);
        self.retune();
    }

    /// Switch grid. A sounding voice keeps its position within the period.
    pub fn set_table_length(&mut self, length: TableLength) {
        if length == self.length {
            return;
        }
        let scale = length.len() as f32 / self.length.len() as f32;
        self.phase = (self.phase * scale).min(length.len() as f32 - 1.0).max(0.0);
        self.length = length;
        self.retune();
    }

    pub fn set_adsr(&mut self, params: AdsrParams) {
        self.envelope.set_params(params);
    }

    fn retune(&mut self) {
        self.base_increment = self.length.len() as f32 * self.base_freq / self.sample_rate;
    }

    pub fn note_on(&mut self, note: u8, velocity: u8) {
        self.note = note.min(127);
        self.velocity = velocity.min(127) as f32 / 127.0;
        self.base_freq = midi_note_to_freq(self.note);
        self.retune();
        self.phase = 0.0;
        self.envelope.gate(true);
        self.active = true;
        self.decimator.reset();
    }

    /// Enter release. The voice keeps sounding until the envelope is idle.
    pub fn note_off(&mut self) {
        self.envelope.gate(false);
    }

    /// Silence immediately, no release.
    pub fn kill(&mut self) {
        self.active = false;
        self.envelope.reset();
        self.decimator.reset();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_releasing(&self) -> bool {
        self.active && self.envelope.state() == EnvelopeState::Release
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn base_freq(&self) -> f32 {
        self.base_freq
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    pub fn table_length(&self) -> TableLength {
        self.length
    }

    pub fn envelope_level(&self) -> f32 {
        self.envelope.level()
    }

    pub fn decimator_mut(&mut self) -> &mut Decimator {
        &mut self.decimator
    }

    #[inline]
    fn read_index(&self) -> usize {
        (self.phase as usize * self.length.stride()) & (TABLE_SIZE - 1)
    }

    /// Step the envelope once. None (and the voice goes inactive) once it
    /// has run out.
    #[inline]
    pub fn begin_frame(&mut self) -> Option<f32> {
        if !self.active {
            return None;
        }
        let level = self.envelope.next_sample();
        if !self.envelope.is_active() && level <= 0.0 {
            self.active = false;
            return None;
        }
        Some(level)
    }

    /// Advance by `pitch_ratio * inv_oversample` of the base increment.
    /// A non-positive or non-finite step freezes the phase.
    #[inline]
    pub fn advance_phase_scaled(&mut self, pitch_ratio: f32, inv_oversample: f32) {
        let step = self.base_increment * pitch_ratio * inv_oversample;
        if !(step.is_finite() && step > 0.0) {
            return;
        }
        self.phase += step;
        let len = self.length.len() as f32;
        if self.phase >= len {
            self.phase %= len;
        }
        debug_assert!(self.phase < len);
    }

    #[inline]
    pub fn sample_from_two_tables(&self, a: &WaveformTable, b: &WaveformTable, mix: f32) -> f32 {
        let index = self.read_index();
        a.at(index) * (1.0 - mix) + b.at(index) * mix
    }

    /// Direct path: one table, no interpolation.
    #[inline]
    pub fn render(&mut self, table: &WaveformTable, pitch_ratio: f32) -> f32 {
        let Some(level) = self.begin_frame() else {
            return 0.0;
        };
        let sample = table.at(self.read_index());
        self.advance_phase_scaled(pitch_ratio, 1.0);
        sample * level * self.velocity
    }

    /// Crossfaded path between two mipmap levels.
    #[inline]
    pub fn render_from_two_tables(
        &mut self,
        a: &WaveformTable,
        b: &WaveformTable,
        mix: f32,
        pitch_ratio: f32,
    ) -> f32 {
        let Some(level) = self.begin_frame() else {
            return 0.0;
        };
        let sample = self.sample_from_two_tables(a, b, mix);
        self.advance_phase_scaled(pitch_ratio, 1.0);
        sample * level * self.velocity
    }

    /// Oversampled path: `ratio` sub-samples through the decimator.
    pub fn render_oversampled(
        &mut self,
        a: &WaveformTable,
        b: &WaveformTable,
        mix: f32,
        pitch_ratio: f32,
        ratio: usize,
    ) -> f32 {
        let Some(level) = self.begin_frame() else {
            return 0.0;
        };
        self.decimator.configure(ratio);
        let inv_oversample = 1.0 / ratio as f32;
        for _ in 0..ratio {
            let sample = self.sample_from_two_tables(a, b, mix);
            self.decimator.push(sample);
            self.advance_phase_scaled(pitch_ratio, inv_oversample);
        }
        self.decimator.output() * level * self.velocity
    }
}

impl Default for Voice {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 64 * 440: one grid step per sample for A4 on the 64 grid
    const UNIT_RATE: f32 = 28_160.0;

    fn ramp_table() -> WaveformTable {
        let mut samples = [0.0f32; TABLE_SIZE];
        for (i, s) in samples.iter_mut().enumerate() {
            *s = i as f32 / TABLE_SIZE as f32;
        }
        WaveformTable::from_samples(samples)
    }

    fn flat_table(value: f32) -> WaveformTable {
        WaveformTable::from_samples([value; TABLE_SIZE])
    }

    fn held_voice(length: TableLength) -> Voice {
        let mut voice = Voice::new(UNIT_RATE);
        voice.set_table_length(length);
        voice.set_adsr(AdsrParams::new(0.0, 0.0, 1.0, 0.0));
        voice.note_on(69, 127);
        voice
    }

    #[test]
    fn note_on_tunes_to_equal_temperament() {
        let mut voice = Voice::new(48_000.0);
        voice.note_on(69, 127);
        assert!(voice.is_active());
        assert!((voice.base_freq() - 440.0).abs() < 1e-3);
        assert_eq!(voice.velocity(), 1.0);

        voice.note_on(200, 255);
        assert_eq!(voice.note(), 127, "note is clamped");
        assert_eq!(voice.velocity(), 1.0);
    }

    #[test]
    fn direct_render_reads_at_grid_stride() {
        let table = ramp_table();
        let mut voice = held_voice(TableLength::L64);
        for n in 0..130 {
            let expected = ((n % 64) * 8) as f32 / TABLE_SIZE as f32;
            let out = voice.render(&table, 1.0);
            assert!((out - expected).abs() < 1e-6, "sample {n}: {out} vs {expected}");
        }
    }

    #[test]
    fn phase_stays_below_table_length() {
        let table = ramp_table();
        let mut voice = held_voice(TableLength::L128);
        for _ in 0..1_000 {
            voice.render(&table, 37.3);
            assert!(voice.phase() < 128.0);
        }
    }

    #[test]
    fn non_positive_pitch_freezes_phase() {
        let table = ramp_table();
        let mut voice = held_voice(TableLength::L64);
        voice.render(&table, 1.0);
        let phase = voice.phase();
        for ratio in [0.0, -2.0, f32::NAN, f32::INFINITY] {
            voice.render(&table, ratio);
            assert_eq!(voice.phase(), phase);
        }
    }

    #[test]
    fn crossfade_blends_linearly() {
        let a = flat_table(0.2);
        let b = flat_table(-0.6);
        let mut voice = held_voice(TableLength::L128);
        assert!((voice.render_from_two_tables(&a, &b, 0.0, 1.0) - 0.2).abs() < 1e-6);
        assert!((voice.render_from_two_tables(&a, &b, 1.0, 1.0) + 0.6).abs() < 1e-6);
        assert!((voice.render_from_two_tables(&a, &b, 0.5, 1.0) + 0.2).abs() < 1e-6);
    }

    #[test]
    fn oversampled_path_settles_to_table_level() {
        let table = flat_table(0.5);
        let mut voice = held_voice(TableLength::L128);
        let mut out = 0.0;
        for _ in 0..20 {
            out = voice.render_oversampled(&table, &table, 0.0, 1.0, 4);
        }
        assert_eq!(voice.decimator_mut().ratio(), 4);
        assert!((out - 0.5).abs() < 1e-3, "got {out}");
    }

    #[test]
    fn oversampling_advances_one_period_per_frame_on_average() {
        let table = ramp_table();
        let mut direct = held_voice(TableLength::L256);
        let mut oversampled = held_voice(TableLength::L256);
        for _ in 0..10 {
            direct.render(&table, 1.5);
            oversampled.render_oversampled(&table, &table, 0.0, 1.5, 8);
        }
        assert!((direct.phase() - oversampled.phase()).abs() < 1e-3);
    }

    #[test]
    fn voice_deactivates_after_release() {
        let table = flat_table(1.0);
        let mut voice = Voice::new(1_000.0);
        voice.set_adsr(AdsrParams::new(0.0, 0.0, 1.0, 0.01));
        voice.note_on(60, 100);
        voice.render(&table, 1.0);

        voice.note_off();
        assert!(voice.is_active(), "release keeps the voice alive");
        assert!(voice.is_releasing());
        let mut steps = 0;
        while voice.is_active() {
            voice.render(&table, 1.0);
            steps += 1;
            assert!(steps < 10_000, "release never finished");
        }
        assert_eq!(voice.render(&table, 1.0), 0.0);
        assert_eq!(voice.envelope_level(), 0.0);
    }

    #[test]
    fn table_length_change_keeps_relative_phase() {
        let table = ramp_table();
        let mut voice = held_voice(TableLength::L64);
        for _ in 0..16 {
            voice.render(&table, 1.0);
        }
        assert_eq!(voice.phase(), 16.0);
        voice.set_table_length(TableLength::L256);
        assert_eq!(voice.phase(), 64.0);
        voice.render(&table, 1.0);
        // increment scales with the grid, so a period still takes 64 samples
        assert_eq!(voice.phase(), 68.0);
    }
}

//! The SN76489 PSG chip: register-write protocol, four generators, and
//! sample-rate conversion down to the host rate.

use super::generators::{NoiseGenerator, ToneGenerator};

/// Linear volume table. Real hardware uses a roughly 2 dB/step
/// logarithmic table; this one is built the same way at construction.
fn build_volume_table() -> [i32; 16] {
    let mut table = [0i32; 16];
    for (i, slot) in table.iter_mut().enumerate().take(15) {
        let db = i as f64 * 2.0;
        *slot = (8191.0 / 10f64.powf(db / 20.0)) as i32;
    }
    table[15] = 0;
    table
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LatchedField {
    TonePeriod,
    Attenuation,
}

/// The four-channel SN76489 PSG, with a fixed-point phase accumulator
/// converting from the chip's native tick rate to the host sample rate.
pub struct Sn76489 {
    tones: [ToneGenerator; 3],
    noise: NoiseGenerator,
    volume_table: [i32; 16],

    latched_channel: usize,
    latched_field: LatchedField,

    /// 16.16 fixed-point accumulator; the chip ticks once per host sample
    /// whenever this overflows past `1 << 16`.
    phase_acc: u32,
    /// Per-host-sample phase step, `clock / (16 * sample_rate)` in 16.16.
    phase_step: u32,
}

impl Sn76489 {
    /// Builds a chip for the given clock and host sample rate.
    pub fn new(clock_hz: u32, sample_rate_hz: u32) -> Self {
        let phase_step =
            ((clock_hz as f64 / 16.0) / sample_rate_hz as f64 * 65536.0) as u32;
        Sn76489 {
            tones: Default::default(),
            noise: NoiseGenerator::default(),
            volume_table: build_volume_table(),
            latched_channel: 0,
            latched_field: LatchedField::TonePeriod,
            phase_acc: 0,
            phase_step: phase_step.max(1),
        }
    }

    /// Writes one byte to the PSG's single write port.
    pub fn write(&mut self, data: u8) {
        if data & 0x80 != 0 {
            self.latched_channel = ((data >> 5) & 0x03) as usize;
            self.latched_field = if data & 0x10 != 0 {
                LatchedField::Attenuation
            } else {
                LatchedField::TonePeriod
            };
            self.apply_low_nibble(data & 0x0F);
        } else {
            self.apply_high_bits(data & 0x3F);
        }
    }

    fn apply_low_nibble(&mut self, low: u8) {
        match (self.latched_channel, self.latched_field) {
            (3, LatchedField::TonePeriod) => {
                self.noise.control = low;
                self.noise.reset_lfsr();
                self.noise.counter = 0;
            }
            (ch, LatchedField::TonePeriod) => {
                self.tones[ch].period = (self.tones[ch].period & 0x3F0) | low as u16;
            }
            (3, LatchedField::Attenuation) => self.noise.attenuation = low,
            (ch, LatchedField::Attenuation) => self.tones[ch].attenuation = low,
        }
    }

    fn apply_high_bits(&mut self, high6: u8) {
        match (self.latched_channel, self.latched_field) {
            (3, LatchedField::TonePeriod) => {}
            (ch, LatchedField::TonePeriod) => {
                self.tones[ch].period =
                    (self.tones[ch].period & 0x0F) | ((high6 as u16) << 4);
            }
            (3, LatchedField::Attenuation) => self.noise.attenuation = high6 & 0x0F,
            (ch, LatchedField::Attenuation) => self.tones[ch].attenuation = high6 & 0x0F,
        }
    }

    fn tick_chip(&mut self) {
        for tone in &mut self.tones {
            tone.tick();
        }
        self.noise.tone2_period = self.tones[2].period;
        self.noise.tick();
    }

    fn mix_sample(&self) -> i32 {
        self.tones[0].sample(&self.volume_table)
            + self.tones[1].sample(&self.volume_table)
            + self.tones[2].sample(&self.volume_table)
            + self.noise.sample(&self.volume_table)
    }

    /// Renders `length` host samples, accumulating the mixed mono output
    /// into both `left` and `right` int buffers.
    pub fn update(&mut self, left: &mut [i32], right: &mut [i32], length: usize) {
        for n in 0..length {
            self.phase_acc = self.phase_acc.wrapping_add(self.phase_step);
            while self.phase_acc >= (1 << 16) {
                self.phase_acc -= 1 << 16;
                self.tick_chip();
            }
            let sample = self.mix_sample();
            left[n] += sample;
            right[n] += sample;
        }
    }

    /// Renders `length` host samples as mono s16, for callers (such as a
    /// bare PSG-only export path) that don't need a stereo int buffer.
    pub fn update_mono_i16(&mut self, out: &mut [i16], length: usize) {
        for slot in out.iter_mut().take(length) {
            self.phase_acc = self.phase_acc.wrapping_add(self.phase_step);
            while self.phase_acc >= (1 << 16) {
                self.phase_acc -= 1 << 16;
                self.tick_chip();
            }
            *slot = self.mix_sample().clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attenuation_15_is_silent_on_every_channel() {
        let mut psg = Sn76489::new(3_579_545, 44_100);
        psg.write(0x9F);
        psg.write(0xBF);
        psg.write(0xDF);
        psg.write(0xFF);
        let mut l = vec![0i32; 64];
        let mut r = vec![0i32; 64];
        psg.update(&mut l, &mut r, 64);
        assert!(l.iter().all(|&v| v == 0));
        assert!(r.iter().all(|&v| v == 0));
    }

    #[test]
    fn two_byte_tone_period_write_is_latched_correctly() {
        let mut psg = Sn76489::new(3_579_545, 44_100);
        psg.write(0x80 | 0x0E); // channel 0, tone, low nibble 0xE
        psg.write(0x01); // high 6 bits = 1
        assert_eq!(psg.tones[0].period, (1 << 4) | 0x0E);
    }

    #[test]
    fn max_volume_tone_produces_nonzero_output() {
        let mut psg = Sn76489::new(3_579_545, 44_100);
        psg.write(0x80 | 0x0E);
        psg.write(0x00);
        psg.write(0x90); // channel 0 attenuation = 0 (max volume)
        let mut l = vec![0i32; 256];
        let mut r = vec![0i32; 256];
        psg.update(&mut l, &mut r, 256);
        assert!(l.iter().any(|&v| v != 0));
    }

    #[test]
    fn noise_control_write_reseeds_lfsr() {
        let mut psg = Sn76489::new(3_579_545, 44_100);
        psg.noise.lfsr = 0x0001;
        psg.write(0xE4);
        assert_eq!(psg.noise.lfsr, 0x8000);
    }
}

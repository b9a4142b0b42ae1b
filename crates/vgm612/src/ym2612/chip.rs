//! The YM2612 chip: six channels, two timers, the DAC, the LFO, and the
//! register-write interface that drives all of them.

use bitflags::bitflags;

use super::channel::Channel;
use super::operator::SsgEg;
use super::tables::{static_tables, RateTables, StaticTables};

bitflags! {
    /// Register `0x27`, the mode register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Mode: u8 {
        /// Start Timer A counting from its reload value.
        const TIMER_A_LOAD = 0x01;
        /// Start Timer B counting from its reload value.
        const TIMER_B_LOAD = 0x02;
        /// Gate Timer A overflow into the status register (and CSM).
        const TIMER_A_ENABLE = 0x04;
        /// Gate Timer B overflow into the status register.
        const TIMER_B_ENABLE = 0x08;
        /// Clear Timer A's overflow status bit.
        const TIMER_A_RESET = 0x10;
        /// Clear Timer B's overflow status bit.
        const TIMER_B_RESET = 0x20;
        /// Channel 3 uses independent per-operator frequencies.
        const CH3_SPECIAL = 0x40;
        /// CSM: Timer A overflow re-triggers channel 3's operators.
        const CSM = 0x80;
    }
}

#[derive(Debug, Clone, Default)]
struct ChipTimer {
    reload: i64,
    counter: i64,
    enabled: bool,
}

impl ChipTimer {
    fn advance(&mut self, delta: i64) -> bool {
        if !self.enabled {
            return false;
        }
        self.counter -= delta;
        if self.counter <= 0 {
            self.counter += self.reload.max(1);
            true
        } else {
            false
        }
    }
}

/// Bits of the LFO phase counter used to index `lfo_env_tab`/`lfo_freq_tab`.
pub const LFO_HBITS: u32 = 10;
/// Fractional bits of the LFO phase counter below the table index.
const LFO_LBITS: u32 = 28 - LFO_HBITS;
const LFO_STEPS: usize = 1 << LFO_HBITS;
const LFO_MASK: u32 = (LFO_STEPS as u32) - 1;

/// Register `0x22`'s 3-bit rate field, in Hz, for the real chip's eight
/// LFO rates.
const LFO_RATES_HZ: [f64; 8] = [3.98, 5.56, 6.02, 6.37, 6.88, 9.63, 48.1, 72.2];

/// Fractional bits of the interpolator's phase accumulator (section 4.5);
/// a sample is only actually re-rendered when the accumulator overflows
/// this bit, and the channel's output is linearly interpolated between its
/// previous and current rendered sample the rest of the time.
const INTER_BITS: u32 = 14;
const INTER_OVERFLOW: u32 = 1 << INTER_BITS;
const INTER_MASK: u32 = INTER_OVERFLOW - 1;

/// The YM2612 six-channel FM synthesizer, including its DAC and timers.
pub struct Ym2612 {
    channels: [Channel; 6],
    rates: RateTables,
    frequence: f64,
    timer_base: f64,
    sample_rate: f64,

    latch: [u8; 2],
    reg: [[i32; 0x100]; 2],

    mode: Mode,
    status: u8,

    lfo_enabled: bool,
    lfo_inc: u32,
    lfo_counter: u32,
    lfo_env_tab: Vec<i32>,
    lfo_freq_tab: Vec<i32>,

    timer_a: ChipTimer,
    timer_b: ChipTimer,

    dac_enable: bool,
    dac_data: i32,

    /// Whether `update` renders every sample or interpolates between
    /// samples actually rendered at `inter_step`'s cadence (section 4.5).
    interpolate: bool,
    /// `(1 / Frequence) << INTER_BITS`; zero when interpolation is off or
    /// the clock/sample-rate ratio doesn't call for it.
    inter_step: u32,
}

impl Ym2612 {
    /// Builds a chip for the given clock and host sample rate, per
    /// section 4.8's table-construction rules, with interpolation disabled.
    pub fn new(clock_hz: u32, sample_rate_hz: u32) -> Self {
        Self::new_with_interpolation(clock_hz, sample_rate_hz, false)
    }

    /// As [`Ym2612::new`], but optionally enables section 4.5's sample
    /// interpolator for chip/sample-rate ratios where `Frequence > 1`
    /// (the only case the spec defines it for; otherwise every sample is
    /// rendered directly, same as `interpolate = false`).
    pub fn new_with_interpolation(clock_hz: u32, sample_rate_hz: u32, interpolate: bool) -> Self {
        let frequence = (clock_hz as f64 / sample_rate_hz as f64) / 144.0;
        let rates = RateTables::new(frequence);

        // LFO_ENV_TAB: triangle wave biased positive, scaled to 11.8 dB
        // max (ENV_STEP is 0.125 dB/step). LFO_FREQ_TAB: signed sine,
        // bounded to the FMS multiplier's fractional range.
        let mut lfo_env_tab = vec![0i32; LFO_STEPS];
        let mut lfo_freq_tab = vec![0i32; LFO_STEPS];
        for i in 0..LFO_STEPS {
            let phase = i as f64 / LFO_STEPS as f64 * std::f64::consts::TAU;
            let sin = phase.sin();
            lfo_env_tab[i] = (((sin + 1.0) / 2.0) * (11.8 / super::tables::ENV_STEP)) as i32;
            lfo_freq_tab[i] = (sin * ((1i32 << (LFO_HBITS - 1)) - 1) as f64) as i32;
        }

        let inter_step = if interpolate && frequence > 1.0 {
            ((1.0 / frequence) * INTER_OVERFLOW as f64) as u32
        } else {
            0
        };

        Ym2612 {
            channels: Default::default(),
            rates,
            frequence,
            timer_base: frequence,
            sample_rate: sample_rate_hz as f64,
            latch: [0; 2],
            reg: [[-1; 0x100]; 2],
            mode: Mode::empty(),
            status: 0,
            lfo_enabled: false,
            lfo_inc: 0,
            lfo_counter: 0,
            lfo_env_tab,
            lfo_freq_tab,
            timer_a: ChipTimer::default(),
            timer_b: ChipTimer::default(),
            dac_enable: false,
            dac_data: 0,
            interpolate: inter_step > 0,
            inter_step,
        }
    }

    /// Resets all register state, channels, and timers to power-on values.
    pub fn reset(&mut self) {
        let (clock_frequence, timer_base, sample_rate, interpolate, inter_step) = (
            self.frequence,
            self.timer_base,
            self.sample_rate,
            self.interpolate,
            self.inter_step,
        );
        let rates = RateTables::new(clock_frequence);
        *self = Ym2612::new(1, 1);
        self.rates = rates;
        self.frequence = clock_frequence;
        self.timer_base = timer_base;
        self.sample_rate = sample_rate;
        self.interpolate = interpolate;
        self.inter_step = inter_step;
    }

    /// Current status byte (bit 0 = Timer A overflow, bit 1 = Timer B overflow).
    pub fn status(&self) -> u8 {
        self.status
    }

    /// Currently latched DAC sample, already sign-extended into bit 14
    /// (`(data - 0x80) << 7`). Port `0x2A` writes bypass the register file
    /// entirely, so this is the only way to observe them.
    pub fn dac_data(&self) -> i32 {
        self.dac_data
    }

    /// Returns the raw register value last written to `addr` in bank 0,
    /// or `-1` if never written. Exposed mainly for the write-suppression
    /// round-trip test.
    pub fn read_reg(&self, bank: usize, addr: u8) -> i32 {
        self.reg[bank][addr as usize]
    }

    /// Writes one byte to one of the four OPN bus ports.
    pub fn write(&mut self, port: u8, data: u8) {
        match port {
            0 => self.latch[0] = data,
            1 => {
                let addr = self.latch[0];
                self.write_data(0, addr, data);
            }
            2 => self.latch[1] = data,
            3 => {
                let addr = self.latch[1];
                self.write_data(1, addr, data);
            }
            _ => {}
        }
    }

    fn write_data(&mut self, bank: usize, addr: u8, data: u8) {
        if addr == 0x2A && bank == 0 {
            self.dac_data = ((data as i32) - 0x80) << 7;
            return;
        }

        if addr < 0x30 && bank != 0 {
            return;
        }

        if addr >= 0x30 && self.reg[bank][addr as usize] == data as i32 {
            log::trace!("ym2612: suppressed redundant write bank={bank} addr={addr:#04x}");
            return;
        }
        self.reg[bank][addr as usize] = data as i32;

        match addr {
            0x22 => self.write_lfo(data),
            0x24 => self.timer_a.reload = (self.timer_a.reload & 0x3) | ((data as i64) << 2),
            0x25 => {
                self.timer_a.reload = (self.timer_a.reload & !0x3) | (data as i64 & 0x3);
                self.timer_a.reload = ((1024 - self.timer_a.reload.clamp(0, 1023)) << 12).max(1);
            }
            0x26 => self.timer_b.reload = ((256 - (data as i64).clamp(0, 255)) << 16).max(1),
            0x27 => self.write_mode(data),
            0x28 => self.write_key_on_off(data),
            0x2B => self.dac_enable = data & 0x80 != 0,
            0x30..=0x9F => self.write_slot(bank, addr, data),
            0xA0..=0xB7 => self.write_channel(bank, addr, data),
            _ => log::warn!("ym2612: write to unmapped register {addr:#04x}"),
        }
    }

    fn write_lfo(&mut self, data: u8) {
        self.lfo_enabled = data & 0x08 != 0;
        if !self.lfo_enabled {
            self.lfo_counter = 0;
            self.lfo_inc = 0;
            return;
        }
        let hz = LFO_RATES_HZ[(data & 0x07) as usize];
        self.lfo_inc = ((hz * (1u64 << (LFO_HBITS + LFO_LBITS)) as f64 / self.sample_rate) as u32)
            .max(1);
    }

    fn write_mode(&mut self, data: u8) {
        self.mode = Mode::from_bits_truncate(data);
        if self.mode.contains(Mode::TIMER_A_RESET) {
            self.status &= !0x01;
        }
        if self.mode.contains(Mode::TIMER_B_RESET) {
            self.status &= !0x02;
        }
        self.timer_a.enabled = self.mode.contains(Mode::TIMER_A_ENABLE);
        self.timer_b.enabled = self.mode.contains(Mode::TIMER_B_ENABLE);
        if self.mode.contains(Mode::TIMER_A_LOAD) {
            self.timer_a.counter = self.timer_a.reload.max(1);
        }
        if self.mode.contains(Mode::TIMER_B_LOAD) {
            self.timer_b.counter = self.timer_b.reload.max(1);
        }
        self.invalidate_finc(2);
    }

    fn write_key_on_off(&mut self, data: u8) {
        let sel = (data & 0x03) as usize;
        if sel == 3 {
            return;
        }
        let bank = ((data >> 2) & 0x01) as usize;
        let ch_index = bank * 3 + sel;
        let tables = static_tables();
        // Hardware slot order {S0,S1,S2,S3} maps to physical slot indices
        // {0,2,1,3} — preserved verbatim from the chip's own quirky wiring.
        const SLOT_ORDER: [usize; 4] = [0, 2, 1, 3];
        for (bit, &slot) in SLOT_ORDER.iter().enumerate() {
            let on = data & (0x10 << bit) != 0;
            let op = &mut self.channels[ch_index].ops[slot];
            if on {
                op.key_on(tables);
            } else {
                op.key_off(tables);
            }
        }
    }

    fn write_slot(&mut self, bank: usize, addr: u8, data: u8) {
        let field = addr & 0xF0;
        let channel_in_bank = (addr & 0x03) as usize;
        if channel_in_bank == 3 {
            return;
        }
        let slot = ((addr >> 2) & 0x03) as usize;
        let ch_index = bank * 3 + channel_in_bank;
        let tables = static_tables();

        match field {
            0x30 => {
                let op = &mut self.channels[ch_index].ops[slot];
                op.detune_row = ((data >> 4) & 0x07) as usize;
                op.mul_raw = data & 0x0F;
                self.invalidate_finc(ch_index);
            }
            0x40 => {
                let op = &mut self.channels[ch_index].ops[slot];
                op.tl = (data & 0x7F) as i32;
                op.refresh_tll();
            }
            0x50 => {
                let op = &mut self.channels[ch_index].ops[slot];
                op.ksr_s = 3 - ((data >> 6) & 0x03) as u32;
                op.ar_raw = (data & 0x1F) as u32;
                op.refresh_rates(&self.rates);
            }
            0x60 => {
                let op = &mut self.channels[ch_index].ops[slot];
                op.ams_on = data & 0x80 != 0;
                op.dr_raw = (data & 0x1F) as u32;
                op.refresh_rates(&self.rates);
            }
            0x70 => {
                let op = &mut self.channels[ch_index].ops[slot];
                op.sr_raw = (data & 0x1F) as u32;
                op.refresh_rates(&self.rates);
            }
            0x80 => {
                let sl = ((data >> 4) & 0x0F) as usize;
                let op = &mut self.channels[ch_index].ops[slot];
                op.sll = tables.sl_tab[sl];
                op.rr_rate = (data as u32 & 0x0F) * 4 + 2;
                op.refresh_rates(&self.rates);
            }
            0x90 => {
                self.channels[ch_index].ops[slot].seg = SsgEg::from_bits(data & 0x0F);
            }
            _ => {}
        }
    }

    fn write_channel(&mut self, bank: usize, addr: u8, data: u8) {
        let channel_in_bank = (addr & 0x03) as usize;
        if channel_in_bank == 3 {
            return;
        }
        let ch_index = bank * 3 + channel_in_bank;
        let field = addr & 0xFC;

        match field {
            0xA0 => {
                self.channels[ch_index].fnum[0] =
                    (self.channels[ch_index].fnum[0] & 0x700) | data as u32;
                self.invalidate_finc(ch_index);
            }
            0xA4 => {
                self.channels[ch_index].fnum[0] =
                    (self.channels[ch_index].fnum[0] & 0xFF) | (((data as u32) & 0x07) << 8);
                self.channels[ch_index].foct[0] = ((data >> 3) & 0x07) as u32;
                self.invalidate_finc(ch_index);
            }
            0xA8 | 0xAC if ch_index == 2 => {
                let fnum_idx = 1 + channel_in_bank;
                if field == 0xA8 {
                    self.channels[2].fnum[fnum_idx] =
                        (self.channels[2].fnum[fnum_idx] & 0x700) | data as u32;
                } else {
                    self.channels[2].fnum[fnum_idx] =
                        (self.channels[2].fnum[fnum_idx] & 0xFF) | (((data as u32) & 0x07) << 8);
                    self.channels[2].foct[fnum_idx] = ((data >> 3) & 0x07) as u32;
                }
                self.invalidate_finc(2);
            }
            0xB0 => self.channels[ch_index].set_algo_fb(data),
            0xB4 => self.channels[ch_index].set_pan_lfo(data),
            _ => {}
        }
    }

    fn invalidate_finc(&mut self, ch_index: usize) {
        self.channels[ch_index].ops[0].finc = -1;
    }

    /// Recomputes the phase increment and key-scale rate for every
    /// operator of one channel.
    fn recompute_channel_freq(&mut self, ch_index: usize) {
        let tables = static_tables();
        let special = ch_index == 2 && self.mode.contains(Mode::CH3_SPECIAL);
        // Channel 3's "stupid typo": natural slot order S0,S1,S2,S3 reads
        // its special-mode frequency from fnum/foct indices 2,3,1,0.
        const SPECIAL_SRC: [usize; 4] = [2, 3, 1, 0];

        for slot in 0..4 {
            let src = if special { SPECIAL_SRC[slot] } else { 0 };

            let (fnum, foct, detune_row, mul) = {
                let ch = &self.channels[ch_index];
                let op = &ch.ops[slot];
                (ch.fnum[src], ch.foct[src], op.detune_row, op.multiplier())
            };
            let kc = ((foct << 2) | tables.fkey_tab[(fnum >> 7) as usize] as u32).min(31);

            let finc_base = self.rates.finc_tab[fnum as usize] >> (7 - foct.min(7));
            let dt = self.rates.dt_tab[detune_row][kc as usize];
            let finc = (finc_base as i64 + dt as i64) * mul as i64;

            let ch = &mut self.channels[ch_index];
            ch.kc[src] = kc;
            let op = &mut ch.ops[slot];
            op.finc = finc;
            let new_ksr = kc >> op.ksr_s;
            if new_ksr != op.ksr {
                op.ksr = new_ksr;
                op.refresh_rates(&self.rates);
            }
        }
    }

    /// Advances the LFO phase by one sample, returning its current
    /// (amplitude, frequency) modulation contributions.
    fn step_lfo(&mut self) -> (i32, i32) {
        self.lfo_counter = self.lfo_counter.wrapping_add(self.lfo_inc);
        let idx = ((self.lfo_counter >> LFO_LBITS) & LFO_MASK) as usize;
        (self.lfo_env_tab[idx], self.lfo_freq_tab[idx])
    }

    /// Renders `length` samples of FM output, accumulating into `left`
    /// and `right` (which must already hold at least `length` entries and
    /// are *added into*, not overwritten).
    pub fn update(&mut self, left: &mut [i32], right: &mut [i32], length: usize) {
        for idx in 0..6 {
            if self.channels[idx].ops[0].finc < 0 {
                self.recompute_channel_freq(idx);
            }
        }

        let tables = static_tables();
        for n in 0..length {
            let (lfo_ams, lfo_freq) = if self.lfo_enabled {
                self.step_lfo()
            } else {
                (0, 0)
            };
            for (idx, ch) in self.channels.iter_mut().enumerate() {
                if idx == 5 && self.dac_enable {
                    continue;
                }
                ch.tick_envelopes();
                ch.tick_phases(lfo_freq);
                if ch.is_silent() {
                    continue;
                }

                if self.interpolate {
                    ch.inter_cnt = ch.inter_cnt.wrapping_add(self.inter_step);
                    if ch.inter_cnt & INTER_OVERFLOW != 0 {
                        ch.inter_cnt &= INTER_MASK;
                        ch.render_sample(tables, lfo_ams);
                    }
                    let frac = ch.inter_cnt as i64;
                    let blended = ch.old_outd as i64
                        + (((ch.outd - ch.old_outd) as i64 * frac) >> INTER_BITS);
                    let blended = blended as i32;
                    left[n] += blended & ch.left;
                    right[n] += blended & ch.right;
                } else {
                    let (l, r) = ch.render_sample(tables, lfo_ams);
                    left[n] += l;
                    right[n] += r;
                }
            }
        }
    }

    /// Mixes in the DAC (channel 6 bypass) and advances both timers,
    /// per section 4.7.
    pub fn dac_and_timers_update(&mut self, left: &mut [i32], right: &mut [i32], length: usize) {
        if self.dac_enable {
            let (l_gate, r_gate) = (self.channels[5].left, self.channels[5].right);
            for n in 0..length {
                left[n] += self.dac_data & l_gate;
                right[n] += self.dac_data & r_gate;
            }
        }

        let delta = (self.timer_base * length as f64 * 4096.0) as i64;
        if self.timer_a.advance(delta) {
            self.status |= 0x01;
            if self.mode.contains(Mode::CSM) && self.mode.contains(Mode::CH3_SPECIAL) {
                self.csm_key_on_channel3();
            }
        }
        if self.timer_b.advance(delta) {
            self.status |= 0x02;
        }
    }

    fn csm_key_on_channel3(&mut self) {
        let tables = static_tables();
        for op in &mut self.channels[2].ops {
            op.key_on(tables);
        }
    }

    /// Direct access to the underlying tables, for modules that need to
    /// render into channel mixing buffers without a full `update` pass.
    pub fn tables(&self) -> &'static StaticTables {
        static_tables()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_chip() -> Ym2612 {
        Ym2612::new(7_670_453, 44_100)
    }

    #[test]
    fn redundant_write_is_suppressed() {
        let mut chip = new_chip();
        chip.write(0, 0x40);
        chip.write(1, 0x10);
        assert_eq!(chip.read_reg(0, 0x40), 0x10);
        chip.write(0, 0x40);
        chip.write(1, 0x10);
        assert_eq!(chip.read_reg(0, 0x40), 0x10);
    }

    #[test]
    fn dac_write_is_never_suppressed() {
        let mut chip = new_chip();
        chip.write(0, 0x2A);
        chip.write(1, 0x80);
        let first = chip.dac_data;
        chip.write(0, 0x2A);
        chip.write(1, 0x80);
        assert_eq!(chip.dac_data, first);
    }

    #[test]
    fn reset_silences_all_channels() {
        let mut chip = new_chip();
        let mut l = vec![0i32; 8];
        let mut r = vec![0i32; 8];
        chip.update(&mut l, &mut r, 8);
        assert!(l.iter().all(|&v| v == 0));
        assert!(r.iter().all(|&v| v == 0));
    }

    #[test]
    fn dac_bypasses_channel_5_fm() {
        let mut chip = new_chip();
        chip.write(2, 0xB6);
        chip.write(3, 0xC0);
        chip.write(0, 0x2B);
        chip.write(1, 0x80);
        chip.write(0, 0x2A);
        chip.write(1, 0xC0);
        let mut l = vec![0i32; 4];
        let mut r = vec![0i32; 4];
        chip.update(&mut l, &mut r, 4);
        chip.dac_and_timers_update(&mut l, &mut r, 4);
        assert!(l.iter().all(|&v| v == chip.dac_data));
    }

    #[test]
    fn key_on_off_slot_order_is_preserved() {
        let mut chip = new_chip();
        chip.write(0, 0x28);
        chip.write(1, 0xF0);
        assert!(chip.channels[0].ops[0].ecurp != super::super::operator::EnvelopeState::Idle);
        assert!(chip.channels[0].ops[1].ecurp != super::super::operator::EnvelopeState::Idle);
        assert!(chip.channels[0].ops[2].ecurp != super::super::operator::EnvelopeState::Idle);
        assert!(chip.channels[0].ops[3].ecurp != super::super::operator::EnvelopeState::Idle);
    }

    #[test]
    fn timer_a_overflows_and_sets_status_bit() {
        let mut chip = new_chip();
        chip.write(0, 0x24);
        chip.write(1, 0xFF);
        chip.write(0, 0x25);
        chip.write(1, 0x03);
        chip.timer_a.reload = 10;
        chip.write(0, 0x27);
        chip.write(1, 0x05); // TIMER_A_ENABLE | TIMER_A_LOAD
        let mut l = vec![0i32; 16];
        let mut r = vec![0i32; 16];
        for _ in 0..4 {
            chip.dac_and_timers_update(&mut l, &mut r, 16);
        }
        assert_eq!(chip.status() & 0x01, 0x01);
    }

    #[test]
    fn interpolation_disabled_by_default() {
        let chip = new_chip();
        assert!(!chip.interpolate);
        assert_eq!(chip.inter_step, 0);
    }

    #[test]
    fn interpolation_step_is_computed_when_frequence_exceeds_one() {
        // Default clocks give Frequence = (7_670_453/44_100)/144 ≈ 1.21 > 1.
        let chip = Ym2612::new_with_interpolation(7_670_453, 44_100, true);
        assert!(chip.interpolate);
        assert!(chip.inter_step > 0 && chip.inter_step < INTER_OVERFLOW);
    }

    #[test]
    fn interpolation_off_when_frequence_is_at_most_one() {
        // A low enough clock/sample-rate ratio keeps Frequence <= 1, where
        // the spec doesn't call for interpolation.
        let chip = Ym2612::new_with_interpolation(1, 44_100, true);
        assert!(!chip.interpolate);
        assert_eq!(chip.inter_step, 0);
    }

    #[test]
    fn interpolated_update_still_produces_silence_when_reset() {
        let mut chip = Ym2612::new_with_interpolation(7_670_453, 44_100, true);
        let mut l = vec![0i32; 16];
        let mut r = vec![0i32; 16];
        chip.update(&mut l, &mut r, 16);
        assert!(l.iter().all(|&v| v == 0));
        assert!(r.iter().all(|&v| v == 0));
    }
}

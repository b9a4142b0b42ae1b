//! A YM2612 channel: four operators wired together by one of eight
//! connection algorithms, plus per-channel feedback, pan gates, and LFO
//! sensitivity.

use super::operator::Operator;
use super::tables::StaticTables;

/// Clipping bound applied to the final per-channel sample, after
/// `OUT_SHIFT`, for algorithms that sum more than one carrier.
/// `((1 << OUT_BITS) * 1.5) - 1` with `OUT_BITS = 13`.
pub const LIMIT_CH_OUT: i32 = 12_287;

/// Right-shift applied to a channel's combined carrier output (still at
/// `tables::MAX_OUT`'s internal operator scale) to bring it down to final
/// audio sample scale, once per rendered sample, after any multi-carrier
/// summation.
pub const OUT_SHIFT: u32 = 17;

/// Fractional bits of the `finc * freq_lfo` frequency-modulation product.
pub const LFO_FMS_LBITS: u32 = 9;

/// Register `0xB4`'s 3-bit FMS field, expanded to chip-internal units
/// (`LFO_FMS_BASE` scaled by 0, 1, 2, 3, 4, 6, 12, 24).
pub const FMS_TAB: [i32; 8] = {
    const BASE: i32 = 1;
    [
        BASE * 0,
        BASE * 1,
        BASE * 2,
        BASE * 3,
        BASE * 4,
        BASE * 6,
        BASE * 12,
        BASE * 24,
    ]
};

/// One YM2612 channel (four operators + routing).
#[derive(Debug, Clone)]
pub struct Channel {
    /// The four FM operators, in hardware slot order `[S0, S1, S2, S3]`.
    pub ops: [Operator; 4],

    /// Feedback history for operator 0's last two outputs.
    pub s0_out: [i32; 2],
    /// Connection algorithm, 0..7.
    pub algo: u8,
    /// Feedback shift count, stored as `9 - raw` (9 means "no feedback").
    pub fb: u8,
    /// Frequency-modulation sensitivity (LFO), already expanded from the
    /// raw 0..7 register field through `FMS_TAB` into chip-internal units.
    pub fms: i32,
    /// Amplitude-modulation sensitivity (LFO), 0..3.
    pub ams: u8,
    /// Left output gate: all-ones when enabled, else zero.
    pub left: i32,
    /// Right output gate: all-ones when enabled, else zero.
    pub right: i32,

    /// F-number per slot index; only index 0 is used outside channel-3
    /// special mode.
    pub fnum: [u32; 4],
    /// Octave (block) per slot index.
    pub foct: [u32; 4],
    /// Key code per slot index, derived from `fnum`/`foct`.
    pub kc: [u32; 4],

    /// Previous sample, retained for the interpolator.
    pub old_outd: i32,
    /// Current sample.
    pub outd: i32,
    /// Interpolator phase accumulator (14 fractional bits); see
    /// `Ym2612::new_with_interpolation`.
    pub inter_cnt: u32,
}

impl Default for Channel {
    fn default() -> Self {
        Channel {
            ops: Default::default(),
            s0_out: [0, 0],
            algo: 0,
            fb: 9,
            fms: 0,
            ams: 0,
            left: -1,
            right: -1,
            fnum: [0; 4],
            foct: [0; 4],
            kc: [0; 4],
            old_outd: 0,
            outd: 0,
            inter_cnt: 0,
        }
    }
}

impl Channel {
    /// Advances every operator's envelope by one sample.
    pub fn tick_envelopes(&mut self) {
        for op in &mut self.ops {
            op.tick_envelope();
        }
    }

    /// Advances every operator's phase accumulator by one sample.
    ///
    /// `lfo_freq_sample` is the LFO's raw per-sample frequency-table value
    /// (0 when the LFO is disabled); it's scaled by this channel's `fms`
    /// and, when nonzero, perturbs every operator's phase increment for
    /// this sample only (the cached `Finc` itself is untouched).
    pub fn tick_phases(&mut self, lfo_freq_sample: i32) {
        let freq_lfo = (self.fms * lfo_freq_sample) >> (super::chip::LFO_HBITS - 1);
        for op in &mut self.ops {
            let finc = op.finc.max(0);
            let modulated = finc + ((finc * freq_lfo as i64) >> LFO_FMS_LBITS);
            op.fcnt = op.fcnt.wrapping_add(modulated as u32);
        }
    }

    /// Indices (into `ops`) of the operators that act as final carriers for
    /// the current algorithm; used for the early-silence check.
    pub fn carrier_indices(&self) -> &'static [usize] {
        match self.algo {
            0..=3 => &[3],
            4 => &[1, 3],
            5 | 6 => &[1, 2, 3],
            _ => &[0, 1, 2, 3],
        }
    }

    /// True when every carrier operator has decayed to silence.
    pub fn is_silent(&self) -> bool {
        self.carrier_indices().iter().all(|&i| self.ops[i].is_silent())
    }

    /// Computes the feedback-modulated phase used as operator 0's own
    /// input, per `FB` (9 means feedback disabled). `FB` is a right-shift
    /// count applied to the raw (un-averaged) sum of operator 0's last two
    /// outputs, not a left shift — a left shift would amplify instead of
    /// attenuate the feedback path.
    fn feedback_phase(&self, base_phase: u32) -> u32 {
        if self.fb >= 9 {
            base_phase
        } else {
            let sum = self.s0_out[0] + self.s0_out[1];
            base_phase.wrapping_add((sum >> self.fb) as u32)
        }
    }

    /// Renders one sample of this channel's mix, given the LFO's current
    /// amplitude/frequency modulation contributions (0 when the LFO is
    /// disabled), and returns the (already pan-gated) left/right pair.
    pub fn render_sample(&mut self, tables: &StaticTables, lfo_ams: i32) -> (i32, i32) {
        let fb_phase = self.feedback_phase(self.ops[0].fcnt);
        let op0 = self.ops[0].output(tables, fb_phase, lfo_ams);
        self.s0_out[1] = self.s0_out[0];
        self.s0_out[0] = op0;

        let op1 = self.ops[1].output(tables, self.ops[1].fcnt, lfo_ams);
        let op2 = self.ops[2].output(tables, self.ops[2].fcnt, lfo_ams);
        let op3 = self.ops[3].output(tables, self.ops[3].fcnt, lfo_ams);

        // Every branch below stays at the operators' internal
        // `tables::MAX_OUT` scale and accumulates in `i64` (a sum of up to
        // four ~2^30-scale operator outputs can exceed `i32::MAX`); only
        // after picking/summing the carrier(s) do we shift down to audio
        // sample scale and clip, once, below.
        let carrier_sum: i64 = match self.algo {
            // 0: op1 -> op2 -> op3 -> op4 (serial chain), op4 carries.
            0 => {
                let p1 = self.ops[1].fcnt.wrapping_add(op0 as u32);
                let o1 = self.ops[1].output(tables, p1, lfo_ams);
                let p2 = self.ops[2].fcnt.wrapping_add(o1 as u32);
                let o2 = self.ops[2].output(tables, p2, lfo_ams);
                let p3 = self.ops[3].fcnt.wrapping_add(o2 as u32);
                self.ops[3].output(tables, p3, lfo_ams) as i64
            }
            // 1: (op1 + op2) -> op3 -> op4.
            1 => {
                let p2 = self.ops[2].fcnt.wrapping_add((op0 + op1) as u32);
                let o2 = self.ops[2].output(tables, p2, lfo_ams);
                let p3 = self.ops[3].fcnt.wrapping_add(o2 as u32);
                self.ops[3].output(tables, p3, lfo_ams) as i64
            }
            // 2: op2 -> op3; (op1 + op3) -> op4.
            2 => {
                let p2 = self.ops[2].fcnt.wrapping_add(op1 as u32);
                let o2 = self.ops[2].output(tables, p2, lfo_ams);
                let p3 = self.ops[3].fcnt.wrapping_add((op0 + o2) as u32);
                self.ops[3].output(tables, p3, lfo_ams) as i64
            }
            // 3: op1 -> op2; (op2 + op3) -> op4.
            3 => {
                let p1 = self.ops[1].fcnt.wrapping_add(op0 as u32);
                let o1 = self.ops[1].output(tables, p1, lfo_ams);
                let p3 = self.ops[3].fcnt.wrapping_add((o1 + op2) as u32);
                self.ops[3].output(tables, p3, lfo_ams) as i64
            }
            // 4: (op1 -> op2) + (op3 -> op4); two parallel FM pairs, both carry.
            4 => {
                let p1 = self.ops[1].fcnt.wrapping_add(op0 as u32);
                let o1 = self.ops[1].output(tables, p1, lfo_ams);
                let p3 = self.ops[3].fcnt.wrapping_add(op2 as u32);
                let o3 = self.ops[3].output(tables, p3, lfo_ams);
                o1 as i64 + o3 as i64
            }
            // 5: op1 -> (op2 + op3 + op4) in parallel; all three carry.
            5 => {
                let p1 = self.ops[1].fcnt.wrapping_add(op0 as u32);
                let p2 = self.ops[2].fcnt.wrapping_add(op0 as u32);
                let p3 = self.ops[3].fcnt.wrapping_add(op0 as u32);
                let o1 = self.ops[1].output(tables, p1, lfo_ams);
                let o2 = self.ops[2].output(tables, p2, lfo_ams);
                let o3 = self.ops[3].output(tables, p3, lfo_ams);
                o1 as i64 + o2 as i64 + o3 as i64
            }
            // 6: (op1 -> op2) + op3 + op4; op2 carries alongside two independents.
            6 => {
                let p1 = self.ops[1].fcnt.wrapping_add(op0 as u32);
                let o1 = self.ops[1].output(tables, p1, lfo_ams);
                o1 as i64 + op2 as i64 + op3 as i64
            }
            // 7: all four operators are independent carriers.
            _ => op0 as i64 + op1 as i64 + op2 as i64 + op3 as i64,
        };

        let raw = ((carrier_sum >> OUT_SHIFT) as i32).clamp(-LIMIT_CH_OUT, LIMIT_CH_OUT);

        self.old_outd = self.outd;
        self.outd = raw;
        (raw & self.left, raw & self.right)
    }

    /// Applies register `0xB4`: pan gates, AMS, FMS.
    pub fn set_pan_lfo(&mut self, data: u8) {
        self.left = if data & 0x80 != 0 { -1 } else { 0 };
        self.right = if data & 0x40 != 0 { -1 } else { 0 };
        self.ams = (data >> 4) & 0x03;
        self.fms = FMS_TAB[(data & 0x07) as usize];
    }

    /// Applies register `0xB0`: algorithm and feedback.
    pub fn set_algo_fb(&mut self, data: u8) {
        self.algo = data & 0x07;
        let raw_fb = (data >> 3) & 0x07;
        self.fb = if raw_fb == 0 { 9 } else { 9 - raw_fb };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ym2612::tables::static_tables;

    #[test]
    fn carrier_indices_match_algorithm_family() {
        let mut ch = Channel::default();
        ch.algo = 0;
        assert_eq!(ch.carrier_indices(), &[3]);
        ch.algo = 7;
        assert_eq!(ch.carrier_indices(), &[0, 1, 2, 3]);
    }

    #[test]
    fn feedback_disabled_when_fb_is_nine() {
        let mut ch = Channel::default();
        ch.fb = 9;
        ch.s0_out = [1000, 1000];
        assert_eq!(ch.feedback_phase(42), 42);
    }

    #[test]
    fn feedback_enabled_perturbs_phase() {
        let mut ch = Channel::default();
        ch.fb = 1;
        ch.s0_out = [1000, 1000];
        assert_ne!(ch.feedback_phase(42), 42);
    }

    #[test]
    fn pan_gates_decode_register_b4() {
        let mut ch = Channel::default();
        ch.set_pan_lfo(0xC0);
        assert_eq!(ch.left, -1);
        assert_eq!(ch.right, -1);
        ch.set_pan_lfo(0x00);
        assert_eq!(ch.left, 0);
        assert_eq!(ch.right, 0);
    }

    #[test]
    fn fms_field_expands_through_fms_tab() {
        let mut ch = Channel::default();
        ch.set_pan_lfo(0x07); // FMS field = 7, the deepest setting
        assert_eq!(ch.fms, FMS_TAB[7]);
        assert_eq!(ch.fms, 24);
    }

    #[test]
    fn zero_fms_leaves_phase_unperturbed_by_lfo_freq() {
        let mut ch = Channel::default();
        ch.ops[0].finc = 1000;
        ch.fms = 0;
        ch.tick_phases(511); // max LFO frequency swing
        assert_eq!(ch.ops[0].fcnt, 1000);
    }

    #[test]
    fn nonzero_fms_perturbs_phase_increment() {
        let mut ch = Channel::default();
        ch.ops[0].finc = 100_000;
        ch.fms = FMS_TAB[7];
        ch.tick_phases(511);
        assert_ne!(ch.ops[0].fcnt, 100_000);
    }

    #[test]
    fn algo_and_feedback_decode_register_b0() {
        let mut ch = Channel::default();
        ch.set_algo_fb(0b0101_1010);
        assert_eq!(ch.algo, 2);
        assert_eq!(ch.fb, 9 - 0b011);
    }

    #[test]
    fn silent_channel_reports_silent_carriers() {
        let tables = static_tables();
        let ch = Channel::default();
        assert!(ch.is_silent());
        let _ = tables;
    }
}

//! Precomputed lookup tables shared by the YM2612 phase/envelope engine.
//!
//! The chip-independent tables (sine/total-level/envelope curves) are
//! built once per process via [`static_tables`] and shared read-only by
//! every [`crate::ym2612::chip::Ym2612`] instance. The rate, detune and
//! frequency-increment tables depend on the chip's effective clock ratio
//! (`Frequence`) and are therefore owned per-chip by [`RateTables`].

use std::sync::OnceLock;

/// Bits of the phase accumulator used as the sine-table index.
pub const SIN_HBITS: u32 = 12;
/// Fractional bits of the phase accumulator below the sine-table index.
pub const SIN_LBITS: u32 = 16;
/// Mask selecting the sine-table index out of a shifted phase accumulator.
pub const SIN_MASK: u32 = (1 << SIN_HBITS) - 1;

/// Envelope attenuation resolution, in bits.
pub const ENV_BITS: u32 = 10;
/// Number of distinct attenuation steps in one envelope "half" (attack or decay).
pub const ENV_LENGTH: i32 = 1 << ENV_BITS;
/// Attenuation, in dB, represented by one `ENV_TAB` step.
pub const ENV_STEP: f64 = 128.0 / ENV_LENGTH as f64;
/// Largest valid attenuation index (maximum attenuation, i.e. silence).
pub const MAX_ATT_INDEX: i32 = ENV_LENGTH - 1;
/// Smallest valid attenuation index (no attenuation).
pub const MIN_ATT_INDEX: i32 = 0;

/// Fractional bits of the envelope counter `Ecnt` below the `ENV_TAB` index.
pub const ENV_LBITS: u32 = 16;
/// Envelope counter value at the start of the attack phase.
pub const ENV_ATTACK: i32 = 0;
/// Envelope counter value at the attack/decay boundary.
pub const ENV_DECAY: i32 = ENV_LENGTH << ENV_LBITS;
/// Envelope counter value once fully released (complete silence).
pub const ENV_END: i32 = (ENV_LENGTH * 2) << ENV_LBITS;

/// Attenuation index beyond which the total-level table rounds to zero output.
pub const PG_CUT_OFF: i32 = (13 * ENV_LENGTH) / 4;
/// Number of entries in `TL_TAB`'s positive half.
///
/// Sized comfortably past `PG_CUT_OFF` plus the largest possible combined
/// total-level/envelope/LFO attenuation, so that `sin_tab[phase] + att`
/// never spills past the boundary into the negative mirror half.
pub const TL_LENGTH: usize = 8192;
/// Peak linear output amplitude of a single operator, pre-mixing, at the
/// internal scale the sine/envelope tables are built at:
/// `(1 << (SIN_HBITS + SIN_LBITS + 2)) - 1`. Channel mixing (`channel::
/// OUT_SHIFT`) shifts this back down to final audio sample scale after
/// combining carriers, so that a modulator's magnitude is large enough to
/// meaningfully perturb another operator's sine-table index — at final
/// audio scale (2^13-ish) it's too small to ever move the 12-bit index.
pub const MAX_OUT: f64 = ((1u64 << (SIN_HBITS + SIN_LBITS + 2)) - 1) as f64;

const DT_DEF_TAB: [[u32; 32]; 4] = [
    [
        0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 5, 5, 6, 6,
        7, 8,
    ],
    [
        1, 1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 3, 3, 3, 3, 3, 4, 4, 4, 5, 5, 5, 6, 6, 7, 8, 8,
        9, 10,
    ],
    [
        2, 2, 2, 2, 2, 2, 2, 3, 3, 3, 3, 3, 3, 3, 4, 4, 4, 4, 4, 5, 5, 6, 6, 7, 7, 8, 9, 9, 10, 11,
        12, 13,
    ],
    [
        3, 3, 3, 3, 3, 3, 3, 4, 4, 4, 4, 4, 4, 4, 5, 5, 5, 5, 5, 6, 6, 7, 8, 8, 9, 10, 11, 12, 13,
        14, 16, 16,
    ],
];

/// Maps the top 4 bits of `FNUM` to the low 2 bits of the key code `KC`.
const FKEY_TAB: [u8; 16] = [0, 0, 0, 0, 0, 0, 0, 1, 2, 3, 3, 3, 3, 3, 3, 3];

const AR_RATE: f64 = 399_128.0;
const DR_RATE: f64 = 5_514_396.0;
const RATE_TAB_LEN: usize = 96;

/// Chip-independent lookup tables, shared read-only across all chip instances.
pub struct StaticTables {
    /// Linearized total-level / sine amplitude table. Positive half at
    /// `[0, TL_LENGTH)`, its exact negation mirrored at `[TL_LENGTH, 2*TL_LENGTH)`.
    pub tl_tab: Vec<i32>,
    /// Maps a quantized phase index to a base offset into `tl_tab`.
    pub sin_tab: Vec<usize>,
    /// Envelope curve: attack shape in `[0, ENV_LENGTH)`, linear decay/release
    /// ramp in `[ENV_LENGTH, 2*ENV_LENGTH)`, one silent sentinel past that.
    pub env_tab: Vec<i32>,
    /// Inverse of the attack half of `env_tab`: smallest attack-phase index
    /// whose curve value has decayed to at or below a given attenuation.
    pub decay_to_attack: Vec<i32>,
    /// Sustain-level register value (0..15) to envelope-counter threshold.
    pub sl_tab: [i32; 16],
    /// `FNUM >> 7` (0..15) to key-code low bits (0..3).
    pub fkey_tab: [u8; 16],
}

fn build_static_tables() -> StaticTables {
    let mut tl_tab = vec![0i32; TL_LENGTH * 2];
    for i in 0..TL_LENGTH {
        let val = if i as i32 >= PG_CUT_OFF {
            0
        } else {
            (MAX_OUT / 10f64.powf(ENV_STEP * i as f64 / 20.0)) as i32
        };
        tl_tab[i] = val;
        tl_tab[TL_LENGTH + i] = -val;
    }

    let sin_len = 1usize << SIN_HBITS;
    let mut sin_tab = vec![0usize; sin_len];
    for (i, slot) in sin_tab.iter_mut().enumerate() {
        let phase = (i as f64 + 0.5) * std::f64::consts::TAU / sin_len as f64;
        let s = phase.sin();
        let mag = s.abs().max(1e-9);
        let pg = ((-20.0 * mag.log10()) / ENV_STEP).round() as i32;
        let pg = pg.clamp(0, PG_CUT_OFF - 1);
        *slot = if s >= 0.0 {
            pg as usize
        } else {
            (TL_LENGTH as i32 + pg) as usize
        };
    }

    let mut env_tab = vec![0i32; (ENV_LENGTH as usize) * 2 + 1];
    let l = ENV_LENGTH as f64;
    for i in 0..ENV_LENGTH as usize {
        let x = (l - 1.0 - i as f64) / l;
        env_tab[i] = (x.powi(8) * l) as i32;
    }
    for i in 0..ENV_LENGTH as usize {
        env_tab[ENV_LENGTH as usize + i] = i as i32;
    }
    env_tab[(ENV_LENGTH as usize) * 2] = MAX_ATT_INDEX;

    // Largest attack-phase index `j` whose curve value is still `>= att`
    // (not the smallest index `<= att` — within a run of equal quantized
    // `env_tab` values those pick opposite ends of the run, shifting the
    // key-on attack-reseed point).
    let mut decay_to_attack = vec![0i32; (MAX_ATT_INDEX + 1) as usize];
    for (att, slot) in decay_to_attack.iter_mut().enumerate() {
        let att = att as i32;
        let mut j = ENV_LENGTH - 1;
        while j > 0 && env_tab[j as usize] < att {
            j -= 1;
        }
        *slot = j;
    }

    let mut sl_tab = [0i32; 16];
    for (i, slot) in sl_tab.iter_mut().enumerate().take(15) {
        let db = i as f64 * 3.0;
        *slot = (((db / ENV_STEP) as i32) << ENV_LBITS) + ENV_DECAY;
    }
    sl_tab[15] = MAX_ATT_INDEX << ENV_LBITS;

    StaticTables {
        tl_tab,
        sin_tab,
        env_tab,
        decay_to_attack,
        sl_tab,
        fkey_tab: FKEY_TAB,
    }
}

/// Returns the process-wide shared chip-independent tables, building them
/// on first use.
pub fn static_tables() -> &'static StaticTables {
    static TABLES: OnceLock<StaticTables> = OnceLock::new();
    TABLES.get_or_init(build_static_tables)
}

/// Clock-dependent lookup tables, owned by a single chip instance.
pub struct RateTables {
    /// Attack-rate step table, indexed by combined rate/key-scale (0..96).
    pub ar_tab: [i32; RATE_TAB_LEN],
    /// Decay-rate step table (also used for sustain and release rates),
    /// indexed by combined rate/key-scale (0..96).
    pub dr_tab: [i32; RATE_TAB_LEN],
    /// Detune rows 0..3 as specified; rows 4..7 are their negation.
    pub dt_tab: [[i32; 32]; 8],
    /// Base phase increment per `FNUM` value (0..2047).
    pub finc_tab: Vec<u32>,
}

impl RateTables {
    /// Builds the clock-dependent tables for a chip whose `Frequence`
    /// (cycles-per-sample divided by 144) has the given value.
    pub fn new(frequence: f64) -> Self {
        let mut ar_tab = [0i32; RATE_TAB_LEN];
        let mut dr_tab = [0i32; RATE_TAB_LEN];
        for i in 4..64usize {
            let base = frequence
                * (1.0 + 0.25 * (i as f64 % 4.0))
                * 2f64.powi((i as i32) >> 2)
                * ENV_LENGTH as f64
                * 2f64.powi(ENV_LBITS as i32);
            ar_tab[i] = (base / AR_RATE) as i32;
            dr_tab[i] = (base / DR_RATE) as i32;
        }
        for i in 64..RATE_TAB_LEN {
            ar_tab[i] = ar_tab[63];
            dr_tab[i] = dr_tab[63];
        }

        let mut dt_tab = [[0i32; 32]; 8];
        for row in 0..4 {
            for col in 0..32 {
                dt_tab[row][col] = (DT_DEF_TAB[row][col] as f64 * frequence) as i32;
            }
        }
        for row in 0..4 {
            for col in 0..32 {
                dt_tab[row + 4][col] = -dt_tab[row][col];
            }
        }

        let finc_tab = (0..2048u32)
            .map(|i| (i as f64 * frequence / 2.0) as u32)
            .collect();

        RateTables {
            ar_tab,
            dr_tab,
            dt_tab,
            finc_tab,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn tl_tab_is_antisymmetric() {
        let tables = static_tables();
        for i in 0..TL_LENGTH {
            assert_eq!(tables.tl_tab[i] + tables.tl_tab[TL_LENGTH + i], 0);
        }
    }

    #[test]
    fn env_tab_attack_half_is_monotonically_decreasing() {
        let tables = static_tables();
        for i in 1..ENV_LENGTH as usize {
            assert!(tables.env_tab[i] <= tables.env_tab[i - 1]);
        }
    }

    #[test]
    fn env_tab_decay_half_is_monotonically_increasing() {
        let tables = static_tables();
        let base = ENV_LENGTH as usize;
        for i in 1..ENV_LENGTH as usize {
            assert!(tables.env_tab[base + i] >= tables.env_tab[base + i - 1]);
        }
    }

    #[test]
    fn sl_tab_terminal_entry_is_silent() {
        let tables = static_tables();
        assert_eq!(tables.sl_tab[15], MAX_ATT_INDEX << ENV_LBITS);
    }

    #[test]
    fn rate_tables_clamp_beyond_63() {
        let rates = RateTables::new(1.0);
        assert_eq!(rates.ar_tab[80], rates.ar_tab[63]);
        assert_eq!(rates.dr_tab[95], rates.dr_tab[63]);
    }

    #[test]
    fn detune_negative_rows_mirror_positive_rows() {
        let rates = RateTables::new(3.0);
        for row in 0..4 {
            for col in 0..32 {
                assert_eq!(rates.dt_tab[row + 4][col], -rates.dt_tab[row][col]);
            }
        }
    }

    #[test]
    fn finc_tab_is_linear_in_fnum() {
        let rates = RateTables::new(2.0);
        assert_relative_eq!(rates.finc_tab[100] as f64, 100.0 * 2.0 / 2.0, max_relative = 1e-9);
    }
}

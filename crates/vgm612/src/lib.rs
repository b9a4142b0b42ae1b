//! Cycle-accurate emulation of the Sega Mega Drive / Genesis audio
//! subsystem: a YM2612 FM synthesizer and an SN76489 PSG, driven by a VGM
//! register-write log and rendered to interleaved s16LE stereo PCM.
//!
//! ```no_run
//! use vgm612::render::Renderer;
//!
//! # fn main() -> vgm612::Result<()> {
//! let data = std::fs::read("song.vgm")?;
//! let mut renderer = Renderer::from_vgm(&data)?;
//! let mut pcm = Vec::new();
//! renderer.render_to_end(&mut pcm)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod error;
pub mod render;
pub mod sn76489;
pub mod vgm;
pub mod ym2612;

#[cfg(feature = "export-wav")]
pub mod export;

pub use error::{EngineError, Result};

/// Host output sample rate, in Hz. Fixed per the external interface contract.
pub const SAMPLE_RATE: u32 = 44_100;

/// Default PSG clock used when a VGM header declares a zero clock.
pub const DEFAULT_PSG_CLOCK: u32 = 3_579_545;

/// Default YM2612 clock used when a VGM header declares a zero clock.
pub const DEFAULT_FM_CLOCK: u32 = 7_670_453;

/// Maximum number of samples rendered by a single chip `update` call.
///
/// The render loop chunks longer waits into pieces no larger than this so
/// that stack-allocated scratch buffers stay small and bounded.
pub const MAX_UPDATE_LENGTH: usize = 512;

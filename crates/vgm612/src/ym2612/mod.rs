//! YM2612 FM synthesizer emulation: operators, channels, and the chip
//! that wires them together behind the OPN register bus.

pub mod channel;
pub mod chip;
pub mod operator;
pub mod tables;

pub use chip::Ym2612;

//! Optional PCM-to-WAV export, built on top of the raw [`crate::render`]
//! sink interface. Gated behind the `export-wav` feature (on by default).

pub mod wav;

pub use wav::render_to_wav_file;

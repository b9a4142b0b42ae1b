//! Crate-wide error type.

use thiserror::Error;

/// Errors surfaced at the crate boundary.
///
/// The chip emulation core itself cannot fail once a chip has been
/// constructed — malformed input is either a header problem (fatal) or a
/// stream-decoding recoverable condition (logged and skipped), never a
/// panic or an `Err` from `update`.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The VGM header is missing its magic bytes, or the file is shorter
    /// than the declared data offset.
    #[error("malformed VGM header: {0}")]
    MalformedHeader(String),

    /// A command's operands run past the end of the buffer.
    #[error("truncated VGM stream at offset {offset}")]
    TruncatedStream {
        /// Byte offset of the command whose operands were truncated.
        offset: usize,
    },

    /// I/O failure writing the rendered PCM to a sink (WAV file, raw file).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, EngineError>;

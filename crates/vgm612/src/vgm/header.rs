//! VGM file header parsing.

use crate::error::EngineError;
use crate::{DEFAULT_FM_CLOCK, DEFAULT_PSG_CLOCK, Result};

const MAGIC: &[u8; 4] = b"Vgm ";
const MIN_HEADER_LEN: usize = 0x40;

/// The handful of VGM header fields this engine cares about: the two chip
/// clocks and where the command stream begins. GD3 metadata, loop points,
/// and every other header field are out of scope per the engine's
/// non-goals and are not parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// VGM format version, as packed BCD (e.g. `0x150` for v1.50).
    pub version: u32,
    /// SN76489 PSG clock, in Hz. Defaulted when the header declares zero.
    pub psg_clock: u32,
    /// YM2612 clock, in Hz. Defaulted when the header declares zero.
    pub fm_clock: u32,
    /// Byte offset of the first command in the stream.
    pub data_offset: usize,
}

impl Header {
    /// Parses the header at the start of `data`.
    ///
    /// Returns [`EngineError::MalformedHeader`] if the magic bytes are
    /// missing or the buffer is shorter than the fixed-size header region,
    /// per section 7's "malformed header is fatal" rule.
    pub fn parse(data: &[u8]) -> Result<Header> {
        if data.len() < MIN_HEADER_LEN {
            return Err(EngineError::MalformedHeader(format!(
                "file is {} bytes, shorter than the {MIN_HEADER_LEN}-byte header",
                data.len()
            )));
        }
        if &data[0x00..0x04] != MAGIC {
            return Err(EngineError::MalformedHeader(
                "missing \"Vgm \" magic".to_string(),
            ));
        }

        let version = read_u32(data, 0x08);

        let mut psg_clock = read_u32(data, 0x0C);
        if psg_clock == 0 {
            psg_clock = DEFAULT_PSG_CLOCK;
        }

        let mut fm_clock = read_u32(data, 0x2C);
        if fm_clock == 0 {
            fm_clock = DEFAULT_FM_CLOCK;
        }

        let data_offset = if version >= 0x150 {
            0x34 + read_u32(data, 0x34) as usize
        } else {
            0x40
        };

        if data_offset > data.len() {
            return Err(EngineError::MalformedHeader(format!(
                "declared data offset {data_offset:#x} past end of {}-byte file",
                data.len()
            )));
        }

        Ok(Header {
            version,
            psg_clock,
            fm_clock,
            data_offset,
        })
    }
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(version: u32, psg_clock: u32, fm_clock: u32) -> Vec<u8> {
        let mut buf = vec![0u8; MIN_HEADER_LEN];
        buf[0x00..0x04].copy_from_slice(MAGIC);
        buf[0x08..0x0C].copy_from_slice(&version.to_le_bytes());
        buf[0x0C..0x10].copy_from_slice(&psg_clock.to_le_bytes());
        buf[0x2C..0x30].copy_from_slice(&fm_clock.to_le_bytes());
        buf
    }

    #[test]
    fn missing_magic_is_malformed() {
        let buf = vec![0u8; MIN_HEADER_LEN];
        assert!(matches!(
            Header::parse(&buf),
            Err(EngineError::MalformedHeader(_))
        ));
    }

    #[test]
    fn truncated_file_is_malformed() {
        let buf = vec![0u8; 8];
        assert!(matches!(
            Header::parse(&buf),
            Err(EngineError::MalformedHeader(_))
        ));
    }

    #[test]
    fn zero_clocks_fall_back_to_defaults() {
        let buf = header_bytes(0x150, 0, 0);
        let header = Header::parse(&buf).unwrap();
        assert_eq!(header.psg_clock, DEFAULT_PSG_CLOCK);
        assert_eq!(header.fm_clock, DEFAULT_FM_CLOCK);
    }

    #[test]
    fn pre_150_data_lives_at_0x40() {
        let buf = header_bytes(0x101, 1, 1);
        let header = Header::parse(&buf).unwrap();
        assert_eq!(header.data_offset, 0x40);
    }

    #[test]
    fn post_150_data_offset_is_relative_to_0x34() {
        let mut buf = header_bytes(0x150, 1, 1);
        buf[0x34..0x38].copy_from_slice(&0x0Cu32.to_le_bytes());
        let header = Header::parse(&buf).unwrap();
        assert_eq!(header.data_offset, 0x34 + 0x0C);
    }
}

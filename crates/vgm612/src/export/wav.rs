//! WAV file export, via `hound`.

use std::io;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::error::EngineError;
use crate::render::{ClockOverrides, Renderer, Sink};
use crate::{Result, SAMPLE_RATE};

fn hound_err(e: hound::Error) -> EngineError {
    match e {
        hound::Error::IoError(io_err) => EngineError::Io(io_err),
        other => EngineError::Io(io::Error::other(other.to_string())),
    }
}

/// A [`Sink`] that streams rendered samples straight into a `hound` WAV
/// writer, avoiding the need to buffer the whole song in memory first.
struct WavSink(WavWriter<io::BufWriter<std::fs::File>>);

impl Sink for WavSink {
    fn emit(&mut self, left: i16, right: i16) -> Result<()> {
        self.0.write_sample(left).map_err(hound_err)?;
        self.0.write_sample(right).map_err(hound_err)?;
        Ok(())
    }
}

/// Renders a VGM byte buffer straight to a 16-bit stereo WAV file at
/// [`SAMPLE_RATE`].
pub fn render_to_wav_file(
    data: &[u8],
    path: impl AsRef<Path>,
    overrides: ClockOverrides,
) -> Result<()> {
    let spec = WavSpec {
        channels: 2,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let writer = WavWriter::create(path, spec).map_err(hound_err)?;
    let mut sink = WavSink(writer);

    let mut renderer = Renderer::from_vgm_with_overrides(data, overrides)?;
    renderer.render_to_end(&mut sink)?;

    sink.0.finalize().map_err(hound_err)?;
    Ok(())
}

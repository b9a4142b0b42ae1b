//! The render loop: drives the VGM interpreter, pulls PCM from both chips,
//! mixes, clips, and hands finished stereo samples to a [`Sink`].

use crate::sn76489::Sn76489;
use crate::vgm::{Header, Interpreter, Step};
use crate::ym2612::Ym2612;
use crate::{Result, MAX_UPDATE_LENGTH, SAMPLE_RATE};

/// A destination for rendered stereo s16 samples.
///
/// Implemented for `Vec<i16>` (interleaved `L, R, L, R, …`) and for any
/// [`std::io::Write`] via [`RawPcmWriter`]. The built-in-DAC delivery mode
/// described in the engine's external interface is a thin transform on top
/// of this same trait; see [`to_offset_binary`].
pub trait Sink {
    /// Emits one stereo sample pair, already clipped to `i16` range.
    fn emit(&mut self, left: i16, right: i16) -> Result<()>;
}

impl Sink for Vec<i16> {
    fn emit(&mut self, left: i16, right: i16) -> Result<()> {
        self.push(left);
        self.push(right);
        Ok(())
    }
}

/// Wraps any [`std::io::Write`] as a raw interleaved-s16LE [`Sink`],
/// matching the "Raw file" delivery mode in the external interface spec
/// (`ffplay -f s16le -ar 44100 -ac 2`).
pub struct RawPcmWriter<W>(pub W);

impl<W: std::io::Write> Sink for RawPcmWriter<W> {
    fn emit(&mut self, left: i16, right: i16) -> Result<()> {
        self.0.write_all(&left.to_le_bytes())?;
        self.0.write_all(&right.to_le_bytes())?;
        Ok(())
    }
}

/// Converts a two's-complement sample to the unsigned offset-binary
/// encoding expected by the built-in DAC delivery mode. The engine itself
/// never calls this — it's exposed for a host-side I²S sink, which is an
/// external collaborator per section 1's scope.
pub fn to_offset_binary(sample: i16) -> u16 {
    (sample as u16) ^ 0x8000
}

/// Drives the VGM interpreter and the two chip emulators to produce
/// interleaved stereo PCM at [`SAMPLE_RATE`].
pub struct Renderer {
    data: Vec<u8>,
    interp: Interpreter,
    ym2612: Ym2612,
    sn76489: Sn76489,
    left: [i32; MAX_UPDATE_LENGTH],
    right: [i32; MAX_UPDATE_LENGTH],
}

/// Clock overrides applied when a VGM header declares a zero clock and the
/// caller wants something other than the engine's documented default.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClockOverrides {
    /// Overrides [`crate::DEFAULT_PSG_CLOCK`] when set.
    pub psg_clock: Option<u32>,
    /// Overrides [`crate::DEFAULT_FM_CLOCK`] when set.
    pub fm_clock: Option<u32>,
}

impl Renderer {
    /// Parses `data` as a VGM file and builds a renderer ready to play it
    /// from the first command, using the header's declared clocks (or the
    /// engine's documented defaults when a clock is zero).
    pub fn from_vgm(data: &[u8]) -> Result<Renderer> {
        Renderer::from_vgm_with_overrides(data, ClockOverrides::default())
    }

    /// As [`Renderer::from_vgm`], but lets the caller replace a
    /// header-declared zero clock with something other than the built-in
    /// default (see `SPEC_FULL.md` section 0.4).
    pub fn from_vgm_with_overrides(data: &[u8], overrides: ClockOverrides) -> Result<Renderer> {
        let header = Header::parse(data)?;
        let psg_clock = overrides.psg_clock.unwrap_or(header.psg_clock);
        let fm_clock = overrides.fm_clock.unwrap_or(header.fm_clock);
        log::debug!(
            "vgm: v{:x}, data @ {:#x}, psg={psg_clock}Hz, fm={fm_clock}Hz",
            header.version,
            header.data_offset
        );
        Ok(Renderer {
            data: data.to_vec(),
            interp: Interpreter::new(header.data_offset),
            ym2612: Ym2612::new(fm_clock, SAMPLE_RATE),
            sn76489: Sn76489::new(psg_clock, SAMPLE_RATE),
            left: [0; MAX_UPDATE_LENGTH],
            right: [0; MAX_UPDATE_LENGTH],
        })
    }

    /// Runs the command stream to completion, emitting every rendered
    /// sample to `sink`.
    pub fn render_to_end<S: Sink>(&mut self, sink: &mut S) -> Result<()> {
        loop {
            match self.interp.step(&self.data, &mut self.sn76489, &mut self.ym2612)? {
                Step::Wait(n) => self.render_and_emit(n as usize, sink)?,
                Step::End => return Ok(()),
            }
        }
    }

    /// Convenience wrapper that renders straight into an owned interleaved
    /// `Vec<i16>`.
    pub fn render_to_vec(&mut self) -> Result<Vec<i16>> {
        let mut out = Vec::new();
        self.render_to_end(&mut out)?;
        Ok(out)
    }

    /// Renders exactly `n` samples, in chunks of at most
    /// [`MAX_UPDATE_LENGTH`], per section 4.11.
    fn render_and_emit<S: Sink>(&mut self, mut n: usize, sink: &mut S) -> Result<()> {
        while n > 0 {
            let chunk = n.min(MAX_UPDATE_LENGTH);
            let left = &mut self.left[..chunk];
            let right = &mut self.right[..chunk];
            left.fill(0);
            right.fill(0);

            self.sn76489.update(left, right, chunk);
            self.ym2612.update(left, right, chunk);
            self.ym2612.dac_and_timers_update(left, right, chunk);

            for i in 0..chunk {
                let l = left[i].clamp(-0x7FFF, 0x7FFF) as i16;
                let r = right[i].clamp(-0x7FFF, 0x7FFF) as i16;
                sink.emit(l, r)?;
            }
            log::debug!("render: emitted chunk of {chunk} samples");
            n -= chunk;
        }
        Ok(())
    }
}

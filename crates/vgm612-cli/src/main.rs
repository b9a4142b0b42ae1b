//! `vgm612-play`: a thin command-line front end over the `vgm612` engine.
//!
//! Reads a VGM file, renders it through the YM2612/SN76489 emulation core,
//! and writes the result as WAV (default) or headerless raw PCM. Not a
//! player application — flags exist only to pick the output container and
//! override zero-clock headers, per `SPEC_FULL.md` section 0.4/0.7.

mod args;

use std::fs::File;
use std::io::BufWriter;
use std::process::ExitCode;

use anyhow::Context;

use args::{CliArgs, OutputFormat};
use vgm612::render::{ClockOverrides, RawPcmWriter, Renderer};

fn main() -> ExitCode {
    env_logger::init();

    let args = match CliArgs::parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("vgm612-play: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &CliArgs) -> anyhow::Result<()> {
    let data = std::fs::read(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;

    let overrides = ClockOverrides {
        psg_clock: args.psg_clock,
        fm_clock: args.fm_clock,
    };

    let output_path = args.output.clone().unwrap_or_else(|| {
        let mut path = args.input.clone();
        path.set_extension(match args.format {
            OutputFormat::Wav => "wav",
            OutputFormat::Raw => "pcm",
        });
        path
    });

    if args.play {
        play_live(&data, overrides)?;
    }

    match args.format {
        OutputFormat::Wav => {
            vgm612::export::render_to_wav_file(&data, &output_path, overrides)?;
        }
        OutputFormat::Raw => {
            let file = File::create(&output_path)
                .with_context(|| format!("creating {}", output_path.display()))?;
            let mut sink = RawPcmWriter(BufWriter::new(file));
            let mut renderer = Renderer::from_vgm_with_overrides(&data, overrides)?;
            renderer.render_to_end(&mut sink)?;
        }
    }

    log::info!("wrote {}", output_path.display());
    Ok(())
}

#[cfg(feature = "play")]
fn play_live(data: &[u8], overrides: ClockOverrides) -> anyhow::Result<()> {
    use rodio::{OutputStream, Sink as RodioSink, buffer::SamplesBuffer};

    let mut renderer = Renderer::from_vgm_with_overrides(data, overrides)?;
    let samples = renderer.render_to_vec()?;

    let (_stream, handle) =
        OutputStream::try_default().context("opening default audio output device")?;
    let sink = RodioSink::try_new(&handle).context("creating playback sink")?;
    sink.append(SamplesBuffer::new(2, vgm612::SAMPLE_RATE, samples));
    sink.sleep_until_end();
    Ok(())
}

#[cfg(not(feature = "play"))]
fn play_live(_data: &[u8], _overrides: ClockOverrides) -> anyhow::Result<()> {
    anyhow::bail!("--play requires building vgm612-cli with the `play` feature enabled")
}

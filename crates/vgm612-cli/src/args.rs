//! Hand-rolled command-line argument parsing for `vgm612-play`.
//!
//! Per the engine's configuration model (section 6: no environment or
//! persistent state), the only configuration surface is this argument set:
//! a positional input path, an optional output path, and optional clock
//! overrides for headers that declare a zero clock.

use std::env;
use std::path::PathBuf;

/// Output container selected for the rendered PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// `.wav` via `hound` (the default).
    Wav,
    /// Headerless interleaved s16LE, playable with
    /// `ffplay -f s16le -ar 44100 -ac 2`.
    Raw,
}

/// Parsed command-line arguments.
#[derive(Debug)]
pub struct CliArgs {
    /// Path to the input VGM file.
    pub input: PathBuf,
    /// Path to write the rendered PCM to. Defaults to the input path with
    /// its extension replaced (`.wav` or `.pcm`).
    pub output: Option<PathBuf>,
    /// Output container.
    pub format: OutputFormat,
    /// Overrides [`vgm612::DEFAULT_PSG_CLOCK`] for zero-clock headers.
    pub psg_clock: Option<u32>,
    /// Overrides [`vgm612::DEFAULT_FM_CLOCK`] for zero-clock headers.
    pub fm_clock: Option<u32>,
    /// Stream the rendered audio live instead of (or in addition to)
    /// writing a file. Only meaningful when built with the `play` feature.
    pub play: bool,
}

/// Error returned for a malformed or incomplete argument list.
#[derive(Debug)]
pub struct ArgsError(pub String);

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ArgsError {}

impl CliArgs {
    /// Parses `std::env::args()`, skipping the program name.
    pub fn parse() -> Result<CliArgs, ArgsError> {
        Self::parse_from(env::args().skip(1))
    }

    /// Parses an arbitrary argument iterator; split out from [`Self::parse`]
    /// so tests don't depend on the real process arguments.
    pub fn parse_from(args: impl Iterator<Item = String>) -> Result<CliArgs, ArgsError> {
        let mut input = None;
        let mut output = None;
        let mut format = OutputFormat::Wav;
        let mut psg_clock = None;
        let mut fm_clock = None;
        let mut play = false;

        let mut iter = args;
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--raw" => format = OutputFormat::Raw,
                "--play" => play = true,
                "-o" | "--output" => {
                    let value = iter
                        .next()
                        .ok_or_else(|| ArgsError(format!("{arg} requires a path argument")))?;
                    output = Some(PathBuf::from(value));
                }
                "--psg-clock" => {
                    psg_clock = Some(parse_clock(&arg, iter.next())?);
                }
                "--fm-clock" => {
                    fm_clock = Some(parse_clock(&arg, iter.next())?);
                }
                "-h" | "--help" => return Err(ArgsError(Self::usage())),
                _ if arg.starts_with('-') => {
                    return Err(ArgsError(format!("unknown flag: {arg}")));
                }
                _ => {
                    if input.is_some() {
                        return Err(ArgsError(format!("unexpected extra argument: {arg}")));
                    }
                    input = Some(PathBuf::from(arg));
                }
            }
        }

        let input = input.ok_or_else(|| ArgsError(Self::usage()))?;
        Ok(CliArgs {
            input,
            output,
            format,
            psg_clock,
            fm_clock,
            play,
        })
    }

    /// Usage text, also used as the `--help`/missing-argument message.
    pub fn usage() -> String {
        "Usage: vgm612-play [options] <input.vgm>\n\n\
         Options:\n\
         \x20 -o, --output <path>   Output path (default: input path with .wav/.pcm)\n\
         \x20 --raw                 Write headerless s16LE PCM instead of WAV\n\
         \x20 --psg-clock <hz>      Override the PSG clock used for a zero-clock header\n\
         \x20 --fm-clock <hz>       Override the FM clock used for a zero-clock header\n\
         \x20 --play                Stream the rendered audio live (requires the `play` feature)\n\
         \x20 -h, --help            Show this help\n"
            .to_string()
    }
}

fn parse_clock(flag: &str, value: Option<String>) -> Result<u32, ArgsError> {
    let value = value.ok_or_else(|| ArgsError(format!("{flag} requires a Hz value")))?;
    value
        .parse::<u32>()
        .map_err(|_| ArgsError(format!("{flag}: not a valid clock in Hz: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Result<CliArgs, ArgsError> {
        CliArgs::parse_from(v.iter().map(|s| s.to_string()))
    }

    #[test]
    fn bare_input_path_defaults_to_wav() {
        let parsed = args(&["song.vgm"]).unwrap();
        assert_eq!(parsed.input, PathBuf::from("song.vgm"));
        assert_eq!(parsed.format, OutputFormat::Wav);
        assert!(parsed.output.is_none());
    }

    #[test]
    fn raw_flag_switches_format() {
        let parsed = args(&["--raw", "song.vgm"]).unwrap();
        assert_eq!(parsed.format, OutputFormat::Raw);
    }

    #[test]
    fn output_flag_sets_explicit_path() {
        let parsed = args(&["song.vgm", "-o", "out.wav"]).unwrap();
        assert_eq!(parsed.output, Some(PathBuf::from("out.wav")));
    }

    #[test]
    fn clock_overrides_parse_as_integers() {
        let parsed = args(&["--psg-clock", "3579545", "--fm-clock", "7670453", "s.vgm"]).unwrap();
        assert_eq!(parsed.psg_clock, Some(3_579_545));
        assert_eq!(parsed.fm_clock, Some(7_670_453));
    }

    #[test]
    fn missing_input_is_an_error() {
        assert!(args(&[]).is_err());
    }

    #[test]
    fn unknown_flag_is_an_error() {
        assert!(args(&["--bogus", "song.vgm"]).is_err());
    }

    #[test]
    fn invalid_clock_value_is_an_error() {
        assert!(args(&["--psg-clock", "not-a-number", "song.vgm"]).is_err());
    }
}

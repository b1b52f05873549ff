//! ffmpeg transcode invoker.
//!
//! Builds the ffmpeg command for an [`EncodePlan`] and publishes the result
//! only after the encoder succeeded and the output passed the validity probe.

use crate::codec::EncodePlan;
use crate::probe::MediaProbe;
use crate::relocate::{ensure_parent_dir, partial_path, RelocateError};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, warn};

/// Trailing stderr lines kept in error messages.
const STDERR_TAIL_LINES: usize = 20;

/// Error type for encoding operations
#[derive(Debug, Error)]
pub enum EncodeError {
    /// ffmpeg exited with non-zero status
    #[error("ffmpeg failed with exit code {code}: {stderr}")]
    Failed { code: i32, stderr: String },

    /// ffmpeg was terminated by signal
    #[error("ffmpeg process was terminated by signal")]
    Terminated,

    /// Encoder reported success but the output holds no decodable video
    #[error("Encoded output failed validation: {0}")]
    OutputInvalid(PathBuf),

    /// Destination appeared while the encode was running
    #[error("Destination already exists: {0}")]
    DestinationExists(PathBuf),

    #[error(transparent)]
    Relocate(#[from] RelocateError),

    /// IO error during encoding
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Runs an encode plan. Implementations write exactly to `output`.
pub trait Transcoder: Send + Sync {
    fn transcode(&self, source: &Path, plan: &EncodePlan, output: &Path) -> Result<(), EncodeError>;
}

/// [`Transcoder`] backed by the `ffmpeg` binary.
#[derive(Debug, Clone, Default)]
pub struct FfmpegTranscoder;

/// Build the ffmpeg command for one encode.
///
/// `ffmpeg -hide_banner -y [hwaccel] -i <src> -vf <filter> <codec args>
/// <audio args> -f <container> <output>`
///
/// The container is explicit because `output` carries a `.partial` suffix.
pub fn build_ffmpeg_command(source: &Path, plan: &EncodePlan, output: &Path) -> Command {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-hide_banner", "-y"]);
    cmd.args(&plan.hwaccel_args);
    cmd.arg("-i").arg(source);
    cmd.arg("-vf").arg(&plan.video_filter);
    cmd.args(&plan.codec_args);
    cmd.args(plan.audio.ffmpeg_args());
    cmd.arg("-f").arg(plan.container_format());
    cmd.arg(output);
    cmd
}

impl Transcoder for FfmpegTranscoder {
    fn transcode(&self, source: &Path, plan: &EncodePlan, output: &Path) -> Result<(), EncodeError> {
        let mut cmd = build_ffmpeg_command(source, plan, output);
        debug!(command = ?cmd, "running ffmpeg");

        let result = cmd.output()?;

        if result.status.success() {
            return Ok(());
        }

        match result.status.code() {
            Some(code) => Err(EncodeError::Failed {
                code,
                stderr: stderr_tail(&String::from_utf8_lossy(&result.stderr)),
            }),
            None => Err(EncodeError::Terminated),
        }
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.trim().lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Encode `source` to `dest` through a hidden partial file.
///
/// # Returns
///
/// Size in bytes of the published proxy.
///
/// # Errors
///
/// Any failure removes the partial output and leaves `dest` untouched.
pub fn encode_to(
    transcoder: &dyn Transcoder,
    probe: &dyn MediaProbe,
    source: &Path,
    plan: &EncodePlan,
    dest: &Path,
) -> Result<u64, EncodeError> {
    ensure_parent_dir(dest)?;
    let partial = partial_path(dest)?;

    let result = encode_and_publish(transcoder, probe, source, plan, &partial, dest);
    if result.is_err() && partial.exists() {
        if let Err(e) = fs::remove_file(&partial) {
            warn!(partial = %partial.display(), error = %e, "failed to remove partial encode");
        }
    }
    result
}

fn encode_and_publish(
    transcoder: &dyn Transcoder,
    probe: &dyn MediaProbe,
    source: &Path,
    plan: &EncodePlan,
    partial: &Path,
    dest: &Path,
) -> Result<u64, EncodeError> {
    transcoder.transcode(source, plan, partial)?;

    if !probe.is_valid_proxy(partial) {
        return Err(EncodeError::OutputInvalid(dest.to_path_buf()));
    }
    if dest.exists() {
        return Err(EncodeError::DestinationExists(dest.to_path_buf()));
    }

    fs::rename(partial, dest)?;
    Ok(fs::metadata(dest)?.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Accelerator, CodecEngine};
    use crate::config::{Codec, ScaleFactor};
    use crate::probe::StreamInfo;
    use crate::source::DeviceClass;
    use crate::test_support::{write_file, FakeProbe, FakeTranscoder};
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn get_command_args(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .filter_map(|arg| arg.to_str().map(String::from))
            .collect()
    }

    fn has_flag_with_value(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|pair| pair[0] == flag && pair[1] == value)
    }

    fn plan(accel: Accelerator, codec: Codec) -> EncodePlan {
        CodecEngine::new(accel, ScaleFactor::Quarter).decide(
            codec,
            &StreamInfo::default(),
            DeviceClass::Standard,
        )
    }

    #[test]
    fn test_command_layout() {
        let plan = plan(Accelerator::Cuda, Codec::H264);
        let cmd = build_ffmpeg_command(
            Path::new("/s/C0001.MP4"),
            &plan,
            Path::new("/p/.C0001_proxy.mp4.partial"),
        );
        let args = get_command_args(&cmd);

        assert_eq!(cmd.get_program(), "ffmpeg");
        assert_eq!(&args[..2], ["-hide_banner", "-y"]);
        assert_eq!(args[2], "-hwaccel");
        let input = args.iter().position(|a| a == "-i").unwrap();
        let hwaccel = args.iter().position(|a| a == "-hwaccel").unwrap();
        assert!(hwaccel < input, "hwaccel flags precede the input");
        assert!(has_flag_with_value(&args, "-vf", "scale_cuda=iw/4:ih/4:format=yuv420p"));
        assert!(has_flag_with_value(&args, "-c:v", "h264_nvenc"));
        assert!(has_flag_with_value(&args, "-f", "mp4"));
        assert!(args.contains(&"-an".to_string()));
        assert_eq!(args.last().unwrap(), "/p/.C0001_proxy.mp4.partial");
    }

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let text: String = (0..50).map(|i| format!("line {}\n", i)).collect();
        let tail = stderr_tail(&text);
        assert!(tail.starts_with("line 30"));
        assert!(tail.ends_with("line 49"));
    }

    #[test]
    fn test_encode_to_publishes_valid_output() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("day1/a.mov");
        let dest = tmp.path().join("proxies/a_proxy.mov");
        write_file(&source, b"VIDEO source");

        let transcoder = FakeTranscoder::default();
        let probe = FakeProbe::default();
        let size = encode_to(&transcoder, &probe, &source, &plan(Accelerator::Software, Codec::ProRes), &dest)
            .unwrap();

        assert!(dest.exists());
        assert_eq!(size, fs::metadata(&dest).unwrap().len());
        assert!(!partial_path(&dest).unwrap().exists());
        assert_eq!(transcoder.calls(), 1);
    }

    #[test]
    fn test_encode_to_failure_removes_partial() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("day1/a.mov");
        let dest = tmp.path().join("proxies/a_proxy.mov");
        write_file(&source, b"VIDEO source");

        let transcoder = FakeTranscoder::failing();
        let err = encode_to(
            &transcoder,
            &FakeProbe::default(),
            &source,
            &plan(Accelerator::Software, Codec::ProRes),
            &dest,
        )
        .unwrap_err();

        assert!(matches!(err, EncodeError::Failed { code: 1, .. }));
        assert!(!dest.exists());
        assert!(!partial_path(&dest).unwrap().exists());
    }

    #[test]
    fn test_encode_to_rejects_truncated_output() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("day1/a.mov");
        let dest = tmp.path().join("proxies/a_proxy.mov");
        write_file(&source, b"VIDEO source");

        let transcoder = FakeTranscoder::writing(b"truncated");
        let err = encode_to(
            &transcoder,
            &FakeProbe::default(),
            &source,
            &plan(Accelerator::Software, Codec::ProRes),
            &dest,
        )
        .unwrap_err();

        assert!(matches!(err, EncodeError::OutputInvalid(_)));
        assert!(!dest.exists());
        assert!(!partial_path(&dest).unwrap().exists());
    }

    fn path_strategy() -> impl Strategy<Value = String> {
        prop::string::string_regex("/[a-zA-Z0-9_]{1,20}/[a-zA-Z0-9_.]{1,20}")
            .unwrap()
    }

    // Every plan produces a command that names the source, the output, an
    // explicit container and exactly one audio directive.
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_ffmpeg_command_completeness(
            source in path_strategy(),
            output in path_strategy(),
            codec in prop::sample::select(Codec::ALL.to_vec()),
            accel in prop::sample::select(vec![
                Accelerator::VideoToolbox,
                Accelerator::Cuda,
                Accelerator::Qsv,
                Accelerator::Software,
            ]),
        ) {
            let plan = plan(accel, codec);
            let cmd = build_ffmpeg_command(Path::new(&source), &plan, Path::new(&output));
            let args = get_command_args(&cmd);

            prop_assert!(has_flag_with_value(&args, "-i", &source));
            prop_assert!(has_flag_with_value(&args, "-f", plan.output_extension));
            prop_assert!(has_flag_with_value(&args, "-c:v", plan.encoder));
            prop_assert_eq!(args.last().unwrap(), &output);
            let audio = args.iter().filter(|a| *a == "-an" || *a == "-c:a").count();
            prop_assert_eq!(audio, 1);
        }
    }
}

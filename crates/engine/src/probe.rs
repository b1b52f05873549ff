//! Metadata probe adapter.
//!
//! Wraps ffprobe (stream properties) and exiftool (device tags) behind the
//! [`MediaProbe`] trait so the resolver and codec engine can be exercised
//! without the external tools installed.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;
use thiserror::Error;
use tracing::debug;

/// Error type for probe operations.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Probe tool exited unsuccessfully.
    #[error("{tool} failed: {message}")]
    ToolFailed { tool: &'static str, message: String },

    /// Failed to parse probe output.
    #[error("Failed to parse probe output: {0}")]
    ParseError(String),

    /// IO error during probe.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// First video stream of a file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VideoStreamInfo {
    /// Codec name (e.g. "hevc", "h264", "prores").
    pub codec_name: String,
    /// Codec profile (e.g. "Main 10").
    pub profile: Option<String>,
    /// Pixel format (e.g. "yuv420p10le").
    pub pix_fmt: Option<String>,
    pub width: u32,
    pub height: u32,
}

impl VideoStreamInfo {
    /// True for HEVC streams carrying 10-bit samples.
    pub fn is_ten_bit_hevc(&self) -> bool {
        if !self.codec_name.eq_ignore_ascii_case("hevc") {
            return false;
        }
        let pix_ten = self
            .pix_fmt
            .as_deref()
            .map(|f| f.contains("10"))
            .unwrap_or(false);
        let profile_ten = self
            .profile
            .as_deref()
            .map(|p| p.contains("10"))
            .unwrap_or(false);
        pix_ten || profile_ten
    }
}

/// First audio stream of a file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AudioStreamInfo {
    /// Codec name (e.g. "aac", "pcm_s16le").
    pub codec_name: String,
    /// Bit rate in bits per second, when ffprobe reports one.
    pub bit_rate: Option<u64>,
    pub sample_rate: Option<u32>,
}

/// Stream-level attributes of a media file.
///
/// `StreamInfo::default()` is the "unknown" value used when probing fails:
/// no audio, unknown video format.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StreamInfo {
    pub video: Option<VideoStreamInfo>,
    pub audio: Option<AudioStreamInfo>,
    /// Number of video streams found.
    pub video_stream_count: usize,
}

impl StreamInfo {
    pub fn has_video(&self) -> bool {
        self.video_stream_count > 0
    }
}

/// Embedded device tags read from a file's metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceTags {
    /// Tag names present in the file metadata.
    pub tag_names: Vec<String>,
}

impl DeviceTags {
    /// Footage written by an Android phone carries an `AndroidVersion` tag.
    pub fn is_consumer_device(&self) -> bool {
        self.tag_names.iter().any(|t| t == "AndroidVersion")
    }
}

/// Query interface over the external media-inspection tools.
pub trait MediaProbe: Send + Sync {
    /// Probe stream properties of `path`.
    fn probe_streams(&self, path: &Path) -> Result<StreamInfo, ProbeError>;

    /// Read embedded device metadata of `path`.
    fn probe_device_tags(&self, path: &Path) -> Result<DeviceTags, ProbeError>;

    /// A proxy is valid when it holds at least one decodable video stream.
    ///
    /// Probe failures count as invalid.
    fn is_valid_proxy(&self, path: &Path) -> bool {
        match self.probe_streams(path) {
            Ok(info) => {
                debug!(path = %path.display(), video_streams = info.video_stream_count, "validated proxy candidate");
                info.has_video()
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "proxy candidate failed validation");
                false
            }
        }
    }
}

/// Raw ffprobe JSON structures for parsing.
mod ffprobe_json {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct FfprobeOutput {
        pub streams: Option<Vec<Stream>>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Stream {
        pub codec_type: Option<String>,
        pub codec_name: Option<String>,
        pub profile: Option<String>,
        pub pix_fmt: Option<String>,
        pub width: Option<u32>,
        pub height: Option<u32>,
        pub bit_rate: Option<String>,
        pub sample_rate: Option<String>,
    }
}

/// [`MediaProbe`] backed by the `ffprobe` and `exiftool` binaries.
#[derive(Debug, Clone, Default)]
pub struct FfprobeProbe;

impl MediaProbe for FfprobeProbe {
    /// Runs `ffprobe -v error -show_streams -of json <path>`.
    fn probe_streams(&self, path: &Path) -> Result<StreamInfo, ProbeError> {
        let output = Command::new("ffprobe")
            .args(["-v", "error", "-show_streams", "-of", "json"])
            .arg(path)
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProbeError::ToolFailed {
                tool: "ffprobe",
                message: format!("exited with status {}: {}", output.status, stderr.trim()),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_ffprobe_output(&stdout)
    }

    /// Runs `exiftool -json <path>`.
    fn probe_device_tags(&self, path: &Path) -> Result<DeviceTags, ProbeError> {
        let output = Command::new("exiftool").arg("-json").arg(path).output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProbeError::ToolFailed {
                tool: "exiftool",
                message: format!("exited with status {}: {}", output.status, stderr.trim()),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_exiftool_output(&stdout)
    }
}

/// Parses ffprobe JSON output into a StreamInfo.
///
/// Only the first video and first audio stream are kept.
pub fn parse_ffprobe_output(json_str: &str) -> Result<StreamInfo, ProbeError> {
    let ffprobe: ffprobe_json::FfprobeOutput =
        serde_json::from_str(json_str).map_err(|e| ProbeError::ParseError(e.to_string()))?;

    let mut info = StreamInfo::default();

    for stream in ffprobe.streams.unwrap_or_default() {
        match stream.codec_type.as_deref().unwrap_or("") {
            "video" => {
                info.video_stream_count += 1;
                if info.video.is_none() {
                    info.video = Some(VideoStreamInfo {
                        codec_name: stream.codec_name.unwrap_or_default(),
                        profile: stream.profile,
                        pix_fmt: stream.pix_fmt,
                        width: stream.width.unwrap_or(0),
                        height: stream.height.unwrap_or(0),
                    });
                }
            }
            "audio" if info.audio.is_none() => {
                info.audio = Some(AudioStreamInfo {
                    codec_name: stream.codec_name.unwrap_or_else(|| "unknown".to_string()),
                    bit_rate: stream.bit_rate.as_deref().and_then(|b| b.parse().ok()),
                    sample_rate: stream.sample_rate.as_deref().and_then(|s| s.parse().ok()),
                });
            }
            _ => {}
        }
    }

    Ok(info)
}

/// Parses `exiftool -json` output (an array with one object per file).
pub fn parse_exiftool_output(json_str: &str) -> Result<DeviceTags, ProbeError> {
    let entries: Vec<serde_json::Map<String, serde_json::Value>> =
        serde_json::from_str(json_str).map_err(|e| ProbeError::ParseError(e.to_string()))?;

    let first = entries
        .into_iter()
        .next()
        .ok_or_else(|| ProbeError::ParseError("exiftool returned no entries".to_string()))?;

    Ok(DeviceTags {
        tag_names: first.keys().cloned().collect(),
    })
}

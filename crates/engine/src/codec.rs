//! Codec decision engine.
//!
//! Turns (requested codec, detected accelerator, probed source streams,
//! device class) into an [`EncodePlan`]. Everything here is pure: probing
//! happens before [`CodecEngine::decide`] is called.

use crate::config::{Codec, ScaleFactor};
use crate::probe::{AudioStreamInfo, StreamInfo};
use crate::source::DeviceClass;
use serde::Serialize;
use std::fmt;

/// Unknown audio codecs above this bit rate (bps) are treated as uncompressed.
pub const REENCODE_BITRATE_THRESHOLD: u64 = 1_000_000;

/// Audio codecs that are already compressed and copied verbatim.
const COMPRESSED_AUDIO: &[&str] = &[
    "aac", "mp3", "ac3", "eac3", "dts", "truehd", "flac", "vorbis", "opus",
];

/// Uncompressed audio codecs that are always re-encoded.
const UNCOMPRESSED_AUDIO: &[&str] = &[
    "pcm_s16be", "pcm_s16le", "pcm_s24be", "pcm_s24le", "pcm_s32be", "pcm_s32le", "pcm_f32be",
    "pcm_f32le", "pcm_f64be", "pcm_f64le",
];

/// Codec every fallback and device override lands on.
pub const BASELINE_CODEC: Codec = Codec::H264;

/// Hardware accelerator used for decode, scaling and encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Accelerator {
    VideoToolbox,
    Cuda,
    Qsv,
    Software,
}

impl Accelerator {
    /// Name passed to `ffmpeg -hwaccel`.
    pub fn hwaccel_name(&self) -> Option<&'static str> {
        match self {
            Accelerator::VideoToolbox => Some("videotoolbox"),
            Accelerator::Cuda => Some("cuda"),
            Accelerator::Qsv => Some("qsv"),
            Accelerator::Software => None,
        }
    }

    /// Parse an accelerator from the name ffmpeg lists under `-hwaccels`.
    pub fn from_hwaccel_name(name: &str) -> Option<Self> {
        match name.trim() {
            "videotoolbox" => Some(Accelerator::VideoToolbox),
            "cuda" => Some(Accelerator::Cuda),
            "qsv" => Some(Accelerator::Qsv),
            _ => None,
        }
    }

    /// Accelerators backed by a discrete GPU with its own frame memory.
    pub fn is_gpu_backed(&self) -> bool {
        matches!(self, Accelerator::Cuda)
    }

    /// On-device scale filter replacing the CPU `scale` filter.
    pub fn gpu_scale_filter(&self) -> Option<&'static str> {
        match self {
            Accelerator::VideoToolbox => Some("scale_vt"),
            Accelerator::Cuda => Some("scale_cuda"),
            Accelerator::Qsv => Some("scale_qsv"),
            Accelerator::Software => None,
        }
    }

    /// Value for `-hwaccel_output_format` that keeps decoded frames on the device.
    fn device_frame_format(&self) -> Option<&'static str> {
        match self {
            Accelerator::VideoToolbox => Some("videotoolbox_vld"),
            Accelerator::Cuda => Some("cuda"),
            Accelerator::Qsv => Some("qsv"),
            Accelerator::Software => None,
        }
    }

    /// Preferred accelerators for an OS name as reported by `std::env::consts::OS`.
    pub fn platform_preference(os: &str) -> &'static [Accelerator] {
        match os {
            "macos" => &[Accelerator::VideoToolbox],
            "windows" | "linux" => &[Accelerator::Cuda, Accelerator::Qsv],
            _ => &[],
        }
    }
}

impl fmt::Display for Accelerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.hwaccel_name().unwrap_or("software"))
    }
}

/// Pick the first preferred accelerator that ffmpeg declares supported.
///
/// VideoToolbox ships with every macOS ffmpeg build and is taken without a check.
pub fn select_accelerator(preference: &[Accelerator], available: &[Accelerator]) -> Accelerator {
    preference
        .iter()
        .copied()
        .find(|a| *a == Accelerator::VideoToolbox || available.contains(a))
        .unwrap_or(Accelerator::Software)
}

/// Fixed argument template for one (codec, accelerator) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderProfile {
    pub encoder: &'static str,
    pub preset: Option<&'static str>,
    pub profile: Option<&'static str>,
    pub extra_args: &'static [&'static str],
    /// False when the pair fell back to the software template.
    pub hardware: bool,
}

impl EncoderProfile {
    const fn hw(
        encoder: &'static str,
        preset: Option<&'static str>,
        profile: Option<&'static str>,
        extra_args: &'static [&'static str],
    ) -> Self {
        Self {
            encoder,
            preset,
            profile,
            extra_args,
            hardware: true,
        }
    }

    /// `-c:v` plus preset, profile and extra arguments.
    pub fn codec_args(&self) -> Vec<String> {
        let mut args = vec!["-c:v".to_string(), self.encoder.to_string()];
        if let Some(preset) = self.preset {
            args.extend(["-preset".to_string(), preset.to_string()]);
        }
        if let Some(profile) = self.profile {
            args.extend(["-profile:v".to_string(), profile.to_string()]);
        }
        args.extend(self.extra_args.iter().map(|a| a.to_string()));
        args
    }
}

/// Software template; every codec has one.
pub fn software_profile(codec: Codec) -> EncoderProfile {
    let (encoder, preset, profile, extra_args): (_, _, _, &'static [&'static str]) = match codec {
        Codec::H264 => (
            "libx264",
            Some("veryfast"),
            None,
            &[
                "-crf", "23", "-profile:v", "high", "-level:v", "4.1", "-g", "30", "-bf", "2",
                "-refs", "3",
            ],
        ),
        Codec::Hevc => ("libx265", Some("veryfast"), None, &["-crf", "23"]),
        Codec::ProRes => ("prores_ks", None, Some("0"), &[]),
        Codec::DnxHr => ("dnxhd", None, Some("dnxhr_lb"), &[]),
    };
    EncoderProfile {
        encoder,
        preset,
        profile,
        extra_args,
        hardware: false,
    }
}

/// Look up the template for a (codec, accelerator) pair.
///
/// Pairs without a hardware template use [`software_profile`].
pub fn encoder_profile(codec: Codec, accel: Accelerator) -> EncoderProfile {
    use Accelerator::*;
    match (codec, accel) {
        (Codec::H264, VideoToolbox) => {
            EncoderProfile::hw("h264_videotoolbox", None, None, &["-quality", "medium"])
        }
        (Codec::H264, Cuda) => {
            EncoderProfile::hw("h264_nvenc", Some("p4"), None, &["-rc", "constqp", "-qp", "23"])
        }
        (Codec::H264, Qsv) => {
            EncoderProfile::hw("h264_qsv", Some("veryfast"), None, &["-global_quality", "23"])
        }
        (Codec::Hevc, VideoToolbox) => EncoderProfile::hw(
            "hevc_videotoolbox",
            None,
            None,
            &["-tag:v", "hvc1", "-quality", "medium"],
        ),
        (Codec::Hevc, Cuda) => {
            EncoderProfile::hw("hevc_nvenc", Some("p4"), None, &["-rc", "constqp", "-qp", "23"])
        }
        (Codec::Hevc, Qsv) => {
            EncoderProfile::hw("hevc_qsv", Some("veryfast"), None, &["-global_quality", "23"])
        }
        (Codec::ProRes, VideoToolbox) => {
            EncoderProfile::hw("prores_videotoolbox", None, Some("0"), &[])
        }
        (codec, _) => software_profile(codec),
    }
}

/// Container extension for a codec family.
pub fn output_extension(codec: Codec) -> &'static str {
    if codec.is_intermediate() {
        "mov"
    } else {
        "mp4"
    }
}

/// What happens to the source audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioMode {
    /// Stream copy.
    Copy,
    /// Re-encode to AAC 128k.
    Reencode,
    /// Source has no audio.
    Drop,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioDecision {
    pub mode: AudioMode,
    pub reason: String,
}

impl AudioDecision {
    pub fn ffmpeg_args(&self) -> Vec<String> {
        let args: &[&str] = match self.mode {
            AudioMode::Copy => &["-c:a", "copy"],
            AudioMode::Reencode => &["-c:a", "aac", "-b:a", "128k"],
            AudioMode::Drop => &["-an"],
        };
        args.iter().map(|a| a.to_string()).collect()
    }
}

/// Decide how to carry the first audio stream into the proxy.
pub fn decide_audio(audio: Option<&AudioStreamInfo>) -> AudioDecision {
    let Some(audio) = audio else {
        return AudioDecision {
            mode: AudioMode::Drop,
            reason: "No audio stream".to_string(),
        };
    };

    let codec = audio.codec_name.to_lowercase();

    if COMPRESSED_AUDIO.contains(&codec.as_str()) {
        return AudioDecision {
            mode: AudioMode::Copy,
            reason: format!("Compressed codec ({}) - copying", codec),
        };
    }

    if UNCOMPRESSED_AUDIO.contains(&codec.as_str()) {
        return AudioDecision {
            mode: AudioMode::Reencode,
            reason: format!("Uncompressed codec ({}) - re-encoding to AAC", codec),
        };
    }

    match audio.bit_rate {
        Some(bps) if bps > REENCODE_BITRATE_THRESHOLD => AudioDecision {
            mode: AudioMode::Reencode,
            reason: format!("High bitrate ({} bps) - re-encoding to AAC", bps),
        },
        Some(_) => AudioDecision {
            mode: AudioMode::Copy,
            reason: format!("Unknown codec ({}) with reasonable bitrate - copying", codec),
        },
        None => AudioDecision {
            mode: AudioMode::Copy,
            reason: format!("Unknown codec ({}) - copying (default)", codec),
        },
    }
}

/// Fully resolved encoder arguments for one source file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodePlan {
    pub requested_codec: Codec,
    pub effective_codec: Codec,
    pub accelerator: Accelerator,
    pub encoder: &'static str,
    pub hwaccel_args: Vec<String>,
    pub codec_args: Vec<String>,
    pub video_filter: String,
    /// Scaling runs on the accelerator instead of the CPU.
    pub gpu_scaling: bool,
    pub audio: AudioDecision,
    pub output_extension: &'static str,
    /// Why the effective codec was chosen.
    pub codec_reason: String,
    /// Set when the device class forced the baseline codec.
    pub override_reason: Option<String>,
    /// Set when the accelerator/source combination vetoed the requested codec.
    pub fallback_reason: Option<String>,
}

impl EncodePlan {
    /// Muxer name passed to `ffmpeg -f`.
    pub fn container_format(&self) -> &'static str {
        self.output_extension
    }

    /// `<stem>_proxy.<ext>` for this plan.
    pub fn proxy_file_name(&self, stem: &str) -> String {
        crate::naming::proxy_file_name(stem, self.output_extension)
    }
}

/// Codec decision engine with the run-wide accelerator and scale fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecEngine {
    pub accelerator: Accelerator,
    pub scale: ScaleFactor,
}

impl CodecEngine {
    pub fn new(accelerator: Accelerator, scale: ScaleFactor) -> Self {
        Self { accelerator, scale }
    }

    /// True when the output container depends on probed stream properties,
    /// which only happens when the 10-bit HEVC fallback can apply.
    pub fn extension_depends_on_source(&self, requested: Codec, device: DeviceClass) -> bool {
        let target = if device.is_consumer() {
            BASELINE_CODEC
        } else {
            requested
        };
        self.accelerator.is_gpu_backed() && target.is_intermediate()
    }

    /// Build the encode plan for one source.
    ///
    /// Order of evaluation:
    /// 1. device override to the baseline codec
    /// 2. normal (codec, accelerator) profile lookup
    /// 3. GPU/10-bit HEVC/intermediate fallback, which can veto step 2
    /// 4. scale filter, substituted with the device variant when allowed
    pub fn decide(&self, requested: Codec, source: &StreamInfo, device: DeviceClass) -> EncodePlan {
        let (mut effective, codec_reason, override_reason) = match device {
            DeviceClass::Consumer(method) => {
                let reason = format!(
                    "Consumer device footage detected via {}, using {}",
                    method, BASELINE_CODEC
                );
                (BASELINE_CODEC, reason.clone(), Some(reason))
            }
            DeviceClass::Standard => (requested, "Using user-selected codec".to_string(), None),
        };

        let mut profile = encoder_profile(effective, self.accelerator);

        let ten_bit_hevc = source
            .video
            .as_ref()
            .map(|v| v.is_ten_bit_hevc())
            .unwrap_or(false);

        let fallback_reason = if self.accelerator.is_gpu_backed()
            && ten_bit_hevc
            && effective.is_intermediate()
        {
            let reason = format!(
                "10-bit HEVC source cannot feed {} through {}; using {} with CPU scaling",
                effective, self.accelerator, BASELINE_CODEC
            );
            effective = BASELINE_CODEC;
            profile = encoder_profile(effective, self.accelerator);
            Some(reason)
        } else {
            None
        };

        let divisor = self.scale.divisor();
        let dims = format!("iw/{d}:ih/{d}", d = divisor);

        let gpu_filter = match (fallback_reason.is_none() && profile.hardware, self.accelerator.gpu_scale_filter()) {
            (true, Some(name)) => Some(name),
            _ => None,
        };

        let (video_filter, hwaccel_args, gpu_scaling) = if let Some(name) = gpu_filter {
            let mut filter = format!("{}={}", name, dims);
            if self.accelerator == Accelerator::Cuda {
                filter.push_str(":format=yuv420p");
            }
            let mut args = Vec::new();
            if let Some(hw) = self.accelerator.hwaccel_name() {
                args.extend(["-hwaccel".to_string(), hw.to_string()]);
            }
            if let Some(fmt) = self.accelerator.device_frame_format() {
                args.extend(["-hwaccel_output_format".to_string(), fmt.to_string()]);
            }
            (filter, args, true)
        } else if fallback_reason.is_some() {
            // CPU decode and scale, then 10 -> 8 bit for the baseline encoder.
            (format!("scale={},format=yuv420p", dims), Vec::new(), false)
        } else {
            let args = self
                .accelerator
                .hwaccel_name()
                .map(|hw| vec!["-hwaccel".to_string(), hw.to_string()])
                .unwrap_or_default();
            (format!("scale={}", dims), args, false)
        };

        EncodePlan {
            requested_codec: requested,
            effective_codec: effective,
            accelerator: self.accelerator,
            encoder: profile.encoder,
            hwaccel_args,
            codec_args: profile.codec_args(),
            video_filter,
            gpu_scaling,
            audio: decide_audio(source.audio.as_ref()),
            output_extension: output_extension(effective),
            codec_reason,
            override_reason,
            fallback_reason,
        }
    }
}

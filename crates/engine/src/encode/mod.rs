//! Encoding modules for proxygen

pub mod ffmpeg;

pub use ffmpeg::{build_ffmpeg_command, encode_to, EncodeError, FfmpegTranscoder, Transcoder};

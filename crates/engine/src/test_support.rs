//! Fakes shared by the unit tests.

use crate::codec::EncodePlan;
use crate::encode::{EncodeError, Transcoder};
use crate::probe::{
    AudioStreamInfo, DeviceTags, MediaProbe, ProbeError, StreamInfo, VideoStreamInfo,
};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Writes `content` to `path`, creating parent directories.
pub fn write_file(path: &Path, content: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// Probe that treats files starting with `VIDEO` as holding one h264 stream.
#[derive(Debug, Default)]
pub struct FakeProbe {
    android: HashSet<PathBuf>,
    streams: HashMap<PathBuf, StreamInfo>,
}

impl FakeProbe {
    pub fn with_android(mut self, path: &Path) -> Self {
        self.android.insert(path.to_path_buf());
        self
    }

    pub fn with_streams(mut self, path: &Path, info: StreamInfo) -> Self {
        self.streams.insert(path.to_path_buf(), info);
        self
    }
}

impl MediaProbe for FakeProbe {
    fn probe_streams(&self, path: &Path) -> Result<StreamInfo, ProbeError> {
        if let Some(info) = self.streams.get(path) {
            return Ok(info.clone());
        }
        let content = fs::read(path)?;
        if !content.starts_with(b"VIDEO") {
            return Ok(StreamInfo::default());
        }
        Ok(StreamInfo {
            video: Some(VideoStreamInfo {
                codec_name: "h264".to_string(),
                pix_fmt: Some("yuv420p".to_string()),
                width: 1920,
                height: 1080,
                ..Default::default()
            }),
            audio: Some(AudioStreamInfo {
                codec_name: "aac".to_string(),
                bit_rate: Some(128_000),
                sample_rate: Some(48_000),
            }),
            video_stream_count: 1,
        })
    }

    fn probe_device_tags(&self, path: &Path) -> Result<DeviceTags, ProbeError> {
        let mut tag_names = vec!["SourceFile".to_string()];
        if self.android.contains(path) {
            tag_names.push("AndroidVersion".to_string());
        }
        Ok(DeviceTags { tag_names })
    }
}

/// Transcoder that writes fixed bytes instead of running ffmpeg.
#[derive(Debug)]
pub struct FakeTranscoder {
    output: Option<Vec<u8>>,
    delay: Duration,
    calls: AtomicUsize,
}

impl Default for FakeTranscoder {
    fn default() -> Self {
        Self::writing(b"VIDEO proxy")
    }
}

impl FakeTranscoder {
    pub fn writing(content: &[u8]) -> Self {
        Self {
            output: Some(content.to_vec()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Every call fails with exit code 1.
    pub fn failing() -> Self {
        Self {
            output: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleeps before writing, to keep encodes overlapping.
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transcoder for FakeTranscoder {
    fn transcode(&self, _source: &Path, _plan: &EncodePlan, output: &Path) -> Result<(), EncodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        match &self.output {
            Some(content) => {
                fs::write(output, content)?;
                Ok(())
            }
            None => {
                fs::write(output, b"half written")?;
                Err(EncodeError::Failed {
                    code: 1,
                    stderr: "fake encoder failure".to_string(),
                })
            }
        }
    }
}

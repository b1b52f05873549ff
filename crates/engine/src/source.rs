//! Batch enumeration.
//!
//! Walks the batch root (or validates a single file), classifies each source
//! by device and camera pairing, and locates the proxies directory.

use crate::naming::{
    is_camera_twin_stem, is_video_file, looks_like_proxy, stem_of, strip_camera_suffix,
};
use crate::probe::MediaProbe;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Marker file flagging a folder of consumer-device footage.
pub const CONSUMER_FOLDER_MARKER: &str = ".is_android";

/// Errors that abort enumeration before any file is processed.
#[derive(Debug, Error)]
pub enum EnumerateError {
    #[error("Path does not exist: {0}")]
    NotFound(PathBuf),

    #[error("Not a supported video file: {0}")]
    NotAVideo(PathBuf),

    #[error("Appears to be a proxy file: {0}")]
    LooksLikeProxy(PathBuf),

    /// The proxies directory would sit above the filesystem root.
    #[error("No parent directory to hold proxies for: {0}")]
    NoParent(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How consumer-device footage was recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Embedded device tag.
    Metadata,
    /// Marker file in the source directory.
    FolderMarker,
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionMethod::Metadata => f.write_str("metadata"),
            DetectionMethod::FolderMarker => f.write_str("folder marker"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case", tag = "class", content = "detected_by")]
pub enum DeviceClass {
    #[default]
    Standard,
    Consumer(DetectionMethod),
}

impl DeviceClass {
    pub fn is_consumer(&self) -> bool {
        matches!(self, DeviceClass::Consumer(_))
    }

    /// Detection method for reports ("none" for standard footage).
    pub fn detection_label(&self) -> String {
        match self {
            DeviceClass::Standard => "none".to_string(),
            DeviceClass::Consumer(method) => method.to_string(),
        }
    }
}

/// Camera low-res twin relation of a source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pairing {
    #[default]
    None,
    /// A smaller `<stem>S<digits>` sibling exists.
    HasTwin(PathBuf),
    /// This file is the twin of the given (larger) original.
    IsTwinOf(PathBuf),
}

/// A discovered source file. Immutable after enumeration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceFile {
    pub path: PathBuf,
    pub stem: String,
    pub size_bytes: u64,
    pub device: DeviceClass,
    pub pairing: Pairing,
}

impl SourceFile {
    /// Reads size, device class and camera pairing of `path`.
    pub fn describe(path: &Path, probe: &dyn MediaProbe) -> Result<Self, std::io::Error> {
        let size_bytes = fs::metadata(path)?.len();
        let stem = stem_of(path).unwrap_or_default().to_string();

        Ok(SourceFile {
            path: path.to_path_buf(),
            device: detect_device(path, probe),
            pairing: detect_pairing(path, &stem, size_bytes),
            stem,
            size_bytes,
        })
    }

    /// Directory containing the source.
    pub fn parent(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }
}

/// Everything enumeration found for one invocation.
#[derive(Debug, Clone)]
pub struct Batch {
    pub root: PathBuf,
    pub proxies_dir: PathBuf,
    pub single_file: bool,
    pub files: Vec<SourceFile>,
}

/// Proxies directory for a batch: sibling of the batch root directory, or of
/// the file's parent directory for a single-file invocation.
pub fn proxies_dir_for(root: &Path, single_file: bool, dir_name: &str) -> Result<PathBuf, EnumerateError> {
    let anchor = if single_file { root.parent() } else { Some(root) };
    anchor
        .and_then(Path::parent)
        .map(|p| p.join(dir_name))
        .ok_or_else(|| EnumerateError::NoParent(root.to_path_buf()))
}

/// Enumerates the batch rooted at `root`.
///
/// # Arguments
///
/// * `root` - A directory tree or a single video file
/// * `proxies_dir_name` - Name of the proxies directory (excluded from the walk)
/// * `probe` - Used to read device tags of each source
///
/// # Returns
///
/// The batch with files in a stable, name-sorted order.
pub fn enumerate_batch(
    root: &Path,
    proxies_dir_name: &str,
    probe: &dyn MediaProbe,
) -> Result<Batch, EnumerateError> {
    if !root.exists() {
        return Err(EnumerateError::NotFound(root.to_path_buf()));
    }

    let root = root.canonicalize()?;
    let single_file = root.is_file();

    let paths = if single_file {
        if !is_video_file(&root) {
            return Err(EnumerateError::NotAVideo(root));
        }
        if looks_like_proxy(&root) {
            return Err(EnumerateError::LooksLikeProxy(root));
        }
        vec![root.clone()]
    } else {
        walk_sources(&root, proxies_dir_name)
    };

    let proxies_dir = proxies_dir_for(&root, single_file, proxies_dir_name)?;

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        match SourceFile::describe(&path, probe) {
            Ok(source) => files.push(source),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable source"),
        }
    }

    debug!(root = %root.display(), count = files.len(), "enumerated batch");

    Ok(Batch {
        root,
        proxies_dir,
        single_file,
        files,
    })
}

/// Recursive walk excluding proxies directories and proxy-looking files.
fn walk_sources(root: &Path, proxies_dir_name: &str) -> Vec<PathBuf> {
    use walkdir::WalkDir;

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() > 0 && entry.file_type().is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    if name.eq_ignore_ascii_case(proxies_dir_name) {
                        return false;
                    }
                }
            }
            true
        });

    walker
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_video_file(p) && !looks_like_proxy(p))
        .collect()
}

/// Embedded tags win over the folder marker. Probe failures count as standard.
pub fn detect_device(path: &Path, probe: &dyn MediaProbe) -> DeviceClass {
    match probe.probe_device_tags(path) {
        Ok(tags) if tags.is_consumer_device() => {
            return DeviceClass::Consumer(DetectionMethod::Metadata);
        }
        Ok(_) => {}
        Err(e) => debug!(path = %path.display(), error = %e, "device tag probe failed"),
    }

    let marker = path
        .parent()
        .map(|dir| dir.join(CONSUMER_FOLDER_MARKER).exists())
        .unwrap_or(false);

    if marker {
        DeviceClass::Consumer(DetectionMethod::FolderMarker)
    } else {
        DeviceClass::Standard
    }
}

/// Finds the camera twin relation of `path` among its siblings.
pub fn detect_pairing(path: &Path, stem: &str, size_bytes: u64) -> Pairing {
    let Some(dir) = path.parent() else {
        return Pairing::None;
    };

    if let Some(original_stem) = strip_camera_suffix(stem) {
        if let Some(original) = list_videos(dir)
            .into_iter()
            .find(|(p, size)| stem_of(p) == Some(original_stem) && *size > size_bytes)
        {
            return Pairing::IsTwinOf(original.0);
        }
    }

    list_videos(dir)
        .into_iter()
        .find(|(p, size)| {
            p != path
                && *size < size_bytes
                && stem_of(p).is_some_and(|s| is_camera_twin_stem(s, stem))
        })
        .map(|(p, _)| Pairing::HasTwin(p))
        .unwrap_or_default()
}

/// Video files directly inside `dir`, sorted by path, with their sizes.
pub fn list_videos(dir: &Path) -> Vec<(PathBuf, u64)> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut videos: Vec<(PathBuf, u64)> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let meta = e.metadata().ok()?;
            let path = e.path();
            (meta.is_file() && is_video_file(&path)).then_some((path, meta.len()))
        })
        .collect();
    videos.sort();
    videos
}

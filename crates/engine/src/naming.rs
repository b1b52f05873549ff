//! File naming rules shared by enumeration and resolution.

use std::path::Path;

/// Source extensions accepted by enumeration (case-insensitive, without dot).
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "mxf", "avi", "mkv"];

/// Suffix appended to a source stem to form its proxy stem.
pub const PROXY_SUFFIX: &str = "_proxy";

/// Checks if an extension (without dot) is an accepted video extension.
pub fn is_video_extension(ext: &str) -> bool {
    let lower = ext.to_lowercase();
    VIDEO_EXTENSIONS.contains(&lower.as_str())
}

/// Checks if a file has a video extension (case-insensitive).
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(is_video_extension)
        .unwrap_or(false)
}

/// Files whose stem mentions "proxy" are never treated as sources.
pub fn looks_like_proxy(path: &Path) -> bool {
    stem_of(path)
        .map(|s| s.to_lowercase().contains("proxy"))
        .unwrap_or(false)
}

/// UTF-8 file stem, if any.
pub fn stem_of(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|s| s.to_str())
}

/// UTF-8 extension, if any.
pub fn extension_of(path: &Path) -> Option<&str> {
    path.extension().and_then(|s| s.to_str())
}

/// Standard proxy file name: `<stem>_proxy.<ext>`.
pub fn proxy_file_name(stem: &str, ext: &str) -> String {
    format!("{}{}.{}", stem, PROXY_SUFFIX, ext)
}

/// Camera low-res twin suffix: `S` followed by one or more digits.
fn is_camera_suffix(rest: &str) -> bool {
    rest.strip_prefix('S')
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// True when `candidate_stem` is `original_stem` plus a camera suffix
/// (`C0001` / `C0001S03`).
pub fn is_camera_twin_stem(candidate_stem: &str, original_stem: &str) -> bool {
    candidate_stem
        .strip_prefix(original_stem)
        .is_some_and(is_camera_suffix)
}

/// Strip a trailing camera suffix, returning the original stem.
///
/// The last `S` is used, so `AS5S03` yields `AS5`.
pub fn strip_camera_suffix(stem: &str) -> Option<&str> {
    let idx = stem.rfind('S')?;
    let (original, rest) = stem.split_at(idx);
    if !original.is_empty() && is_camera_suffix(rest) {
        Some(original)
    } else {
        None
    }
}

/// Hidden in-progress sibling for a destination file name.
pub fn partial_file_name(file_name: &str) -> String {
    format!(".{}.partial", file_name)
}

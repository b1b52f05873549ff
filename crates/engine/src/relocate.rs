//! Safe relocation of proxy artifacts.
//!
//! Cross-location moves copy into a hidden partial file next to the
//! destination, verify it, publish it by rename and only then delete the
//! source. A failed sequence removes its partial output and leaves the
//! source untouched.

use crate::naming::partial_file_name;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur while relocating an artifact.
#[derive(Debug, Error)]
pub enum RelocateError {
    /// Destination is already occupied.
    #[error("Destination already exists: {0}")]
    DestinationExists(PathBuf),

    /// Failed to create the destination directory.
    #[error("Failed to create directory {0}: {1}")]
    CreateDirFailed(PathBuf, std::io::Error),

    /// Failed to copy the artifact into the partial file.
    #[error("Failed to copy artifact: {0}")]
    CopyFailed(std::io::Error),

    /// The copy is empty or shorter/longer than the source.
    #[error("Copy verification failed: expected {expected} bytes, found {actual}")]
    VerifyFailed { expected: u64, actual: u64 },

    /// Failed to rename the partial file into place.
    #[error("Failed to publish artifact: {0}")]
    PublishFailed(std::io::Error),

    /// Published, but the source could not be removed.
    #[error("Failed to delete source after copy: {0}")]
    DeleteSourceFailed(std::io::Error),

    /// Destination has no parent directory or file name.
    #[error("Invalid destination path: {0}")]
    InvalidDestination(PathBuf),
}

/// Hidden partial path next to `dest`: `<dir>/.<name>.partial`.
pub fn partial_path(dest: &Path) -> Result<PathBuf, RelocateError> {
    let name = dest
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| RelocateError::InvalidDestination(dest.to_path_buf()))?;
    let dir = dest
        .parent()
        .ok_or_else(|| RelocateError::InvalidDestination(dest.to_path_buf()))?;
    Ok(dir.join(partial_file_name(name)))
}

/// Creates the parent directory of `dest` if needed.
pub fn ensure_parent_dir(dest: &Path) -> Result<(), RelocateError> {
    let dir = dest
        .parent()
        .ok_or_else(|| RelocateError::InvalidDestination(dest.to_path_buf()))?;
    fs::create_dir_all(dir).map_err(|e| RelocateError::CreateDirFailed(dir.to_path_buf(), e))
}

/// Copies `src` to `dest`, verifies the copy and then deletes `src`.
///
/// Steps:
/// 1. Refuse if `dest` exists
/// 2. Copy `src` to a hidden partial file in `dest`'s directory
/// 3. Verify the partial is non-empty and the same length as `src`
/// 4. Re-check `dest` is still free, then rename the partial into place
/// 5. Delete `src`
///
/// On any failure before step 5 the partial is removed and `src` is kept.
///
/// # Arguments
///
/// * `src` - Artifact to relocate
/// * `dest` - Final destination path (must not exist)
pub fn copy_verify_delete(src: &Path, dest: &Path) -> Result<(), RelocateError> {
    if dest.exists() {
        return Err(RelocateError::DestinationExists(dest.to_path_buf()));
    }

    ensure_parent_dir(dest)?;
    let partial = partial_path(dest)?;

    if let Err(e) = copy_and_publish(src, dest, &partial) {
        if partial.exists() {
            if let Err(cleanup) = fs::remove_file(&partial) {
                warn!(partial = %partial.display(), error = %cleanup, "failed to remove partial copy");
            }
        }
        return Err(e);
    }

    fs::remove_file(src).map_err(RelocateError::DeleteSourceFailed)?;
    debug!(from = %src.display(), to = %dest.display(), "relocated artifact");
    Ok(())
}

fn copy_and_publish(src: &Path, dest: &Path, partial: &Path) -> Result<(), RelocateError> {
    let expected = fs::metadata(src).map_err(RelocateError::CopyFailed)?.len();
    let copied = fs::copy(src, partial).map_err(RelocateError::CopyFailed)?;
    let actual = fs::metadata(partial)
        .map(|m| m.len())
        .unwrap_or(copied);

    if actual == 0 || actual != expected {
        return Err(RelocateError::VerifyFailed { expected, actual });
    }

    if dest.exists() {
        return Err(RelocateError::DestinationExists(dest.to_path_buf()));
    }

    fs::rename(partial, dest).map_err(RelocateError::PublishFailed)
}

/// Renames `src` to `dest` within one directory, refusing to overwrite.
pub fn rename_in_place(src: &Path, dest: &Path) -> Result<(), RelocateError> {
    if dest.exists() {
        return Err(RelocateError::DestinationExists(dest.to_path_buf()));
    }
    fs::rename(src, dest).map_err(RelocateError::PublishFailed)
}

/// Moves `src` to `dest`, trying a plain rename first and falling back to
/// [`copy_verify_delete`] across filesystems.
pub fn move_artifact(src: &Path, dest: &Path) -> Result<(), RelocateError> {
    if dest.exists() {
        return Err(RelocateError::DestinationExists(dest.to_path_buf()));
    }
    ensure_parent_dir(dest)?;

    match fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!(error = %e, "rename failed, falling back to copy");
            copy_verify_delete(src, dest)
        }
    }
}

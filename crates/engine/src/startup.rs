//! Startup checks module for proxygen
//!
//! Provides preflight checks run before any file is touched:
//! - External tool availability (ffmpeg, ffprobe, exiftool)
//! - FFmpeg version capture for the run report
//! - Hardware accelerator detection

use crate::codec::{select_accelerator, Accelerator};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, info};

/// External tools the engine shells out to, with the flag used to probe them.
pub const REQUIRED_TOOLS: &[(&str, &str)] = &[
    ("ffmpeg", "-version"),
    ("ffprobe", "-version"),
    ("exiftool", "-ver"),
];

/// Error types for startup checks
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Required tools not found: {}. Install them and make sure they are on PATH", .0.join(", "))]
    MissingTools(Vec<String>),

    #[error("FFmpeg query failed: {0}")]
    Ffmpeg(String),
}

/// Runs `<tool> <flag>` and reports whether it exited successfully.
fn tool_runs(tool: &str, flag: &str) -> bool {
    Command::new(tool)
        .arg(flag)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Verify every required tool is runnable.
///
/// All tools are checked so the error lists everything that is missing.
pub fn check_required_tools() -> Result<(), StartupError> {
    let missing: Vec<String> = REQUIRED_TOOLS
        .iter()
        .filter(|(tool, flag)| !tool_runs(tool, flag))
        .map(|(tool, _)| tool.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(StartupError::MissingTools(missing))
    }
}

/// First line of `ffmpeg -version`, e.g. "ffmpeg version 7.1 Copyright ...".
pub fn parse_version_line(version_output: &str) -> Option<String> {
    version_output
        .lines()
        .find(|line| line.to_lowercase().contains("ffmpeg version"))
        .map(|line| line.trim().to_string())
}

/// Query the installed ffmpeg version line.
pub fn ffmpeg_version() -> Result<String, StartupError> {
    let output = Command::new("ffmpeg")
        .arg("-version")
        .output()
        .map_err(|e| StartupError::Ffmpeg(format!("Failed to run ffmpeg -version: {}", e)))?;

    if !output.status.success() {
        return Err(StartupError::Ffmpeg("ffmpeg -version failed".to_string()));
    }

    let text = String::from_utf8_lossy(&output.stdout);
    parse_version_line(&text).ok_or_else(|| {
        StartupError::Ffmpeg(format!(
            "Could not parse FFmpeg version from output: {}",
            text.lines().next().unwrap_or("(empty)")
        ))
    })
}

/// Parse `ffmpeg -hide_banner -hwaccels` output into known accelerators.
pub fn parse_hwaccels(output: &str) -> Vec<Accelerator> {
    output
        .lines()
        .skip_while(|line| !line.to_lowercase().contains("hardware acceleration methods"))
        .skip(1)
        .filter_map(Accelerator::from_hwaccel_name)
        .collect()
}

/// Pick the accelerator for this host.
///
/// A failed `-hwaccels` query leaves only accelerators that need no check.
pub fn detect_accelerator() -> Accelerator {
    let preference = Accelerator::platform_preference(std::env::consts::OS);

    let available = Command::new("ffmpeg")
        .args(["-hide_banner", "-hwaccels"])
        .output()
        .map(|o| parse_hwaccels(&String::from_utf8_lossy(&o.stdout)))
        .unwrap_or_else(|e| {
            debug!(error = %e, "ffmpeg -hwaccels failed");
            Vec::new()
        });

    let selected = select_accelerator(preference, &available);
    info!(accelerator = %selected, available = ?available, "selected hardware accelerator");
    selected
}

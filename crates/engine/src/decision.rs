//! Per-file resolution outcome.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Terminal outcome for one source file.
///
/// `Regenerate` is the only variant with a further transition: the
/// coordinator turns it into `Transcoded` or `Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyDecision {
    /// A valid proxy already sits at the target name.
    SkipExisting { proxy: PathBuf },
    /// Pulled in from the centralized repository.
    Relocated { from: PathBuf, to: PathBuf },
    /// Camera twin moved into the proxies directory.
    PairMoved { twin: PathBuf, to: PathBuf },
    /// This file is itself a camera twin.
    SkipAsTwin { original: PathBuf },
    /// Twin already in the proxies directory, renamed to the standard name.
    PairRenamed { from: PathBuf, to: PathBuf },
    /// A proxy with another extension exists and the conflict resolved to skip.
    SkipConflict { existing: PathBuf },
    /// Moved from a legacy location.
    LegacyMoved { from: PathBuf, to: PathBuf },
    /// Needs encoding. `duplicate_of` is set when a different-extension proxy
    /// exists and duplication was accepted.
    Regenerate { duplicate_of: Option<PathBuf> },
    Transcoded {
        proxy: PathBuf,
        elapsed: Duration,
        size_bytes: u64,
    },
    Error { reason: String },
}

/// Variant tag without payload, used for counting and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    SkipExisting,
    Relocated,
    PairMoved,
    SkipAsTwin,
    PairRenamed,
    SkipConflict,
    LegacyMoved,
    Regenerate,
    Transcoded,
    Error,
}

impl DecisionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionKind::SkipExisting => "skip_existing",
            DecisionKind::Relocated => "relocated",
            DecisionKind::PairMoved => "pair_moved",
            DecisionKind::SkipAsTwin => "skip_as_twin",
            DecisionKind::PairRenamed => "pair_renamed",
            DecisionKind::SkipConflict => "skip_conflict",
            DecisionKind::LegacyMoved => "legacy_moved",
            DecisionKind::Regenerate => "regenerate",
            DecisionKind::Transcoded => "transcoded",
            DecisionKind::Error => "error",
        }
    }
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ProxyDecision {
    pub fn kind(&self) -> DecisionKind {
        match self {
            ProxyDecision::SkipExisting { .. } => DecisionKind::SkipExisting,
            ProxyDecision::Relocated { .. } => DecisionKind::Relocated,
            ProxyDecision::PairMoved { .. } => DecisionKind::PairMoved,
            ProxyDecision::SkipAsTwin { .. } => DecisionKind::SkipAsTwin,
            ProxyDecision::PairRenamed { .. } => DecisionKind::PairRenamed,
            ProxyDecision::SkipConflict { .. } => DecisionKind::SkipConflict,
            ProxyDecision::LegacyMoved { .. } => DecisionKind::LegacyMoved,
            ProxyDecision::Regenerate { .. } => DecisionKind::Regenerate,
            ProxyDecision::Transcoded { .. } => DecisionKind::Transcoded,
            ProxyDecision::Error { .. } => DecisionKind::Error,
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        ProxyDecision::Error {
            reason: reason.into(),
        }
    }

    /// True for every variant except `Regenerate`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProxyDecision::Regenerate { .. })
    }

    /// Final proxy location, when the outcome produced or found one.
    pub fn proxy_path(&self) -> Option<&PathBuf> {
        match self {
            ProxyDecision::SkipExisting { proxy } | ProxyDecision::Transcoded { proxy, .. } => {
                Some(proxy)
            }
            ProxyDecision::Relocated { to, .. }
            | ProxyDecision::PairMoved { to, .. }
            | ProxyDecision::PairRenamed { to, .. }
            | ProxyDecision::LegacyMoved { to, .. } => Some(to),
            ProxyDecision::SkipAsTwin { .. }
            | ProxyDecision::SkipConflict { .. }
            | ProxyDecision::Regenerate { .. }
            | ProxyDecision::Error { .. } => None,
        }
    }

    /// Human-readable reason line for logs and reports.
    pub fn reason(&self) -> String {
        match self {
            ProxyDecision::SkipExisting { proxy } => {
                format!("Valid proxy already exists: {}", proxy.display())
            }
            ProxyDecision::Relocated { from, to } => {
                format!("Relocated from repository: {} -> {}", from.display(), to.display())
            }
            ProxyDecision::PairMoved { twin, to } => {
                format!("Moved camera proxy: {} -> {}", twin.display(), to.display())
            }
            ProxyDecision::SkipAsTwin { original } => {
                format!("Camera proxy of {}", original.display())
            }
            ProxyDecision::PairRenamed { from, to } => {
                format!("Renamed camera proxy: {} -> {}", from.display(), to.display())
            }
            ProxyDecision::SkipConflict { existing } => {
                format!("Skipped, existing proxy: {}", existing.display())
            }
            ProxyDecision::LegacyMoved { from, to } => {
                format!("Moved existing proxy: {} -> {}", from.display(), to.display())
            }
            ProxyDecision::Regenerate { duplicate_of: None } => "No valid proxy found".to_string(),
            ProxyDecision::Regenerate {
                duplicate_of: Some(existing),
            } => format!("Creating duplicate of {}", existing.display()),
            ProxyDecision::Transcoded { elapsed, .. } => {
                format!("Transcoded in {:.2}s", elapsed.as_secs_f64())
            }
            ProxyDecision::Error { reason } => reason.clone(),
        }
    }
}

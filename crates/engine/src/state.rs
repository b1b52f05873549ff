//! Run-wide shared state: the claim registry and run statistics.

use crate::decision::{DecisionKind, ProxyDecision};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide set of claimed artifact and encode destination paths.
///
/// Entries are never removed during a run, so a path can be claimed at most
/// once per invocation.
#[derive(Debug, Default)]
pub struct ClaimRegistry {
    claimed: Mutex<HashSet<PathBuf>>,
}

impl ClaimRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `path`. Returns false if another worker already holds it.
    pub fn claim(&self, path: &Path) -> bool {
        self.claimed.lock().insert(path.to_path_buf())
    }

    pub fn is_claimed(&self, path: &Path) -> bool {
        self.claimed.lock().contains(path)
    }

    pub fn len(&self) -> usize {
        self.claimed.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Atomic run counters.
#[derive(Debug, Default)]
pub struct RunStats {
    found: AtomicU64,
    transcoded: AtomicU64,
    skipped: AtomicU64,
    moved: AtomicU64,
    pair_moved: AtomicU64,
    errors: AtomicU64,
}

/// Point-in-time copy of [`RunStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub found: u64,
    pub transcoded: u64,
    pub skipped: u64,
    pub moved: u64,
    pub pair_moved: u64,
    pub errors: u64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_found(&self, n: u64) {
        self.found.fetch_add(n, Ordering::Relaxed);
    }

    /// Counts a terminal decision. `Regenerate` is not counted.
    pub fn record(&self, decision: &ProxyDecision) {
        let counter = match decision.kind() {
            DecisionKind::SkipExisting | DecisionKind::SkipAsTwin | DecisionKind::SkipConflict => {
                &self.skipped
            }
            DecisionKind::Relocated | DecisionKind::LegacyMoved => &self.moved,
            DecisionKind::PairMoved | DecisionKind::PairRenamed => &self.pair_moved,
            DecisionKind::Transcoded => &self.transcoded,
            DecisionKind::Error => &self.errors,
            DecisionKind::Regenerate => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            found: self.found.load(Ordering::Relaxed),
            transcoded: self.transcoded.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            moved: self.moved.load(Ordering::Relaxed),
            pair_moved: self.pair_moved.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    /// Files that reached a terminal decision.
    pub fn settled(&self) -> u64 {
        self.transcoded + self.skipped + self.moved + self.pair_moved + self.errors
    }
}

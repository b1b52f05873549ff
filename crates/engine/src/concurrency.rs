//! Worker pool sizing.
//!
//! Derives the number of concurrent file workers from CPU core count and configuration.

use crate::config::Config;

/// Upper bound for the derived default.
pub const MAX_DEFAULT_WORKERS: u32 = 8;

/// Worker plan derived from configuration and system resources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPlan {
    /// Total logical CPU cores available
    pub total_cores: u32,
    /// Number of files processed concurrently
    pub workers: u32,
    /// False in sequential mode
    pub parallel: bool,
}

impl WorkerPlan {
    /// Derive a worker plan from configuration
    ///
    /// Uses the following rules:
    /// - Sequential mode always uses 1 worker
    /// - A non-zero `max_workers` is used as is
    /// - Otherwise half the logical cores, at least 1, capped at 8
    pub fn derive(cfg: &Config) -> Self {
        Self::derive_with_cores(cfg, num_cpus::get() as u32)
    }

    /// Same as [`WorkerPlan::derive`] with an explicit core count.
    pub fn derive_with_cores(cfg: &Config, total_cores: u32) -> Self {
        let parallel = cfg.workers.parallel;

        let workers = if !parallel {
            1
        } else if cfg.workers.max_workers > 0 {
            cfg.workers.max_workers
        } else {
            default_workers(total_cores)
        };

        Self {
            total_cores,
            workers,
            parallel,
        }
    }
}

/// Half the cores, at least 1, at most [`MAX_DEFAULT_WORKERS`].
pub fn default_workers(cores: u32) -> u32 {
    (cores / 2).clamp(1, MAX_DEFAULT_WORKERS)
}

//! Concurrent execution coordinator.
//!
//! Runs the decide phase (conflict pre-resolution, single-threaded, may
//! prompt) and then the act phase: each file goes through
//! resolve → plan → transcode on the blocking pool, bounded by a semaphore.

use crate::codec::EncodePlan;
use crate::concurrency::WorkerPlan;
use crate::context::RunContext;
use crate::decision::{DecisionKind, ProxyDecision};
use crate::encode::encode_to;
use crate::resolver::Resolver;
use crate::source::SourceFile;
use crate::state::StatsSnapshot;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn};

/// Errors that abort a run as a whole.
#[derive(Debug, Error)]
pub enum RunError {
    /// The decide phase task panicked or was cancelled.
    #[error("Conflict pre-resolution failed: {0}")]
    PreResolution(tokio::task::JoinError),
}

/// Result of processing one source.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub source: SourceFile,
    /// `None` when the worker died before planning.
    pub plan: Option<EncodePlan>,
    pub decision: ProxyDecision,
    pub elapsed: Duration,
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub files: Vec<FileOutcome>,
    /// Sources never dispatched because of an interrupt.
    pub not_dispatched: Vec<PathBuf>,
    pub conflicts_resolved: usize,
    pub stats: StatsSnapshot,
    pub elapsed: Duration,
}

impl BatchOutcome {
    /// Per-decision-kind counts over processed files.
    pub fn counts(&self) -> BTreeMap<DecisionKind, u64> {
        let mut counts = BTreeMap::new();
        for outcome in &self.files {
            *counts.entry(outcome.decision.kind()).or_insert(0) += 1;
        }
        counts
    }

    pub fn error_count(&self) -> usize {
        self.files
            .iter()
            .filter(|f| f.decision.kind() == DecisionKind::Error)
            .count()
    }

    pub fn was_interrupted(&self) -> bool {
        !self.not_dispatched.is_empty()
    }
}

/// Dispatches a batch across a bounded worker pool.
pub struct BatchRunner {
    workers: WorkerPlan,
    cancel: CancellationToken,
}

impl BatchRunner {
    pub fn new(workers: WorkerPlan, cancel: CancellationToken) -> Self {
        Self { workers, cancel }
    }

    /// Run the whole batch.
    ///
    /// # Arguments
    ///
    /// * `ctx` - Shared run state; conflict decisions are filled in here
    /// * `files` - Sources in enumeration order
    ///
    /// # Returns
    ///
    /// One [`FileOutcome`] per dispatched source, in enumeration order.
    pub async fn run(&self, ctx: RunContext, files: Vec<SourceFile>) -> Result<BatchOutcome, RunError> {
        let started = Instant::now();
        ctx.stats.add_found(files.len() as u64);

        let (ctx, files, conflicts_resolved) = tokio::task::spawn_blocking(move || {
            let mut ctx = ctx;
            let resolved = pre_resolve_conflicts(&mut ctx, &files);
            (ctx, files, resolved)
        })
        .await
        .map_err(RunError::PreResolution)?;

        let ctx = Arc::new(ctx);
        let semaphore = Arc::new(Semaphore::new(self.workers.workers.max(1) as usize));

        info!(
            files = files.len(),
            workers = self.workers.workers,
            parallel = self.workers.parallel,
            "dispatching batch"
        );

        let mut handles: Vec<(SourceFile, JoinHandle<FileOutcome>)> = Vec::with_capacity(files.len());
        let mut not_dispatched = Vec::new();
        let mut pending = files.into_iter();

        while let Some(source) = pending.next() {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };

            let Some(permit) = permit else {
                info!("interrupt received, stopping dispatch");
                not_dispatched.push(source.path);
                not_dispatched.extend(pending.by_ref().map(|s| s.path));
                break;
            };

            let worker_ctx = Arc::clone(&ctx);
            let worker_source = source.clone();
            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                process_file(&worker_ctx, worker_source)
            });
            handles.push((source, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (source, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(path = %source.path.display(), error = %e, "worker failed");
                    let decision = ProxyDecision::error(format!("Worker failed: {}", e));
                    ctx.stats.record(&decision);
                    FileOutcome {
                        source,
                        plan: None,
                        decision,
                        elapsed: Duration::ZERO,
                    }
                }
            };
            outcomes.push(outcome);
        }

        Ok(BatchOutcome {
            files: outcomes,
            not_dispatched,
            conflicts_resolved,
            stats: ctx.stats.snapshot(),
            elapsed: started.elapsed(),
        })
    }
}

/// Decide phase: find every pending different-extension conflict and bind a
/// decision to each before any worker starts.
///
/// Returns the number of conflicts resolved.
pub fn pre_resolve_conflicts(ctx: &mut RunContext, files: &[SourceFile]) -> usize {
    let pending: Vec<_> = {
        let shared: &RunContext = ctx;
        let resolver = Resolver::new(shared);
        files
            .iter()
            .filter_map(|source| resolver.pending_conflict(source, shared.expected_extension(source)))
            .collect()
    };

    if pending.is_empty() {
        return 0;
    }

    info!(count = pending.len(), "found proxies with a different extension");
    ctx.conflicts = ctx.conflict_resolver.get_mut().resolve_all(&pending);
    pending.len()
}

/// Act phase for one file. Runs on the blocking pool.
pub fn process_file(ctx: &RunContext, source: SourceFile) -> FileOutcome {
    let span = info_span!("file", path = %source.path.display());
    let _enter = span.enter();
    let started = Instant::now();

    let plan = ctx.plan_for(&source);
    if let Some(reason) = &plan.override_reason {
        info!(reason = %reason, "codec override");
    }
    if let Some(reason) = &plan.fallback_reason {
        warn!(reason = %reason, "codec fallback");
    }

    let decision = match Resolver::new(ctx).resolve(&source, &plan) {
        ProxyDecision::Regenerate { duplicate_of } => {
            if let Some(existing) = &duplicate_of {
                info!(existing = %existing.display(), "creating duplicate proxy");
            }
            transcode(ctx, &source, &plan)
        }
        terminal => terminal,
    };

    ctx.stats.record(&decision);
    match &decision {
        ProxyDecision::Error { reason } => warn!(reason = %reason, "file failed"),
        other => info!(outcome = %other.kind(), reason = %other.reason(), "file resolved"),
    }

    FileOutcome {
        source,
        plan: Some(plan),
        decision,
        elapsed: started.elapsed(),
    }
}

fn transcode(ctx: &RunContext, source: &SourceFile, plan: &EncodePlan) -> ProxyDecision {
    let dest = ctx.proxy_path(&source.stem, plan.output_extension);

    // Same-stem sources from different folders share one proxy name.
    if !ctx.claims.claim(&dest) {
        return ProxyDecision::error(format!(
            "Name collision detected at {}: another source in this batch writes the same proxy",
            dest.display()
        ));
    }

    if dest.exists() {
        if ctx.probe.is_valid_proxy(&dest) {
            return ProxyDecision::error(format!(
                "Name collision detected at {}: proxy appeared during resolution",
                dest.display()
            ));
        }
        warn!(proxy = %dest.display(), "replacing invalid proxy");
        if let Err(e) = fs::remove_file(&dest) {
            return ProxyDecision::error(format!(
                "Failed to remove invalid proxy {}: {}",
                dest.display(),
                e
            ));
        }
    }

    let started = Instant::now();
    info!(encoder = plan.encoder, dest = %dest.display(), "transcoding");

    match encode_to(
        ctx.transcoder.as_ref(),
        ctx.probe.as_ref(),
        &source.path,
        plan,
        &dest,
    ) {
        Ok(size_bytes) => ProxyDecision::Transcoded {
            proxy: dest,
            elapsed: started.elapsed(),
            size_bytes,
        },
        Err(e) => ProxyDecision::error(format!("Transcode failed: {}", e)),
    }
}

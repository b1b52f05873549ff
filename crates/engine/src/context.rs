//! Shared state for one invocation, passed to every worker.

use crate::codec::{Accelerator, CodecEngine, EncodePlan};
use crate::conflict::{ConflictDecisions, ConflictResolver};
use crate::config::{Codec, Config};
use crate::encode::Transcoder;
use crate::naming::proxy_file_name;
use crate::probe::{MediaProbe, StreamInfo};
use crate::source::SourceFile;
use crate::state::{ClaimRegistry, RunStats};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

pub struct RunContext {
    pub proxies_dir: PathBuf,
    pub repository_dir: Option<PathBuf>,
    pub legacy_subdir_name: String,
    pub requested_codec: Codec,
    pub engine: CodecEngine,
    pub probe: Arc<dyn MediaProbe>,
    pub transcoder: Arc<dyn Transcoder>,
    pub claims: ClaimRegistry,
    pub stats: RunStats,
    /// Binding conflict outcomes from pre-resolution.
    pub conflicts: ConflictDecisions,
    pub conflict_resolver: Mutex<ConflictResolver>,
    /// Workers may prompt for conflicts that pre-resolution did not see.
    pub prompt_during_run: bool,
}

impl RunContext {
    pub fn new(
        config: &Config,
        proxies_dir: PathBuf,
        accelerator: Accelerator,
        probe: Arc<dyn MediaProbe>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        Self {
            proxies_dir,
            repository_dir: config.locations.repository_dir.clone(),
            legacy_subdir_name: config.locations.legacy_subdir_name.clone(),
            requested_codec: config.proxy.codec,
            engine: CodecEngine::new(accelerator, config.proxy.scale),
            probe,
            transcoder,
            claims: ClaimRegistry::new(),
            stats: RunStats::new(),
            conflicts: ConflictDecisions::default(),
            conflict_resolver: Mutex::new(ConflictResolver::policy(
                config.conflicts.auto_skip_duplicates,
            )),
            prompt_during_run: false,
        }
    }

    pub fn with_conflict_resolver(mut self, resolver: ConflictResolver, prompt_during_run: bool) -> Self {
        self.conflict_resolver = Mutex::new(resolver);
        self.prompt_during_run = prompt_during_run;
        self
    }

    /// Probe `source` and build its encode plan. Probe failures fall back to
    /// unknown stream info.
    pub fn plan_for(&self, source: &SourceFile) -> EncodePlan {
        let info = match self.probe.probe_streams(&source.path) {
            Ok(info) => info,
            Err(e) => {
                warn!(path = %source.path.display(), error = %e, "stream probe failed, using defaults");
                StreamInfo::default()
            }
        };
        self.engine.decide(self.requested_codec, &info, source.device)
    }

    /// Output extension for `source`, probing only when the container can
    /// depend on the source streams.
    pub fn expected_extension(&self, source: &SourceFile) -> &'static str {
        if self
            .engine
            .extension_depends_on_source(self.requested_codec, source.device)
        {
            self.plan_for(source).output_extension
        } else {
            self.engine
                .decide(self.requested_codec, &StreamInfo::default(), source.device)
                .output_extension
        }
    }

    /// `<proxies>/<stem>_proxy.<ext>`.
    pub fn proxy_path(&self, stem: &str, ext: &str) -> PathBuf {
        self.proxies_dir.join(proxy_file_name(stem, ext))
    }
}

//! Proxy generator engine
//!
//! Enumerates source footage, finds or relocates existing proxies, resolves
//! duplicate-proxy conflicts and transcodes whatever is left into
//! low-resolution editing proxies.

pub mod codec;
pub mod concurrency;
pub mod conflict;
pub mod context;
pub mod coordinator;
pub mod decision;
pub mod encode;
pub mod naming;
pub mod probe;
pub mod relocate;
pub mod report;
pub mod resolver;
pub mod source;
pub mod startup;
pub mod state;

#[cfg(test)]
mod test_support;

pub use proxygen_config as config;
pub use proxygen_config::Config;
pub use codec::{Accelerator, AudioDecision, AudioMode, CodecEngine, EncodePlan};
pub use concurrency::WorkerPlan;
pub use conflict::{
    ConflictChoice, ConflictDecisions, ConflictPrompter, ConflictResolver, LinePrompter,
    PendingConflict, PromptAnswer,
};
pub use context::RunContext;
pub use coordinator::{BatchOutcome, BatchRunner, FileOutcome, RunError};
pub use decision::{DecisionKind, ProxyDecision};
pub use encode::{EncodeError, FfmpegTranscoder, Transcoder};
pub use probe::{FfprobeProbe, MediaProbe, ProbeError, StreamInfo};
pub use relocate::RelocateError;
pub use report::{ReportError, RunParameters, RunReport, SystemInfo};
pub use resolver::Resolver;
pub use source::{enumerate_batch, Batch, DeviceClass, EnumerateError, SourceFile};
pub use startup::{check_required_tools, detect_accelerator, ffmpeg_version, StartupError};
pub use state::{ClaimRegistry, RunStats, StatsSnapshot};

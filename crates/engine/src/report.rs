//! Run report.
//!
//! Collects per-file outcomes, totals, run parameters and system information
//! into a JSON document written next to the batch root.

use crate::codec::{Accelerator, AudioDecision, EncodePlan};
use crate::config::{Codec, Config, ScaleFactor};
use crate::coordinator::{BatchOutcome, FileOutcome};
use crate::decision::DecisionKind;
use crate::state::StatsSnapshot;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

/// Host information captured once per run.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SystemInfo {
    pub os: String,
    pub os_version: Option<String>,
    pub cpu_brand: String,
    pub logical_cores: usize,
    pub ffmpeg_version: Option<String>,
    pub accelerator: Accelerator,
}

impl SystemInfo {
    /// Collects OS and CPU details using sysinfo.
    pub fn collect(ffmpeg_version: Option<String>, accelerator: Accelerator) -> Self {
        use sysinfo::System;

        let mut sys = System::new();
        sys.refresh_cpu_all();

        let cpu_brand = sys
            .cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .filter(|brand| !brand.is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        Self {
            os: System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
            os_version: System::os_version(),
            cpu_brand,
            logical_cores: num_cpus::get(),
            ffmpeg_version,
            accelerator,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RunParameters {
    pub codec: Codec,
    pub scale: ScaleFactor,
    pub parallel: bool,
    pub workers: u32,
    pub auto_skip_duplicates: bool,
    pub repository_dir: Option<PathBuf>,
}

impl RunParameters {
    pub fn from_config(config: &Config, workers: u32) -> Self {
        Self {
            codec: config.proxy.codec,
            scale: config.proxy.scale,
            parallel: config.workers.parallel,
            workers,
            auto_skip_duplicates: config.conflicts.auto_skip_duplicates,
            repository_dir: config.locations.repository_dir.clone(),
        }
    }
}

/// Codec decision as recorded in the report.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CodecReport {
    pub requested: Codec,
    pub effective: Codec,
    pub encoder: &'static str,
    pub reason: String,
    pub override_reason: Option<String>,
    pub fallback_reason: Option<String>,
    pub gpu_scaling: bool,
    pub video_filter: String,
    pub audio: AudioDecision,
}

impl From<&EncodePlan> for CodecReport {
    fn from(plan: &EncodePlan) -> Self {
        Self {
            requested: plan.requested_codec,
            effective: plan.effective_codec,
            encoder: plan.encoder,
            reason: plan.codec_reason.clone(),
            override_reason: plan.override_reason.clone(),
            fallback_reason: plan.fallback_reason.clone(),
            gpu_scaling: plan.gpu_scaling,
            video_filter: plan.video_filter.clone(),
            audio: plan.audio.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FileReport {
    pub source: PathBuf,
    pub size_bytes: u64,
    pub consumer_device_detection: String,
    pub decision: DecisionKind,
    pub reason: String,
    pub proxy: Option<PathBuf>,
    pub codec: Option<CodecReport>,
    pub elapsed_secs: f64,
    pub proxy_size_bytes: Option<u64>,
    /// Source size divided by proxy size, for transcoded files.
    pub compression_ratio: Option<f64>,
}

impl From<&FileOutcome> for FileReport {
    fn from(outcome: &FileOutcome) -> Self {
        let proxy_size_bytes = match &outcome.decision {
            crate::decision::ProxyDecision::Transcoded { size_bytes, .. } => Some(*size_bytes),
            _ => None,
        };
        let compression_ratio = proxy_size_bytes
            .filter(|size| *size > 0)
            .map(|size| outcome.source.size_bytes as f64 / size as f64);

        Self {
            source: outcome.source.path.clone(),
            size_bytes: outcome.source.size_bytes,
            consumer_device_detection: outcome.source.device.detection_label(),
            decision: outcome.decision.kind(),
            reason: outcome.decision.reason(),
            proxy: outcome.decision.proxy_path().cloned(),
            codec: outcome.plan.as_ref().map(CodecReport::from),
            elapsed_secs: outcome.elapsed.as_secs_f64(),
            proxy_size_bytes,
            compression_ratio,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Totals {
    pub stats: StatsSnapshot,
    pub decisions: BTreeMap<DecisionKind, u64>,
    pub conflicts_resolved: usize,
    pub not_dispatched: usize,
    pub source_bytes: u64,
    pub proxy_bytes: u64,
    pub elapsed_secs: f64,
}

/// Complete JSON run report.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub root: PathBuf,
    pub proxies_dir: PathBuf,
    pub parameters: RunParameters,
    pub system: SystemInfo,
    pub totals: Totals,
    pub files: Vec<FileReport>,
    pub not_dispatched: Vec<PathBuf>,
}

impl RunReport {
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        run_id: Uuid,
        started_at: DateTime<Local>,
        root: &Path,
        proxies_dir: &Path,
        parameters: RunParameters,
        system: SystemInfo,
        outcome: &BatchOutcome,
    ) -> Self {
        let files: Vec<FileReport> = outcome.files.iter().map(FileReport::from).collect();

        let totals = Totals {
            stats: outcome.stats,
            decisions: outcome.counts(),
            conflicts_resolved: outcome.conflicts_resolved,
            not_dispatched: outcome.not_dispatched.len(),
            source_bytes: files.iter().map(|f| f.size_bytes).sum(),
            proxy_bytes: files.iter().filter_map(|f| f.proxy_size_bytes).sum(),
            elapsed_secs: outcome.elapsed.as_secs_f64(),
        };

        Self {
            run_id,
            started_at,
            finished_at: Local::now(),
            root: root.to_path_buf(),
            proxies_dir: proxies_dir.to_path_buf(),
            parameters,
            system,
            totals,
            files,
            not_dispatched: outcome.not_dispatched.clone(),
        }
    }

    /// `proxy-report-<YYYYmmdd-HHMMSS>.json`
    pub fn file_name(&self) -> String {
        format!("proxy-report-{}.json", self.started_at.format("%Y%m%d-%H%M%S"))
    }

    /// Writes the report as pretty JSON into `dir` and returns its path.
    pub fn write_json(&self, dir: &Path) -> Result<PathBuf, ReportError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecEngine;
    use crate::decision::ProxyDecision;
    use crate::probe::StreamInfo;
    use crate::source::{DeviceClass, Pairing, SourceFile};
    use std::time::Duration;
    use tempfile::TempDir;

    fn source(name: &str, size_bytes: u64) -> SourceFile {
        SourceFile {
            path: PathBuf::from(format!("/shoot/day1/{}", name)),
            stem: name.split('.').next().unwrap().to_string(),
            size_bytes,
            device: DeviceClass::Standard,
            pairing: Pairing::None,
        }
    }

    fn outcome() -> BatchOutcome {
        let plan = CodecEngine::new(Accelerator::Software, ScaleFactor::Quarter).decide(
            Codec::ProRes,
            &StreamInfo::default(),
            DeviceClass::Standard,
        );
        BatchOutcome {
            files: vec![
                FileOutcome {
                    source: source("a.mov", 4_000),
                    plan: Some(plan.clone()),
                    decision: ProxyDecision::Transcoded {
                        proxy: PathBuf::from("/shoot/proxies/a_proxy.mov"),
                        elapsed: Duration::from_millis(1500),
                        size_bytes: 1_000,
                    },
                    elapsed: Duration::from_millis(1600),
                },
                FileOutcome {
                    source: source("b.mov", 2_000),
                    plan: Some(plan),
                    decision: ProxyDecision::SkipExisting {
                        proxy: PathBuf::from("/shoot/proxies/b_proxy.mov"),
                    },
                    elapsed: Duration::from_millis(5),
                },
            ],
            not_dispatched: vec![PathBuf::from("/shoot/day1/c.mov")],
            conflicts_resolved: 0,
            stats: StatsSnapshot {
                found: 3,
                transcoded: 1,
                skipped: 1,
                ..Default::default()
            },
            elapsed: Duration::from_secs(2),
        }
    }

    fn report() -> RunReport {
        let system = SystemInfo {
            os: "Linux".to_string(),
            os_version: None,
            cpu_brand: "Test CPU".to_string(),
            logical_cores: 8,
            ffmpeg_version: Some("ffmpeg version 7.1".to_string()),
            accelerator: Accelerator::Software,
        };
        RunReport::build(
            Uuid::new_v4(),
            Local::now(),
            Path::new("/shoot/day1"),
            Path::new("/shoot/proxies"),
            RunParameters::from_config(&Config::default(), 4),
            system,
            &outcome(),
        )
    }

    #[test]
    fn test_totals_and_ratio() {
        let report = report();
        assert_eq!(report.totals.source_bytes, 6_000);
        assert_eq!(report.totals.proxy_bytes, 1_000);
        assert_eq!(report.totals.not_dispatched, 1);
        assert_eq!(report.totals.decisions.get(&DecisionKind::Transcoded), Some(&1));
        assert_eq!(report.files[0].compression_ratio, Some(4.0));
        assert_eq!(report.files[1].compression_ratio, None);
        assert_eq!(report.files[0].consumer_device_detection, "none");
    }

    #[test]
    fn test_json_shape() {
        let report = report();
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["files"][0]["decision"], "transcoded");
        assert_eq!(value["files"][0]["codec"]["effective"], "prores");
        assert_eq!(value["files"][0]["codec"]["audio"]["mode"], "drop");
        assert_eq!(value["totals"]["decisions"]["skip_existing"], 1);
        assert_eq!(value["parameters"]["scale"], "quarter");
        assert_eq!(value["system"]["accelerator"], "software");
    }

    #[test]
    fn test_write_json() {
        let tmp = TempDir::new().unwrap();
        let report = report();
        let path = report.write_json(tmp.path()).unwrap();

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("proxy-report-"));
        assert!(name.ends_with(".json"));
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains(&report.run_id.to_string()));
    }
}

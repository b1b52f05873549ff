//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Error type for configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading config file
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Error returned when a codec or scale name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported {kind}: '{value}' (expected one of: {expected})")]
pub struct UnknownChoice {
    kind: &'static str,
    value: String,
    expected: &'static str,
}

/// Proxy codec selectable by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// Apple ProRes (intermediate).
    #[serde(rename = "prores")]
    ProRes,
    /// H.264 / AVC, the broadly compatible baseline.
    H264,
    /// H.265 / HEVC.
    Hevc,
    /// Avid DNxHR (intermediate).
    #[serde(rename = "dnxhr")]
    DnxHr,
}

impl Codec {
    pub const ALL: [Codec; 4] = [Codec::ProRes, Codec::H264, Codec::Hevc, Codec::DnxHr];

    pub fn as_str(&self) -> &'static str {
        match self {
            Codec::ProRes => "prores",
            Codec::H264 => "h264",
            Codec::Hevc => "hevc",
            Codec::DnxHr => "dnxhr",
        }
    }

    /// Intermediate (mezzanine) codecs are editing-friendly and live in a MOV container.
    pub fn is_intermediate(&self) -> bool {
        matches!(self, Codec::ProRes | Codec::DnxHr)
    }
}

impl Default for Codec {
    fn default() -> Self {
        Codec::ProRes
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Codec {
    type Err = UnknownChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "prores" => Ok(Codec::ProRes),
            "h264" => Ok(Codec::H264),
            "hevc" => Ok(Codec::Hevc),
            "dnxhr" => Ok(Codec::DnxHr),
            _ => Err(UnknownChoice {
                kind: "codec",
                value: s.to_string(),
                expected: "prores, h264, hevc, dnxhr",
            }),
        }
    }
}

/// Fractional downscale applied to every proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleFactor {
    Half,
    Quarter,
}

impl ScaleFactor {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScaleFactor::Half => "half",
            ScaleFactor::Quarter => "quarter",
        }
    }

    /// Divisor applied to both input width and height.
    pub fn divisor(&self) -> u32 {
        match self {
            ScaleFactor::Half => 2,
            ScaleFactor::Quarter => 4,
        }
    }
}

impl Default for ScaleFactor {
    fn default() -> Self {
        ScaleFactor::Quarter
    }
}

impl fmt::Display for ScaleFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScaleFactor {
    type Err = UnknownChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "half" => Ok(ScaleFactor::Half),
            "quarter" => Ok(ScaleFactor::Quarter),
            _ => Err(UnknownChoice {
                kind: "scale",
                value: s.to_string(),
                expected: "half, quarter",
            }),
        }
    }
}

/// Proxy output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProxyConfig {
    /// Requested proxy codec (default prores)
    #[serde(default)]
    pub codec: Codec,
    /// Downscale factor (default quarter)
    #[serde(default)]
    pub scale: ScaleFactor,
}

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerConfig {
    /// Process files concurrently (default true)
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    /// Maximum concurrent workers (0 = auto-derive)
    #[serde(default)]
    pub max_workers: u32,
}

fn default_parallel() -> bool {
    true
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            parallel: default_parallel(),
            max_workers: 0,
        }
    }
}

/// Duplicate-proxy conflict handling
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConflictConfig {
    /// Skip every source whose proxy already exists with another extension
    #[serde(default)]
    pub auto_skip_duplicates: bool,
}

/// Filesystem locations searched for existing proxies
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationConfig {
    /// Centralized proxy repository (searched when set)
    #[serde(default)]
    pub repository_dir: Option<PathBuf>,
    /// Name of the per-batch proxies directory created next to the batch root
    #[serde(default = "default_proxies_dir_name")]
    pub proxies_dir_name: String,
    /// Deprecated per-source-directory proxies subfolder
    #[serde(default = "default_legacy_subdir_name")]
    pub legacy_subdir_name: String,
}

fn default_proxies_dir_name() -> String {
    "proxies".to_string()
}

fn default_legacy_subdir_name() -> String {
    "Proxies".to_string()
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            repository_dir: None,
            proxies_dir_name: default_proxies_dir_name(),
            legacy_subdir_name: default_legacy_subdir_name(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub conflicts: ConflictConfig,
    #[serde(default)]
    pub locations: LocationConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - PROXYGEN_CODEC -> proxy.codec
    /// - PROXYGEN_SCALE -> proxy.scale
    /// - PROXYGEN_PARALLEL -> workers.parallel
    /// - PROXYGEN_MAX_WORKERS -> workers.max_workers
    /// - PROXYGEN_AUTO_SKIP_DUPLICATES -> conflicts.auto_skip_duplicates
    /// - PROXYGEN_REPOSITORY_DIR -> locations.repository_dir
    ///
    /// Values that fail to parse leave the existing setting untouched.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("PROXYGEN_CODEC") {
            if let Ok(codec) = val.parse::<Codec>() {
                self.proxy.codec = codec;
            }
        }

        if let Ok(val) = env::var("PROXYGEN_SCALE") {
            if let Ok(scale) = val.parse::<ScaleFactor>() {
                self.proxy.scale = scale;
            }
        }

        if let Ok(val) = env::var("PROXYGEN_PARALLEL") {
            if let Some(parallel) = parse_bool(&val) {
                self.workers.parallel = parallel;
            }
        }

        if let Ok(val) = env::var("PROXYGEN_MAX_WORKERS") {
            if let Ok(workers) = val.parse::<u32>() {
                self.workers.max_workers = workers;
            }
        }

        if let Ok(val) = env::var("PROXYGEN_AUTO_SKIP_DUPLICATES") {
            if let Some(skip) = parse_bool(&val) {
                self.conflicts.auto_skip_duplicates = skip;
            }
        }

        if let Ok(val) = env::var("PROXYGEN_REPOSITORY_DIR") {
            let trimmed = val.trim();
            self.locations.repository_dir = if trimmed.is_empty() {
                None
            } else {
                Some(PathBuf::from(trimmed))
            };
        }
    }

    /// Load configuration from file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration, falling back to defaults when no file exists
    ///
    /// A file that exists but cannot be parsed is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) if p.as_ref().exists() => Self::load_from_file(p)?,
            _ => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }
}

/// Accept "true", "1", "yes" as true; "false", "0", "no" as false
fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

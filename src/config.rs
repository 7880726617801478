//! Configuration for voicenote.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (VOICENOTE_HOME, VOICENOTE_ENDPOINT)
//! 2. Config file (.voicenote/config.yaml)
//! 3. Defaults (~/.voicenote)
//!
//! Config file discovery:
//! - Searches current directory and parents for .voicenote/config.yaml
//! - `paths.home` in the config file is relative to the .voicenote/ directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::WireFormat;
use crate::sync::Retention;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

pub const DEFAULT_ENDPOINT: &str = "http://localhost:5678/webhook/ingest-audio";
pub const DEFAULT_SOURCE_IMMEDIATE: &str = "voicenote";
pub const DEFAULT_SOURCE_OFFLINE_QUEUE: &str = "voicenote-offline-queue";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub endpoint: Option<EndpointConfig>,
    #[serde(default)]
    pub sync: Option<SyncConfig>,
    #[serde(default)]
    pub sources: Option<SourcesConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to the .voicenote/ directory)
    pub home: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    pub url: Option<String>,
    pub wire_format: Option<WireFormat>,
    pub timeout_seconds: Option<u64>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    pub interval_seconds: Option<u64>,
    pub retention: Option<Retention>,
    pub probe_interval_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    pub immediate: Option<String>,
    pub offline_queue: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to voicenote home
    pub home: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Remote sink settings
    pub endpoint: EndpointSettings,
    /// Coordinator settings
    pub sync: SyncSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSettings {
    pub url: String,
    pub wire_format: WireFormat,
    pub timeout_seconds: u64,
    pub content_type: String,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_ENDPOINT.to_string(),
            wire_format: WireFormat::Multipart,
            timeout_seconds: 30,
            content_type: "audio/webm".to_string(),
        }
    }
}

impl EndpointSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub interval_seconds: u64,
    pub retention: Retention,
    pub probe_interval_seconds: u64,
    pub source_immediate: String,
    pub source_offline_queue: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            retention: Retention::Delete,
            probe_interval_seconds: 15,
            source_immediate: DEFAULT_SOURCE_IMMEDIATE.to_string(),
            source_offline_queue: DEFAULT_SOURCE_OFFLINE_QUEUE.to_string(),
        }
    }
}

impl SyncSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.max(1))
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_seconds.max(1))
    }
}

impl ResolvedConfig {
    /// Directory holding the recording store
    pub fn store_dir(&self) -> PathBuf {
        self.home.join("store")
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".voicenote").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Merge a parsed config file over the defaults
fn apply_file(
    config: ConfigFile,
    config_path: &Path,
    default_home: PathBuf,
) -> (PathBuf, EndpointSettings, SyncSettings) {
    let voicenote_dir = config_path.parent().unwrap_or(Path::new("."));
    let home = match config.paths.home {
        Some(ref home_path) => resolve_path(voicenote_dir, home_path),
        None => default_home,
    };

    let mut endpoint = EndpointSettings::default();
    if let Some(file) = config.endpoint {
        if let Some(url) = file.url {
            endpoint.url = url;
        }
        if let Some(wire_format) = file.wire_format {
            endpoint.wire_format = wire_format;
        }
        if let Some(timeout) = file.timeout_seconds {
            endpoint.timeout_seconds = timeout;
        }
        if let Some(content_type) = file.content_type {
            endpoint.content_type = content_type;
        }
    }

    let mut sync = SyncSettings::default();
    if let Some(file) = config.sync {
        if let Some(interval) = file.interval_seconds {
            sync.interval_seconds = interval;
        }
        if let Some(retention) = file.retention {
            sync.retention = retention;
        }
        if let Some(probe) = file.probe_interval_seconds {
            sync.probe_interval_seconds = probe;
        }
    }
    if let Some(sources) = config.sources {
        if let Some(immediate) = sources.immediate {
            sync.source_immediate = immediate;
        }
        if let Some(offline_queue) = sources.offline_queue {
            sync.source_offline_queue = offline_queue;
        }
    }

    (home, endpoint, sync)
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".voicenote");

    let config_file = find_config_file();

    let (mut home, mut endpoint, sync) = match config_file {
        Some(ref config_path) => {
            let config = load_config_file(config_path)?;
            apply_file(config, config_path, default_home)
        }
        None => (
            default_home,
            EndpointSettings::default(),
            SyncSettings::default(),
        ),
    };

    if let Ok(env_home) = std::env::var("VOICENOTE_HOME") {
        home = PathBuf::from(env_home);
    }
    if let Ok(env_endpoint) = std::env::var("VOICENOTE_ENDPOINT") {
        endpoint.url = env_endpoint;
    }

    Ok(ResolvedConfig {
        home,
        config_file,
        endpoint,
        sync,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Get the recording store directory ($VOICENOTE_HOME/store)
pub fn store_dir() -> Result<PathBuf> {
    Ok(config()?.store_dir())
}

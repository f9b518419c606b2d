use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;
use crate::error::DevlogError;
use crate::log_entry::LogLevel;

/// Main configuration for devlog
///
/// Loaded once at process start. Every section carries its own defaults, so an
/// absent file or an absent section falls back to hard-coded values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Level filtering
    pub levels: LevelsConfig,

    /// File sink
    pub file: FileConfig,

    /// On-screen overlay sink
    pub screen: ScreenConfig,

    /// Remote HTTP sink
    pub remote: RemoteConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Read failures surface as [`DevlogError::Io`], parse failures as
    /// [`DevlogError::Config`].
    pub fn from_file(path: &Path) -> Result<Self, DevlogError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML file, or use defaults when it does not exist
    ///
    /// A file that exists but does not parse is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self, DevlogError> {
        if !path.exists() {
            warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, DevlogError> {
        toml::from_str(content)
            .map_err(|e| DevlogError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, DevlogError> {
        toml::to_string_pretty(self)
            .map_err(|e| DevlogError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Directory log files are written to
    pub fn log_directory(&self) -> PathBuf {
        self.general.data_root().join(&self.file.log_file_path)
    }
}

/// General settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Application name, used for the default data directory
    pub instance_name: String,

    /// Root for persistent data; defaults to the platform local data directory
    pub data_root: Option<PathBuf>,
}

impl GeneralConfig {
    /// Resolve the persistent data root
    pub fn data_root(&self) -> PathBuf {
        match &self.data_root {
            Some(root) => root.clone(),
            None => dirs::data_local_dir()
                .map(|dir| dir.join(&self.instance_name))
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            instance_name: "devlog".to_string(),
            data_root: None,
        }
    }
}

/// Level filtering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelsConfig {
    /// Global level applied to sources without an override
    pub global_log_level: i32,

    /// Floor raising the global level for extra granularity; -1 disables
    pub expanded_log_level: i32,

    /// Raw per-source overrides keyed by source (usually a module path)
    pub overrides: BTreeMap<String, i32>,
}

impl Default for LevelsConfig {
    fn default() -> Self {
        Self {
            global_log_level: LogLevel::Common.as_i32(),
            expanded_log_level: -1,
            overrides: BTreeMap::new(),
        }
    }
}

/// How log files are kept across sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageStrategy {
    /// One file, appended to forever
    Monolithic,
    /// A new file per session, stamped with the session start time
    Generational,
    /// The last session's file is kept with a `_previous` suffix
    KeepPrevious,
    /// The file is truncated on startup
    CurrentSessionOnly,
}

impl Default for StorageStrategy {
    fn default() -> Self {
        Self::KeepPrevious
    }
}

/// File output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub enabled: bool,
    /// Write every kind to one file instead of one file per kind
    pub single_combined_log: bool,
    pub storage_strategy: StorageStrategy,
    /// Folder under the data root
    pub log_file_path: String,
    /// Base file name, without extension
    pub log_file_name: String,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            single_combined_log: true,
            storage_strategy: StorageStrategy::default(),
            log_file_path: "Logs".to_string(),
            log_file_name: "debug_log".to_string(),
        }
    }
}

/// How expired overlay entries are removed on each sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepPolicy {
    /// Remove every expired entry
    Drain,
    /// Remove at most one expired entry
    Throttled,
}

impl Default for SweepPolicy {
    fn default() -> Self {
        Self::Drain
    }
}

/// On-screen overlay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    pub enabled: bool,
    /// Seconds an entry stays visible
    pub show_time: f32,
    pub font_size: u32,
    /// Reference resolution of the overlay region
    pub resolution: [u32; 2],
    pub sweep: SweepPolicy,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            show_time: 10.0,
            font_size: 16,
            resolution: [1920, 1080],
            sweep: SweepPolicy::default(),
        }
    }
}

/// Remote HTTP sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub enabled: bool,
    /// Collector URL receiving one POST per record
    pub endpoint: String,
    pub timeout_seconds: u64,
    /// Maximum concurrent deliveries, 0 for unbounded
    pub max_in_flight: usize,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://127.0.0.1:5000/logs".to_string(),
            timeout_seconds: 10,
            max_in_flight: 0,
        }
    }
}

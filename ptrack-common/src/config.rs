//! Bootstrap configuration and root folder resolution
//!
//! The TOML file carries bootstrap settings only (port, storage backend,
//! collaborator endpoint, limits). Every key is optional; a missing file
//! yields the compiled defaults.
//!
//! Root folder priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

use crate::activity::DEFAULT_WEEKLY_TARGET_HOURS;
use crate::{Error, Result};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "PTRACK_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "ptrack.db";

/// Audio payload directory inside the root folder
pub const UPLOADS_DIR: &str = "uploads";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5780;

/// Default upload body limit (25 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Which Storage implementation backs the service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::Sqlite => f.write_str("sqlite"),
            StorageBackend::Memory => f.write_str("memory"),
        }
    }
}

impl FromStr for StorageBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(StorageBackend::Sqlite),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(Error::Config(format!(
                "Unknown storage backend '{}' (expected 'sqlite' or 'memory')",
                other
            ))),
        }
    }
}

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Root folder for the database and uploaded audio
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP server port (default 5780)
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub storage: Option<StorageBackend>,

    /// Upload body limit in bytes
    #[serde(default)]
    pub max_upload_bytes: Option<usize>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub collaborator: CollaboratorConfig,

    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    #[serde(default)]
    pub activity: ActivityConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// External speech/reasoning service settings
#[derive(Debug, Clone, Deserialize)]
pub struct CollaboratorConfig {
    /// Credential; the `OPENAI_API_KEY` environment variable takes precedence
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,

    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            transcription_model: default_transcription_model(),
            chat_model: default_chat_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Background enrichment settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnrichmentConfig {
    /// Cap on concurrently running pipelines; absent means unbounded
    #[serde(default)]
    pub max_concurrent: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivityConfig {
    /// Weekly hours counted as 100% friend progress
    #[serde(default = "default_weekly_target_hours")]
    pub weekly_target_hours: f64,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            weekly_target_hours: default_weekly_target_hours(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_transcription_model() -> String {
    "whisper-1".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_weekly_target_hours() -> f64 {
    DEFAULT_WEEKLY_TARGET_HOURS
}

impl TomlConfig {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn storage(&self) -> StorageBackend {
        self.storage.unwrap_or_default()
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES)
    }

    /// Reject values that would only fail later at runtime
    pub fn validate(&self) -> Result<()> {
        if self.enrichment.max_concurrent == Some(0) {
            return Err(Error::Config(
                "enrichment.max_concurrent must be at least 1 (omit it for no cap)".to_string(),
            ));
        }
        let target = self.activity.weekly_target_hours;
        if !target.is_finite() || target <= 0.0 {
            return Err(Error::Config(format!(
                "activity.weekly_target_hours must be positive, got {}",
                target
            )));
        }
        if self.collaborator.timeout_secs == 0 {
            return Err(Error::Config(
                "collaborator.timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default configuration file path: `<config_dir>/ptrack/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ptrack").join("config.toml"))
}

/// Load the TOML bootstrap file.
///
/// A missing file is not an error: defaults are returned and a warning is
/// logged. An unreadable or malformed file is a configuration error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file not found at {}, using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;
    config.validate()?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Resolve the root folder: CLI → `PTRACK_ROOT_FOLDER` → TOML → OS default
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("ptrack"))
        .unwrap_or_else(|| PathBuf::from("./ptrack_data"))
}

/// Layout of the resolved root folder
#[derive(Debug, Clone)]
pub struct RootFolder {
    path: PathBuf,
}

impl RootFolder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn database_path(&self) -> PathBuf {
        self.path.join(DATABASE_FILE)
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.path.join(UPLOADS_DIR)
    }

    /// Create the root folder and its uploads directory if missing
    pub fn ensure_exists(&self) -> Result<()> {
        std::fs::create_dir_all(self.uploads_dir())?;
        Ok(())
    }
}

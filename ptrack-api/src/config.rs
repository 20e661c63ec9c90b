//! Runtime configuration resolution for ptrack-api
//!
//! The collaborator credential is resolved with ENV → TOML priority. Absence
//! is not an error: enrichment and suggestions run in degraded mode.

use ptrack_common::config::{CollaboratorConfig, StorageBackend, TomlConfig};
use tracing::{info, warn};

/// Environment variable holding the collaborator credential
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Resolve the collaborator API key
///
/// **Priority:** ENV → TOML. `None` when neither holds a usable value.
pub fn resolve_api_key(config: &CollaboratorConfig) -> Option<String> {
    let env_key = std::env::var(API_KEY_ENV).ok();
    select_api_key(env_key, config.api_key.clone())
}

fn select_api_key(env_key: Option<String>, toml_key: Option<String>) -> Option<String> {
    let env_key = env_key.filter(|k| is_valid_key(k));
    let toml_key = toml_key.filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            "Collaborator API key found in multiple sources: environment, TOML. \
             Using environment (highest priority)."
        );
    }

    if let Some(key) = env_key {
        info!("Collaborator API key loaded from environment variable");
        return Some(key);
    }

    if let Some(key) = toml_key {
        info!("Collaborator API key loaded from TOML config");
        return Some(key);
    }

    warn!(
        "No collaborator API key configured ({} or [collaborator].api_key); \
         enrichment is disabled and suggestions use defaults",
        API_KEY_ENV
    );
    None
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Settings handlers read at request time
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub storage: StorageBackend,
    pub max_upload_bytes: usize,
    pub weekly_target_hours: f64,
}

impl ServiceSettings {
    pub fn from_toml(config: &TomlConfig, storage: StorageBackend) -> Self {
        Self {
            storage,
            max_upload_bytes: config.max_upload_bytes(),
            weekly_target_hours: config.activity.weekly_target_hours,
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::from_toml(&TomlConfig::default(), StorageBackend::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_wins_over_toml() {
        let key = select_api_key(Some("env-key".into()), Some("toml-key".into()));
        assert_eq!(key.as_deref(), Some("env-key"));
    }

    #[test]
    fn test_blank_environment_falls_through() {
        let key = select_api_key(Some("   ".into()), Some("toml-key".into()));
        assert_eq!(key.as_deref(), Some("toml-key"));
    }

    #[test]
    fn test_no_key_anywhere() {
        assert_eq!(select_api_key(None, Some(String::new())), None);
        assert_eq!(select_api_key(None, None), None);
    }

    #[test]
    fn test_settings_defaults() {
        let settings = ServiceSettings::default();
        assert_eq!(settings.storage, StorageBackend::Sqlite);
        assert_eq!(settings.max_upload_bytes, 25 * 1024 * 1024);
        assert_eq!(settings.weekly_target_hours, 25.0);
    }
}

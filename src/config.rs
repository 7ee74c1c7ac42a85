//! # Configuration Management
//!
//! Loads application configuration from multiple sources:
//! - TOML configuration file (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Deployment overrides (`HOST`, `PORT`, `MODELS_ROOT`)
//! 2. Environment variables (`APP_SERVER__PORT`, `APP_STORAGE__MODELS_ROOT`, ...)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)
//!
//! Nested keys are separated by a double underscore in environment variables
//! so that snake_case field names survive (`APP_STORAGE__LEGACY_MODELS_ROOT`).

use crate::paths::normalizer::lexical_normalize;
use crate::paths::TrustedRoots;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Main application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
}

/// Server-specific configuration settings.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any IP address (production)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Where model sets live and where registry events go.
///
/// ## Fields:
/// - `models_root`: current-generation models directory; foreign paths are
///   rebased here
/// - `legacy_models_root`: older directory still accepted for existing sets
/// - `anchors`: directory names marking the rebasing point in foreign paths;
///   empty means "the last segment of each root" (usually `models`)
/// - `event_log_path`: append-only registry event log
/// - `allow_runtime_root_changes`: lets `PUT /api/v1/config` move the roots
///   and anchors; off by default. Only the config file and environment can
///   set it, never the runtime update itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub models_root: String,
    pub legacy_models_root: String,
    #[serde(default)]
    pub anchors: Vec<String>,
    pub event_log_path: String,
    #[serde(default)]
    pub allow_runtime_root_changes: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            storage: StorageConfig {
                models_root: "backend/models".to_string(),
                legacy_models_root: "models".to_string(),
                anchors: Vec::new(),
                event_log_path: "logs/registry_events.log".to_string(),
                allow_runtime_root_changes: false,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from all sources in priority order.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__HOST=0.0.0.0`: Override server host
    /// - `APP_STORAGE__MODELS_ROOT=/srv/models`: Override the current root
    /// - `APP_STORAGE__ANCHORS=models,model_store`: Comma separated anchors
    /// - `APP_STORAGE__ALLOW_RUNTIME_ROOT_CHANGES=true`: Allow moving roots at runtime
    /// - `HOST`, `PORT`, `MODELS_ROOT`: Special cases for deployment platforms
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("storage.anchors")
                    .try_parsing(true),
            );

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        if let Ok(root) = env::var("MODELS_ROOT") {
            settings = settings.set_override("storage.models_root", root)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Check that the configuration values make sense.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow!("Server port cannot be 0"));
        }

        let storage = &self.storage;
        if storage.models_root.trim().is_empty() {
            return Err(anyhow!("storage.models_root cannot be empty"));
        }
        if storage.legacy_models_root.trim().is_empty() {
            return Err(anyhow!("storage.legacy_models_root cannot be empty"));
        }
        if lexical_normalize(Path::new(&storage.models_root))
            == lexical_normalize(Path::new(&storage.legacy_models_root))
        {
            return Err(anyhow!("Current and legacy models roots must differ"));
        }

        for anchor in &storage.anchors {
            let anchor = anchor.trim();
            if anchor.is_empty() || anchor.contains(['/', '\\']) || anchor == "." || anchor == ".." {
                return Err(anyhow!("Invalid anchor component '{}'", anchor));
            }
        }

        if storage.event_log_path.trim().is_empty() {
            return Err(anyhow!("storage.event_log_path cannot be empty"));
        }

        Ok(())
    }

    /// Build the trusted roots described by the storage section.
    pub fn trusted_roots(&self) -> Result<TrustedRoots> {
        TrustedRoots::new(
            &self.storage.models_root,
            &self.storage.legacy_models_root,
            &self.storage.anchors,
        )
        .map_err(|e| anyhow!("Invalid models root configuration: {}", e))
    }

    /// Update configuration from a JSON string (runtime config updates).
    ///
    /// Only the fields present in the JSON are changed, e.g.
    /// `{"storage": {"models_root": "/srv/models"}}`. The result is validated
    /// before returning.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        let partial_config: serde_json::Value = serde_json::from_str(json_str)?;

        if let Some(server) = partial_config.get("server") {
            if let Some(host) = server.get("host").and_then(|v| v.as_str()) {
                self.server.host = host.to_string();
            }
            if let Some(port) = server.get("port").and_then(|v| v.as_u64()) {
                self.server.port =
                    u16::try_from(port).map_err(|_| anyhow!("Port {} is out of range", port))?;
            }
        }

        if let Some(storage) = partial_config.get("storage") {
            if let Some(root) = storage.get("models_root").and_then(|v| v.as_str()) {
                self.storage.models_root = root.to_string();
            }
            if let Some(root) = storage.get("legacy_models_root").and_then(|v| v.as_str()) {
                self.storage.legacy_models_root = root.to_string();
            }
            if let Some(anchors) = storage.get("anchors").and_then(|v| v.as_array()) {
                self.storage.anchors = anchors
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(str::to_string)
                    .collect();
            }
            if let Some(path) = storage.get("event_log_path").and_then(|v| v.as_str()) {
                self.storage.event_log_path = path.to_string();
            }
        }

        self.validate()?;
        Ok(())
    }

    /// True if `other` needs different trusted roots than `self`.
    pub fn roots_changed(&self, other: &AppConfig) -> bool {
        self.storage.models_root != other.storage.models_root
            || self.storage.legacy_models_root != other.storage.legacy_models_root
            || self.storage.anchors != other.storage.anchors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.storage.legacy_models_root = "./backend/models/".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.storage.anchors = vec!["models/whisper".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_update() {
        let mut config = AppConfig::default();
        let json = r#"{"server": {"port": 9090}}"#;
        assert!(config.update_from_json(json).is_ok());
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1");

        assert!(config.update_from_json(r#"{"server": {"port": 70000}}"#).is_err());
    }

    #[test]
    fn test_storage_update_changes_roots() {
        let original = AppConfig::default();
        let mut updated = original.clone();
        let json = r#"{"storage": {"models_root": "/srv/models", "anchors": ["models", "model_store"]}}"#;
        updated.update_from_json(json).unwrap();

        assert!(original.roots_changed(&updated));
        let roots = updated.trusted_roots().unwrap();
        assert!(roots.current().ends_with("models"));
        assert_eq!(roots.anchors().len(), 2);
    }

    #[test]
    fn test_runtime_update_cannot_unlock_root_changes() {
        let mut config = AppConfig::default();
        let json = r#"{"storage": {"allow_runtime_root_changes": true}}"#;
        config.update_from_json(json).unwrap();
        assert!(!config.storage.allow_runtime_root_changes);
    }
}

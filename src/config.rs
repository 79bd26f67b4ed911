/// Configuration module for the embedding server.
///
/// Handles loading, validating, and providing default configuration values.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ── Default value functions ──────────────────────────────────────────

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_model_name() -> String {
    "intfloat/multilingual-e5-base".to_string()
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models/multilingual-e5-base")
}

fn default_dimensions() -> usize {
    768
}

fn default_max_length() -> usize {
    512
}

fn default_intra_threads() -> usize {
    4
}

fn default_batch_size() -> usize {
    32
}

fn default_true() -> bool {
    true
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelConfig {
    /// HuggingFace model id, used to build download URLs.
    #[serde(default = "default_model_name")]
    pub name: String,

    #[serde(default = "default_model_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    #[serde(default = "default_max_length")]
    pub max_length: usize,

    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,

    /// Texts per ONNX session run; larger requests are split into chunks.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Feed a zeroed `token_type_ids` input. XLM-RoBERTa exports don't take one.
    #[serde(default)]
    pub token_type_ids: bool,

    #[serde(default = "default_true")]
    pub auto_download: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    /// Upper bound on texts per `/batch-embed` request. Unlimited when unset.
    #[serde(default)]
    pub max_batch_size: Option<usize>,

    /// Answer 400 for `type` values other than `query`/`passage` instead of
    /// encoding the text without a prefix.
    #[serde(default)]
    pub reject_unknown_type: bool,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            dir: default_model_dir(),
            dimensions: default_dimensions(),
            max_length: default_max_length(),
            intra_threads: default_intra_threads(),
            batch_size: default_batch_size(),
            token_type_ids: false,
            auto_download: default_true(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            max_batch_size: None,
            reject_unknown_type: false,
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// A missing file yields the default configuration; a file that exists
    /// but fails to parse is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("{} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;

        let cfg: Config = serde_json::from_str(&data)
            .with_context(|| format!("invalid JSON in {}", path.display()))?;

        info!("Loaded configuration from {}", path.display());
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data)
            .with_context(|| format!("failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.model.name.trim().is_empty(),
            "model.name must not be empty"
        );
        anyhow::ensure!(
            self.model.dimensions > 0,
            "model.dimensions must be positive"
        );
        anyhow::ensure!(
            self.model.max_length > 0,
            "model.max_length must be positive"
        );
        anyhow::ensure!(
            self.model.intra_threads > 0,
            "model.intra_threads must be positive"
        );
        anyhow::ensure!(
            self.model.batch_size > 0,
            "model.batch_size must be positive"
        );
        anyhow::ensure!(
            self.api.max_batch_size != Some(0),
            "api.max_batch_size must be positive when set"
        );
        if self.server.port == 0 {
            warn!("server.port is 0, an ephemeral port will be chosen");
        }
        Ok(())
    }

    /// Socket address string the server binds to.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.model.name, "intfloat/multilingual-e5-base");
        assert_eq!(config.model.dimensions, 768);
        assert_eq!(config.model.max_length, 512);
        assert_eq!(config.model.batch_size, 32);
        assert!(!config.model.token_type_ids);
        assert!(config.model.auto_download);
        assert_eq!(config.api.max_batch_size, None);
        assert!(!config.api.reject_unknown_type);
        assert_eq!(config.bind_addr(), "0.0.0.0:8000");
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"{"server": {"port": 9000}, "api": {"reject_unknown_type": true}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.server.port, 9000);
        assert!(config.api.reject_unknown_type);
        // Other fields should have defaults
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.model.dimensions, 768);
        assert_eq!(config.api.max_batch_size, None);

        let config: Config = serde_json::from_str(r#"{"api": {"max_batch_size": 64}}"#).unwrap();
        assert_eq!(config.api.max_batch_size, Some(64));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_load_invalid_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.server.port = 8123;
        config.model.dir = PathBuf::from("/opt/models/e5");
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.server.port, 8123);
        assert_eq!(loaded.model.dir, PathBuf::from("/opt/models/e5"));
    }

    #[test]
    fn test_validate_ok() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bad_dimensions() {
        let mut config = Config::default();
        config.model.dimensions = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_batch_size() {
        let mut config = Config::default();
        config.api.max_batch_size = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_model_batch_size() {
        let mut config = Config::default();
        config.model.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_empty_model_name() {
        let mut config = Config::default();
        config.model.name = "  ".to_string();
        assert!(config.validate().is_err());
    }
}

//! Application configuration.
//!
//! Settings come from an optional TOML file and are then overridden by
//! environment variables. The result is passed explicitly into every
//! component constructor.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Error, Result};

pub const ENV_CONFIG_FILE: &str = "ALPHATRADE_CONFIG";
pub const ENV_FINNHUB_API_KEY: &str = "ALPHATRADE_FINNHUB_API_KEY";
pub const ENV_GEMINI_API_KEY: &str = "ALPHATRADE_GEMINI_API_KEY";
pub const ENV_DATA_DIR: &str = "ALPHATRADE_DATA_DIR";

pub const DEFAULT_FINNHUB_BASE_URL: &str = "https://finnhub.io/api/v1";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Global operating mode shown to the user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// At least one live collaborator is configured
    Live,
    /// Everything is generated locally
    Simulated,
}

/// What the ledger does with a SELL that exceeds the held quantity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SellPolicy {
    /// Record the sale; an unheld symbol is ignored and an over-sell closes
    /// the position.
    #[default]
    Permissive,
    /// Reject sales of more shares than are held.
    Strict,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub finnhub_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub finnhub_base_url: String,
    pub gemini_base_url: String,
    pub gemini_model: String,
    /// Directory holding the ledger records
    pub data_dir: PathBuf,
    pub sell_policy: SellPolicy,
    /// Artificial delay applied to simulated responses
    pub simulated_latency_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            finnhub_api_key: None,
            gemini_api_key: None,
            finnhub_base_url: DEFAULT_FINNHUB_BASE_URL.to_string(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            data_dir: Self::default_data_dir(),
            sell_policy: SellPolicy::default(),
            simulated_latency_ms: 0,
        }
    }
}

impl AppConfig {
    /// Get the default data directory: `~/.alphatrade`.
    pub fn default_data_dir() -> PathBuf {
        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".alphatrade"))
            .unwrap_or_else(|| PathBuf::from(".alphatrade"))
    }

    /// Get the default config file path.
    ///
    /// Can be overridden with the `ALPHATRADE_CONFIG` environment variable.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = env::var(ENV_CONFIG_FILE) {
            return PathBuf::from(path);
        }
        Self::default_data_dir().join("config.toml")
    }

    /// Load from `path` (or the default path) and apply environment overrides.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::default_path);
        let mut config = Self::load_from_path(&path)?;
        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    /// Load from a TOML file without consulting the environment.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Self =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.normalize();
        Ok(config)
    }

    /// Apply overrides from a variable lookup (normally the process environment).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_FINNHUB_API_KEY) {
            self.finnhub_api_key = Some(key);
        }
        if let Some(key) = lookup(ENV_GEMINI_API_KEY) {
            self.gemini_api_key = Some(key);
        }
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|d| !d.trim().is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        self.normalize();
    }

    // Blank keys count as absent.
    fn normalize(&mut self) {
        for key in [&mut self.finnhub_api_key, &mut self.gemini_api_key] {
            if key.as_deref().is_some_and(|k| k.trim().is_empty()) {
                *key = None;
            }
        }
    }

    pub fn finnhub_key(&self) -> Option<&str> {
        self.finnhub_api_key.as_deref()
    }

    pub fn gemini_key(&self) -> Option<&str> {
        self.gemini_api_key.as_deref()
    }

    pub fn mode(&self) -> Mode {
        if self.finnhub_key().is_some() || self.gemini_key().is_some() {
            Mode::Live
        } else {
            Mode::Simulated
        }
    }

    pub fn simulated_latency(&self) -> Duration {
        Duration::from_millis(self.simulated_latency_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_simulated() {
        let config = AppConfig::default();
        assert_eq!(config.mode(), Mode::Simulated);
        assert_eq!(config.sell_policy, SellPolicy::Permissive);
        assert_eq!(config.finnhub_base_url, DEFAULT_FINNHUB_BASE_URL);
    }

    #[test]
    fn test_either_key_selects_live_mode() {
        let mut config = AppConfig::default();
        config.apply_overrides(lookup_from(&[(ENV_GEMINI_API_KEY, "g-key")]));
        assert_eq!(config.mode(), Mode::Live);
        assert!(config.finnhub_key().is_none());

        let mut config = AppConfig::default();
        config.apply_overrides(lookup_from(&[(ENV_FINNHUB_API_KEY, "f-key")]));
        assert_eq!(config.mode(), Mode::Live);
        assert_eq!(config.finnhub_key(), Some("f-key"));
    }

    #[test]
    fn test_blank_key_counts_as_absent() {
        let mut config = AppConfig::default();
        config.apply_overrides(lookup_from(&[(ENV_FINNHUB_API_KEY, "   ")]));
        assert!(config.finnhub_key().is_none());
        assert_eq!(config.mode(), Mode::Simulated);
    }

    #[test]
    fn test_from_toml() {
        let config = AppConfig::from_toml(
            r#"
            finnhub_api_key = "abc"
            data_dir = "/tmp/alphatrade-test"
            sell_policy = "strict"
            simulated_latency_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.finnhub_key(), Some("abc"));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/alphatrade-test"));
        assert_eq!(config.sell_policy, SellPolicy::Strict);
        assert_eq!(config.simulated_latency(), Duration::from_millis(250));
        // Unset fields keep their defaults
        assert_eq!(config.gemini_model, DEFAULT_GEMINI_MODEL);
    }

    #[test]
    fn test_malformed_toml() {
        let result = AppConfig::from_toml("sell_policy = 42");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "finnhub_api_key = \"from-file\"\n").unwrap();

        let mut config = AppConfig::load_from_path(&path).unwrap();
        config.apply_overrides(lookup_from(&[
            (ENV_FINNHUB_API_KEY, "from-env"),
            (ENV_DATA_DIR, "/var/lib/alphatrade"),
        ]));

        assert_eq!(config.finnhub_key(), Some("from-env"));
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/alphatrade"));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = AppConfig::load_from_path(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.mode(), Mode::Simulated);
    }

    #[test]
    fn test_unreadable_file_is_config_error() {
        let dir = tempdir().unwrap();
        // A directory exists but cannot be read as a file
        let result = AppConfig::load_from_path(dir.path());
        assert!(matches!(result, Err(Error::Config(_))));
    }
}

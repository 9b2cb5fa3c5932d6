//! Helpdesk configuration.
//!
//! Built-in defaults, overlaid by an optional TOML file, overlaid by
//! environment variables. The daemon applies CLI flags on top.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::classifier::{ClassificationEngine, DEFAULT_TIMEOUT};
use crate::escalation::EscalationConfig;

/// Environment variable naming the TOML config file.
pub const CONFIG_PATH_ENV: &str = "HELPDESK_CONFIG";

/// Remote classifier settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NlpConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    /// `false` classifies with the keyword rules only.
    pub enabled: bool,
}

impl Default for NlpConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            enabled: true,
        }
    }
}

impl NlpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Build the classification engine this config describes.
    pub fn build_engine(&self) -> Result<ClassificationEngine> {
        if !self.enabled {
            return Ok(ClassificationEngine::rules_only());
        }
        ClassificationEngine::http(&self.base_url, self.timeout())
            .context("Failed to build NLP classification client")
    }
}

/// Periodic SLA sweep settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub interval_secs: u64,
    pub startup_delay_secs: u64,
    pub batch_limit: Option<usize>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: 15 * 60,
            startup_delay_secs: 5,
            batch_limit: None,
        }
    }
}

impl SweepConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_secs)
    }

    pub fn escalation(&self) -> EscalationConfig {
        EscalationConfig {
            batch_limit: self.batch_limit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    Rocksdb,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "rocksdb" => Ok(Self::Rocksdb),
            other => anyhow::bail!("unknown store backend {:?} (expected memory or rocksdb)", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: PathBuf::from("./helpdesk-state"),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HelpdeskConfig {
    pub nlp: NlpConfig,
    pub sweep: SweepConfig,
    pub store: StoreConfig,
}

impl HelpdeskConfig {
    /// Load from `path` (or `HELPDESK_CONFIG`, if set), then apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(env_path) {
            Some(p) => Self::from_file(&p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse helpdesk config TOML")
    }

    /// Overlay environment variables read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup("NLP_SERVICE_URL") {
            self.nlp.base_url = url;
        }
        if let Some(ms) = lookup("NLP_TIMEOUT_MS") {
            self.nlp.timeout_ms = ms
                .parse()
                .with_context(|| format!("NLP_TIMEOUT_MS is not a number: {:?}", ms))?;
        }
        if let Some(secs) = lookup("SLA_SWEEP_INTERVAL_SECS") {
            self.sweep.interval_secs = secs
                .parse()
                .with_context(|| format!("SLA_SWEEP_INTERVAL_SECS is not a number: {:?}", secs))?;
        }
        if let Some(secs) = lookup("SLA_SWEEP_STARTUP_DELAY_SECS") {
            self.sweep.startup_delay_secs = secs.parse().with_context(|| {
                format!("SLA_SWEEP_STARTUP_DELAY_SECS is not a number: {:?}", secs)
            })?;
        }
        if let Some(backend) = lookup("HELPDESK_STORE") {
            self.store.backend = backend.parse()?;
        }
        if let Some(path) = lookup("HELPDESK_STATE_PATH") {
            self.store.path = PathBuf::from(path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = HelpdeskConfig::default();
        assert_eq!(config.nlp.base_url, "http://localhost:8000");
        assert_eq!(config.nlp.timeout(), Duration::from_secs(5));
        assert_eq!(config.sweep.interval(), Duration::from_secs(900));
        assert_eq!(config.sweep.startup_delay(), Duration::from_secs(5));
        assert_eq!(config.sweep.batch_limit, None);
        assert_eq!(config.store.backend, StoreBackend::Memory);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = HelpdeskConfig::from_toml(
            r#"
            [nlp]
            base_url = "http://nlp.internal:9000"

            [sweep]
            batch_limit = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.nlp.base_url, "http://nlp.internal:9000");
        assert_eq!(config.nlp.timeout_ms, 5000);
        assert!(config.nlp.enabled);
        assert_eq!(config.sweep.batch_limit, Some(250));
        assert_eq!(config.sweep.interval_secs, 900);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = HelpdeskConfig::from_toml(
            r#"
            [store]
            backend = "memory"
            "#,
        )
        .unwrap();
        let env: HashMap<&str, &str> = [
            ("NLP_SERVICE_URL", "http://nlp:8000"),
            ("NLP_TIMEOUT_MS", "1500"),
            ("SLA_SWEEP_INTERVAL_SECS", "60"),
            ("HELPDESK_STORE", "rocksdb"),
            ("HELPDESK_STATE_PATH", "/var/lib/helpdesk"),
        ]
        .into_iter()
        .collect();

        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.nlp.base_url, "http://nlp:8000");
        assert_eq!(config.nlp.timeout_ms, 1500);
        assert_eq!(config.sweep.interval_secs, 60);
        assert_eq!(config.store.backend, StoreBackend::Rocksdb);
        assert_eq!(config.store.path, PathBuf::from("/var/lib/helpdesk"));
    }

    #[test]
    fn test_bad_env_value_is_an_error() {
        let mut config = HelpdeskConfig::default();
        let err = config
            .apply_env(|k| (k == "NLP_TIMEOUT_MS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("NLP_TIMEOUT_MS"));
    }

    #[test]
    fn test_disabled_nlp_builds_rules_only_engine() {
        let nlp = NlpConfig {
            enabled: false,
            ..NlpConfig::default()
        };
        assert!(!nlp.build_engine().unwrap().has_remote());
        assert!(NlpConfig::default().build_engine().unwrap().has_remote());
    }

    #[test]
    fn test_unknown_backend_rejected() {
        assert!("postgres".parse::<StoreBackend>().is_err());
    }
}

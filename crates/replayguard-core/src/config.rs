//! Replay configuration (spec §3 `ReplayConfig`, §6.2 config file format).
//!
//! Grounded on the teacher's `openapi_routes/registry.rs::new_with_env`
//! env-driven configuration pattern, adapted to a config-file-first model
//! (spec §6.2) since replayguard has no long-lived server process to carry
//! environment state for.

use crate::error::{Error, Result};
use crate::judge::ComparisonMode;
use crate::tolerance::ToleranceConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which response examples a contract importer should prefer when a route
/// has more than one 2xx response documented (spec §9 open question).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ContractExampleSelection {
    /// Take the first 2xx status encountered, in ascending numeric order.
    #[default]
    FirstSuccess,
    /// Always prefer a specific status code when present, falling back to
    /// `FirstSuccess` otherwise.
    PreferStatus,
}

/// Contract-import knobs (spec §4.H).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractImportConfig {
    /// Which example a route's multiple 2xx responses resolve to.
    #[serde(default)]
    pub example_selection: ContractExampleSelection,
    /// The status `PreferStatus` resolves to, when set.
    #[serde(default)]
    pub preferred_status: Option<u16>,
}

impl Default for ContractImportConfig {
    fn default() -> Self {
        Self { example_selection: ContractExampleSelection::FirstSuccess, preferred_status: Some(200) }
    }
}

/// Top-level replay configuration (spec §3 `ReplayConfig`, §6.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayConfig {
    /// Base URL replayed requests are sent to when not using templates.
    #[serde(default)]
    pub target_base_url: Option<String>,
    /// Tolerance rules applied in `Default` comparison mode.
    #[serde(default = "default_tolerance")]
    pub tolerance: ToleranceConfig,
    /// Which comparison mode governs a run (spec §4.E), unless overridden by a CLI flag.
    #[serde(default)]
    pub comparison_mode: ComparisonModeConfig,
    /// Whether to synthesize responses from templates instead of replaying live HTTP.
    #[serde(default = "default_true")]
    pub use_dynamic_responses: bool,
    /// Per-request timeout, in seconds, for live HTTP replay.
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
    /// Compile every registered route's template up front instead of lazily
    /// on first render (spec §5, §6.3 `--preload-templates`).
    #[serde(default)]
    pub preload_templates: bool,
    /// Contract-import configuration, used when a contract file is supplied.
    #[serde(default)]
    pub contract: ContractImportConfig,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            target_base_url: None,
            tolerance: default_tolerance(),
            comparison_mode: ComparisonModeConfig::default(),
            use_dynamic_responses: true,
            request_timeout_seconds: default_timeout(),
            preload_templates: false,
            contract: ContractImportConfig::default(),
        }
    }
}

/// Serializable mirror of [`ComparisonMode`], so config files can name a mode by string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonModeConfig {
    /// See [`ComparisonMode::Strict`].
    Strict,
    /// See [`ComparisonMode::Tolerant`].
    Tolerant,
    /// See [`ComparisonMode::Default`].
    #[default]
    Default,
}

impl From<ComparisonModeConfig> for ComparisonMode {
    fn from(mode: ComparisonModeConfig) -> Self {
        match mode {
            ComparisonModeConfig::Strict => Self::Strict,
            ComparisonModeConfig::Tolerant => Self::Tolerant,
            ComparisonModeConfig::Default => Self::Default,
        }
    }
}

fn default_tolerance() -> ToleranceConfig {
    ToleranceConfig::default()
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

impl ReplayConfig {
    /// Load a config from a `.json` or `.yaml`/`.yml` file, dispatching on
    /// extension (spec §6.2).
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::input(format!("failed to read config {}: {e}", path.display())))?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&content)?),
            other => Err(Error::input(format!(
                "unsupported config extension {:?}, expected .json, .yaml, or .yml",
                other.unwrap_or("")
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_dynamic_responses_and_thirty_second_timeout() {
        let config = ReplayConfig::default();
        assert!(config.use_dynamic_responses);
        assert_eq!(config.request_timeout_seconds, 30);
    }

    #[test]
    fn from_file_rejects_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "target_base_url = \"x\"").unwrap();
        let result = ReplayConfig::from_file(&path);
        assert!(result.is_err());
    }

    #[test]
    fn from_file_parses_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"targetBaseUrl": "http://localhost:8080"}"#).unwrap();
        let config = ReplayConfig::from_file(&path).unwrap();
        assert_eq!(config.target_base_url.as_deref(), Some("http://localhost:8080"));
    }

    #[test]
    fn from_file_parses_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "targetBaseUrl: http://localhost:9090\n").unwrap();
        let config = ReplayConfig::from_file(&path).unwrap();
        assert_eq!(config.target_base_url.as_deref(), Some("http://localhost:9090"));
    }

    #[test]
    fn comparison_mode_config_maps_to_comparison_mode() {
        assert_eq!(ComparisonMode::from(ComparisonModeConfig::Strict), ComparisonMode::Strict);
        assert_eq!(ComparisonMode::from(ComparisonModeConfig::Tolerant), ComparisonMode::Tolerant);
    }
}

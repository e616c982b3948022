//! Engine and per-scanner configuration.
//!
//! Layered loading via figment: built-in defaults, then an optional
//! `scout.toml`, then `SCOUT_`-prefixed environment variables.

use crate::finding::FindingSeverity;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on concurrently in-flight adapter invocations.
    pub max_concurrency: usize,
    /// Run adapters in concurrency-bounded waves instead of one at a time.
    pub parallel: bool,
    /// Abort not-yet-started waves after a critical finding.
    pub fail_fast: bool,
    pub container: ScannerConfig,
    pub sast: ScannerConfig,
    pub secrets: ScannerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            parallel: true,
            fail_fast: false,
            container: ScannerConfig::trivy_defaults(),
            sast: ScannerConfig::semgrep_defaults(),
            secrets: ScannerConfig::trufflehog_defaults(),
        }
    }
}

/// Per-adapter execution parameters. Owned by each adapter and never mutated
/// during a scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Tool binary name or path.
    pub binary: String,
    /// Run via an ephemeral container of this image instead of the binary.
    pub image: Option<String>,
    /// Volume mounts (`host:container`) when running containerized.
    pub volumes: Vec<String>,
    /// Extra environment for the tool process.
    pub env: HashMap<String, String>,
    /// Hard per-invocation deadline in seconds.
    pub timeout_secs: u64,
    /// Severities a finding must have to be reported. Empty means all.
    pub allowed_severities: Vec<FindingSeverity>,
    /// Substrings matched against the serialized finding; matches are dropped.
    pub ignore_patterns: Vec<String>,
    /// Custom rule set path or identifier, where the tool supports one.
    pub rules: Option<PathBuf>,
    /// Extra arguments appended to every invocation.
    pub extra_args: Vec<String>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            binary: String::new(),
            image: None,
            volumes: Vec::new(),
            env: HashMap::new(),
            timeout_secs: 300,
            allowed_severities: Vec::new(),
            ignore_patterns: Vec::new(),
            rules: None,
            extra_args: Vec::new(),
        }
    }
}

impl ScannerConfig {
    pub fn trivy_defaults() -> Self {
        Self {
            binary: "trivy".to_string(),
            ..Self::default()
        }
    }

    pub fn semgrep_defaults() -> Self {
        Self {
            binary: "semgrep".to_string(),
            ..Self::default()
        }
    }

    pub fn trufflehog_defaults() -> Self {
        Self {
            binary: "trufflehog".to_string(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_ignore_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.ignore_patterns.push(pattern.into());
        self
    }

    pub fn with_allowed_severities(mut self, severities: Vec<FindingSeverity>) -> Self {
        self.allowed_severities = severities;
        self
    }
}

/// Load configuration: defaults -> `scout.toml` in the workspace -> env.
///
/// Environment variables use the `SCOUT_` prefix with `__` as the section
/// separator, e.g. `SCOUT_MAX_CONCURRENCY=8` or `SCOUT_SAST__TIMEOUT_SECS=600`.
pub fn load_config(workspace: Option<&Path>) -> Result<EngineConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(EngineConfig::default()));

    if let Some(ws) = workspace {
        let config_file = ws.join("scout.toml");
        if config_file.exists() {
            figment = figment.merge(Toml::file(&config_file));
        }
    }

    figment = figment.merge(Env::prefixed("SCOUT_").split("__"));
    figment.extract().map_err(Box::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_concurrency, 4);
        assert!(config.parallel);
        assert!(!config.fail_fast);
        assert_eq!(config.container.binary, "trivy");
        assert_eq!(config.sast.binary, "semgrep");
        assert_eq!(config.secrets.binary, "trufflehog");
        assert_eq!(config.secrets.timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_load_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("scout.toml"),
            r#"
max_concurrency = 2
fail_fast = true

[secrets]
binary = "trufflehog"
timeout_secs = 60
ignore_patterns = ["tests/fixtures"]
"#,
        )
        .unwrap();

        let config = load_config(Some(dir.path())).unwrap();
        assert_eq!(config.max_concurrency, 2);
        assert!(config.fail_fast);
        assert_eq!(config.secrets.timeout_secs, 60);
        assert_eq!(config.secrets.ignore_patterns, vec!["tests/fixtures"]);
        // Untouched sections keep their defaults.
        assert_eq!(config.sast.binary, "semgrep");
    }

    #[test]
    fn test_load_without_workspace() {
        let config = load_config(None).unwrap();
        assert_eq!(config.max_concurrency, EngineConfig::default().max_concurrency);
    }

    #[test]
    fn test_scanner_config_builders() {
        let config = ScannerConfig::trivy_defaults()
            .with_timeout_secs(120)
            .with_ignore_pattern("vendor/")
            .with_allowed_severities(vec![FindingSeverity::High, FindingSeverity::Critical]);
        assert_eq!(config.timeout_secs, 120);
        assert_eq!(config.ignore_patterns, vec!["vendor/"]);
        assert_eq!(config.allowed_severities.len(), 2);
    }
}

//! Static analysis scanner — Semgrep adapter.
//!
//! Semgrep emits a single JSON document (`results[]` with start/end
//! positions), so a corrupted document fails the whole parse. Custom rule
//! sets come from the adapter config; the default is Semgrep's auto config.

use crate::config::ScannerConfig;
use crate::error::ScanError;
use crate::exec;
use crate::finding::{
    Finding, FindingLocation, FindingReference, FindingSeverity, FindingType,
};
use crate::request::ScanOptions;
use crate::result::ScanResult;
use crate::scanner::{ScanCategory, Scanner};
use async_trait::async_trait;
use chrono::Utc;
use scout_runner::ProcessRunner;
use std::sync::Arc;

pub const SCANNER_NAME: &str = "sast";

/// Semgrep-backed static analysis adapter.
pub struct SastScanner {
    runner: Arc<dyn ProcessRunner>,
    config: ScannerConfig,
}

impl SastScanner {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self::with_config(runner, ScannerConfig::semgrep_defaults())
    }

    pub fn with_config(runner: Arc<dyn ProcessRunner>, config: ScannerConfig) -> Self {
        Self { runner, config }
    }

    fn build_args(&self, target: &str) -> Vec<String> {
        let rules = self
            .config
            .rules
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| "auto".to_string());
        vec![
            "scan".to_string(),
            "--json".to_string(),
            "--quiet".to_string(),
            "--config".to_string(),
            rules,
            target.to_string(),
        ]
    }

    /// Parse Semgrep's JSON document into canonical findings.
    pub fn parse_output(json_str: &str) -> Result<Vec<Finding>, ScanError> {
        let value: serde_json::Value =
            serde_json::from_str(json_str).map_err(|e| ScanError::Parse {
                scanner: SCANNER_NAME.to_string(),
                message: format!("invalid Semgrep JSON: {e}"),
            })?;

        let mut findings = Vec::new();
        let Some(results) = value.get("results").and_then(|r| r.as_array()) else {
            return Ok(findings);
        };

        for result in results {
            findings.push(Self::result_to_finding(result));
        }
        Ok(findings)
    }

    fn result_to_finding(result: &serde_json::Value) -> Finding {
        let check_id = result
            .get("check_id")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        let path = result.get("path").and_then(|v| v.as_str()).unwrap_or("unknown");
        let extra = result.get("extra");

        let message = extra
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
            .unwrap_or("")
            .to_string();
        let metadata = extra.and_then(|e| e.get("metadata"));
        let severity = map_severity(
            extra
                .and_then(|e| e.get("severity"))
                .and_then(|s| s.as_str())
                .unwrap_or(""),
            metadata
                .and_then(|m| m.get("severity"))
                .and_then(|s| s.as_str()),
        );

        // Rule ids read like "python.lang.security.audit.dangerous-exec";
        // the last segment is the human-usable name.
        let title = check_id.rsplit('.').next().unwrap_or(check_id).to_string();

        let mut location = FindingLocation::new(path);
        if let Some(start) = result.get("start") {
            if let Some(line) = start.get("line").and_then(|l| l.as_u64()) {
                location = location.with_line(line as usize);
            }
            if let (Some(col), Some(end_col)) = (
                start.get("col").and_then(|c| c.as_u64()),
                result
                    .get("end")
                    .and_then(|e| e.get("col"))
                    .and_then(|c| c.as_u64()),
            ) {
                location = location.with_columns(col as usize, end_col as usize);
            }
        }
        if let Some(end_line) = result
            .get("end")
            .and_then(|e| e.get("line"))
            .and_then(|l| l.as_u64())
        {
            location = location.with_range(end_line as usize);
        }

        let mut finding = Finding::new(FindingType::Sast, severity, title, message, SCANNER_NAME)
            .with_rule(check_id)
            .with_location(location);

        if let Some(metadata) = metadata {
            for cwe in string_or_array(metadata.get("cwe")) {
                finding = finding.with_reference(FindingReference::cwe(cwe));
            }
            for owasp in string_or_array(metadata.get("owasp")) {
                finding = finding.with_reference(FindingReference::owasp(owasp));
            }
            for url in string_or_array(metadata.get("references")).into_iter().take(3) {
                finding = finding.with_reference(FindingReference::url(url));
            }
            if let Some(fix) = extra
                .and_then(|e| e.get("fix"))
                .and_then(|f| f.as_str())
            {
                finding = finding.with_remediation(format!("Suggested fix: {fix}"));
            }
        }

        finding
    }
}

/// Semgrep severity onto the canonical scale. The rule-level `severity` field
/// uses ERROR/WARNING/INFO; rule metadata sometimes carries a more precise
/// level, which wins when present. Unrecognized values fail open to Info.
fn map_severity(rule_severity: &str, metadata_severity: Option<&str>) -> FindingSeverity {
    if let Some(meta) = metadata_severity {
        match meta.to_uppercase().as_str() {
            "CRITICAL" => return FindingSeverity::Critical,
            "HIGH" => return FindingSeverity::High,
            "MEDIUM" => return FindingSeverity::Medium,
            "LOW" => return FindingSeverity::Low,
            _ => {}
        }
    }
    match rule_severity.to_uppercase().as_str() {
        "ERROR" => FindingSeverity::High,
        "WARNING" => FindingSeverity::Medium,
        "INFO" => FindingSeverity::Info,
        _ => FindingSeverity::Info,
    }
}

fn string_or_array(value: Option<&serde_json::Value>) -> Vec<String> {
    match value {
        Some(serde_json::Value::String(s)) => vec![s.clone()],
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
        _ => Vec::new(),
    }
}

#[async_trait]
impl Scanner for SastScanner {
    fn name(&self) -> &str {
        SCANNER_NAME
    }

    fn category(&self) -> ScanCategory {
        ScanCategory::StaticAnalysis
    }

    async fn scan(&self, target: &str, options: &ScanOptions) -> Result<ScanResult, ScanError> {
        let started_at = Utc::now();
        let args = self.build_args(target);

        let spec = exec::build_invocation(&self.config, &args);
        let output = exec::run_tool(self.runner.as_ref(), &spec).await?;

        let findings = match Self::parse_output(&output.stdout) {
            Ok(findings) => findings,
            Err(parse_err) => return Err(exec::unparseable(SCANNER_NAME, &output, parse_err)),
        };

        let findings = exec::apply_filters(findings, &self.config, options);
        Ok(ScanResult::success(
            SCANNER_NAME,
            self.category(),
            started_at,
            findings,
        ))
    }

    async fn is_available(&self) -> bool {
        exec::probe_version(self.runner.as_ref(), &self.config)
            .await
            .is_ok()
    }

    async fn version(&self) -> Result<String, ScanError> {
        exec::probe_version(self.runner.as_ref(), &self.config).await
    }
}

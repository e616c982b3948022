//! Container and dependency scanner — Trivy adapter.
//!
//! Covers three target shapes with the matching Trivy sub-command: image
//! references (`trivy image`), filesystem paths (`trivy fs`), and remote
//! repositories (`trivy repo`). Trivy emits a single JSON document, so a
//! corrupted document fails the whole parse.

use crate::config::ScannerConfig;
use crate::error::ScanError;
use crate::exec;
use crate::finding::{
    Finding, FindingLocation, FindingReference, FindingSeverity, FindingType,
};
use crate::request::{ScanOptions, TargetKind};
use crate::result::ScanResult;
use crate::scanner::{ScanCategory, Scanner};
use async_trait::async_trait;
use chrono::Utc;
use scout_runner::ProcessRunner;
use std::sync::Arc;

pub const SCANNER_NAME: &str = "container";

/// Trivy-backed adapter for container image and dependency vulnerabilities.
pub struct ContainerScanner {
    runner: Arc<dyn ProcessRunner>,
    config: ScannerConfig,
}

impl ContainerScanner {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self::with_config(runner, ScannerConfig::trivy_defaults())
    }

    pub fn with_config(runner: Arc<dyn ProcessRunner>, config: ScannerConfig) -> Self {
        Self { runner, config }
    }

    fn build_args(target: &str, kind: TargetKind) -> Vec<String> {
        let subcommand = match kind {
            TargetKind::ImageRef => "image",
            TargetKind::Path => "fs",
            TargetKind::RepoUrl => "repo",
        };
        vec![
            subcommand.to_string(),
            "--format".to_string(),
            "json".to_string(),
            "--quiet".to_string(),
            target.to_string(),
        ]
    }

    /// Parse Trivy's JSON document into canonical findings.
    ///
    /// Trivy format: `{ "Results": [ { "Target": ..., "Vulnerabilities": [...],
    /// "Misconfigurations": [...] } ] }`.
    pub fn parse_output(json_str: &str) -> Result<Vec<Finding>, ScanError> {
        let value: serde_json::Value =
            serde_json::from_str(json_str).map_err(|e| ScanError::Parse {
                scanner: SCANNER_NAME.to_string(),
                message: format!("invalid Trivy JSON: {e}"),
            })?;

        let mut findings = Vec::new();

        let Some(results) = value.get("Results").and_then(|r| r.as_array()) else {
            // A clean scan can produce a document with no Results key.
            return Ok(findings);
        };

        for result in results {
            let result_target = result
                .get("Target")
                .and_then(|t| t.as_str())
                .unwrap_or("unknown");

            if let Some(vulns) = result.get("Vulnerabilities").and_then(|v| v.as_array()) {
                for vuln in vulns {
                    findings.push(Self::vulnerability_to_finding(vuln, result_target));
                }
            }

            if let Some(misconfigs) = result.get("Misconfigurations").and_then(|m| m.as_array()) {
                for misconfig in misconfigs {
                    findings.push(Self::misconfiguration_to_finding(misconfig, result_target));
                }
            }
        }

        Ok(findings)
    }

    fn vulnerability_to_finding(vuln: &serde_json::Value, target: &str) -> Finding {
        let get = |key: &str| vuln.get(key).and_then(|v| v.as_str());

        let cve_id = get("VulnerabilityID").unwrap_or("unknown").to_string();
        let package = get("PkgName").unwrap_or("unknown");
        let installed = get("InstalledVersion").unwrap_or("unknown");
        let fixed = get("FixedVersion");
        let severity = map_severity(get("Severity").unwrap_or(""));
        let description = get("Description").unwrap_or("").to_string();

        let mut finding = Finding::new(
            FindingType::Vulnerability,
            severity,
            format!("{cve_id}: {package} in {target}"),
            description,
            SCANNER_NAME,
        )
        .with_rule(cve_id.clone());

        if cve_id.starts_with("CVE-") {
            finding = finding.with_reference(FindingReference::cve(cve_id));
        }
        if let Some(refs) = vuln.get("References").and_then(|r| r.as_array()) {
            for url in refs.iter().filter_map(|u| u.as_str()).take(3) {
                finding = finding.with_reference(FindingReference::url(url));
            }
        }
        if let Some(fixed) = fixed {
            finding = finding.with_remediation(format!(
                "Upgrade {package} from {installed} to {fixed}"
            ));
        }

        finding
    }

    fn misconfiguration_to_finding(misconfig: &serde_json::Value, target: &str) -> Finding {
        let get = |key: &str| misconfig.get(key).and_then(|v| v.as_str());

        let rule_id = get("ID").unwrap_or("unknown").to_string();
        let title = get("Title").unwrap_or("Misconfiguration").to_string();
        let severity = map_severity(get("Severity").unwrap_or(""));
        let description = get("Description").unwrap_or("").to_string();

        let mut finding = Finding::new(
            FindingType::Misconfiguration,
            severity,
            title,
            description,
            SCANNER_NAME,
        )
        .with_rule(rule_id)
        .with_location(FindingLocation::new(target));

        if let Some(resolution) = get("Resolution") {
            finding = finding.with_remediation(resolution);
        }

        finding
    }
}

/// Trivy severity vocabulary onto the canonical scale; anything unrecognized
/// fails open to Info.
fn map_severity(raw: &str) -> FindingSeverity {
    match raw.to_uppercase().as_str() {
        "CRITICAL" => FindingSeverity::Critical,
        "HIGH" => FindingSeverity::High,
        "MEDIUM" => FindingSeverity::Medium,
        "LOW" => FindingSeverity::Low,
        _ => FindingSeverity::Info,
    }
}

#[async_trait]
impl Scanner for ContainerScanner {
    fn name(&self) -> &str {
        SCANNER_NAME
    }

    fn category(&self) -> ScanCategory {
        ScanCategory::Container
    }

    async fn scan(&self, target: &str, options: &ScanOptions) -> Result<ScanResult, ScanError> {
        let started_at = Utc::now();
        let kind = TargetKind::detect(target);
        let args = Self::build_args(target, kind);

        let spec = exec::build_invocation(&self.config, &args);
        let output = exec::run_tool(self.runner.as_ref(), &spec).await?;

        let findings = match Self::parse_output(&output.stdout) {
            Ok(findings) => findings,
            Err(parse_err) => return Err(exec::unparseable(SCANNER_NAME, &output, parse_err)),
        };

        let findings = exec::apply_filters(findings, &self.config, options);
        Ok(
            ScanResult::success(SCANNER_NAME, self.category(), started_at, findings)
                .with_metadata("target_kind", format!("{kind:?}").to_lowercase()),
        )
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

//! Per-scanner results and the aggregated scan summary.

use crate::finding::{Finding, FindingSeverity, dedupe_findings};
use crate::request::ScanRequest;
use crate::scanner::ScanCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Outcome of one adapter invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Success,
    Failure,
    Partial,
}

/// Findings tallied per severity level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

impl SeverityCounts {
    pub fn tally(findings: &[Finding]) -> Self {
        let mut counts = Self::default();
        for finding in findings {
            counts.add(finding.severity);
        }
        counts
    }

    pub fn add(&mut self, severity: FindingSeverity) {
        match severity {
            FindingSeverity::Critical => self.critical += 1,
            FindingSeverity::High => self.high += 1,
            FindingSeverity::Medium => self.medium += 1,
            FindingSeverity::Low => self.low += 1,
            FindingSeverity::Info => self.info += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low + self.info
    }

    /// Number of findings at or above the given severity.
    pub fn at_or_above(&self, threshold: FindingSeverity) -> usize {
        let levels = [
            (FindingSeverity::Info, self.info),
            (FindingSeverity::Low, self.low),
            (FindingSeverity::Medium, self.medium),
            (FindingSeverity::High, self.high),
            (FindingSeverity::Critical, self.critical),
        ];
        levels
            .iter()
            .filter(|(level, _)| *level >= threshold)
            .map(|(_, count)| count)
            .sum()
    }
}

/// The result of exactly one adapter invocation. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub scan_id: Uuid,
    pub scanner: String,
    pub category: ScanCategory,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: ScanStatus,
    pub findings: Vec<Finding>,
    pub severity_counts: SeverityCounts,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ScanResult {
    pub fn success(
        scanner: impl Into<String>,
        category: ScanCategory,
        started_at: DateTime<Utc>,
        findings: Vec<Finding>,
    ) -> Self {
        let severity_counts = SeverityCounts::tally(&findings);
        Self {
            scan_id: Uuid::new_v4(),
            scanner: scanner.into(),
            category,
            started_at,
            finished_at: Utc::now(),
            status: ScanStatus::Success,
            findings,
            severity_counts,
            metadata: HashMap::new(),
        }
    }

    /// A failure carries zero findings; the error message goes to metadata.
    pub fn failure(
        scanner: impl Into<String>,
        category: ScanCategory,
        started_at: DateTime<Utc>,
        error: impl Into<String>,
    ) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert("error".to_string(), error.into());
        Self {
            scan_id: Uuid::new_v4(),
            scanner: scanner.into(),
            category,
            started_at,
            finished_at: Utc::now(),
            status: ScanStatus::Failure,
            findings: Vec::new(),
            severity_counts: SeverityCounts::default(),
            metadata,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn has_critical(&self) -> bool {
        self.severity_counts.critical > 0
    }
}

/// Aggregated, deduplicated outcome of one scan request.
///
/// `findings` is the deduplicated union across all successful results, in
/// wave-completion order; callers needing stable ordering sort it themselves.
/// All counts are computed from that list, so `total_findings` always equals
/// both the severity tally and the per-scanner tally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    pub request_id: String,
    pub target: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_findings: usize,
    pub findings_by_severity: SeverityCounts,
    pub findings_by_scanner: HashMap<String, usize>,
    pub failed_scanners: Vec<String>,
    pub findings: Vec<Finding>,
    pub results: Vec<ScanResult>,
}

impl ScanSummary {
    /// Build a summary from collected results. Failure results contribute
    /// their scanner name to `failed_scanners` and nothing else; unavailable
    /// scanners were never turned into results at all.
    pub fn build(
        request: &ScanRequest,
        started_at: DateTime<Utc>,
        results: Vec<ScanResult>,
    ) -> Self {
        let failed_scanners: Vec<String> = results
            .iter()
            .filter(|r| r.status == ScanStatus::Failure)
            .map(|r| r.scanner.clone())
            .collect();

        let all_findings: Vec<Finding> = results
            .iter()
            .filter(|r| r.status != ScanStatus::Failure)
            .flat_map(|r| r.findings.iter().cloned())
            .collect();
        let findings = dedupe_findings(all_findings);

        let findings_by_severity = SeverityCounts::tally(&findings);
        let mut findings_by_scanner: HashMap<String, usize> = HashMap::new();
        for finding in &findings {
            *findings_by_scanner.entry(finding.scanner.clone()).or_default() += 1;
        }

        Self {
            request_id: request.id.clone(),
            target: request.target.clone(),
            started_at,
            finished_at: Utc::now(),
            total_findings: findings.len(),
            findings_by_severity,
            findings_by_scanner,
            failed_scanners,
            findings,
            results,
        }
    }

    /// Whether the summary crosses the caller's gating threshold. Consumers
    /// that set `fail_on_findings` use this for pass/fail decisions.
    pub fn exceeds_threshold(&self, threshold: FindingSeverity) -> bool {
        self.findings_by_severity.at_or_above(threshold) > 0
    }
}

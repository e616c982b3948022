//! Canonical finding model — the one schema every scanner output maps onto.
//!
//! Deduplication works over a derived canonical key rather than raw identity,
//! so two tools agreeing on the same underlying issue collapse to a single
//! finding without ever under-reporting severity.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use uuid::Uuid;

/// A single normalized security issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Unique identifier.
    pub id: Uuid,
    /// What kind of issue this is.
    #[serde(rename = "type")]
    pub finding_type: FindingType,
    /// Severity on the fixed 5-level scale.
    pub severity: FindingSeverity,
    /// Short title.
    pub title: String,
    /// Detailed description.
    pub description: String,
    /// Scanner that produced this finding.
    pub scanner: String,
    /// Rule or check identifier from the producing tool, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    /// Where the issue was detected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<FindingLocation>,
    /// CVE/CWE/OWASP tags and reference URLs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<FindingReference>,
    /// Suggested remediation, if the tool provided one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
    /// Whether the issue was verified (e.g. a live credential check).
    #[serde(default)]
    pub verified: bool,
    /// SHA-256 of the canonical key; stable across runs for the same issue.
    pub content_hash: String,
}

impl Finding {
    pub fn new(
        finding_type: FindingType,
        severity: FindingSeverity,
        title: impl Into<String>,
        description: impl Into<String>,
        scanner: impl Into<String>,
    ) -> Self {
        let mut finding = Self {
            id: Uuid::new_v4(),
            finding_type,
            severity,
            title: title.into(),
            description: description.into(),
            scanner: scanner.into(),
            rule_id: None,
            location: None,
            references: Vec::new(),
            remediation: None,
            verified: false,
            content_hash: String::new(),
        };
        finding.content_hash = content_hash(&finding.canonical_key());
        finding
    }

    pub fn with_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }

    pub fn with_location(mut self, location: FindingLocation) -> Self {
        self.location = Some(location);
        self.content_hash = content_hash(&self.canonical_key());
        self
    }

    pub fn with_reference(mut self, reference: FindingReference) -> Self {
        self.references.push(reference);
        self.content_hash = content_hash(&self.canonical_key());
        self
    }

    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = Some(remediation.into());
        self
    }

    pub fn with_verified(mut self, verified: bool) -> Self {
        self.verified = verified;
        self
    }

    /// The CVE tag, if any reference carries one.
    pub fn cve(&self) -> Option<&str> {
        self.references
            .iter()
            .find(|r| r.ref_type == ReferenceType::Cve)
            .map(|r| r.id.as_str())
    }

    /// Derived identity used for cross-scanner deduplication:
    /// `(type, file-or-"unknown", line-or-0, slugified-title, cve-or-"")`.
    pub fn canonical_key(&self) -> String {
        let file = self
            .location
            .as_ref()
            .map(|l| l.file.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".to_string());
        let line = self.location.as_ref().and_then(|l| l.line).unwrap_or(0);
        format!(
            "{}|{}|{}|{}|{}",
            self.finding_type.as_str(),
            file,
            line,
            slugify(&self.title),
            self.cve().unwrap_or("")
        )
    }
}

/// Kinds of normalized findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingType {
    Vulnerability,
    Secret,
    Misconfiguration,
    Sast,
}

impl FindingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingType::Vulnerability => "vulnerability",
            FindingType::Secret => "secret",
            FindingType::Misconfiguration => "misconfiguration",
            FindingType::Sast => "sast",
        }
    }
}

/// Severity on the fixed 5-level scale. Ordering is part of the contract:
/// `Info < Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingSeverity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl FindingSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingSeverity::Info => "info",
            FindingSeverity::Low => "low",
            FindingSeverity::Medium => "medium",
            FindingSeverity::High => "high",
            FindingSeverity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for FindingSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source location of a finding. Line and column information is optional;
/// container vulnerabilities typically carry none of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindingLocation {
    pub file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_column: Option<usize>,
}

impl FindingLocation {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            line: None,
            column: None,
            end_line: None,
            end_column: None,
        }
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_range(mut self, end_line: usize) -> Self {
        self.end_line = Some(end_line);
        self
    }

    pub fn with_columns(mut self, column: usize, end_column: usize) -> Self {
        self.column = Some(column);
        self.end_column = Some(end_column);
        self
    }
}

impl std::fmt::Display for FindingLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.file.display())?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
        }
        Ok(())
    }
}

/// External reference attached to a finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindingReference {
    pub ref_type: ReferenceType,
    /// Identifier, e.g. "CVE-2024-1234" or "CWE-89".
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl FindingReference {
    pub fn cve(id: impl Into<String>) -> Self {
        let id = id.into();
        let url = Some(format!("https://nvd.nist.gov/vuln/detail/{id}"));
        Self {
            ref_type: ReferenceType::Cve,
            id,
            url,
        }
    }

    pub fn cwe(id: impl Into<String>) -> Self {
        Self {
            ref_type: ReferenceType::Cwe,
            id: id.into(),
            url: None,
        }
    }

    pub fn owasp(id: impl Into<String>) -> Self {
        Self {
            ref_type: ReferenceType::Owasp,
            id: id.into(),
            url: None,
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            ref_type: ReferenceType::Url,
            id: url.clone(),
            url: Some(url),
        }
    }
}

/// Types of external references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceType {
    Cve,
    Cwe,
    Owasp,
    Url,
    Other,
}

/// Lowercase slug of a title: alphanumerics kept, runs of anything else
/// collapsed to a single `-`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_dash = true;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    if slug.ends_with('-') {
        slug.pop();
    }
    slug
}

fn content_hash(canonical_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Deduplicate findings by canonical key, retaining exactly one instance per
/// key: the one with the highest severity. First-seen order is preserved.
pub fn dedupe_findings(findings: Vec<Finding>) -> Vec<Finding> {
    let mut by_key: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<Finding> = Vec::with_capacity(findings.len());

    for finding in findings {
        let key = finding.canonical_key();
        match by_key.get(&key) {
            Some(&idx) => {
                if finding.severity > unique[idx].severity {
                    unique[idx] = finding;
                }
            }
            None => {
                by_key.insert(key, unique.len());
                unique.push(finding);
            }
        }
    }
    unique
}

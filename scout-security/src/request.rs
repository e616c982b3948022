//! Scan requests and target-shape detection.

use crate::finding::FindingSeverity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

/// A request to scan one target. Immutable once submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRequest {
    /// Caller-assigned request identifier.
    pub id: String,
    /// Opaque target: image reference, filesystem path, or repo URL.
    pub target: String,
    /// Scanner names to run, in caller order. Empty means auto-select.
    #[serde(default)]
    pub scanners: Vec<String>,
    #[serde(default)]
    pub options: ScanOptions,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ScanRequest {
    pub fn new(id: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            target: target.into(),
            scanners: Vec::new(),
            options: ScanOptions::default(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_scanners<I, S>(mut self, scanners: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scanners = scanners.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Per-request options, passed through to every selected adapter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    pub branch: Option<String>,
    pub commit: Option<String>,
    pub pull_request: Option<String>,
    /// When non-empty, only findings under these path fragments are kept.
    pub include_paths: Vec<String>,
    /// Findings under these path fragments are dropped.
    pub exclude_paths: Vec<String>,
    /// Findings strictly below this severity are dropped.
    pub severity_threshold: Option<FindingSeverity>,
    /// Consumers gate on this; the engine records it but never fails a scan.
    pub fail_on_findings: bool,
}

/// What shape a target string looks like. Adapters use this to pick the
/// matching tool sub-command when the caller did not say explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// Container image reference, e.g. `nginx:1.25` or `ghcr.io/org/app@sha256:...`.
    ImageRef,
    /// Local filesystem path.
    Path,
    /// Remote repository URL.
    RepoUrl,
}

static IMAGE_REF: LazyLock<regex::Regex> = LazyLock::new(|| {
    // registry[:port]/]repo[/name...][:tag][@sha256:digest], conservative:
    // requires a tag or digest so bare words fall through to Path.
    regex::Regex::new(
        r"^[a-z0-9]+(?:[._-][a-z0-9]+)*(?:/[a-z0-9]+(?:[._-][a-z0-9]+)*)*(?::[A-Za-z0-9._-]+|@sha256:[a-f0-9]{64})$",
    )
    .expect("image reference regex is valid")
});

impl TargetKind {
    pub fn detect(target: &str) -> Self {
        let target = target.trim();
        if target.starts_with("http://")
            || target.starts_with("https://")
            || target.starts_with("git@")
            || target.ends_with(".git")
        {
            return TargetKind::RepoUrl;
        }
        if target.starts_with('/')
            || target.starts_with("./")
            || target.starts_with("../")
            || target == "."
            || std::path::Path::new(target).exists()
        {
            return TargetKind::Path;
        }
        if IMAGE_REF.is_match(target) {
            return TargetKind::ImageRef;
        }
        TargetKind::Path
    }

    /// Whether this target can be treated as a source tree or repository.
    pub fn is_source(&self) -> bool {
        matches!(self, TargetKind::Path | TargetKind::RepoUrl)
    }
}

//! Scanner adapter contract — trait and registry.

use crate::error::ScanError;
use crate::request::ScanOptions;
use crate::result::ScanResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// The concern a scanner covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanCategory {
    /// Container image and dependency vulnerability scanning.
    Container,
    /// Static application security testing.
    StaticAnalysis,
    /// Secret and credential detection.
    SecretDetection,
}

impl ScanCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanCategory::Container => "container",
            ScanCategory::StaticAnalysis => "static_analysis",
            ScanCategory::SecretDetection => "secret_detection",
        }
    }
}

/// A capability wrapping one external security tool.
///
/// Implementations translate tool-specific output into canonical findings and
/// apply their configured filters before returning; the orchestrator never
/// sees pre-filter data.
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Unique registry name.
    fn name(&self) -> &str;

    /// The concern this scanner covers.
    fn category(&self) -> ScanCategory;

    /// Run the wrapped tool against the target and return one result.
    ///
    /// A timeout resolves to an error here and a failure entry in the
    /// summary; it never hangs the caller.
    async fn scan(&self, target: &str, options: &ScanOptions) -> Result<ScanResult, ScanError>;

    /// Whether the wrapped tool can run at all (binary present, image pullable).
    async fn is_available(&self) -> bool;

    /// Version string of the wrapped tool.
    async fn version(&self) -> Result<String, ScanError>;
}

/// Availability and version of one registered scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerStatus {
    pub name: String,
    pub category: ScanCategory,
    pub available: bool,
    pub version: Option<String>,
}

/// Name-keyed scanner registry. The orchestrator's only shared mutable
/// structure; touched solely by explicit register/unregister calls.
pub struct ScannerRegistry {
    scanners: RwLock<HashMap<String, Arc<dyn Scanner>>>,
}

impl ScannerRegistry {
    pub fn new() -> Self {
        Self {
            scanners: RwLock::new(HashMap::new()),
        }
    }

    /// Seed a registry, keeping only scanners whose name appears in the
    /// allow-list. `None` keeps everything.
    pub async fn seeded(scanners: Vec<Arc<dyn Scanner>>, allow: Option<&[&str]>) -> Self {
        let registry = Self::new();
        for scanner in scanners {
            if allow.is_none_or(|names| names.contains(&scanner.name())) {
                registry.register(scanner).await;
            }
        }
        registry
    }

    pub async fn register(&self, scanner: Arc<dyn Scanner>) {
        let name = scanner.name().to_string();
        tracing::debug!(scanner = %name, "Registering scanner");
        self.scanners.write().await.insert(name, scanner);
    }

    pub async fn unregister(&self, name: &str) -> Option<Arc<dyn Scanner>> {
        self.scanners.write().await.remove(name)
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Scanner>> {
        self.scanners.read().await.get(name).cloned()
    }

    /// All registered scanner names, sorted for stable listing.
    pub async fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.scanners.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn len(&self) -> usize {
        self.scanners.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.scanners.read().await.is_empty()
    }
}

impl Default for ScannerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::ScanResult;
    use chrono::Utc;

    struct NamedScanner(&'static str);

    #[async_trait]
    impl Scanner for NamedScanner {
        fn name(&self) -> &str {
            self.0
        }
        fn category(&self) -> ScanCategory {
            ScanCategory::StaticAnalysis
        }
        async fn scan(&self, _: &str, _: &ScanOptions) -> Result<ScanResult, ScanError> {
            Ok(ScanResult::success(
                self.0,
                self.category(),
                Utc::now(),
                Vec::new(),
            ))
        }
        async fn is_available(&self) -> bool {
            true
        }
        async fn version(&self) -> Result<String, ScanError> {
            Ok("1.0.0".into())
        }
    }

    #[tokio::test]
    async fn test_register_get_unregister() {
        let registry = ScannerRegistry::new();
        registry.register(Arc::new(NamedScanner("sast"))).await;

        assert!(registry.get("sast").await.is_some());
        assert!(registry.get("missing").await.is_none());
        assert_eq!(registry.len().await, 1);

        assert!(registry.unregister("sast").await.is_some());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_seeded_with_allowlist() {
        let scanners: Vec<Arc<dyn Scanner>> = vec![
            Arc::new(NamedScanner("secrets")),
            Arc::new(NamedScanner("sast")),
            Arc::new(NamedScanner("container")),
        ];
        let registry = ScannerRegistry::seeded(scanners, Some(&["secrets", "sast"])).await;
        assert_eq!(registry.list().await, vec!["sast", "secrets"]);
    }

    #[tokio::test]
    async fn test_seeded_without_allowlist_keeps_all() {
        let scanners: Vec<Arc<dyn Scanner>> = vec![
            Arc::new(NamedScanner("secrets")),
            Arc::new(NamedScanner("container")),
        ];
        let registry = ScannerRegistry::seeded(scanners, None).await;
        assert_eq!(registry.len().await, 2);
    }
}

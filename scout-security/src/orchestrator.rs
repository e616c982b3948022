//! Scan orchestrator — selection, wave scheduling, aggregation.
//!
//! The orchestrator does no CPU-bound work of its own: it launches adapter
//! invocations, awaits them, and folds the results into one summary. In
//! parallel mode adapters run in fixed-size waves bounded by
//! `max_concurrency`; fail-fast only ever suppresses waves that have not
//! started. A running adapter is never cancelled mid-flight.

use crate::config::EngineConfig;
use crate::error::ScanError;
use crate::events::{ObserverSet, ScanEvent, ScanObserver};
use crate::request::{ScanRequest, TargetKind};
use crate::result::{ScanResult, ScanSummary};
use crate::scanner::{Scanner, ScannerRegistry, ScannerStatus};
use crate::scanners;
use chrono::Utc;
use scout_runner::ProcessRunner;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// Coordinates scanner adapters for one request at a time.
pub struct ScanOrchestrator {
    registry: Arc<ScannerRegistry>,
    config: EngineConfig,
    observers: Arc<ObserverSet>,
    in_flight: Arc<AtomicUsize>,
}

impl ScanOrchestrator {
    pub fn new(registry: Arc<ScannerRegistry>, config: EngineConfig) -> Self {
        Self {
            registry,
            config,
            observers: Arc::new(ObserverSet::new()),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Construct with the built-in adapters registered, optionally narrowed
    /// to an allow-list of names.
    pub async fn with_builtins(
        runner: Arc<dyn ProcessRunner>,
        config: EngineConfig,
        allow: Option<&[&str]>,
    ) -> Self {
        let builtins = scanners::builtin_scanners(runner, &config);
        let registry = Arc::new(ScannerRegistry::seeded(builtins, allow).await);
        Self::new(registry, config)
    }

    pub fn registry(&self) -> &Arc<ScannerRegistry> {
        &self.registry
    }

    /// Subscribe a lifecycle observer. Observers see events synchronously and
    /// cannot influence scheduling.
    pub fn subscribe(&self, observer: Arc<dyn ScanObserver>) {
        self.observers.subscribe(observer);
    }

    /// Number of adapter invocations currently in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Run a scan request to completion and return the aggregated summary.
    ///
    /// This is the only path that returns an error to the caller, and only
    /// for request validation; every adapter-level problem is folded into
    /// the summary.
    pub async fn run(&self, request: &ScanRequest) -> Result<ScanSummary, ScanError> {
        if request.target.trim().is_empty() {
            return Err(ScanError::InvalidRequest(
                "scan target must not be empty".to_string(),
            ));
        }

        let started_at = Utc::now();
        self.observers.emit(&ScanEvent::ScanStarted {
            request_id: request.id.clone(),
            target: request.target.clone(),
        });
        info!(request_id = %request.id, target = %request.target, "Scan started");

        let selected = self.select_scanners(request).await;
        debug!(
            request_id = %request.id,
            scanners = ?selected.iter().map(|s| s.name().to_string()).collect::<Vec<_>>(),
            "Selected scanners"
        );

        let results = if self.config.parallel {
            self.run_parallel(request, selected).await
        } else {
            self.run_sequential(request, selected).await
        };

        let summary = ScanSummary::build(request, started_at, results);
        let duration_ms = (summary.finished_at - summary.started_at)
            .num_milliseconds()
            .max(0) as u64;
        self.observers.emit(&ScanEvent::ScanCompleted {
            request_id: request.id.clone(),
            total_findings: summary.total_findings,
            failed_scanners: summary.failed_scanners.clone(),
            duration_ms,
        });
        info!(
            request_id = %request.id,
            total_findings = summary.total_findings,
            failed = summary.failed_scanners.len(),
            "Scan completed"
        );
        Ok(summary)
    }

    /// Resolve the adapters a request should run.
    ///
    /// Explicitly named scanners run in caller order. Auto-selection always
    /// includes secret detection, adds static analysis for source-shaped
    /// targets, and adds container/dependency scanning broadly.
    async fn select_scanners(&self, request: &ScanRequest) -> Vec<Arc<dyn Scanner>> {
        let mut selected = Vec::new();

        if !request.scanners.is_empty() {
            for name in &request.scanners {
                match self.registry.get(name).await {
                    Some(scanner) => selected.push(scanner),
                    None => {
                        warn!(scanner = %name, "Requested scanner is not registered");
                        self.observers.emit(&ScanEvent::ScannerNotFound {
                            scanner: name.clone(),
                        });
                    }
                }
            }
            return selected;
        }

        let kind = TargetKind::detect(&request.target);
        let mut auto: Vec<&str> = vec![scanners::secrets::SCANNER_NAME];
        if kind.is_source() {
            auto.push(scanners::sast::SCANNER_NAME);
        }
        auto.push(scanners::container::SCANNER_NAME);

        for name in auto {
            if let Some(scanner) = self.registry.get(name).await {
                selected.push(scanner);
            }
        }
        selected
    }

    async fn run_parallel(
        &self,
        request: &ScanRequest,
        selected: Vec<Arc<dyn Scanner>>,
    ) -> Vec<ScanResult> {
        let max = self.config.max_concurrency.max(1);
        let mut results: Vec<ScanResult> = Vec::new();
        let waves: Vec<Vec<Arc<dyn Scanner>>> =
            selected.chunks(max).map(|w| w.to_vec()).collect();

        for (wave_idx, wave) in waves.iter().enumerate() {
            let handles: Vec<_> = wave
                .iter()
                .map(|scanner| {
                    let scanner = scanner.clone();
                    let target = request.target.clone();
                    let options = request.options.clone();
                    let observers = self.observers.clone();
                    let in_flight = self.in_flight.clone();
                    tokio::spawn(async move {
                        invoke_scanner(scanner, &target, &options, &observers, &in_flight).await
                    })
                })
                .collect();

            for handle in handles {
                match handle.await {
                    Ok(Some(result)) => results.push(result),
                    Ok(None) => {}
                    Err(e) => warn!("Scanner task panicked: {e}"),
                }
            }

            if self.config.fail_fast && has_critical(&results) {
                let skipped: Vec<String> = waves[wave_idx + 1..]
                    .iter()
                    .flatten()
                    .map(|s| s.name().to_string())
                    .collect();
                if !skipped.is_empty() {
                    info!(skipped = ?skipped, "Critical finding observed, aborting remaining waves");
                }
                self.observers.emit(&ScanEvent::CriticalFindingShortCircuit {
                    request_id: request.id.clone(),
                    skipped_scanners: skipped,
                });
                break;
            }
        }
        results
    }

    async fn run_sequential(
        &self,
        request: &ScanRequest,
        selected: Vec<Arc<dyn Scanner>>,
    ) -> Vec<ScanResult> {
        let mut results = Vec::new();

        for (idx, scanner) in selected.iter().enumerate() {
            if let Some(result) = invoke_scanner(
                scanner.clone(),
                &request.target,
                &request.options,
                &self.observers,
                &self.in_flight,
            )
            .await
            {
                results.push(result);
            }

            if self.config.fail_fast && has_critical(&results) {
                let skipped: Vec<String> = selected[idx + 1..]
                    .iter()
                    .map(|s| s.name().to_string())
                    .collect();
                self.observers.emit(&ScanEvent::CriticalFindingShortCircuit {
                    request_id: request.id.clone(),
                    skipped_scanners: skipped,
                });
                break;
            }
        }
        results
    }

    /// Registered scanner names.
    pub async fn list_scanners(&self) -> Vec<String> {
        self.registry.list().await
    }

    /// Availability and version of a single scanner.
    pub async fn describe_scanner(&self, name: &str) -> Result<ScannerStatus, ScanError> {
        let scanner = self
            .registry
            .get(name)
            .await
            .ok_or_else(|| ScanError::ScannerNotFound(name.to_string()))?;
        let available = scanner.is_available().await;
        let version = if available {
            scanner.version().await.ok()
        } else {
            None
        };
        Ok(ScannerStatus {
            name: scanner.name().to_string(),
            category: scanner.category(),
            available,
            version,
        })
    }

    /// Bulk availability check across all registered scanners.
    pub async fn check_availability(&self) -> HashMap<String, bool> {
        let mut availability = HashMap::new();
        for name in self.registry.list().await {
            if let Some(scanner) = self.registry.get(&name).await {
                availability.insert(name, scanner.is_available().await);
            }
        }
        availability
    }
}

/// Run one adapter invocation end to end, emitting lifecycle events.
///
/// Returns `None` when the scanner is unavailable (omitted, not failed) and
/// a failure result when it errored; raw errors never escape this boundary.
async fn invoke_scanner(
    scanner: Arc<dyn Scanner>,
    target: &str,
    options: &crate::request::ScanOptions,
    observers: &ObserverSet,
    in_flight: &AtomicUsize,
) -> Option<ScanResult> {
    let name = scanner.name().to_string();

    if !scanner.is_available().await {
        debug!(scanner = %name, "Scanner unavailable, omitting");
        observers.emit(&ScanEvent::ScannerUnavailable {
            scanner: name.clone(),
        });
        return None;
    }

    observers.emit(&ScanEvent::ScannerStarted {
        scanner: name.clone(),
    });
    let started = std::time::Instant::now();
    let started_at = Utc::now();

    in_flight.fetch_add(1, Ordering::SeqCst);
    let outcome = scanner.scan(target, options).await;
    in_flight.fetch_sub(1, Ordering::SeqCst);

    let duration_ms = started.elapsed().as_millis() as u64;
    match outcome {
        Ok(result) => {
            observers.emit(&ScanEvent::ScannerCompleted {
                scanner: name,
                findings: result.findings.len(),
                duration_ms,
            });
            Some(result)
        }
        Err(e) => {
            warn!(scanner = %name, error = %e, "Scanner failed");
            observers.emit(&ScanEvent::ScannerFailed {
                scanner: name.clone(),
                error: e.to_string(),
            });
            Some(ScanResult::failure(
                name,
                scanner.category(),
                started_at,
                e.to_string(),
            ))
        }
    }
}

fn has_critical(results: &[ScanResult]) -> bool {
    results.iter().any(ScanResult::has_critical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::{Finding, FindingSeverity, FindingType};
    use crate::request::ScanOptions;
    use crate::scanner::ScanCategory;
    use async_trait::async_trait;

    struct StaticScanner {
        name: &'static str,
        severity: Option<FindingSeverity>,
        available: bool,
    }

    #[async_trait]
    impl Scanner for StaticScanner {
        fn name(&self) -> &str {
            self.name
        }
        fn category(&self) -> ScanCategory {
            ScanCategory::StaticAnalysis
        }
        async fn scan(&self, _: &str, _: &ScanOptions) -> Result<ScanResult, ScanError> {
            let findings = self
                .severity
                .map(|severity| {
                    vec![Finding::new(
                        FindingType::Sast,
                        severity,
                        format!("issue from {}", self.name),
                        "d",
                        self.name,
                    )]
                })
                .unwrap_or_default();
            Ok(ScanResult::success(
                self.name,
                self.category(),
                Utc::now(),
                findings,
            ))
        }
        async fn is_available(&self) -> bool {
            self.available
        }
        async fn version(&self) -> Result<String, ScanError> {
            Ok("0.0.1".into())
        }
    }

    async fn orchestrator_with(
        scanners: Vec<Arc<dyn Scanner>>,
        config: EngineConfig,
    ) -> ScanOrchestrator {
        let registry = Arc::new(ScannerRegistry::seeded(scanners, None).await);
        ScanOrchestrator::new(registry, config)
    }

    #[tokio::test]
    async fn test_with_builtins_registers_all_adapters() {
        let runner: Arc<dyn scout_runner::ProcessRunner> =
            Arc::new(scout_runner::TokioRunner::new());
        let orchestrator =
            ScanOrchestrator::with_builtins(runner, EngineConfig::default(), None).await;
        assert_eq!(
            orchestrator.list_scanners().await,
            vec!["container", "sast", "secrets"]
        );
    }

    #[tokio::test]
    async fn test_with_builtins_honors_allowlist() {
        let runner: Arc<dyn scout_runner::ProcessRunner> =
            Arc::new(scout_runner::TokioRunner::new());
        let orchestrator = ScanOrchestrator::with_builtins(
            runner,
            EngineConfig::default(),
            Some(&["secrets"]),
        )
        .await;
        assert_eq!(orchestrator.list_scanners().await, vec!["secrets"]);
    }

    #[tokio::test]
    async fn test_empty_target_rejected() {
        let orchestrator = orchestrator_with(Vec::new(), EngineConfig::default()).await;
        let request = ScanRequest::new("r", "   ");
        let err = orchestrator.run(&request).await.unwrap_err();
        assert!(matches!(err, ScanError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_named_scanners_run_in_caller_order() {
        let orchestrator = orchestrator_with(
            vec![
                Arc::new(StaticScanner {
                    name: "a",
                    severity: Some(FindingSeverity::Low),
                    available: true,
                }),
                Arc::new(StaticScanner {
                    name: "b",
                    severity: Some(FindingSeverity::Low),
                    available: true,
                }),
            ],
            EngineConfig {
                parallel: false,
                ..Default::default()
            },
        )
        .await;

        let request = ScanRequest::new("r", "./x").with_scanners(["b", "a"]);
        let summary = orchestrator.run(&request).await.unwrap();
        let order: Vec<&str> = summary.results.iter().map(|r| r.scanner.as_str()).collect();
        assert_eq!(order, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_unknown_scanner_skipped() {
        let orchestrator = orchestrator_with(
            vec![Arc::new(StaticScanner {
                name: "a",
                severity: None,
                available: true,
            })],
            EngineConfig::default(),
        )
        .await;

        let request = ScanRequest::new("r", "./x").with_scanners(["a", "ghost"]);
        let summary = orchestrator.run(&request).await.unwrap();
        assert_eq!(summary.results.len(), 1);
        assert!(summary.failed_scanners.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_scanner_omitted() {
        let orchestrator = orchestrator_with(
            vec![
                Arc::new(StaticScanner {
                    name: "up",
                    severity: Some(FindingSeverity::Medium),
                    available: true,
                }),
                Arc::new(StaticScanner {
                    name: "down",
                    severity: Some(FindingSeverity::Medium),
                    available: false,
                }),
            ],
            EngineConfig::default(),
        )
        .await;

        let request = ScanRequest::new("r", "./x").with_scanners(["up", "down"]);
        let summary = orchestrator.run(&request).await.unwrap();
        assert_eq!(summary.results.len(), 1);
        assert!(summary.failed_scanners.is_empty());
        assert!(!summary.findings_by_scanner.contains_key("down"));
    }

    #[tokio::test]
    async fn test_describe_scanner() {
        let orchestrator = orchestrator_with(
            vec![Arc::new(StaticScanner {
                name: "a",
                severity: None,
                available: true,
            })],
            EngineConfig::default(),
        )
        .await;

        let status = orchestrator.describe_scanner("a").await.unwrap();
        assert!(status.available);
        assert_eq!(status.version.as_deref(), Some("0.0.1"));

        let err = orchestrator.describe_scanner("nope").await.unwrap_err();
        assert!(matches!(err, ScanError::ScannerNotFound(_)));
    }

    #[tokio::test]
    async fn test_check_availability() {
        let orchestrator = orchestrator_with(
            vec![
                Arc::new(StaticScanner {
                    name: "up",
                    severity: None,
                    available: true,
                }),
                Arc::new(StaticScanner {
                    name: "down",
                    severity: None,
                    available: false,
                }),
            ],
            EngineConfig::default(),
        )
        .await;

        let availability = orchestrator.check_availability().await;
        assert_eq!(availability.get("up"), Some(&true));
        assert_eq!(availability.get("down"), Some(&false));
        assert_eq!(orchestrator.in_flight(), 0);
    }
}

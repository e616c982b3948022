//! Scan lifecycle notifications.
//!
//! Emission is synchronous and best-effort: observers see what happened but
//! can neither pause nor steer scheduling.

use serde::Serialize;
use std::sync::{Arc, RwLock};

/// Lifecycle events emitted while a scan request executes.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScanEvent {
    ScanStarted {
        request_id: String,
        target: String,
    },
    ScanCompleted {
        request_id: String,
        total_findings: usize,
        failed_scanners: Vec<String>,
        duration_ms: u64,
    },
    ScannerStarted {
        scanner: String,
    },
    ScannerCompleted {
        scanner: String,
        findings: usize,
        duration_ms: u64,
    },
    ScannerFailed {
        scanner: String,
        error: String,
    },
    ScannerUnavailable {
        scanner: String,
    },
    ScannerNotFound {
        scanner: String,
    },
    CriticalFindingShortCircuit {
        request_id: String,
        skipped_scanners: Vec<String>,
    },
}

impl ScanEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            ScanEvent::ScanStarted { .. } => "scan_started",
            ScanEvent::ScanCompleted { .. } => "scan_completed",
            ScanEvent::ScannerStarted { .. } => "scanner_started",
            ScanEvent::ScannerCompleted { .. } => "scanner_completed",
            ScanEvent::ScannerFailed { .. } => "scanner_failed",
            ScanEvent::ScannerUnavailable { .. } => "scanner_unavailable",
            ScanEvent::ScannerNotFound { .. } => "scanner_not_found",
            ScanEvent::CriticalFindingShortCircuit { .. } => "critical_finding_short_circuit",
        }
    }
}

/// A lifecycle subscriber. Implementations must return quickly; they run on
/// the scheduling path and get no way to report back into it.
pub trait ScanObserver: Send + Sync {
    fn on_event(&self, event: &ScanEvent);
}

/// The orchestrator's set of subscribers.
pub struct ObserverSet {
    observers: RwLock<Vec<Arc<dyn ScanObserver>>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, observer: Arc<dyn ScanObserver>) {
        if let Ok(mut observers) = self.observers.write() {
            observers.push(observer);
        }
    }

    pub fn len(&self) -> usize {
        self.observers.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver an event to every subscriber, in registration order.
    pub fn emit(&self, event: &ScanEvent) {
        tracing::debug!(event = event.event_name(), "Scan event");
        if let Ok(observers) = self.observers.read() {
            for observer in observers.iter() {
                observer.on_event(event);
            }
        }
    }
}

impl Default for ObserverSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn new() -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl ScanObserver for Recorder {
        fn on_event(&self, event: &ScanEvent) {
            self.seen.lock().unwrap().push(event.event_name().to_string());
        }
    }

    #[test]
    fn test_emit_reaches_all_subscribers() {
        let set = ObserverSet::new();
        let a = Arc::new(Recorder::new());
        let b = Arc::new(Recorder::new());
        set.subscribe(a.clone());
        set.subscribe(b.clone());

        set.emit(&ScanEvent::ScannerStarted {
            scanner: "sast".into(),
        });

        assert_eq!(*a.seen.lock().unwrap(), vec!["scanner_started"]);
        assert_eq!(*b.seen.lock().unwrap(), vec!["scanner_started"]);
    }

    #[test]
    fn test_emit_without_subscribers_is_noop() {
        let set = ObserverSet::new();
        assert!(set.is_empty());
        set.emit(&ScanEvent::ScannerUnavailable {
            scanner: "container".into(),
        });
    }

    #[test]
    fn test_event_names() {
        let event = ScanEvent::CriticalFindingShortCircuit {
            request_id: "r".into(),
            skipped_scanners: vec!["container".into()],
        };
        assert_eq!(event.event_name(), "critical_finding_short_circuit");

        let event = ScanEvent::ScanCompleted {
            request_id: "r".into(),
            total_findings: 0,
            failed_scanners: Vec::new(),
            duration_ms: 12,
        };
        assert_eq!(event.event_name(), "scan_completed");
    }
}

//! Scout Security — security scan orchestration engine.
//!
//! Runs heterogeneous third-party security tools (container/dependency
//! scanning, static analysis, secret detection) against one target,
//! normalizes their output into a canonical finding model, and aggregates
//! everything into a single deduplicated summary:
//!
//! - **Canonical model** (`finding`, `result`): one finding schema for every
//!   tool, per-invocation results, and the aggregated `ScanSummary`.
//! - **Adapters** (`scanner`, `scanners`, `exec`): a trait per wrapped tool
//!   plus shared execution and filtering primitives.
//! - **Orchestrator** (`orchestrator`): selection, wave scheduling with
//!   bounded concurrency, fail-fast or tolerant policies, aggregation.
//! - **Notifications** (`events`): synchronous lifecycle events for
//!   streaming consumers; observers cannot steer execution.

pub mod config;
pub mod error;
pub mod events;
pub mod exec;
pub mod finding;
pub mod orchestrator;
pub mod redaction;
pub mod request;
pub mod result;
pub mod scanner;
pub mod scanners;

pub use config::{EngineConfig, ScannerConfig, load_config};
pub use error::ScanError;
pub use events::{ObserverSet, ScanEvent, ScanObserver};
pub use finding::{
    Finding, FindingLocation, FindingReference, FindingSeverity, FindingType, ReferenceType,
    dedupe_findings,
};
pub use orchestrator::ScanOrchestrator;
pub use redaction::SecretRedactor;
pub use request::{ScanOptions, ScanRequest, TargetKind};
pub use result::{ScanResult, ScanStatus, ScanSummary, SeverityCounts};
pub use scanner::{ScanCategory, Scanner, ScannerRegistry, ScannerStatus};

//! Concrete scanner adapters — container/dependency, static analysis,
//! and secret detection.

pub mod container;
pub mod sast;
pub mod secrets;

use crate::config::EngineConfig;
use crate::scanner::Scanner;
use scout_runner::ProcessRunner;
use std::sync::Arc;

/// All built-in adapters, wired to the given runner and configuration.
///
/// The order matters: it is the auto-selection priority (secrets, then
/// static analysis, then container/dependency).
pub fn builtin_scanners(
    runner: Arc<dyn ProcessRunner>,
    config: &EngineConfig,
) -> Vec<Arc<dyn Scanner>> {
    vec![
        Arc::new(secrets::SecretsScanner::with_config(
            runner.clone(),
            config.secrets.clone(),
        )),
        Arc::new(sast::SastScanner::with_config(
            runner.clone(),
            config.sast.clone(),
        )),
        Arc::new(container::ContainerScanner::with_config(
            runner,
            config.container.clone(),
        )),
    ]
}

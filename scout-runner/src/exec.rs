//! Execution contracts — command specs, captured output, and the runner trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default timeout applied when a spec does not set one explicitly.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// A fully-described command invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecSpec {
    /// Program to execute (binary name or path).
    pub program: String,
    /// Arguments, in order.
    pub args: Vec<String>,
    /// Extra environment variables for the child process.
    pub env: Vec<(String, String)>,
    /// Working directory. Defaults to the caller's.
    pub cwd: Option<PathBuf>,
    /// Hard deadline; the process is killed when it elapses.
    pub timeout: Duration,
}

impl ExecSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Captured output of a completed invocation.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    /// Process exit code; `-1` when terminated by a signal.
    pub exit_code: i32,
    /// Wall-clock time the invocation took.
    pub duration: Duration,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Errors from the execution layer.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{program}' timed out after {timeout_secs}s")]
    Timeout { program: String, timeout_secs: u64 },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Capability to run an external process with a bounded timeout.
///
/// Injected everywhere a scanner needs to execute its tool, so tests can
/// substitute a fake that replays canned stdout/stderr/exit codes.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, spec: &ExecSpec) -> Result<ExecOutput, RunnerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_builder() {
        let spec = ExecSpec::new("trivy")
            .arg("image")
            .args(["--format", "json"])
            .env("TRIVY_CACHE_DIR", "/tmp/cache")
            .timeout(Duration::from_secs(60));

        assert_eq!(spec.program, "trivy");
        assert_eq!(spec.args, vec!["image", "--format", "json"]);
        assert_eq!(spec.env.len(), 1);
        assert_eq!(spec.timeout, Duration::from_secs(60));
        assert!(spec.cwd.is_none());
    }

    #[test]
    fn test_default_timeout() {
        let spec = ExecSpec::new("semgrep");
        assert_eq!(spec.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_output_success() {
        let out = ExecOutput {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 0,
            duration: Duration::from_millis(5),
        };
        assert!(out.success());

        let failed = ExecOutput { exit_code: 2, ..out };
        assert!(!failed.success());
    }
}

//! Tokio-backed process runner with forcible timeout termination.

use crate::exec::{ExecOutput, ExecSpec, ProcessRunner, RunnerError};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs commands as local child processes.
///
/// The child is spawned with `kill_on_drop`, so when the timeout elapses and
/// the wait future is dropped the process is terminated rather than orphaned.
#[derive(Debug, Clone, Default)]
pub struct TokioRunner;

impl TokioRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for TokioRunner {
    async fn run(&self, spec: &ExecSpec) -> Result<ExecOutput, RunnerError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for (key, value) in &spec.env {
            cmd.env(key, value);
        }
        if let Some(ref dir) = spec.cwd {
            cmd.current_dir(dir);
        }

        debug!(program = %spec.program, args = ?spec.args, "Executing command");
        let start = Instant::now();

        let child = cmd.spawn().map_err(|e| RunnerError::Spawn {
            program: spec.program.clone(),
            source: e,
        })?;

        match tokio::time::timeout(spec.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let exit_code = output.status.code().unwrap_or(-1);
                if exit_code != 0 {
                    warn!(
                        program = %spec.program,
                        exit_code, "Command exited with non-zero status"
                    );
                }
                Ok(ExecOutput {
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    exit_code,
                    duration: start.elapsed(),
                })
            }
            Ok(Err(e)) => Err(RunnerError::Io(e)),
            Err(_) => {
                warn!(
                    program = %spec.program,
                    timeout_secs = spec.timeout.as_secs(),
                    "Command timed out, killing process"
                );
                Err(RunnerError::Timeout {
                    program: spec.program.clone(),
                    timeout_secs: spec.timeout.as_secs(),
                })
            }
        }
    }
}

//! Ephemeral container execution via a container engine CLI.
//!
//! Containers always run with `--rm` so nothing survives past completion or
//! a timeout kill.

use crate::exec::{ExecOutput, ExecSpec, ProcessRunner, RunnerError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Description of a single ephemeral container run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Image reference, e.g. `aquasec/trivy:latest`.
    pub image: String,
    /// Arguments passed to the image's entrypoint.
    pub args: Vec<String>,
    /// Volume mounts in `host:container` form.
    pub volumes: Vec<String>,
    /// Environment variables inside the container.
    pub env: Vec<(String, String)>,
    /// Working directory inside the container.
    pub workdir: Option<String>,
}

impl ContainerSpec {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            args: Vec::new(),
            volumes: Vec::new(),
            env: Vec::new(),
            workdir: None,
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

    pub fn volume(mut self, host: impl Into<String>, container: impl Into<String>) -> Self {
        self.volumes.push(format!("{}:{}", host.into(), container.into()));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn workdir(mut self, dir: impl Into<String>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    /// Lower this spec to a `docker run --rm ...` style invocation.
    pub fn to_exec_spec(&self, engine: &str, timeout: Duration) -> ExecSpec {
        let mut spec = ExecSpec::new(engine).args(["run", "--rm"]);
        for volume in &self.volumes {
            spec = spec.arg("-v").arg(volume.as_str());
        }
        for (key, value) in &self.env {
            spec = spec.arg("-e").arg(format!("{key}={value}"));
        }
        if let Some(ref dir) = self.workdir {
            spec = spec.arg("-w").arg(dir.as_str());
        }
        spec.arg(&self.image)
            .args(self.args.iter().cloned())
            .timeout(timeout)
    }
}

/// Runs ephemeral containers by shelling out to a container engine.
pub struct ContainerRunner {
    engine: String,
    runner: Arc<dyn ProcessRunner>,
}

impl ContainerRunner {
    /// Create a runner using the `docker` CLI.
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            engine: "docker".to_string(),
            runner,
        }
    }

    /// Use a different engine binary (e.g. `podman`).
    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    pub fn engine(&self) -> &str {
        &self.engine
    }

    /// Run a container to completion under the given timeout.
    pub async fn run(
        &self,
        spec: &ContainerSpec,
        timeout: Duration,
    ) -> Result<ExecOutput, RunnerError> {
        let exec = spec.to_exec_spec(&self.engine, timeout);
        self.runner.run(&exec).await
    }

    /// Probe whether the engine binary responds at all.
    pub async fn engine_available(&self) -> bool {
        let spec = ExecSpec::new(&self.engine)
            .arg("version")
            .timeout(Duration::from_secs(10));
        matches!(self.runner.run(&spec).await, Ok(out) if out.success())
    }
}

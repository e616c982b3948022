//! Scout Runner — process and container execution for security tooling.
//!
//! Security scanners are external programs: some are plain binaries, some are
//! distributed as container images. Both cases reduce to one capability,
//! "run this with a bounded timeout, give me stdout, stderr, and the exit
//! code", exposed behind the [`ProcessRunner`] trait so the engine can be
//! tested without any real tool or container engine installed.

pub mod container;
pub mod exec;
pub mod process;

pub use container::{ContainerRunner, ContainerSpec};
pub use exec::{ExecOutput, ExecSpec, ProcessRunner, RunnerError};
pub use process::TokioRunner;

//! Process invocation for the container runtime.
//!
//! The container runtime is driven through its command-line interface. Each call
//! runs one subcommand to completion and hands back the captured output; nothing
//! is interpreted here beyond turning bytes into text.

use std::io;

use futures::future::BoxFuture;
use tokio::process::Command;
use tracing::debug;

/// Captured result of a finished runtime command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

impl ProcessOutput {
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Runs container-runtime subcommands.
///
/// The boxed future keeps the trait object safe, so the controller can hold any
/// runtime behind an `Arc<dyn ProcessInvoker>`.
pub trait ProcessInvoker: Send + Sync {
    /// Runs `subcommand` with `args` and waits for it to exit.
    ///
    /// # Errors
    ///
    /// Returns `Err` only for process-level failures (the program could not be
    /// spawned or waited on). A non-zero exit is reported through
    /// [`ProcessOutput::code`].
    fn exec<'call>(
        &'call self,
        subcommand: &'call str,
        args: &'call [String],
    ) -> BoxFuture<'call, io::Result<ProcessOutput>>;
}

/// Invokes a runtime CLI such as `docker` or `podman` found on `PATH`.
#[derive(Debug, Clone)]
pub struct CliInvoker {
    program: String,
}

impl CliInvoker {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }
}

impl ProcessInvoker for CliInvoker {
    fn exec<'call>(
        &'call self,
        subcommand: &'call str,
        args: &'call [String],
    ) -> BoxFuture<'call, io::Result<ProcessOutput>> {
        Box::pin(async move {
            // args may carry the bootstrap password
            debug!(program = %self.program, %subcommand, argc = args.len(), "Running runtime command");
            let output = Command::new(&self.program)
                .arg(subcommand)
                .args(args)
                .kill_on_drop(false)
                .output()
                .await?;

            Ok(ProcessOutput {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                code: output.status.code(),
            })
        })
    }
}

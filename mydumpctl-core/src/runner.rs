//! Process execution boundary.
//!
//! A [`CommandChain`] is serialized and escaped here and nowhere else. Each
//! run is a single blocking step from the orchestrator's point of view: the
//! returned future resolves when the external process exits. There is no
//! timeout or cancellation; a hung tool blocks the caller.

use crate::command::CommandChain;
use crate::error::{DumperError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Mutex;
use tracing::{debug, info};

/// Exit code reported when a process was terminated by a signal.
pub const SIGNALED_EXIT_CODE: i32 = -1;

/// Executes composed commands.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `command` to completion and returns its exit code.
    ///
    /// # Errors
    /// Returns `DumperError::Io` if the process cannot be started. A non-zero
    /// exit code is *not* an error at this level.
    async fn run(&self, command: &CommandChain) -> Result<i32>;
}

/// Runs commands through a POSIX shell with inherited stdio.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }
}

impl ShellRunner {
    /// Uses `shell` (invoked as `<shell> -c <command>`).
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &CommandChain) -> Result<i32> {
        debug!("Executing: {}", command);

        let status = tokio::process::Command::new(&self.shell)
            .arg("-c")
            .arg(command.to_shell_string())
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| DumperError::io(format!("Failed to start {}", self.shell), e))?;

        let code = status.code().unwrap_or(SIGNALED_EXIT_CODE);
        debug!("Command exited with {}", code);
        Ok(code)
    }
}

/// Records commands instead of running them; every run "succeeds".
#[derive(Debug, Default)]
pub struct DryRunRunner {
    commands: Mutex<Vec<String>>,
}

impl DryRunRunner {
    /// Creates an empty dry-run recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Redacted commands recorded so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .map(|commands| commands.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CommandRunner for DryRunRunner {
    async fn run(&self, command: &CommandChain) -> Result<i32> {
        let rendered = command.redacted();
        info!("Dry run: {}", rendered);
        if let Ok(mut commands) = self.commands.lock() {
            commands.push(rendered);
        }
        Ok(0)
    }
}

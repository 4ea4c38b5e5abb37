//! Restore command composition.
//!
//! Restoring is two-phase. If the dump directory holds a `schema_sql` file
//! (DDL for structure-only tables), it is replayed through the single-connection
//! `mysql` client *before* myloader is allowed to run. The replay happens while
//! the load command is being built: when it fails, the myloader command is
//! never produced.
//!
//! ```text
//! Idle -> ValidatingDirectory -> [missing]  LOAD_FAIL
//!                             -> SchemaReplay (optional) -> [non-zero] LOAD_FAIL
//!                             -> ReadyToLoad -> caller runs the loader
//! ```

use crate::command::{CommandChain, Invocation};
use crate::credentials::{
    ConnectionTarget, CredentialFormatter, CredentialStyle, MySqlCredentialFormatter,
};
use crate::dump::{SCHEMA_FILE, ToolPaths};
use crate::error::{LoadFailure, Result};
use crate::runner::CommandRunner;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Commands needed to restore one dump directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadPlan {
    /// Schema replay to run first, if the dump has a `schema_sql` file
    pub schema_replay: Option<CommandChain>,
    /// The parallel loader invocation
    pub loader: CommandChain,
}

/// Composes the external commands that perform a restore.
#[async_trait]
pub trait LoadCommandBuilder: Send + Sync {
    /// Validates `dump_dir` and plans the restore without running anything.
    ///
    /// # Errors
    /// `LoadFailure::MissingDirectory` if `dump_dir` is not a directory.
    fn plan(&self, dump_dir: &Path, target: &ConnectionTarget) -> Result<LoadPlan>;

    /// Validates `dump_dir`, runs the schema replay if one is planned, and
    /// returns the loader command for the caller to execute.
    ///
    /// # Errors
    /// `LoadFailure::MissingDirectory` as for [`plan`](Self::plan);
    /// `LoadFailure::SchemaReplay` if the replay exits non-zero; `Io` if the
    /// replay cannot be started.
    async fn build(
        &self,
        dump_dir: &Path,
        target: &ConnectionTarget,
        runner: &dyn CommandRunner,
    ) -> Result<CommandChain> {
        let plan = self.plan(dump_dir, target)?;

        if let Some(replay) = &plan.schema_replay {
            let exit_code = runner.run(replay).await?;
            if exit_code != 0 {
                return Err(LoadFailure::SchemaReplay { exit_code }.into());
            }
            info!(
                "Restored structure-only table schemas from {}",
                dump_dir.join(SCHEMA_FILE).display()
            );
        }

        Ok(plan.loader)
    }
}

/// myloader-based restore with `mysql` schema replay.
#[derive(Clone)]
pub struct MyloaderLoadBuilder {
    tools: ToolPaths,
    formatter: Arc<dyn CredentialFormatter>,
}

impl Default for MyloaderLoadBuilder {
    fn default() -> Self {
        Self::new(ToolPaths::default())
    }
}

impl MyloaderLoadBuilder {
    /// Creates a builder for `tools` using the MySQL credential formatter.
    pub fn new(tools: ToolPaths) -> Self {
        Self {
            tools,
            formatter: Arc::new(MySqlCredentialFormatter),
        }
    }

    /// Builder method to swap the credential formatter.
    pub fn with_formatter(mut self, formatter: Arc<dyn CredentialFormatter>) -> Self {
        self.formatter = formatter;
        self
    }
}

#[async_trait]
impl LoadCommandBuilder for MyloaderLoadBuilder {
    fn plan(&self, dump_dir: &Path, target: &ConnectionTarget) -> Result<LoadPlan> {
        if !dump_dir.is_dir() {
            return Err(LoadFailure::MissingDirectory {
                path: dump_dir.to_path_buf(),
            }
            .into());
        }

        let loader = Invocation::new(&self.tools.myloader)
            .flag_value("--verbose", "0")
            .flag_value("--directory", dump_dir.to_string_lossy())
            .args(self.formatter.format(target, CredentialStyle::Tool));

        let schema_file: PathBuf = dump_dir.join(SCHEMA_FILE);
        let schema_replay = schema_file.is_file().then(|| {
            CommandChain::new(
                Invocation::new(&self.tools.mysql)
                    .args(self.formatter.format(target, CredentialStyle::Client))
                    .stdin_from(schema_file),
            )
        });

        Ok(LoadPlan {
            schema_replay,
            loader: CommandChain::new(loader),
        })
    }
}

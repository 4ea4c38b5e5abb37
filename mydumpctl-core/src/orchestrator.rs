//! Drives dump and load operations.
//!
//! The orchestrator owns no policy of its own: table listing, command
//! composition, process execution, directory discovery, time and reporting
//! are all injected through [`Capabilities`]. It sequences them, interprets
//! exit codes and reports the outcome once.

use crate::config::BackupConfig;
use crate::credentials::ConnectionTarget;
use crate::dump::{DumpCommandBuilder, DumpRequest, MydumperDumpBuilder};
use crate::error::{DumperError, LoadFailure, Result};
use crate::load::{LoadCommandBuilder, MyloaderLoadBuilder};
use crate::path::{BackupDirProvider, Clock, OutputArg, PathResolver, RootBackupDir, SystemClock};
use crate::report::{OperationResult, Reporter, TracingReporter};
use crate::runner::{CommandRunner, ShellRunner};
use crate::selection::TableSelector;
use crate::tables::TableLister;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Collaborators used by the [`Orchestrator`].
#[derive(Clone)]
pub struct Capabilities {
    /// Lists all tables of the target database
    pub table_lister: Arc<dyn TableLister>,
    /// Composes dump commands
    pub dump_builder: Arc<dyn DumpCommandBuilder>,
    /// Composes (and gates) load commands
    pub load_builder: Arc<dyn LoadCommandBuilder>,
    /// Executes composed commands
    pub runner: Arc<dyn CommandRunner>,
    /// Supplies generated backup directories
    pub backup_dirs: Arc<dyn BackupDirProvider>,
    /// Time source for `@DATE`
    pub clock: Arc<dyn Clock>,
    /// Outcome sink
    pub reporter: Arc<dyn Reporter>,
}

impl Capabilities {
    /// Default mydumper/myloader collaborators for `config`, with the given
    /// table lister.
    pub fn new(config: &BackupConfig, table_lister: Arc<dyn TableLister>) -> Self {
        Self {
            table_lister,
            dump_builder: Arc::new(MydumperDumpBuilder::new(config.tools.clone())),
            load_builder: Arc::new(MyloaderLoadBuilder::new(config.tools.clone())),
            runner: Arc::new(ShellRunner::default()),
            backup_dirs: Arc::new(RootBackupDir::new(config.backup_root.clone())),
            clock: Arc::new(SystemClock),
            reporter: Arc::new(TracingReporter),
        }
    }

    /// Builder method to replace the command runner.
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Builder method to replace the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Builder method to replace the reporter.
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Builder method to replace the backup directory provider.
    pub fn with_backup_dirs(mut self, backup_dirs: Arc<dyn BackupDirProvider>) -> Self {
        self.backup_dirs = backup_dirs;
        self
    }
}

/// Runs dumps and loads for one configured database.
pub struct Orchestrator {
    config: BackupConfig,
    target: ConnectionTarget,
    capabilities: Capabilities,
}

impl Orchestrator {
    /// Validates `config` and binds it to `capabilities`.
    ///
    /// # Errors
    /// Returns the first configuration problem found by
    /// [`BackupConfig::validate`].
    pub fn new(config: BackupConfig, capabilities: Capabilities) -> Result<Self> {
        config.validate()?;
        let target = config.target()?;
        Ok(Self {
            config,
            target,
            capabilities,
        })
    }

    /// The configuration this orchestrator was built with.
    pub const fn config(&self) -> &BackupConfig {
        &self.config
    }

    /// Dumps the database into the location described by `output`.
    ///
    /// # Errors
    /// `DumpFailed` if the composed command exits non-zero; configuration,
    /// table listing or I/O errors from the collaborators otherwise.
    pub async fn dump(&self, output: &OutputArg) -> Result<OperationResult> {
        let outcome = self.run_dump(output).await.map(|dir| {
            OperationResult::succeeded(format!("Database dump saved to {}", dir.display()), dir)
        });
        self.report(outcome)
    }

    /// Restores the dump found in `dump_dir`.
    ///
    /// # Errors
    /// `LoadFailed` if the directory is missing, the schema replay fails, or
    /// the loader exits non-zero; I/O errors from the runner otherwise.
    pub async fn load(&self, dump_dir: &Path) -> Result<OperationResult> {
        let outcome = self.run_load(dump_dir).await.map(|()| {
            OperationResult::succeeded(
                format!("Database restored from {}", dump_dir.display()),
                dump_dir.to_path_buf(),
            )
        });
        self.report(outcome)
    }

    async fn run_dump(&self, output: &OutputArg) -> Result<PathBuf> {
        let caps = &self.capabilities;
        let database = self.target.database.as_str();

        let selection = self.config.effective_selection()?;
        let tables =
            TableSelector::resolve_with(&selection, database, caps.table_lister.as_ref()).await?;

        let resolver = PathResolver::new(caps.backup_dirs.as_ref(), caps.clock.as_ref());
        let output_dir = PathBuf::from(resolver.resolve(output, database));

        info!(
            "Dumping {} tables ({} structure-only) from {} to {}",
            tables.dump.len(),
            tables.structure.len(),
            self.target,
            output_dir.display()
        );

        let command = caps.dump_builder.build(&DumpRequest {
            tables: &tables,
            options: self.config.options,
            output_dir: Some(&output_dir),
            target: &self.target,
        });
        debug!("Dump command: {}", command);

        let exit_code = caps.runner.run(&command).await?;
        if exit_code != 0 {
            return Err(DumperError::DumpFailed { exit_code });
        }
        Ok(output_dir)
    }

    async fn run_load(&self, dump_dir: &Path) -> Result<()> {
        let caps = &self.capabilities;

        info!("Restoring {} into {}", dump_dir.display(), self.target);
        let loader = caps
            .load_builder
            .build(dump_dir, &self.target, caps.runner.as_ref())
            .await?;
        debug!("Load command: {}", loader);

        let exit_code = caps.runner.run(&loader).await?;
        if exit_code != 0 {
            return Err(LoadFailure::Loader { exit_code }.into());
        }
        Ok(())
    }

    fn report(&self, outcome: Result<OperationResult>) -> Result<OperationResult> {
        let reporter = &self.capabilities.reporter;
        match outcome {
            Ok(result) => {
                reporter.success(&result.message);
                reporter.result(&result);
                Ok(result)
            }
            Err(error) => {
                reporter.failure(&error);
                reporter.result(&OperationResult::failed(&error));
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use async_trait::async_trait;

    struct NoTables;

    #[async_trait]
    impl TableLister for NoTables {
        async fn list_tables(&self, _database: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = BackupConfig::new().with_database_url("postgres://localhost/app");
        let caps = Capabilities::new(&config, Arc::new(NoTables));
        let error = Orchestrator::new(config, caps).err().unwrap();
        assert_eq!(error.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_new_accepts_valid_config() {
        let config = BackupConfig::new().with_database_url("mysql://root@localhost/app");
        let caps = Capabilities::new(&config, Arc::new(NoTables));
        let orchestrator = Orchestrator::new(config, caps).unwrap();
        assert_eq!(
            orchestrator.config().database_url.as_deref(),
            Some("mysql://root@localhost/app")
        );
    }
}

//! Parallel MySQL backup and restore driver.
//!
//! Dumps with mydumper (plus mysqldump for structure-only tables) and
//! restores with myloader (after replaying the saved schemas with mysql).
//!
//! # Security Guarantees
//! - Passwords never appear in logs, results, or dry-run output
//! - Database URL read from the environment, a file, or the config file

use clap::Parser;
use mydumpctl::{Cli, execute, with_password};
use mydumpctl_core::{
    BackupConfig, Capabilities, DryRunRunner, DumperError, Orchestrator, Result, TableLister,
    TracingReporter, error::redact_database_url, logging::init_logging,
};
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet, cli.global.log_format.into())?;

    let dry_run = cli.global.dry_run.then(|| Arc::new(DryRunRunner::new()));
    let password_prompt = cli.global.password_prompt;

    let result = execute(&cli, &TracingReporter, |mut config| {
        if password_prompt {
            prompt_password(&mut config)?;
        }
        if let Some(url) = &config.database_url {
            info!("Target: {}", redact_database_url(url));
        }

        let mut capabilities = Capabilities::new(&config, table_lister(&config)?);
        if let Some(runner) = &dry_run {
            capabilities = capabilities.with_runner(runner.clone());
        }
        Orchestrator::new(config, capabilities)
    })
    .await;

    if let Some(runner) = &dry_run {
        for command in runner.commands() {
            println!("{command}");
        }
    }

    if cli.global.json {
        println!("{}", result.to_json()?);
    }

    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Reads the database password from the terminal and puts it into the URL.
fn prompt_password(config: &mut BackupConfig) -> Result<()> {
    let url = config
        .database_url
        .as_deref()
        .ok_or_else(|| DumperError::configuration("No database URL to attach the password to"))?;

    eprint!("Enter database password: ");
    io::stderr()
        .flush()
        .map_err(|e| DumperError::io("Failed to flush stderr before reading password", e))?;
    let password = zeroize::Zeroizing::new(
        rpassword::read_password().map_err(|e| DumperError::io("Failed to read password", e))?,
    );

    config.database_url = Some(with_password(url, &password)?);
    Ok(())
}

#[cfg(feature = "mysql")]
fn table_lister(config: &BackupConfig) -> Result<Arc<dyn TableLister>> {
    let url = config
        .database_url
        .clone()
        .ok_or_else(|| DumperError::configuration("Database connection information required"))?;
    Ok(Arc::new(mydumpctl_core::MySqlTableLister::new(url)))
}

#[cfg(not(feature = "mysql"))]
#[allow(clippy::unnecessary_wraps)]
fn table_lister(_config: &BackupConfig) -> Result<Arc<dyn TableLister>> {
    Ok(Arc::new(NoTableListing))
}

/// Stand-in lister for builds without MySQL support: only explicit,
/// wildcard-free table lists can be dumped.
#[cfg(not(feature = "mysql"))]
struct NoTableListing;

#[cfg(not(feature = "mysql"))]
#[async_trait::async_trait]
impl TableLister for NoTableListing {
    async fn list_tables(&self, _database: &str) -> Result<Vec<String>> {
        Err(DumperError::configuration(
            "Table listing requires the mysql feature; pass --tables explicitly",
        ))
    }
}

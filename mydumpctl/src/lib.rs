//! Library module for mydumpctl
//!
//! Exposes the command-line surface and configuration assembly so they can be
//! tested without spawning the binary. Execution lives in main.rs.

use clap::{Args, Parser, Subcommand, ValueEnum};
use mydumpctl_core::{
    BackupConfig, ConnectionTarget, DumperError, OperationResult, Orchestrator, OutputArg,
    Reporter, Result, logging::LogFormat,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// CLI argument structure
#[derive(Parser)]
#[command(name = "mydumpctl")]
#[command(about = "Parallel MySQL backup and restore with mydumper/myloader")]
#[command(version)]
#[command(long_about = "
mydumpctl - Parallel MySQL backup and restore

Dumps a database with mydumper and restores it with myloader. Tables can be
skipped entirely, or kept as structure only: their DDL is saved to a
schema_sql file next to the dump and replayed before the data is loaded.

SECURITY FEATURES:
- Passwords are never logged; commands are shown redacted
- Database URL from DATABASE_URL, a file, or the config file

EXAMPLES:
  mydumpctl dump --result-file /backup/@DATABASE_@DATE --structure-tables cache,sessions
  mydumpctl --config backup.json dump --gzip
  mydumpctl --dry-run load /backup/shop_20240101_000000
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Dump the database with mydumper
    Dump(DumpArgs),
    /// Restore a mydumper dump directory
    Load(LoadArgs),
}

/// Log line format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    /// Human-readable text
    #[default]
    Text,
    /// JSON lines
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(format: LogFormatArg) -> Self {
        match format {
            LogFormatArg::Text => Self::Text,
            LogFormatArg::Json => Self::Json,
        }
    }
}

/// Options accepted by every subcommand
#[derive(Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all output except errors")]
    pub quiet: bool,

    /// Log format
    #[arg(long, global = true, value_enum, default_value_t = LogFormatArg::Text)]
    pub log_format: LogFormatArg,

    /// JSON configuration file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Database connection URL
    #[arg(
        long,
        global = true,
        env = "DATABASE_URL",
        hide_env_values = true,
        help = "mysql:// connection string (credentials will be sanitized in logs)"
    )]
    pub database_url: Option<String>,

    /// Path to file containing database URL
    #[arg(long, global = true, value_name = "FILE")]
    pub database_url_file: Option<PathBuf>,

    /// Prompt for the database password instead of taking it from the URL
    #[arg(long, global = true)]
    pub password_prompt: bool,

    /// Print the result as JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    /// Print the commands instead of running them
    #[arg(long, global = true)]
    pub dry_run: bool,
}

/// Arguments of `mydumpctl dump`
#[derive(Args, Default)]
pub struct DumpArgs {
    /// Output directory; `@DATABASE` and `@DATE` are substituted. Without a
    /// value (or with `true`) a directory under the backup root is generated.
    #[arg(
        long,
        value_name = "PATH",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub result_file: Option<String>,

    /// Only dump these tables (replaces the configured list)
    #[arg(long, value_delimiter = ',')]
    pub tables: Vec<String>,

    /// Leave these tables out of the backup
    #[arg(long, value_delimiter = ',')]
    pub skip_tables: Vec<String>,

    /// Back up only the structure of these tables
    #[arg(long, value_delimiter = ',')]
    pub structure_tables: Vec<String>,

    /// Named table set merged into --tables
    #[arg(long, value_name = "KEY")]
    pub tables_key: Option<String>,

    /// Named table set merged into --skip-tables
    #[arg(long, value_name = "KEY")]
    pub skip_tables_key: Option<String>,

    /// Named table set merged into --structure-tables
    #[arg(long, value_name = "KEY")]
    pub structure_tables_key: Option<String>,

    /// Compress the dump files
    #[arg(long)]
    pub gzip: bool,

    /// Dump data without table schemas
    #[arg(long)]
    pub data_only: bool,
}

/// Arguments of `mydumpctl load`
#[derive(Args)]
pub struct LoadArgs {
    /// Dump directory produced by `mydumpctl dump`
    #[arg(value_name = "DIR")]
    pub dump_dir: PathBuf,
}

/// Where the database URL came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// `--database-url` or the `DATABASE_URL` environment variable
    CommandLine,
    /// `--database-url-file`
    File(PathBuf),
    /// `database_url` in the configuration file
    ConfigFile,
}

/// Validate database URL format without exposing credentials
#[must_use]
pub fn validate_database_url(url: &str) -> bool {
    !url.trim().is_empty() && ConnectionTarget::parse(url.trim()).is_ok()
}

/// Get database connection URL from the configured sources.
///
/// Order: `--database-url`/`DATABASE_URL`, then `--database-url-file`, then
/// the configuration file.
///
/// # Errors
///
/// Returns a configuration error if a source holds an invalid URL, the URL
/// file cannot be read, or no source is set. Messages never contain the URL.
pub fn get_database_url(
    cli_url: Option<&str>,
    database_url_file: Option<&Path>,
    config_url: Option<&str>,
) -> Result<(String, CredentialSource)> {
    // 1. Command line or environment
    if let Some(url) = cli_url {
        if validate_database_url(url) {
            return Ok((url.trim().to_string(), CredentialSource::CommandLine));
        }
        return Err(DumperError::configuration(
            "Invalid database URL format in --database-url/DATABASE_URL",
        ));
    }

    // 2. File
    if let Some(file_path) = database_url_file {
        let contents = fs::read_to_string(file_path).map_err(|e| {
            DumperError::configuration(format!(
                "Failed to read database URL file {}: {}",
                file_path.display(),
                e
            ))
        })?;
        let url = contents.trim();
        if validate_database_url(url) {
            return Ok((url.to_string(), CredentialSource::File(file_path.to_path_buf())));
        }
        return Err(DumperError::configuration(format!(
            "Invalid database URL format in file: {}",
            file_path.display()
        )));
    }

    // 3. Configuration file
    if let Some(url) = config_url {
        if validate_database_url(url) {
            return Ok((url.trim().to_string(), CredentialSource::ConfigFile));
        }
        return Err(DumperError::configuration(
            "Invalid database URL format in configuration file",
        ));
    }

    Err(DumperError::configuration(
        "Database connection information required. Set DATABASE_URL environment variable or use --database-url-file.",
    ))
}

/// Replaces the password of `url`.
///
/// # Errors
///
/// Returns a configuration error if `url` cannot carry a password.
pub fn with_password(url: &str, password: &str) -> Result<String> {
    let mut parsed = url::Url::parse(url)
        .map_err(|e| DumperError::configuration(format!("Invalid connection string format: {e}")))?;
    parsed
        .set_password(Some(password))
        .map_err(|()| DumperError::configuration("Connection string cannot carry a password"))?;
    Ok(parsed.to_string())
}

impl DumpArgs {
    /// Applies the dump flags on top of `config`. Non-empty lists replace the
    /// configured ones; set keys and switched-on flags override.
    pub fn apply_to(&self, config: &mut BackupConfig) {
        if !self.tables.is_empty() {
            config.selection.tables.clone_from(&self.tables);
        }
        if !self.skip_tables.is_empty() {
            config.selection.skip.clone_from(&self.skip_tables);
        }
        if !self.structure_tables.is_empty() {
            config.selection.structure.clone_from(&self.structure_tables);
        }

        let keys = &mut config.table_set_keys;
        if self.tables_key.is_some() {
            keys.tables_key.clone_from(&self.tables_key);
        }
        if self.skip_tables_key.is_some() {
            keys.skip_tables_key.clone_from(&self.skip_tables_key);
        }
        if self.structure_tables_key.is_some() {
            keys.structure_tables_key.clone_from(&self.structure_tables_key);
        }

        config.options.compress |= self.gzip;
        config.options.data_only |= self.data_only;
    }
}

/// Assembles the effective configuration for `cli`.
///
/// # Errors
///
/// Returns an error if the configuration file cannot be loaded or no valid
/// database URL is found.
pub fn build_config(cli: &Cli) -> Result<(BackupConfig, CredentialSource)> {
    let mut config = match &cli.global.config {
        Some(path) => BackupConfig::from_file(path)?,
        None => BackupConfig::default(),
    };

    let (url, source) = get_database_url(
        cli.global.database_url.as_deref(),
        cli.global.database_url_file.as_deref(),
        config.database_url.as_deref(),
    )?;
    config.database_url = Some(url);

    if let Command::Dump(args) = &cli.command {
        args.apply_to(&mut config);
    }

    Ok((config, source))
}

/// Assembles the configuration for `cli`, hands it to `setup` to build the
/// orchestrator, and runs the requested subcommand.
///
/// Failures before the orchestrator exists are reported through `reporter`
/// just as the orchestrator reports its own, so every invocation ends with an
/// [`OperationResult`].
pub async fn execute<F>(cli: &Cli, reporter: &dyn Reporter, setup: F) -> OperationResult
where
    F: FnOnce(BackupConfig) -> Result<Orchestrator>,
{
    let prepared = build_config(cli).and_then(|(config, source)| {
        match &source {
            CredentialSource::CommandLine => debug!("Database URL taken from the command line"),
            CredentialSource::File(path) => debug!("Database URL loaded from {}", path.display()),
            CredentialSource::ConfigFile => {
                debug!("Database URL taken from the configuration file");
            }
        }
        setup(config)
    });

    let orchestrator = match prepared {
        Ok(orchestrator) => orchestrator,
        Err(error) => {
            reporter.failure(&error);
            let result = OperationResult::failed(&error);
            reporter.result(&result);
            return result;
        }
    };

    let outcome = match &cli.command {
        Command::Dump(args) => {
            orchestrator
                .dump(&OutputArg::parse(args.result_file.as_deref()))
                .await
        }
        Command::Load(args) => orchestrator.load(&args.dump_dir).await,
    };
    outcome.unwrap_or_else(|error| OperationResult::failed(&error))
}

//! Backup configuration.
//!
//! A [`BackupConfig`] is built once (from a JSON file, CLI flags, or both)
//! and handed to the orchestrator. Nothing reads options from global state.
//!
//! ```json
//! {
//!   "database_url": "mysql://backup@db.internal/shop",
//!   "selection": { "skip": ["cache*"], "structure": ["sessions"] },
//!   "table_sets": { "common": ["watchdog", "sessions"] },
//!   "table_set_keys": { "structure_tables_key": "common" },
//!   "options": { "compress": true },
//!   "backup_root": "/var/backups/mysql"
//! }
//! ```

use crate::credentials::ConnectionTarget;
use crate::dump::{DumpOptions, ToolPaths};
use crate::error::{DumperError, Result, redact_database_url};
use crate::selection::{TableSelection, TableSetKeys};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Complete configuration of a dump or load.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// `mysql://` connection URL of the target database
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    /// Explicit table lists
    pub selection: TableSelection,
    /// Named table sets, referenced by `table_set_keys`
    pub table_sets: BTreeMap<String, Vec<String>>,
    /// Which named sets to merge into the explicit lists
    pub table_set_keys: TableSetKeys,
    /// Dump output flags
    pub options: DumpOptions,
    /// Root for generated backup directories
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_root: Option<PathBuf>,
    /// External tool executables
    pub tools: ToolPaths,
}

impl std::fmt::Debug for BackupConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupConfig")
            .field(
                "database_url",
                &self.database_url.as_deref().map(redact_database_url),
            )
            .field("selection", &self.selection)
            .field("table_sets", &self.table_sets)
            .field("table_set_keys", &self.table_set_keys)
            .field("options", &self.options)
            .field("backup_root", &self.backup_root)
            .field("tools", &self.tools)
            .finish()
    }
}

impl BackupConfig {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the connection URL.
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    /// Builder method to set the table lists.
    pub fn with_selection(mut self, selection: TableSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Builder method to set the dump flags.
    pub const fn with_options(mut self, options: DumpOptions) -> Self {
        self.options = options;
        self
    }

    /// Builder method to set the backup root.
    pub fn with_backup_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.backup_root = Some(root.into());
        self
    }

    /// Parses a configuration from JSON text.
    ///
    /// # Errors
    /// Returns `DumperError::Serialization` on malformed JSON or unknown types.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|source| DumperError::Serialization {
            context: "Invalid configuration".to_string(),
            source,
        })
    }

    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    /// Returns `DumperError::Io` if the file cannot be read, or
    /// `DumperError::Serialization` if it is not valid configuration.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            DumperError::io(format!("Failed to read config file {}", path.display()), e)
        })?;
        Self::from_json(&contents)
    }

    /// Parses the configured connection URL.
    ///
    /// # Errors
    /// Returns a configuration error if no URL is set or it is not a valid
    /// `mysql://` URL with a database name.
    pub fn target(&self) -> Result<ConnectionTarget> {
        let url = self.database_url.as_deref().ok_or_else(|| {
            DumperError::configuration(
                "Database connection information required. Set DATABASE_URL or use --database-url-file.",
            )
        })?;
        ConnectionTarget::parse(url)
    }

    /// Explicit lists with the referenced named table sets merged in.
    ///
    /// # Errors
    /// Returns a configuration error for an unknown table set key.
    pub fn effective_selection(&self) -> Result<TableSelection> {
        self.selection
            .clone()
            .merge_named_sets(&self.table_sets, &self.table_set_keys)
    }

    /// Checks that the configuration can drive a dump or load.
    ///
    /// # Errors
    /// Returns the first problem found: missing or invalid URL, unknown table
    /// set key, or an empty tool name.
    pub fn validate(&self) -> Result<()> {
        self.target()?;
        self.effective_selection()?;

        let tools = [
            ("mydumper", &self.tools.mydumper),
            ("myloader", &self.tools.myloader),
            ("mysqldump", &self.tools.mysqldump),
            ("mysql", &self.tools.mysql),
        ];
        if let Some((name, _)) = tools.iter().find(|(_, path)| path.trim().is_empty()) {
            return Err(DumperError::configuration(format!(
                "Tool path for {name} must not be empty"
            )));
        }
        Ok(())
    }
}

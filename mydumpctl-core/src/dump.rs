//! Dump command composition.
//!
//! The data dump always runs through mydumper. When structure-only tables are
//! configured (and no explicit whitelist is in effect) a single-connection,
//! consistent-snapshot `mysqldump --no-data` is chained after it, writing the
//! DDL to `<dir>/schema_sql`. The file is deliberately *not* named
//! `schema.sql`: myloader treats `*.sql` files in its input directory as its
//! own and crashes on that one.
//!
//! With an explicit whitelist the chain is never appended, even if
//! structure-only tables are configured. That is a known limitation.

use crate::command::{Arg, CommandChain, Invocation};
use crate::credentials::{
    ConnectionTarget, CredentialFormatter, CredentialStyle, MySqlCredentialFormatter,
};
use crate::selection::ResolvedTables;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Fixed name of the DDL file for structure-only tables.
pub const SCHEMA_FILE: &str = "schema_sql";

/// Flags that change the emitted command but never the table algebra.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpOptions {
    /// Compress per-table output files
    pub compress: bool,
    /// Skip schema files, dump rows only
    pub data_only: bool,
}

/// Executable names (or paths) of the external tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    /// Parallel dump tool
    pub mydumper: String,
    /// Parallel load tool
    pub myloader: String,
    /// Single-connection dump client
    pub mysqldump: String,
    /// Single-connection SQL client
    pub mysql: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            mydumper: "mydumper".to_string(),
            myloader: "myloader".to_string(),
            mysqldump: "mysqldump".to_string(),
            mysql: "mysql".to_string(),
        }
    }
}

/// Everything a dump command depends on.
#[derive(Debug, Clone, Copy)]
pub struct DumpRequest<'a> {
    /// Resolved table sets
    pub tables: &'a ResolvedTables,
    /// Output flags
    pub options: DumpOptions,
    /// Output directory, if one was supplied
    pub output_dir: Option<&'a Path>,
    /// Server and credentials
    pub target: &'a ConnectionTarget,
}

/// Composes the external command that performs a dump.
pub trait DumpCommandBuilder: Send + Sync {
    /// Builds the command for `request`. Pure: no I/O, no logging.
    fn build(&self, request: &DumpRequest<'_>) -> CommandChain;
}

/// mydumper-based dump, with mysqldump for structure-only tables.
#[derive(Clone)]
pub struct MydumperDumpBuilder {
    tools: ToolPaths,
    formatter: Arc<dyn CredentialFormatter>,
}

impl Default for MydumperDumpBuilder {
    fn default() -> Self {
        Self::new(ToolPaths::default())
    }
}

impl MydumperDumpBuilder {
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

    fn parallel_dump(&self, request: &DumpRequest<'_>) -> Invocation {
        let mut dump = Invocation::new(&self.tools.mydumper)
            .flag_value("--verbose", "0")
            .arg("--build-empty-files");

        if let Some(dir) = request.output_dir {
            dump = dump.flag_value("--outputdir", dir.to_string_lossy());
        }

        dump = dump.args(self.formatter.format(request.target, CredentialStyle::Tool));

        if request.options.compress {
            dump = dump.arg("--compress");
        }
        if request.options.data_only {
            dump = dump.arg("--no-schemas");
        }

        dump.flag_value("--tables-list", request.tables.dump.join(","))
    }

    fn structure_dump(&self, request: &DumpRequest<'_>) -> Invocation {
        let dir = request.output_dir.unwrap_or_else(|| Path::new("."));
        let schema_file: PathBuf = dir.join(SCHEMA_FILE);

        Invocation::new(&self.tools.mysqldump)
            .arg("--no-autocommit")
            .arg("--single-transaction")
            .arg("--opt")
            .arg("-Q")
            .arg("--no-data")
            .args(
                self.formatter
                    .format(request.target, CredentialStyle::ClientPositionalDatabase),
            )
            .args(request.tables.structure.iter().cloned().map(Arg::Plain))
            .stdout_to(schema_file)
    }
}

impl DumpCommandBuilder for MydumperDumpBuilder {
    fn build(&self, request: &DumpRequest<'_>) -> CommandChain {
        let chain = CommandChain::new(self.parallel_dump(request));

        if request.tables.explicit || request.tables.structure.is_empty() {
            return chain;
        }

        chain.then(self.structure_dump(request))
    }
}

//! Core orchestration for mydumper/myloader backups.
//!
//! This crate turns a backup configuration into the external commands that
//! dump and restore a MySQL database with the parallel `mydumper`/`myloader`
//! toolchain, and sequences their execution.
//!
//! # Security Guarantees
//! - Passwords live in zeroizing buffers and are never logged
//! - Composed commands are only displayed in redacted form
//! - Builders are pure; processes are spawned at a single boundary
//!
//! # Architecture
//! - [`selection`] reconciles whitelisted, skipped and structure-only tables
//! - [`dump`] and [`load`] compose commands as structured values
//! - [`runner`] serializes and executes them
//! - [`orchestrator`] drives a full dump or load over injected capabilities

pub mod command;
pub mod config;
pub mod credentials;
pub mod dump;
pub mod error;
pub mod load;
pub mod logging;
pub mod orchestrator;
pub mod path;
pub mod report;
pub mod runner;
pub mod selection;
pub mod tables;

// Re-export commonly used types
pub use command::{Arg, CommandChain, Invocation};
pub use config::BackupConfig;
pub use credentials::{
    ConnectionTarget, CredentialFormatter, CredentialStyle, Credentials, MySqlCredentialFormatter,
};
pub use dump::{DumpCommandBuilder, DumpOptions, DumpRequest, MydumperDumpBuilder, ToolPaths};
pub use error::{DumperError, ErrorKind, LoadFailure, Result};
pub use load::{LoadCommandBuilder, LoadPlan, MyloaderLoadBuilder};
pub use orchestrator::{Capabilities, Orchestrator};
pub use path::{BackupDirProvider, Clock, FixedClock, OutputArg, PathResolver, RootBackupDir, SystemClock};
pub use report::{OperationResult, Reporter, TracingReporter};
pub use runner::{CommandRunner, DryRunRunner, ShellRunner};
pub use selection::{ResolvedTables, TableSelection, TableSelector, TableSetKeys};
pub use tables::TableLister;

#[cfg(feature = "mysql")]
pub use tables::MySqlTableLister;

//! Outcome reporting.
//!
//! The orchestrator reports exactly once per operation, after the external
//! tools have finished: a success message or the failing error, followed by
//! the final [`OperationResult`]. Builders and runners never go through the
//! reporter.

use crate::error::{DumperError, ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, error, info};

/// Sink for user-facing outcomes.
pub trait Reporter: Send + Sync {
    /// Reports a successful operation.
    fn success(&self, message: &str);

    /// Reports a failed operation.
    fn failure(&self, error: &DumperError);

    /// Receives the final result of the operation.
    fn result(&self, _result: &OperationResult) {}
}

/// Reports through `tracing`: successes at INFO, failures at ERROR.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn success(&self, message: &str) {
        info!("{}", message);
    }

    fn failure(&self, error: &DumperError) {
        error!(error_kind = %error.kind(), "{}", error);
    }

    fn result(&self, result: &OperationResult) {
        debug!(success = result.success, "Operation finished");
    }
}

/// Machine-readable result of one dump or load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    /// Whether the operation succeeded
    pub success: bool,
    /// Stable error code when it did not
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_kind: Option<ErrorKind>,
    /// The reported message
    pub message: String,
    /// Exit code of the failing external tool, if one failed
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub exit_code: Option<i32>,
    /// Dump directory written (dump) or restored from (load)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub produced_path: Option<PathBuf>,
}

impl OperationResult {
    /// A successful result.
    pub fn succeeded(message: impl Into<String>, produced_path: PathBuf) -> Self {
        Self {
            success: true,
            error_kind: None,
            message: message.into(),
            exit_code: None,
            produced_path: Some(produced_path),
        }
    }

    /// A failed result describing `error`.
    pub fn failed(error: &DumperError) -> Self {
        Self {
            success: false,
            error_kind: Some(error.kind()),
            message: error.to_string(),
            exit_code: error.exit_code(),
            produced_path: None,
        }
    }

    /// Pretty-printed JSON form.
    ///
    /// # Errors
    /// Returns `DumperError::Serialization` if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|source| DumperError::Serialization {
            context: "Failed to encode operation result".to_string(),
            source,
        })
    }
}

//! Per-document failure taxonomy.
//!
//! Every failure stays local to its document: the batch records the exit
//! code and moves on. [`ErrorKind`] is the stable, serializable classification
//! (and owns the exit-code table); [`RouteError`] carries the detail that gets
//! logged.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_MIN_SLICE: i32 = 2;
pub const EXIT_SINGLE_PASS: i32 = 3;
pub const EXIT_UNHANDLED: i32 = 9;
pub const EXIT_CRASH: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    NotOpenable,
    MissingDependency,
    UnknownEngine,
    MinSliceFailure,
    SinglePassFailure,
    EngineFailed,
    Unhandled,
}

impl ErrorKind {
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::NotOpenable | ErrorKind::MissingDependency | ErrorKind::EngineFailed => {
                EXIT_FAILURE
            }
            ErrorKind::MinSliceFailure => EXIT_MIN_SLICE,
            ErrorKind::SinglePassFailure => EXIT_SINGLE_PASS,
            ErrorKind::UnknownEngine | ErrorKind::Unhandled => EXIT_UNHANDLED,
        }
    }
}

/// The failure half of an engine's [`crate::engine::ConversionResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineFailure {
    pub kind: ErrorKind,
    pub detail: String,
}

impl EngineFailure {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn missing_dependency(what: impl Into<String>) -> Self {
        Self::new(ErrorKind::MissingDependency, what)
    }
}

impl std::fmt::Display for EngineFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.detail)
    }
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("unknown engine: {name}")]
    UnknownEngine { name: String },

    #[error("engine '{engine}' failed on {path}: {failure}")]
    Engine {
        engine: String,
        path: PathBuf,
        failure: EngineFailure,
    },

    #[error("slice {start}-{end} of {path} failed at minimum width {width}: {detail}")]
    MinSlice {
        path: PathBuf,
        start: u32,
        end: u32,
        width: u32,
        detail: String,
    },

    #[error("single-pass conversion of {path} failed: {detail}")]
    SinglePass { path: PathBuf, detail: String },

    #[error("unhandled error: {0:#}")]
    Unhandled(#[from] anyhow::Error),
}

impl RouteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RouteError::UnknownEngine { .. } => ErrorKind::UnknownEngine,
            RouteError::Engine { failure, .. } => failure.kind,
            RouteError::MinSlice { .. } => ErrorKind::MinSliceFailure,
            RouteError::SinglePass { .. } => ErrorKind::SinglePassFailure,
            RouteError::Unhandled(_) => ErrorKind::Unhandled,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_per_terminal_kind() {
        assert_eq!(ErrorKind::MinSliceFailure.exit_code(), 2);
        assert_eq!(ErrorKind::SinglePassFailure.exit_code(), 3);
        assert_eq!(ErrorKind::UnknownEngine.exit_code(), 9);
        assert_eq!(ErrorKind::Unhandled.exit_code(), 9);
        assert_eq!(ErrorKind::MissingDependency.exit_code(), 1);
        assert_ne!(ErrorKind::MinSliceFailure.exit_code(), EXIT_OK);
    }

    #[test]
    fn engine_error_reports_failure_kind() {
        let err = RouteError::Engine {
            engine: "pdftotext".into(),
            path: "a.pdf".into(),
            failure: EngineFailure::missing_dependency("pdftotext not found on PATH"),
        };
        assert_eq!(err.kind(), ErrorKind::MissingDependency);
        assert!(err.to_string().contains("pdftotext not found"));
    }

    #[test]
    fn unknown_engine_message_names_the_engine() {
        let err = RouteError::UnknownEngine { name: "nope".into() };
        assert_eq!(err.to_string(), "unknown engine: nope");
        assert_eq!(err.exit_code(), 9);
    }
}

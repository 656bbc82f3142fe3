//! Crate-wide error type.
//!
//! Mirrors the error kinds called out for the pipeline: each variant carries
//! the structured context (coordinate, URL, underlying cause) needed to
//! surface a useful message in an event or a `failed` entry, while `kind()`
//! gives callers a stable, match-free way to bucket an error for reporting.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::coordinate::Coordinate;

/// A coarse, serializable bucket an error belongs to. Kept separate from
/// `DepotError` so event payloads can carry a stable tag without exposing the
/// full variant shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Network,
    Http4xx,
    NotFound,
    ParseError,
    ChecksumMismatch,
    ConstraintUnsatisfiable,
    Cycle,
    Cancelled,
    IoError,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Network => "network",
            ErrorKind::Http4xx => "http-4xx",
            ErrorKind::NotFound => "not-found",
            ErrorKind::ParseError => "parse-error",
            ErrorKind::ChecksumMismatch => "checksum-mismatch",
            ErrorKind::ConstraintUnsatisfiable => "constraint-unsatisfiable",
            ErrorKind::Cycle => "cycle",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::IoError => "io-error",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum DepotError {
    #[error("network error fetching {coord:?} from {url}: {source}")]
    Network {
        coord: Option<Coordinate>,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("http {status} for {url}")]
    Http4xx { url: String, status: u16 },

    #[error("package not found: {0}")]
    NotFound(Coordinate),

    #[error("failed to parse {context}: {message}")]
    ParseError { context: String, message: String },

    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("constraint unsatisfiable for {name}: no version matches {constraint}")]
    ConstraintUnsatisfiable { name: String, constraint: String },

    #[error("circular dependency detected at {0}")]
    Cycle(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl DepotError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            DepotError::Network { .. } => ErrorKind::Network,
            DepotError::Http4xx { .. } => ErrorKind::Http4xx,
            DepotError::NotFound(_) => ErrorKind::NotFound,
            DepotError::ParseError { .. } => ErrorKind::ParseError,
            DepotError::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
            DepotError::ConstraintUnsatisfiable { .. } => ErrorKind::ConstraintUnsatisfiable,
            DepotError::Cycle(_) => ErrorKind::Cycle,
            DepotError::Cancelled => ErrorKind::Cancelled,
            DepotError::Io { .. } => ErrorKind::IoError,
            DepotError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Transient failures are worth retrying; everything else is terminal.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            DepotError::Network { .. } => true,
            DepotError::ChecksumMismatch { .. } => true,
            DepotError::Http4xx { status, .. } => *status == 408 || *status == 429,
            _ => false,
        }
    }
}

impl From<std::io::Error> for DepotError {
    fn from(source: std::io::Error) -> Self {
        DepotError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

impl From<serde_json::Error> for DepotError {
    fn from(err: serde_json::Error) -> Self {
        DepotError::ParseError {
            context: "json".to_string(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DepotError>;

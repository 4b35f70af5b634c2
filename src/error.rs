// src/error.rs

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Every failure the ingestion core can report.
///
/// Family-scoped variants abort one family's chain. `ValueCoercion` is
/// row-scoped: callers exclude the row and keep going.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("source unavailable: {source_id}: {reason}")]
    SourceUnavailable { source_id: String, reason: String },

    #[error("source format error: {source_id}: {reason}")]
    SourceFormat { source_id: String, reason: String },

    #[error("source returned no rows: {source_id}")]
    SourceEmpty { source_id: String },

    #[error("ambiguous source: {source_id}: {matches} tables match the expected header signature")]
    AmbiguousSource { source_id: String, matches: usize },

    #[error("schema mismatch for {family}: missing required column `{column}`")]
    SchemaMismatch { family: String, column: String },

    #[error("index not unique for {family}: duplicate key {key}")]
    IndexNotUnique { family: String, key: String },

    #[error("cannot coerce `{value}` in column `{column}`: {reason}")]
    ValueCoercion {
        column: String,
        value: String,
        reason: String,
    },

    #[error("invalid store key `{0}`")]
    InvalidKey(String),

    #[error("store error at `{key}`: {reason}")]
    Store { key: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),
}

/// Discriminant of an [`IngestError`], used in run summaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    SourceUnavailable,
    SourceFormatError,
    SourceEmpty,
    AmbiguousSource,
    SchemaMismatch,
    IndexNotUnique,
    ValueCoercionError,
    InvalidKey,
    Store,
    Config,
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
            IngestError::SourceFormat { .. } => ErrorKind::SourceFormatError,
            IngestError::SourceEmpty { .. } => ErrorKind::SourceEmpty,
            IngestError::AmbiguousSource { .. } => ErrorKind::AmbiguousSource,
            IngestError::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
            IngestError::IndexNotUnique { .. } => ErrorKind::IndexNotUnique,
            IngestError::ValueCoercion { .. } => ErrorKind::ValueCoercionError,
            IngestError::InvalidKey(_) => ErrorKind::InvalidKey,
            IngestError::Store { .. } => ErrorKind::Store,
            IngestError::Config(_) => ErrorKind::Config,
        }
    }

    pub fn unavailable(source_id: impl Into<String>, reason: impl fmt::Display) -> Self {
        IngestError::SourceUnavailable {
            source_id: source_id.into(),
            reason: reason.to_string(),
        }
    }

    pub fn format(source_id: impl Into<String>, reason: impl fmt::Display) -> Self {
        IngestError::SourceFormat {
            source_id: source_id.into(),
            reason: reason.to_string(),
        }
    }

    pub fn store(key: impl Into<String>, reason: impl fmt::Display) -> Self {
        IngestError::Store {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    pub fn coercion(column: &str, value: &str, reason: impl fmt::Display) -> Self {
        IngestError::ValueCoercion {
            column: column.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Non-fatal notice raised by the store writer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Advisory {
    /// A column had no native store type and was serialized generically.
    PerformanceAdvisory { key: String, column: String },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::PerformanceAdvisory { key, column } => write!(
                f,
                "PerformanceAdvisory: `{}` column `{}` stored as serialized JSON text",
                key, column
            ),
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;

//! Error types for `wit_migrate`.
//!
//! Every failure the engine can observe maps onto one [`MigrateError`]
//! variant. Most of them are contained at the entity or sub-tree level by the
//! processors; only [`MigrateError::Setup`] and store-level failures raised
//! while a run is being prepared propagate to the caller.

use serde::Serialize;
use thiserror::Error;

/// Library result alias.
pub type Result<T, E = MigrateError> = std::result::Result<T, E>;

/// Stable machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    UnsupportedType,
    NotFound,
    AlreadyExists,
    ValidationFailed,
    SaveFailed,
    IdentityParse,
    ReconciliationFailed,
    SetupFailed,
    ConfigError,
    DatabaseError,
    IoError,
    SerializationError,
}

impl ErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnsupportedType => "UNSUPPORTED_TYPE",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::SaveFailed => "SAVE_FAILED",
            Self::IdentityParse => "IDENTITY_PARSE",
            Self::ReconciliationFailed => "RECONCILIATION_FAILED",
            Self::SetupFailed => "SETUP_FAILED",
            Self::ConfigError => "CONFIG_ERROR",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::IoError => "IO_ERROR",
            Self::SerializationError => "SERIALIZATION_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reason a reflected identity string could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("identity value is empty")]
    Empty,
    #[error("identity value '{0}' is not locator-shaped")]
    NotLocator(String),
    #[error("identity value '{0}' has no numeric trailing segment")]
    NoNumericSegment(String),
}

/// Errors raised by the migration engine and its stores.
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("No type mapping for source type '{type_name}'")]
    UnsupportedType { type_name: String },

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("{entity} already exists: {key}")]
    AlreadyExists { entity: &'static str, key: String },

    #[error("Validation failed for field '{field}': {reason}")]
    Validation { field: String, reason: String },

    #[error("Save failed: {0}")]
    SaveFailed(String),

    #[error("Identity parse error: {0}")]
    IdentityParse(#[from] ParseError),

    #[error("Configuration update rejected: {0}")]
    Reconciliation(String),

    #[error("Setup failed: {0}")]
    Setup(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl MigrateError {
    #[must_use]
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }

    #[must_use]
    pub fn already_exists(entity: &'static str, key: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity,
            key: key.into(),
        }
    }

    #[must_use]
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::UnsupportedType { .. } => ErrorCode::UnsupportedType,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::AlreadyExists { .. } => ErrorCode::AlreadyExists,
            Self::Validation { .. } => ErrorCode::ValidationFailed,
            Self::SaveFailed(_) => ErrorCode::SaveFailed,
            Self::IdentityParse(_) => ErrorCode::IdentityParse,
            Self::Reconciliation(_) => ErrorCode::ReconciliationFailed,
            Self::Setup(_) => ErrorCode::SetupFailed,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) | Self::Yaml(_) => ErrorCode::SerializationError,
        }
    }

    /// True for the benign "created concurrently" failure.
    #[must_use]
    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Serializable error envelope for `--json` output.
#[derive(Debug, Clone, Serialize)]
pub struct StructuredError {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&MigrateError> for StructuredError {
    fn from(err: &MigrateError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

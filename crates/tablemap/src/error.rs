//! Error types for the mapping layer
//!
//! Every failure surfaces to the immediate caller as a [`ModelError`]. The
//! variants follow the failure classes of the engine: bad declarations,
//! missing rows, constraint violations reported by the database, internal
//! builder/hydrator mismatches, schema validation, and everything else the
//! execution engine reports.

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// ORM error type alias
pub type OrmError = ModelError;

/// ORM result type alias
pub type OrmResult<T> = ModelResult<T>;

/// Which constraint the database rejected a write for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// Primary key or unique column collision
    Unique,
    /// Referenced row does not exist
    ForeignKey,
    /// NULL written into a NOT NULL column
    NotNull,
    /// CHECK constraint or anything the driver did not classify
    Other,
}

impl std::fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstraintKind::Unique => write!(f, "unique"),
            ConstraintKind::ForeignKey => write!(f, "foreign key"),
            ConstraintKind::NotNull => write!(f, "not null"),
            ConstraintKind::Other => write!(f, "check"),
        }
    }
}

/// Error types for ORM operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    /// Bad model or table declaration; fatal at registration/initialization
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Target row absent for update/find
    #[error("Record not found in table '{table}' for key {key}")]
    NotFound { table: String, key: String },

    /// Primary-key, unique or foreign-key violation reported by the engine
    #[error("{kind} constraint violated: {message}")]
    Constraint { kind: ConstraintKind, message: String },

    /// Query builder and hydrator disagree about the row shape
    #[error("Hydration error: {0}")]
    Hydration(String),

    /// A record failed field-level validation
    #[error("Validation error on field '{field}': {message}")]
    Validation { field: String, message: String },

    /// Any other execution-engine failure
    #[error("Database error: {0}")]
    Database(String),

    /// The execution engine abandoned the statement
    #[error("Operation cancelled: {0}")]
    Cancelled(String),
}

impl ModelError {
    /// Build a [`ModelError::NotFound`] for `table` and a printable key
    pub fn not_found(table: &str, key: impl std::fmt::Display) -> Self {
        ModelError::NotFound {
            table: table.to_string(),
            key: key.to_string(),
        }
    }

    /// Build a field-level [`ModelError::Validation`]
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        ModelError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ModelError::NotFound { .. })
    }

    /// True for a primary-key / unique collision, the only error the upsert
    /// fallback recovers from
    pub fn is_key_collision(&self) -> bool {
        matches!(
            self,
            ModelError::Constraint {
                kind: ConstraintKind::Unique,
                ..
            }
        )
    }
}

// Convert from sqlx errors
impl From<sqlx::Error> for ModelError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::error::ErrorKind;

        match &err {
            sqlx::Error::Database(db_err) => {
                let kind = match db_err.kind() {
                    ErrorKind::UniqueViolation => Some(ConstraintKind::Unique),
                    ErrorKind::ForeignKeyViolation => Some(ConstraintKind::ForeignKey),
                    ErrorKind::NotNullViolation => Some(ConstraintKind::NotNull),
                    ErrorKind::CheckViolation => Some(ConstraintKind::Other),
                    _ => None,
                };
                match kind {
                    Some(kind) => ModelError::Constraint {
                        kind,
                        message: db_err.message().to_string(),
                    },
                    None => ModelError::Database(err.to_string()),
                }
            }
            sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
                ModelError::Cancelled(err.to_string())
            }
            _ => ModelError::Database(err.to_string()),
        }
    }
}

// Convert from serde_json errors
impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Hydration(format!("JSON decode failed: {}", err))
    }
}

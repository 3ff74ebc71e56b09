use thiserror::Error;

/// SQLSTATE raised by an `EXCLUDE` constraint
const EXCLUSION_VIOLATION: &str = "23P01";

/// Unified error type for store operations that the booking core can handle
#[derive(Error, Debug)]
pub enum DbError {
    /// Entity not found by the given identifier
    #[error("Entity not found")]
    NotFound,

    /// Foreign key constraint violation (unknown room or reservation)
    #[error("Foreign key constraint violation")]
    ForeignKeyViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    /// Check constraint violation
    #[error("Check constraint violation")]
    CheckViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    /// The restriction exclusion constraint rejected an overlapping interval
    #[error("Overlapping room restriction rejected by {constraint:?}")]
    Overlap { constraint: Option<String> },

    /// Timeout, pool exhaustion or connection loss. Never retried here.
    #[error("Store unavailable during {operation}: {reason}")]
    Unavailable { operation: &'static str, reason: String },

    /// Catch-all for non-recoverable errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DbError {
    pub fn unavailable(operation: &'static str, reason: impl ToString) -> Self {
        DbError::Unavailable {
            operation,
            reason: reason.to_string(),
        }
    }

    /// True for constraint failures that point at bad references rather than an outage
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, DbError::ForeignKeyViolation { .. } | DbError::CheckViolation { .. })
    }
}

/// Convert from sqlx::Error using proper sqlx error categorization
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DbError::NotFound,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::WorkerCrashed => {
                DbError::unavailable("connection", &err)
            }
            sqlx::Error::Database(db_err) => {
                if db_err.is_foreign_key_violation() {
                    DbError::ForeignKeyViolation {
                        constraint: db_err.constraint().map(|s| s.to_string()),
                        table: db_err.table().map(|s| s.to_string()),
                        message: db_err.message().to_string(),
                    }
                } else if db_err.is_check_violation() {
                    DbError::CheckViolation {
                        constraint: db_err.constraint().map(|s| s.to_string()),
                        table: db_err.table().map(|s| s.to_string()),
                        message: db_err.message().to_string(),
                    }
                } else if db_err.code().as_deref() == Some(EXCLUSION_VIOLATION) {
                    DbError::Overlap {
                        constraint: db_err.constraint().map(|s| s.to_string()),
                    }
                } else {
                    // All other database errors are non-recoverable - convert to anyhow
                    DbError::Other(anyhow::Error::from(err))
                }
            }
            _ => DbError::Other(anyhow::Error::from(err)),
        }
    }
}

/// Type alias for store operation results
pub type Result<T> = std::result::Result<T, DbError>;

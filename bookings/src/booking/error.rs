use chrono::NaiveDate;
use thiserror::Error;

use crate::{
    db::errors::DbError,
    types::{ReservationId, RoomId},
};

/// Errors surfaced by the availability checker, the committer and the workflow.
///
/// Nothing here is retried internally; the workflow decides where the guest goes next.
#[derive(Error, Debug)]
pub enum BookingError {
    /// A request field could not be parsed
    #[error("{message}")]
    InvalidInput { field: &'static str, message: String },

    /// `start >= end`; rejected before touching the store
    #[error("start date {start} must be before end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("{resource} not found")]
    NotFound { resource: &'static str, id: Option<i64> },

    /// Timeout, pool exhaustion or connection loss
    #[error("store unavailable during {operation}: {reason}")]
    StoreUnavailable { operation: &'static str, reason: String },

    /// Another restriction for the room overlaps the requested stay
    #[error("room {room_id} is no longer available for the requested dates")]
    RoomNoLongerAvailable { room_id: RoomId },

    /// The reservation row was written but its restriction was not, and rolling back failed too
    #[error("reservation {reservation_id} was stored without its room restriction")]
    PartialCommitFailure { reservation_id: ReservationId },

    /// A referenced room or reservation does not exist, or a check constraint fired
    #[error("constraint violation: {message}")]
    ConstraintViolation { message: String },
}

impl BookingError {
    pub fn room_not_found(id: RoomId) -> Self {
        BookingError::NotFound {
            resource: "room",
            id: Some(id),
        }
    }
}

impl From<DbError> for BookingError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound => BookingError::NotFound {
                resource: "record",
                id: None,
            },
            DbError::ForeignKeyViolation { message, .. } | DbError::CheckViolation { message, .. } => {
                BookingError::ConstraintViolation { message }
            }
            DbError::Overlap { constraint } => BookingError::ConstraintViolation {
                message: format!("overlapping restriction rejected by {}", constraint.as_deref().unwrap_or("exclusion constraint")),
            },
            DbError::Unavailable { operation, reason } => BookingError::StoreUnavailable { operation, reason },
            DbError::Other(e) => BookingError::StoreUnavailable {
                operation: "query",
                reason: format!("{e:#}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_error_classification() {
        assert!(matches!(
            BookingError::from(DbError::unavailable("count_overlaps", "timed out after 3s")),
            BookingError::StoreUnavailable {
                operation: "count_overlaps",
                ..
            }
        ));
        assert!(matches!(
            BookingError::from(DbError::ForeignKeyViolation {
                constraint: None,
                table: Some("room_restrictions".into()),
                message: "room 9 does not exist".into(),
            }),
            BookingError::ConstraintViolation { .. }
        ));
        assert!(matches!(
            BookingError::from(DbError::Other(anyhow::anyhow!("syntax error"))),
            BookingError::StoreUnavailable { operation: "query", .. }
        ));
    }
}

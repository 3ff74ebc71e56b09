use crate::booking::{BookingError, workflow::WorkflowError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Invalid request data
    #[error("{message}")]
    BadRequest { message: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Availability or reservation failure from the booking core
    #[error(transparent)]
    Booking(#[from] BookingError),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Booking(err) => match err {
                BookingError::InvalidInput { .. } | BookingError::InvalidRange { .. } => StatusCode::BAD_REQUEST,
                BookingError::NotFound { .. } => StatusCode::NOT_FOUND,
                BookingError::RoomNoLongerAvailable { .. } => StatusCode::CONFLICT,
                BookingError::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                BookingError::ConstraintViolation { .. } | BookingError::PartialCommitFailure { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::BadRequest { message } => message.clone(),
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Booking(err) => match err {
                BookingError::InvalidInput { message, .. } => message.clone(),
                BookingError::InvalidRange { .. } => "The end date must be after the start date".to_string(),
                BookingError::NotFound { resource, .. } => format!("The requested {resource} does not exist"),
                BookingError::RoomNoLongerAvailable { .. } => {
                    "Sorry, that room was just booked for those dates. Please search again".to_string()
                }
                BookingError::ConstraintViolation { .. } => {
                    "We could not complete your reservation. Please try again".to_string()
                }
                BookingError::StoreUnavailable { .. } => {
                    "Reservations are temporarily unavailable, please try again shortly".to_string()
                }
                BookingError::PartialCommitFailure { .. } => "Internal server error".to_string(),
            },
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Internal { .. }
            | Error::Booking(BookingError::PartialCommitFailure { .. } | BookingError::ConstraintViolation { .. }) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Booking(BookingError::StoreUnavailable { .. }) => {
                tracing::warn!("Store error: {}", self);
            }
            Error::Booking(BookingError::RoomNoLongerAvailable { .. }) => {
                tracing::info!("Booking conflict: {}", self);
            }
            Error::BadRequest { .. } | Error::Booking(_) => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        (status, self.user_message()).into_response()
    }
}

impl From<WorkflowError> for Error {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::MissingState { .. } => Error::BadRequest { message: err.to_string() },
            WorkflowError::Booking(err) => Error::Booking(err),
            WorkflowError::Encode(e) => Error::Internal {
                operation: format!("store booking state in session: {e}"),
            },
        }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

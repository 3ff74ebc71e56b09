//! HTTP handlers for the booking site.
//!
//! Handlers are thin: they parse the request, call into [`crate::booking`] and turn the outcome
//! into a JSON view or a redirect. Where the guest is sent after a failure is decided here;
//! what the workflow state becomes is decided by the workflow.
//!
//! - [`pages`]: home page
//! - [`rooms`]: room catalogue
//! - [`availability`]: search page, search submission, single-room JSON check
//! - [`reservations`]: choose room, direct booking, guest details, summary
//!
//! Errors that are not turned into a redirect are returned as [`crate::errors::Error`].

use axum::response::{IntoResponse, Redirect, Response};

use crate::session::Session;

pub mod availability;
pub mod pages;
pub mod reservations;
pub mod rooms;

pub const HOME_PATH: &str = "/";
pub const SEARCH_PATH: &str = "/search-availability";
pub const RESERVATION_PATH: &str = "/make-reservation";
pub const SUMMARY_PATH: &str = "/reservation-summary";

/// Message used whenever a step finds no usable workflow state
pub const MISSING_STATE_MESSAGE: &str = "Can't get reservation from session";

/// Send the guest to `to`, with `message` shown there as an error
pub async fn redirect_with_error(session: &Session, to: &str, message: impl Into<String>) -> Response {
    session.flash_error(message).await;
    Redirect::to(to).into_response()
}

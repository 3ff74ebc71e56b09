use std::collections::HashMap;

use axum::{
    Form, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{info, warn};

use super::{HOME_PATH, MISSING_STATE_MESSAGE, RESERVATION_PATH, SEARCH_PATH, SUMMARY_PATH, redirect_with_error};
use crate::{
    AppState,
    api::models::{
        pages::Messages,
        reservations::{BookRoomQuery, ReservationForm, ReservationFormView, ReservationSummaryView},
    },
    booking::{
        BookingError,
        workflow::{SubmitOutcome, WorkflowError},
    },
    errors::{Error, Result},
    session::Session,
    types::parse_room_id,
};

/// Failures a guest can recover from by searching again
fn is_guest_error(err: &BookingError) -> bool {
    matches!(
        err,
        BookingError::InvalidInput { .. } | BookingError::InvalidRange { .. } | BookingError::NotFound { .. }
    )
}

/// Redirect for workflow failures the guest can act on; anything else becomes an [`Error`].
async fn recover(session: &Session, err: WorkflowError, missing_state_to: &str) -> Result<Response> {
    match err {
        WorkflowError::MissingState { expected } => {
            info!(expected, "Booking step requested without its prior state");
            Ok(redirect_with_error(session, missing_state_to, MISSING_STATE_MESSAGE).await)
        }
        WorkflowError::Booking(err) if is_guest_error(&err) => {
            Ok(redirect_with_error(session, SEARCH_PATH, Error::from(err).user_message()).await)
        }
        other => Err(other.into()),
    }
}

#[utoipa::path(
    get,
    path = "/choose-room/{id}",
    tag = "reservations",
    summary = "Choose a room from search results",
    params(
        ("id" = i64, Path, description = "Room id"),
    ),
    responses(
        (status = 303, description = "Redirect to the reservation form, or back to search when there are no search results"),
        (status = 503, description = "Store unavailable"),
    )
)]
#[tracing::instrument(skip(state, session))]
pub async fn choose_room(State(state): State<AppState>, session: Session, Path(id): Path<String>) -> Result<Response> {
    let room_id = match parse_room_id("id", &id) {
        Ok(room_id) => room_id,
        Err(err) => return Ok(redirect_with_error(&session, SEARCH_PATH, err.to_string()).await),
    };

    match state.workflow.choose_room(&session, room_id).await {
        Ok(_) => Ok(Redirect::to(RESERVATION_PATH).into_response()),
        Err(e) => recover(&session, e, SEARCH_PATH).await,
    }
}

#[utoipa::path(
    get,
    path = "/book-room",
    tag = "reservations",
    summary = "Book a room directly",
    description = "Entry point from a room page: selects the room and stay without a prior search.",
    params(BookRoomQuery),
    responses(
        (status = 303, description = "Redirect to the reservation form, or to search when the input is unusable"),
        (status = 503, description = "Store unavailable"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn book_room(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<BookRoomQuery>,
) -> Result<Response> {
    match state.workflow.book_room(&session, &query.id, &query.s, &query.e).await {
        Ok(_) => Ok(Redirect::to(RESERVATION_PATH).into_response()),
        Err(e) => recover(&session, e, SEARCH_PATH).await,
    }
}

#[utoipa::path(
    get,
    path = "/make-reservation",
    tag = "reservations",
    summary = "Reservation form",
    responses(
        (status = 200, description = "Guest details form for the chosen room", body = ReservationFormView),
        (status = 303, description = "No room chosen; redirect to search"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn reservation_form(State(state): State<AppState>, session: Session) -> Result<Response> {
    match state.workflow.pending_choice(&session).await {
        Ok(choice) => {
            let messages = Messages::take(&session).await;
            Ok(Json(ReservationFormView::blank(choice, messages)).into_response())
        }
        Err(e) => recover(&session, e, SEARCH_PATH).await,
    }
}

#[utoipa::path(
    post,
    path = "/make-reservation",
    tag = "reservations",
    summary = "Submit guest details",
    description = "Validates the guest details and commits the reservation. The room is re-checked \
                   inside the commit, so a room taken since the search sends the guest back to search.",
    request_body(content = ReservationForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Committed: redirect to the summary. Conflict: redirect to search. \
                                      Transient failure: redirect back to the form"),
        (status = 422, description = "Guest details failed validation", body = ReservationFormView),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn submit_reservation(
    State(state): State<AppState>,
    session: Session,
    Form(values): Form<HashMap<String, String>>,
) -> Result<Response> {
    let outcome = match state.workflow.submit_details(&session, values).await {
        Ok(outcome) => outcome,
        Err(e) => return recover(&session, e, SEARCH_PATH).await,
    };

    Ok(match outcome {
        SubmitOutcome::Confirmed(confirmation) => {
            info!(reservation_id = confirmation.reservation_id, "Reservation confirmed");
            Redirect::to(SUMMARY_PATH).into_response()
        }
        SubmitOutcome::Invalid { choice, form } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ReservationFormView::rejected(choice, &form)),
        )
            .into_response(),
        SubmitOutcome::Restart(err) => {
            info!(error = %err, "Reservation not possible, guest sent back to search");
            Redirect::to(SEARCH_PATH).into_response()
        }
        SubmitOutcome::Retry(err) => {
            warn!(error = %err, "Reservation failed, guest may retry");
            Redirect::to(RESERVATION_PATH).into_response()
        }
    })
}

#[utoipa::path(
    get,
    path = "/reservation-summary",
    tag = "reservations",
    summary = "Reservation summary",
    description = "Shown once: the confirmation is removed from the session as it is read.",
    responses(
        (status = 200, description = "The confirmed reservation", body = ReservationSummaryView),
        (status = 303, description = "Nothing to show; redirect home"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn reservation_summary(State(state): State<AppState>, session: Session) -> Result<Response> {
    match state.workflow.take_confirmation(&session).await {
        Ok(confirmation) => {
            let messages = Messages::take(&session).await;
            Ok(Json(ReservationSummaryView::new(confirmation, messages)).into_response())
        }
        Err(e) => recover(&session, e, HOME_PATH).await,
    }
}

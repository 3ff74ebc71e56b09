use axum::{
    Form, Json,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};

use super::{SEARCH_PATH, redirect_with_error};
use crate::{
    AppState,
    api::models::{
        availability::{AvailabilityCheckForm, AvailabilityCheckResponse, ChooseRoomView, SearchForm},
        pages::{Messages, SearchView},
        rooms::RoomResponse,
    },
    booking::{
        BookingError,
        workflow::{SearchOutcome, WorkflowError},
    },
    errors::{Error, Result},
    session::Session,
    types::{parse_date, parse_room_id},
};

#[utoipa::path(
    get,
    path = "/search-availability",
    tag = "availability",
    summary = "Search page",
    responses(
        (status = 200, description = "Search view with any pending messages", body = SearchView),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn search_page(session: Session) -> Json<SearchView> {
    Json(SearchView {
        fields: vec!["start".to_string(), "end".to_string()],
        messages: Messages::take(&session).await,
    })
}

#[utoipa::path(
    post,
    path = "/search-availability",
    tag = "availability",
    summary = "Search free rooms",
    description = "Lists rooms free for the whole stay. With no free rooms, or with unusable dates, \
                   the guest is redirected back to the search page with an error message.",
    request_body(content = SearchForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Free rooms, ordered by id", body = ChooseRoomView),
        (status = 303, description = "No availability or invalid dates; redirect to the search page"),
        (status = 503, description = "Store unavailable"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn search_availability(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<SearchForm>,
) -> Result<Response> {
    match state.workflow.search(&session, &form.start, &form.end).await {
        Ok(SearchOutcome::Available { stay, rooms }) => Ok(Json(ChooseRoomView {
            stay: stay.into(),
            rooms: rooms.into_iter().map(RoomResponse::from).collect(),
        })
        .into_response()),
        Ok(SearchOutcome::NoAvailability) => Ok(Redirect::to(SEARCH_PATH).into_response()),
        Err(WorkflowError::Booking(err @ (BookingError::InvalidInput { .. } | BookingError::InvalidRange { .. }))) => {
            Ok(redirect_with_error(&session, SEARCH_PATH, Error::from(err).user_message()).await)
        }
        Err(e) => Err(e.into()),
    }
}

#[utoipa::path(
    post,
    path = "/search-availability-json",
    tag = "availability",
    summary = "Check one room",
    description = "Rejected input is reported in the body with `ok: false`, not as an HTTP error.",
    request_body(content = AvailabilityCheckForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Availability of the room for the stay", body = AvailabilityCheckResponse),
        (status = 503, description = "Store unavailable"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn availability_json(
    State(state): State<AppState>,
    Form(form): Form<AvailabilityCheckForm>,
) -> Result<Json<AvailabilityCheckResponse>> {
    let mut response = AvailabilityCheckResponse {
        ok: false,
        message: String::new(),
        room_id: form.room_id.clone(),
        start_date: form.start.clone(),
        end_date: form.end.clone(),
    };

    let checker = state.workflow.checker();
    let checked = async {
        let room_id = parse_room_id("room_id", &form.room_id)?;
        let start = parse_date("start", &form.start)?;
        let end = parse_date("end", &form.end)?;
        checker.room(room_id).await?;
        checker.is_room_free(room_id, start, end).await
    }
    .await;

    match checked {
        Ok(free) => response.ok = free,
        Err(err @ (BookingError::InvalidInput { .. } | BookingError::InvalidRange { .. } | BookingError::NotFound { .. })) => {
            response.message = Error::from(err).user_message();
        }
        Err(err) => return Err(err.into()),
    }

    Ok(Json(response))
}

//! OpenAPI document for the booking site, served with Scalar at `/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::api;

/// Documents the session cookie that carries the booking state between requests.
struct SessionCookieAddon;

impl Modify for SessionCookieAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "SessionCookie".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "bookings_session",
                    "Opaque session id, set on the first response. The cookie name is configurable \
                     with `session.cookie_name`.",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&SessionCookieAddon),
    paths(
        api::handlers::pages::home,
        api::handlers::rooms::list_rooms,
        api::handlers::rooms::get_room,
        api::handlers::availability::search_page,
        api::handlers::availability::search_availability,
        api::handlers::availability::availability_json,
        api::handlers::reservations::choose_room,
        api::handlers::reservations::book_room,
        api::handlers::reservations::reservation_form,
        api::handlers::reservations::submit_reservation,
        api::handlers::reservations::reservation_summary,
    ),
    components(
        schemas(
            api::models::pages::Messages,
            api::models::pages::HomeView,
            api::models::pages::SearchView,
            api::models::rooms::RoomResponse,
            api::models::availability::SearchForm,
            api::models::availability::StayView,
            api::models::availability::ChooseRoomView,
            api::models::availability::AvailabilityCheckForm,
            api::models::availability::AvailabilityCheckResponse,
            api::models::reservations::ReservationForm,
            api::models::reservations::RoomChoiceView,
            api::models::reservations::ReservationFormView,
            api::models::reservations::ReservationSummaryView,
        )
    ),
    tags(
        (name = "pages", description = "Static pages."),
        (name = "rooms", description = "The room catalogue."),
        (name = "availability", description = "Search for rooms free over a stay.

A stay is a half-open range of calendar dates: the departure day is not occupied, so a stay
ending on the 5th and one starting on the 5th do not overlap."),
        (name = "reservations", description = "Choose a room, enter guest details and confirm.

The booking state lives in the server-side session, so these endpoints must be called in order
with the session cookie. A step called without its prior state redirects with an error message."),
    ),
    info(
        title = "Bookings",
        version = "1.0.0",
        description = "Room availability search and double-booking-safe reservations.

Pages are served as JSON view documents. Redirects use `303 See Other`, and messages for the
next page are carried in the session as `flash` and `error`.",
    ),
)]
pub struct ApiDoc;

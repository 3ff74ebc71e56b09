//! End-to-end tests: the booking flow driven over HTTP against the in-memory store.

use axum::http::StatusCode;
use axum_test::{TestResponse, TestServer};
use futures::future::join_all;
use serde_json::Value;

use std::sync::Arc;

use crate::{
    Application, IntervalStore,
    booking::workflow::BookingState,
    session::Session,
    test_utils::{create_test_app, create_test_app_with_store, create_test_config, create_test_store, location, start_session},
    types::Stay,
};

fn stay(start: &str, end: &str) -> Stay {
    Stay::parse(start, end).unwrap()
}

async fn search(server: &TestServer, cookie: &str, start: &str, end: &str) -> TestResponse {
    server
        .post("/search-availability")
        .add_header("cookie", cookie.to_string())
        .form(&[("start", start), ("end", end)])
        .await
}

async fn check_room(server: &TestServer, room_id: &str, start: &str, end: &str) -> Value {
    let response = server
        .post("/search-availability-json")
        .form(&[("room_id", room_id), ("start", start), ("end", end)])
        .await;
    response.assert_status_ok();
    response.json::<Value>()
}

async fn get(server: &TestServer, cookie: &str, path: &str) -> TestResponse {
    server.get(path).add_header("cookie", cookie.to_string()).await
}

async fn submit_guest(server: &TestServer, cookie: &str, first_name: &str, email: &str) -> TestResponse {
    server
        .post("/make-reservation")
        .add_header("cookie", cookie.to_string())
        .form(&[
            ("first_name", first_name),
            ("last_name", "Smith"),
            ("email", email),
            ("phone", "555-555-5555"),
        ])
        .await
}

fn assert_redirect(response: &TestResponse, to: &str) {
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(response), to);
}

/// Search, choose `room_id` and return the session cookie, ready for guest details
async fn choose(server: &TestServer, room_id: i64, start: &str, end: &str) -> String {
    let cookie = start_session(server).await;
    search(server, &cookie, start, end).await.assert_status_ok();
    let response = get(server, &cookie, &format!("/choose-room/{room_id}")).await;
    assert_redirect(&response, "/make-reservation");
    cookie
}

async fn error_message(server: &TestServer, cookie: &str, page: &str) -> Option<String> {
    let view = get(server, cookie, page).await.json::<Value>();
    view["error"].as_str().map(str::to_string)
}

#[test_log::test(tokio::test)]
async fn test_empty_store_room_is_free() {
    let (server, _bg) = create_test_app().await;

    let body = check_room(&server, "1", "2024-03-01", "2024-03-03").await;
    assert_eq!(
        body,
        serde_json::json!({
            "ok": true,
            "message": "",
            "roomId": "1",
            "startDate": "2024-03-01",
            "endDate": "2024-03-03",
        })
    );
}

#[test_log::test(tokio::test)]
async fn test_full_booking_flow_then_overlap_and_adjacency() {
    let store = create_test_store();
    let (server, _bg) = create_test_app_with_store(store.clone()).await;

    let cookie = choose(&server, 1, "2024-03-01", "2024-03-03").await;

    let form = get(&server, &cookie, "/make-reservation").await;
    form.assert_status_ok();
    let form = form.json::<Value>();
    assert_eq!(form["reservation"]["room_name"], "General's Quarters");
    assert_eq!(form["reservation"]["stay"]["nights"], 2);

    let response = submit_guest(&server, &cookie, "John", "john@smith.com").await;
    assert_redirect(&response, "/reservation-summary");

    let summary = get(&server, &cookie, "/reservation-summary").await;
    summary.assert_status_ok();
    let summary = summary.json::<Value>();
    assert_eq!(summary["room_id"], 1);
    assert_eq!(summary["stay"]["start"], "2024-03-01");
    assert_eq!(summary["stay"]["end"], "2024-03-03");
    assert_eq!(summary["email"], "john@smith.com");
    assert_eq!(summary["flash"], "Reservation saved");

    let snapshot = store.snapshot().await.unwrap();
    assert_eq!(snapshot.reservations.len(), 1);
    assert_eq!(summary["reservation_id"], snapshot.reservations[0].id);
    assert_eq!(snapshot.restrictions.len(), 1);

    // The summary is shown once; afterwards the guest lands on the home page with an error
    let again = get(&server, &cookie, "/reservation-summary").await;
    assert_redirect(&again, "/");
    assert_eq!(
        error_message(&server, &cookie, "/").await.as_deref(),
        Some("Can't get reservation from session")
    );

    // Partial overlap is taken, the adjacent stay starting on checkout day is free
    assert_eq!(check_room(&server, "1", "2024-03-02", "2024-03-04").await["ok"], false);
    assert_eq!(check_room(&server, "1", "2024-03-03", "2024-03-05").await["ok"], true);
}

#[test_log::test(tokio::test)]
async fn test_search_skips_fully_booked_room() {
    let store = create_test_store();
    store.seed_restriction(2, stay("2024-05-01", "2024-05-31")).await.unwrap();
    let (server, _bg) = create_test_app_with_store(store).await;
    let cookie = start_session(&server).await;

    let response = search(&server, &cookie, "2024-05-10", "2024-05-12").await;
    response.assert_status_ok();
    let view = response.json::<Value>();

    let ids: Vec<i64> = view["rooms"]
        .as_array()
        .unwrap()
        .iter()
        .map(|room| room["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 3]);
    assert_eq!(view["stay"]["nights"], 2);
}

#[test_log::test(tokio::test)]
async fn test_empty_range_is_rejected_without_writes() {
    let store = create_test_store();
    let (server, _bg) = create_test_app_with_store(store.clone()).await;
    let before = store.snapshot().await.unwrap();
    let cookie = start_session(&server).await;

    let response = search(&server, &cookie, "2024-03-01", "2024-03-01").await;
    assert_redirect(&response, "/search-availability");
    assert_eq!(
        error_message(&server, &cookie, "/search-availability").await.as_deref(),
        Some("The end date must be after the start date")
    );

    let body = check_room(&server, "1", "2024-03-01", "2024-03-01").await;
    assert_eq!(body["ok"], false);
    assert_eq!(body["message"], "The end date must be after the start date");

    let response = get(&server, &cookie, "/book-room?id=1&s=2024-03-01&e=2024-03-01").await;
    assert_redirect(&response, "/search-availability");

    assert_eq!(store.snapshot().await.unwrap(), before);
}

#[tokio::test]
async fn test_json_check_reports_bad_input_in_body() {
    let (server, _bg) = create_test_app().await;

    let body = check_room(&server, "abc", "2024-03-01", "2024-03-02").await;
    assert_eq!(body["ok"], false);
    assert!(body["message"].as_str().unwrap().contains("room_id"));

    let body = check_room(&server, "1", "March 1st", "2024-03-02").await;
    assert_eq!(body["ok"], false);
    assert!(body["message"].as_str().unwrap().contains("start"));

    let body = check_room(&server, "99", "2024-03-01", "2024-03-02").await;
    assert_eq!(body["ok"], false);
    assert_eq!(body["message"], "The requested room does not exist");
    assert_eq!(body["roomId"], "99");
}

#[tokio::test]
async fn test_json_check_store_failure_is_503() {
    let store = create_test_store();
    let (server, _bg) = create_test_app_with_store(store.clone()).await;
    store.set_unavailable(true);

    server
        .post("/search-availability-json")
        .form(&[("room_id", "1"), ("start", "2024-03-01"), ("end", "2024-03-02")])
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_no_availability_redirects_with_error() {
    let store = create_test_store();
    for room_id in 1..=3 {
        store.seed_restriction(room_id, stay("2024-12-20", "2025-01-05")).await.unwrap();
    }
    let (server, _bg) = create_test_app_with_store(store).await;
    let cookie = start_session(&server).await;

    let response = search(&server, &cookie, "2024-12-24", "2024-12-26").await;
    assert_redirect(&response, "/search-availability");
    assert_eq!(
        error_message(&server, &cookie, "/search-availability").await.as_deref(),
        Some("No availability")
    );
    // Popped once shown
    assert_eq!(error_message(&server, &cookie, "/search-availability").await, None);
}

#[tokio::test]
async fn test_steps_without_prior_state_redirect_to_search() {
    let (server, _bg) = create_test_app().await;
    let cookie = start_session(&server).await;

    assert_redirect(&get(&server, &cookie, "/choose-room/1").await, "/search-availability");
    assert_redirect(&get(&server, &cookie, "/make-reservation").await, "/search-availability");
    assert_redirect(
        &submit_guest(&server, &cookie, "John", "john@smith.com").await,
        "/search-availability",
    );
    assert_redirect(&get(&server, &cookie, "/reservation-summary").await, "/");
}

#[tokio::test]
async fn test_invalid_guest_details_return_422_with_field_errors() {
    let store = create_test_store();
    let (server, _bg) = create_test_app_with_store(store.clone()).await;
    let cookie = choose(&server, 2, "2024-04-01", "2024-04-02").await;

    let response = submit_guest(&server, &cookie, "Jo", "not-an-email").await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let view = response.json::<Value>();
    assert_eq!(
        view["errors"]["first_name"][0],
        "This field must be at least 3 characters long"
    );
    assert_eq!(view["errors"]["email"][0], "Invalid email address");
    assert_eq!(view["values"]["first_name"], "Jo");
    assert_eq!(view["reservation"]["room_id"], 2);
    assert!(store.snapshot().await.unwrap().reservations.is_empty());

    // The form can be corrected and resubmitted
    let response = submit_guest(&server, &cookie, "Joanna", "jo@example.com").await;
    assert_redirect(&response, "/reservation-summary");
}

#[tokio::test]
async fn test_room_taken_since_search_sends_guest_back() {
    let store = create_test_store();
    let (server, _bg) = create_test_app_with_store(store.clone()).await;

    let first = choose(&server, 1, "2024-06-10", "2024-06-15").await;
    let second = choose(&server, 1, "2024-06-12", "2024-06-14").await;

    assert_redirect(
        &submit_guest(&server, &first, "Alice", "alice@example.com").await,
        "/reservation-summary",
    );
    assert_redirect(
        &submit_guest(&server, &second, "Bob", "bob@example.com").await,
        "/search-availability",
    );
    assert!(
        error_message(&server, &second, "/search-availability")
            .await
            .unwrap()
            .contains("Please search again")
    );
    // Back at the start: nothing chosen any more
    assert_redirect(&get(&server, &second, "/make-reservation").await, "/search-availability");

    assert_eq!(store.snapshot().await.unwrap().restrictions.len(), 1);
}

#[tokio::test]
async fn test_store_outage_during_commit_allows_retry() {
    let store = create_test_store();
    let (server, _bg) = create_test_app_with_store(store.clone()).await;
    let cookie = choose(&server, 3, "2024-07-01", "2024-07-03").await;

    store.set_unavailable(true);
    assert_redirect(
        &submit_guest(&server, &cookie, "John", "john@smith.com").await,
        "/make-reservation",
    );
    store.set_unavailable(false);

    let form = get(&server, &cookie, "/make-reservation").await;
    form.assert_status_ok();
    assert!(form.json::<Value>()["error"].as_str().unwrap().contains("try again"));

    assert_redirect(
        &submit_guest(&server, &cookie, "John", "john@smith.com").await,
        "/reservation-summary",
    );
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn test_concurrent_guests_for_one_room_get_one_reservation() {
    let store = create_test_store();
    let (server, _bg) = create_test_app_with_store(store.clone()).await;

    let mut cookies = Vec::new();
    for _ in 0..8 {
        cookies.push(choose(&server, 2, "2024-09-01", "2024-09-04").await);
    }

    let responses = join_all(
        cookies
            .iter()
            .map(|cookie| submit_guest(&server, cookie, "Guest", "guest@example.com")),
    )
    .await;

    let confirmed = responses
        .iter()
        .filter(|r| location(r) == "/reservation-summary")
        .count();
    let sent_back = responses
        .iter()
        .filter(|r| location(r) == "/search-availability")
        .count();
    assert_eq!(confirmed, 1);
    assert_eq!(sent_back, 7);

    let snapshot = store.snapshot().await.unwrap();
    assert_eq!(snapshot.reservations.len(), 1);
    assert_eq!(snapshot.restrictions.len(), 1);
}

#[tokio::test]
async fn test_book_room_direct_entry() {
    let (server, _bg) = create_test_app().await;
    let cookie = start_session(&server).await;

    let response = get(&server, &cookie, "/book-room?id=3&s=2024-10-01&e=2024-10-04").await;
    assert_redirect(&response, "/make-reservation");

    let form = get(&server, &cookie, "/make-reservation").await.json::<Value>();
    assert_eq!(form["reservation"]["room_name"], "Colonel's Cabin");
    assert_eq!(form["reservation"]["stay"]["start"], "2024-10-01");

    assert_redirect(
        &get(&server, &cookie, "/book-room?id=42&s=2024-10-01&e=2024-10-04").await,
        "/search-availability",
    );
    assert_redirect(&get(&server, &cookie, "/book-room").await, "/search-availability");
}

#[tokio::test]
async fn test_rooms_catalogue() {
    let (server, _bg) = create_test_app().await;

    let rooms = server.get("/rooms").await.json::<Value>();
    assert_eq!(rooms.as_array().unwrap().len(), 3);
    assert_eq!(rooms[0]["room_name"], "General's Quarters");

    let room = server.get("/rooms/2").await;
    room.assert_status_ok();
    assert_eq!(room.json::<Value>()["room_name"], "Major's Suite");

    server.get("/rooms/9").await.assert_status_not_found();
    server.get("/rooms/nine").await.assert_status_bad_request();
}

#[tokio::test]
async fn test_session_survives_across_requests() {
    let (server, _bg) = create_test_app().await;
    let cookie = start_session(&server).await;

    search(&server, &cookie, "2024-11-01", "2024-11-02").await.assert_status_ok();
    // A known cookie is not reissued
    let response = get(&server, &cookie, "/").await;
    assert!(response.maybe_header("set-cookie").is_none());

    // An unknown session id starts over with a fresh cookie
    let response = get(&server, "bookings_session=00000000-0000-0000-0000-000000000000", "/").await;
    assert!(response.maybe_header("set-cookie").is_some());
}

#[tokio::test]
async fn test_search_state_is_searching_with_stay() {
    // The workflow state written by a search, read straight from the session store
    let store: Arc<dyn IntervalStore> = Arc::new(create_test_store());
    let app = Application::with_store(create_test_config(), store).unwrap();
    let state = app.state().clone();
    let (server, _bg) = app.into_test_server();

    let cookie = start_session(&server).await;
    search(&server, &cookie, "2024-02-01", "2024-02-03").await.assert_status_ok();

    let session_id = uuid::Uuid::parse_str(cookie.split_once('=').unwrap().1).unwrap();
    let session = Session::new(session_id, state.sessions.clone());
    assert_eq!(
        state.workflow.state(&session).await,
        Some(BookingState::Searching {
            stay: Some(stay("2024-02-01", "2024-02-03"))
        })
    );
}

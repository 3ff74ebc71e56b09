//! The multi-request booking sequence.
//!
//! ```text
//! Searching { stay: None }
//!     │ search (rooms free)
//!     ↓
//! Searching { stay: Some }  ──choose room──→  RoomChosen  ←──book room (direct entry)
//!                                                │ valid guest details
//!                                                ↓
//!                                          DetailsEntered ──commit ok──→ Confirmed
//!                                                │                           │ summary shown once
//!                      conflict / bad input ←────┤                           ↓
//!                      (back to Searching)       └── store failure           (removed)
//!                                                    (back to RoomChosen)
//! ```
//!
//! The current [`BookingState`] is kept in the session under [`STATE_KEY`]. Each step checks
//! that the state it needs is there and reports [`WorkflowError::MissingState`] otherwise.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::{AvailabilityChecker, BookingError, ReservationCommitter, ReservationDraft};
use crate::{
    config::EmailConfig,
    db::models::rooms::Room,
    email,
    forms::Form,
    mail_queue::MailQueue,
    session::Session,
    types::{ReservationId, RoomId, Stay, parse_room_id},
};

/// Session key holding the workflow state
pub const STATE_KEY: &str = "reservation";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomChoice {
    pub room_id: RoomId,
    pub room_name: String,
    pub stay: Stay,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

impl GuestDetails {
    fn from_form(form: &Form) -> Self {
        Self {
            first_name: form.get("first_name").to_string(),
            last_name: form.get("last_name").to_string(),
            email: form.get("email").to_string(),
            phone: form.get("phone").to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub reservation_id: ReservationId,
    pub choice: RoomChoice,
    pub guest: GuestDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum BookingState {
    Searching { stay: Option<Stay> },
    RoomChosen(RoomChoice),
    DetailsEntered { choice: RoomChoice, guest: GuestDetails },
    Confirmed(Confirmation),
}

impl BookingState {
    /// Stay from a completed search, if that is where the guest is
    pub fn searched_stay(&self) -> Option<Stay> {
        match self {
            BookingState::Searching { stay } => *stay,
            _ => None,
        }
    }

    /// Room awaiting guest details. `DetailsEntered` counts too, so a failed commit can be retried.
    pub fn pending_choice(&self) -> Option<&RoomChoice> {
        match self {
            BookingState::RoomChosen(choice) | BookingState::DetailsEntered { choice, .. } => Some(choice),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum WorkflowError {
    /// The session does not hold the state this step requires
    #[error("no {expected} in session")]
    MissingState { expected: &'static str },

    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error("failed to encode workflow state: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug)]
pub enum SearchOutcome {
    Available { stay: Stay, rooms: Vec<Room> },
    NoAvailability,
}

#[derive(Debug)]
pub enum SubmitOutcome {
    Confirmed(Confirmation),
    /// Guest details failed validation; the state stays `RoomChosen`
    Invalid { choice: RoomChoice, form: Form },
    /// The guest has to search again; an error flash explains why
    Restart(BookingError),
    /// Transient failure; the guest can resubmit the same details
    Retry(BookingError),
}

/// Message shown to a guest sent back to the search page
fn restart_message(err: &BookingError) -> String {
    match err {
        BookingError::RoomNoLongerAvailable { .. } => {
            "Sorry, that room was booked by someone else for those dates. Please search again".to_string()
        }
        BookingError::NotFound { .. } => "That room no longer exists. Please search again".to_string(),
        other => other.to_string(),
    }
}

#[derive(Clone)]
pub struct BookingWorkflow {
    checker: AvailabilityChecker,
    committer: ReservationCommitter,
    mail: MailQueue,
    email: EmailConfig,
}

async fn load(session: &Session) -> Option<BookingState> {
    session.get::<BookingState>(STATE_KEY).await
}

async fn save(session: &Session, state: &BookingState) -> Result<(), WorkflowError> {
    session.insert(STATE_KEY, state).await?;
    Ok(())
}

impl BookingWorkflow {
    pub fn new(checker: AvailabilityChecker, committer: ReservationCommitter, mail: MailQueue, email: EmailConfig) -> Self {
        Self {
            checker,
            committer,
            mail,
            email,
        }
    }

    pub fn checker(&self) -> &AvailabilityChecker {
        &self.checker
    }

    /// Current state, if any
    pub async fn state(&self, session: &Session) -> Option<BookingState> {
        load(session).await
    }

    #[instrument(skip(self, session), fields(session_id = %session.id()), err)]
    pub async fn search(&self, session: &Session, start: &str, end: &str) -> Result<SearchOutcome, WorkflowError> {
        let stay = Stay::parse(start, end)?;
        let rooms = self.checker.free_rooms(stay.start(), stay.end()).await?;

        if rooms.is_empty() {
            session.flash_error("No availability").await;
            return Ok(SearchOutcome::NoAvailability);
        }

        save(session, &BookingState::Searching { stay: Some(stay) }).await?;
        Ok(SearchOutcome::Available { stay, rooms })
    }

    #[instrument(skip(self, session), fields(session_id = %session.id()), err)]
    pub async fn choose_room(&self, session: &Session, room_id: RoomId) -> Result<RoomChoice, WorkflowError> {
        let stay = load(session)
            .await
            .and_then(|state| state.searched_stay())
            .ok_or(WorkflowError::MissingState {
                expected: "search results",
            })?;

        self.select(session, room_id, stay).await
    }

    /// Direct entry from a room page: `id`, `s` and `e` come straight from the query string.
    #[instrument(skip(self, session), fields(session_id = %session.id()), err)]
    pub async fn book_room(&self, session: &Session, id: &str, start: &str, end: &str) -> Result<RoomChoice, WorkflowError> {
        let room_id = parse_room_id("id", id)?;
        let stay = Stay::parse(start, end)?;
        self.select(session, room_id, stay).await
    }

    async fn select(&self, session: &Session, room_id: RoomId, stay: Stay) -> Result<RoomChoice, WorkflowError> {
        let room = self.checker.room(room_id).await?;
        let choice = RoomChoice {
            room_id: room.id,
            room_name: room.room_name,
            stay,
        };
        save(session, &BookingState::RoomChosen(choice.clone())).await?;
        Ok(choice)
    }

    /// The room the reservation form is for
    pub async fn pending_choice(&self, session: &Session) -> Result<RoomChoice, WorkflowError> {
        load(session)
            .await
            .and_then(|state| state.pending_choice().cloned())
            .ok_or(WorkflowError::MissingState { expected: "room choice" })
    }

    #[instrument(skip(self, session, values), fields(session_id = %session.id()), err)]
    pub async fn submit_details(
        &self,
        session: &Session,
        values: HashMap<String, String>,
    ) -> Result<SubmitOutcome, WorkflowError> {
        let choice = self.pending_choice(session).await?;

        let mut form = Form::new(values);
        form.required(&["first_name", "last_name", "email"]);
        form.min_length("first_name", 3);
        form.is_email("email");

        if !form.valid() {
            save(session, &BookingState::RoomChosen(choice.clone())).await?;
            return Ok(SubmitOutcome::Invalid { choice, form });
        }

        let guest = GuestDetails::from_form(&form);
        save(
            session,
            &BookingState::DetailsEntered {
                choice: choice.clone(),
                guest: guest.clone(),
            },
        )
        .await?;

        let draft = ReservationDraft {
            first_name: guest.first_name.clone(),
            last_name: guest.last_name.clone(),
            email: guest.email.clone(),
            phone: guest.phone.clone(),
            room_id: choice.room_id,
            start_date: choice.stay.start(),
            end_date: choice.stay.end(),
        };

        match self.committer.commit(&draft).await {
            Ok(reservation_id) => {
                let confirmation = Confirmation {
                    reservation_id,
                    choice,
                    guest,
                };
                self.send_confirmation(&confirmation).await;
                save(session, &BookingState::Confirmed(confirmation.clone())).await?;
                session.flash("Reservation saved").await;
                Ok(SubmitOutcome::Confirmed(confirmation))
            }
            Err(
                err @ (BookingError::RoomNoLongerAvailable { .. }
                | BookingError::InvalidRange { .. }
                | BookingError::InvalidInput { .. }
                | BookingError::NotFound { .. }),
            ) => {
                save(session, &BookingState::Searching { stay: None }).await?;
                session.flash_error(restart_message(&err)).await;
                Ok(SubmitOutcome::Restart(err))
            }
            Err(
                err @ (BookingError::StoreUnavailable { .. }
                | BookingError::ConstraintViolation { .. }
                | BookingError::PartialCommitFailure { .. }),
            ) => {
                save(session, &BookingState::RoomChosen(choice)).await?;
                session
                    .flash_error("We could not complete your reservation. Please try again")
                    .await;
                Ok(SubmitOutcome::Retry(err))
            }
        }
    }

    /// Guest confirmation plus the optional owner notification. Queue failures are logged only.
    async fn send_confirmation(&self, confirmation: &Confirmation) {
        let messages = std::iter::once(email::guest_confirmation(&self.email, confirmation))
            .chain(email::owner_notification(&self.email, confirmation));

        for message in messages {
            if let Err(e) = self.mail.enqueue(message).await {
                warn!(
                    reservation_id = confirmation.reservation_id,
                    error = %e,
                    "Confirmation mail not queued"
                );
            }
        }
    }

    /// Confirmed reservation for the summary page. Removed from the session once read.
    pub async fn take_confirmation(&self, session: &Session) -> Result<Confirmation, WorkflowError> {
        match session.remove::<BookingState>(STATE_KEY).await {
            Some(BookingState::Confirmed(confirmation)) => Ok(confirmation),
            Some(other) => {
                debug!(state = ?other, "Summary requested before confirmation");
                save(session, &other).await?;
                Err(WorkflowError::MissingState {
                    expected: "confirmed reservation",
                })
            }
            None => Err(WorkflowError::MissingState {
                expected: "confirmed reservation",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{MailQueueConfig, OverflowPolicy},
        email::MailData,
        session::{MemorySessionStore, SessionStore},
        store::InMemoryStore,
    };
    use std::{sync::Arc, time::Duration};
    use tokio::sync::mpsc;
    use uuid::Uuid;

    struct Harness {
        store: InMemoryStore,
        workflow: BookingWorkflow,
        session: Session,
        outbox: mpsc::Receiver<MailData>,
    }

    fn harness(owner_email: Option<&str>) -> Harness {
        let store = InMemoryStore::with_rooms(Duration::from_secs(1), ["General's Quarters", "Major's Suite"]);
        let shared: Arc<dyn crate::store::IntervalStore> = Arc::new(store.clone());
        let (mail, outbox) = MailQueue::new(&MailQueueConfig {
            queue_capacity: 10,
            overflow: OverflowPolicy::Drop,
        });
        let email = EmailConfig {
            owner_email: owner_email.map(str::to_string),
            ..Default::default()
        };
        let workflow = BookingWorkflow::new(
            AvailabilityChecker::new(shared.clone()),
            ReservationCommitter::new(shared),
            mail,
            email,
        );
        let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new(Duration::from_secs(60), 100));
        Harness {
            store,
            workflow,
            session: Session::new(Uuid::new_v4(), sessions),
            outbox,
        }
    }

    fn guest_form(first_name: &str, email: &str) -> HashMap<String, String> {
        HashMap::from([
            ("first_name".to_string(), first_name.to_string()),
            ("last_name".to_string(), "Smith".to_string()),
            ("email".to_string(), email.to_string()),
            ("phone".to_string(), "555-555-5555".to_string()),
        ])
    }

    async fn choose(h: &Harness, room_id: RoomId) -> RoomChoice {
        match h.workflow.search(&h.session, "2050-01-01", "2050-01-02").await.unwrap() {
            SearchOutcome::Available { .. } => {}
            other => panic!("expected availability, got {other:?}"),
        }
        h.workflow.choose_room(&h.session, room_id).await.unwrap()
    }

    #[test]
    fn test_state_is_tagged_in_session() {
        let state = BookingState::Searching { stay: None };
        assert_eq!(
            serde_json::to_value(&state).unwrap(),
            serde_json::json!({ "step": "searching", "stay": null })
        );

        let choice = RoomChoice {
            room_id: 1,
            room_name: "General's Quarters".into(),
            stay: Stay::parse("2050-01-01", "2050-01-02").unwrap(),
        };
        let encoded = serde_json::to_value(BookingState::RoomChosen(choice.clone())).unwrap();
        assert_eq!(encoded["step"], "room_chosen");
        assert_eq!(encoded["room_id"], 1);
        let decoded: BookingState = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded.pending_choice(), Some(&choice));
    }

    #[tokio::test]
    async fn test_search_stores_stay_and_lists_free_rooms() {
        let h = harness(None);

        let outcome = h.workflow.search(&h.session, "2050-01-01", "2050-01-03").await.unwrap();
        let SearchOutcome::Available { stay, rooms } = outcome else {
            panic!("expected rooms");
        };
        assert_eq!(rooms.len(), 2);
        assert_eq!(
            h.workflow.state(&h.session).await,
            Some(BookingState::Searching { stay: Some(stay) })
        );
    }

    #[tokio::test]
    async fn test_search_without_availability_flashes_error() {
        let h = harness(None);
        for room_id in [1, 2] {
            h.store
                .seed_restriction(room_id, Stay::parse("2050-01-01", "2050-01-10").unwrap())
                .await
                .unwrap();
        }

        let outcome = h.workflow.search(&h.session, "2050-01-02", "2050-01-03").await.unwrap();
        assert!(matches!(outcome, SearchOutcome::NoAvailability));
        assert_eq!(h.session.take_messages().await.1.as_deref(), Some("No availability"));
        assert_eq!(h.workflow.state(&h.session).await, None);
    }

    #[tokio::test]
    async fn test_search_rejects_bad_dates() {
        let h = harness(None);
        let err = h.workflow.search(&h.session, "01/01/2050", "2050-01-02").await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Booking(BookingError::InvalidInput { field: "start", .. })
        ));
        let err = h.workflow.search(&h.session, "2050-01-02", "2050-01-02").await.unwrap_err();
        assert!(matches!(err, WorkflowError::Booking(BookingError::InvalidRange { .. })));
    }

    #[tokio::test]
    async fn test_steps_require_prior_state() {
        let h = harness(None);

        assert!(matches!(
            h.workflow.choose_room(&h.session, 1).await,
            Err(WorkflowError::MissingState { .. })
        ));
        assert!(matches!(
            h.workflow.submit_details(&h.session, guest_form("John", "john@smith.com")).await,
            Err(WorkflowError::MissingState { .. })
        ));
        assert!(matches!(
            h.workflow.take_confirmation(&h.session).await,
            Err(WorkflowError::MissingState { .. })
        ));

        // A room choice is not a confirmation, and asking for the summary keeps it
        let choice = choose(&h, 1).await;
        assert!(h.workflow.take_confirmation(&h.session).await.is_err());
        assert_eq!(h.workflow.pending_choice(&h.session).await.unwrap(), choice);
    }

    #[tokio::test]
    async fn test_book_room_enters_directly() {
        let h = harness(None);

        let choice = h.workflow.book_room(&h.session, "2", "2050-03-01", "2050-03-04").await.unwrap();
        assert_eq!(choice.room_name, "Major's Suite");
        assert_eq!(
            h.workflow.state(&h.session).await,
            Some(BookingState::RoomChosen(choice))
        );

        assert!(matches!(
            h.workflow.book_room(&h.session, "x", "2050-03-01", "2050-03-04").await,
            Err(WorkflowError::Booking(BookingError::InvalidInput { field: "id", .. }))
        ));
        assert!(matches!(
            h.workflow.book_room(&h.session, "99", "2050-03-01", "2050-03-04").await,
            Err(WorkflowError::Booking(BookingError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_invalid_details_keep_room_chosen() {
        let h = harness(None);
        let choice = choose(&h, 1).await;

        let outcome = h
            .workflow
            .submit_details(&h.session, guest_form("Jo", "not-an-email"))
            .await
            .unwrap();
        let SubmitOutcome::Invalid { form, .. } = outcome else {
            panic!("expected validation failure");
        };
        assert!(form.errors.get("first_name").is_some());
        assert!(form.errors.get("email").is_some());
        assert_eq!(
            h.workflow.state(&h.session).await,
            Some(BookingState::RoomChosen(choice))
        );
        assert!(h.store.snapshot().await.unwrap().reservations.is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn test_happy_path_confirms_and_queues_mail() {
        let mut h = harness(Some("owner@example.com"));
        choose(&h, 1).await;

        let outcome = h
            .workflow
            .submit_details(&h.session, guest_form("John", "john@smith.com"))
            .await
            .unwrap();
        let SubmitOutcome::Confirmed(confirmation) = outcome else {
            panic!("expected confirmation");
        };
        assert_eq!(confirmation.choice.room_id, 1);

        let guest_mail = h.outbox.try_recv().unwrap();
        assert_eq!(guest_mail.to, "john@smith.com");
        let owner_mail = h.outbox.try_recv().unwrap();
        assert_eq!(owner_mail.to, "owner@example.com");

        assert_eq!(h.session.take_messages().await, (Some("Reservation saved".to_string()), None));

        // The summary is shown exactly once
        assert_eq!(h.workflow.take_confirmation(&h.session).await.unwrap(), confirmation);
        assert!(h.workflow.take_confirmation(&h.session).await.is_err());
    }

    #[tokio::test]
    async fn test_conflict_sends_guest_back_to_search() {
        let mut h = harness(None);
        choose(&h, 1).await;
        // Someone else takes the room between choosing and confirming
        h.store
            .seed_restriction(1, Stay::parse("2050-01-01", "2050-01-02").unwrap())
            .await
            .unwrap();

        let outcome = h
            .workflow
            .submit_details(&h.session, guest_form("John", "john@smith.com"))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            SubmitOutcome::Restart(BookingError::RoomNoLongerAvailable { room_id: 1 })
        ));
        assert_eq!(
            h.workflow.state(&h.session).await,
            Some(BookingState::Searching { stay: None })
        );
        assert!(h.session.take_messages().await.1.unwrap().contains("Please search again"));
        assert!(h.outbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_store_failure_allows_retry() {
        let h = harness(None);
        let choice = choose(&h, 2).await;
        h.store.set_unavailable(true);

        let outcome = h
            .workflow
            .submit_details(&h.session, guest_form("John", "john@smith.com"))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            SubmitOutcome::Retry(BookingError::StoreUnavailable { .. })
        ));
        assert_eq!(
            h.workflow.state(&h.session).await,
            Some(BookingState::RoomChosen(choice))
        );

        h.store.set_unavailable(false);
        let outcome = h
            .workflow
            .submit_details(&h.session, guest_form("John", "john@smith.com"))
            .await
            .unwrap();
        assert!(matches!(outcome, SubmitOutcome::Confirmed(_)));
    }

    #[test_log::test(tokio::test)]
    async fn test_partial_commit_failure_allows_retry_without_mail() {
        let mut h = harness(Some("owner@example.com"));
        let choice = choose(&h, 1).await;
        h.store.fail_restriction_inserts(true);
        h.store.fail_rollbacks(true);

        let outcome = h
            .workflow
            .submit_details(&h.session, guest_form("John", "john@smith.com"))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            SubmitOutcome::Retry(BookingError::PartialCommitFailure { .. })
        ));
        assert_eq!(
            h.workflow.state(&h.session).await,
            Some(BookingState::RoomChosen(choice))
        );
        assert_eq!(
            h.session.take_messages().await.1.as_deref(),
            Some("We could not complete your reservation. Please try again")
        );
        assert!(h.outbox.try_recv().is_err());
    }
}

//! Reservation form, direct booking entry and confirmation views.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::{availability::StayView, pages::Messages};
use crate::{
    booking::workflow::{Confirmation, GuestDetails, RoomChoice},
    forms::Form,
    types::{ReservationId, RoomId},
};

/// Direct entry from a room page: `/book-room?id=1&s=2050-01-01&e=2050-01-03`
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(default)]
pub struct BookRoomQuery {
    /// Room id
    pub id: String,
    /// Arrival date
    pub s: String,
    /// Departure date
    pub e: String,
}

/// Guest details as posted to `/make-reservation`
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ReservationForm {
    #[schema(example = "John")]
    pub first_name: String,
    #[schema(example = "Smith")]
    pub last_name: String,
    #[schema(example = "john@smith.com")]
    pub email: String,
    #[schema(example = "555-555-5555")]
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RoomChoiceView {
    pub room_id: RoomId,
    pub room_name: String,
    pub stay: StayView,
}

impl From<RoomChoice> for RoomChoiceView {
    fn from(choice: RoomChoice) -> Self {
        Self {
            room_id: choice.room_id,
            room_name: choice.room_name,
            stay: choice.stay.into(),
        }
    }
}

/// The guest details form for the chosen room. After a failed submission `values` holds what
/// was sent and `errors` the messages per field.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReservationFormView {
    pub reservation: RoomChoiceView,
    pub values: BTreeMap<String, String>,
    pub errors: BTreeMap<String, Vec<String>>,
    #[serde(flatten)]
    pub messages: Messages,
}

const FORM_FIELDS: [&str; 4] = ["first_name", "last_name", "email", "phone"];

impl ReservationFormView {
    pub fn blank(choice: RoomChoice, messages: Messages) -> Self {
        Self {
            reservation: choice.into(),
            values: FORM_FIELDS.iter().map(|f| (f.to_string(), String::new())).collect(),
            errors: BTreeMap::new(),
            messages,
        }
    }

    pub fn rejected(choice: RoomChoice, form: &Form) -> Self {
        Self {
            reservation: choice.into(),
            values: FORM_FIELDS.iter().map(|f| (f.to_string(), form.get(f).to_string())).collect(),
            errors: form.errors.to_map(),
            messages: Messages::default(),
        }
    }
}

/// Confirmation shown once after a successful reservation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReservationSummaryView {
    #[schema(example = 17)]
    pub reservation_id: ReservationId,
    pub room_id: RoomId,
    pub room_name: String,
    pub stay: StayView,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    #[serde(flatten)]
    pub messages: Messages,
}

impl ReservationSummaryView {
    pub fn new(confirmation: Confirmation, messages: Messages) -> Self {
        let GuestDetails {
            first_name,
            last_name,
            email,
            phone,
        } = confirmation.guest;
        Self {
            reservation_id: confirmation.reservation_id,
            room_id: confirmation.choice.room_id,
            room_name: confirmation.choice.room_name,
            stay: confirmation.choice.stay.into(),
            first_name,
            last_name,
            email,
            phone,
            messages,
        }
    }
}

//! Search requests and results.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::rooms::RoomResponse;
use crate::types::{DATE_FORMAT, Stay};

/// Availability search form. Missing fields arrive empty and fail date parsing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct SearchForm {
    /// Arrival date
    #[schema(example = "2050-01-01")]
    pub start: String,
    /// Departure date (not occupied)
    #[schema(example = "2050-01-03")]
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StayView {
    #[schema(example = "2050-01-01")]
    pub start: String,
    #[schema(example = "2050-01-03")]
    pub end: String,
    #[schema(example = 2)]
    pub nights: i64,
}

impl From<Stay> for StayView {
    fn from(stay: Stay) -> Self {
        Self {
            start: stay.start().format(DATE_FORMAT).to_string(),
            end: stay.end().format(DATE_FORMAT).to_string(),
            nights: stay.nights(),
        }
    }
}

/// Rooms free for the searched stay, ordered by id
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChooseRoomView {
    pub stay: StayView,
    pub rooms: Vec<RoomResponse>,
}

/// Single-room availability check, posted by the room pages
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct AvailabilityCheckForm {
    #[schema(example = "2050-01-01")]
    pub start: String,
    #[schema(example = "2050-01-03")]
    pub end: String,
    #[schema(example = "1")]
    pub room_id: String,
}

/// Answer to an [`AvailabilityCheckForm`]. Inputs are echoed back as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityCheckResponse {
    /// Whether the room is free for the whole stay
    pub ok: bool,
    /// Empty when the check ran; explains the problem when the input was rejected
    pub message: String,
    pub room_id: String,
    pub start_date: String,
    pub end_date: String,
}

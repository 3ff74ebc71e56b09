//! Database models for room restrictions.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::{ReservationId, RestrictionId, RoomId, Stay};

/// Why a room is blocked. Both kinds block availability identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestrictionKind {
    /// Created by the reservation committer alongside a reservation
    Reservation,
    /// Maintenance or owner blackout with no owning reservation
    OwnerBlock,
}

impl RestrictionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestrictionKind::Reservation => "reservation",
            RestrictionKind::OwnerBlock => "owner_block",
        }
    }
}

impl TryFrom<String> for RestrictionKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "reservation" => Ok(RestrictionKind::Reservation),
            "owner_block" => Ok(RestrictionKind::OwnerBlock),
            other => Err(format!("unknown restriction kind: {other}")),
        }
    }
}

/// Database entity model
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct RoomRestriction {
    pub id: RestrictionId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub room_id: RoomId,
    pub reservation_id: Option<ReservationId>,
    #[sqlx(try_from = "String")]
    pub restriction_kind: RestrictionKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RoomRestriction {
    /// Stored rows always satisfy `start_date < end_date` (table CHECK constraint).
    pub fn stay(&self) -> Option<Stay> {
        Stay::new(self.start_date, self.end_date).ok()
    }
}

/// Request for creating a room restriction
#[derive(Debug, Clone)]
pub struct NewRoomRestriction {
    pub room_id: RoomId,
    pub stay: Stay,
    pub reservation_id: Option<ReservationId>,
    pub kind: RestrictionKind,
}

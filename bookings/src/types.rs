//! Common type definitions shared by the store, the booking core and the API layer.
//!
//! # ID Types
//!
//! Rooms, reservations and restrictions are identified by `BIGSERIAL` keys, wrapped in type
//! aliases so signatures say which table an id belongs to:
//!
//! - [`RoomId`]
//! - [`ReservationId`]
//! - [`RestrictionId`]
//!
//! # Stays
//!
//! [`Stay`] is the half-open calendar-date range `[start, end)` every availability query and
//! every restriction is expressed in. It can only be constructed with `start < end`, so code
//! holding a `Stay` never has to re-check the range.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::booking::BookingError;

pub type RoomId = i64;
pub type ReservationId = i64;
pub type RestrictionId = i64;

/// Wire format for dates crossing the HTTP boundary
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` date, naming the offending field on failure
pub fn parse_date(field: &'static str, raw: &str) -> Result<NaiveDate, BookingError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|_| BookingError::InvalidInput {
        field,
        message: format!("{field} must be a date in YYYY-MM-DD form, got {raw:?}"),
    })
}

/// Parse a room id from a form field or query parameter
pub fn parse_room_id(field: &'static str, raw: &str) -> Result<RoomId, BookingError> {
    raw.trim().parse::<RoomId>().map_err(|_| BookingError::InvalidInput {
        field,
        message: format!("{field} must be a numeric room id, got {raw:?}"),
    })
}

/// A half-open stay `[start, end)`: `end` is the checkout day and is not occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawStay")]
pub struct Stay {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Deserialize)]
struct RawStay {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<RawStay> for Stay {
    type Error = BookingError;

    fn try_from(raw: RawStay) -> Result<Self, Self::Error> {
        Stay::new(raw.start, raw.end)
    }
}

impl Stay {
    /// Zero- and negative-length stays are rejected uniformly.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, BookingError> {
        if start >= end {
            return Err(BookingError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parse both ends from their `YYYY-MM-DD` wire form.
    pub fn parse(start: &str, end: &str) -> Result<Self, BookingError> {
        let start = parse_date("start", start)?;
        let end = parse_date("end", end)?;
        Self::new(start, end)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// `self.start < other.end && self.end > other.start`
    pub fn overlaps(&self, other: &Stay) -> bool {
        self.start < other.end && self.end > other.start
    }
}

impl fmt::Display for Stay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.format(DATE_FORMAT), self.end.format(DATE_FORMAT))
    }
}

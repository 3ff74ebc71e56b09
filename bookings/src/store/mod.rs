//! Interval store: durable room-restriction intervals plus read access to the room catalogue.
//!
//! The booking core only ever talks to [`IntervalStore`]. Two adapters implement it:
//!
//! - [`PostgresStore`]: production adapter over a bounded `sqlx` pool. A write unit is a
//!   database transaction; [`StoreTx::lock_room`] is `SELECT ... FOR UPDATE` on the room row and
//!   the `room_restrictions_no_overlap` exclusion constraint backs the invariant up.
//! - [`InMemoryStore`]: process-local adapter for tests and `database.type: memory`. A write
//!   unit holds the store mutex for its whole lifetime and stages its writes on a copy.
//!
//! Every operation is bounded by the configured operation timeout and reports
//! [`DbError::Unavailable`](crate::db::errors::DbError::Unavailable) when it elapses.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::{
    db::{
        errors::Result,
        models::{
            reservations::{NewReservation, Reservation},
            room_restrictions::{NewRoomRestriction, RoomRestriction},
            rooms::Room,
        },
    },
    types::{RoomId, Stay},
};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Read access to rooms and restrictions, and the entry point for write units.
#[async_trait]
pub trait IntervalStore: Send + Sync {
    async fn find_room_by_id(&self, id: RoomId) -> Result<Option<Room>>;

    /// All rooms ordered by id ascending
    async fn list_rooms(&self) -> Result<Vec<Room>>;

    /// Number of restrictions on `room_id` overlapping `stay`
    async fn count_overlaps(&self, room_id: RoomId, stay: &Stay) -> Result<i64>;

    /// Every room with at least one restriction overlapping `stay`
    async fn list_overlapped_room_ids(&self, stay: &Stay) -> Result<BTreeSet<RoomId>>;

    /// Open a write unit. Dropping it without calling [`StoreTx::commit`] rolls it back.
    async fn begin(&self) -> Result<Box<dyn StoreTx>>;

    /// Release connections on shutdown
    async fn close(&self) {}
}

/// A write unit: everything done through it becomes visible at once on commit, or not at all.
#[async_trait]
pub trait StoreTx: Send {
    /// Serialise writers for `room_id` until the unit ends. `None` if the room does not exist.
    async fn lock_room(&mut self, room_id: RoomId) -> Result<Option<Room>>;

    async fn count_overlaps(&mut self, room_id: RoomId, stay: &Stay) -> Result<i64>;

    async fn insert_reservation(&mut self, request: &NewReservation) -> Result<Reservation>;

    async fn insert_restriction(&mut self, request: &NewRoomRestriction) -> Result<RoomRestriction>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

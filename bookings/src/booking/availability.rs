use std::sync::Arc;

use chrono::NaiveDate;
use tracing::instrument;

use super::BookingError;
use crate::{
    db::models::rooms::Room,
    store::IntervalStore,
    types::{RoomId, Stay},
};

/// Read-only availability queries. Each call reflects the store at the moment it runs; nothing
/// is locked, so a room reported free can still be taken before it is committed.
#[derive(Clone)]
pub struct AvailabilityChecker {
    store: Arc<dyn IntervalStore>,
}

impl AvailabilityChecker {
    pub fn new(store: Arc<dyn IntervalStore>) -> Self {
        Self { store }
    }

    /// `true` when no restriction on `room_id` overlaps `[start, end)`.
    #[instrument(skip(self), err)]
    pub async fn is_room_free(&self, room_id: RoomId, start: NaiveDate, end: NaiveDate) -> Result<bool, BookingError> {
        let stay = Stay::new(start, end)?;
        let overlaps = self.store.count_overlaps(room_id, &stay).await?;
        Ok(overlaps == 0)
    }

    /// Every room with no overlapping restriction, ordered by id ascending.
    #[instrument(skip(self), err)]
    pub async fn free_rooms(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Room>, BookingError> {
        let stay = Stay::new(start, end)?;
        let rooms = self.store.list_rooms().await?;
        let taken = self.store.list_overlapped_room_ids(&stay).await?;

        let mut free: Vec<Room> = rooms.into_iter().filter(|room| !taken.contains(&room.id)).collect();
        free.sort_by_key(|room| room.id);
        Ok(free)
    }

    #[instrument(skip(self), err)]
    pub async fn room(&self, id: RoomId) -> Result<Room, BookingError> {
        self.store
            .find_room_by_id(id)
            .await?
            .ok_or_else(|| BookingError::room_not_found(id))
    }

    pub async fn rooms(&self) -> Result<Vec<Room>, BookingError> {
        Ok(self.store.list_rooms().await?)
    }
}

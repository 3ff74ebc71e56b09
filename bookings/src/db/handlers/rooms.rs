//! Database repository for the room catalogue.

use sqlx::PgConnection;
use tracing::instrument;

use crate::{
    db::{errors::Result, models::rooms::Room},
    types::RoomId,
};

const ROOM_COLUMNS: &str = "id, room_name, created_at, updated_at";

pub struct Rooms<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Rooms<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_id(&mut self, id: RoomId) -> Result<Option<Room>> {
        let room = sqlx::query_as::<_, Room>(&format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(room)
    }

    /// All rooms, ordered by id ascending
    #[instrument(skip(self), err)]
    pub async fn list(&mut self) -> Result<Vec<Room>> {
        let rooms = sqlx::query_as::<_, Room>(&format!("SELECT {ROOM_COLUMNS} FROM rooms ORDER BY id ASC"))
            .fetch_all(&mut *self.db)
            .await?;

        Ok(rooms)
    }

    /// Take a row lock on the room for the rest of the enclosing transaction.
    ///
    /// Every committer for the same room queues here, so the overlap re-check that follows
    /// cannot interleave with another insert for that room.
    #[instrument(skip(self), err)]
    pub async fn lock_for_update(&mut self, id: RoomId) -> Result<Option<Room>> {
        let room = sqlx::query_as::<_, Room>(&format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = $1 FOR UPDATE"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(room)
    }

    #[instrument(skip(self), err)]
    pub async fn count(&mut self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM rooms")
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }

    #[instrument(skip(self), err)]
    pub async fn create(&mut self, room_name: &str) -> Result<Room> {
        let room = sqlx::query_as::<_, Room>(&format!(
            "INSERT INTO rooms (room_name) VALUES ($1) RETURNING {ROOM_COLUMNS}"
        ))
        .bind(room_name)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(room)
    }
}

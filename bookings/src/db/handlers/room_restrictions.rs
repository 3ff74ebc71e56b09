//! Database repository for room restrictions.
//!
//! All overlap queries use the half-open predicate `start_date < $end AND end_date > $start`,
//! so a checkout day equal to another stay's check-in day never counts as a clash.

use std::collections::BTreeSet;

use sqlx::PgConnection;
use tracing::instrument;

use crate::{
    db::{
        errors::Result,
        models::room_restrictions::{NewRoomRestriction, RoomRestriction},
    },
    types::{RoomId, Stay},
};

const RESTRICTION_COLUMNS: &str =
    "id, start_date, end_date, room_id, reservation_id, restriction_kind, created_at, updated_at";

pub struct RoomRestrictions<'c> {
    db: &'c mut PgConnection,
}

impl<'c> RoomRestrictions<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Insert a restriction. The exclusion constraint on `(room_id, daterange)` rejects
    /// overlapping rows with SQLSTATE 23P01.
    #[instrument(skip(self, request), fields(room_id = request.room_id, stay = %request.stay), err)]
    pub async fn create(&mut self, request: &NewRoomRestriction) -> Result<RoomRestriction> {
        let restriction = sqlx::query_as::<_, RoomRestriction>(&format!(
            r#"
            INSERT INTO room_restrictions (start_date, end_date, room_id, reservation_id, restriction_kind)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {RESTRICTION_COLUMNS}
            "#
        ))
        .bind(request.stay.start())
        .bind(request.stay.end())
        .bind(request.room_id)
        .bind(request.reservation_id)
        .bind(request.kind.as_str())
        .fetch_one(&mut *self.db)
        .await?;

        Ok(restriction)
    }

    #[instrument(skip(self), fields(stay = %stay), err)]
    pub async fn count_overlapping(&mut self, room_id: RoomId, stay: &Stay) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(id)
            FROM room_restrictions
            WHERE room_id = $1
              AND start_date < $3
              AND end_date > $2
            "#,
        )
        .bind(room_id)
        .bind(stay.start())
        .bind(stay.end())
        .fetch_one(&mut *self.db)
        .await?;

        Ok(count)
    }

    /// Rooms with at least one restriction overlapping `stay`, in a single query
    #[instrument(skip(self), fields(stay = %stay), err)]
    pub async fn overlapped_room_ids(&mut self, stay: &Stay) -> Result<BTreeSet<RoomId>> {
        let ids = sqlx::query_scalar::<_, RoomId>(
            r#"
            SELECT DISTINCT room_id
            FROM room_restrictions
            WHERE start_date < $2
              AND end_date > $1
            "#,
        )
        .bind(stay.start())
        .bind(stay.end())
        .fetch_all(&mut *self.db)
        .await?;

        Ok(ids.into_iter().collect())
    }

}

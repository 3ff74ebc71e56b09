//! PostgreSQL adapter for [`IntervalStore`].

use std::{collections::BTreeSet, future::Future, time::Duration};

use async_trait::async_trait;
use futures::TryFutureExt;
use sqlx::{PgPool, Postgres, Transaction, postgres::PgPoolOptions};
use tracing::{info, instrument};

use super::{IntervalStore, StoreTx};
use crate::{
    config::PoolSettings,
    db::{
        errors::{DbError, Result},
        handlers::{Reservations, RoomRestrictions, Rooms},
        models::{
            reservations::{NewReservation, Reservation},
            room_restrictions::{NewRoomRestriction, RoomRestriction},
            rooms::Room,
        },
    },
    types::{RoomId, Stay},
};

/// Run `operation` with an upper bound, turning an elapsed timer into `Unavailable`.
async fn bounded<T, F>(limit: Duration, operation: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(DbError::unavailable(operation, format!("timed out after {limit:?}"))),
    }
}

#[derive(Clone, Debug)]
pub struct PostgresStore {
    pool: PgPool,
    operation_timeout: Duration,
}

impl PostgresStore {
    pub fn new(pool: PgPool, operation_timeout: Duration) -> Self {
        Self { pool, operation_timeout }
    }

    /// Build a bounded pool. Connections are opened lazily so startup does not depend on
    /// `min_connections` being reachable immediately.
    pub async fn connect(url: &str, settings: &PoolSettings, operation_timeout: Duration) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(operation_timeout)
            .idle_timeout(settings.idle_timeout())
            .max_lifetime(settings.max_lifetime())
            .connect(url)
            .await?;

        info!(
            max_connections = settings.max_connections,
            operation_timeout = ?operation_timeout,
            "Connected to PostgreSQL"
        );

        Ok(Self::new(pool, operation_timeout))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl IntervalStore for PostgresStore {
    #[instrument(skip(self), err)]
    async fn find_room_by_id(&self, id: RoomId) -> Result<Option<Room>> {
        bounded(self.operation_timeout, "find_room_by_id", async {
            let mut conn = self.pool.acquire().await?;
            Rooms::new(&mut conn).get_by_id(id).await
        })
        .await
    }

    #[instrument(skip(self), err)]
    async fn list_rooms(&self) -> Result<Vec<Room>> {
        bounded(self.operation_timeout, "list_rooms", async {
            let mut conn = self.pool.acquire().await?;
            Rooms::new(&mut conn).list().await
        })
        .await
    }

    #[instrument(skip(self), fields(stay = %stay), err)]
    async fn count_overlaps(&self, room_id: RoomId, stay: &Stay) -> Result<i64> {
        bounded(self.operation_timeout, "count_overlaps", async {
            let mut conn = self.pool.acquire().await?;
            RoomRestrictions::new(&mut conn).count_overlapping(room_id, stay).await
        })
        .await
    }

    #[instrument(skip(self), fields(stay = %stay), err)]
    async fn list_overlapped_room_ids(&self, stay: &Stay) -> Result<BTreeSet<RoomId>> {
        bounded(self.operation_timeout, "list_overlapped_room_ids", async {
            let mut conn = self.pool.acquire().await?;
            RoomRestrictions::new(&mut conn).overlapped_room_ids(stay).await
        })
        .await
    }

    #[instrument(skip(self), err)]
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let tx = bounded(self.operation_timeout, "begin", self.pool.begin().map_err(DbError::from)).await?;
        Ok(Box::new(PgTx {
            tx,
            operation_timeout: self.operation_timeout,
        }))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// A write unit backed by one transaction. sqlx rolls the transaction back when it is dropped
/// uncommitted.
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
    operation_timeout: Duration,
}

#[async_trait]
impl StoreTx for PgTx {
    #[instrument(skip(self), err)]
    async fn lock_room(&mut self, room_id: RoomId) -> Result<Option<Room>> {
        let limit = self.operation_timeout;
        let conn = &mut *self.tx;
        bounded(limit, "lock_room", Rooms::new(conn).lock_for_update(room_id)).await
    }

    #[instrument(skip(self), fields(stay = %stay), err)]
    async fn count_overlaps(&mut self, room_id: RoomId, stay: &Stay) -> Result<i64> {
        let limit = self.operation_timeout;
        let conn = &mut *self.tx;
        bounded(limit, "count_overlaps", RoomRestrictions::new(conn).count_overlapping(room_id, stay)).await
    }

    #[instrument(skip(self, request), fields(room_id = request.room_id, stay = %request.stay), err)]
    async fn insert_reservation(&mut self, request: &NewReservation) -> Result<Reservation> {
        let limit = self.operation_timeout;
        let conn = &mut *self.tx;
        bounded(limit, "insert_reservation", Reservations::new(conn).create(request)).await
    }

    #[instrument(skip(self, request), fields(room_id = request.room_id, stay = %request.stay), err)]
    async fn insert_restriction(&mut self, request: &NewRoomRestriction) -> Result<RoomRestriction> {
        let limit = self.operation_timeout;
        let conn = &mut *self.tx;
        bounded(limit, "insert_restriction", RoomRestrictions::new(conn).create(request)).await
    }

    #[instrument(skip(self), err)]
    async fn commit(self: Box<Self>) -> Result<()> {
        let PgTx { tx, operation_timeout } = *self;
        bounded(operation_timeout, "commit", tx.commit().map_err(DbError::from)).await
    }

    #[instrument(skip(self), err)]
    async fn rollback(self: Box<Self>) -> Result<()> {
        let PgTx { tx, operation_timeout } = *self;
        bounded(operation_timeout, "rollback", tx.rollback().map_err(DbError::from)).await
    }
}

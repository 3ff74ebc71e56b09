//! Process-local adapter for [`IntervalStore`].
//!
//! All state sits behind one `tokio` mutex. A write unit takes the mutex with `lock_owned` in
//! [`IntervalStore::begin`] and keeps it until it commits, rolls back or is dropped, so write
//! units run one at a time and readers never observe a half-applied unit. Writes are staged on
//! a copy of the state and swapped in on commit.
//!
//! Inserts enforce the same rules as the PostgreSQL schema: unknown rooms or reservations are
//! foreign key violations and overlapping restrictions on one room are rejected as
//! [`DbError::Overlap`].

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};
use tracing::{debug, instrument};

use super::{IntervalStore, StoreTx};
use crate::{
    db::{
        errors::{DbError, Result},
        models::{
            reservations::{NewReservation, Reservation},
            room_restrictions::{NewRoomRestriction, RestrictionKind, RoomRestriction},
            rooms::Room,
        },
    },
    types::{ReservationId, RestrictionId, RoomId, Stay},
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    rooms: BTreeMap<RoomId, Room>,
    reservations: BTreeMap<ReservationId, Reservation>,
    restrictions: BTreeMap<RestrictionId, RoomRestriction>,
    next_room_id: RoomId,
    next_reservation_id: ReservationId,
    next_restriction_id: RestrictionId,
}

impl MemoryState {
    fn add_room(&mut self, room_name: &str) -> Room {
        self.next_room_id += 1;
        let now = Utc::now();
        let room = Room {
            id: self.next_room_id,
            room_name: room_name.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.rooms.insert(room.id, room.clone());
        room
    }

    fn count_overlaps(&self, room_id: RoomId, stay: &Stay) -> i64 {
        self.restrictions
            .values()
            .filter(|r| r.room_id == room_id && r.start_date < stay.end() && r.end_date > stay.start())
            .count() as i64
    }

    fn overlapped_room_ids(&self, stay: &Stay) -> BTreeSet<RoomId> {
        self.restrictions
            .values()
            .filter(|r| r.start_date < stay.end() && r.end_date > stay.start())
            .map(|r| r.room_id)
            .collect()
    }

    fn insert_reservation(&mut self, request: &NewReservation) -> Result<Reservation> {
        if !self.rooms.contains_key(&request.room_id) {
            return Err(foreign_key("reservations", format!("room {} does not exist", request.room_id)));
        }

        self.next_reservation_id += 1;
        let now = Utc::now();
        let reservation = Reservation {
            id: self.next_reservation_id,
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
            email: request.email.clone(),
            phone: request.phone.clone(),
            start_date: request.stay.start(),
            end_date: request.stay.end(),
            room_id: request.room_id,
            created_at: now,
            updated_at: now,
        };
        self.reservations.insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    fn insert_restriction(&mut self, request: &NewRoomRestriction) -> Result<RoomRestriction> {
        if !self.rooms.contains_key(&request.room_id) {
            return Err(foreign_key("room_restrictions", format!("room {} does not exist", request.room_id)));
        }
        if let Some(reservation_id) = request.reservation_id {
            if !self.reservations.contains_key(&reservation_id) {
                return Err(foreign_key(
                    "room_restrictions",
                    format!("reservation {reservation_id} does not exist"),
                ));
            }
        }
        if self.count_overlaps(request.room_id, &request.stay) > 0 {
            return Err(DbError::Overlap {
                constraint: Some("room_restrictions_no_overlap".to_string()),
            });
        }

        self.next_restriction_id += 1;
        let now = Utc::now();
        let restriction = RoomRestriction {
            id: self.next_restriction_id,
            start_date: request.stay.start(),
            end_date: request.stay.end(),
            room_id: request.room_id,
            reservation_id: request.reservation_id,
            restriction_kind: request.kind,
            created_at: now,
            updated_at: now,
        };
        self.restrictions.insert(restriction.id, restriction.clone());
        Ok(restriction)
    }
}

fn foreign_key(table: &str, message: String) -> DbError {
    DbError::ForeignKeyViolation {
        constraint: None,
        table: Some(table.to_string()),
        message,
    }
}

/// Point-in-time copy of the store contents, for asserting that an operation changed nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub rooms: Vec<Room>,
    pub reservations: Vec<Reservation>,
    pub restrictions: Vec<RoomRestriction>,
}

#[derive(Debug, Default)]
struct Faults {
    unavailable: AtomicBool,
    fail_restriction_insert: AtomicBool,
    fail_rollback: AtomicBool,
}

impl Faults {
    fn check(&self, operation: &'static str) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DbError::unavailable(operation, "store marked unavailable"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
    faults: Arc<Faults>,
    operation_timeout: Duration,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(3))
    }
}

impl InMemoryStore {
    pub fn new(operation_timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            faults: Arc::new(Faults::default()),
            operation_timeout,
        }
    }

    /// A store whose catalogue holds `names`, with ids assigned from 1 in order.
    pub fn with_rooms<I, S>(operation_timeout: Duration, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = MemoryState::default();
        for name in names {
            state.add_room(name.as_ref());
        }
        Self {
            state: Arc::new(Mutex::new(state)),
            faults: Arc::new(Faults::default()),
            operation_timeout,
        }
    }

    pub async fn add_room(&self, room_name: &str) -> Result<Room> {
        let mut state = self.lock("add_room").await?;
        Ok(state.add_room(room_name))
    }

    /// Block a room for `stay` without a reservation (maintenance or owner use).
    pub async fn seed_restriction(&self, room_id: RoomId, stay: Stay) -> Result<RoomRestriction> {
        let mut state = self.lock("seed_restriction").await?;
        state.insert_restriction(&NewRoomRestriction {
            room_id,
            stay,
            reservation_id: None,
            kind: RestrictionKind::OwnerBlock,
        })
    }

    pub async fn snapshot(&self) -> Result<StoreSnapshot> {
        let state = self.lock("snapshot").await?;
        Ok(StoreSnapshot {
            rooms: state.rooms.values().cloned().collect(),
            reservations: state.reservations.values().cloned().collect(),
            restrictions: state.restrictions.values().cloned().collect(),
        })
    }

    /// Make every subsequent operation fail with `Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make `insert_restriction` on write units fail with `Unavailable`
    pub fn fail_restriction_inserts(&self, fail: bool) {
        self.faults.fail_restriction_insert.store(fail, Ordering::SeqCst);
    }

    /// Make `rollback` on write units report failure after discarding the staged writes
    pub fn fail_rollbacks(&self, fail: bool) {
        self.faults.fail_rollback.store(fail, Ordering::SeqCst);
    }

    async fn lock(&self, operation: &'static str) -> Result<MutexGuard<'_, MemoryState>> {
        self.faults.check(operation)?;
        tokio::time::timeout(self.operation_timeout, self.state.lock())
            .await
            .map_err(|_| DbError::unavailable(operation, format!("timed out after {:?}", self.operation_timeout)))
    }
}

#[async_trait]
impl IntervalStore for InMemoryStore {
    async fn find_room_by_id(&self, id: RoomId) -> Result<Option<Room>> {
        let state = self.lock("find_room_by_id").await?;
        Ok(state.rooms.get(&id).cloned())
    }

    async fn list_rooms(&self) -> Result<Vec<Room>> {
        let state = self.lock("list_rooms").await?;
        Ok(state.rooms.values().cloned().collect())
    }

    #[instrument(skip(self), fields(stay = %stay), err)]
    async fn count_overlaps(&self, room_id: RoomId, stay: &Stay) -> Result<i64> {
        let state = self.lock("count_overlaps").await?;
        Ok(state.count_overlaps(room_id, stay))
    }

    #[instrument(skip(self), fields(stay = %stay), err)]
    async fn list_overlapped_room_ids(&self, stay: &Stay) -> Result<BTreeSet<RoomId>> {
        let state = self.lock("list_overlapped_room_ids").await?;
        Ok(state.overlapped_room_ids(stay))
    }

    #[instrument(skip(self), err)]
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        self.faults.check("begin")?;
        let guard = tokio::time::timeout(self.operation_timeout, Arc::clone(&self.state).lock_owned())
            .await
            .map_err(|_| DbError::unavailable("begin", format!("timed out after {:?}", self.operation_timeout)))?;
        let staged = (*guard).clone();

        Ok(Box::new(InMemoryTx {
            guard,
            staged,
            faults: Arc::clone(&self.faults),
        }))
    }
}

/// Write unit over the store mutex. Writes go to `staged`; dropping the unit discards them.
pub struct InMemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
    faults: Arc<Faults>,
}

#[async_trait]
impl StoreTx for InMemoryTx {
    async fn lock_room(&mut self, room_id: RoomId) -> Result<Option<Room>> {
        self.faults.check("lock_room")?;
        // The store mutex is already held for the whole unit
        Ok(self.staged.rooms.get(&room_id).cloned())
    }

    async fn count_overlaps(&mut self, room_id: RoomId, stay: &Stay) -> Result<i64> {
        self.faults.check("count_overlaps")?;
        Ok(self.staged.count_overlaps(room_id, stay))
    }

    async fn insert_reservation(&mut self, request: &NewReservation) -> Result<Reservation> {
        self.faults.check("insert_reservation")?;
        self.staged.insert_reservation(request)
    }

    async fn insert_restriction(&mut self, request: &NewRoomRestriction) -> Result<RoomRestriction> {
        self.faults.check("insert_restriction")?;
        if self.faults.fail_restriction_insert.load(Ordering::SeqCst) {
            return Err(DbError::unavailable("insert_restriction", "injected failure"));
        }
        self.staged.insert_restriction(request)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.faults.check("commit")?;
        let InMemoryTx { mut guard, staged, .. } = *self;
        *guard = staged;
        debug!("In-memory write unit committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        if self.faults.fail_rollback.load(Ordering::SeqCst) {
            return Err(DbError::unavailable("rollback", "injected failure"));
        }
        debug!("In-memory write unit rolled back");
        Ok(())
    }
}

use std::sync::Arc;

use chrono::NaiveDate;
use metrics::counter;
use tracing::{error, info, instrument, warn};

use super::BookingError;
use crate::{
    db::{
        errors::DbError,
        models::{
            reservations::NewReservation,
            room_restrictions::{NewRoomRestriction, RestrictionKind},
        },
    },
    store::{IntervalStore, StoreTx},
    types::{ReservationId, RoomId, Stay},
};

/// Everything needed to commit a reservation, as gathered by the workflow.
#[derive(Debug, Clone)]
pub struct ReservationDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub room_id: RoomId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Writes a reservation and its room restriction as one unit.
#[derive(Clone)]
pub struct ReservationCommitter {
    store: Arc<dyn IntervalStore>,
}

/// An exclusion-constraint rejection means another writer got there first.
fn classify(err: DbError, room_id: RoomId) -> BookingError {
    match err {
        DbError::Overlap { .. } => BookingError::RoomNoLongerAvailable { room_id },
        other => other.into(),
    }
}

async fn abandon(tx: Box<dyn StoreTx>, room_id: RoomId) {
    if let Err(e) = tx.rollback().await {
        warn!(room_id, error = %e, "Rollback of an empty write unit failed");
    }
}

impl ReservationCommitter {
    pub fn new(store: Arc<dyn IntervalStore>) -> Self {
        Self { store }
    }

    #[instrument(
        skip(self, draft),
        fields(room_id = draft.room_id, start = %draft.start_date, end = %draft.end_date),
        err
    )]
    pub async fn commit(&self, draft: &ReservationDraft) -> Result<ReservationId, BookingError> {
        let stay = Stay::new(draft.start_date, draft.end_date)?;

        let result = self.commit_stay(draft, stay).await;
        match &result {
            Ok(_) => counter!("bookings_reservations_committed_total").increment(1),
            Err(BookingError::RoomNoLongerAvailable { .. }) => counter!("bookings_reservation_conflicts_total").increment(1),
            Err(_) => counter!("bookings_reservation_failures_total").increment(1),
        }
        result
    }

    async fn commit_stay(&self, draft: &ReservationDraft, stay: Stay) -> Result<ReservationId, BookingError> {
        let room_id = draft.room_id;
        let mut tx = self.store.begin().await?;

        let room = tx.lock_room(room_id).await.map_err(|e| classify(e, room_id))?;
        if room.is_none() {
            abandon(tx, room_id).await;
            return Err(BookingError::room_not_found(room_id));
        }

        let overlaps = tx.count_overlaps(room_id, &stay).await.map_err(|e| classify(e, room_id))?;
        if overlaps > 0 {
            abandon(tx, room_id).await;
            return Err(BookingError::RoomNoLongerAvailable { room_id });
        }

        // A failure from here on drops `tx`, which rolls the unit back
        let reservation = tx
            .insert_reservation(&NewReservation {
                first_name: draft.first_name.clone(),
                last_name: draft.last_name.clone(),
                email: draft.email.clone(),
                phone: draft.phone.clone(),
                room_id,
                stay,
            })
            .await
            .map_err(|e| classify(e, room_id))?;

        let restriction = NewRoomRestriction {
            room_id,
            stay,
            reservation_id: Some(reservation.id),
            kind: RestrictionKind::Reservation,
        };
        if let Err(insert_err) = tx.insert_restriction(&restriction).await {
            let cause = classify(insert_err, room_id);
            return match tx.rollback().await {
                Ok(()) => Err(cause),
                Err(rollback_err) => {
                    error!(
                        reservation_id = reservation.id,
                        room_id,
                        %cause,
                        error = %rollback_err,
                        "Rollback failed after restriction insert; reservation may be stored without its restriction"
                    );
                    Err(BookingError::PartialCommitFailure {
                        reservation_id: reservation.id,
                    })
                }
            };
        }

        tx.commit().await.map_err(|e| classify(e, room_id))?;

        info!(reservation_id = reservation.id, room_id, %stay, "Reservation committed");
        Ok(reservation.id)
    }
}

//! Database repository for reservations.

use sqlx::PgConnection;
use tracing::instrument;

use crate::db::{
    errors::Result,
    models::reservations::{NewReservation, Reservation},
};

const RESERVATION_COLUMNS: &str =
    "id, first_name, last_name, email, phone, start_date, end_date, room_id, created_at, updated_at";

pub struct Reservations<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Reservations<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Insert a reservation. Fails with a foreign key violation when the room does not exist.
    #[instrument(skip(self, request), fields(room_id = request.room_id, stay = %request.stay), err)]
    pub async fn create(&mut self, request: &NewReservation) -> Result<Reservation> {
        let reservation = sqlx::query_as::<_, Reservation>(&format!(
            r#"
            INSERT INTO reservations (first_name, last_name, email, phone, start_date, end_date, room_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {RESERVATION_COLUMNS}
            "#
        ))
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(request.stay.start())
        .bind(request.stay.end())
        .bind(request.room_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(reservation)
    }
}

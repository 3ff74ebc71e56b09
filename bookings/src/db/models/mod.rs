//! Database record models matching table schemas.
//!
//! Each model struct matches a table row and derives `sqlx::FromRow`. Insert requests are
//! separate structs so that ids and timestamps are always assigned by the database.
//!
//! - [`rooms`]: the room catalogue (read-only for the booking core)
//! - [`reservations`]: guest reservations
//! - [`room_restrictions`]: date intervals that block a room

pub mod reservations;
pub mod room_restrictions;
pub mod rooms;

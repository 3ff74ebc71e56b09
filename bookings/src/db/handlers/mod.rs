//! Repository implementations for database access.
//!
//! Each repository wraps a `&mut PgConnection` (a pooled connection or an open transaction)
//! and provides strongly typed queries for one table, returning models from
//! [`crate::db::models`]. Callers decide the transaction boundary:
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! let room = Rooms::new(&mut tx).lock_for_update(room_id).await?;
//! let reservation = Reservations::new(&mut tx).create(&request).await?;
//! tx.commit().await?;
//! ```
//!
//! - [`Rooms`]: room catalogue lookups and the per-room write lock
//! - [`Reservations`]: reservation inserts
//! - [`RoomRestrictions`]: restriction inserts and overlap queries

pub mod reservations;
pub mod room_restrictions;
pub mod rooms;

pub use reservations::Reservations;
pub use room_restrictions::RoomRestrictions;
pub use rooms::Rooms;

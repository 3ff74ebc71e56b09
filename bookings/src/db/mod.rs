//! Database layer for data persistence and access.
//!
//! This module implements the PostgreSQL side of the interval store using SQLx. It follows the
//! Repository pattern: each table has a repository in [`handlers`] that borrows a connection or
//! transaction and returns records from [`models`].
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐
//! │ IntervalStore │  (store::postgres - timeouts, write units)
//! └──────┬────────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - queries)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - database records)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │  PostgreSQL │
//! └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`handlers`]: Repository implementations
//! - [`models`]: Database record structures matching table schemas
//! - [`errors`]: Store-level error types
//!
//! # Transactions
//!
//! Reads may run on a pooled connection. Writes run inside one transaction so that the room
//! lock, the overlap re-check and both inserts commit or roll back together:
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! Rooms::new(&mut tx).lock_for_update(room_id).await?;
//! let clashes = RoomRestrictions::new(&mut tx).count_overlapping(room_id, &stay).await?;
//! // ... inserts ...
//! tx.commit().await?;
//! ```
//!
//! # Migrations
//!
//! Migrations live in `migrations/` and are embedded with [`crate::migrator`]:
//!
//! ```ignore
//! bookings::migrator().run(&pool).await?;
//! ```

pub mod errors;
pub mod handlers;
pub mod models;

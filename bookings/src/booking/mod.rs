//! The availability and reservation consistency engine.
//!
//! - [`AvailabilityChecker`]: read-only answers to "is this room free?" and "which rooms are
//!   free?" for a half-open stay.
//! - [`ReservationCommitter`]: the only path by which new restrictions enter the store. It
//!   re-validates availability inside a write unit that serialises writers per room.
//! - [`workflow`]: the search, choose, details and confirm sequence, with its state kept in
//!   the session.
//!
//! All three share one `Arc<dyn IntervalStore>` built at startup.

pub mod availability;
pub mod committer;
pub mod error;
pub mod workflow;

pub use availability::AvailabilityChecker;
pub use committer::{ReservationCommitter, ReservationDraft};
pub use error::BookingError;
pub use workflow::BookingWorkflow;

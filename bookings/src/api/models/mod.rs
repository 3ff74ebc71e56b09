//! JSON views and form payloads for the booking site.
//!
//! Every page is served as a JSON "view" document rather than rendered HTML. Views that follow
//! a redirect carry the session's pending [`pages::Messages`], which are popped as the view is
//! built. Dates cross the boundary as `YYYY-MM-DD` strings.
//!
//! - [`pages`]: home and search pages, flash messages
//! - [`rooms`]: the room catalogue
//! - [`availability`]: search form, search results and the JSON availability check
//! - [`reservations`]: guest details form, direct booking entry and the confirmation summary

pub mod availability;
pub mod pages;
pub mod reservations;
pub mod rooms;

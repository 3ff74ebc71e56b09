//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers, one module per area
//! - **[`models`]**: Form inputs and the JSON view documents returned to the browser
//!
//! # API Structure
//!
//! - **Pages** (`/`): Home page and flash messages
//! - **Rooms** (`/rooms`, `/rooms/{id}`): The room catalogue
//! - **Availability** (`/search-availability`, `/search-availability-json`): Date range search
//!   and the single-room check used by room pages
//! - **Reservations** (`/choose-room/{id}`, `/book-room`, `/make-reservation`,
//!   `/reservation-summary`): The session-backed booking steps
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with `utoipa` annotations. The document is served at
//! `/api-docs/openapi.json` and rendered at `/docs`.

pub mod handlers;
pub mod models;

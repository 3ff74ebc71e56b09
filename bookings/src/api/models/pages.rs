//! Views for static pages and the flash messages they carry.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::session::Session;

/// Pending flash messages, removed from the session when a view is built
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Messages {
    /// Informational message from the previous step
    #[schema(example = "Reservation saved")]
    pub flash: Option<String>,
    /// Error message from the previous step
    #[schema(example = "No availability")]
    pub error: Option<String>,
}

impl Messages {
    pub async fn take(session: &Session) -> Self {
        let (flash, error) = session.take_messages().await;
        Self { flash, error }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HomeView {
    #[schema(example = "Fort Smythe Bed and Breakfast")]
    pub property: String,
    #[serde(flatten)]
    pub messages: Messages,
}

/// The availability search page
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SearchView {
    /// Form fields the search expects
    pub fields: Vec<String>,
    #[serde(flatten)]
    pub messages: Messages,
}

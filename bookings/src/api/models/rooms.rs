use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{db::models::rooms::Room, types::RoomId};

/// A bookable room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RoomResponse {
    #[schema(example = 1)]
    pub id: RoomId,
    #[schema(example = "General's Quarters")]
    pub room_name: String,
}

impl From<Room> for RoomResponse {
    fn from(room: Room) -> Self {
        Self {
            id: room.id,
            room_name: room.room_name,
        }
    }
}

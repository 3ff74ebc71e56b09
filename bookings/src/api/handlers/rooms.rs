use axum::{
    Json,
    extract::{Path, State},
};

use crate::{
    AppState,
    api::models::rooms::RoomResponse,
    errors::Result,
    types::parse_room_id,
};

#[utoipa::path(
    get,
    path = "/rooms",
    tag = "rooms",
    summary = "List rooms",
    responses(
        (status = 200, description = "All rooms ordered by id", body = Vec<RoomResponse>),
        (status = 503, description = "Store unavailable"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_rooms(State(state): State<AppState>) -> Result<Json<Vec<RoomResponse>>> {
    let rooms = state.workflow.checker().rooms().await?;
    Ok(Json(rooms.into_iter().map(RoomResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/rooms/{id}",
    tag = "rooms",
    summary = "Get room",
    params(
        ("id" = i64, Path, description = "Room id"),
    ),
    responses(
        (status = 200, description = "Room details", body = RoomResponse),
        (status = 400, description = "Room id is not a number"),
        (status = 404, description = "No such room"),
        (status = 503, description = "Store unavailable"),
    )
)]
#[tracing::instrument(skip(state))]
pub async fn get_room(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<RoomResponse>> {
    let room_id = parse_room_id("id", &id)?;
    let room = state.workflow.checker().room(room_id).await?;
    Ok(Json(room.into()))
}


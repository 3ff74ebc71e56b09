use axum::{Json, extract::State};

use crate::{
    AppState,
    api::models::pages::{HomeView, Messages},
    session::Session,
};

#[utoipa::path(
    get,
    path = "/",
    tag = "pages",
    summary = "Home page",
    responses(
        (status = 200, description = "Home view with any pending messages", body = HomeView),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn home(State(state): State<AppState>, session: Session) -> Json<HomeView> {
    Json(HomeView {
        property: state.config.email.from_name.clone(),
        messages: Messages::take(&session).await,
    })
}

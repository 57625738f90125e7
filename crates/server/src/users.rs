//! Self-registration of the calling identity.

use axum::{Extension, Json, extract::State, http::StatusCode};

use api_types::user::{UserCreated, UserNew};

use crate::{
    ServerError,
    server::{CurrentUser, ServerState},
};

pub async fn register(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Json(payload): Json<UserNew>,
) -> Result<(StatusCode, Json<UserCreated>), ServerError> {
    state
        .engine
        .create_user(&user_id, &payload.display_name)
        .await?;
    Ok((StatusCode::CREATED, Json(UserCreated { id: user_id })))
}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{PublicUser, UpdateUserRequest},
    repo::User,
};
use crate::{
    auth::{
        jwt::AuthUser,
        password::{is_valid_email, normalize_email},
    },
    error::{AppError, AppResult},
    scans::repo::FoodScan,
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new().route(
        "/users/:user_id",
        get(get_user).put(update_user).delete(delete_user),
    )
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<PublicUser>> {
    auth.ensure_owner(user_id)?;
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> AppResult<Json<PublicUser>> {
    auth.ensure_owner(user_id)?;

    let email = payload.email.as_deref().map(normalize_email);
    if let Some(email) = email.as_deref() {
        if !is_valid_email(email) {
            return Err(AppError::BadRequest("Invalid email".into()));
        }
        if let Some(other) = User::find_by_email(&state.db, email).await? {
            if other.id != user_id {
                warn!(%user_id, "email already registered");
                return Err(AppError::Conflict("Email already registered".into()));
            }
        }
    }
    let display_name = payload
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let user = User::update_profile(&state.db, user_id, email.as_deref(), display_name)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    info!(%user_id, "user profile updated");
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    auth.ensure_owner(user_id)?;

    // keys first: the scan rows go with the user
    let keys = FoodScan::image_keys_by_user(&state.db, user_id).await?;
    if !User::delete(&state.db, user_id).await? {
        return Err(AppError::NotFound("User not found".into()));
    }

    for key in &keys {
        if let Err(e) = state.storage.delete_object(key).await {
            warn!(error = %e, %key, "failed to delete scan image");
        }
    }
    info!(%user_id, images = keys.len(), "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

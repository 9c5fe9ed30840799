use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{clean_tags, DietaryProfileResponse, PutDietaryProfileRequest},
    repo::DietaryProfile,
};
use crate::{
    auth::jwt::AuthUser,
    error::{AppError, AppResult},
    state::AppState,
};

pub fn profile_routes() -> Router<AppState> {
    Router::new().route(
        "/users/:user_id/dietary-profile",
        get(get_profile).put(put_profile),
    )
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<DietaryProfileResponse>> {
    auth.ensure_owner(user_id)?;
    let profile = DietaryProfile::get_or_create(&state.db, user_id).await?;
    Ok(Json(profile.into()))
}

#[instrument(skip(state, payload))]
pub async fn put_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<PutDietaryProfileRequest>,
) -> AppResult<Json<DietaryProfileResponse>> {
    auth.ensure_owner(user_id)?;

    let allergies = clean_tags(payload.allergies).map_err(AppError::BadRequest)?;
    let preferences = clean_tags(payload.dietary_preferences).map_err(AppError::BadRequest)?;
    let health = clean_tags(payload.health_restrictions).map_err(AppError::BadRequest)?;

    let profile =
        DietaryProfile::upsert(&state.db, user_id, &allergies, &preferences, &health).await?;
    info!(
        %user_id,
        allergies = profile.allergies.len(),
        preferences = profile.dietary_preferences.len(),
        health = profile.health_restrictions.len(),
        "dietary profile replaced"
    );
    Ok(Json(profile.into()))
}

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{check_food_safety, SafetyVerdict};
use crate::{
    auth::jwt::AuthUser,
    error::{AppError, AppResult},
    profiles::repo::DietaryProfile,
    state::AppState,
};

pub const MAX_INGREDIENTS: usize = 200;

#[derive(Debug, Deserialize)]
pub struct CheckIngredientsRequest {
    #[serde(default)]
    pub food_name: String,
    pub ingredients: Vec<String>,
}

pub fn check_routes() -> Router<AppState> {
    Router::new().route("/check-ingredients", post(check_ingredients))
}

/// Runs the matcher against the caller's own profile without spending a scan.
#[instrument(skip(state, payload))]
pub async fn check_ingredients(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CheckIngredientsRequest>,
) -> AppResult<Json<SafetyVerdict>> {
    if payload.ingredients.len() > MAX_INGREDIENTS {
        return Err(AppError::BadRequest(format!(
            "At most {} ingredients per request",
            MAX_INGREDIENTS
        )));
    }
    let profile = DietaryProfile::get_or_create(&state.db, user_id).await?;
    let verdict = check_food_safety(&payload.food_name, &payload.ingredients, profile.restrictions());
    debug!(%user_id, is_safe = ?verdict.is_safe, "ingredients checked");
    Ok(Json(verdict))
}

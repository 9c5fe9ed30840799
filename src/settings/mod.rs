//! Per-user model selection.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::jwt::AuthUser,
    config::LlmConfig,
    error::{AppError, AppResult},
    state::AppState,
    users::repo::User,
};

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
    pub default_model: String,
}

#[derive(Debug, Serialize)]
pub struct ModelSelection {
    pub model: String,
    pub is_default: bool,
}

#[derive(Debug, Deserialize)]
pub struct PutModelRequest {
    /// `null` goes back to the default model.
    pub model: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/settings/models", get(list_models))
        .route(
            "/users/:user_id/settings/model",
            get(get_model).put(put_model),
        )
}

/// A stored preference that is no longer allowed falls back to the default.
pub fn effective_model(cfg: &LlmConfig, preferred: Option<&str>) -> ModelSelection {
    match preferred {
        Some(m) if cfg.is_allowed(m) => ModelSelection {
            model: m.to_string(),
            is_default: m == cfg.default_model,
        },
        _ => ModelSelection {
            model: cfg.default_model.clone(),
            is_default: true,
        },
    }
}

/// Model to use for this user's LLM calls.
pub async fn resolve_model(state: &AppState, user_id: Uuid) -> String {
    let preferred = match User::find_by_id(&state.db, user_id).await {
        Ok(u) => u.and_then(|u| u.preferred_model),
        Err(e) => {
            warn!(error = %e, %user_id, "could not load model preference; using default");
            None
        }
    };
    effective_model(&state.config.llm, preferred.as_deref()).model
}

#[instrument(skip(state))]
pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: state.config.llm.models.clone(),
        default_model: state.config.llm.default_model.clone(),
    })
}

#[instrument(skip(state))]
pub async fn get_model(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<ModelSelection>> {
    auth.ensure_owner(user_id)?;
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(Json(effective_model(&state.config.llm, user.preferred_model.as_deref())))
}

#[instrument(skip(state, payload))]
pub async fn put_model(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<PutModelRequest>,
) -> AppResult<Json<ModelSelection>> {
    auth.ensure_owner(user_id)?;

    let model = payload.model.as_deref().map(str::trim).filter(|m| !m.is_empty());
    if let Some(m) = model {
        if !state.config.llm.is_allowed(m) {
            return Err(AppError::BadRequest(format!("Unknown model: {}", m)));
        }
    }

    if !User::set_preferred_model(&state.db, user_id, model).await? {
        return Err(AppError::NotFound("User not found".into()));
    }
    info!(%user_id, model = ?model, "model preference updated");
    Ok(Json(effective_model(&state.config.llm, model)))
}

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use super::repo::ScanLimit;
use crate::{auth::jwt::AuthUser, error::AppResult, state::AppState};

#[derive(Debug, Serialize)]
pub struct ScanLimitResponse {
    pub user_id: Uuid,
    pub scans_used: i32,
    pub max_scans: i32,
    pub scans_remaining: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub reset_date: OffsetDateTime,
}

impl From<ScanLimit> for ScanLimitResponse {
    fn from(l: ScanLimit) -> Self {
        Self {
            scans_remaining: l.remaining(),
            user_id: l.user_id,
            scans_used: l.scans_used,
            max_scans: l.max_scans,
            reset_date: l.reset_date,
        }
    }
}

pub fn limit_routes() -> Router<AppState> {
    Router::new().route("/users/:user_id/scan-limit", get(get_limit))
}

#[instrument(skip(state))]
pub async fn get_limit(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<ScanLimitResponse>> {
    auth.ensure_owner(user_id)?;
    let limit =
        ScanLimit::get_or_create(&state.db, user_id, state.config.scans.max_scans_per_month).await?;
    Ok(Json(limit.into()))
}

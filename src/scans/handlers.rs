use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{Pagination, ScanResponse, ScanStatsResponse},
    repo::FoodScan,
    services::{ingest_scan, read_image, to_response, AnalysisMode},
};
use crate::{
    auth::jwt::AuthUser,
    error::{AppError, AppResult},
    limits::repo::{month_start, ScanLimit},
    state::AppState,
    storage::IMAGE_URL_TTL_SECS,
};

/// Room for multipart framing around the image itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/users/:user_id/scans", get(list_scans))
        .route("/users/:user_id/scans/stats", get(scan_stats))
        .route("/users/:user_id/scans/:scan_id", get(get_scan).delete(delete_scan))
        .route("/users/:user_id/scans/:scan_id/image", get(get_scan_image))
}

pub fn write_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/users/:user_id/scans", post(upload_scan))
        .route("/users/:user_id/scans/analyze", post(analyze_scan))
        .layer(DefaultBodyLimit::max(max_upload_bytes + MULTIPART_OVERHEAD))
}

#[instrument(skip(state))]
pub async fn list_scans(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
    Query(p): Query<Pagination>,
) -> AppResult<Json<Vec<ScanResponse>>> {
    auth.ensure_owner(user_id)?;
    let (limit, offset) = p.clamped();
    let scans = FoodScan::list_by_user(&state.db, user_id, limit, offset).await?;
    let mut items = Vec::with_capacity(scans.len());
    for scan in scans {
        items.push(to_response(&state, scan).await);
    }
    Ok(Json(items))
}

#[instrument(skip(state))]
pub async fn get_scan(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((user_id, scan_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ScanResponse>> {
    auth.ensure_owner(user_id)?;
    let scan = FoodScan::get(&state.db, user_id, scan_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Scan not found".into()))?;
    Ok(Json(to_response(&state, scan).await))
}

#[instrument(skip(state))]
pub async fn delete_scan(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((user_id, scan_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    auth.ensure_owner(user_id)?;
    let key = FoodScan::delete(&state.db, user_id, scan_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Scan not found".into()))?;
    if let Err(e) = state.storage.delete_object(&key).await {
        warn!(error = %e, %key, "failed to delete scan image");
    }
    info!(%user_id, %scan_id, "scan deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// 302 to a presigned URL of the scan image.
#[instrument(skip(state))]
pub async fn get_scan_image(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((user_id, scan_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Redirect> {
    auth.ensure_owner(user_id)?;
    let scan = FoodScan::get(&state.db, user_id, scan_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Scan not found".into()))?;
    let url = state.storage.presign_get(&scan.image_key, IMAGE_URL_TTL_SECS).await?;
    Ok(Redirect::temporary(&url))
}

#[instrument(skip(state))]
pub async fn scan_stats(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<ScanStatsResponse>> {
    auth.ensure_owner(user_id)?;
    let limit =
        ScanLimit::get_or_create(&state.db, user_id, state.config.scans.max_scans_per_month).await?;
    let counts =
        FoodScan::counts(&state.db, user_id, month_start(OffsetDateTime::now_utc())).await?;
    Ok(Json(ScanStatsResponse::new(counts, &limit)))
}

async fn create_scan(
    state: AppState,
    auth: AuthUser,
    user_id: Uuid,
    mut mp: Multipart,
    mode: AnalysisMode,
) -> AppResult<(StatusCode, HeaderMap, Json<ScanResponse>)> {
    auth.ensure_owner(user_id)?;
    let image = read_image(&mut mp, state.config.scans.max_upload_bytes).await?;
    let scan = ingest_scan(&state, user_id, image, mode).await?;
    info!(%user_id, scan_id = %scan.id, ?mode, status = %scan.status, "scan created");

    let mut headers = HeaderMap::new();
    if let Ok(location) =
        HeaderValue::from_str(&format!("/api/users/{}/scans/{}", user_id, scan.id))
    {
        headers.insert(header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(to_response(&state, scan).await)))
}

/// POST multipart `image`; the scan comes back pending and is analyzed in
/// the background. Clients poll `GET .../scans/:scan_id`.
#[instrument(skip(state, mp))]
pub async fn upload_scan(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
    mp: Multipart,
) -> AppResult<(StatusCode, HeaderMap, Json<ScanResponse>)> {
    create_scan(state, auth, user_id, mp, AnalysisMode::Background).await
}

/// POST multipart `image`; responds once the analysis is stored.
#[instrument(skip(state, mp))]
pub async fn analyze_scan(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
    mp: Multipart,
) -> AppResult<(StatusCode, HeaderMap, Json<ScanResponse>)> {
    create_scan(state, auth, user_id, mp, AnalysisMode::Inline).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, extract::FromRef, http::Request};
    use tower::ServiceExt;

    use crate::{auth::jwt::JwtKeys, config::DEFAULT_MAX_UPLOAD_BYTES};

    fn multipart_body(boundary: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"image\"; filename=\"food.bin\"\r\n",
        );
        body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        body
    }

    fn app(state: AppState) -> Router {
        read_routes().merge(write_routes(DEFAULT_MAX_UPLOAD_BYTES)).with_state(state)
    }

    #[tokio::test]
    async fn list_requires_auth() {
        let res = app(AppState::fake())
            .oneshot(
                Request::get(format!("/users/{}/scans", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn cannot_read_other_users_scan() {
        let state = AppState::fake();
        let token = JwtKeys::from_ref(&state).sign_access(Uuid::new_v4()).unwrap();
        let res = app(state)
            .oneshot(
                Request::get(format!("/users/{}/scans/{}", Uuid::new_v4(), Uuid::new_v4()))
                    .header("authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn cannot_upload_for_other_user() {
        let state = AppState::fake();
        let token = JwtKeys::from_ref(&state).sign_access(Uuid::new_v4()).unwrap();
        let boundary = "XBOUNDARY";
        let res = app(state)
            .oneshot(
                Request::post(format!("/users/{}/scans", Uuid::new_v4()))
                    .header("authorization", format!("Bearer {token}"))
                    .header("content-type", format!("multipart/form-data; boundary={boundary}"))
                    .body(Body::from(multipart_body(boundary, "image/png", b"png")))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn upload_rejects_non_image() {
        let state = AppState::fake();
        let me = Uuid::new_v4();
        let token = JwtKeys::from_ref(&state).sign_access(me).unwrap();
        let boundary = "XBOUNDARY";
        let res = app(state)
            .oneshot(
                Request::post(format!("/users/{me}/scans"))
                    .header("authorization", format!("Bearer {token}"))
                    .header("content-type", format!("multipart/form-data; boundary={boundary}"))
                    .body(Body::from(multipart_body(boundary, "application/pdf", b"%PDF")))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upload_rejects_oversized_image() {
        let state = AppState::fake_with(|cfg| cfg.scans.max_upload_bytes = 16);
        let me = Uuid::new_v4();
        let token = JwtKeys::from_ref(&state).sign_access(me).unwrap();
        let boundary = "XBOUNDARY";
        let res = app(state)
            .oneshot(
                Request::post(format!("/users/{me}/scans/analyze"))
                    .header("authorization", format!("Bearer {token}"))
                    .header("content-type", format!("multipart/form-data; boundary={boundary}"))
                    .body(Body::from(multipart_body(boundary, "image/jpeg", &[0u8; 64])))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn upload_without_image_field_is_bad_request() {
        let state = AppState::fake();
        let me = Uuid::new_v4();
        let token = JwtKeys::from_ref(&state).sign_access(me).unwrap();
        let boundary = "XBOUNDARY";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n--{boundary}--\r\n"
        );
        let res = app(state)
            .oneshot(
                Request::post(format!("/users/{me}/scans"))
                    .header("authorization", format!("Bearer {token}"))
                    .header("content-type", format!("multipart/form-data; boundary={boundary}"))
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}

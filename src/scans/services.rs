use axum::extract::{multipart::MultipartError, Multipart};
use bytes::Bytes;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::dto::ScanResponse;
use super::repo::{FoodScan, ScanOutcome, STATUS_COMPLETE, STATUS_FAILED};
use crate::{
    error::{AppError, AppResult},
    limits::repo::ScanLimit,
    llm::analyzer::{analyze_food_image, FoodAnalysis, FALLBACK_REASON},
    matcher::check_food_safety,
    profiles::repo::DietaryProfile,
    settings::resolve_model,
    state::AppState,
    storage::{scan_image_key, IMAGE_URL_TTL_SECS},
};

pub const IMAGE_FIELDS: [&str; 2] = ["image", "file"];

#[derive(Debug)]
pub struct UploadedImage {
    pub bytes: Bytes,
    pub content_type: String,
}

/// How the analysis of a new scan is run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisMode {
    /// Respond with a pending scan; a spawned task fills it in later.
    Background,
    /// Analyze before responding.
    Inline,
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == axum::http::StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Image too large".into())
    } else {
        AppError::BadRequest(format!("Invalid upload: {}", e.body_text()))
    }
}

pub fn validate_image(content_type: &str, len: usize, max_bytes: usize) -> AppResult<()> {
    if !content_type.starts_with("image/") {
        return Err(AppError::BadRequest("Only image files are allowed".into()));
    }
    if len == 0 {
        return Err(AppError::BadRequest("Image is empty".into()));
    }
    if len > max_bytes {
        return Err(AppError::PayloadTooLarge(format!(
            "Image too large (max {} bytes)",
            max_bytes
        )));
    }
    Ok(())
}

/// Pulls the first `image` (or `file`) field out of the upload.
pub async fn read_image(mp: &mut Multipart, max_bytes: usize) -> AppResult<UploadedImage> {
    while let Some(field) = mp.next_field().await.map_err(multipart_error)? {
        let is_image = field.name().map(|n| IMAGE_FIELDS.contains(&n)).unwrap_or(false);
        if !is_image {
            continue;
        }
        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        if !content_type.starts_with("image/") {
            return Err(AppError::BadRequest("Only image files are allowed".into()));
        }
        let bytes = field.bytes().await.map_err(multipart_error)?;
        validate_image(&content_type, bytes.len(), max_bytes)?;
        return Ok(UploadedImage { bytes, content_type });
    }
    Err(AppError::BadRequest("image is required".into()))
}

/// Combines the model's report with the matcher's verdict for this profile.
pub fn outcome_for(analysis: FoodAnalysis, profile: &DietaryProfile) -> ScanOutcome {
    let failed = analysis.is_fallback();
    let mut verdict = check_food_safety(
        &analysis.food_name,
        &analysis.ingredients,
        profile.restrictions(),
    )
    .merge_model(analysis.is_safe, &analysis.unsafe_reasons);
    if failed {
        verdict.safety_reason = FALLBACK_REASON.into();
    }

    ScanOutcome {
        food_name: analysis.food_name,
        ingredients: analysis.ingredients,
        verdict,
        description: analysis.description,
        status: if failed { STATUS_FAILED } else { STATUS_COMPLETE },
    }
}

async fn analyze(
    state: &AppState,
    user_id: Uuid,
    profile: &DietaryProfile,
    image: &UploadedImage,
) -> ScanOutcome {
    let model = resolve_model(state, user_id).await;
    let analysis = analyze_food_image(
        state.llm.as_ref(),
        &model,
        &image.bytes,
        &image.content_type,
        profile.restrictions(),
    )
    .await;
    outcome_for(analysis, profile)
}

/// Checks preconditions, spends one scan, stores the image and records the
/// scan. Profile and quota checks come first so a rejected upload costs
/// nothing.
#[instrument(skip(state, image), fields(bytes = image.bytes.len()))]
pub async fn ingest_scan(
    state: &AppState,
    user_id: Uuid,
    image: UploadedImage,
    mode: AnalysisMode,
) -> AppResult<FoodScan> {
    let Some(profile) = DietaryProfile::find_by_user(&state.db, user_id).await? else {
        return Err(AppError::BadRequest(
            "Please set up your dietary profile first".into(),
        ));
    };

    let max = state.config.scans.max_scans_per_month;
    let Some(limit) = ScanLimit::try_consume(&state.db, user_id, max).await? else {
        warn!(%user_id, "monthly scan limit reached");
        return Err(AppError::Forbidden("Monthly scan limit reached".into()));
    };
    info!(%user_id, used = limit.scans_used, max = limit.max_scans, "scan consumed");

    let scan_id = Uuid::new_v4();
    let key = scan_image_key(user_id, scan_id, &image.content_type);
    if let Err(e) = state
        .storage
        .put_object(&key, image.bytes.clone(), &image.content_type)
        .await
    {
        refund(state, user_id).await;
        return Err(e.into());
    }

    let inserted = match mode {
        AnalysisMode::Background => FoodScan::insert_pending(&state.db, scan_id, user_id, &key).await,
        AnalysisMode::Inline => {
            let outcome = analyze(state, user_id, &profile, &image).await;
            FoodScan::insert_complete(&state.db, scan_id, user_id, &key, &outcome).await
        }
    };

    let scan = match inserted {
        Ok(scan) => scan,
        Err(e) => {
            if let Err(del) = state.storage.delete_object(&key).await {
                warn!(error = %del, %key, "orphaned scan image");
            }
            refund(state, user_id).await;
            return Err(e.into());
        }
    };

    if mode == AnalysisMode::Background {
        let state = state.clone();
        tokio::spawn(async move {
            run_background_analysis(state, user_id, scan_id, profile, image).await;
        });
    }

    Ok(scan)
}

async fn refund(state: &AppState, user_id: Uuid) {
    if let Err(e) = ScanLimit::release(&state.db, user_id).await {
        error!(error = %e, %user_id, "failed to refund scan");
    }
}

/// Runs once; failures are logged and not retried.
async fn run_background_analysis(
    state: AppState,
    user_id: Uuid,
    scan_id: Uuid,
    profile: DietaryProfile,
    image: UploadedImage,
) {
    let outcome = analyze(&state, user_id, &profile, &image).await;
    match FoodScan::apply_outcome(&state.db, scan_id, &outcome).await {
        Ok(true) => info!(%scan_id, status = outcome.status, "background analysis stored"),
        Ok(false) => warn!(%scan_id, "scan deleted before analysis finished"),
        Err(e) => error!(error = %e, %scan_id, "failed to store background analysis"),
    }
}

/// Attaches a short-lived image URL; a presign failure only drops the URL.
pub async fn to_response(state: &AppState, scan: FoodScan) -> ScanResponse {
    let url = match state.storage.presign_get(&scan.image_key, IMAGE_URL_TTL_SECS).await {
        Ok(u) => Some(u),
        Err(e) => {
            warn!(error = %e, scan_id = %scan.id, "presign failed");
            None
        }
    };
    ScanResponse::new(scan, url)
}

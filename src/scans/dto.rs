use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::{FoodScan, ScanCounts};
use crate::limits::repo::ScanLimit;

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub food_name: String,
    pub image_url: Option<String>,
    pub ingredients: Vec<String>,
    /// `null` means caution: unknown or still being analyzed.
    pub is_safe: Option<bool>,
    pub safety_reason: String,
    pub unsafe_reasons: Vec<String>,
    pub description: String,
    pub status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub scanned_at: OffsetDateTime,
}

impl ScanResponse {
    pub fn new(scan: FoodScan, image_url: Option<String>) -> Self {
        Self {
            id: scan.id,
            user_id: scan.user_id,
            food_name: scan.food_name,
            image_url,
            ingredients: scan.ingredients,
            is_safe: scan.is_safe,
            safety_reason: scan.safety_reason,
            unsafe_reasons: scan.unsafe_reasons,
            description: scan.description,
            status: scan.status,
            scanned_at: scan.scanned_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ScanStatsResponse {
    pub total: i64,
    pub safe: i64,
    #[serde(rename = "unsafe")]
    pub unsafe_count: i64,
    pub caution: i64,
    pub pending: i64,
    pub this_month: i64,
    pub scans_used: i32,
    pub max_scans: i32,
    pub scans_remaining: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub reset_date: OffsetDateTime,
}

impl ScanStatsResponse {
    pub fn new(counts: ScanCounts, limit: &ScanLimit) -> Self {
        Self {
            total: counts.total,
            safe: counts.safe_count,
            unsafe_count: counts.unsafe_count,
            caution: counts.caution_count,
            pending: counts.pending_count,
            this_month: counts.this_month,
            scans_used: limit.scans_used,
            max_scans: limit.max_scans,
            scans_remaining: limit.remaining(),
            reset_date: limit.reset_date,
        }
    }
}

pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}
fn default_limit() -> i64 { 20 }

impl Pagination {
    pub fn clamped(&self) -> (i64, i64) {
        (self.limit.clamp(1, MAX_PAGE_SIZE), self.offset.max(0))
    }
}

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::DietaryProfile;

#[derive(Debug, Serialize)]
pub struct DietaryProfileResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub allergies: Vec<String>,
    pub dietary_preferences: Vec<String>,
    pub health_restrictions: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<DietaryProfile> for DietaryProfileResponse {
    fn from(p: DietaryProfile) -> Self {
        Self {
            id: p.id,
            user_id: p.user_id,
            allergies: p.allergies,
            dietary_preferences: p.dietary_preferences,
            health_restrictions: p.health_restrictions,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// Replaces all three lists; a missing list becomes empty.
#[derive(Debug, Deserialize)]
pub struct PutDietaryProfileRequest {
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub dietary_preferences: Vec<String>,
    #[serde(default)]
    pub health_restrictions: Vec<String>,
}

pub const MAX_TAGS_PER_LIST: usize = 50;
pub const MAX_TAG_LEN: usize = 64;

/// Trim, drop blanks and case-insensitive duplicates, keep first spelling.
pub fn clean_tags(tags: Vec<String>) -> Result<Vec<String>, String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() {
            continue;
        }
        if tag.chars().count() > MAX_TAG_LEN {
            return Err(format!("Tag too long: {}", tag));
        }
        if !out.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            out.push(tag.to_string());
        }
    }
    if out.len() > MAX_TAGS_PER_LIST {
        return Err(format!("At most {} tags per list", MAX_TAGS_PER_LIST));
    }
    Ok(out)
}

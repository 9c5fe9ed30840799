use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// S3-compatible object storage holding the scan images.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub default_model: String,
    pub models: Vec<String>,
    pub timeout_secs: u64,
}

impl LlmConfig {
    pub fn is_allowed(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    pub max_scans_per_month: i32,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub llm: LlmConfig,
    pub scans: ScanConfig,
    /// Accept `x-user-id` when no bearer token is sent. Development only.
    pub dev_auth_fallback: bool,
}

pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";
pub const DEFAULT_MAX_SCANS: i32 = 10;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "caneatthis".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "caneatthis-users".into()),
            ttl_minutes: parse_or("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: parse_or("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };
        let storage = StorageConfig {
            endpoint: std::env::var("STORAGE_ENDPOINT")?,
            bucket: std::env::var("STORAGE_BUCKET").unwrap_or_else(|_| "food-images".into()),
            access_key: std::env::var("STORAGE_ACCESS_KEY")?,
            secret_key: std::env::var("STORAGE_SECRET_KEY")?,
            region: std::env::var("STORAGE_REGION").unwrap_or_else(|_| "us-east-1".into()),
        };

        let default_model =
            std::env::var("OPENROUTER_DEFAULT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());
        let models = std::env::var("OPENROUTER_MODELS")
            .map(|v| split_models(&v, &default_model))
            .unwrap_or_else(|_| vec![default_model.clone()]);
        let llm = LlmConfig {
            api_key: std::env::var("OPENROUTER_API_KEY")?,
            base_url: std::env::var("OPENROUTER_BASE_URL")
                .unwrap_or_else(|_| "https://openrouter.ai/api/v1".into()),
            default_model,
            models,
            timeout_secs: parse_or("OPENROUTER_TIMEOUT_SECS", 60),
        };

        let scans = ScanConfig {
            max_scans_per_month: parse_or("MAX_SCANS_PER_MONTH", DEFAULT_MAX_SCANS),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
        };

        let dev_auth_fallback = std::env::var("DEV_AUTH_FALLBACK")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        if dev_auth_fallback {
            tracing::warn!("DEV_AUTH_FALLBACK enabled; x-user-id header is trusted");
        }

        Ok(Self {
            database_url,
            jwt,
            storage,
            llm,
            scans,
            dev_auth_fallback,
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Comma separated model ids; the default model is always allowed.
fn split_models(raw: &str, default_model: &str) -> Vec<String> {
    let mut models: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    if !models.iter().any(|m| m == default_model) {
        models.insert(0, default_model.to_string());
    }
    models
}

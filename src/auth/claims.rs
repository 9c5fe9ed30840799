use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Which of the two tokens a JWT is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Payload shared by access and refresh tokens. `sub` is the user id that
/// profiles, scans and scan limits hang off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    pub kind: TokenKind,
}

impl Claims {
    pub fn new(
        user_id: Uuid,
        kind: TokenKind,
        issued_at: OffsetDateTime,
        ttl: Duration,
        issuer: &str,
        audience: &str,
    ) -> Self {
        let iat = issued_at.unix_timestamp();
        Self {
            sub: user_id,
            iat,
            exp: iat + ttl.as_secs() as i64,
            iss: issuer.to_string(),
            aud: audience.to_string(),
            kind,
        }
    }

    pub fn is_access(&self) -> bool {
        self.kind == TokenKind::Access
    }
}

//! Token issuer: access JWT plus opaque refresh token
//!
//! Refresh tokens are 64 random alphanumeric characters (about 381 bits).
//! Only a peppered SHA-256 of the raw value is persisted; the hash is
//! deterministic so the rotator can look records up by it.

use chrono::{DateTime, Duration, Utc};
use rand::{Rng, distributions::Alphanumeric};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{error::AuthResult, jwt::JwtService, models::RefreshToken};

const REFRESH_TOKEN_LEN: usize = 64;

/// Token pair handed back to the caller
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token expiry
    pub expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Freshly minted pair and the record to persist for its refresh token
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub pair: TokenPair,
    pub record: RefreshToken,
}

/// Mints access and refresh tokens
#[derive(Clone)]
pub struct TokenIssuer {
    jwt: JwtService,
    refresh_token_ttl: Duration,
    pepper: String,
}

impl TokenIssuer {
    pub fn new(jwt: JwtService, refresh_token_ttl: Duration, pepper: impl Into<String>) -> Self {
        Self {
            jwt,
            refresh_token_ttl,
            pepper: pepper.into(),
        }
    }

    /// Mint a pair for `user_id`. Nothing is persisted here.
    pub fn issue(&self, user_id: Uuid, login: &str, now: DateTime<Utc>) -> AuthResult<IssuedTokens> {
        let access = self.jwt.generate_access_token(user_id, login, now)?;
        let raw = generate_refresh_token();
        let refresh_expires_at = now + self.refresh_token_ttl;

        let record = RefreshToken {
            id: Uuid::new_v4(),
            user_id,
            token_hash: self.hash_refresh_token(&raw),
            created_at: now,
            expires_at: refresh_expires_at,
            revoked_at: None,
            replaced_by: None,
        };

        Ok(IssuedTokens {
            pair: TokenPair {
                access_token: access.token,
                refresh_token: raw,
                expires_at: access.expires_at,
                refresh_expires_at,
            },
            record,
        })
    }

    /// Hex SHA-256 of pepper followed by the raw token
    pub fn hash_refresh_token(&self, raw: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.pepper.as_bytes());
        hasher.update(raw.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

fn generate_refresh_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REFRESH_TOKEN_LEN)
        .map(char::from)
        .collect()
}

//! JWT service for access token generation and validation
//!
//! Access tokens are signed either with RS256 (PEM key pair) or HS256
//! (shared secret). They only assert identity; permissions are resolved per
//! request from the authorization context cache.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Signing material for access tokens
#[derive(Clone)]
pub enum KeyMaterial {
    /// HS256 shared secret
    Secret(String),
    /// RS256 key pair in PEM format
    RsaPem {
        private_key: String,
        public_key: String,
    },
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyMaterial::Secret(_) => f.write_str("Secret(..)"),
            KeyMaterial::RsaPem { .. } => f.write_str("RsaPem(..)"),
        }
    }
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub key_material: KeyMaterial,
    /// Access token lifetime
    pub access_token_ttl: Duration,
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_SECRET`: HS256 secret; takes precedence when set
    /// - `JWT_PRIVATE_KEY`: RS256 private key (PEM) or path to a PEM file
    /// - `JWT_PUBLIC_KEY`: RS256 public key (PEM) or path to a PEM file
    pub fn from_env(access_token_ttl: Duration) -> Result<Self> {
        match std::env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => {
                return Ok(JwtConfig {
                    key_material: KeyMaterial::Secret(secret),
                    access_token_ttl,
                });
            }
            _ => {}
        }

        let private_key = read_pem_var("JWT_PRIVATE_KEY")?;
        let public_key = read_pem_var("JWT_PUBLIC_KEY")?;

        Ok(JwtConfig {
            key_material: KeyMaterial::RsaPem {
                private_key,
                public_key,
            },
            access_token_ttl,
        })
    }
}

/// Read a PEM value, treating anything that is not inline PEM as a file path
fn read_pem_var(name: &str) -> Result<String> {
    let value = std::env::var(name)
        .map_err(|_| anyhow::anyhow!("{} environment variable not set", name))?;

    if value.starts_with("-----BEGIN") {
        return Ok(value);
    }

    let pem = std::fs::read_to_string(&value)
        .map_err(|e| anyhow::anyhow!("Failed to read {} file: {}", name, e))?;
    Ok(pem.trim().to_string())
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    /// Login identifier at issue time
    pub login: String,
    /// Issued at time
    pub iat: i64,
    /// Expiration time
    pub exp: i64,
}

/// Signed access token with its expiry
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    validation: Validation,
    access_token_ttl: Duration,
}

impl JwtService {
    /// Initialize a new JWT service
    pub fn new(config: JwtConfig) -> Result<Self> {
        let (algorithm, encoding_key, decoding_key) = match &config.key_material {
            KeyMaterial::Secret(secret) => (
                Algorithm::HS256,
                EncodingKey::from_secret(secret.as_bytes()),
                DecodingKey::from_secret(secret.as_bytes()),
            ),
            KeyMaterial::RsaPem {
                private_key,
                public_key,
            } => (
                Algorithm::RS256,
                EncodingKey::from_rsa_pem(private_key.as_bytes())?,
                DecodingKey::from_rsa_pem(public_key.as_bytes())?,
            ),
        };

        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;
        validation.leeway = 0;

        Ok(JwtService {
            encoding_key,
            decoding_key,
            algorithm,
            validation,
            access_token_ttl: config.access_token_ttl,
        })
    }

    /// Generate an access token for a user
    pub fn generate_access_token(
        &self,
        user_id: Uuid,
        login: &str,
        now: DateTime<Utc>,
    ) -> Result<AccessToken> {
        let expires_at = now + self.access_token_ttl;
        let claims = Claims {
            sub: user_id,
            login: login.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)?;
        Ok(AccessToken { token, expires_at })
    }

    /// Validate a token's signature and expiry and return the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }
}

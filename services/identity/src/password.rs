//! Password hashing with argon2
//!
//! Hashing and verification run on the blocking pool so a login does not
//! stall the async workers.

use anyhow::Result;
use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::SaltString,
};

/// Compared against when the login identifier is unknown, so that path
/// costs the same as a real mismatch.
const DUMMY_PASSWORD: &str = "identity-dummy-password";

/// Argon2 hasher plus the dummy hash used for unknown accounts
#[derive(Clone)]
pub struct PasswordService {
    argon2: Argon2<'static>,
    dummy_hash: String,
}

impl PasswordService {
    /// Argon2id with the crate's default cost
    pub fn new() -> Result<Self> {
        Self::with_params(Params::default())
    }

    /// Argon2id with explicit cost parameters
    pub fn with_params(params: Params) -> Result<Self> {
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let dummy_hash = hash_with(&argon2, DUMMY_PASSWORD)?;
        Ok(Self { argon2, dummy_hash })
    }

    /// Hash a plaintext password into a PHC string
    pub async fn hash(&self, password: &str) -> Result<String> {
        let argon2 = self.argon2.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hash_with(&argon2, &password)).await?
    }

    /// Verify a password against a stored PHC string
    pub async fn verify(&self, password: &str, stored_hash: &str) -> Result<bool> {
        let argon2 = self.argon2.clone();
        let password = password.to_string();
        let stored_hash = stored_hash.to_string();
        tokio::task::spawn_blocking(move || verify_with(&argon2, &password, &stored_hash)).await?
    }

    /// Burn one verification against the dummy hash; the result is discarded.
    pub async fn verify_dummy(&self, password: &str) -> Result<()> {
        self.verify(password, &self.dummy_hash).await?;
        Ok(())
    }
}

fn hash_with(argon2: &Argon2<'_>, password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();
    Ok(hash)
}

fn verify_with(argon2: &Argon2<'_>, password: &str, stored_hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(stored_hash)
        .map_err(|e| anyhow::anyhow!("Failed to parse password hash: {}", e))?;

    Ok(argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

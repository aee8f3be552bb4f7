//! Security settings for the identity service
//!
//! Values are read from `AUTH_*` environment variables through the `config`
//! crate, falling back to the defaults below.

use anyhow::Result;
use chrono::Duration;
use config::{Config, Environment};
use serde::Deserialize;

/// Security settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Access token lifetime in minutes
    pub expiration_minutes: i64,
    /// Refresh token lifetime in days
    pub refresh_token_days: i64,
    /// Failed attempts per identifier before the account is locked
    pub max_failed_attempts: u32,
    /// Trailing window for the per-identifier count, in minutes
    pub lockout_minutes: i64,
    /// Failed attempts per source address before logins are throttled
    pub max_failed_attempts_per_ip: u32,
    /// Trailing window for the per-address count, in minutes
    pub ip_window_minutes: i64,
    /// Lifetime of a new password in days; passwords never expire when unset
    pub password_max_age_days: Option<i64>,
    /// Per-request deadline in seconds
    pub request_timeout_secs: u64,
    /// Secret mixed into refresh token hashes
    pub refresh_token_pepper: String,
    /// Address the HTTP server binds to
    pub listen_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            expiration_minutes: 15,
            refresh_token_days: 7,
            max_failed_attempts: 5,
            lockout_minutes: 15,
            max_failed_attempts_per_ip: 20,
            ip_window_minutes: 15,
            password_max_age_days: None,
            request_timeout_secs: 10,
            refresh_token_pepper: String::new(),
            listen_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the environment
    ///
    /// # Environment Variables
    /// - `AUTH_EXPIRATION_MINUTES` (default: 15)
    /// - `AUTH_REFRESH_TOKEN_DAYS` (default: 7)
    /// - `AUTH_MAX_FAILED_ATTEMPTS` (default: 5)
    /// - `AUTH_LOCKOUT_MINUTES` (default: 15)
    /// - `AUTH_MAX_FAILED_ATTEMPTS_PER_IP` (default: 20)
    /// - `AUTH_IP_WINDOW_MINUTES` (default: 15)
    /// - `AUTH_PASSWORD_MAX_AGE_DAYS` (default: unset)
    /// - `AUTH_REQUEST_TIMEOUT_SECS` (default: 10)
    /// - `AUTH_REFRESH_TOKEN_PEPPER` (default: empty)
    /// - `AUTH_LISTEN_ADDR` (default: 0.0.0.0:3000)
    pub fn from_env() -> Result<Self> {
        let defaults = Settings::default();

        let settings = Config::builder()
            .set_default("expiration_minutes", defaults.expiration_minutes)?
            .set_default("refresh_token_days", defaults.refresh_token_days)?
            .set_default("max_failed_attempts", defaults.max_failed_attempts as i64)?
            .set_default("lockout_minutes", defaults.lockout_minutes)?
            .set_default(
                "max_failed_attempts_per_ip",
                defaults.max_failed_attempts_per_ip as i64,
            )?
            .set_default("ip_window_minutes", defaults.ip_window_minutes)?
            .set_default("request_timeout_secs", defaults.request_timeout_secs as i64)?
            .set_default("refresh_token_pepper", defaults.refresh_token_pepper)?
            .set_default("listen_addr", defaults.listen_addr)?
            .add_source(Environment::with_prefix("AUTH").try_parsing(true))
            .build()?;

        let settings: Settings = settings.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.expiration_minutes <= 0 || self.refresh_token_days <= 0 {
            anyhow::bail!("token lifetimes must be positive");
        }
        if self.lockout_minutes <= 0 || self.ip_window_minutes <= 0 {
            anyhow::bail!("lockout windows must be positive");
        }
        if self.max_failed_attempts == 0 || self.max_failed_attempts_per_ip == 0 {
            anyhow::bail!("attempt thresholds must be at least 1");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request timeout must be positive");
        }
        Ok(())
    }

    pub fn access_token_ttl(&self) -> Duration {
        Duration::minutes(self.expiration_minutes)
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::days(self.refresh_token_days)
    }

    pub fn lockout_window(&self) -> Duration {
        Duration::minutes(self.lockout_minutes)
    }

    pub fn ip_window(&self) -> Duration {
        Duration::minutes(self.ip_window_minutes)
    }

    pub fn password_max_age(&self) -> Option<Duration> {
        self.password_max_age_days.map(Duration::days)
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 5] = [
        "AUTH_MAX_FAILED_ATTEMPTS",
        "AUTH_LOCKOUT_MINUTES",
        "AUTH_PASSWORD_MAX_AGE_DAYS",
        "AUTH_EXPIRATION_MINUTES",
        "AUTH_REQUEST_TIMEOUT_SECS",
    ];

    fn clear() {
        for var in VARS {
            unsafe {
                std::env::remove_var(var);
            }
        }
    }

    #[test]
    #[serial]
    fn test_settings_defaults() {
        clear();

        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.expiration_minutes, 15);
        assert_eq!(settings.max_failed_attempts, 5);
        assert_eq!(settings.lockout_minutes, 15);
        assert_eq!(settings.max_failed_attempts_per_ip, 20);
        assert_eq!(settings.password_max_age_days, None);
    }

    #[test]
    #[serial]
    fn test_settings_from_env_with_custom_values() {
        clear();
        unsafe {
            std::env::set_var("AUTH_MAX_FAILED_ATTEMPTS", "3");
            std::env::set_var("AUTH_LOCKOUT_MINUTES", "30");
            std::env::set_var("AUTH_PASSWORD_MAX_AGE_DAYS", "90");
        }

        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.max_failed_attempts, 3);
        assert_eq!(settings.lockout_window(), Duration::minutes(30));
        assert_eq!(settings.password_max_age(), Some(Duration::days(90)));

        clear();
    }

    #[test]
    #[serial]
    fn test_settings_reject_non_positive_lifetime() {
        clear();
        unsafe {
            std::env::set_var("AUTH_EXPIRATION_MINUTES", "0");
        }

        assert!(Settings::from_env().is_err());

        clear();
    }

    #[test]
    #[serial]
    fn test_settings_reject_zero_request_timeout() {
        clear();
        unsafe {
            std::env::set_var("AUTH_REQUEST_TIMEOUT_SECS", "0");
        }

        assert!(Settings::from_env().is_err());

        clear();
    }
}

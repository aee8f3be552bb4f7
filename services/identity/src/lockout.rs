//! Lockout guard for preventing brute force and credential stuffing
//!
//! Two independent counters are read from the attempt ledger: failures per
//! login identifier and failures per source address. Both are trailing
//! windows, so a lock lifts on its own once old failures age out.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::warn;

use crate::{config::Settings, models::NewLoginAttempt, repositories::AttemptLedger};

/// Lockout thresholds
#[derive(Debug, Clone)]
pub struct LockoutPolicy {
    /// Failures per identifier that lock it
    pub max_failed_attempts: u32,
    /// Trailing window for the identifier counter
    pub lockout_window: Duration,
    /// Failures per source address that throttle it
    pub max_failed_attempts_per_source: u32,
    /// Trailing window for the source counter
    pub source_window: Duration,
}

impl From<&Settings> for LockoutPolicy {
    fn from(settings: &Settings) -> Self {
        Self {
            max_failed_attempts: settings.max_failed_attempts,
            lockout_window: settings.lockout_window(),
            max_failed_attempts_per_source: settings.max_failed_attempts_per_ip,
            source_window: settings.ip_window(),
        }
    }
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

/// Lockout guard
#[derive(Clone)]
pub struct LockoutGuard {
    ledger: Arc<dyn AttemptLedger>,
    policy: LockoutPolicy,
}

impl LockoutGuard {
    pub fn new(ledger: Arc<dyn AttemptLedger>, policy: LockoutPolicy) -> Self {
        Self { ledger, policy }
    }

    /// Whether the source address has too many recent failures
    pub async fn is_source_throttled(&self, source_address: &str, now: DateTime<Utc>) -> Result<bool> {
        let failures = self
            .ledger
            .count_failures_for_source(source_address, now - self.policy.source_window)
            .await?;

        let throttled = failures >= u64::from(self.policy.max_failed_attempts_per_source);
        if throttled {
            warn!(source = %source_address, failures, "Source address throttled");
        }
        Ok(throttled)
    }

    /// Whether the identifier has too many recent failures
    pub async fn is_identifier_locked(&self, identifier: &str, now: DateTime<Utc>) -> Result<bool> {
        let failures = self
            .ledger
            .count_failures_for_identifier(identifier, now - self.policy.lockout_window)
            .await?;

        let locked = failures >= u64::from(self.policy.max_failed_attempts);
        if locked {
            warn!(identifier = %identifier, failures, "Identifier locked");
        }
        Ok(locked)
    }

    /// Append an attempt to the ledger
    pub async fn record(&self, attempt: NewLoginAttempt) -> Result<()> {
        self.ledger.record(&attempt).await
    }
}

//! License activation engine
//!
//! Decides whether a presented key may consume one more activation:
//! 1. Normalize the key (trim, upper-case)
//! 2. Look it up (`NotFound`)
//! 3. Check the inclusive expiry day (`Expired`)
//! 4. Check the quota (`QuotaExhausted`)
//! 5. Commit through the store's atomic conditional increment
//!
//! The order of 2-4 is part of the contract: each check narrows what the
//! caller is told. Step 4 is only a fast path; the authoritative quota
//! check is the conditional write in step 5, which reports a lost race as
//! `QuotaExhausted` as well.

use crate::db::{ActivationContext, ConsumeOutcome, LicenseStore};
use crate::errors::{AppError, Result};
use crate::keys::canonical_key;
use crate::metrics;
use chrono::{Local, NaiveDateTime};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Why a key was refused. These are answers, not failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotFound,
    Expired,
    QuotaExhausted,
}

impl Rejection {
    /// Message sent to clients in the `error` field
    pub fn message(&self) -> &'static str {
        match self {
            Rejection::NotFound => "not found",
            Rejection::Expired => "expired",
            Rejection::QuotaExhausted => "quota exhausted",
        }
    }

    fn metric_label(&self) -> &'static str {
        match self {
            Rejection::NotFound => "not_found",
            Rejection::Expired => "expired",
            Rejection::QuotaExhausted => "quota_exhausted",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Result of an activation attempt that reached a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationOutcome {
    Activated { remaining_uses: i32 },
    Rejected(Rejection),
}

impl ActivationOutcome {
    pub fn is_activated(&self) -> bool {
        matches!(self, ActivationOutcome::Activated { .. })
    }
}

/// Activation engine over a shared license store
#[derive(Clone)]
pub struct ActivationEngine {
    store: Arc<dyn LicenseStore>,
}

impl ActivationEngine {
    pub fn new(store: Arc<dyn LicenseStore>) -> Self {
        Self { store }
    }

    /// Activate against the server-local clock
    pub async fn activate(
        &self,
        raw_key: &str,
        context: &ActivationContext,
    ) -> Result<ActivationOutcome> {
        self.activate_at(raw_key, context, Local::now().naive_local()).await
    }

    /// Activate as of `now` (server-local wall clock)
    pub async fn activate_at(
        &self,
        raw_key: &str,
        context: &ActivationContext,
        now: NaiveDateTime,
    ) -> Result<ActivationOutcome> {
        let key = canonical_key(raw_key);
        if key.is_empty() {
            return Err(AppError::MissingField {
                field: "key".to_string(),
            });
        }

        let start = Instant::now();
        let outcome = self.decide(&key, context, now).await?;
        let elapsed = start.elapsed().as_secs_f64();

        match outcome {
            ActivationOutcome::Activated { remaining_uses } => {
                tracing::info!(key = %key, remaining_uses, "License activated");
                metrics::record_activation("activated", elapsed);
            }
            ActivationOutcome::Rejected(reason) => {
                tracing::info!(key = %key, reason = %reason, "License activation rejected");
                metrics::record_activation(reason.metric_label(), elapsed);
            }
        }

        Ok(outcome)
    }

    async fn decide(
        &self,
        key: &str,
        context: &ActivationContext,
        now: NaiveDateTime,
    ) -> Result<ActivationOutcome> {
        let Some(license) = self.store.find_by_key(key).await? else {
            return Ok(ActivationOutcome::Rejected(Rejection::NotFound));
        };

        if license.is_expired_at(now) {
            return Ok(ActivationOutcome::Rejected(Rejection::Expired));
        }

        if !license.has_remaining_uses() {
            return Ok(ActivationOutcome::Rejected(Rejection::QuotaExhausted));
        }

        match self.store.try_consume(key, context, now).await? {
            ConsumeOutcome::Consumed {
                max_uses,
                current_uses,
            } => Ok(ActivationOutcome::Activated {
                remaining_uses: (max_uses - current_uses).max(0),
            }),
            ConsumeOutcome::Exhausted => {
                tracing::debug!(key = %key, "Quota taken by a concurrent activation");
                Ok(ActivationOutcome::Rejected(Rejection::QuotaExhausted))
            }
        }
    }
}

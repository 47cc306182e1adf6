//! Usage statistics over the license registry and activation log
//!
//! Recomputed on every call; nothing is cached. Queries are independent
//! and may each observe a different side of an in-flight activation.

use crate::config::LicensingConfig;
use crate::db::{DailyActivations, LicenseStore};
use crate::errors::Result;
use chrono::{Days, Local, NaiveDate, NaiveDateTime, TimeDelta};
use serde::Serialize;
use std::sync::Arc;

/// Fleet-wide counters served by the stats endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub total: u64,
    pub active: u64,
    pub total_ever_activated: u64,
    pub expiring_soon: u64,
    pub activations_month: u64,
}

/// Comparison of the per-license counters against the activation log.
///
/// With atomic commits and no deleted licenses `drift` is zero. Deleting a
/// license removes its counter but keeps its log rows, which shows up as
/// negative drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyReport {
    pub counter_total: u64,
    pub log_rows: u64,
    pub drift: i64,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.drift == 0
    }
}

/// Read-side aggregator
#[derive(Clone)]
pub struct UsageAggregator {
    store: Arc<dyn LicenseStore>,
    expiring_soon_days: u64,
    activity_window_days: i64,
}

impl UsageAggregator {
    pub fn new(store: Arc<dyn LicenseStore>, config: &LicensingConfig) -> Self {
        Self {
            store,
            expiring_soon_days: config.expiring_soon_days,
            activity_window_days: config.activity_window_days,
        }
    }

    pub async fn stats(&self) -> Result<UsageStats> {
        self.stats_at(Local::now().naive_local()).await
    }

    /// Statistics as of `now` (server-local wall clock)
    pub async fn stats_at(&self, now: NaiveDateTime) -> Result<UsageStats> {
        let today = now.date();
        let counts = self
            .store
            .fleet_counts(today, self.expiring_horizon(today))
            .await?;
        let activations_month = self
            .store
            .count_activations(Some(self.window_start(now)))
            .await?;

        Ok(UsageStats {
            total: counts.total,
            active: counts.active,
            total_ever_activated: counts.total_ever_activated,
            expiring_soon: counts.expiring_soon,
            activations_month,
        })
    }

    pub async fn chart(&self) -> Result<Vec<DailyActivations>> {
        self.chart_at(Local::now().naive_local()).await
    }

    /// Per-day activations over the trailing window ending at `now`.
    /// Sparse: days without activations are not present.
    pub async fn chart_at(&self, now: NaiveDateTime) -> Result<Vec<DailyActivations>> {
        self.store.activations_by_day(self.window_start(now)).await
    }

    /// Cross-check `SUM(current_uses)` against the log row count
    pub async fn consistency(&self) -> Result<ConsistencyReport> {
        let today = Local::now().date_naive();
        let counts = self.store.fleet_counts(today, today).await?;
        let log_rows = self.store.count_activations(None).await?;

        let drift = counts.total_ever_activated as i64 - log_rows as i64;
        if drift != 0 {
            tracing::warn!(
                counter_total = counts.total_ever_activated,
                log_rows,
                drift,
                "Use counters disagree with the activation log"
            );
        }

        Ok(ConsistencyReport {
            counter_total: counts.total_ever_activated,
            log_rows,
            drift,
        })
    }

    fn expiring_horizon(&self, today: NaiveDate) -> NaiveDate {
        today
            .checked_add_days(Days::new(self.expiring_soon_days))
            .unwrap_or(NaiveDate::MAX)
    }

    /// Windows too large for the calendar reach back to the earliest
    /// representable instant; a negative window never starts in the future.
    fn window_start(&self, now: NaiveDateTime) -> NaiveDateTime {
        TimeDelta::try_days(self.activity_window_days.max(0))
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(NaiveDateTime::MIN)
    }
}

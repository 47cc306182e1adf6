//! Storage abstraction for the license registry and activation log
//!
//! The registry and the log live behind one trait so that the quota
//! increment and the log append can share a single transaction.

use crate::db::models::License;
use crate::errors::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Input for issuing a new license
#[derive(Debug, Clone)]
pub struct NewLicense {
    pub description: String,
    pub expiry_date: NaiveDate,
    pub max_uses: i32,
    pub cost: Option<f64>,
    pub supplier: Option<String>,
}

/// Administrator edit. Carries no `current_uses`, so the counter cannot
/// be reset through it.
#[derive(Debug, Clone)]
pub struct LicenseUpdate {
    pub description: String,
    pub expiry_date: NaiveDate,
    pub max_uses: i32,
}

/// Free-text details recorded alongside an activation
#[derive(Debug, Clone, Default)]
pub struct ActivationContext {
    pub device_name: Option<String>,
    pub browser: Option<String>,
}

/// Result of the atomic conditional increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// One use was consumed and logged; values are post-increment
    Consumed { max_uses: i32, current_uses: i32 },
    /// The conditional update matched no row
    Exhausted,
}

/// Registry-wide counters evaluated against a given day
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FleetCounts {
    pub total: u64,
    pub active: u64,
    pub total_ever_activated: u64,
    pub expiring_soon: u64,
}

/// Activations on one calendar day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyActivations {
    pub day: NaiveDate,
    pub count: u64,
}

/// License registry plus activation log.
///
/// Implementations must make `try_consume` a single indivisible
/// check-and-increment-and-append: two concurrent calls for the same key
/// may never both observe the pre-increment count.
#[async_trait]
pub trait LicenseStore: Send + Sync {
    /// Insert a new license under a freshly generated key
    async fn create(&self, license: NewLicense) -> Result<License>;

    /// Find a license by its canonical key
    async fn find_by_key(&self, key: &str) -> Result<Option<License>>;

    /// Find a license by id
    async fn find_by_id(&self, id: Uuid) -> Result<Option<License>>;

    /// All licenses, newest first
    async fn list(&self) -> Result<Vec<License>>;

    /// Apply an administrator edit; `None` if the id is unknown
    async fn update(&self, id: Uuid, update: LicenseUpdate) -> Result<Option<License>>;

    /// Remove a license, leaving its activation log rows in place
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Consume one use of `key` iff below quota and append a log entry
    /// stamped `at`, all or nothing.
    async fn try_consume(
        &self,
        key: &str,
        context: &ActivationContext,
        at: NaiveDateTime,
    ) -> Result<ConsumeOutcome>;

    /// Registry counters. `horizon` bounds the expiring-soon window.
    async fn fleet_counts(&self, today: NaiveDate, horizon: NaiveDate) -> Result<FleetCounts>;

    /// Activation log rows, optionally only those at or after `since`
    async fn count_activations(&self, since: Option<NaiveDateTime>) -> Result<u64>;

    /// Per-day activation counts at or after `since`, ascending by day.
    /// Days without activations are absent.
    async fn activations_by_day(&self, since: NaiveDateTime) -> Result<Vec<DailyActivations>>;

    /// Check the backing store is reachable
    async fn ping(&self) -> Result<()>;

    /// Release connections on shutdown
    async fn close(&self) -> Result<()>;
}

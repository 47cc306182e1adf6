//! In-process license store
//!
//! Every operation runs under one mutex, which makes `try_consume`'s
//! check, increment and log append a single step. Nothing survives a
//! restart.

use crate::db::models::{ActivationLogEntry, License};
use crate::db::store::{
    ActivationContext, ConsumeOutcome, DailyActivations, FleetCounts, LicenseStore, LicenseUpdate,
    NewLicense,
};
use crate::errors::{AppError, Result};
use crate::keys::generate_key;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    /// Insertion order, oldest first
    licenses: Vec<License>,
    log: Vec<ActivationLogEntry>,
    next_log_id: i64,
}

/// Mutex-guarded store for tests and single-process deployments
pub struct MemoryStore {
    inner: Mutex<Inner>,
    key_generator: fn() -> String,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_key_generator(generate_key)
    }

    /// Use a custom key source, e.g. to force collisions
    pub fn with_key_generator(key_generator: fn() -> String) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            key_generator,
        }
    }

    /// Snapshot of the activation log, oldest first
    pub fn activation_log(&self) -> Result<Vec<ActivationLogEntry>> {
        Ok(self.lock()?.log.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| AppError::Internal {
            message: "memory store lock poisoned".to_string(),
        })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LicenseStore for MemoryStore {
    async fn create(&self, license: NewLicense) -> Result<License> {
        let key = (self.key_generator)();
        let mut inner = self.lock()?;

        if inner.licenses.iter().any(|l| l.key == key) {
            return Err(AppError::DuplicateKey { key });
        }

        let license = License {
            id: Uuid::new_v4(),
            key,
            description: license.description,
            supplier: license.supplier,
            cost: license.cost,
            activated_on: None,
            expiry_date: license.expiry_date,
            max_uses: license.max_uses,
            current_uses: 0,
            created_at: Utc::now().into(),
        };
        inner.licenses.push(license.clone());

        Ok(license)
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<License>> {
        Ok(self.lock()?.licenses.iter().find(|l| l.key == key).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<License>> {
        Ok(self.lock()?.licenses.iter().find(|l| l.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<License>> {
        Ok(self.lock()?.licenses.iter().rev().cloned().collect())
    }

    async fn update(&self, id: Uuid, update: LicenseUpdate) -> Result<Option<License>> {
        let mut inner = self.lock()?;

        Ok(inner.licenses.iter_mut().find(|l| l.id == id).map(|license| {
            license.description = update.description;
            license.expiry_date = update.expiry_date;
            license.max_uses = update.max_uses;
            license.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.lock()?;
        let before = inner.licenses.len();
        inner.licenses.retain(|l| l.id != id);
        Ok(inner.licenses.len() < before)
    }

    async fn try_consume(
        &self,
        key: &str,
        context: &ActivationContext,
        at: NaiveDateTime,
    ) -> Result<ConsumeOutcome> {
        let mut inner = self.lock()?;

        let Some(license) = inner
            .licenses
            .iter_mut()
            .find(|l| l.key == key && l.has_remaining_uses())
        else {
            return Ok(ConsumeOutcome::Exhausted);
        };

        license.current_uses += 1;
        let outcome = ConsumeOutcome::Consumed {
            max_uses: license.max_uses,
            current_uses: license.current_uses,
        };

        inner.next_log_id += 1;
        let id = inner.next_log_id;
        inner.log.push(ActivationLogEntry {
            id,
            license_key: key.to_owned(),
            activated_at: at,
            device_name: context.device_name.clone(),
            browser: context.browser.clone(),
        });

        Ok(outcome)
    }

    async fn fleet_counts(&self, today: NaiveDate, horizon: NaiveDate) -> Result<FleetCounts> {
        let inner = self.lock()?;

        Ok(inner.licenses.iter().fold(FleetCounts::default(), |mut counts, l| {
            counts.total += 1;
            counts.total_ever_activated += l.current_uses.max(0) as u64;
            if l.is_active_on(today) {
                counts.active += 1;
            }
            if l.expires_between(today, horizon) {
                counts.expiring_soon += 1;
            }
            counts
        }))
    }

    async fn count_activations(&self, since: Option<NaiveDateTime>) -> Result<u64> {
        let inner = self.lock()?;

        Ok(inner
            .log
            .iter()
            .filter(|entry| since.map_or(true, |since| entry.activated_at >= since))
            .count() as u64)
    }

    async fn activations_by_day(&self, since: NaiveDateTime) -> Result<Vec<DailyActivations>> {
        let inner = self.lock()?;

        let mut days: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        for entry in inner.log.iter().filter(|entry| entry.activated_at >= since) {
            *days.entry(entry.activated_at.date()).or_default() += 1;
        }

        Ok(days
            .into_iter()
            .map(|(day, count)| DailyActivations { day, count })
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        self.lock().map(|_| ())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn new_license(expiry: &str, max_uses: i32) -> NewLicense {
        NewLicense {
            description: "Office suite".to_string(),
            expiry_date: date(expiry),
            max_uses,
            cost: Some(120.0),
            supplier: Some("Acme".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_starts_at_zero_uses() {
        let store = MemoryStore::new();
        let license = store.create(new_license("2030-01-01", 3)).await.unwrap();

        assert_eq!(license.current_uses, 0);
        assert_eq!(license.key.len(), 12);
        let found = store.find_by_key(&license.key).await.unwrap().unwrap();
        assert_eq!(found.id, license.id);
    }

    #[tokio::test]
    async fn test_key_collision_fails_creation() {
        let store = MemoryStore::with_key_generator(|| "SAMEKEY00000".to_string());
        store.create(new_license("2030-01-01", 3)).await.unwrap();

        let err = store.create(new_license("2031-01-01", 1)).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateKey { .. }));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let store = MemoryStore::new();
        let first = store.create(new_license("2030-01-01", 1)).await.unwrap();
        let second = store.create(new_license("2030-01-01", 1)).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
    }

    #[tokio::test]
    async fn test_update_keeps_current_uses() {
        let store = MemoryStore::new();
        let license = store.create(new_license("2030-01-01", 3)).await.unwrap();
        store
            .try_consume(&license.key, &ActivationContext::default(), at("2029-01-01 10:00:00"))
            .await
            .unwrap();

        let updated = store
            .update(
                license.id,
                LicenseUpdate {
                    description: "Renamed".to_string(),
                    expiry_date: date("2031-01-01"),
                    max_uses: 10,
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.description, "Renamed");
        assert_eq!(updated.max_uses, 10);
        assert_eq!(updated.current_uses, 1);
    }

    #[tokio::test]
    async fn test_update_unknown_id() {
        let store = MemoryStore::new();
        let result = store
            .update(
                Uuid::new_v4(),
                LicenseUpdate {
                    description: "x".to_string(),
                    expiry_date: date("2031-01-01"),
                    max_uses: 1,
                },
            )
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_consume_stops_at_quota() {
        let store = MemoryStore::new();
        let license = store.create(new_license("2030-01-01", 2)).await.unwrap();
        let ctx = ActivationContext::default();
        let now = at("2029-01-01 10:00:00");

        assert_eq!(
            store.try_consume(&license.key, &ctx, now).await.unwrap(),
            ConsumeOutcome::Consumed { max_uses: 2, current_uses: 1 }
        );
        assert_eq!(
            store.try_consume(&license.key, &ctx, now).await.unwrap(),
            ConsumeOutcome::Consumed { max_uses: 2, current_uses: 2 }
        );
        assert_eq!(
            store.try_consume(&license.key, &ctx, now).await.unwrap(),
            ConsumeOutcome::Exhausted
        );
        assert_eq!(store.count_activations(None).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_delete_keeps_activation_log() {
        let store = MemoryStore::new();
        let license = store.create(new_license("2030-01-01", 2)).await.unwrap();
        let ctx = ActivationContext {
            device_name: Some("PC-01".to_string()),
            browser: None,
        };
        store
            .try_consume(&license.key, &ctx, at("2029-01-01 10:00:00"))
            .await
            .unwrap();

        assert!(store.delete(license.id).await.unwrap());
        assert!(!store.delete(license.id).await.unwrap());
        assert!(store.find_by_id(license.id).await.unwrap().is_none());

        let log = store.activation_log().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].license_key, license.key);
        assert_eq!(log[0].device_name.as_deref(), Some("PC-01"));
    }

    #[tokio::test]
    async fn test_activations_by_day_sparse_and_ascending() {
        let store = MemoryStore::new();
        let license = store.create(new_license("2030-01-01", 10)).await.unwrap();
        let ctx = ActivationContext::default();
        for ts in [
            "2029-03-05 09:00:00",
            "2029-03-01 23:59:59",
            "2029-03-05 18:30:00",
            "2029-02-01 12:00:00",
        ] {
            store.try_consume(&license.key, &ctx, at(ts)).await.unwrap();
        }

        let days = store
            .activations_by_day(at("2029-02-15 00:00:00"))
            .await
            .unwrap();
        assert_eq!(
            days,
            vec![
                DailyActivations { day: date("2029-03-01"), count: 1 },
                DailyActivations { day: date("2029-03-05"), count: 2 },
            ]
        );
    }
}

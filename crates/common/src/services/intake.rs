//! Bulk license intake
//!
//! Turns already-parsed CSV or spreadsheet rows into licenses. Cells arrive
//! as whatever JSON the upstream parser produced (strings, numbers, nulls);
//! they are interpreted per row here. Invalid rows are counted and skipped;
//! they never abort the batch.

use crate::db::{LicenseStore, NewLicense};
use crate::metrics;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Where a batch of rows came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IntakeSource {
    Csv,
    Spreadsheet,
}

/// One row of a bulk upload, cells left untyped
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeRow {
    #[serde(default)]
    pub description: Value,

    #[serde(default, alias = "expiry_date")]
    pub expiry_date: Value,

    #[serde(default, alias = "max_uses")]
    pub max_uses: Value,
}

impl IntakeRow {
    /// Read a row from arbitrary JSON. Anything that is not an object
    /// becomes an empty row, which resolves to a skip.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(_) => serde_json::from_value(value).unwrap_or_default(),
            _ => Self::default(),
        }
    }

    fn text(cell: &Value) -> Option<String> {
        let text = match cell {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        (!text.is_empty()).then_some(text)
    }

    /// Whole-number quota from a numeric or textual cell
    fn quota(cell: &Value) -> Option<i32> {
        match cell {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .and_then(|n| i32::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Outcome of a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IntakeReport {
    pub imported: u64,
    pub skipped: u64,
}

#[derive(Clone)]
pub struct BulkIntake {
    store: Arc<dyn LicenseStore>,
    default_max_uses: i32,
}

impl BulkIntake {
    /// `default_max_uses` applies to spreadsheet rows without a usable quota
    pub fn new(store: Arc<dyn LicenseStore>, default_max_uses: i32) -> Self {
        Self {
            store,
            default_max_uses,
        }
    }

    /// Import every row that resolves to a valid license
    pub async fn import(&self, source: IntakeSource, rows: Vec<IntakeRow>) -> IntakeReport {
        let mut report = IntakeReport::default();

        for (index, row) in rows.into_iter().enumerate() {
            let Some(license) = self.resolve(source, &row) else {
                tracing::debug!(row = index, ?source, "Skipping invalid intake row");
                report.skipped += 1;
                continue;
            };

            match self.store.create(license).await {
                Ok(created) => {
                    tracing::debug!(row = index, key = %created.key, "Imported license");
                    metrics::record_license_created("import");
                    report.imported += 1;
                }
                Err(e) => {
                    tracing::warn!(row = index, error = %e, "Failed to store intake row");
                    report.skipped += 1;
                }
            }
        }

        metrics::record_intake(report.imported, report.skipped);
        tracing::info!(
            ?source,
            imported = report.imported,
            skipped = report.skipped,
            "Bulk intake finished"
        );

        report
    }

    fn resolve(&self, source: IntakeSource, row: &IntakeRow) -> Option<NewLicense> {
        let description = IntakeRow::text(&row.description)?;
        let expiry_date = parse_expiry(&IntakeRow::text(&row.expiry_date)?)?;

        let max_uses = match source {
            IntakeSource::Spreadsheet => match IntakeRow::quota(&row.max_uses) {
                Some(n) if n > 0 => n,
                _ => self.default_max_uses,
            },
            IntakeSource::Csv => IntakeRow::quota(&row.max_uses).unwrap_or(0),
        };
        if max_uses < 1 {
            return None;
        }

        Some(NewLicense {
            description,
            expiry_date,
            max_uses,
            cost: None,
            supplier: None,
        })
    }
}

/// `YYYY-MM-DD`, optionally followed by a time part (`2025-06-30T00:00:00`)
fn parse_expiry(raw: &str) -> Option<NaiveDate> {
    let date = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use serde_json::json;

    fn rows(values: Value) -> Vec<IntakeRow> {
        match values {
            Value::Array(items) => items.into_iter().map(IntakeRow::from_json).collect(),
            other => panic!("expected an array, got {}", other),
        }
    }

    fn intake(store: Arc<MemoryStore>) -> BulkIntake {
        BulkIntake::new(store, 5)
    }

    #[tokio::test]
    async fn test_csv_skips_row_without_description() {
        let store = Arc::new(MemoryStore::new());
        let batch = rows(json!([
            {"description": "Office", "expiryDate": "2025-06-30", "maxUses": 10},
            {"description": "", "expiryDate": "2025-06-30", "maxUses": 10}
        ]));

        let report = intake(store.clone()).import(IntakeSource::Csv, batch).await;
        assert_eq!(report, IntakeReport { imported: 1, skipped: 1 });

        let licenses = store.list().await.unwrap();
        assert_eq!(licenses.len(), 1);
        assert_eq!(licenses[0].description, "Office");
        assert_eq!(licenses[0].max_uses, 10);
        assert_eq!(licenses[0].current_uses, 0);
    }

    #[tokio::test]
    async fn test_spreadsheet_defaults_max_uses() {
        let store = Arc::new(MemoryStore::new());
        let batch = rows(json!([
            {"description": "No quota", "expiryDate": "2025-06-30"},
            {"description": "Zero quota", "expiryDate": "2025-06-30", "maxUses": 0},
            {"description": "Text quota", "expiryDate": "2025-06-30", "maxUses": "many"},
            {"description": "Explicit", "expiryDate": "2025-06-30", "maxUses": "2"}
        ]));

        let report = intake(store.clone()).import(IntakeSource::Spreadsheet, batch).await;
        assert_eq!(report.imported, 4);

        let mut quotas: Vec<i32> = store.list().await.unwrap().iter().map(|l| l.max_uses).collect();
        quotas.sort();
        assert_eq!(quotas, vec![2, 5, 5, 5]);
    }

    #[tokio::test]
    async fn test_csv_requires_positive_max_uses() {
        let store = Arc::new(MemoryStore::new());
        let batch = rows(json!([
            {"description": "Missing", "expiryDate": "2025-06-30"},
            {"description": "Negative", "expiryDate": "2025-06-30", "maxUses": -3},
            {"description": "Fractional", "expiryDate": "2025-06-30", "maxUses": 2.5}
        ]));

        let report = intake(store).import(IntakeSource::Csv, batch).await;
        assert_eq!(report, IntakeReport { imported: 0, skipped: 3 });
    }

    #[tokio::test]
    async fn test_wrongly_typed_cells_skip_only_their_row() {
        let store = Arc::new(MemoryStore::new());
        let batch = rows(json!([
            {"description": "Good", "expiryDate": "2025-06-30", "maxUses": 3},
            {"description": "Text quota", "expiryDate": "2025-06-30", "maxUses": "7"},
            {"description": "Word quota", "expiryDate": "2025-06-30", "maxUses": "many"},
            {"description": null, "expiryDate": "2025-06-30", "maxUses": 1},
            {"description": "Boolean date", "expiryDate": true, "maxUses": 1},
            42,
            ["Office", "2025-06-30", 1]
        ]));

        let report = intake(store.clone()).import(IntakeSource::Csv, batch).await;
        assert_eq!(report, IntakeReport { imported: 2, skipped: 5 });

        let mut quotas: Vec<i32> = store.list().await.unwrap().iter().map(|l| l.max_uses).collect();
        quotas.sort();
        assert_eq!(quotas, vec![3, 7]);
    }

    #[tokio::test]
    async fn test_bad_expiry_skipped() {
        let store = Arc::new(MemoryStore::new());
        let batch = rows(json!([
            {"description": "No expiry", "maxUses": 1},
            {"description": "Blank expiry", "expiryDate": "  ", "maxUses": 1},
            {"description": "Garbage", "expiryDate": "next year", "maxUses": 1},
            {"description": "Timestamp", "expiryDate": "2025-06-30T00:00:00.000Z", "maxUses": 1}
        ]));

        let report = intake(store.clone()).import(IntakeSource::Csv, batch).await;
        assert_eq!(report, IntakeReport { imported: 1, skipped: 3 });
        assert_eq!(
            store.list().await.unwrap()[0].expiry_date,
            NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
        );
    }

    #[tokio::test]
    async fn test_store_failure_skips_only_that_row() {
        let store = Arc::new(MemoryStore::with_key_generator(|| "FIXEDKEY0001".to_string()));
        let batch = rows(json!([
            {"description": "First", "expiryDate": "2025-06-30", "maxUses": 1},
            {"description": "Second", "expiryDate": "2025-06-30", "maxUses": 1}
        ]));

        let report = intake(store).import(IntakeSource::Csv, batch).await;
        assert_eq!(report, IntakeReport { imported: 1, skipped: 1 });
    }

    #[test]
    fn test_row_accepts_both_casings() {
        let camel = IntakeRow::from_json(json!({"description": "A", "expiryDate": "2025-01-01", "maxUses": 3}));
        let snake = IntakeRow::from_json(json!({"description": "A", "expiry_date": "2025-01-01", "max_uses": 3}));
        assert_eq!(camel, snake);
        assert_eq!(IntakeRow::quota(&camel.max_uses), Some(3));
    }

    #[test]
    fn test_source_wire_names() {
        let source: IntakeSource = serde_json::from_str(r#""spreadsheet""#).unwrap();
        assert_eq!(source, IntakeSource::Spreadsheet);
    }
}

//! Bulk intake handler

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::AppState;
use licensecore_common::{
    errors::Result,
    services::{IntakeRow, IntakeSource},
};

/// Rows already parsed from an uploaded CSV file or spreadsheet. Rows stay
/// untyped so one malformed row cannot reject the whole batch.
#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub source: IntakeSource,

    #[serde(default)]
    pub rows: Vec<Value>,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub success: bool,
    pub imported: u64,
    pub skipped: u64,
    pub message: String,
}

/// Import a batch; invalid rows are skipped and counted
pub async fn import_licenses(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ImportRequest>, JsonRejection>,
) -> Result<Json<ImportResponse>> {
    let Json(request) = payload?;

    let rows = request.rows.into_iter().map(IntakeRow::from_json).collect();
    let report = state.intake.import(request.source, rows).await;

    Ok(Json(ImportResponse {
        success: true,
        imported: report.imported,
        skipped: report.skipped,
        message: format!("Imported: {}, skipped: {}", report.imported, report.skipped),
    }))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{json_body, send, test_app};
    use axum::http::{Method, StatusCode};
    use licensecore_common::db::LicenseStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_import_counts_rows() {
        let (app, store) = test_app();
        let response = send(
            &app,
            Method::POST,
            "/api/licenses/import",
            Some(json!({
                "source": "csv",
                "rows": [
                    {"description": "Office", "expiryDate": "2025-06-30", "maxUses": 10},
                    {"description": "", "expiryDate": "2025-06-30", "maxUses": 10}
                ]
            })),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["imported"], 1);
        assert_eq!(body["skipped"], 1);
        assert_eq!(body["message"], "Imported: 1, skipped: 1");
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_spreadsheet_rows_get_default_quota() {
        let (app, store) = test_app();
        let response = send(
            &app,
            Method::POST,
            "/api/licenses/import",
            Some(json!({
                "source": "spreadsheet",
                "rows": [{"description": "Office", "expiry_date": "2025-06-30T00:00:00Z"}]
            })),
        )
        .await;

        assert_eq!(json_body(response).await["imported"], 1);
        assert_eq!(store.list().await.unwrap()[0].max_uses, 5);
    }

    #[tokio::test]
    async fn test_mixed_batch_keeps_good_rows() {
        let (app, store) = test_app();
        let response = send(
            &app,
            Method::POST,
            "/api/licenses/import",
            Some(json!({
                "source": "csv",
                "rows": [
                    {"description": "Office", "expiryDate": "2025-06-30", "maxUses": 10},
                    {"description": "Text quota", "expiryDate": "2025-06-30", "maxUses": "7"},
                    {"description": "Word quota", "expiryDate": "2025-06-30", "maxUses": "many"},
                    {"description": null, "expiryDate": "2025-06-30", "maxUses": 1},
                    42
                ]
            })),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["imported"], 2);
        assert_eq!(body["skipped"], 3);
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_source_rejected() {
        let (app, _) = test_app();
        let response = send(
            &app,
            Method::POST,
            "/api/licenses/import",
            Some(json!({"source": "xml", "rows": []})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

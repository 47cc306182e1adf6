//! Key validation (activation) handler
//!
//! Business rejections are answered with `200 {valid: false, error}`; only a
//! malformed body or a storage fault produces a non-2xx status.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::AppState;
use licensecore_common::{
    db::ActivationContext,
    errors::Result,
    services::ActivationOutcome,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    pub key: String,

    #[serde(default, alias = "device_name")]
    pub device_name: Option<String>,

    #[serde(default)]
    pub browser: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub valid: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_uses: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ActivationOutcome> for ValidateResponse {
    fn from(outcome: ActivationOutcome) -> Self {
        match outcome {
            ActivationOutcome::Activated { remaining_uses } => Self {
                valid: true,
                remaining_uses: Some(remaining_uses),
                error: None,
            },
            ActivationOutcome::Rejected(reason) => Self {
                valid: false,
                remaining_uses: None,
                error: Some(reason.message().to_string()),
            },
        }
    }
}

/// Validate a key and, when accepted, consume one activation
pub async fn validate(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ValidateRequest>, JsonRejection>,
) -> Result<Json<ValidateResponse>> {
    let Json(request) = payload?;

    let context = ActivationContext {
        device_name: request.device_name,
        browser: request.browser,
    };
    let outcome = state.engine.activate(&request.key, &context).await?;

    Ok(Json(outcome.into()))
}

#[cfg(test)]
mod tests {
    use super::ValidateResponse;
    use crate::test_support::{json_body, send, test_app, test_app_with};
    use axum::http::{Method, StatusCode};
    use licensecore_common::config::AppConfig;
    use serde_json::json;

    async fn issue(app: &axum::Router, expiry: &str, max_uses: i32) -> String {
        let response = send(
            app,
            Method::POST,
            "/api/licenses",
            Some(json!({"description": "Seat", "expiryDate": expiry, "maxUses": max_uses})),
        )
        .await;
        json_body(response).await["key"].as_str().unwrap().to_string()
    }

    async fn validate(app: &axum::Router, key: &str) -> (StatusCode, ValidateResponse) {
        let response = send(
            app,
            Method::POST,
            "/api/licenses/validate",
            Some(json!({"key": key, "deviceName": "PC-7"})),
        )
        .await;
        let status = response.status();
        (status, serde_json::from_value(json_body(response).await).unwrap())
    }

    #[tokio::test]
    async fn test_quota_counts_down_then_rejects() {
        let (app, store) = test_app();
        let key = issue(&app, "2099-12-31", 2).await;

        let (status, first) = validate(&app, &key).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first.remaining_uses, Some(1));

        let (_, second) = validate(&app, &key.to_lowercase()).await;
        assert_eq!(second.remaining_uses, Some(0));

        let (status, third) = validate(&app, &key).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            third,
            ValidateResponse {
                valid: false,
                remaining_uses: None,
                error: Some("quota exhausted".to_string()),
            }
        );

        let log = store.activation_log().unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].device_name.as_deref(), Some("PC-7"));
    }

    #[tokio::test]
    async fn test_unknown_and_expired_keys() {
        let (app, _) = test_app();
        let expired = issue(&app, "2000-01-01", 5).await;

        let (status, unknown) = validate(&app, "ZZZZZZZZZZZZ").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(unknown.error.as_deref(), Some("not found"));

        let (_, expired) = validate(&app, &expired).await;
        assert!(!expired.valid);
        assert_eq!(expired.error.as_deref(), Some("expired"));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let (app, _) = test_app();

        let response = send(&app, Method::POST, "/api/licenses/validate", Some(json!({}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &app,
            Method::POST,
            "/api/licenses/validate",
            Some(json!({"key": "   "})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["code"], "MISSING_FIELD");
    }

    #[tokio::test]
    async fn test_wrong_method() {
        let (app, _) = test_app();
        let response = send(&app, Method::GET, "/api/licenses/validate", None).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let mut config = AppConfig::default();
        config.rate_limit.requests_per_second = 1;
        config.rate_limit.burst = 1;
        let (app, _) = test_app_with(config);

        let (status, _) = validate(&app, "ZZZZZZZZZZZZ").await;
        assert_eq!(status, StatusCode::OK);

        let response = send(
            &app,
            Method::POST,
            "/api/licenses/validate",
            Some(json!({"key": "ZZZZZZZZZZZZ"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}

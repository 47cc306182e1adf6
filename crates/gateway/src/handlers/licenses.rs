//! License registry handlers

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use licensecore_common::{
    db::{models::License, LicenseUpdate, NewLicense},
    errors::{AppError, Result},
    metrics,
};

/// Request to issue a new license
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateLicenseRequest {
    #[validate(length(min = 1, max = 1000))]
    pub description: String,

    #[serde(alias = "expiry_date")]
    pub expiry_date: NaiveDate,

    #[validate(range(min = 1))]
    #[serde(alias = "max_uses")]
    pub max_uses: i32,

    #[validate(range(min = 0.0))]
    #[serde(default)]
    pub cost: Option<f64>,

    #[serde(default)]
    pub supplier: Option<String>,
}

/// Administrator edit of an existing license
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLicenseRequest {
    #[validate(length(min = 1, max = 1000))]
    pub description: String,

    #[serde(alias = "expiry_date")]
    pub expiry_date: NaiveDate,

    #[validate(range(min = 1))]
    #[serde(alias = "max_uses")]
    pub max_uses: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateLicenseResponse {
    pub key: String,
}

fn validation_error(e: validator::ValidationErrors) -> AppError {
    let field = e.field_errors().keys().next().map(|f| f.to_string());
    AppError::Validation {
        message: e.to_string(),
        field,
    }
}

/// Issue a new license under a freshly generated key
pub async fn create_license(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CreateLicenseRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateLicenseResponse>)> {
    let Json(mut request) = payload?;
    request.description = request.description.trim().to_string();
    request.validate().map_err(validation_error)?;

    let license = state
        .store
        .create(NewLicense {
            description: request.description,
            expiry_date: request.expiry_date,
            max_uses: request.max_uses,
            cost: request.cost,
            supplier: request.supplier,
        })
        .await?;

    metrics::record_license_created("manual");
    tracing::info!(
        license_id = %license.id,
        key = %license.key,
        max_uses = license.max_uses,
        "License created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateLicenseResponse { key: license.key }),
    ))
}

/// List every license, newest first
pub async fn list_licenses(State(state): State<AppState>) -> Result<Json<Vec<License>>> {
    Ok(Json(state.store.list().await?))
}

/// Edit description, expiry and quota. The use counter is left alone.
pub async fn update_license(
    State(state): State<AppState>,
    Path(license_id): Path<Uuid>,
    payload: std::result::Result<Json<UpdateLicenseRequest>, JsonRejection>,
) -> Result<Json<License>> {
    let Json(mut request) = payload?;
    request.description = request.description.trim().to_string();
    request.validate().map_err(validation_error)?;

    let license = state
        .store
        .update(
            license_id,
            LicenseUpdate {
                description: request.description,
                expiry_date: request.expiry_date,
                max_uses: request.max_uses,
            },
        )
        .await?
        .ok_or_else(|| AppError::LicenseNotFound {
            id: license_id.to_string(),
        })?;

    tracing::info!(license_id = %license_id, "License updated");

    Ok(Json(license))
}

/// Delete a license. Its activation log rows stay.
pub async fn delete_license(
    State(state): State<AppState>,
    Path(license_id): Path<Uuid>,
) -> Result<StatusCode> {
    if !state.store.delete(license_id).await? {
        return Err(AppError::LicenseNotFound {
            id: license_id.to_string(),
        });
    }

    tracing::info!(license_id = %license_id, "License deleted");

    Ok(StatusCode::OK)
}

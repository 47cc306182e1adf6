//! Usage statistics handlers

use axum::{extract::State, Json};

use crate::AppState;
use licensecore_common::{
    db::DailyActivations,
    errors::Result,
    services::UsageStats,
};

/// Fleet-wide counters
pub async fn stats(State(state): State<AppState>) -> Result<Json<UsageStats>> {
    Ok(Json(state.aggregator.stats().await?))
}

/// Activations per day over the trailing window, ascending, zero days omitted
pub async fn chart(State(state): State<AppState>) -> Result<Json<Vec<DailyActivations>>> {
    Ok(Json(state.aggregator.chart().await?))
}

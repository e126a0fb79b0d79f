//! Usage export for paid plans.

use crate::auth::{AppState, RequireAuth};
use crate::error::ApiError;
use crate::routes::integrations::IntegrationView;
use crate::routes::me::ProfileView;
use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Response body for `GET /api/usage/export`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageExport {
    generated_at: DateTime<Utc>,
    account: ProfileView,
    integrations: Vec<IntegrationView>,
}

/// Exports the caller's usage counters and integration activity.
pub async fn export_usage(
    State(state): State<Arc<AppState>>,
    RequireAuth(principal): RequireAuth,
) -> Result<Json<UsageExport>, ApiError> {
    let records = state
        .integrations
        .list_for_user(principal.id())
        .await
        .map_err(ApiError::database)?;

    Ok(Json(UsageExport {
        generated_at: Utc::now(),
        account: ProfileView::from(&principal),
        integrations: records.iter().map(IntegrationView::from).collect(),
    }))
}

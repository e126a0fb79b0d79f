//! Integration management and sync triggering.

use crate::auth::{AppState, RequireAuth};
use crate::db::{IntegrationRecord, IntegrationStatus};
use crate::error::ApiError;
use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use integration_hub_access::{QuotaAction, check_quota};
use integration_hub_core::IntegrationId;
use integration_hub_vault::secrets::mask_sensitive;
use integration_hub_vault::{ConnectorCredentials, ConnectorKind, ConnectorRole};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Request body for `POST /api/integrations`.
#[derive(Deserialize)]
pub struct CreateIntegrationRequest {
    pub name: String,
    pub source: ConnectorCredentials,
    pub destination: ConnectorCredentials,
}

/// An integration as returned by the API. Never includes credentials.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationView {
    pub id: IntegrationId,
    pub name: String,
    pub source_type: ConnectorKind,
    pub destination_type: ConnectorKind,
    pub status: IntegrationStatus,
    pub created_at: DateTime<Utc>,
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl From<&IntegrationRecord> for IntegrationView {
    fn from(record: &IntegrationRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            source_type: record.source_kind,
            destination_type: record.destination_kind,
            status: record.status,
            created_at: record.created_at,
            last_sync_at: record.last_sync_at,
        }
    }
}

/// Lists the caller's integrations.
pub async fn list_integrations(
    State(state): State<Arc<AppState>>,
    RequireAuth(principal): RequireAuth,
) -> Result<Json<Vec<IntegrationView>>, ApiError> {
    let records = state
        .integrations
        .list_for_user(principal.id())
        .await
        .map_err(ApiError::database)?;
    Ok(Json(records.iter().map(IntegrationView::from).collect()))
}

/// Creates an integration with sealed source and destination credentials.
pub async fn create_integration(
    State(state): State<Arc<AppState>>,
    RequireAuth(principal): RequireAuth,
    body: Result<Json<CreateIntegrationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IntegrationView>), ApiError> {
    let Json(body) = body.map_err(|e| ApiError::InvalidRequest {
        details: e.body_text(),
    })?;

    let name = body.name.trim();
    if name.is_empty() {
        return Err(ApiError::InvalidRequest {
            details: "name must not be empty".to_string(),
        });
    }

    if body.destination.kind() == ConnectorKind::Webhook {
        let decision = check_quota(&principal, QuotaAction::ConfigureWebhook);
        if !decision.allowed {
            return Err(ApiError::QuotaExceeded {
                reason: decision.reason.unwrap_or_default(),
            });
        }
    }

    let source_token = state
        .vault
        .seal_for(ConnectorRole::Source, &body.source)
        .map_err(ApiError::vault)?;
    let destination_token = state
        .vault
        .seal_for(ConnectorRole::Destination, &body.destination)
        .map_err(ApiError::vault)?;

    let record = IntegrationRecord::new(
        principal.id(),
        name.to_string(),
        (body.source.kind(), source_token),
        (body.destination.kind(), destination_token),
    );
    state
        .integrations
        .create(&record)
        .await
        .map_err(ApiError::database)?;

    info!(
        user_id = %principal.id(),
        integration_id = %record.id,
        source = %record.source_kind,
        destination = %record.destination_kind,
        "created integration"
    );
    Ok((StatusCode::CREATED, Json(IntegrationView::from(&record))))
}

/// Runs a sync for one of the caller's integrations.
///
/// Both credential tokens are opened first; an integration whose tokens no
/// longer open is marked as failed and the sync is not counted.
pub async fn sync_integration(
    State(state): State<Arc<AppState>>,
    RequireAuth(principal): RequireAuth,
    id: Result<Path<IntegrationId>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = integration_id(id)?;
    let record = state
        .integrations
        .find_for_user(id, principal.id())
        .await
        .map_err(ApiError::database)?
        .ok_or(ApiError::NotFound {
            resource: "Integration",
        })?;

    let opened = state
        .vault
        .open(record.source_token.as_str())
        .and_then(|source| Ok((source, state.vault.open(record.destination_token.as_str())?)));
    let (source, destination) = match opened {
        Ok(pair) => pair,
        Err(e) => {
            error!(
                integration_id = %record.id,
                kind = ?e.unreadable_kind(),
                "stored credentials could not be opened"
            );
            if let Err(mark) = state.integrations.mark_error(record.id).await {
                error!(error = %mark, "failed to mark integration as errored");
            }
            return Err(ApiError::vault(e));
        }
    };
    if let ConnectorCredentials::Webhook { url, .. } = &destination {
        debug!(url = %mask_sensitive(url, 8), "sync will deliver to webhook");
    }
    debug!(source = %source.kind(), destination = %destination.kind(), "credentials verified");

    let synced_at = state
        .integrations
        .record_sync(record.id, principal.id())
        .await
        .map_err(ApiError::database)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "id": record.id, "status": "queued", "syncedAt": synced_at })),
    ))
}

/// Deletes one of the caller's integrations, destroying its sealed tokens.
pub async fn delete_integration(
    State(state): State<Arc<AppState>>,
    RequireAuth(principal): RequireAuth,
    id: Result<Path<IntegrationId>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let id = integration_id(id)?;
    let deleted = state
        .integrations
        .delete_for_user(id, principal.id())
        .await
        .map_err(ApiError::database)?;
    if !deleted {
        return Err(ApiError::NotFound {
            resource: "Integration",
        });
    }

    info!(user_id = %principal.id(), integration_id = %id, "deleted integration");
    Ok(StatusCode::NO_CONTENT)
}

/// A malformed ID cannot name one of the caller's integrations.
fn integration_id(
    path: Result<Path<IntegrationId>, PathRejection>,
) -> Result<IntegrationId, ApiError> {
    path.map(|Path(id)| id).map_err(|e| {
        debug!(error = %e.body_text(), "unparseable integration id");
        ApiError::NotFound {
            resource: "Integration",
        }
    })
}

//! HTTP API routes.

pub mod integrations;
pub mod me;
pub mod usage;

use crate::auth::{AppState, with_auth};
use axum::Router;
use axum::routing::{delete, get, post};
use integration_hub_access::{AuthOptions, PlanTier, QuotaAction};
use std::sync::Arc;

/// Builds the API router.
pub fn router(state: Arc<AppState>) -> Router {
    let access = state.access.clone();

    Router::new()
        .route("/api/me", with_auth(&access, AuthOptions::new(), get(me::get_me)))
        .route(
            "/api/integrations",
            with_auth(&access, AuthOptions::new(), get(integrations::list_integrations)).merge(
                with_auth(
                    &access,
                    AuthOptions::new().with_quota(QuotaAction::CreateIntegration),
                    post(integrations::create_integration),
                ),
            ),
        )
        .route(
            "/api/integrations/{id}",
            with_auth(&access, AuthOptions::new(), delete(integrations::delete_integration)),
        )
        .route(
            "/api/integrations/{id}/sync",
            with_auth(
                &access,
                AuthOptions::new().with_quota(QuotaAction::Sync),
                post(integrations::sync_integration),
            ),
        )
        .route(
            "/api/usage/export",
            with_auth(
                &access,
                AuthOptions::new().require_plans([PlanTier::Business, PlanTier::Enterprise]),
                get(usage::export_usage),
            ),
        )
        .with_state(state)
}

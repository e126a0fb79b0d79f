//! Profile of the calling principal.

use crate::auth::RequireAuth;
use axum::Json;
use integration_hub_access::{PlanLimits, Principal, Usage};
use integration_hub_core::UserId;
use serde::Serialize;

/// Response body for `GET /api/me`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub plan: String,
    pub usage: Usage,
    /// Absent when the stored plan is not a known tier.
    pub limits: Option<PlanLimits>,
}

impl From<&Principal> for ProfileView {
    fn from(principal: &Principal) -> Self {
        Self {
            id: principal.id(),
            email: principal.email().to_string(),
            name: principal.name().to_string(),
            plan: principal.plan().to_string(),
            usage: *principal.usage(),
            limits: principal.plan_tier().map(|tier| tier.limits()),
        }
    }
}

/// Returns the caller's profile, plan, usage and limits.
pub async fn get_me(RequireAuth(principal): RequireAuth) -> Json<ProfileView> {
    Json(ProfileView::from(&principal))
}

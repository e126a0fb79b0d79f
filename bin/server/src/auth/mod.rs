//! Authentication and access control for the HTTP API.
//!
//! This module provides:
//! - Postgres implementations of the session store and user repository
//! - `with_auth`, which runs the access guard in front of a route, and the
//!   `RequireAuth` extractor handlers use to read the admitted principal
//!
//! Sessions are issued by the sign-in flow, which writes rows into the
//! `sessions` table. Every API request is then resolved to a principal,
//! rate limited per principal and checked against its plan.

pub mod db;
pub mod middleware;

pub use db::session_token_hash;
pub use middleware::{AccessControl, RequireAuth, SESSION_COOKIE, session_token, with_auth};

use crate::db::IntegrationRepository;
use db::{PgSessionStore, PgUserRepository};
use integration_hub_access::{AuthGuard, PrincipalResolver, RateLimiter};
use integration_hub_vault::CredentialVault;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

/// Shared application state.
pub struct AppState {
    /// Access guard applied to every API route.
    pub access: AccessControl,
    /// Seals and opens connector credentials.
    pub vault: Arc<CredentialVault>,
    /// Integration persistence.
    pub integrations: IntegrationRepository,
}

impl AppState {
    /// Creates the application state over a database pool.
    ///
    /// `access_deadline` bounds each request's access check.
    pub fn new(
        db_pool: PgPool,
        vault: CredentialVault,
        limiter: RateLimiter,
        access_deadline: Duration,
    ) -> Self {
        let resolver = PrincipalResolver::new(
            Arc::new(PgSessionStore::new(db_pool.clone())),
            Arc::new(PgUserRepository::new(db_pool.clone())),
        );
        Self {
            access: AccessControl::new(AuthGuard::new(resolver, limiter), access_deadline),
            vault: Arc::new(vault),
            integrations: IntegrationRepository::new(db_pool),
        }
    }
}

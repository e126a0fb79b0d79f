//! Resolution of session tokens to principals.
//!
//! The resolver consults the session store, then loads the session's user.
//! Store failures are reported as `Unavailable` and never as
//! `Unauthenticated`, so clients can tell "sign in again" from "retry later".
//!
//! No deadline is applied here; callers bound a resolution by wrapping the
//! future, and dropping it cancels the in-flight lookup.

use crate::error::{ResolveError, StoreError};
use crate::plan::PlanTier;
use crate::principal::Principal;
use crate::session::{SessionStatus, SessionStore, SessionToken};
use async_trait::async_trait;
use integration_hub_core::{Result, UserId};
use rootcause::Report;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// Data for provisioning a user on first sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    email: String,
    name: String,
    plan: PlanTier,
    google_id: Option<String>,
}

impl NewUser {
    /// Creates a starter-plan user. The email is trimmed and lowercased.
    #[must_use]
    pub fn new(email: &str, name: impl Into<String>) -> Self {
        Self {
            email: email.trim().to_lowercase(),
            name: name.into(),
            plan: PlanTier::Starter,
            google_id: None,
        }
    }

    /// Sets the Google account subject.
    #[must_use]
    pub fn with_google_id(mut self, google_id: impl Into<String>) -> Self {
        self.google_id = Some(google_id.into());
        self
    }

    /// Overrides the initial plan.
    #[must_use]
    pub fn with_plan(mut self, plan: PlanTier) -> Self {
        self.plan = plan;
        self
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn plan(&self) -> PlanTier {
        self.plan
    }

    #[must_use]
    pub fn google_id(&self) -> Option<&str> {
        self.google_id.as_deref()
    }
}

/// Storage for user records.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Loads a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot answer.
    async fn find_by_id(&self, id: UserId) -> Result<Option<Principal>, StoreError>;

    /// Loads a user by lowercased email.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot answer.
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, StoreError>;

    /// Creates a user with no usage.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the email is taken, or another
    /// `StoreError` if the store cannot answer.
    async fn create(&self, user: NewUser) -> Result<Principal, StoreError>;
}

/// Maps session tokens to principals.
#[derive(Clone)]
pub struct PrincipalResolver {
    sessions: Arc<dyn SessionStore>,
    users: Arc<dyn UserRepository>,
}

impl PrincipalResolver {
    #[must_use]
    pub fn new(sessions: Arc<dyn SessionStore>, users: Arc<dyn UserRepository>) -> Self {
        Self { sessions, users }
    }

    /// Resolves a session token to its principal.
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` for a blank, unknown or expired token
    /// - `PrincipalNotFound` when the session's user is gone
    /// - `Unavailable` when a store fails
    #[instrument(skip_all)]
    pub async fn resolve(&self, token: &SessionToken) -> std::result::Result<Principal, ResolveError> {
        if token.is_blank() {
            return Err(ResolveError::Unauthenticated);
        }

        let status = self
            .sessions
            .validate(token)
            .await
            .map_err(|e| unavailable("session lookup", &e))?;
        let claims = match status {
            SessionStatus::Active(claims) => claims,
            SessionStatus::Expired => {
                debug!("session expired");
                return Err(ResolveError::Unauthenticated);
            }
            SessionStatus::Unknown => {
                debug!("unknown session token");
                return Err(ResolveError::Unauthenticated);
            }
        };

        let user = self
            .users
            .find_by_id(claims.user_id)
            .await
            .map_err(|e| unavailable("user lookup", &e))?;
        user.ok_or_else(|| {
            debug!(user_id = %claims.user_id, "session refers to a missing user");
            ResolveError::PrincipalNotFound
        })
    }

    /// Finds the user with this email, creating a starter user if none exists.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` when the user store fails.
    #[instrument(skip_all)]
    pub async fn provision(&self, new_user: NewUser) -> std::result::Result<Principal, ResolveError> {
        let existing = self
            .users
            .find_by_email(new_user.email())
            .await
            .map_err(|e| unavailable("user lookup", &e))?;
        if let Some(principal) = existing {
            return Ok(principal);
        }

        let email = new_user.email().to_string();
        match self.users.create(new_user).await {
            Ok(principal) => {
                info!(user_id = %principal.id(), plan = principal.plan(), "provisioned user");
                Ok(principal)
            }
            Err(e) => {
                // A concurrent sign-in may have created the user first.
                debug!(error = %e, "user creation failed, retrying lookup");
                self.users
                    .find_by_email(&email)
                    .await
                    .map_err(|e| unavailable("user lookup", &e))?
                    .ok_or(ResolveError::Unavailable)
            }
        }
    }
}

fn unavailable(what: &str, e: &Report<StoreError>) -> ResolveError {
    error!(error = %e, "{what} failed");
    ResolveError::Unavailable
}

impl std::fmt::Debug for PrincipalResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrincipalResolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemorySessionStore, InMemoryUserRepository};
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;

    fn resolver() -> (
        PrincipalResolver,
        Arc<InMemorySessionStore>,
        Arc<InMemoryUserRepository>,
    ) {
        let sessions = Arc::new(InMemorySessionStore::new());
        let users = Arc::new(InMemoryUserRepository::new());
        let resolver = PrincipalResolver::new(sessions.clone(), users.clone());
        (resolver, sessions, users)
    }

    #[tokio::test]
    async fn active_session_resolves_to_user() {
        let (resolver, sessions, users) = resolver();
        let principal = Principal::new("ada@example.com", "Ada", PlanTier::Business);
        users.insert(principal.clone());
        sessions.insert_active("tok", principal.id(), ChronoDuration::hours(1));

        let resolved = resolver.resolve(&SessionToken::new("tok")).await.unwrap();
        assert_eq!(resolved, principal);
    }

    #[tokio::test]
    async fn blank_token_never_reaches_the_store() {
        let (resolver, sessions, _) = resolver();
        let err = resolver.resolve(&SessionToken::new("  ")).await.unwrap_err();
        assert_eq!(err, ResolveError::Unauthenticated);
        assert_eq!(sessions.lookups(), 0);
    }

    #[tokio::test]
    async fn unknown_and_expired_sessions_are_unauthenticated() {
        let (resolver, sessions, users) = resolver();
        let principal = Principal::new("ada@example.com", "Ada", PlanTier::Starter);
        users.insert(principal.clone());
        sessions.insert_expired("old", principal.id());

        assert_eq!(
            resolver.resolve(&SessionToken::new("nope")).await.unwrap_err(),
            ResolveError::Unauthenticated
        );
        assert_eq!(
            resolver.resolve(&SessionToken::new("old")).await.unwrap_err(),
            ResolveError::Unauthenticated
        );
        assert_eq!(users.lookups(), 0);
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let (resolver, sessions, _) = resolver();
        sessions.insert_active("tok", UserId::new(), ChronoDuration::hours(1));

        let err = resolver.resolve(&SessionToken::new("tok")).await.unwrap_err();
        assert_eq!(err, ResolveError::PrincipalNotFound);
    }

    #[tokio::test]
    async fn store_failure_is_unavailable_not_unauthenticated() {
        let (resolver, sessions, users) = resolver();
        let principal = Principal::new("ada@example.com", "Ada", PlanTier::Starter);
        users.insert(principal.clone());
        sessions.insert_active("tok", principal.id(), ChronoDuration::hours(1));

        sessions.set_unavailable(true);
        let err = resolver.resolve(&SessionToken::new("tok")).await.unwrap_err();
        assert_eq!(err, ResolveError::Unavailable);

        sessions.set_unavailable(false);
        users.set_unavailable(true);
        let err = resolver.resolve(&SessionToken::new("tok")).await.unwrap_err();
        assert_eq!(err, ResolveError::Unavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_store_is_waited_for() {
        let (resolver, sessions, users) = resolver();
        let principal = Principal::new("ada@example.com", "Ada", PlanTier::Starter);
        users.insert(principal.clone());
        sessions.insert_active("tok", principal.id(), ChronoDuration::hours(1));
        sessions.set_delay(Duration::from_secs(30));

        let resolved = resolver.resolve(&SessionToken::new("tok")).await.unwrap();
        assert_eq!(resolved.id(), principal.id());
    }

    #[tokio::test(start_paused = true)]
    async fn caller_deadline_cancels_the_lookup() {
        let (resolver, sessions, users) = resolver();
        sessions.insert_active("tok", UserId::new(), ChronoDuration::hours(1));
        sessions.set_delay(Duration::from_secs(30));

        let token = SessionToken::new("tok");
        let outcome =
            tokio::time::timeout(Duration::from_millis(50), resolver.resolve(&token)).await;
        assert!(outcome.is_err());
        assert_eq!(sessions.lookups(), 1);
        assert_eq!(users.lookups(), 0);
    }

    #[tokio::test]
    async fn provision_creates_starter_user_once() {
        let (resolver, _, users) = resolver();

        let first = resolver
            .provision(NewUser::new("  Ada@Example.com ", "Ada").with_google_id("g-1"))
            .await
            .unwrap();
        assert_eq!(first.email(), "ada@example.com");
        assert_eq!(first.plan_tier(), Some(PlanTier::Starter));
        assert_eq!(first.usage().integrations_count, 0);

        let second = resolver
            .provision(NewUser::new("ada@example.com", "Someone Else"))
            .await
            .unwrap();
        assert_eq!(second.id(), first.id());
        assert_eq!(second.name(), "Ada");
        assert_eq!(users.len(), 1);
    }

    #[tokio::test]
    async fn provision_surfaces_store_failure() {
        let (resolver, _, users) = resolver();
        users.set_unavailable(true);
        let err = resolver
            .provision(NewUser::new("ada@example.com", "Ada"))
            .await
            .unwrap_err();
        assert_eq!(err, ResolveError::Unavailable);
    }
}

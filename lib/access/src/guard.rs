//! The per-request access pipeline.
//!
//! `authorize` evaluates, in order and stopping at the first failure:
//! 1. session resolution
//! 2. the per-principal rate limit
//! 3. required plan tiers
//! 4. the plan quota for the requested action
//!
//! Nothing after a failed step runs, so an unauthenticated request never
//! consumes rate-limit budget and never reads quota state.

use crate::error::Rejection;
use crate::plan::PlanTier;
use crate::principal::Principal;
use crate::quota::{QuotaAction, check_quota};
use crate::rate_limit::RateLimiter;
use crate::resolver::PrincipalResolver;
use crate::session::SessionToken;
use tracing::{debug, instrument};

/// Per-route access requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthOptions {
    /// Tiers allowed to use the route. `None` allows every tier.
    pub required_plans: Option<Vec<PlanTier>>,
    /// Quota the route consumes.
    pub quota: Option<QuotaAction>,
}

impl AuthOptions {
    /// Options that only require a signed-in principal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the route to the given tiers.
    #[must_use]
    pub fn require_plans(mut self, plans: impl IntoIterator<Item = PlanTier>) -> Self {
        self.required_plans = Some(plans.into_iter().collect());
        self
    }

    /// Checks this quota before the route runs.
    #[must_use]
    pub fn with_quota(mut self, action: QuotaAction) -> Self {
        self.quota = Some(action);
        self
    }
}

/// Combines principal resolution, rate limiting and plan enforcement.
#[derive(Debug, Clone)]
pub struct AuthGuard {
    resolver: PrincipalResolver,
    limiter: RateLimiter,
}

impl AuthGuard {
    /// Creates a guard.
    #[must_use]
    pub fn new(resolver: PrincipalResolver, limiter: RateLimiter) -> Self {
        Self { resolver, limiter }
    }

    #[must_use]
    pub fn resolver(&self) -> &PrincipalResolver {
        &self.resolver
    }

    #[must_use]
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Authorizes a request carrying `token` against `options`.
    ///
    /// # Errors
    ///
    /// Returns the first `Rejection` in pipeline order.
    #[instrument(skip_all, fields(quota = ?options.quota))]
    pub async fn authorize(
        &self,
        token: Option<&SessionToken>,
        options: &AuthOptions,
    ) -> Result<Principal, Rejection> {
        let Some(token) = token else {
            debug!("request carries no session token");
            return Err(Rejection::Unauthenticated);
        };
        let principal = self.resolver.resolve(token).await?;

        let rate = self.limiter.check(&principal.id().to_string());
        if !rate.allowed {
            return Err(Rejection::RateLimited {
                reset_time: rate.reset_time.unwrap_or_else(chrono::Utc::now),
            });
        }

        if let Some(required) = &options.required_plans {
            let allowed = principal
                .plan_tier()
                .is_some_and(|tier| required.contains(&tier));
            if !allowed {
                debug!(user_id = %principal.id(), plan = principal.plan(), "plan not permitted");
                return Err(Rejection::PlanRequired {
                    required: required.clone(),
                    current: principal.plan().to_string(),
                });
            }
        }

        if let Some(action) = options.quota {
            let decision = check_quota(&principal, action);
            if !decision.allowed {
                debug!(user_id = %principal.id(), %action, "quota exceeded");
                return Err(Rejection::QuotaExceeded {
                    reason: decision.reason.unwrap_or_default(),
                });
            }
        }

        Ok(principal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemorySessionStore, InMemoryUserRepository};
    use crate::principal::Usage;
    use crate::rate_limit::RateLimitConfig;
    use chrono::{Duration, Utc};
    use integration_hub_core::UserId;
    use std::sync::Arc;

    struct Fixture {
        guard: AuthGuard,
        sessions: Arc<InMemorySessionStore>,
        users: Arc<InMemoryUserRepository>,
    }

    fn fixture(rate: RateLimitConfig) -> Fixture {
        let sessions = Arc::new(InMemorySessionStore::new());
        let users = Arc::new(InMemoryUserRepository::new());
        let resolver = PrincipalResolver::new(sessions.clone(), users.clone());
        Fixture {
            guard: AuthGuard::new(resolver, RateLimiter::new(rate)),
            sessions,
            users,
        }
    }

    fn signed_in(fixture: &Fixture, principal: Principal) -> SessionToken {
        fixture
            .sessions
            .insert_active("tok", principal.id(), Duration::hours(1));
        fixture.users.insert(principal);
        SessionToken::new("tok")
    }

    #[tokio::test]
    async fn missing_token_is_unauthenticated() {
        let f = fixture(RateLimitConfig::default());
        let err = f.guard.authorize(None, &AuthOptions::new()).await.unwrap_err();
        assert_eq!(err, Rejection::Unauthenticated);
        assert_eq!(f.sessions.lookups(), 0);
    }

    #[tokio::test]
    async fn expired_session_never_reaches_rate_or_quota_state() {
        let f = fixture(RateLimitConfig::per_minute(1));
        let principal = Principal::new("a@example.com", "A", PlanTier::Starter);
        f.users.insert(principal.clone());
        f.sessions.insert_expired("old", principal.id());

        let options = AuthOptions::new().with_quota(QuotaAction::CreateIntegration);
        for _ in 0..3 {
            let err = f
                .guard
                .authorize(Some(&SessionToken::new("old")), &options)
                .await
                .unwrap_err();
            assert_eq!(err, Rejection::Unauthenticated);
        }
        assert_eq!(f.guard.limiter().tracked_keys(), 0);
        assert_eq!(f.users.lookups(), 0);
    }

    #[tokio::test]
    async fn signed_in_principal_passes() {
        let f = fixture(RateLimitConfig::default());
        let principal = Principal::new("a@example.com", "A", PlanTier::Business);
        let token = signed_in(&f, principal.clone());

        let resolved = f
            .guard
            .authorize(Some(&token), &AuthOptions::new())
            .await
            .unwrap();
        assert_eq!(resolved.id(), principal.id());
    }

    #[tokio::test]
    async fn rate_limit_applies_before_quota() {
        let f = fixture(RateLimitConfig::per_minute(2));
        let principal = Principal::new("a@example.com", "A", PlanTier::Starter).with_usage(Usage {
            integrations_count: 3,
            ..Usage::default()
        });
        let token = signed_in(&f, principal);
        let options = AuthOptions::new().with_quota(QuotaAction::CreateIntegration);

        for _ in 0..2 {
            let err = f.guard.authorize(Some(&token), &options).await.unwrap_err();
            assert!(matches!(err, Rejection::QuotaExceeded { .. }));
        }
        let err = f.guard.authorize(Some(&token), &options).await.unwrap_err();
        match err {
            Rejection::RateLimited { reset_time } => assert!(reset_time > Utc::now()),
            other => panic!("expected rate limit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn quota_denial_carries_reason() {
        let f = fixture(RateLimitConfig::default());
        let principal = Principal::new("a@example.com", "A", PlanTier::Starter).with_usage(Usage {
            integrations_count: 3,
            ..Usage::default()
        });
        let token = signed_in(&f, principal);

        let err = f
            .guard
            .authorize(
                Some(&token),
                &AuthOptions::new().with_quota(QuotaAction::CreateIntegration),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            Rejection::QuotaExceeded {
                reason: "integration limit of 3 reached".to_string()
            }
        );
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn required_plans_reject_other_tiers() {
        let f = fixture(RateLimitConfig::default());
        let token = signed_in(&f, Principal::new("a@example.com", "A", PlanTier::Starter));
        let options = AuthOptions::new().require_plans([PlanTier::Business, PlanTier::Enterprise]);

        let err = f.guard.authorize(Some(&token), &options).await.unwrap_err();
        assert_eq!(
            err,
            Rejection::PlanRequired {
                required: vec![PlanTier::Business, PlanTier::Enterprise],
                current: "starter".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn required_plans_reject_corrupt_plan() {
        let f = fixture(RateLimitConfig::default());
        let now = Utc::now();
        let corrupt = Principal::with_all_fields(
            UserId::new(),
            "a@example.com".to_string(),
            "A".to_string(),
            "gold".to_string(),
            Usage::default(),
            now,
            now,
        );
        let token = signed_in(&f, corrupt);
        let options = AuthOptions::new().require_plans([PlanTier::Enterprise]);

        let err = f.guard.authorize(Some(&token), &options).await.unwrap_err();
        assert!(matches!(err, Rejection::PlanRequired { current, .. } if current == "gold"));
    }

    #[tokio::test]
    async fn store_outage_is_unavailable() {
        let f = fixture(RateLimitConfig::default());
        let token = signed_in(&f, Principal::new("a@example.com", "A", PlanTier::Starter));
        f.sessions.set_unavailable(true);

        let err = f
            .guard
            .authorize(Some(&token), &AuthOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err, Rejection::Unavailable);
        assert_eq!(err.status_code(), 503);
        assert_eq!(f.guard.limiter().tracked_keys(), 0);
    }

    #[tokio::test]
    async fn deleted_user_is_not_found() {
        let f = fixture(RateLimitConfig::default());
        let principal = Principal::new("a@example.com", "A", PlanTier::Starter);
        let token = signed_in(&f, principal.clone());
        f.users.remove(principal.id());

        let err = f
            .guard
            .authorize(Some(&token), &AuthOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err, Rejection::PrincipalNotFound);
    }
}

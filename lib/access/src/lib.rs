//! Access control for the integration hub.
//!
//! This crate provides:
//! - Principal resolution from session tokens (`PrincipalResolver`)
//! - Plan tiers, limits and quota checks (`PlanTier`, `check_quota`)
//! - Per-principal fixed-window rate limiting (`RateLimiter`)
//! - The combined per-request pipeline (`AuthGuard`)
//!
//! Session and user storage are traits; the server supplies Postgres
//! implementations and tests use the in-memory ones behind the
//! `test-util` feature.
//!
//! # Example
//!
//! ```
//! use integration_hub_access::{Principal, PlanTier, QuotaAction, Usage, check_quota};
//!
//! let principal = Principal::new("ops@example.com", "Ops", PlanTier::Starter)
//!     .with_usage(Usage { integrations_count: 3, ..Usage::default() });
//!
//! let decision = check_quota(&principal, QuotaAction::CreateIntegration);
//! assert!(!decision.allowed);
//! assert_eq!(decision.upgrade, Some(true));
//! ```

pub mod decision;
pub mod error;
pub mod guard;
pub mod plan;
pub mod principal;
pub mod quota;
pub mod rate_limit;
pub mod resolver;
pub mod session;

#[cfg(any(test, feature = "test-util"))]
pub mod memory;

pub use decision::AccessDecision;
pub use error::{Rejection, ResolveError, StoreError};
pub use guard::{AuthGuard, AuthOptions};
pub use plan::{Limit, PlanLimits, PlanTier, UnknownPlan};
pub use principal::{Principal, Usage};
pub use quota::{QuotaAction, check_quota};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use resolver::{NewUser, PrincipalResolver, UserRepository};
pub use session::{SessionClaims, SessionStatus, SessionStore, SessionToken};

//! Error types for the access crate.
//!
//! - `StoreError`: failures reported by session and user stores
//! - `ResolveError`: why a token did not resolve to a principal
//! - `Rejection`: why the guard refused a request

use crate::plan::PlanTier;
use chrono::{DateTime, Utc};
use std::fmt;

/// Errors from session and user store collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store could not be reached or failed the query.
    Unavailable { reason: String },
    /// The store did not answer in time.
    Timeout,
    /// A stored record could not be decoded.
    Corrupt { reason: String },
    /// A record with the same unique key already exists.
    Conflict { reason: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { reason } => write!(f, "store unavailable: {reason}"),
            Self::Timeout => write!(f, "store timed out"),
            Self::Corrupt { reason } => write!(f, "corrupt record: {reason}"),
            Self::Conflict { reason } => write!(f, "conflicting record: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors from resolving a session token to a principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No token, an unknown token, or an expired session.
    Unauthenticated,
    /// The session is valid but its user no longer exists.
    PrincipalNotFound,
    /// A collaborator failed; the caller should retry later.
    Unavailable,
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "unauthorized"),
            Self::PrincipalNotFound => write!(f, "user not found"),
            Self::Unavailable => write!(f, "authentication service unavailable"),
        }
    }
}

impl std::error::Error for ResolveError {}

/// A refused request, in guard evaluation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// No valid session.
    Unauthenticated,
    /// Session user does not exist.
    PrincipalNotFound,
    /// Session or user store failed.
    Unavailable,
    /// Too many requests in the current window.
    RateLimited { reset_time: DateTime<Utc> },
    /// The principal's plan is not one of the allowed tiers.
    PlanRequired {
        required: Vec<PlanTier>,
        current: String,
    },
    /// The plan quota does not allow the action.
    QuotaExceeded { reason: String },
}

impl Rejection {
    /// Returns the HTTP status code for this rejection.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthenticated => 401,
            Self::PrincipalNotFound => 404,
            Self::Unavailable => 503,
            Self::RateLimited { .. } => 429,
            Self::PlanRequired { .. } | Self::QuotaExceeded { .. } => 403,
        }
    }
}

impl From<ResolveError> for Rejection {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Unauthenticated => Self::Unauthenticated,
            ResolveError::PrincipalNotFound => Self::PrincipalNotFound,
            ResolveError::Unavailable => Self::Unavailable,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "unauthorized"),
            Self::PrincipalNotFound => write!(f, "user not found"),
            Self::Unavailable => write!(f, "authentication service unavailable"),
            Self::RateLimited { .. } => write!(f, "rate limit exceeded"),
            Self::PlanRequired { .. } => write!(f, "plan upgrade required"),
            Self::QuotaExceeded { reason } => write!(f, "{reason}"),
        }
    }
}

impl std::error::Error for Rejection {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_status_codes() {
        assert_eq!(Rejection::Unauthenticated.status_code(), 401);
        assert_eq!(Rejection::PrincipalNotFound.status_code(), 404);
        assert_eq!(Rejection::Unavailable.status_code(), 503);
        assert_eq!(
            Rejection::RateLimited {
                reset_time: Utc::now()
            }
            .status_code(),
            429
        );
        assert_eq!(
            Rejection::PlanRequired {
                required: vec![PlanTier::Business],
                current: "starter".to_string(),
            }
            .status_code(),
            403
        );
        assert_eq!(
            Rejection::QuotaExceeded {
                reason: "limit".to_string()
            }
            .status_code(),
            403
        );
    }

    #[test]
    fn resolve_errors_map_to_rejections() {
        assert_eq!(
            Rejection::from(ResolveError::Unauthenticated),
            Rejection::Unauthenticated
        );
        assert_eq!(
            Rejection::from(ResolveError::PrincipalNotFound),
            Rejection::PrincipalNotFound
        );
        assert_eq!(Rejection::from(ResolveError::Unavailable), Rejection::Unavailable);
    }

    #[test]
    fn unavailable_is_not_reported_as_unauthorized() {
        let err = ResolveError::Unavailable;
        assert_ne!(err.to_string(), ResolveError::Unauthenticated.to_string());
        assert_ne!(Rejection::from(err).status_code(), 401);
    }

    #[test]
    fn store_error_display() {
        let err = StoreError::Unavailable {
            reason: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("connection refused"));
        assert!(StoreError::Timeout.to_string().contains("timed out"));
    }
}

//! Session tokens and the session store seam.
//!
//! Sessions are issued by the sign-in flow and looked up here by their
//! opaque token. The store reports whether a token is active, expired or
//! unknown; it never decides anything about plans or quotas.

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use integration_hub_core::{Result, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque bearer token identifying a session.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Creates a token from its string form.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the token is empty or whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

impl From<&str> for SessionToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Claims carried by an active session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// The session's user.
    pub user_id: UserId,
    /// When the session stops being valid.
    pub expires_at: DateTime<Utc>,
}

impl SessionClaims {
    /// Returns true if the session has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Result of looking up a session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// The session is valid.
    Active(SessionClaims),
    /// The session existed but has expired.
    Expired,
    /// No session has this token.
    Unknown,
}

impl SessionStatus {
    /// Classifies stored claims at `now`.
    #[must_use]
    pub fn at(claims: SessionClaims, now: DateTime<Utc>) -> Self {
        if claims.is_expired_at(now) {
            Self::Expired
        } else {
            Self::Active(claims)
        }
    }
}

/// Looks up sessions by token.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Validates a session token.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot answer. An unknown or expired
    /// token is not an error.
    async fn validate(&self, token: &SessionToken) -> Result<SessionStatus, StoreError>;
}

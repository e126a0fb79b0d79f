//! In-memory session and user stores for tests.
//!
//! Both stores count lookups and can be switched into a failing mode, which
//! lets tests assert what the guard did and did not consult.

use crate::error::StoreError;
use crate::principal::{Principal, Usage};
use crate::resolver::{NewUser, UserRepository};
use crate::session::{SessionClaims, SessionStatus, SessionStore, SessionToken};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use integration_hub_core::{Result, UserId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Session store backed by a map of token to claims.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, SessionClaims>>,
    unavailable: AtomicBool,
    delay: Mutex<Option<std::time::Duration>>,
    lookups: AtomicUsize,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session that stays valid for `ttl`.
    pub fn insert_active(&self, token: &str, user_id: UserId, ttl: Duration) {
        self.insert(token, user_id, Utc::now() + ttl);
    }

    /// Adds a session that has already expired.
    pub fn insert_expired(&self, token: &str, user_id: UserId) {
        self.insert(token, user_id, Utc::now() - Duration::minutes(1));
    }

    fn insert(&self, token: &str, user_id: UserId, expires_at: DateTime<Utc>) {
        lock(&self.sessions).insert(
            token.to_string(),
            SessionClaims {
                user_id,
                expires_at,
            },
        );
    }

    /// Makes every lookup fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delays every lookup by `delay`.
    pub fn set_delay(&self, delay: std::time::Duration) {
        *lock(&self.delay) = Some(delay);
    }

    /// Number of `validate` calls so far.
    #[must_use]
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn validate(&self, token: &SessionToken) -> Result<SessionStatus, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                reason: "session store offline".to_string(),
            }
            .into());
        }
        let claims = lock(&self.sessions).get(token.as_str()).copied();
        Ok(match claims {
            Some(claims) => SessionStatus::at(claims, Utc::now()),
            None => SessionStatus::Unknown,
        })
    }
}

/// User repository backed by a map of ID to principal.
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    users: Mutex<HashMap<UserId, Principal>>,
    unavailable: AtomicBool,
    lookups: AtomicUsize,
}

impl InMemoryUserRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a principal, replacing any with the same ID.
    pub fn insert(&self, principal: Principal) {
        lock(&self.users).insert(principal.id(), principal);
    }

    /// Deletes a principal.
    pub fn remove(&self, id: UserId) {
        lock(&self.users).remove(&id);
    }

    /// Makes every call fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of lookups so far.
    #[must_use]
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.users).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                reason: "user store offline".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: UserId) -> Result<Option<Principal>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(lock(&self.users).get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(lock(&self.users)
            .values()
            .find(|principal| principal.email() == email)
            .cloned())
    }

    async fn create(&self, user: NewUser) -> Result<Principal, StoreError> {
        self.check_available()?;
        let mut users = lock(&self.users);
        if users.values().any(|principal| principal.email() == user.email()) {
            return Err(StoreError::Conflict {
                reason: format!("email {} already registered", user.email()),
            }
            .into());
        }
        let now = Utc::now();
        let principal = Principal::with_all_fields(
            UserId::new(),
            user.email().to_string(),
            user.name().to_string(),
            user.plan().as_str().to_string(),
            Usage::default(),
            now,
            now,
        );
        users.insert(principal.id(), principal.clone());
        Ok(principal)
    }
}

//! Database-backed session store and user repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use integration_hub_access::{
    NewUser, Principal, SessionClaims, SessionStatus, SessionStore, SessionToken, StoreError,
    Usage, UserRepository,
};
use integration_hub_core::{Result, UserId};
use sha2::{Digest, Sha256};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use tracing::instrument;

/// Returns the key a session token is stored under.
///
/// Session rows hold the hex SHA-256 of the token, so a database read does
/// not yield usable tokens. The sign-in flow must store rows under this key.
pub fn session_token_hash(token: &SessionToken) -> String {
    hex::encode(Sha256::digest(token.as_str().as_bytes()))
}

/// Maps a sqlx error onto the store error the access layer understands.
pub(crate) fn store_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut => StoreError::Timeout,
        sqlx::Error::Decode(_) | sqlx::Error::ColumnDecode { .. } => StoreError::Corrupt {
            reason: err.to_string(),
        },
        sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::Conflict {
            reason: db.message().to_string(),
        },
        other => StoreError::Unavailable {
            reason: other.to_string(),
        },
    }
}

pub(crate) fn decode_error(message: String) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        message,
    )))
}

/// Row type for user queries.
#[derive(FromRow)]
struct UserRow {
    id: String,
    email: String,
    name: String,
    plan: String,
    integrations_count: i32,
    syncs_this_month: i32,
    last_sync: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn try_into_principal(self) -> std::result::Result<Principal, sqlx::Error> {
        let id = UserId::from_str(&self.id)
            .map_err(|e| decode_error(format!("invalid user id '{}': {}", self.id, e)))?;
        let counter = |name: &str, value: i32| {
            u32::try_from(value)
                .map_err(|_| decode_error(format!("negative {name} for user '{}'", self.id)))
        };
        let usage = Usage {
            integrations_count: counter("integrations_count", self.integrations_count)?,
            syncs_this_month: counter("syncs_this_month", self.syncs_this_month)?,
            last_sync: self.last_sync,
        };
        Ok(Principal::with_all_fields(
            id,
            self.email,
            self.name,
            self.plan,
            usage,
            self.created_at,
            self.updated_at,
        ))
    }
}

/// Repository for user operations.
#[derive(Debug, Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Creates a new user repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_by(
        &self,
        column: &'static str,
        value: String,
    ) -> std::result::Result<Option<Principal>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT id, email, name, plan, integrations_count, syncs_this_month,
                   last_sync, created_at, updated_at
            FROM users
            WHERE {column} = $1
            "#
        );
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        row.map(UserRow::try_into_principal).transpose()
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: UserId) -> Result<Option<Principal>, StoreError> {
        Ok(self
            .fetch_one_by("id", id.to_string())
            .await
            .map_err(store_error)?)
    }

    #[instrument(skip_all)]
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, StoreError> {
        Ok(self
            .fetch_one_by("email", email.to_lowercase())
            .await
            .map_err(store_error)?)
    }

    #[instrument(skip_all)]
    async fn create(&self, user: NewUser) -> Result<Principal, StoreError> {
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

        sqlx::query(
            r#"
            INSERT INTO users (id, email, name, google_id, plan, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(principal.id().to_string())
        .bind(principal.email())
        .bind(principal.name())
        .bind(user.google_id())
        .bind(principal.plan())
        .bind(principal.created_at())
        .bind(principal.updated_at())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(principal)
    }
}

/// Row type for session queries.
#[derive(FromRow)]
struct SessionRow {
    user_id: String,
    expires_at: DateTime<Utc>,
}

impl SessionRow {
    fn try_into_claims(self) -> std::result::Result<SessionClaims, sqlx::Error> {
        let user_id = UserId::from_str(&self.user_id)
            .map_err(|e| decode_error(format!("invalid user id '{}': {}", self.user_id, e)))?;
        Ok(SessionClaims {
            user_id,
            expires_at: self.expires_at,
        })
    }
}

/// Session store backed by the `sessions` table.
#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    /// Creates a new session store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Deletes expired sessions.
    pub async fn delete_expired(&self) -> std::result::Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE expires_at < NOW()
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    #[instrument(skip_all)]
    async fn validate(&self, token: &SessionToken) -> Result<SessionStatus, StoreError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT user_id, expires_at
            FROM sessions
            WHERE token_hash = $1
            "#,
        )
        .bind(session_token_hash(token))
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        let Some(row) = row else {
            return Ok(SessionStatus::Unknown);
        };
        let claims = row.try_into_claims().map_err(store_error)?;
        Ok(SessionStatus::at(claims, Utc::now()))
    }
}

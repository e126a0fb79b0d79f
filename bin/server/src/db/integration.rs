//! Database repository for integrations.
//!
//! Credentials are stored only as sealed tokens. Changes to the number of
//! integrations and to sync counts update the owner's usage counters in the
//! same transaction.

use crate::auth::db::decode_error;
use chrono::{DateTime, Utc};
use integration_hub_core::{IntegrationId, UserId};
use integration_hub_vault::{ConnectorKind, SealedToken};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use tracing::instrument;

/// Lifecycle status of an integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationStatus {
    /// Created but never synced.
    Setup,
    /// Syncing normally.
    Active,
    /// Stopped by the owner.
    Paused,
    /// The last sync failed.
    Error,
}

impl IntegrationStatus {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Error => "error",
        }
    }

    fn from_str_value(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            "paused" => Self::Paused,
            "error" => Self::Error,
            _ => Self::Setup,
        }
    }
}

/// An integration record.
#[derive(Debug, Clone)]
pub struct IntegrationRecord {
    pub id: IntegrationId,
    pub user_id: UserId,
    pub name: String,
    pub source_kind: ConnectorKind,
    pub source_token: SealedToken,
    pub destination_kind: ConnectorKind,
    pub destination_token: SealedToken,
    pub status: IntegrationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl IntegrationRecord {
    /// Creates a new record in `Setup` status.
    #[must_use]
    pub fn new(
        user_id: UserId,
        name: String,
        source: (ConnectorKind, SealedToken),
        destination: (ConnectorKind, SealedToken),
    ) -> Self {
        let now = Utc::now();
        Self {
            id: IntegrationId::new(),
            user_id,
            name,
            source_kind: source.0,
            source_token: source.1,
            destination_kind: destination.0,
            destination_token: destination.1,
            status: IntegrationStatus::Setup,
            created_at: now,
            updated_at: now,
            last_sync_at: None,
        }
    }
}

/// Row type for integration queries.
#[derive(FromRow)]
struct IntegrationRow {
    id: String,
    user_id: String,
    name: String,
    source_type: String,
    source_credentials: String,
    destination_type: String,
    destination_credentials: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_sync_at: Option<DateTime<Utc>>,
}

impl IntegrationRow {
    fn try_into_record(self) -> Result<IntegrationRecord, sqlx::Error> {
        let id = IntegrationId::from_str(&self.id)
            .map_err(|e| decode_error(format!("invalid integration id '{}': {}", self.id, e)))?;
        let user_id = UserId::from_str(&self.user_id)
            .map_err(|e| decode_error(format!("invalid user id '{}': {}", self.user_id, e)))?;
        let kind = |value: &str| {
            ConnectorKind::parse(value)
                .ok_or_else(|| decode_error(format!("unknown connector type '{value}'")))
        };

        Ok(IntegrationRecord {
            id,
            user_id,
            name: self.name,
            source_kind: kind(&self.source_type)?,
            source_token: SealedToken::new(self.source_credentials),
            destination_kind: kind(&self.destination_type)?,
            destination_token: SealedToken::new(self.destination_credentials),
            status: IntegrationStatus::from_str_value(&self.status),
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_sync_at: self.last_sync_at,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, user_id, name, source_type, source_credentials,
           destination_type, destination_credentials, status,
           created_at, updated_at, last_sync_at
    FROM integrations
"#;

/// Repository for integration operations.
#[derive(Debug, Clone)]
pub struct IntegrationRepository {
    pool: PgPool,
}

impl IntegrationRepository {
    /// Creates a new repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Lists a user's integrations, newest first.
    #[instrument(skip(self))]
    pub async fn list_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<IntegrationRecord>, sqlx::Error> {
        let sql = format!("{SELECT_COLUMNS} WHERE user_id = $1 ORDER BY created_at DESC");
        let rows: Vec<IntegrationRow> = sqlx::query_as(&sql)
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(|r| r.try_into_record()).collect()
    }

    /// Finds an integration owned by the user.
    #[instrument(skip(self))]
    pub async fn find_for_user(
        &self,
        id: IntegrationId,
        user_id: UserId,
    ) -> Result<Option<IntegrationRecord>, sqlx::Error> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = $1 AND user_id = $2");
        let row: Option<IntegrationRow> = sqlx::query_as(&sql)
            .bind(id.to_string())
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(IntegrationRow::try_into_record).transpose()
    }

    /// Stores a new integration and counts it against the owner.
    #[instrument(skip(self, record), fields(integration_id = %record.id))]
    pub async fn create(&self, record: &IntegrationRecord) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO integrations (id, user_id, name, source_type, source_credentials,
                                      destination_type, destination_credentials, status,
                                      created_at, updated_at, last_sync_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.user_id.to_string())
        .bind(&record.name)
        .bind(record.source_kind.as_str())
        .bind(record.source_token.as_str())
        .bind(record.destination_kind.as_str())
        .bind(record.destination_token.as_str())
        .bind(record.status.as_str())
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(record.last_sync_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE users
            SET integrations_count = integrations_count + 1, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(record.user_id.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await
    }

    /// Deletes an integration owned by the user and releases its slot.
    ///
    /// Returns false if no such integration exists.
    #[instrument(skip(self))]
    pub async fn delete_for_user(
        &self,
        id: IntegrationId,
        user_id: UserId,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query(
            r#"
            DELETE FROM integrations
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if deleted == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE users
            SET integrations_count = GREATEST(integrations_count - 1, 0), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Records a sync run for the integration and its owner.
    #[instrument(skip(self))]
    pub async fn record_sync(
        &self,
        id: IntegrationId,
        user_id: UserId,
    ) -> Result<DateTime<Utc>, sqlx::Error> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE integrations
            SET status = $3, last_sync_at = $4, updated_at = $4
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .bind(IntegrationStatus::Active.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE users
            SET syncs_this_month = syncs_this_month + 1, last_sync = $2, updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(user_id.to_string())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(now)
    }

    /// Marks an integration as failed.
    #[instrument(skip(self))]
    pub async fn mark_error(&self, id: IntegrationId) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE integrations
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .bind(IntegrationStatus::Error.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

//! The resolved identity of a caller.
//!
//! A principal is a user record together with its plan tag and usage
//! counters. The plan tag is kept exactly as stored so that a corrupt value
//! stays visible to the quota engine instead of being coerced to a default.

use crate::plan::PlanTier;
use chrono::{DateTime, Utc};
use integration_hub_core::UserId;
use serde::{Deserialize, Serialize};

/// Usage counters maintained by the sync executor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    /// Integrations currently configured.
    pub integrations_count: u32,
    /// Sync executions in the current billing month.
    pub syncs_this_month: u32,
    /// When the most recent sync ran.
    pub last_sync: Option<DateTime<Utc>>,
}

/// An authenticated user of the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    id: UserId,
    email: String,
    name: String,
    plan: String,
    usage: Usage,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Principal {
    /// Creates a new principal with no usage.
    #[must_use]
    pub fn new(email: impl Into<String>, name: impl Into<String>, plan: PlanTier) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            email: email.into(),
            name: name.into(),
            plan: plan.as_str().to_string(),
            usage: Usage::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates a principal with all fields specified.
    ///
    /// Use this when reconstituting a user from storage.
    #[must_use]
    pub fn with_all_fields(
        id: UserId,
        email: String,
        name: String,
        plan: String,
        usage: Usage,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            email,
            name,
            plan,
            usage,
            created_at,
            updated_at,
        }
    }

    /// Replaces the usage counters.
    #[must_use]
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the plan tag as stored.
    #[must_use]
    pub fn plan(&self) -> &str {
        &self.plan
    }

    /// Returns the plan tier, or `None` if the stored tag is unknown.
    #[must_use]
    pub fn plan_tier(&self) -> Option<PlanTier> {
        self.plan.parse().ok()
    }

    #[must_use]
    pub fn usage(&self) -> &Usage {
        &self.usage
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

//! Plan quota enforcement.
//!
//! The engine is a pure function of the principal's plan tag, its usage
//! counters and the requested action. It never increments counters; the
//! executor of the action does that. Concurrent actions can therefore push a
//! tenant one unit over its ceiling, which is accepted as a soft limit.

use crate::decision::AccessDecision;
use crate::principal::Principal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Actions governed by plan quotas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaAction {
    /// Creating another integration.
    CreateIntegration,
    /// Running a sync.
    Sync,
    /// Configuring a webhook destination.
    ConfigureWebhook,
}

impl fmt::Display for QuotaAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateIntegration => f.write_str("create_integration"),
            Self::Sync => f.write_str("sync"),
            Self::ConfigureWebhook => f.write_str("configure_webhook"),
        }
    }
}

/// Decides whether the principal's plan allows the action right now.
#[must_use]
pub fn check_quota(principal: &Principal, action: QuotaAction) -> AccessDecision {
    let Some(tier) = principal.plan_tier() else {
        warn!(
            user_id = %principal.id(),
            plan = principal.plan(),
            "principal has an invalid plan tag"
        );
        return AccessDecision::quota_exceeded("invalid plan");
    };
    let limits = tier.limits();
    let usage = principal.usage();

    match action {
        QuotaAction::CreateIntegration => {
            if !limits.integrations.has_room(usage.integrations_count) {
                return AccessDecision::quota_exceeded(format!(
                    "integration limit of {} reached",
                    limits.integrations.as_raw()
                ));
            }
        }
        QuotaAction::Sync => {
            if !limits.syncs_per_month.has_room(usage.syncs_this_month) {
                return AccessDecision::quota_exceeded(format!(
                    "sync limit of {} per month reached",
                    limits.syncs_per_month.as_raw()
                ));
            }
        }
        QuotaAction::ConfigureWebhook => {
            if !limits.webhooks {
                return AccessDecision::quota_exceeded(format!(
                    "webhooks are not available on the {tier} plan"
                ));
            }
        }
    }

    AccessDecision::allow()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::PlanTier;
    use crate::principal::Usage;
    use chrono::Utc;
    use integration_hub_core::UserId;

    fn principal(plan: PlanTier, integrations: u32, syncs: u32) -> Principal {
        Principal::new("ops@example.com", "Ops", plan).with_usage(Usage {
            integrations_count: integrations,
            syncs_this_month: syncs,
            last_sync: None,
        })
    }

    fn principal_with_tag(tag: &str) -> Principal {
        let now = Utc::now();
        Principal::with_all_fields(
            UserId::new(),
            "ops@example.com".to_string(),
            "Ops".to_string(),
            tag.to_string(),
            Usage::default(),
            now,
            now,
        )
    }

    #[test]
    fn starter_at_integration_limit_is_denied_with_upgrade() {
        let decision = check_quota(&principal(PlanTier::Starter, 3, 0), QuotaAction::CreateIntegration);
        assert!(!decision.allowed);
        assert_eq!(decision.upgrade, Some(true));
        assert_eq!(decision.reason.as_deref(), Some("integration limit of 3 reached"));
    }

    #[test]
    fn starter_below_integration_limit_is_allowed() {
        let decision = check_quota(&principal(PlanTier::Starter, 2, 0), QuotaAction::CreateIntegration);
        assert!(decision.allowed);
        assert_eq!(decision.upgrade, None);
    }

    #[test]
    fn enterprise_is_never_capped() {
        let huge = principal(PlanTier::Enterprise, u32::MAX, u32::MAX);
        assert!(check_quota(&huge, QuotaAction::CreateIntegration).allowed);
        assert!(check_quota(&huge, QuotaAction::Sync).allowed);
        assert!(check_quota(&huge, QuotaAction::ConfigureWebhook).allowed);
    }

    #[test]
    fn sync_limit_per_plan() {
        assert!(check_quota(&principal(PlanTier::Starter, 0, 999), QuotaAction::Sync).allowed);

        let denied = check_quota(&principal(PlanTier::Starter, 0, 1000), QuotaAction::Sync);
        assert!(!denied.allowed);
        assert_eq!(denied.upgrade, Some(true));
        assert_eq!(
            denied.reason.as_deref(),
            Some("sync limit of 1000 per month reached")
        );

        assert!(check_quota(&principal(PlanTier::Business, 0, 1000), QuotaAction::Sync).allowed);
        assert!(!check_quota(&principal(PlanTier::Business, 0, 10_000), QuotaAction::Sync).allowed);
    }

    #[test]
    fn webhooks_need_business_or_higher() {
        let starter = check_quota(&principal(PlanTier::Starter, 0, 0), QuotaAction::ConfigureWebhook);
        assert!(!starter.allowed);
        assert_eq!(starter.upgrade, Some(true));
        assert!(check_quota(&principal(PlanTier::Business, 0, 0), QuotaAction::ConfigureWebhook).allowed);
    }

    #[test]
    fn invalid_plan_is_always_denied() {
        for tag in ["gold", "", "STARTER"] {
            for action in [
                QuotaAction::CreateIntegration,
                QuotaAction::Sync,
                QuotaAction::ConfigureWebhook,
            ] {
                let decision = check_quota(&principal_with_tag(tag), action);
                assert!(!decision.allowed);
                assert_eq!(decision.reason.as_deref(), Some("invalid plan"));
            }
        }
    }

    #[test]
    fn quota_check_does_not_touch_usage() {
        let principal = principal(PlanTier::Business, 4, 12);
        let before = *principal.usage();
        let _ = check_quota(&principal, QuotaAction::CreateIntegration);
        let _ = check_quota(&principal, QuotaAction::Sync);
        assert_eq!(principal.usage(), &before);
    }
}

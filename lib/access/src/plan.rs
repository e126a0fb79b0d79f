//! Plan tiers and their static limits.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Subscription tier of a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    /// Entry tier.
    Starter,
    /// Mid tier.
    Business,
    /// Unlimited tier.
    Enterprise,
}

impl PlanTier {
    /// Returns the stable tag stored on user records.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starter => "starter",
            Self::Business => "business",
            Self::Enterprise => "enterprise",
        }
    }

    /// Returns the limits for this tier.
    #[must_use]
    pub fn limits(&self) -> PlanLimits {
        match self {
            Self::Starter => PlanLimits {
                integrations: Limit::Max(3),
                syncs_per_month: Limit::Max(1000),
                webhooks: false,
                advanced_features: false,
            },
            Self::Business => PlanLimits {
                integrations: Limit::Max(10),
                syncs_per_month: Limit::Max(10_000),
                webhooks: true,
                advanced_features: false,
            },
            Self::Enterprise => PlanLimits {
                integrations: Limit::Unlimited,
                syncs_per_month: Limit::Unlimited,
                webhooks: true,
                advanced_features: true,
            },
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored plan tag is not a known tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPlan {
    /// The offending tag.
    pub tag: String,
}

impl fmt::Display for UnknownPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown plan tier '{}'", self.tag)
    }
}

impl std::error::Error for UnknownPlan {}

impl FromStr for PlanTier {
    type Err = UnknownPlan;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "starter" => Ok(Self::Starter),
            "business" => Ok(Self::Business),
            "enterprise" => Ok(Self::Enterprise),
            other => Err(UnknownPlan {
                tag: other.to_string(),
            }),
        }
    }
}

/// A numeric ceiling that may be unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// At most this many.
    Max(u32),
    /// No ceiling.
    Unlimited,
}

impl Limit {
    /// Returns the wire form, `-1` for unlimited.
    #[must_use]
    pub fn as_raw(&self) -> i64 {
        match self {
            Self::Max(max) => i64::from(*max),
            Self::Unlimited => -1,
        }
    }

    /// Returns true if `used` units leave room for one more.
    #[must_use]
    pub fn has_room(&self, used: u32) -> bool {
        match self {
            Self::Max(max) => used < *max,
            Self::Unlimited => true,
        }
    }
}

impl Serialize for Limit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_raw())
    }
}

/// Static ceilings for one plan tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanLimits {
    /// Maximum concurrent integrations.
    pub integrations: Limit,
    /// Maximum sync executions per month.
    pub syncs_per_month: Limit,
    /// Whether webhook destinations are available.
    pub webhooks: bool,
    /// Whether advanced features are available.
    pub advanced_features: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_limits_table() {
        let starter = PlanTier::Starter.limits();
        assert_eq!(starter.integrations, Limit::Max(3));
        assert_eq!(starter.syncs_per_month, Limit::Max(1000));
        assert!(!starter.webhooks);

        let business = PlanTier::Business.limits();
        assert_eq!(business.integrations, Limit::Max(10));
        assert_eq!(business.syncs_per_month, Limit::Max(10_000));
        assert!(business.webhooks);
        assert!(!business.advanced_features);

        let enterprise = PlanTier::Enterprise.limits();
        assert_eq!(enterprise.integrations, Limit::Unlimited);
        assert_eq!(enterprise.syncs_per_month, Limit::Unlimited);
        assert!(enterprise.advanced_features);
    }

    #[test]
    fn plan_tag_parsing() {
        assert_eq!("business".parse::<PlanTier>(), Ok(PlanTier::Business));
        let err = "gold".parse::<PlanTier>().unwrap_err();
        assert_eq!(err.tag, "gold");
        assert!("Starter".parse::<PlanTier>().is_err());
    }

    #[test]
    fn limit_raw_forms() {
        assert_eq!(Limit::Unlimited.as_raw(), -1);
        assert_eq!(Limit::Max(10).as_raw(), 10);
    }

    #[test]
    fn limit_room() {
        assert!(Limit::Max(3).has_room(2));
        assert!(!Limit::Max(3).has_room(3));
        assert!(!Limit::Max(0).has_room(0));
        assert!(Limit::Unlimited.has_room(u32::MAX));
    }

    #[test]
    fn limits_serialize_with_unlimited_as_minus_one() {
        let json = serde_json::to_value(PlanTier::Enterprise.limits()).expect("serialize");
        assert_eq!(json["integrations"], -1);
        assert_eq!(json["syncsPerMonth"], -1);
        assert_eq!(json["advancedFeatures"], true);
    }
}

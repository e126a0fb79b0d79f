//! Results of quota and rate checks.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of a quota or rate-limit check.
///
/// Quota denials carry `upgrade`; rate checks carry `remaining` and
/// `reset_time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_time: Option<DateTime<Utc>>,
}

impl AccessDecision {
    /// An unconditional allow.
    #[must_use]
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            upgrade: None,
            remaining: None,
            reset_time: None,
        }
    }

    /// A quota denial whose remedy is a plan upgrade.
    #[must_use]
    pub fn quota_exceeded(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            upgrade: Some(true),
            remaining: None,
            reset_time: None,
        }
    }

    /// A request admitted by the rate limiter.
    #[must_use]
    pub fn within_rate(remaining: u32, reset_time: DateTime<Utc>) -> Self {
        Self {
            allowed: true,
            reason: None,
            upgrade: None,
            remaining: Some(remaining),
            reset_time: Some(reset_time),
        }
    }

    /// A request refused by the rate limiter.
    #[must_use]
    pub fn rate_limited(reset_time: DateTime<Utc>) -> Self {
        Self {
            allowed: false,
            reason: Some("rate limit exceeded".to_string()),
            upgrade: None,
            remaining: Some(0),
            reset_time: Some(reset_time),
        }
    }
}

//! Connector credential schemas.
//!
//! Each connector has its own credential shape. Credentials are validated at
//! the vault boundary, before sealing and again after opening, so an
//! integration never stores or hands out a payload its connector cannot use.

use crate::error::CredentialError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The third-party services an integration can connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectorKind {
    /// Stripe payments.
    Stripe,
    /// Mailchimp audiences.
    Mailchimp,
    /// HubSpot CRM.
    Hubspot,
    /// Google Forms responses.
    GoogleForms,
    /// Google Sheets spreadsheets.
    GoogleSheets,
    /// Outbound HTTP webhook.
    Webhook,
}

impl ConnectorKind {
    /// Returns the stable string form used in storage and APIs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stripe => "stripe",
            Self::Mailchimp => "mailchimp",
            Self::Hubspot => "hubspot",
            Self::GoogleForms => "google-forms",
            Self::GoogleSheets => "google-sheets",
            Self::Webhook => "webhook",
        }
    }

    /// Parses the stable string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "stripe" => Some(Self::Stripe),
            "mailchimp" => Some(Self::Mailchimp),
            "hubspot" => Some(Self::Hubspot),
            "google-forms" => Some(Self::GoogleForms),
            "google-sheets" => Some(Self::GoogleSheets),
            "webhook" => Some(Self::Webhook),
            _ => None,
        }
    }

    /// Returns true if the connector can be used on the given side.
    #[must_use]
    pub fn supports(&self, role: ConnectorRole) -> bool {
        match role {
            ConnectorRole::Source => matches!(
                self,
                Self::Stripe | Self::Mailchimp | Self::Hubspot | Self::GoogleForms
            ),
            ConnectorRole::Destination => matches!(
                self,
                Self::GoogleSheets | Self::Hubspot | Self::Mailchimp | Self::Webhook
            ),
        }
    }
}

impl fmt::Display for ConnectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of an integration a connector sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorRole {
    /// Data is read from this connector.
    Source,
    /// Data is written to this connector.
    Destination,
}

impl fmt::Display for ConnectorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Destination => f.write_str("destination"),
        }
    }
}

/// OAuth 2.0 tokens obtained from the external identity provider.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl OAuthTokens {
    /// Creates tokens with only an access token.
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
            scope: None,
        }
    }
}

/// Credentials for one connector, keyed by connector type.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ConnectorCredentials {
    /// Stripe restricted or secret API key.
    Stripe { secret_key: String },
    /// Mailchimp API key and data center prefix (e.g. `us6`).
    Mailchimp {
        api_key: String,
        server_prefix: String,
    },
    /// HubSpot private app access token.
    Hubspot { access_token: String },
    /// Google Forms OAuth grant.
    GoogleForms { oauth: OAuthTokens },
    /// Google Sheets OAuth grant.
    GoogleSheets { oauth: OAuthTokens },
    /// Webhook target and optional signing secret.
    Webhook {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signing_secret: Option<String>,
    },
}

impl ConnectorCredentials {
    /// Returns the connector these credentials belong to.
    #[must_use]
    pub fn kind(&self) -> ConnectorKind {
        match self {
            Self::Stripe { .. } => ConnectorKind::Stripe,
            Self::Mailchimp { .. } => ConnectorKind::Mailchimp,
            Self::Hubspot { .. } => ConnectorKind::Hubspot,
            Self::GoogleForms { .. } => ConnectorKind::GoogleForms,
            Self::GoogleSheets { .. } => ConnectorKind::GoogleSheets,
            Self::Webhook { .. } => ConnectorKind::Webhook,
        }
    }

    /// Checks the connector-specific schema.
    ///
    /// # Errors
    ///
    /// Returns the first field that is missing or malformed.
    pub fn validate(&self) -> Result<(), CredentialError> {
        let connector = self.kind();
        match self {
            Self::Stripe { secret_key } => {
                require(connector, "secret_key", secret_key)?;
                if !(secret_key.starts_with("sk_") || secret_key.starts_with("rk_")) {
                    return Err(CredentialError::InvalidField {
                        connector,
                        field: "secret_key",
                        reason: "must start with 'sk_' or 'rk_'",
                    });
                }
            }
            Self::Mailchimp {
                api_key,
                server_prefix,
            } => {
                require(connector, "api_key", api_key)?;
                require(connector, "server_prefix", server_prefix)?;
                if !server_prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
                    return Err(CredentialError::InvalidField {
                        connector,
                        field: "server_prefix",
                        reason: "must be alphanumeric",
                    });
                }
            }
            Self::Hubspot { access_token } => require(connector, "access_token", access_token)?,
            Self::GoogleForms { oauth } | Self::GoogleSheets { oauth } => {
                require(connector, "access_token", &oauth.access_token)?;
            }
            Self::Webhook {
                url,
                signing_secret,
            } => {
                require(connector, "url", url)?;
                let rest = url
                    .strip_prefix("https://")
                    .or_else(|| url.strip_prefix("http://"));
                if rest.is_none_or(str::is_empty) {
                    return Err(CredentialError::InvalidField {
                        connector,
                        field: "url",
                        reason: "must be an absolute http(s) URL",
                    });
                }
                if let Some(secret) = signing_secret {
                    require(connector, "signing_secret", secret)?;
                }
            }
        }
        Ok(())
    }

    /// Validates the schema and that the connector fits the given side.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails or the role is unsupported.
    pub fn validate_for(&self, role: ConnectorRole) -> Result<(), CredentialError> {
        let connector = self.kind();
        if !connector.supports(role) {
            return Err(CredentialError::UnsupportedRole { connector, role });
        }
        self.validate()
    }
}

fn require(
    connector: ConnectorKind,
    field: &'static str,
    value: &str,
) -> Result<(), CredentialError> {
    if value.trim().is_empty() {
        return Err(CredentialError::MissingField { connector, field });
    }
    Ok(())
}

// Credential values must never reach logs, so Debug only names the connector.
impl fmt::Debug for ConnectorCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorCredentials")
            .field("type", &self.kind())
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for OAuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokens")
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connector_kind_string_forms_roundtrip() {
        for kind in [
            ConnectorKind::Stripe,
            ConnectorKind::Mailchimp,
            ConnectorKind::Hubspot,
            ConnectorKind::GoogleForms,
            ConnectorKind::GoogleSheets,
            ConnectorKind::Webhook,
        ] {
            assert_eq!(ConnectorKind::parse(kind.as_str()), Some(kind));
            let json = serde_json::to_string(&kind).expect("serialize");
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
        assert_eq!(ConnectorKind::parse("salesforce"), None);
    }

    #[test]
    fn connector_roles() {
        assert!(ConnectorKind::Stripe.supports(ConnectorRole::Source));
        assert!(!ConnectorKind::Stripe.supports(ConnectorRole::Destination));
        assert!(ConnectorKind::Hubspot.supports(ConnectorRole::Source));
        assert!(ConnectorKind::Hubspot.supports(ConnectorRole::Destination));
        assert!(!ConnectorKind::Webhook.supports(ConnectorRole::Source));
        assert!(ConnectorKind::GoogleSheets.supports(ConnectorRole::Destination));
    }

    #[test]
    fn stripe_key_prefix_is_checked() {
        let valid = ConnectorCredentials::Stripe {
            secret_key: "sk_test_abc".to_string(),
        };
        assert!(valid.validate().is_ok());

        let invalid = ConnectorCredentials::Stripe {
            secret_key: "pk_test_abc".to_string(),
        };
        assert!(matches!(
            invalid.validate(),
            Err(CredentialError::InvalidField {
                field: "secret_key",
                ..
            })
        ));
    }

    #[test]
    fn blank_fields_are_missing() {
        let creds = ConnectorCredentials::Mailchimp {
            api_key: "key-us6".to_string(),
            server_prefix: "  ".to_string(),
        };
        assert_eq!(
            creds.validate(),
            Err(CredentialError::MissingField {
                connector: ConnectorKind::Mailchimp,
                field: "server_prefix",
            })
        );
    }

    #[test]
    fn webhook_url_must_be_absolute() {
        let relative = ConnectorCredentials::Webhook {
            url: "/hooks/in".to_string(),
            signing_secret: None,
        };
        assert!(relative.validate().is_err());

        let bare_scheme = ConnectorCredentials::Webhook {
            url: "https://".to_string(),
            signing_secret: None,
        };
        assert!(bare_scheme.validate().is_err());

        let valid = ConnectorCredentials::Webhook {
            url: "https://hooks.example.com/in".to_string(),
            signing_secret: Some("whsec".to_string()),
        };
        assert!(valid.validate().is_ok());
    }

    #[test]
    fn validate_for_checks_role_first() {
        let creds = ConnectorCredentials::Webhook {
            url: "https://hooks.example.com/in".to_string(),
            signing_secret: None,
        };
        assert_eq!(
            creds.validate_for(ConnectorRole::Source),
            Err(CredentialError::UnsupportedRole {
                connector: ConnectorKind::Webhook,
                role: ConnectorRole::Source,
            })
        );
        assert!(creds.validate_for(ConnectorRole::Destination).is_ok());
    }

    #[test]
    fn serialized_form_is_tagged_by_connector() {
        let creds = ConnectorCredentials::GoogleSheets {
            oauth: OAuthTokens::new("ya29.token"),
        };
        let value = serde_json::to_value(&creds).expect("serialize");
        assert_eq!(value["type"], "google-sheets");
        assert_eq!(value["oauth"]["access_token"], "ya29.token");
        assert!(value["oauth"].get("refresh_token").is_none());
    }

    #[test]
    fn debug_does_not_leak_secrets() {
        let creds = ConnectorCredentials::Stripe {
            secret_key: "sk_live_supersecret".to_string(),
        };
        let debug = format!("{creds:?}");
        assert!(debug.contains("Stripe"));
        assert!(!debug.contains("supersecret"));
    }
}

//! Domain error types for API handlers.
//!
//! Each variant keeps its diagnostic detail for the logs and renders a fixed,
//! user-safe message in the response body.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use integration_hub_vault::VaultError;
use serde_json::json;
use std::fmt;

/// Errors returned by route handlers.
#[derive(Debug)]
pub enum ApiError {
    /// The requested resource does not exist or is not the caller's.
    NotFound { resource: &'static str },
    /// The request body or path was malformed.
    InvalidRequest { details: String },
    /// A quota checked inside the handler denied the action.
    QuotaExceeded { reason: String },
    /// Database error while handling the request.
    DatabaseError { details: String },
    /// Credentials could not be sealed or opened.
    VaultError { details: String },
    /// Any other failure while handling the request.
    Internal { details: String },
}

impl ApiError {
    /// Wraps a database error.
    pub fn database(err: impl fmt::Display) -> Self {
        Self::DatabaseError {
            details: err.to_string(),
        }
    }

    /// Wraps a vault error. Validation failures are the caller's fault.
    pub fn vault(err: VaultError) -> Self {
        match err {
            VaultError::InvalidCredentials(invalid) => Self::InvalidRequest {
                details: invalid.to_string(),
            },
            other => Self::VaultError {
                details: other.to_string(),
            },
        }
    }

    /// Returns the HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            Self::QuotaExceeded { .. } => StatusCode::FORBIDDEN,
            Self::DatabaseError { .. } | Self::VaultError { .. } | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { resource } => write!(f, "{resource} not found"),
            Self::InvalidRequest { details } => write!(f, "invalid request: {details}"),
            Self::QuotaExceeded { reason } => write!(f, "quota exceeded: {reason}"),
            Self::DatabaseError { details } => write!(f, "database error: {details}"),
            Self::VaultError { details } => write!(f, "vault error: {details}"),
            Self::Internal { details } => write!(f, "internal error: {details}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::NotFound { resource } => json!({ "error": format!("{resource} not found") }),
            Self::InvalidRequest { details } => json!({ "error": details }),
            Self::QuotaExceeded { reason } => {
                json!({ "error": reason, "reason": reason, "upgrade": true })
            }
            Self::DatabaseError { .. } | Self::VaultError { .. } | Self::Internal { .. } => {
                tracing::error!(error = %self, "request failed");
                json!({ "error": "Internal server error" })
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use integration_hub_vault::{ConnectorKind, CredentialError, UnreadableKind};

    #[test]
    fn internal_errors_share_a_generic_status() {
        assert_eq!(
            ApiError::database("connection reset").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::vault(VaultError::Unreadable {
                kind: UnreadableKind::Integrity
            })
            .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn invalid_credentials_are_bad_requests() {
        let err = ApiError::vault(VaultError::InvalidCredentials(
            CredentialError::MissingField {
                connector: ConnectorKind::Stripe,
                field: "secret_key",
            },
        ));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    async fn body_of(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn quota_errors_are_forbidden_with_reason() {
        let (status, body) = body_of(ApiError::QuotaExceeded {
            reason: "webhooks are not available on the starter plan".to_string(),
        })
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["reason"], "webhooks are not available on the starter plan");
        assert_eq!(body["upgrade"], true);
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let (status, body) = body_of(ApiError::Internal {
            details: "handler panicked: index out of bounds".to_string(),
        })
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Internal server error" }));
    }
}

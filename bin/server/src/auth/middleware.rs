//! Access guard wiring for axum routes.

use crate::error::ApiError;
use axum::Json;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::MethodRouter;
use axum_extra::extract::CookieJar;
use chrono::Utc;
use futures::FutureExt;
use integration_hub_access::{AuthGuard, AuthOptions, Principal, Rejection, SessionToken};
use serde_json::json;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "session";

/// Reads the session token from the `session` cookie or a bearer header.
pub fn session_token(headers: &HeaderMap) -> Option<SessionToken> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(SessionToken::new(cookie.value()));
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(SessionToken::new)
}

/// The access guard together with the deadline for one authorization.
#[derive(Debug, Clone)]
pub struct AccessControl {
    guard: AuthGuard,
    deadline: Duration,
}

impl AccessControl {
    /// Creates access control that gives up on the guard after `deadline`.
    #[must_use]
    pub fn new(guard: AuthGuard, deadline: Duration) -> Self {
        Self { guard, deadline }
    }
}

#[derive(Clone)]
struct RouteAccess {
    control: AccessControl,
    options: Arc<AuthOptions>,
}

/// Puts the access guard in front of a route.
///
/// Admitted requests reach the handler with their principal available
/// through [`RequireAuth`]. Rejections are rendered as JSON with their status
/// code. A guard that misses its deadline answers 503, and a panicking
/// handler answers with a logged, generic 500.
pub fn with_auth<S>(
    access: &AccessControl,
    options: AuthOptions,
    route: MethodRouter<S>,
) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    let route_access = RouteAccess {
        control: access.clone(),
        options: Arc::new(options),
    };
    route.route_layer(middleware::from_fn_with_state(route_access, require_access))
}

async fn require_access(
    State(access): State<RouteAccess>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = session_token(request.headers());
    let authorized = tokio::time::timeout(
        access.control.deadline,
        access.control.guard.authorize(token.as_ref(), &access.options),
    )
    .await;
    let principal = match authorized {
        Ok(Ok(principal)) => principal,
        Ok(Err(rejection)) => return rejection_response(&rejection),
        Err(_) => {
            error!(
                deadline_ms = u64::try_from(access.control.deadline.as_millis()).unwrap_or(u64::MAX),
                "access check missed its deadline"
            );
            return rejection_response(&Rejection::Unavailable);
        }
    };

    request.extensions_mut().insert(principal);
    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => ApiError::Internal {
            details: format!("handler panicked: {}", panic_message(&*panic)),
        }
        .into_response(),
    }
}

fn panic_message<'a>(panic: &'a (dyn Any + Send + 'static)) -> &'a str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string payload"
    }
}

/// Extractor for the principal admitted by [`with_auth`].
///
/// Rejects with 401 on routes that are not wrapped by `with_auth`.
pub struct RequireAuth(pub Principal);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(RequireAuth)
            .ok_or_else(|| rejection_response(&Rejection::Unauthenticated))
    }
}

/// Renders a guard rejection as a JSON response.
pub fn rejection_response(rejection: &Rejection) -> Response {
    let status =
        StatusCode::from_u16(rejection.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    match rejection {
        Rejection::Unauthenticated => {
            (status, Json(json!({ "error": "Unauthorized" }))).into_response()
        }
        Rejection::PrincipalNotFound => {
            (status, Json(json!({ "error": "User not found" }))).into_response()
        }
        Rejection::Unavailable => {
            tracing::warn!("access guard could not reach its stores");
            (status, Json(json!({ "error": "Service temporarily unavailable" }))).into_response()
        }
        Rejection::RateLimited { reset_time } => {
            let retry_after = (*reset_time - Utc::now()).num_seconds().max(1);
            let mut response = (
                status,
                Json(json!({
                    "error": "Rate limit exceeded",
                    "remaining": 0,
                    "resetTime": reset_time,
                })),
            )
                .into_response();
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            response
        }
        Rejection::PlanRequired { required, current } => (
            status,
            Json(json!({
                "error": "Plan upgrade required",
                "required": required,
                "current": current,
            })),
        )
            .into_response(),
        Rejection::QuotaExceeded { reason } => (
            status,
            Json(json!({ "error": reason, "reason": reason, "upgrade": true })),
        )
            .into_response(),
    }
}

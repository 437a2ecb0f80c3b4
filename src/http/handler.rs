//! Request handler for the username-availability endpoint.
//!
//! Enforcement order on the hot path: check the block, check the rate
//! budget, validate the input, then race the directory lookup against a
//! deadline. Validation failures count against the caller's IP; lookup
//! errors do not, so infrastructure trouble is never mistaken for abuse.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, instrument, warn};

use crate::http::directory::UserDirectory;
use crate::throttle::{Decision, ThrottleGate};
use crate::timeout::with_deadline;

/// Shared state behind the endpoint.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<ThrottleGate>,
    pub directory: Arc<dyn UserDirectory>,
    pub lookup_timeout: Duration,
}

/// JSON body of every response from the endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
}

impl ApiResponse {
    fn new(success: bool, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success,
            message: message.into(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckUsernameParams {
    pub username: Option<String>,
}

/// Resolve the client IP from proxy headers.
///
/// Takes the first entry of a comma-separated `x-forwarded-for` list, and
/// falls back to the literal `"unknown"` when no address is resolvable.
pub fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|list| list.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Validate a candidate username against the sign-up schema: 3 to 20
/// characters, letters, digits and underscores only.
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.len() < 3 {
        return Err("username must be at least 3 characters".to_string());
    }
    if username.len() > 20 {
        return Err("username must be at most 20 characters".to_string());
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err("username must contain only letters, numbers and underscores".to_string());
    }
    Ok(())
}

/// `GET /api/check-username?username=...`
#[instrument(skip_all, fields(ip))]
pub async fn check_username(
    State(state): State<AppState>,
    Query(params): Query<CheckUsernameParams>,
    headers: HeaderMap,
) -> (StatusCode, Json<ApiResponse>) {
    let ip = client_ip(&headers);
    tracing::Span::current().record("ip", ip.as_str());

    match state.gate.check(&ip) {
        Decision::Blocked => {
            return (
                StatusCode::TOO_MANY_REQUESTS,
                ApiResponse::new(false, state.gate.tracker().message()),
            );
        }
        Decision::RateLimited => {
            return (
                StatusCode::TOO_MANY_REQUESTS,
                ApiResponse::new(false, state.gate.limiter().message()),
            );
        }
        Decision::Allow => {}
    }

    let username = match params.username {
        Some(username) => username,
        None => {
            state.gate.record_failure(&ip);
            return (
                StatusCode::BAD_REQUEST,
                ApiResponse::new(false, "username query parameter is required"),
            );
        }
    };

    if let Err(reason) = validate_username(&username) {
        warn!(ip = %ip, "Rejected invalid username");
        state.gate.record_failure(&ip);
        return (StatusCode::BAD_REQUEST, ApiResponse::new(false, reason));
    }

    let lookup = state.directory.is_username_taken(&username);
    match with_deadline(state.lookup_timeout, lookup).await {
        Err(_) => {
            warn!(ip = %ip, "Username lookup missed its deadline");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                ApiResponse::new(false, "Service Unavailable"),
            )
        }
        Ok(Err(e)) => {
            // Infrastructure failure, not an attacker-driven one: do not
            // count it against the IP.
            error!(error = %e, "Username lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiResponse::new(false, "Internal Server Error"),
            )
        }
        Ok(Ok(taken)) => {
            state.gate.record_success(&ip);
            if taken {
                (
                    StatusCode::OK,
                    ApiResponse::new(false, "Username is already taken"),
                )
            } else {
                (StatusCode::OK, ApiResponse::new(true, "Username is unique"))
            }
        }
    }
}

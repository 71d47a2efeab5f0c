use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::api::ApiError;


/// Header carrying the shared admin secret
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Admin gate errors
#[derive(Debug, PartialEq, Clone)]
pub enum AuthError {
    /// No admin secret configured on the server
    NotConfigured,
    /// Header absent
    Missing,
    /// Header not valid UTF-8 or empty
    InvalidFormat,
    /// Token does not match the configured secret
    Mismatch,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::NotConfigured => write!(f, "Admin access is not configured"),
            AuthError::Missing => write!(f, "Admin token not provided"),
            AuthError::InvalidFormat => write!(f, "Invalid admin token format"),
            AuthError::Mismatch => write!(f, "Invalid admin token"),
        }
    }
}

impl std::error::Error for AuthError {}

/// Shared-secret guard for every admin-delegated operation.
///
/// There is exactly one accepted secret. When it is unset every request is
/// rejected rather than falling back to any built-in value.
#[derive(Clone)]
pub struct AdminGate {
    secret: Option<String>,
}

impl AdminGate {
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    /// Checks a caller-supplied token against the configured secret.
    pub fn authorize(&self, request_token: Option<&str>) -> Result<(), AuthError> {
        let expected = self.secret.as_deref().ok_or(AuthError::NotConfigured)?;
        let supplied = request_token.ok_or(AuthError::Missing)?.trim();

        if supplied.is_empty() {
            return Err(AuthError::InvalidFormat);
        }

        if bool::from(supplied.as_bytes().ct_eq(expected.as_bytes())) {
            Ok(())
        } else {
            Err(AuthError::Mismatch)
        }
    }

    /// Checks the `x-admin-token` header.
    pub fn authorize_headers(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let token = match headers.get(ADMIN_TOKEN_HEADER) {
            Some(value) => Some(value.to_str().map_err(|_| AuthError::InvalidFormat)?),
            None => None,
        };
        self.authorize(token)
    }
}

/// Router middleware that runs the admin gate before any extractor or handler.
pub async fn require_admin(
    State(gate): State<AdminGate>,
    request: Request,
    next: Next,
) -> Response {
    if let Err(e) = gate.authorize_headers(request.headers()) {
        warn!(
            path = %request.uri().path(),
            reason = %e,
            "Rejected admin request"
        );
        return ApiError::Unauthorized(e.to_string()).into_response();
    }

    next.run(request).await
}

//! HTTP error mapping shared by every router.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

use crate::drive::DriveError;

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

/// Application error types for the HTTP layer
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    PayloadTooLarge(String),
    ServerError(String),
    BadGateway(String),
    /// Domain errors keep their own stable code
    Drive(DriveError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Drive(e) => drive_status(e),
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::NotFound(_) => "not_found",
            ApiError::PayloadTooLarge(_) => "payload_too_large",
            ApiError::ServerError(_) => "internal_error",
            ApiError::BadGateway(_) => "bad_gateway",
            ApiError::Drive(e) => e.code(),
        }
    }

    /// Missing or empty required field.
    pub fn missing(field: &str) -> Self {
        ApiError::BadRequest(format!("Missing required field '{}'", field))
    }
}

fn drive_status(error: &DriveError) -> StatusCode {
    match error {
        DriveError::BadRequest(_) | DriveError::NotConnected(_) => StatusCode::BAD_REQUEST,
        DriveError::NotFound(_) => StatusCode::NOT_FOUND,
        DriveError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        DriveError::RefreshFailed(_)
        | DriveError::Upstream { .. }
        | DriveError::Transport(_)
        | DriveError::Malformed { .. }
        | DriveError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<DriveError> for ApiError {
    fn from(error: DriveError) -> Self {
        ApiError::Drive(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let error = match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::NotFound(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::ServerError(msg)
            | ApiError::BadGateway(msg) => msg,
            ApiError::Drive(e) => e.to_string(),
        };

        (status, Json(ErrorResponse { error, code })).into_response()
    }
}

/// Required string field: present and non-blank after trimming.
pub fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::missing(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::RefreshError;

    #[test]
    fn test_drive_error_statuses() {
        let cases = [
            (DriveError::NotFound("u".into()), StatusCode::NOT_FOUND),
            (DriveError::NotConnected("u".into()), StatusCode::BAD_REQUEST),
            (
                DriveError::RefreshFailed(RefreshError::Transport("timeout".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                DriveError::Upstream {
                    status: 403,
                    body: "forbidden".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                DriveError::Malformed {
                    status: 200,
                    message: "expected value at line 1 column 1".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                DriveError::PayloadTooLarge { limit: 10 },
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).status(), expected);
        }
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = ApiError::from(DriveError::Upstream {
            status: 404,
            body: "File not found: abc".into(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "upstream_error");
        assert_eq!(json["error"], "Drive API error (404): File not found: abc");
    }

    #[test]
    fn test_required_field() {
        assert_eq!(required(Some(" u1 ".into()), "userId").unwrap(), "u1");
        assert!(matches!(
            required(Some("   ".into()), "userId"),
            Err(ApiError::BadRequest(ref m)) if m.contains("userId")
        ));
        assert!(required(None, "userId").is_err());
    }
}

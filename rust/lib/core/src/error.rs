use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Codes carried in every error body. Clients branch on these; messages are
/// for people and may change.
pub mod error_code {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const ALREADY_EXISTS: &str = "ALREADY_EXISTS";
    pub const INVALID_STATE: &str = "INVALID_STATE";
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const UNAUTHENTICATED: &str = "UNAUTHENTICATED";
    pub const PERMISSION_DENIED: &str = "PERMISSION_DENIED";
    pub const READ_ONLY: &str = "READ_ONLY";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
    pub const INTERNAL: &str = "INTERNAL";
}

/// Error returned by every service and handler in the ERP.
///
/// Rendered as `{"code": "...", "message": "..."}`, for example
/// `{"code": "INVALID_STATE", "message": "sales order SO-2026-00001 cannot move from DRAFT to SHIPPED"}`.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    /// Unique code, username or document key already taken.
    #[error("{0}")]
    Conflict(String),

    /// The document's lifecycle forbids the requested step.
    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    Validation(String),

    /// No token, or one that no longer verifies.
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    PermissionDenied(String),

    /// Built-in roles and other records the API never changes.
    #[error("{0}")]
    ReadOnly(String),

    #[error("{0}")]
    Storage(String),

    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    fn parts(&self) -> (StatusCode, &'static str) {
        use error_code::*;
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, NOT_FOUND),
            Self::Conflict(_) => (StatusCode::CONFLICT, ALREADY_EXISTS),
            Self::InvalidState(_) => (StatusCode::CONFLICT, INVALID_STATE),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, VALIDATION_FAILED),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, UNAUTHENTICATED),
            Self::PermissionDenied(_) => (StatusCode::FORBIDDEN, PERMISSION_DENIED),
            Self::ReadOnly(_) => (StatusCode::FORBIDDEN, READ_ONLY),
            Self::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, STORAGE_ERROR),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL),
        }
    }

    pub fn error_code(&self) -> &'static str {
        self.parts().1
    }

    pub fn status_code(&self) -> StatusCode {
        self.parts().0
    }

    /// Server-side failures are logged; client mistakes are not.
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();
        if self.is_server_error() {
            tracing::error!(code, error = %self, "request failed");
        }
        let body = serde_json::json!({ "code": code, "message": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn lifecycle_and_conflict_share_409() {
        let cases = [
            (ServiceError::Conflict("item code FAB-01 exists".into()), "ALREADY_EXISTS"),
            (ServiceError::InvalidState("PO-2026-00003 is CLOSED".into()), "INVALID_STATE"),
        ];
        for (err, code) in cases {
            assert_eq!(err.status_code(), StatusCode::CONFLICT);
            assert_eq!(err.error_code(), code);
        }
    }

    #[test]
    fn auth_failures_split_401_and_403() {
        assert_eq!(ServiceError::Unauthorized("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ServiceError::PermissionDenied("x".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ServiceError::ReadOnly("admin:root".into()).error_code(), "READ_ONLY");
        assert!(!ServiceError::Validation("quantity must be positive".into()).is_server_error());
        assert!(ServiceError::Storage("disk I/O error".into()).is_server_error());
    }

    #[tokio::test]
    async fn body_carries_code_and_bare_message() {
        let resp = ServiceError::NotFound("shipment SH-2026-00009".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "NOT_FOUND");
        assert_eq!(body["message"], "shipment SH-2026-00009");
    }
}

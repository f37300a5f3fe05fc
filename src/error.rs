//! Application error types.
//!
//! Every failure leaves the server as an [`Envelope`] with `success: false`,
//! a human-readable `error` and a machine-readable `code`.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    extract::{FromRequest, FromRequestParts},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::database::StoreError;
use crate::services::{FaceError, QrError};
use crate::types::{AlreadyMarked, Envelope};

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    BadRequest {
        code: &'static str,
        message: String,
        data: Option<Value>,
    },

    #[error("{message}")]
    Unauthorized { code: &'static str, message: String },

    #[error("{message}")]
    Forbidden { code: &'static str, message: String },

    #[error("{message}")]
    NotFound { code: &'static str, message: String },

    #[error("{message}")]
    Conflict {
        code: &'static str,
        message: String,
        data: Option<Value>,
    },

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        AppError::BadRequest {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn unauthorized(code: &'static str, message: impl Into<String>) -> Self {
        AppError::Unauthorized {
            code,
            message: message.into(),
        }
    }

    pub fn forbidden(code: &'static str, message: impl Into<String>) -> Self {
        AppError::Forbidden {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        AppError::NotFound {
            code,
            message: message.into(),
        }
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        AppError::Conflict {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        AppError::Internal(detail.into())
    }

    pub fn insufficient_permissions() -> Self {
        Self::forbidden("INSUFFICIENT_PERMISSIONS", "Insufficient permissions")
    }

    /// Attaches a payload to variants that carry one.
    pub fn with_data(mut self, payload: impl Serialize) -> Self {
        let value = serde_json::to_value(payload).ok();
        match &mut self {
            AppError::BadRequest { data, .. } | AppError::Conflict { data, .. } => *data = value,
            _ => {}
        }
        self
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest { code, .. }
            | AppError::Unauthorized { code, .. }
            | AppError::Forbidden { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Conflict { code, .. } => code,
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        if let AppError::Internal(detail) = &self {
            tracing::error!("internal error: {}", detail);
        } else {
            tracing::debug!(%status, code, "request failed: {}", self);
        }
        let data = match &self {
            AppError::BadRequest { data, .. } | AppError::Conflict { data, .. } => data.clone(),
            _ => None,
        };
        let body: Envelope<Value> = Envelope::failure(self.to_string(), code, data);
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(entity) => {
                let mut name = entity.to_string();
                if let Some(first) = name.get_mut(0..1) {
                    first.make_ascii_uppercase();
                }
                AppError::not_found("NOT_FOUND", format!("{name} not found"))
            }
            StoreError::Conflict(message) => AppError::conflict("CONFLICT", message),
            StoreError::AlreadyMarked(existing) => AppError::conflict(
                "ATTENDANCE_ALREADY_MARKED",
                "Attendance already marked for this class",
            )
            .with_data(AlreadyMarked {
                existing_attendance: existing.to_view(None, None),
            }),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<QrError> for AppError {
    fn from(e: QrError) -> Self {
        match e {
            QrError::Expired => AppError::bad_request("QR_CODE_EXPIRED", e.to_string()),
            QrError::ClassEnded => AppError::bad_request("CLASS_NOT_ACTIVE", e.to_string()),
            QrError::NotIssued | QrError::Mismatch => {
                AppError::bad_request("INVALID_QR_CODE", "Invalid QR code")
            }
        }
    }
}

impl From<FaceError> for AppError {
    fn from(e: FaceError) -> Self {
        AppError::bad_request(e.code(), e.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::bad_request("INVALID_JSON", rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::bad_request("INVALID_PATH", rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::bad_request("INVALID_QUERY", rejection.body_text())
    }
}

/// JSON body extractor whose rejections use the error envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Path extractor whose rejections use the error envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

/// Query extractor whose rejections use the error envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

/// Wraps `data` in a success envelope.
pub fn respond<T: Serialize>(data: T, message: impl Into<String>) -> Json<Envelope<T>> {
    Json(Envelope::ok(data, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn error_renders_envelope() {
        let response =
            AppError::bad_request("LOW_CONFIDENCE", "Face recognition confidence too low")
                    .with_data(serde_json::json!({ "confidence_score": 0.5, "threshold": 0.6 }))
                .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "LOW_CONFIDENCE");
        assert_eq!(body["data"]["threshold"], 0.6);
    }

    #[test]
    fn store_not_found_maps_to_404() {
        let err: AppError = StoreError::NotFound("class").into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Class not found");
    }

    #[test]
    fn internal_details_are_hidden() {
        let err = AppError::internal("password=hunter2");
        assert_eq!(err.to_string(), "Internal server error");
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }

    #[test]
    fn expired_qr_maps_to_code() {
        let err: AppError = QrError::Expired.into();
        assert_eq!(err.code(), "QR_CODE_EXPIRED");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Everything a request handler can fail with. Converted to the JSON
/// error envelope at the handler boundary; nothing here ever panics the
/// process.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("blob store error: {0}")]
    BlobStore(String),
    #[error("metadata store error: {0}")]
    MetadataStore(#[from] sea_orm::DbErr),
    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::BlobStore(_) | ApiError::MetadataStore(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client-facing message. Storage and database failures get a generic
    /// message so provider internals never leak into responses.
    pub fn client_message(&self) -> String {
        match self {
            ApiError::BlobStore(_) => "Storage error, please try again later.".to_string(),
            ApiError::MetadataStore(_) => "Database error, please try again later.".to_string(),
            ApiError::Internal(_) => "Internal server error, please try again later.".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<crate::storage::StorageError> for ApiError {
    fn from(err: crate::storage::StorageError) -> Self {
        ApiError::BlobStore(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }

        let body = ErrorBody {
            success: false,
            error: self.client_message(),
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(
            ApiError::Validation("missing title".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Unauthorized("no session".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Forbidden("not the owner".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::NotFound("no such video".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::BlobStore("bucket unreachable".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn storage_and_database_messages_stay_generic() {
        let blob = ApiError::BlobStore("gcs: permission denied for sa key".into());
        assert!(!blob.client_message().contains("sa key"));

        let db = ApiError::MetadataStore(sea_orm::DbErr::Custom(
            "connection refused 10.0.0.3:5432".into(),
        ));
        assert!(!db.client_message().contains("10.0.0.3"));
        assert!(db.client_message().contains("try again later"));
    }

    #[test]
    fn validation_messages_pass_through() {
        let err = ApiError::Validation("Missing title or exercise type.".into());
        assert_eq!(err.client_message(), "Missing title or exercise type.");
    }

    #[test]
    fn error_body_envelope_shape() {
        let body = ErrorBody {
            success: false,
            error: "Video not found.".into(),
            details: None,
        };
        let json = serde_json::to_value(&body).expect("serialize");
        assert_eq!(json["success"], serde_json::json!(false));
        assert!(json["error"].is_string());
        assert!(json.get("details").is_none());
    }
}

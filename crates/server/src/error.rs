// API error registry: every failure the HTTP surface can report, with its
// status code, retryability and the JSON envelope it renders to.

use std::future::Future;

use axum::{
    http::{header::HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use folio_common::protocol::routes::{self, REQUEST_ID_HEADER};
use serde_json::{json, Value};
use tracing::error;
use uuid::Uuid;

use crate::assets::AssetError;
use crate::gc::CollectorError;
use crate::store::StoreError;

tokio::task_local! {
    static REQUEST_ID: String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ValidationFailed,
    InvalidPath,
    PathOutsideRoot,
    NotFound,
    AlreadyExists,
    DestinationExists,
    VersionConflict,
    PatchApplyFailed,
    PayloadTooLarge,
    GcAlreadyRunning,
    InternalError,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValidationFailed => routes::ERR_VALIDATION_FAILED,
            Self::InvalidPath => routes::ERR_INVALID_PATH,
            Self::PathOutsideRoot => routes::ERR_PATH_OUTSIDE_ROOT,
            Self::NotFound => routes::ERR_NOT_FOUND,
            Self::AlreadyExists => routes::ERR_ALREADY_EXISTS,
            Self::DestinationExists => routes::ERR_DESTINATION_EXISTS,
            Self::VersionConflict => routes::ERR_VERSION_CONFLICT,
            Self::PatchApplyFailed => routes::ERR_PATCH_APPLY_FAILED,
            Self::PayloadTooLarge => routes::ERR_PAYLOAD_TOO_LARGE,
            Self::GcAlreadyRunning => routes::ERR_GC_ALREADY_RUNNING,
            Self::InternalError => routes::ERR_INTERNAL,
        }
    }

    pub const fn status(self) -> StatusCode {
        match self {
            Self::ValidationFailed => StatusCode::BAD_REQUEST,
            Self::InvalidPath => StatusCode::BAD_REQUEST,
            Self::PathOutsideRoot => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::AlreadyExists => StatusCode::CONFLICT,
            Self::DestinationExists => StatusCode::BAD_REQUEST,
            Self::VersionConflict => StatusCode::CONFLICT,
            Self::PatchApplyFailed => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::GcAlreadyRunning => StatusCode::CONFLICT,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub const fn retryable(self) -> bool {
        matches!(self, Self::GcAlreadyRunning | Self::InternalError)
    }

    pub const fn default_message(self) -> &'static str {
        match self {
            Self::ValidationFailed => "request validation failed",
            Self::InvalidPath => "path is not a valid document path",
            Self::PathOutsideRoot => "path resolves outside the storage root",
            Self::NotFound => "requested resource not found",
            Self::AlreadyExists => "resource already exists",
            Self::DestinationExists => "destination already exists",
            Self::VersionConflict => "base fingerprint does not match current content",
            Self::PatchApplyFailed => "patch could not be applied cleanly",
            Self::PayloadTooLarge => "payload exceeds maximum allowed size",
            Self::GcAlreadyRunning => "a collector pass is already running",
            Self::InternalError => "internal server error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
    details: Value,
    request_id: Option<String>,
    current_content: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: json!({}),
            request_id: None,
            current_content: None,
        }
    }

    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Attach the server's current document text (conflict responses).
    pub fn with_current_content(mut self, content: impl Into<String>) -> Self {
        self.current_content = Some(content.into());
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = self.request_id.or_else(current_request_id);

        let mut body = json!({
            "error": {
                "code": self.code.as_str(),
                "message": self.message,
                "retryable": self.code.retryable(),
                "request_id": request_id.clone(),
                "details": self.details,
            }
        });
        if let Some(current) = self.current_content {
            body["currentContent"] = Value::String(current);
        }

        let mut response = (self.code.status(), Json(body)).into_response();
        if let Some(request_id) = request_id {
            attach_request_id_header(&mut response, &request_id);
        }
        response
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidPath(inner) => ApiError::new(ErrorCode::InvalidPath, inner.to_string()),
            StoreError::OutsideRoot(path) => ApiError::new(
                ErrorCode::PathOutsideRoot,
                format!("path `{path}` resolves outside the storage root"),
            ),
            StoreError::NotFound(path) => {
                ApiError::new(ErrorCode::NotFound, format!("`{path}` does not exist"))
            }
            StoreError::NotAFile(path) => {
                ApiError::new(ErrorCode::ValidationFailed, format!("`{path}` is not a file"))
            }
            StoreError::AlreadyExists(path) => {
                ApiError::new(ErrorCode::AlreadyExists, format!("`{path}` already exists"))
            }
            StoreError::DestinationExists(path) => ApiError::new(
                ErrorCode::DestinationExists,
                format!("destination `{path}` already exists"),
            ),
            StoreError::VersionConflict { current_content } => {
                ApiError::from_code(ErrorCode::VersionConflict)
                    .with_current_content(current_content)
            }
            StoreError::PatchApplyFailed { reason, current_content } => {
                ApiError::new(ErrorCode::PatchApplyFailed, reason)
                    .with_current_content(current_content)
            }
            StoreError::Io { .. } => {
                error!(error = %err, "file store operation failed");
                ApiError::from_code(ErrorCode::InternalError)
            }
        }
    }
}

impl From<AssetError> for ApiError {
    fn from(err: AssetError) -> Self {
        match err {
            AssetError::Empty | AssetError::InvalidName(_) => {
                ApiError::new(ErrorCode::ValidationFailed, err.to_string())
            }
            AssetError::TooLarge { limit } => ApiError::new(
                ErrorCode::PayloadTooLarge,
                format!("asset exceeds the {limit} byte upload limit"),
            ),
            AssetError::Io(_) => {
                error!(error = %err, "asset upload failed");
                ApiError::from_code(ErrorCode::InternalError)
            }
        }
    }
}

impl From<CollectorError> for ApiError {
    fn from(err: CollectorError) -> Self {
        match err {
            CollectorError::AlreadyRunning => ApiError::from_code(ErrorCode::GcAlreadyRunning),
            CollectorError::Aborted(_) => {
                error!(error = %err, "collector pass failed");
                ApiError::from_code(ErrorCode::InternalError)
            }
        }
    }
}

pub async fn with_request_id_scope<F>(request_id: String, future: F) -> F::Output
where
    F: Future,
{
    REQUEST_ID.scope(request_id, future).await
}

pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(Clone::clone).ok()
}

pub fn request_id_from_headers_or_generate(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

pub fn attach_request_id_header(response: &mut Response, request_id: &str) {
    if let Ok(header) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, header);
    }
}

#[cfg(test)]
mod tests {
    use axum::{body::to_bytes, http::StatusCode, response::IntoResponse};
    use folio_common::path::PathError;
    use serde_json::Value;

    use super::{with_request_id_scope, ApiError, ErrorCode};
    use crate::store::StoreError;

    async fn body_json(response: axum::response::Response) -> Value {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("error response body should be readable");
        serde_json::from_slice(&body).expect("error response body should be valid json")
    }

    #[tokio::test]
    async fn api_error_uses_scoped_request_id() {
        let response = with_request_id_scope("req-scoped-123".to_owned(), async {
            ApiError::from_code(ErrorCode::InternalError).into_response()
        })
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers().get("x-request-id").expect("header"), "req-scoped-123");
        let parsed = body_json(response).await;
        assert_eq!(parsed["error"]["code"], "INTERNAL_ERROR");
        assert_eq!(parsed["error"]["retryable"], true);
        assert_eq!(parsed["error"]["request_id"], "req-scoped-123");
        assert_eq!(parsed["error"]["details"], serde_json::json!({}));
        assert!(parsed.get("currentContent").is_none());
    }

    #[tokio::test]
    async fn version_conflict_carries_current_content() {
        let err: ApiError = StoreError::VersionConflict { current_content: "A2".into() }.into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let parsed = body_json(response).await;
        assert_eq!(parsed["error"]["code"], "VERSION_CONFLICT");
        assert_eq!(parsed["currentContent"], "A2");
    }

    #[tokio::test]
    async fn patch_apply_failure_is_unprocessable() {
        let err: ApiError = StoreError::PatchApplyFailed {
            reason: "hunk 0 did not match".into(),
            current_content: "base".into(),
        }
        .into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let parsed = body_json(response).await;
        assert_eq!(parsed["error"]["message"], "hunk 0 did not match");
        assert_eq!(parsed["currentContent"], "base");
    }

    #[test]
    fn path_errors_map_to_rejections() {
        let invalid: ApiError = StoreError::InvalidPath(PathError::Traversal("..".into())).into();
        assert_eq!(invalid.code().status(), StatusCode::BAD_REQUEST);

        let escape: ApiError = StoreError::OutsideRoot("link/secret".into()).into();
        assert_eq!(escape.code().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn destination_exists_is_bad_request_and_create_conflict_is_409() {
        assert_eq!(ErrorCode::DestinationExists.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::AlreadyExists.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn explicit_request_id_overrides_scope() {
        let response = with_request_id_scope("req-scoped".to_owned(), async {
            ApiError::from_code(ErrorCode::NotFound).with_request_id("req-explicit").into_response()
        })
        .await;

        let parsed = body_json(response).await;
        assert_eq!(parsed["error"]["request_id"], "req-explicit");
    }
}

//! Shared HTTP plumbing: the error response type, extractors that report
//! malformed input in the same error shape, and query helpers.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, Path, Query, Request,
    },
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
};
use posthread_comments::{CommentError, ErrorKind};
use posthread_posts::DirectoryError;
use posthread_types::PageRequest;
use serde::{de::DeserializeOwned, Deserialize};
use thiserror::Error;

/// API error type mapping to HTTP status codes.
///
/// Every variant carries a stable machine-readable `code`. The response body
/// is `{"error": {"code": ..., "message": ...}}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {message}")]
    BadRequest { code: &'static str, message: String },
    #[error("not found: {message}")]
    NotFound { code: &'static str, message: String },
    #[error("forbidden: {message}")]
    Forbidden { code: &'static str, message: String },
    #[error("conflict: {message}")]
    Conflict { code: &'static str, message: String },
    #[error("storage failure: {0}")]
    Storage(String),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Storage(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match self {
            ApiError::BadRequest { code, message }
            | ApiError::NotFound { code, message }
            | ApiError::Forbidden { code, message }
            | ApiError::Conflict { code, message } => (code, message),
            ApiError::Storage(detail) => {
                tracing::error!(error = %detail, "request failed with storage error");
                ("DATABASE_ERROR", "storage failure".to_string())
            }
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed with internal error");
                ("INTERNAL_ERROR", "internal server error".to_string())
            }
        };

        let body = Json(serde_json::json!({
            "error": { "code": code, "message": message }
        }));

        (status, body).into_response()
    }
}

impl From<CommentError> for ApiError {
    fn from(e: CommentError) -> Self {
        let code = e.code();
        let message = e.to_string();
        match e.kind() {
            ErrorKind::NotFound => ApiError::NotFound { code, message },
            ErrorKind::AccessDenied | ErrorKind::CommentsDisabled => {
                ApiError::Forbidden { code, message }
            }
            ErrorKind::InvalidInput => ApiError::BadRequest { code, message },
            ErrorKind::Storage => ApiError::Storage(message),
        }
    }
}

impl From<DirectoryError> for ApiError {
    fn from(e: DirectoryError) -> Self {
        let message = e.to_string();
        match e {
            DirectoryError::InvalidUser(_) => ApiError::BadRequest {
                code: "INVALID_USER_DATA",
                message,
            },
            DirectoryError::InvalidPost(_) => ApiError::BadRequest {
                code: "INVALID_POST_DATA",
                message,
            },
            DirectoryError::UserNotFound(_) => ApiError::NotFound {
                code: "USER_NOT_FOUND",
                message,
            },
            DirectoryError::PostNotFound(_) => ApiError::NotFound {
                code: "POST_NOT_FOUND",
                message,
            },
            DirectoryError::PostAccessDenied(_) => ApiError::Forbidden {
                code: "POST_ACCESS_DENIED",
                message,
            },
            DirectoryError::UserExists(_) => ApiError::Conflict {
                code: "USER_EXISTS",
                message,
            },
            DirectoryError::Store(_) => ApiError::Storage(message),
        }
    }
}

/// Maps an axum extractor rejection onto `INVALID_REQUEST`.
///
/// Server-side rejections (a route whose captures do not match the handler)
/// stay internal errors.
fn rejected(status: StatusCode, source: &'static str, text: String) -> ApiError {
    if status.is_server_error() {
        return ApiError::Internal(format!("{} extraction failed: {}", source, text));
    }
    tracing::debug!(source, error = %text, "rejected malformed request");
    ApiError::BadRequest {
        code: "INVALID_REQUEST",
        message: text,
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        rejected(rejection.status(), "body", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        rejected(rejection.status(), "query", rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        rejected(rejection.status(), "path", rejection.body_text())
    }
}

/// [`Json`] body extractor whose rejection is an [`ApiError`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// [`Query`] extractor whose rejection is an [`ApiError`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// [`Path`] extractor whose rejection is an [`ApiError`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// Runs blocking storage work off the async runtime.
pub(crate) async fn run_blocking<T, E, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("task join error: {}", e)))?
        .map_err(Into::into)
}

/// `?limit=&offset=` query parameters. Out-of-range values are clamped.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageQuery {
    pub fn to_request(&self) -> PageRequest {
        PageRequest::from_query(self.limit, self.offset)
    }
}

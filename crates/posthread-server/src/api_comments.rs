//! Comment handlers.

use crate::api::{run_blocking, ApiError, ApiJson, ApiPath, ApiQuery, PageQuery};
use crate::AppState;
use axum::{
    extract::Extension,
    http::StatusCode,
    response::Json,
};
use posthread_comments::{Comment, DEFAULT_THREAD_DEPTH};
use posthread_types::{Page, PageInfo};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub author_id: Uuid,
    pub content: String,
    /// Set to reply to an existing comment on the same post.
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    pub author_id: Uuid,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteCommentParams {
    pub author_id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
pub struct ThreadParams {
    pub max_depth: Option<u32>,
}

/// A page of comments with its pagination metadata.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommentPage {
    pub comments: Vec<Comment>,
    pub pagination: PageInfo,
}

impl From<Page<Comment>> for CommentPage {
    fn from(page: Page<Comment>) -> Self {
        Self {
            comments: page.items,
            pagination: page.info,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ThreadResponse {
    pub comments: Vec<Comment>,
}

/// Handler for `POST /api/posts/{postId}/comments`.
pub async fn create_comment_handler(
    Extension(state): Extension<Arc<AppState>>,
    ApiPath(post_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let comment = run_blocking(move || {
        state.comments.create_comment(
            post_id,
            payload.author_id,
            &payload.content,
            payload.parent_id,
        )
    })
    .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// Handler for `GET /api/posts/{postId}/comments`.
///
/// Lists root comments only; replies are reached through
/// `/api/comments/{commentId}/replies` or `/thread`.
pub async fn list_post_comments_handler(
    Extension(state): Extension<Arc<AppState>>,
    ApiPath(post_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<CommentPage>, ApiError> {
    let page = query.to_request();
    let result =
        run_blocking(move || state.comments.list_post_comments(post_id, page)).await?;
    Ok(Json(result.into()))
}

/// Handler for `GET /api/comments/{commentId}`.
pub async fn get_comment_handler(
    Extension(state): Extension<Arc<AppState>>,
    ApiPath(comment_id): ApiPath<Uuid>,
) -> Result<Json<Comment>, ApiError> {
    let comment = run_blocking(move || state.comments.get_comment(comment_id)).await?;
    Ok(Json(comment))
}

/// Handler for `PATCH /api/comments/{commentId}`.
pub async fn update_comment_handler(
    Extension(state): Extension<Arc<AppState>>,
    ApiPath(comment_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateCommentRequest>,
) -> Result<Json<Comment>, ApiError> {
    let comment = run_blocking(move || {
        state
            .comments
            .update_comment(comment_id, payload.author_id, &payload.content)
    })
    .await?;
    Ok(Json(comment))
}

/// Handler for `DELETE /api/comments/{commentId}?author_id=`.
pub async fn delete_comment_handler(
    Extension(state): Extension<Arc<AppState>>,
    ApiPath(comment_id): ApiPath<Uuid>,
    ApiQuery(params): ApiQuery<DeleteCommentParams>,
) -> Result<StatusCode, ApiError> {
    run_blocking(move || state.comments.delete_comment(comment_id, params.author_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for `GET /api/comments/{commentId}/replies`.
pub async fn list_replies_handler(
    Extension(state): Extension<Arc<AppState>>,
    ApiPath(comment_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<CommentPage>, ApiError> {
    let page = query.to_request();
    let result = run_blocking(move || state.comments.list_replies(comment_id, page)).await?;
    Ok(Json(result.into()))
}

/// Handler for `GET /api/comments/{commentId}/thread?max_depth=`.
pub async fn get_thread_handler(
    Extension(state): Extension<Arc<AppState>>,
    ApiPath(comment_id): ApiPath<Uuid>,
    ApiQuery(params): ApiQuery<ThreadParams>,
) -> Result<Json<ThreadResponse>, ApiError> {
    let max_depth = params.max_depth.unwrap_or(DEFAULT_THREAD_DEPTH);
    let comments =
        run_blocking(move || state.comments.get_thread(comment_id, max_depth)).await?;
    Ok(Json(ThreadResponse { comments }))
}

//! User and post handlers.

use crate::api::{run_blocking, ApiError, ApiJson, ApiPath, ApiQuery, PageQuery};
use crate::AppState;
use axum::{
    extract::Extension,
    http::StatusCode,
    response::Json,
};
use posthread_posts::{
    delete_post, edit_post, list_author_posts, list_posts, publish_post, register_user,
    set_comments_disabled, DirectoryError,
};
use posthread_types::{Page, PageInfo, Post, User};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub author_id: Uuid,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    /// Must be the post's author.
    pub author_id: Uuid,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct DeletePostParams {
    pub author_id: Uuid,
}

/// A page of posts with its pagination metadata.
#[derive(Debug, Serialize, Deserialize)]
pub struct PostPage {
    pub posts: Vec<Post>,
    pub pagination: PageInfo,
}

impl From<Page<Post>> for PostPage {
    fn from(page: Page<Post>) -> Self {
        Self {
            posts: page.items,
            pagination: page.info,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CommentsDisabledRequest {
    /// Must be the post's author.
    pub author_id: Uuid,
    pub disabled: bool,
}

/// Handler for `POST /api/users`.
pub async fn create_user_handler(
    Extension(state): Extension<Arc<AppState>>,
    ApiJson(payload): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = run_blocking(move || {
        register_user(state.users.as_ref(), &payload.username, &payload.email)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Handler for `GET /api/users/{userId}`.
pub async fn get_user_handler(
    Extension(state): Extension<Arc<AppState>>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> Result<Json<User>, ApiError> {
    let user = run_blocking(move || -> Result<User, DirectoryError> {
        state
            .users
            .get_user(user_id)?
            .ok_or(DirectoryError::UserNotFound(user_id))
    })
    .await?;
    Ok(Json(user))
}

/// Handler for `POST /api/posts`.
pub async fn create_post_handler(
    Extension(state): Extension<Arc<AppState>>,
    ApiJson(payload): ApiJson<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    let post = run_blocking(move || {
        publish_post(
            state.posts.as_ref(),
            state.users.as_ref(),
            payload.author_id,
            &payload.title,
            &payload.content,
        )
    })
    .await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// Handler for `GET /api/posts/{postId}`.
pub async fn get_post_handler(
    Extension(state): Extension<Arc<AppState>>,
    ApiPath(post_id): ApiPath<Uuid>,
) -> Result<Json<Post>, ApiError> {
    let post = run_blocking(move || -> Result<Post, DirectoryError> {
        state
            .posts
            .get_post(post_id)?
            .ok_or(DirectoryError::PostNotFound(post_id))
    })
    .await?;
    Ok(Json(post))
}

/// Handler for `GET /api/posts`. Newest posts first.
pub async fn list_posts_handler(
    Extension(state): Extension<Arc<AppState>>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<PostPage>, ApiError> {
    let page = query.to_request();
    let result = run_blocking(move || list_posts(state.posts.as_ref(), page)).await?;
    Ok(Json(result.into()))
}

/// Handler for `GET /api/users/{userId}/posts`.
pub async fn list_user_posts_handler(
    Extension(state): Extension<Arc<AppState>>,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<PostPage>, ApiError> {
    let page = query.to_request();
    let result = run_blocking(move || {
        list_author_posts(state.posts.as_ref(), state.users.as_ref(), user_id, page)
    })
    .await?;
    Ok(Json(result.into()))
}

/// Handler for `PATCH /api/posts/{postId}`.
pub async fn update_post_handler(
    Extension(state): Extension<Arc<AppState>>,
    ApiPath(post_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdatePostRequest>,
) -> Result<Json<Post>, ApiError> {
    let post = run_blocking(move || {
        edit_post(
            state.posts.as_ref(),
            post_id,
            payload.author_id,
            &payload.title,
            &payload.content,
        )
    })
    .await?;
    Ok(Json(post))
}

/// Handler for `DELETE /api/posts/{postId}?author_id=`.
pub async fn delete_post_handler(
    Extension(state): Extension<Arc<AppState>>,
    ApiPath(post_id): ApiPath<Uuid>,
    ApiQuery(params): ApiQuery<DeletePostParams>,
) -> Result<StatusCode, ApiError> {
    run_blocking(move || delete_post(state.posts.as_ref(), post_id, params.author_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for `PUT /api/posts/{postId}/comments-disabled`.
pub async fn set_comments_disabled_handler(
    Extension(state): Extension<Arc<AppState>>,
    ApiPath(post_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<CommentsDisabledRequest>,
) -> Result<Json<Post>, ApiError> {
    let post = run_blocking(move || {
        set_comments_disabled(
            state.posts.as_ref(),
            post_id,
            payload.author_id,
            payload.disabled,
        )
    })
    .await?;
    Ok(Json(post))
}

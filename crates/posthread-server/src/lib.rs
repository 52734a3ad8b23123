//! posthread server library logic.

pub mod api;
pub mod api_comments;
pub mod api_posts;
pub mod api_sse;
pub mod config;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Extension, Json, Router,
};
use crate::config::{Config, StorageBackend};
use posthread_comments::{
    CommentService, CommentStore, MemoryCommentStore, NotificationBus, SqliteCommentStore,
};
use posthread_db::{DbPool, DbRuntimeSettings, PoolError};
use posthread_posts::{
    MemoryPostStore, MemoryUserStore, PostStore, SqlitePostStore, SqliteUserStore, UserStore,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Comment engine, including the per-post notification bus.
    pub comments: Arc<CommentService>,
    /// User backend.
    pub users: Arc<dyn UserStore>,
    /// Post backend.
    pub posts: Arc<dyn PostStore>,
}

impl AppState {
    /// Wires the comment service to the given user and post backends.
    pub fn assemble<U, P>(
        users: Arc<U>,
        posts: Arc<P>,
        comments: Arc<dyn CommentStore>,
        subscriber_buffer: usize,
    ) -> Self
    where
        U: UserStore + 'static,
        P: PostStore + 'static,
    {
        let service = CommentService::new(
            comments,
            posts.clone(),
            users.clone(),
            NotificationBus::new(subscriber_buffer),
        );
        Self {
            comments: Arc::new(service),
            users,
            posts,
        }
    }

    /// State backed entirely by process memory.
    pub fn in_memory(subscriber_buffer: usize) -> Self {
        Self::assemble(
            Arc::new(MemoryUserStore::new()),
            Arc::new(MemoryPostStore::new()),
            Arc::new(MemoryCommentStore::new()),
            subscriber_buffer,
        )
    }

    /// State backed by a migrated SQLite pool.
    pub fn sqlite(pool: DbPool, subscriber_buffer: usize) -> Self {
        Self::assemble(
            Arc::new(SqliteUserStore::new(pool.clone())),
            Arc::new(SqlitePostStore::new(pool.clone())),
            Arc::new(SqliteCommentStore::new(pool)),
            subscriber_buffer,
        )
    }
}

/// Builds the state selected by `database.backend`.
///
/// # Errors
///
/// Returns `PoolError` if the SQLite database cannot be opened or migrated.
pub fn build_state(config: &Config) -> Result<AppState, PoolError> {
    let buffer = config.comments.subscriber_buffer;
    match config.database.backend {
        StorageBackend::Memory => {
            tracing::info!("using in-memory storage; data is lost on shutdown");
            Ok(AppState::in_memory(buffer))
        }
        StorageBackend::Sqlite => {
            let pool = posthread_db::open_database(
                &config.database.path,
                DbRuntimeSettings {
                    busy_timeout_ms: config.database.busy_timeout_ms,
                    pool_max_size: config.database.pool_max_size,
                },
            )?;
            tracing::info!(path = %config.database.path, "using sqlite storage");
            Ok(AppState::sqlite(pool, buffer))
        }
    }
}

/// Maximum request body size (64 KiB). Comments are capped far below this.
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Health check handler. Also reports notification bus counters.
async fn health(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    let bus = state.comments.bus();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "events": {
            "active_posts": bus.active_posts(),
            "delivered": bus.delivered_events(),
            "dropped": bus.dropped_events(),
        }
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/users", post(api_posts::create_user_handler))
        .route("/api/users/{userId}", get(api_posts::get_user_handler))
        .route(
            "/api/users/{userId}/posts",
            get(api_posts::list_user_posts_handler),
        )
        .route(
            "/api/posts",
            post(api_posts::create_post_handler).get(api_posts::list_posts_handler),
        )
        .route(
            "/api/posts/{postId}",
            get(api_posts::get_post_handler)
                .patch(api_posts::update_post_handler)
                .delete(api_posts::delete_post_handler),
        )
        .route(
            "/api/posts/{postId}/comments-disabled",
            put(api_posts::set_comments_disabled_handler),
        )
        .route(
            "/api/posts/{postId}/comments",
            post(api_comments::create_comment_handler)
                .get(api_comments::list_post_comments_handler),
        )
        .route(
            "/api/posts/{postId}/comments/events",
            get(api_sse::comment_stream_handler),
        )
        .route(
            "/api/comments/{commentId}",
            get(api_comments::get_comment_handler)
                .patch(api_comments::update_comment_handler)
                .delete(api_comments::delete_comment_handler),
        )
        .route(
            "/api/comments/{commentId}/replies",
            get(api_comments::list_replies_handler),
        )
        .route(
            "/api/comments/{commentId}/thread",
            get(api_comments::get_thread_handler),
        )
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}

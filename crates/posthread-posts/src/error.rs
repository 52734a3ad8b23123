//! Error types for user and post operations.

use posthread_types::StoreError;
use uuid::Uuid;

/// Errors returned by the user and post write operations.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("invalid user data: {0}")]
    InvalidUser(String),

    #[error("invalid post data: {0}")]
    InvalidPost(String),

    #[error("user not found: {0}")]
    UserNotFound(Uuid),

    #[error("post not found: {0}")]
    PostNotFound(Uuid),

    /// Only the author of a post may change it.
    #[error("access denied to post: {0}")]
    PostAccessDenied(Uuid),

    /// Username or email already taken.
    #[error("user already exists: {0}")]
    UserExists(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

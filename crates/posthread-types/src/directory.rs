//! Lookup contracts the comment engine consumes from the post and user
//! subsystems.
//!
//! Implementations live in `posthread-posts`. Every method is synchronous and
//! must be safe to call from many threads at once; async callers run them on
//! the blocking pool.

use uuid::Uuid;

use crate::{Post, StoreError, User};

/// Read access to posts.
pub trait PostDirectory: Send + Sync {
    fn post_exists(&self, id: Uuid) -> Result<bool, StoreError>;

    fn get_post(&self, id: Uuid) -> Result<Option<Post>, StoreError>;

    /// Returns `false` for unknown posts.
    fn post_comments_enabled(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Batch fetch. Unknown IDs are omitted; order is unspecified.
    fn get_posts_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Post>, StoreError>;
}

/// Read access to users.
pub trait UserDirectory: Send + Sync {
    fn user_exists(&self, id: Uuid) -> Result<bool, StoreError>;

    fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Batch fetch. Unknown IDs are omitted; order is unspecified.
    fn get_users_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, StoreError>;
}

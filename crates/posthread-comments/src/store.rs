//! Persistence contract for comments.
//!
//! Two backends implement [`CommentStore`]: [`MemoryCommentStore`] and
//! [`SqliteCommentStore`]. Both honor the same ordering rules:
//!
//! - per-post and per-parent listings are ordered by `created_at` ascending;
//! - thread and path listings are ordered by `(path, created_at)`;
//! - equal timestamps fall back to insertion order.
//!
//! Lookups that find nothing return `None` or an empty list. Only a failing
//! backend produces a [`StoreError`].
//!
//! [`MemoryCommentStore`]: crate::MemoryCommentStore
//! [`SqliteCommentStore`]: crate::SqliteCommentStore

use chrono::{DateTime, Utc};
use posthread_types::{Page, PageRequest, StoreError};
use uuid::Uuid;

use crate::comment::Comment;

pub trait CommentStore: Send + Sync {
    /// Persists a new comment. Hydrated relations are not stored.
    fn create(&self, comment: &Comment) -> Result<(), StoreError>;

    fn get_by_id(&self, id: Uuid) -> Result<Option<Comment>, StoreError>;

    /// Replaces `content` and `updated_at`. Returns `false` if the comment
    /// does not exist.
    fn update_content(
        &self,
        id: Uuid,
        content: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Removes one comment. Replies are left in place.
    fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    fn exists(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Root comments of a post.
    fn list_by_post(&self, post_id: Uuid, page: PageRequest) -> Result<Page<Comment>, StoreError>;

    /// Direct replies to a comment.
    fn list_by_parent(
        &self,
        parent_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<Comment>, StoreError>;

    fn count_by_post(&self, post_id: Uuid) -> Result<u64, StoreError>;

    fn count_by_parent(&self, parent_id: Uuid) -> Result<u64, StoreError>;

    /// The comment plus every descendant at most `max_depth` levels below it.
    /// Unknown roots yield an empty list.
    fn get_thread(&self, root_id: Uuid, max_depth: u32) -> Result<Vec<Comment>, StoreError>;

    /// Every comment whose path starts with `prefix`.
    fn get_by_path(&self, prefix: &str, page: PageRequest) -> Result<Page<Comment>, StoreError>;

    /// Batch fetch. Unknown IDs are omitted; order is unspecified.
    fn get_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Comment>, StoreError>;
}

/// Smallest string greater than every string starting with `prefix`.
///
/// Together with `prefix` itself this gives the half-open range
/// `[prefix, bound)` covering exactly the strings with that prefix, which
/// an ordered index can scan. Returns `None` when no such bound exists
/// (empty prefix, or every character already `char::MAX`).
pub fn prefix_upper_bound(prefix: &str) -> Option<String> {
    let mut chars: Vec<char> = prefix.chars().collect();
    while let Some(last) = chars.pop() {
        let next = match last {
            '\u{D7FF}' => Some('\u{E000}'),
            c => char::from_u32(u32::from(c) + 1),
        };
        if let Some(next) = next {
            chars.push(next);
            return Some(chars.into_iter().collect());
        }
    }
    None
}

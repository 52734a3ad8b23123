//! Threaded comments and live comment notifications for posthread.
//!
//! Comments form a tree per post. Each comment stores a materialized path
//! (`root_id/child_id/...`) and a level, so a whole subtree is one range scan
//! over the `path` column. The [`CommentService`] validates writes against
//! the post and user directories, persists through a [`CommentStore`], and
//! fans new comments out to subscribers through a [`NotificationBus`].

mod bus;
mod comment;
mod error;
mod memory;
mod service;
mod sqlite;
mod store;

pub use bus::{
    CommentEvent, EventKind, NotificationBus, PublishReport, Subscription,
    DEFAULT_SUBSCRIBER_BUFFER,
};
pub use comment::{new_comment, validate_content, Comment, MAX_COMMENT_LEN, PATH_SEPARATOR};
pub use error::{CommentError, ErrorKind};
pub use memory::MemoryCommentStore;
pub use service::{CommentService, DEFAULT_THREAD_DEPTH};
pub use sqlite::SqliteCommentStore;
pub use store::{prefix_upper_bound, CommentStore};

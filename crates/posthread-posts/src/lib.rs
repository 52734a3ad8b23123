//! Users and posts for posthread.
//!
//! The comment engine only reads from these subsystems (through the
//! [`PostDirectory`] and [`UserDirectory`] traits in `posthread-types`). This
//! crate implements those traits for an in-memory backend and a SQLite
//! backend, and adds the small write surface needed to operate the service:
//! registering users, publishing and listing posts, and letting a post's
//! author edit or delete it and switch comments off and on.
//!
//! [`PostDirectory`]: posthread_types::PostDirectory
//! [`UserDirectory`]: posthread_types::UserDirectory

mod error;
mod memory;
mod registry;
mod sqlite;
mod validate;

pub use error::DirectoryError;
pub use memory::{MemoryPostStore, MemoryUserStore};
pub use registry::{
    delete_post, edit_post, list_author_posts, list_posts, publish_post, register_user,
    set_comments_disabled, PostStore, UserStore,
};
pub use sqlite::{SqlitePostStore, SqliteUserStore};
pub use validate::{
    new_post, new_user, MAX_POST_CONTENT_LEN, MAX_POST_TITLE_LEN, MAX_USERNAME_LEN,
    MIN_USERNAME_LEN,
};

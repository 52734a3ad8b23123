//! Shared types, error definitions, and collaborator contracts for posthread.
//!
//! This crate provides the value types passed between the posthread crates:
//! the `Post` and `User` collaborator records, pagination requests and
//! responses, the storage error shared by every backend, and the lookup
//! traits the comment engine consumes from the post and user subsystems.
//!
//! No crate in the workspace depends on anything *except* `posthread-types`
//! for cross-cutting type definitions. This keeps the dependency graph clean
//! and prevents circular dependencies.

mod directory;
mod error;
mod pagination;
mod time;

pub use directory::{PostDirectory, UserDirectory};
pub use error::StoreError;
pub use pagination::{Page, PageInfo, PageRequest, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
pub use time::{format_timestamp, parse_timestamp, timestamp_now};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered user.
///
/// Only the identifier matters to the comment engine; the remaining fields
/// are carried so hydrated comments can present their author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A blog post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    /// Author of the post. Only the author may toggle comments.
    pub author_id: Uuid,
    pub title: String,
    pub content: String,
    /// When set, new comments are rejected for this post.
    pub comments_disabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//! Field validation and construction of new users and posts.

use posthread_types::{timestamp_now, Post, User};
use uuid::Uuid;

use crate::error::DirectoryError;

pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 50;
pub const MAX_POST_TITLE_LEN: usize = 200;
pub const MAX_POST_CONTENT_LEN: usize = 10_000;

/// Validates the fields and builds a new user with a fresh ID.
pub fn new_user(username: &str, email: &str) -> Result<User, DirectoryError> {
    let invalid = |msg: &str| Err(DirectoryError::InvalidUser(msg.to_string()));

    let username_len = username.chars().count();
    if username.is_empty() {
        return invalid("username must not be empty");
    }
    if username_len < MIN_USERNAME_LEN {
        return invalid("username must be at least 3 characters");
    }
    if username_len > MAX_USERNAME_LEN {
        return invalid("username must be at most 50 characters");
    }
    if username.contains(' ') {
        return invalid("username must not contain spaces");
    }
    if email.is_empty() {
        return invalid("email must not be empty");
    }
    if !email.contains('@') || !email.contains('.') {
        return invalid("email is malformed");
    }

    let now = timestamp_now();
    Ok(User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        email: email.to_string(),
        created_at: now,
        updated_at: now,
    })
}

/// Validates the fields and builds a new post with comments enabled.
pub fn new_post(author_id: Uuid, title: &str, content: &str) -> Result<Post, DirectoryError> {
    let invalid = |msg: &str| Err(DirectoryError::InvalidPost(msg.to_string()));

    if title.trim().is_empty() {
        return invalid("title must not be blank");
    }
    if title.chars().count() > MAX_POST_TITLE_LEN {
        return invalid("title must be at most 200 characters");
    }
    if content.trim().is_empty() {
        return invalid("content must not be blank");
    }
    if content.chars().count() > MAX_POST_CONTENT_LEN {
        return invalid("content must be at most 10000 characters");
    }

    let now = timestamp_now();
    Ok(Post {
        id: Uuid::new_v4(),
        author_id,
        title: title.to_string(),
        content: content.to_string(),
        comments_disabled: false,
        created_at: now,
        updated_at: now,
    })
}

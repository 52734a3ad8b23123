//! The comment entity and its construction rules.

use chrono::{DateTime, Utc};
use posthread_types::{timestamp_now, Post, User};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CommentError;

/// Maximum comment length, counted in Unicode scalar values.
pub const MAX_COMMENT_LEN: usize = 2000;

/// Separator between ancestor IDs in a materialized path.
pub const PATH_SEPARATOR: char = '/';

/// A node in a post's comment tree.
///
/// `path` lists every ancestor ID from the root down to this comment,
/// joined by [`PATH_SEPARATOR`]. It is fixed at construction, so a prefix
/// match on `path` selects a whole subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    pub content: String,
    pub path: String,
    /// Depth in the thread. Roots are level 0.
    pub level: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // Hydrated relations. Never persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<Post>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Box<Comment>>,
}

impl Comment {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Returns a copy carrying only the persisted fields.
    pub fn detached(&self) -> Comment {
        Comment {
            author: None,
            post: None,
            parent: None,
            ..self.clone()
        }
    }

    /// Prefix shared by every descendant's path.
    pub fn descendant_prefix(&self) -> String {
        format!("{}{}", self.path, PATH_SEPARATOR)
    }
}

/// Checks comment content: non-blank after trimming and at most
/// [`MAX_COMMENT_LEN`] characters.
pub fn validate_content(content: &str) -> Result<(), CommentError> {
    if content.trim().is_empty() {
        return Err(CommentError::Empty);
    }
    if content.chars().count() > MAX_COMMENT_LEN {
        return Err(CommentError::TooLong {
            max: MAX_COMMENT_LEN,
        });
    }
    Ok(())
}

/// Builds a new comment, deriving `path` and `level` from `parent`.
///
/// The caller is responsible for checking that `parent` belongs to
/// `post_id`. Content is stored as given; only validation trims it.
pub fn new_comment(
    post_id: Uuid,
    author_id: Uuid,
    content: &str,
    parent: Option<&Comment>,
) -> Result<Comment, CommentError> {
    validate_content(content)?;

    let id = Uuid::new_v4();
    let now = timestamp_now();
    let (parent_id, path, level) = match parent {
        Some(parent) => (
            Some(parent.id),
            format!("{}{}{}", parent.path, PATH_SEPARATOR, id),
            parent.level + 1,
        ),
        None => (None, id.to_string(), 0),
    };

    Ok(Comment {
        id,
        post_id,
        author_id,
        parent_id,
        content: content.to_string(),
        path,
        level,
        created_at: now,
        updated_at: now,
        author: None,
        post: None,
        parent: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_comment_path_is_its_own_id() {
        let c = new_comment(Uuid::new_v4(), Uuid::new_v4(), "Root", None).unwrap();
        assert_eq!(c.level, 0);
        assert_eq!(c.path, c.id.to_string());
        assert!(c.is_root());
        assert_eq!(c.created_at, c.updated_at);
    }

    #[test]
    fn reply_extends_parent_path() {
        let post = Uuid::new_v4();
        let root = new_comment(post, Uuid::new_v4(), "Root", None).unwrap();
        let reply = new_comment(post, Uuid::new_v4(), "Reply", Some(&root)).unwrap();
        let deep = new_comment(post, Uuid::new_v4(), "Deep", Some(&reply)).unwrap();

        assert_eq!(reply.parent_id, Some(root.id));
        assert_eq!(reply.level, 1);
        assert_eq!(reply.path, format!("{}/{}", root.path, reply.id));

        assert_eq!(deep.level, 2);
        assert_eq!(deep.path, format!("{}/{}/{}", root.id, reply.id, deep.id));
        assert!(deep.path.starts_with(&root.descendant_prefix()));
    }

    #[test]
    fn blank_content_is_rejected() {
        for content in ["", "   ", "\n\t "] {
            let err = new_comment(Uuid::new_v4(), Uuid::new_v4(), content, None).unwrap_err();
            assert!(matches!(err, CommentError::Empty), "{content:?}");
        }
    }

    #[test]
    fn length_is_counted_in_characters() {
        let at_limit = "é".repeat(MAX_COMMENT_LEN);
        assert!(at_limit.len() > MAX_COMMENT_LEN);
        assert!(validate_content(&at_limit).is_ok());

        let over = "a".repeat(MAX_COMMENT_LEN + 1);
        assert!(matches!(
            validate_content(&over),
            Err(CommentError::TooLong { max: MAX_COMMENT_LEN })
        ));
    }

    #[test]
    fn content_is_kept_verbatim() {
        let c = new_comment(Uuid::new_v4(), Uuid::new_v4(), "  padded  ", None).unwrap();
        assert_eq!(c.content, "  padded  ");
    }

    #[test]
    fn hydrated_relations_are_omitted_from_json_when_absent() {
        let c = new_comment(Uuid::new_v4(), Uuid::new_v4(), "Root", None).unwrap();
        let json = serde_json::to_value(&c).unwrap();
        assert!(json.get("author").is_none());
        assert!(json.get("parent").is_none());
        assert!(json.get("parent_id").is_none());
        assert_eq!(json["level"], 0);
    }

    #[test]
    fn detached_drops_relations() {
        let post = Uuid::new_v4();
        let root = new_comment(post, Uuid::new_v4(), "Root", None).unwrap();
        let mut reply = new_comment(post, Uuid::new_v4(), "Reply", Some(&root)).unwrap();
        reply.parent = Some(Box::new(root));
        let bare = reply.detached();
        assert!(bare.parent.is_none());
        assert_eq!(bare.id, reply.id);
    }
}

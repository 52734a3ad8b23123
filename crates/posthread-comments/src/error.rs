//! Error taxonomy for comment operations.

use posthread_types::StoreError;
use thiserror::Error;
use uuid::Uuid;

/// Coarse classification of a [`CommentError`].
///
/// Transports map on this instead of on individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AccessDenied,
    InvalidInput,
    CommentsDisabled,
    Storage,
}

/// Errors that can occur during comment operations.
#[derive(Debug, Error)]
pub enum CommentError {
    #[error("post not found: {0}")]
    PostNotFound(Uuid),

    #[error("user not found: {0}")]
    UserNotFound(Uuid),

    #[error("comment not found: {0}")]
    CommentNotFound(Uuid),

    #[error("not allowed to modify comment {0}")]
    AccessDenied(Uuid),

    #[error("comment content must not be empty")]
    Empty,

    #[error("comment content exceeds {max} characters")]
    TooLong { max: usize },

    #[error("invalid comment data: {0}")]
    InvalidData(String),

    #[error("comments are disabled for post {0}")]
    CommentsDisabled(Uuid),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl CommentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PostNotFound(_) | Self::UserNotFound(_) | Self::CommentNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::AccessDenied(_) => ErrorKind::AccessDenied,
            Self::Empty | Self::TooLong { .. } | Self::InvalidData(_) => ErrorKind::InvalidInput,
            Self::CommentsDisabled(_) => ErrorKind::CommentsDisabled,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PostNotFound(_) => "POST_NOT_FOUND",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::CommentNotFound(_) => "COMMENT_NOT_FOUND",
            Self::AccessDenied(_) => "COMMENT_ACCESS_DENIED",
            Self::Empty => "COMMENT_EMPTY",
            Self::TooLong { .. } => "COMMENT_TOO_LONG",
            Self::InvalidData(_) => "INVALID_COMMENT_DATA",
            Self::CommentsDisabled(_) => "COMMENTS_DISABLED",
            Self::Storage(_) => "DATABASE_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_group_variants() {
        let id = Uuid::new_v4();
        assert_eq!(CommentError::PostNotFound(id).kind(), ErrorKind::NotFound);
        assert_eq!(CommentError::CommentNotFound(id).kind(), ErrorKind::NotFound);
        assert_eq!(CommentError::AccessDenied(id).kind(), ErrorKind::AccessDenied);
        assert_eq!(CommentError::TooLong { max: 1 }.kind(), ErrorKind::InvalidInput);
        assert_eq!(
            CommentError::InvalidData("x".into()).kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            CommentError::CommentsDisabled(id).kind(),
            ErrorKind::CommentsDisabled
        );
        assert_eq!(
            CommentError::from(StoreError::Poisoned("test")).kind(),
            ErrorKind::Storage
        );
    }

    #[test]
    fn storage_errors_report_database_code() {
        let err = CommentError::from(StoreError::backend("create", "disk full"));
        assert_eq!(err.code(), "DATABASE_ERROR");
        assert!(err.to_string().contains("disk full"));
    }
}

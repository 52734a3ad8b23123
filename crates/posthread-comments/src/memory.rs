//! In-memory comment store.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use posthread_types::{Page, PageRequest, StoreError};
use uuid::Uuid;

use crate::comment::Comment;
use crate::store::CommentStore;

struct Entry {
    comment: Comment,
    /// Insertion counter, used to break `created_at` ties.
    seq: u64,
}

#[derive(Default)]
struct Inner {
    comments: HashMap<Uuid, Entry>,
    next_seq: u64,
}

impl Inner {
    fn collect<F>(&self, filter: F) -> Vec<&Entry>
    where
        F: Fn(&Comment) -> bool,
    {
        self.comments
            .values()
            .filter(|entry| filter(&entry.comment))
            .collect()
    }
}

fn by_created(mut entries: Vec<&Entry>) -> Vec<Comment> {
    entries.sort_by(|a, b| {
        (a.comment.created_at, a.seq).cmp(&(b.comment.created_at, b.seq))
    });
    entries.into_iter().map(|e| e.comment.clone()).collect()
}

fn by_path(mut entries: Vec<&Entry>) -> Vec<Comment> {
    entries.sort_by(|a, b| {
        (&a.comment.path, a.comment.created_at, a.seq).cmp(&(
            &b.comment.path,
            b.comment.created_at,
            b.seq,
        ))
    });
    entries.into_iter().map(|e| e.comment.clone()).collect()
}

/// Comments held in a `HashMap` behind a single `RwLock`.
///
/// Every returned comment is a copy; callers cannot mutate stored state.
#[derive(Default)]
pub struct MemoryCommentStore {
    inner: RwLock<Inner>,
}

impl MemoryCommentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self, operation: &'static str) -> Result<RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Poisoned(operation))
    }

    fn write(&self, operation: &'static str) -> Result<RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Poisoned(operation))
    }
}

impl CommentStore for MemoryCommentStore {
    fn create(&self, comment: &Comment) -> Result<(), StoreError> {
        let mut inner = self.write("create")?;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.comments.insert(
            comment.id,
            Entry {
                comment: comment.detached(),
                seq,
            },
        );
        tracing::debug!(comment_id = %comment.id, "comment stored in memory");
        Ok(())
    }

    fn get_by_id(&self, id: Uuid) -> Result<Option<Comment>, StoreError> {
        let inner = self.read("get_by_id")?;
        Ok(inner.comments.get(&id).map(|e| e.comment.clone()))
    }

    fn update_content(
        &self,
        id: Uuid,
        content: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.write("update_content")?;
        match inner.comments.get_mut(&id) {
            Some(entry) => {
                entry.comment.content = content.to_string();
                entry.comment.updated_at = updated_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.write("delete")?;
        Ok(inner.comments.remove(&id).is_some())
    }

    fn exists(&self, id: Uuid) -> Result<bool, StoreError> {
        let inner = self.read("exists")?;
        Ok(inner.comments.contains_key(&id))
    }

    fn list_by_post(&self, post_id: Uuid, page: PageRequest) -> Result<Page<Comment>, StoreError> {
        let inner = self.read("list_by_post")?;
        let roots = inner.collect(|c| c.post_id == post_id && c.is_root());
        Ok(Page::from_sorted(by_created(roots), page))
    }

    fn list_by_parent(
        &self,
        parent_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<Comment>, StoreError> {
        let inner = self.read("list_by_parent")?;
        let replies = inner.collect(|c| c.parent_id == Some(parent_id));
        Ok(Page::from_sorted(by_created(replies), page))
    }

    fn count_by_post(&self, post_id: Uuid) -> Result<u64, StoreError> {
        let inner = self.read("count_by_post")?;
        Ok(inner.collect(|c| c.post_id == post_id && c.is_root()).len() as u64)
    }

    fn count_by_parent(&self, parent_id: Uuid) -> Result<u64, StoreError> {
        let inner = self.read("count_by_parent")?;
        Ok(inner.collect(|c| c.parent_id == Some(parent_id)).len() as u64)
    }

    fn get_thread(&self, root_id: Uuid, max_depth: u32) -> Result<Vec<Comment>, StoreError> {
        let inner = self.read("get_thread")?;
        let Some(root) = inner.comments.get(&root_id).map(|e| &e.comment) else {
            return Ok(Vec::new());
        };
        let max_level = root.level.saturating_add(max_depth);
        let prefix = root.descendant_prefix();
        let thread = inner.collect(|c| {
            (c.path == root.path || c.path.starts_with(&prefix)) && c.level <= max_level
        });
        Ok(by_path(thread))
    }

    fn get_by_path(&self, prefix: &str, page: PageRequest) -> Result<Page<Comment>, StoreError> {
        let inner = self.read("get_by_path")?;
        let matches = inner.collect(|c| c.path.starts_with(prefix));
        Ok(Page::from_sorted(by_path(matches), page))
    }

    fn get_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Comment>, StoreError> {
        let inner = self.read("get_by_ids")?;
        Ok(ids
            .iter()
            .filter_map(|id| inner.comments.get(id))
            .map(|e| e.comment.clone())
            .collect())
    }
}

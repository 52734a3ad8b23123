//! In-memory user and post backends.
//!
//! Each store is a map behind a `std::sync::RwLock`. Lock acquisitions are
//! brief map operations that never span an `.await`. Reads hand out clones,
//! so callers never observe a record being written.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::RwLock;

use posthread_types::{Page, PageRequest, Post, PostDirectory, StoreError, User, UserDirectory};
use uuid::Uuid;

use crate::registry::{with_comments_disabled, with_content, PostStore, UserStore};

/// Users held in process memory.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserDirectory for MemoryUserStore {
    fn user_exists(&self, id: Uuid) -> Result<bool, StoreError> {
        let users = self
            .users
            .read()
            .map_err(|_| StoreError::Poisoned("user_exists"))?;
        Ok(users.contains_key(&id))
    }

    fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let users = self
            .users
            .read()
            .map_err(|_| StoreError::Poisoned("get_user"))?;
        Ok(users.get(&id).cloned())
    }

    fn get_users_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, StoreError> {
        let users = self
            .users
            .read()
            .map_err(|_| StoreError::Poisoned("get_users_by_ids"))?;
        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }
}

impl UserStore for MemoryUserStore {
    fn insert_user(&self, user: &User) -> Result<bool, StoreError> {
        let mut users = self
            .users
            .write()
            .map_err(|_| StoreError::Poisoned("insert_user"))?;
        let taken = users
            .values()
            .any(|u| u.username == user.username || u.email == user.email);
        if taken || users.contains_key(&user.id) {
            return Ok(false);
        }
        users.insert(user.id, user.clone());
        Ok(true)
    }
}

#[derive(Debug, Default)]
struct PostTable {
    /// Each post with its insertion sequence number.
    posts: HashMap<Uuid, (u64, Post)>,
    next_seq: u64,
}

/// Posts held in process memory.
#[derive(Debug, Default)]
pub struct MemoryPostStore {
    posts: RwLock<PostTable>,
}

impl MemoryPostStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PostDirectory for MemoryPostStore {
    fn post_exists(&self, id: Uuid) -> Result<bool, StoreError> {
        let posts = self
            .posts
            .read()
            .map_err(|_| StoreError::Poisoned("post_exists"))?;
        Ok(posts.posts.contains_key(&id))
    }

    fn get_post(&self, id: Uuid) -> Result<Option<Post>, StoreError> {
        let posts = self
            .posts
            .read()
            .map_err(|_| StoreError::Poisoned("get_post"))?;
        Ok(posts.posts.get(&id).map(|(_, p)| p.clone()))
    }

    fn post_comments_enabled(&self, id: Uuid) -> Result<bool, StoreError> {
        let posts = self
            .posts
            .read()
            .map_err(|_| StoreError::Poisoned("post_comments_enabled"))?;
        Ok(posts.posts.get(&id).is_some_and(|(_, p)| !p.comments_disabled))
    }

    fn get_posts_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Post>, StoreError> {
        let posts = self
            .posts
            .read()
            .map_err(|_| StoreError::Poisoned("get_posts_by_ids"))?;
        Ok(ids
            .iter()
            .filter_map(|id| posts.posts.get(id).map(|(_, p)| p.clone()))
            .collect())
    }
}

impl PostStore for MemoryPostStore {
    fn insert_post(&self, post: &Post) -> Result<(), StoreError> {
        let mut posts = self
            .posts
            .write()
            .map_err(|_| StoreError::Poisoned("insert_post"))?;
        let seq = posts.next_seq;
        posts.next_seq += 1;
        posts.posts.insert(post.id, (seq, post.clone()));
        Ok(())
    }

    fn update_comments_disabled(
        &self,
        id: Uuid,
        disabled: bool,
    ) -> Result<Option<Post>, StoreError> {
        let mut posts = self
            .posts
            .write()
            .map_err(|_| StoreError::Poisoned("update_comments_disabled"))?;
        let Some((_, current)) = posts.posts.get_mut(&id) else {
            return Ok(None);
        };
        *current = with_comments_disabled(current.clone(), disabled);
        Ok(Some(current.clone()))
    }

    fn list_posts(
        &self,
        author_id: Option<Uuid>,
        page: PageRequest,
    ) -> Result<Page<Post>, StoreError> {
        let posts = self
            .posts
            .read()
            .map_err(|_| StoreError::Poisoned("list_posts"))?;
        let mut matching: Vec<&(u64, Post)> = posts
            .posts
            .values()
            .filter(|(_, p)| match author_id {
                Some(author) => p.author_id == author,
                None => true,
            })
            .collect();
        matching.sort_by_key(|(seq, p)| Reverse((p.created_at, *seq)));
        let sorted = matching.into_iter().map(|(_, p)| p.clone()).collect();
        Ok(Page::from_sorted(sorted, page))
    }

    fn update_post_content(
        &self,
        id: Uuid,
        title: &str,
        content: &str,
    ) -> Result<Option<Post>, StoreError> {
        let mut posts = self
            .posts
            .write()
            .map_err(|_| StoreError::Poisoned("update_post_content"))?;
        let Some((_, current)) = posts.posts.get_mut(&id) else {
            return Ok(None);
        };
        *current = with_content(current.clone(), title, content);
        Ok(Some(current.clone()))
    }

    fn delete_post(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut posts = self
            .posts
            .write()
            .map_err(|_| StoreError::Poisoned("delete_post"))?;
        Ok(posts.posts.remove(&id).is_some())
    }
}

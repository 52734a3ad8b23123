//! Comment operations: validation against posts and users, authorship
//! rules, persistence, and live notification.
//!
//! Every method is synchronous. Async callers should run them on the
//! blocking pool (`tokio::task::spawn_blocking`).

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;

use posthread_types::{
    timestamp_now, Page, PageRequest, PostDirectory, StoreError, UserDirectory,
};
use uuid::Uuid;

use crate::bus::{CommentEvent, NotificationBus, Subscription};
use crate::comment::{new_comment, validate_content, Comment};
use crate::error::CommentError;
use crate::store::CommentStore;

/// Thread depth used when a caller does not choose one.
pub const DEFAULT_THREAD_DEPTH: u32 = 10;

fn storage_failure(step: &'static str) -> impl FnOnce(StoreError) -> CommentError {
    move |e| {
        tracing::error!(error = %e, step, "comment storage failure");
        CommentError::Storage(e)
    }
}

/// Keeps the first occurrence of each key, in order.
fn unique<K, I>(keys: I) -> Vec<K>
where
    K: Eq + Hash + Copy,
    I: IntoIterator<Item = K>,
{
    let mut seen = HashSet::new();
    keys.into_iter().filter(|k| seen.insert(*k)).collect()
}

pub struct CommentService {
    comments: Arc<dyn CommentStore>,
    posts: Arc<dyn PostDirectory>,
    users: Arc<dyn UserDirectory>,
    bus: NotificationBus,
}

impl CommentService {
    pub fn new(
        comments: Arc<dyn CommentStore>,
        posts: Arc<dyn PostDirectory>,
        users: Arc<dyn UserDirectory>,
        bus: NotificationBus,
    ) -> Self {
        Self {
            comments,
            posts,
            users,
            bus,
        }
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    /// Creates a root comment, or a reply when `parent_id` is given, and
    /// notifies the post's subscribers.
    ///
    /// Checks run in order: the post exists, it accepts comments, the
    /// author exists, the parent exists and belongs to the same post, the
    /// content is valid.
    pub fn create_comment(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        content: &str,
        parent_id: Option<Uuid>,
    ) -> Result<Comment, CommentError> {
        tracing::info!(
            post_id = %post_id,
            author_id = %author_id,
            parent_id = ?parent_id,
            "creating comment"
        );

        let post = self
            .posts
            .get_post(post_id)
            .map_err(storage_failure("load post"))?
            .ok_or_else(|| {
                tracing::warn!(post_id = %post_id, "post not found");
                CommentError::PostNotFound(post_id)
            })?;

        if post.comments_disabled {
            tracing::warn!(post_id = %post_id, "comments are disabled for post");
            return Err(CommentError::CommentsDisabled(post_id));
        }

        let author = self
            .users
            .get_user(author_id)
            .map_err(storage_failure("load author"))?
            .ok_or_else(|| {
                tracing::warn!(author_id = %author_id, "comment author not found");
                CommentError::UserNotFound(author_id)
            })?;

        let parent = match parent_id {
            Some(parent_id) => {
                let parent = self
                    .comments
                    .get_by_id(parent_id)
                    .map_err(storage_failure("load parent"))?
                    .ok_or_else(|| {
                        tracing::warn!(parent_id = %parent_id, "parent comment not found");
                        CommentError::CommentNotFound(parent_id)
                    })?;
                if parent.post_id != post_id {
                    tracing::warn!(
                        parent_post_id = %parent.post_id,
                        target_post_id = %post_id,
                        "parent comment belongs to another post"
                    );
                    return Err(CommentError::InvalidData(
                        "parent comment belongs to another post".to_string(),
                    ));
                }
                Some(parent)
            }
            None => None,
        };

        let mut comment = new_comment(post_id, author_id, content, parent.as_ref())?;
        self.comments
            .create(&comment)
            .map_err(storage_failure("create comment"))?;

        comment.author = Some(author);
        comment.post = Some(post);
        comment.parent = parent.map(Box::new);

        let report = self.bus.publish(CommentEvent::created(comment.clone()));
        tracing::info!(
            comment_id = %comment.id,
            post_id = %post_id,
            subscribers = report.delivered,
            "comment created"
        );
        Ok(comment)
    }

    pub fn get_comment(&self, id: Uuid) -> Result<Comment, CommentError> {
        tracing::debug!(comment_id = %id, "loading comment");

        let comment = self
            .comments
            .get_by_id(id)
            .map_err(storage_failure("load comment"))?
            .ok_or_else(|| {
                tracing::warn!(comment_id = %id, "comment not found");
                CommentError::CommentNotFound(id)
            })?;

        let mut batch = vec![comment];
        self.hydrate(&mut batch);
        Ok(batch.remove(0))
    }

    /// Root comments of a post, oldest first.
    pub fn list_post_comments(
        &self,
        post_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<Comment>, CommentError> {
        tracing::debug!(
            post_id = %post_id,
            limit = page.limit,
            offset = page.offset,
            "listing post comments"
        );

        let exists = self
            .posts
            .post_exists(post_id)
            .map_err(storage_failure("check post"))?;
        if !exists {
            return Err(CommentError::PostNotFound(post_id));
        }

        let mut result = self
            .comments
            .list_by_post(post_id, page)
            .map_err(storage_failure("list post comments"))?;
        self.hydrate(&mut result.items);
        Ok(result)
    }

    /// Direct replies to a comment, oldest first.
    pub fn list_replies(
        &self,
        parent_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<Comment>, CommentError> {
        tracing::debug!(
            parent_id = %parent_id,
            limit = page.limit,
            offset = page.offset,
            "listing replies"
        );

        self.require_comment(parent_id)?;
        let mut result = self
            .comments
            .list_by_parent(parent_id, page)
            .map_err(storage_failure("list replies"))?;
        self.hydrate(&mut result.items);
        Ok(result)
    }

    /// The comment and its descendants down to `max_depth` levels below it,
    /// ordered by path.
    pub fn get_thread(&self, comment_id: Uuid, max_depth: u32) -> Result<Vec<Comment>, CommentError> {
        tracing::debug!(comment_id = %comment_id, max_depth, "loading thread");

        self.require_comment(comment_id)?;
        let mut thread = self
            .comments
            .get_thread(comment_id, max_depth)
            .map_err(storage_failure("load thread"))?;
        self.hydrate(&mut thread);
        Ok(thread)
    }

    /// Replaces a comment's content. Only its author may do this.
    ///
    /// Subscribers are not notified of edits.
    pub fn update_comment(
        &self,
        id: Uuid,
        author_id: Uuid,
        content: &str,
    ) -> Result<Comment, CommentError> {
        tracing::info!(comment_id = %id, author_id = %author_id, "updating comment");

        let mut comment = self.load_owned(id, author_id, "update")?;
        validate_content(content)?;

        let updated_at = timestamp_now();
        let updated = self
            .comments
            .update_content(id, content, updated_at)
            .map_err(storage_failure("update comment"))?;
        if !updated {
            // Deleted between the load and the write.
            return Err(CommentError::CommentNotFound(id));
        }

        comment.content = content.to_string();
        comment.updated_at = updated_at;

        let mut batch = vec![comment];
        self.hydrate(&mut batch);
        tracing::info!(comment_id = %id, "comment updated");
        Ok(batch.remove(0))
    }

    /// Deletes a comment. Only its author may do this. Replies are kept and
    /// remain reachable through their paths.
    pub fn delete_comment(&self, id: Uuid, author_id: Uuid) -> Result<(), CommentError> {
        tracing::info!(comment_id = %id, author_id = %author_id, "deleting comment");

        self.load_owned(id, author_id, "delete")?;
        self.comments
            .delete(id)
            .map_err(storage_failure("delete comment"))?;

        tracing::info!(comment_id = %id, "comment deleted");
        Ok(())
    }

    /// Starts receiving `comment_created` events for a post.
    pub fn subscribe(&self, post_id: Uuid) -> Subscription {
        self.bus.subscribe(post_id)
    }

    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.bus.unsubscribe(subscription)
    }

    fn require_comment(&self, id: Uuid) -> Result<(), CommentError> {
        let exists = self
            .comments
            .exists(id)
            .map_err(storage_failure("check comment"))?;
        if exists {
            Ok(())
        } else {
            Err(CommentError::CommentNotFound(id))
        }
    }

    fn load_owned(
        &self,
        id: Uuid,
        requester_id: Uuid,
        action: &'static str,
    ) -> Result<Comment, CommentError> {
        let comment = self
            .comments
            .get_by_id(id)
            .map_err(storage_failure("load comment"))?
            .ok_or(CommentError::CommentNotFound(id))?;

        if comment.author_id != requester_id {
            tracing::warn!(
                comment_id = %id,
                comment_author_id = %comment.author_id,
                requester_id = %requester_id,
                action,
                "attempt to modify another user's comment"
            );
            return Err(CommentError::AccessDenied(id));
        }
        Ok(comment)
    }

    /// Attaches author, post, and parent to each comment using one batch
    /// lookup per relation. A failed lookup leaves that relation empty.
    fn hydrate(&self, comments: &mut [Comment]) {
        if comments.is_empty() {
            return;
        }

        let author_ids = unique(comments.iter().map(|c| c.author_id));
        let post_ids = unique(comments.iter().map(|c| c.post_id));
        let parent_ids = unique(comments.iter().filter_map(|c| c.parent_id));

        let authors: HashMap<_, _> = match self.users.get_users_by_ids(&author_ids) {
            Ok(users) => users.into_iter().map(|u| (u.id, u)).collect(),
            Err(e) => {
                tracing::error!(error = %e, "failed to load comment authors");
                HashMap::new()
            }
        };

        let posts: HashMap<_, _> = match self.posts.get_posts_by_ids(&post_ids) {
            Ok(posts) => posts.into_iter().map(|p| (p.id, p)).collect(),
            Err(e) => {
                tracing::error!(error = %e, "failed to load comment posts");
                HashMap::new()
            }
        };

        let parents: HashMap<_, _> = if parent_ids.is_empty() {
            HashMap::new()
        } else {
            match self.comments.get_by_ids(&parent_ids) {
                Ok(parents) => parents.into_iter().map(|c| (c.id, c)).collect(),
                Err(e) => {
                    tracing::error!(error = %e, "failed to load parent comments");
                    HashMap::new()
                }
            }
        };

        for comment in comments.iter_mut() {
            comment.author = authors.get(&comment.author_id).cloned();
            comment.post = posts.get(&comment.post_id).cloned();
            comment.parent = comment
                .parent_id
                .and_then(|id| parents.get(&id))
                .cloned()
                .map(Box::new);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventKind;
    use crate::error::ErrorKind;
    use crate::memory::MemoryCommentStore;
    use posthread_posts::{
        publish_post, register_user, set_comments_disabled, MemoryPostStore, MemoryUserStore,
    };
    use posthread_types::User;

    struct Fixture {
        service: CommentService,
        comments: Arc<MemoryCommentStore>,
        posts: Arc<MemoryPostStore>,
        author: Uuid,
        other: Uuid,
        post: Uuid,
    }

    fn fixture() -> Fixture {
        let users = Arc::new(MemoryUserStore::new());
        let posts = Arc::new(MemoryPostStore::new());
        let comments = Arc::new(MemoryCommentStore::new());

        let author = register_user(users.as_ref(), "author", "author@example.com").unwrap();
        let other = register_user(users.as_ref(), "other", "other@example.com").unwrap();
        let post = publish_post(posts.as_ref(), users.as_ref(), author.id, "Title", "Body").unwrap();

        let service = CommentService::new(
            comments.clone(),
            posts.clone(),
            users,
            NotificationBus::default(),
        );
        Fixture {
            service,
            comments,
            posts,
            author: author.id,
            other: other.id,
            post: post.id,
        }
    }

    #[test]
    fn created_comment_is_hydrated() {
        let f = fixture();
        let root = f.service.create_comment(f.post, f.author, "Root", None).unwrap();
        assert_eq!(root.level, 0);
        assert_eq!(root.path, root.id.to_string());
        assert_eq!(root.author.as_ref().map(|u| u.id), Some(f.author));
        assert_eq!(root.post.as_ref().map(|p| p.id), Some(f.post));

        let reply = f
            .service
            .create_comment(f.post, f.other, "Reply", Some(root.id))
            .unwrap();
        assert_eq!(reply.level, 1);
        assert_eq!(reply.path, format!("{}/{}", root.path, reply.id));
        assert_eq!(reply.parent.as_ref().map(|p| p.id), Some(root.id));
    }

    #[test]
    fn thread_and_replies_follow_the_tree() {
        let f = fixture();
        let c0 = f.service.create_comment(f.post, f.author, "Root", None).unwrap();
        let c1 = f
            .service
            .create_comment(f.post, f.author, "Reply", Some(c0.id))
            .unwrap();
        let c2 = f
            .service
            .create_comment(f.post, f.author, "Deep", Some(c1.id))
            .unwrap();

        let thread: Vec<Uuid> = f
            .service
            .get_thread(c0.id, DEFAULT_THREAD_DEPTH)
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(thread, vec![c0.id, c1.id, c2.id]);

        let replies = f.service.list_replies(c0.id, PageRequest::new(10, 0)).unwrap();
        assert_eq!(replies.items.len(), 1);
        assert_eq!(replies.items[0].id, c1.id);
        assert_eq!(replies.items[0].parent.as_ref().map(|p| p.id), Some(c0.id));

        let roots = f.service.list_post_comments(f.post, PageRequest::default()).unwrap();
        assert_eq!(roots.items.len(), 1);
        assert_eq!(roots.info.total, 1);
        assert!(roots.items.iter().all(Comment::is_root));
    }

    #[test]
    fn create_checks_collaborators_in_order() {
        let f = fixture();
        let missing = Uuid::new_v4();

        let err = f.service.create_comment(missing, missing, "", None).unwrap_err();
        assert!(matches!(err, CommentError::PostNotFound(_)));

        let err = f.service.create_comment(f.post, missing, "hi", None).unwrap_err();
        assert!(matches!(err, CommentError::UserNotFound(_)));

        let err = f
            .service
            .create_comment(f.post, f.author, "hi", Some(missing))
            .unwrap_err();
        assert!(matches!(err, CommentError::CommentNotFound(_)));

        let err = f.service.create_comment(f.post, f.author, "  ", None).unwrap_err();
        assert!(matches!(err, CommentError::Empty));
    }

    #[test]
    fn parent_from_another_post_is_invalid() {
        let f = fixture();
        let users = MemoryUserStore::new();
        let author = register_user(&users, "second", "second@example.com").unwrap();
        let other_post =
            publish_post(f.posts.as_ref(), &users, author.id, "Other", "Body").unwrap();

        let foreign = f.service.create_comment(f.post, f.author, "Root", None).unwrap();
        let err = f
            .service
            .create_comment(other_post.id, f.author, "Reply", Some(foreign.id))
            .unwrap_err();
        assert!(matches!(err, CommentError::InvalidData(_)));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn disabled_post_rejects_comments_and_writes_nothing() {
        let f = fixture();
        set_comments_disabled(f.posts.as_ref(), f.post, f.author, true).unwrap();

        let err = f.service.create_comment(f.post, f.author, "hi", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CommentsDisabled);
        assert_eq!(f.comments.count_by_post(f.post).unwrap(), 0);
    }

    #[test]
    fn only_the_author_updates_or_deletes() {
        let f = fixture();
        let comment = f.service.create_comment(f.post, f.author, "Original", None).unwrap();

        let err = f
            .service
            .update_comment(comment.id, f.other, "Hijacked")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);

        // Authorship is checked before content.
        let err = f.service.update_comment(comment.id, f.other, "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);

        let err = f.service.delete_comment(comment.id, f.other).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);

        let stored = f.service.get_comment(comment.id).unwrap();
        assert_eq!(stored.content, "Original");
        assert_eq!(stored.updated_at, comment.updated_at);
    }

    #[test]
    fn author_update_keeps_structure() {
        let f = fixture();
        let root = f.service.create_comment(f.post, f.author, "Root", None).unwrap();
        let reply = f
            .service
            .create_comment(f.post, f.author, "Reply", Some(root.id))
            .unwrap();

        let updated = f.service.update_comment(reply.id, f.author, "Edited").unwrap();
        assert_eq!(updated.content, "Edited");
        assert_eq!(updated.path, reply.path);
        assert_eq!(updated.level, reply.level);
        assert_eq!(updated.parent_id, Some(root.id));
        assert!(updated.updated_at >= reply.updated_at);
        assert_eq!(updated.author.as_ref().map(|u| u.id), Some(f.author));

        let err = f
            .service
            .update_comment(reply.id, f.author, &"x".repeat(2001))
            .unwrap_err();
        assert!(matches!(err, CommentError::TooLong { .. }));
    }

    #[test]
    fn delete_keeps_replies_addressable() {
        let f = fixture();
        let root = f.service.create_comment(f.post, f.author, "Root", None).unwrap();
        let reply = f
            .service
            .create_comment(f.post, f.other, "Reply", Some(root.id))
            .unwrap();

        f.service.delete_comment(root.id, f.author).unwrap();
        assert_eq!(
            f.service.get_comment(root.id).unwrap_err().kind(),
            ErrorKind::NotFound
        );

        let orphan = f.service.get_comment(reply.id).unwrap();
        assert_eq!(orphan.parent_id, Some(root.id));
        assert!(orphan.parent.is_none());

        let by_path = f
            .comments
            .get_by_path(&root.path, PageRequest::default())
            .unwrap();
        assert_eq!(by_path.items.len(), 1);
        assert_eq!(by_path.items[0].id, reply.id);
    }

    #[test]
    fn reads_of_missing_scopes_are_not_found() {
        let f = fixture();
        let missing = Uuid::new_v4();
        assert!(matches!(
            f.service.list_post_comments(missing, PageRequest::default()),
            Err(CommentError::PostNotFound(_))
        ));
        assert!(matches!(
            f.service.list_replies(missing, PageRequest::default()),
            Err(CommentError::CommentNotFound(_))
        ));
        assert!(matches!(
            f.service.get_thread(missing, 3),
            Err(CommentError::CommentNotFound(_))
        ));
    }

    #[test]
    fn subscribers_see_created_comments_only_while_subscribed() {
        let f = fixture();
        let mut first = f.service.subscribe(f.post);
        let mut second = f.service.subscribe(f.post);

        let created = f.service.create_comment(f.post, f.author, "Hello", None).unwrap();
        for sub in [&mut first, &mut second] {
            let event = sub.try_recv().expect("event should be delivered");
            assert_eq!(event.kind, EventKind::CommentCreated);
            assert_eq!(event.post_id, f.post);
            assert_eq!(event.comment.id, created.id);
            assert!(sub.try_recv().is_none());
        }

        assert!(f.service.unsubscribe(&second));
        f.service.create_comment(f.post, f.author, "Again", None).unwrap();
        assert!(first.try_recv().is_some());
        assert!(second.try_recv().is_none());
    }

    #[test]
    fn edits_publish_no_event() {
        let f = fixture();
        let comment = f.service.create_comment(f.post, f.author, "Hello", None).unwrap();
        let mut sub = f.service.subscribe(f.post);
        f.service.update_comment(comment.id, f.author, "Edited").unwrap();
        assert!(sub.try_recv().is_none());
    }

    struct BrokenBatchUsers(MemoryUserStore);

    impl UserDirectory for BrokenBatchUsers {
        fn user_exists(&self, id: Uuid) -> Result<bool, StoreError> {
            self.0.user_exists(id)
        }

        fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
            self.0.get_user(id)
        }

        fn get_users_by_ids(&self, _ids: &[Uuid]) -> Result<Vec<User>, StoreError> {
            Err(StoreError::backend("get_users_by_ids", "connection reset"))
        }
    }

    #[test]
    fn hydration_failures_are_absorbed() {
        let users = MemoryUserStore::new();
        let posts = Arc::new(MemoryPostStore::new());
        let author = register_user(&users, "author", "author@example.com").unwrap();
        let post = publish_post(posts.as_ref(), &users, author.id, "Title", "Body").unwrap();

        let service = CommentService::new(
            Arc::new(MemoryCommentStore::new()),
            posts,
            Arc::new(BrokenBatchUsers(users)),
            NotificationBus::default(),
        );
        let comment = service.create_comment(post.id, author.id, "Hello", None).unwrap();

        let loaded = service.get_comment(comment.id).unwrap();
        assert!(loaded.author.is_none());
        assert_eq!(loaded.post.as_ref().map(|p| p.id), Some(post.id));
    }
}

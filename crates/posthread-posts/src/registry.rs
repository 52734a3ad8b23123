//! Write operations on users and posts.

use posthread_types::{
    timestamp_now, Page, PageRequest, Post, PostDirectory, StoreError, User, UserDirectory,
};
use uuid::Uuid;

use crate::error::DirectoryError;
use crate::validate::{new_post, new_user};

/// A user backend that also accepts writes.
pub trait UserStore: UserDirectory {
    /// Inserts a user. Returns `false` if the username or email is taken.
    fn insert_user(&self, user: &User) -> Result<bool, StoreError>;
}

/// A post backend that also accepts writes.
pub trait PostStore: PostDirectory {
    fn insert_post(&self, post: &Post) -> Result<(), StoreError>;

    /// Returns the updated post, or `None` if it does not exist.
    fn update_comments_disabled(
        &self,
        id: Uuid,
        disabled: bool,
    ) -> Result<Option<Post>, StoreError>;

    /// Posts newest first, restricted to one author when `author_id` is set.
    /// Posts created at the same instant keep their insertion order reversed.
    fn list_posts(
        &self,
        author_id: Option<Uuid>,
        page: PageRequest,
    ) -> Result<Page<Post>, StoreError>;

    /// Replaces title and content. Returns `None` if the post does not exist.
    fn update_post_content(
        &self,
        id: Uuid,
        title: &str,
        content: &str,
    ) -> Result<Option<Post>, StoreError>;

    /// Returns `false` if the post did not exist.
    fn delete_post(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// Validates and registers a new user.
pub fn register_user(
    users: &dyn UserStore,
    username: &str,
    email: &str,
) -> Result<User, DirectoryError> {
    let user = new_user(username, email)?;
    if !users.insert_user(&user)? {
        tracing::warn!(username = %username, "username or email already registered");
        return Err(DirectoryError::UserExists(username.to_string()));
    }
    tracing::info!(user_id = %user.id, "user registered");
    Ok(user)
}

/// Validates and publishes a new post for an existing author.
pub fn publish_post<U>(
    posts: &dyn PostStore,
    users: &U,
    author_id: Uuid,
    title: &str,
    content: &str,
) -> Result<Post, DirectoryError>
where
    U: UserDirectory + ?Sized,
{
    let post = new_post(author_id, title, content)?;
    if !users.user_exists(author_id)? {
        tracing::warn!(author_id = %author_id, "post author not found");
        return Err(DirectoryError::UserNotFound(author_id));
    }
    posts.insert_post(&post)?;
    tracing::info!(post_id = %post.id, author_id = %author_id, "post published");
    Ok(post)
}

/// Switches comments off (`disabled = true`) or back on for a post.
///
/// Only the post's author may do this.
pub fn set_comments_disabled(
    posts: &dyn PostStore,
    post_id: Uuid,
    requester_id: Uuid,
    disabled: bool,
) -> Result<Post, DirectoryError> {
    require_author(posts, post_id, requester_id, "toggle_comments")?;

    let updated = posts
        .update_comments_disabled(post_id, disabled)?
        .ok_or(DirectoryError::PostNotFound(post_id))?;
    tracing::info!(post_id = %post_id, disabled, "post comment settings updated");
    Ok(updated)
}

/// Lists every post, newest first.
pub fn list_posts(posts: &dyn PostStore, page: PageRequest) -> Result<Page<Post>, DirectoryError> {
    Ok(posts.list_posts(None, page)?)
}

/// Lists one author's posts, newest first.
pub fn list_author_posts<U>(
    posts: &dyn PostStore,
    users: &U,
    author_id: Uuid,
    page: PageRequest,
) -> Result<Page<Post>, DirectoryError>
where
    U: UserDirectory + ?Sized,
{
    if !users.user_exists(author_id)? {
        return Err(DirectoryError::UserNotFound(author_id));
    }
    Ok(posts.list_posts(Some(author_id), page)?)
}

/// Replaces a post's title and content.
///
/// The new fields are validated before the post is looked up. Only the
/// post's author may edit it.
pub fn edit_post(
    posts: &dyn PostStore,
    post_id: Uuid,
    requester_id: Uuid,
    title: &str,
    content: &str,
) -> Result<Post, DirectoryError> {
    new_post(requester_id, title, content)?;
    require_author(posts, post_id, requester_id, "edit")?;

    let updated = posts
        .update_post_content(post_id, title, content)?
        .ok_or(DirectoryError::PostNotFound(post_id))?;
    tracing::info!(post_id = %post_id, "post updated");
    Ok(updated)
}

/// Deletes a post. Only the post's author may do this.
///
/// Comments on the post stay stored but can no longer be listed or added.
pub fn delete_post(
    posts: &dyn PostStore,
    post_id: Uuid,
    requester_id: Uuid,
) -> Result<(), DirectoryError> {
    require_author(posts, post_id, requester_id, "delete")?;

    if !posts.delete_post(post_id)? {
        return Err(DirectoryError::PostNotFound(post_id));
    }
    tracing::info!(post_id = %post_id, "post deleted");
    Ok(())
}

fn require_author(
    posts: &dyn PostStore,
    post_id: Uuid,
    requester_id: Uuid,
    action: &'static str,
) -> Result<(), DirectoryError> {
    let post = posts
        .get_post(post_id)?
        .ok_or(DirectoryError::PostNotFound(post_id))?;
    if post.author_id != requester_id {
        tracing::warn!(
            post_id = %post_id,
            post_author_id = %post.author_id,
            requester_id = %requester_id,
            action,
            "post access denied"
        );
        return Err(DirectoryError::PostAccessDenied(post_id));
    }
    Ok(())
}

/// Stamps `updated_at` on a post whose comment flag changes.
pub(crate) fn with_comments_disabled(mut post: Post, disabled: bool) -> Post {
    post.comments_disabled = disabled;
    post.updated_at = timestamp_now();
    post
}

/// Stamps `updated_at` on a post whose title and content change.
pub(crate) fn with_content(mut post: Post, title: &str, content: &str) -> Post {
    post.title = title.to_string();
    post.content = content.to_string();
    post.updated_at = timestamp_now();
    post
}

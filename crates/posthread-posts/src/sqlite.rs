//! SQLite-backed user and post stores.
//!
//! Each call checks a connection out of the pool for the duration of one
//! statement. Callers on an async runtime must invoke these from
//! `spawn_blocking`.

use posthread_db::columns::{id_placeholders, read_timestamp, read_uuid};
use posthread_db::{DbConnection, DbPool};
use posthread_types::{
    format_timestamp, timestamp_now, Page, PageInfo, PageRequest, Post, PostDirectory,
    StoreError, User, UserDirectory,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use uuid::Uuid;

use crate::registry::{PostStore, UserStore};

const USER_COLUMNS: &str = "id, username, email, created_at, updated_at";
const POST_COLUMNS: &str =
    "id, author_id, title, content, comments_disabled, created_at, updated_at";

fn map_row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: read_uuid(row, 0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        created_at: read_timestamp(row, 3)?,
        updated_at: read_timestamp(row, 4)?,
    })
}

fn map_row_to_post(row: &Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: read_uuid(row, 0)?,
        author_id: read_uuid(row, 1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        comments_disabled: row.get(4)?,
        created_at: read_timestamp(row, 5)?,
        updated_at: read_timestamp(row, 6)?,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(code, _)
            if code.code == rusqlite::ffi::ErrorCode::ConstraintViolation
    )
}

/// Users stored in the `users` table.
#[derive(Clone)]
pub struct SqliteUserStore {
    pool: DbPool,
}

impl SqliteUserStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self, operation: &'static str) -> Result<DbConnection, StoreError> {
        self.pool.get().map_err(|e| StoreError::backend(operation, e))
    }
}

impl UserDirectory for SqliteUserStore {
    fn user_exists(&self, id: Uuid) -> Result<bool, StoreError> {
        let conn = self.conn("user_exists")?;
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
            [id.to_string()],
            |row| row.get(0),
        )
        .map_err(|e| StoreError::backend("user_exists", e))
    }

    fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let conn = self.conn("get_user")?;
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            [id.to_string()],
            map_row_to_user,
        )
        .optional()
        .map_err(|e| StoreError::backend("get_user", e))
    }

    fn get_users_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn("get_users_by_ids")?;
        let (placeholders, values) = id_placeholders(ids);
        let fetch = || -> rusqlite::Result<Vec<User>> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE id IN ({placeholders})"
            ))?;
            let rows = stmt.query_map(params_from_iter(values.iter()), map_row_to_user)?;
            rows.collect()
        };
        fetch().map_err(|e| StoreError::backend("get_users_by_ids", e))
    }
}

impl UserStore for SqliteUserStore {
    fn insert_user(&self, user: &User) -> Result<bool, StoreError> {
        let conn = self.conn("insert_user")?;
        let result = conn.execute(
            "INSERT INTO users (id, username, email, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.id.to_string(),
                user.username,
                user.email,
                format_timestamp(&user.created_at),
                format_timestamp(&user.updated_at),
            ],
        );
        match result {
            Ok(_) => Ok(true),
            Err(e) if is_constraint_violation(&e) => Ok(false),
            Err(e) => Err(StoreError::backend("insert_user", e)),
        }
    }
}

/// Posts stored in the `posts` table.
#[derive(Clone)]
pub struct SqlitePostStore {
    pool: DbPool,
}

impl SqlitePostStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self, operation: &'static str) -> Result<DbConnection, StoreError> {
        self.pool.get().map_err(|e| StoreError::backend(operation, e))
    }
}

impl PostDirectory for SqlitePostStore {
    fn post_exists(&self, id: Uuid) -> Result<bool, StoreError> {
        let conn = self.conn("post_exists")?;
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?1)",
            [id.to_string()],
            |row| row.get(0),
        )
        .map_err(|e| StoreError::backend("post_exists", e))
    }

    fn get_post(&self, id: Uuid) -> Result<Option<Post>, StoreError> {
        let conn = self.conn("get_post")?;
        conn.query_row(
            &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
            [id.to_string()],
            map_row_to_post,
        )
        .optional()
        .map_err(|e| StoreError::backend("get_post", e))
    }

    fn post_comments_enabled(&self, id: Uuid) -> Result<bool, StoreError> {
        let conn = self.conn("post_comments_enabled")?;
        let disabled: Option<bool> = conn
            .query_row(
                "SELECT comments_disabled FROM posts WHERE id = ?1",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::backend("post_comments_enabled", e))?;
        Ok(disabled == Some(false))
    }

    fn get_posts_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Post>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn("get_posts_by_ids")?;
        let (placeholders, values) = id_placeholders(ids);
        let fetch = || -> rusqlite::Result<Vec<Post>> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {POST_COLUMNS} FROM posts WHERE id IN ({placeholders})"
            ))?;
            let rows = stmt.query_map(params_from_iter(values.iter()), map_row_to_post)?;
            rows.collect()
        };
        fetch().map_err(|e| StoreError::backend("get_posts_by_ids", e))
    }
}

impl PostStore for SqlitePostStore {
    fn insert_post(&self, post: &Post) -> Result<(), StoreError> {
        let conn = self.conn("insert_post")?;
        conn.execute(
            "INSERT INTO posts (id, author_id, title, content, comments_disabled, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                post.id.to_string(),
                post.author_id.to_string(),
                post.title,
                post.content,
                post.comments_disabled,
                format_timestamp(&post.created_at),
                format_timestamp(&post.updated_at),
            ],
        )
        .map_err(|e| StoreError::backend("insert_post", e))?;
        Ok(())
    }

    fn update_comments_disabled(
        &self,
        id: Uuid,
        disabled: bool,
    ) -> Result<Option<Post>, StoreError> {
        let conn = self.conn("update_comments_disabled")?;
        conn.query_row(
            &format!(
                "UPDATE posts SET comments_disabled = ?2, updated_at = ?3 WHERE id = ?1
                 RETURNING {POST_COLUMNS}"
            ),
            params![id.to_string(), disabled, format_timestamp(&timestamp_now())],
            map_row_to_post,
        )
        .optional()
        .map_err(|e| StoreError::backend("update_comments_disabled", e))
    }

    fn list_posts(
        &self,
        author_id: Option<Uuid>,
        page: PageRequest,
    ) -> Result<Page<Post>, StoreError> {
        let conn = self.conn("list_posts")?;
        let (filter, filter_args) = match author_id {
            Some(author) => ("WHERE author_id = ?1", vec![Value::Text(author.to_string())]),
            None => ("", Vec::new()),
        };
        let limit_idx = filter_args.len() + 1;
        let offset_idx = filter_args.len() + 2;
        let mut page_args = filter_args.clone();
        page_args.push(Value::Integer(i64::from(page.limit)));
        page_args.push(Value::Integer(
            i64::try_from(page.offset).unwrap_or(i64::MAX),
        ));

        let fetch = || -> rusqlite::Result<Page<Post>> {
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM posts {filter}"),
                params_from_iter(filter_args.iter()),
                |row| row.get(0),
            )?;
            // rowid breaks ties between posts created in the same microsecond.
            let mut stmt = conn.prepare(&format!(
                "SELECT {POST_COLUMNS} FROM posts {filter}
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?{limit_idx} OFFSET ?{offset_idx}"
            ))?;
            let items = stmt
                .query_map(params_from_iter(page_args.iter()), map_row_to_post)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(Page {
                items,
                info: PageInfo::new(u64::try_from(total).unwrap_or(0), page),
            })
        };
        fetch().map_err(|e| StoreError::backend("list_posts", e))
    }

    fn update_post_content(
        &self,
        id: Uuid,
        title: &str,
        content: &str,
    ) -> Result<Option<Post>, StoreError> {
        let conn = self.conn("update_post_content")?;
        conn.query_row(
            &format!(
                "UPDATE posts SET title = ?2, content = ?3, updated_at = ?4 WHERE id = ?1
                 RETURNING {POST_COLUMNS}"
            ),
            params![
                id.to_string(),
                title,
                content,
                format_timestamp(&timestamp_now())
            ],
            map_row_to_post,
        )
        .optional()
        .map_err(|e| StoreError::backend("update_post_content", e))
    }

    fn delete_post(&self, id: Uuid) -> Result<bool, StoreError> {
        let conn = self.conn("delete_post")?;
        let removed = conn
            .execute("DELETE FROM posts WHERE id = ?1", [id.to_string()])
            .map_err(|e| StoreError::backend("delete_post", e))?;
        Ok(removed > 0)
    }
}

//! SQLite-backed comment store.
//!
//! Subtree queries scan the `path` index with a half-open range built by
//! [`prefix_upper_bound`] instead of `LIKE`, so matching stays byte-exact
//! (no `%`/`_` escaping) and index-backed. Ties on `created_at` are broken
//! by `rowid`, which follows insertion order.

use chrono::{DateTime, Utc};
use posthread_db::columns::{id_placeholders, read_optional_uuid, read_timestamp, read_uuid};
use posthread_db::{DbConnection, DbPool};
use posthread_types::{format_timestamp, Page, PageInfo, PageRequest, StoreError};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::comment::Comment;
use crate::store::{prefix_upper_bound, CommentStore};

const COMMENT_COLUMNS: &str =
    "id, post_id, author_id, parent_id, content, path, level, created_at, updated_at";

const ORDER_BY_CREATED: &str = "created_at ASC, rowid ASC";
const ORDER_BY_PATH: &str = "path ASC, created_at ASC, rowid ASC";

fn map_row_to_comment(row: &Row) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: read_uuid(row, 0)?,
        post_id: read_uuid(row, 1)?,
        author_id: read_uuid(row, 2)?,
        parent_id: read_optional_uuid(row, 3)?,
        content: row.get(4)?,
        path: row.get(5)?,
        level: row.get(6)?,
        created_at: read_timestamp(row, 7)?,
        updated_at: read_timestamp(row, 8)?,
        author: None,
        post: None,
        parent: None,
    })
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// A `WHERE` clause with its positional arguments (`?1`, `?2`, ...).
struct Filter {
    sql: String,
    args: Vec<Value>,
}

impl Filter {
    fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }

    /// Matches paths equal to or extending `prefix`.
    fn path_prefix(prefix: &str) -> Self {
        match prefix_upper_bound(prefix) {
            Some(bound) => Self::new(
                "path >= ?1 AND path < ?2",
                vec![Value::Text(prefix.to_string()), Value::Text(bound)],
            ),
            None => Self::new("path >= ?1", vec![Value::Text(prefix.to_string())]),
        }
    }

    fn count(&self, conn: &Connection) -> rusqlite::Result<u64> {
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM comments WHERE {}", self.sql),
            params_from_iter(self.args.iter()),
            |row| row.get(0),
        )?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    fn page(
        &self,
        conn: &Connection,
        order_by: &str,
        request: PageRequest,
    ) -> rusqlite::Result<Page<Comment>> {
        let total = self.count(conn)?;
        let limit_idx = self.args.len() + 1;
        let offset_idx = self.args.len() + 2;

        let mut args = self.args.clone();
        args.push(Value::Integer(i64::from(request.limit)));
        args.push(Value::Integer(saturating_i64(request.offset)));

        let mut stmt = conn.prepare(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE {} ORDER BY {order_by}
             LIMIT ?{limit_idx} OFFSET ?{offset_idx}",
            self.sql
        ))?;
        let items = stmt
            .query_map(params_from_iter(args.iter()), map_row_to_comment)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Page {
            items,
            info: PageInfo::new(total, request),
        })
    }
}

/// Comments stored in the `comments` table.
#[derive(Clone)]
pub struct SqliteCommentStore {
    pool: DbPool,
}

impl SqliteCommentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self, operation: &'static str) -> Result<DbConnection, StoreError> {
        self.pool.get().map_err(|e| StoreError::backend(operation, e))
    }

    /// Runs `f` on a pooled connection, tagging failures with `operation`.
    fn with_conn<T, F>(&self, operation: &'static str, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self.conn(operation)?;
        f(&conn).map_err(|e| StoreError::backend(operation, e))
    }
}

impl CommentStore for SqliteCommentStore {
    fn create(&self, comment: &Comment) -> Result<(), StoreError> {
        self.with_conn("create", |conn| {
            conn.execute(
                "INSERT INTO comments (id, post_id, author_id, parent_id, content, path, level, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    comment.id.to_string(),
                    comment.post_id.to_string(),
                    comment.author_id.to_string(),
                    comment.parent_id.map(|id| id.to_string()),
                    comment.content,
                    comment.path,
                    comment.level,
                    format_timestamp(&comment.created_at),
                    format_timestamp(&comment.updated_at),
                ],
            )?;
            tracing::debug!(comment_id = %comment.id, "comment stored in sqlite");
            Ok(())
        })
    }

    fn get_by_id(&self, id: Uuid) -> Result<Option<Comment>, StoreError> {
        self.with_conn("get_by_id", |conn| {
            conn.query_row(
                &format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?1"),
                [id.to_string()],
                map_row_to_comment,
            )
            .optional()
        })
    }

    fn update_content(
        &self,
        id: Uuid,
        content: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.with_conn("update_content", |conn| {
            let changed = conn.execute(
                "UPDATE comments SET content = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.to_string(), content, format_timestamp(&updated_at)],
            )?;
            Ok(changed > 0)
        })
    }

    fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        self.with_conn("delete", |conn| {
            let changed = conn.execute("DELETE FROM comments WHERE id = ?1", [id.to_string()])?;
            Ok(changed > 0)
        })
    }

    fn exists(&self, id: Uuid) -> Result<bool, StoreError> {
        self.with_conn("exists", |conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM comments WHERE id = ?1)",
                [id.to_string()],
                |row| row.get(0),
            )
        })
    }

    fn list_by_post(&self, post_id: Uuid, page: PageRequest) -> Result<Page<Comment>, StoreError> {
        let filter = Filter::new(
            "post_id = ?1 AND parent_id IS NULL",
            vec![Value::Text(post_id.to_string())],
        );
        self.with_conn("list_by_post", |conn| {
            filter.page(conn, ORDER_BY_CREATED, page)
        })
    }

    fn list_by_parent(
        &self,
        parent_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<Comment>, StoreError> {
        let filter = Filter::new("parent_id = ?1", vec![Value::Text(parent_id.to_string())]);
        self.with_conn("list_by_parent", |conn| {
            filter.page(conn, ORDER_BY_CREATED, page)
        })
    }

    fn count_by_post(&self, post_id: Uuid) -> Result<u64, StoreError> {
        let filter = Filter::new(
            "post_id = ?1 AND parent_id IS NULL",
            vec![Value::Text(post_id.to_string())],
        );
        self.with_conn("count_by_post", |conn| filter.count(conn))
    }

    fn count_by_parent(&self, parent_id: Uuid) -> Result<u64, StoreError> {
        let filter = Filter::new("parent_id = ?1", vec![Value::Text(parent_id.to_string())]);
        self.with_conn("count_by_parent", |conn| filter.count(conn))
    }

    fn get_thread(&self, root_id: Uuid, max_depth: u32) -> Result<Vec<Comment>, StoreError> {
        self.with_conn("get_thread", |conn| {
            let root: Option<(String, u32)> = conn
                .query_row(
                    "SELECT path, level FROM comments WHERE id = ?1",
                    [root_id.to_string()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((root_path, root_level)) = root else {
                return Ok(Vec::new());
            };

            let descendants = format!("{root_path}/");
            // A path ending in '/' always has an upper bound.
            let bound = prefix_upper_bound(&descendants).unwrap_or_default();
            let max_level = i64::from(root_level) + i64::from(max_depth);

            // [root, bound) holds the root, its descendants, and any path that
            // extends the root with a character sorting before '/'. The last
            // group is filtered out by the second clause.
            let mut stmt = conn.prepare(&format!(
                "SELECT {COMMENT_COLUMNS} FROM comments
                 WHERE path >= ?1 AND path < ?3 AND (path = ?1 OR path >= ?2) AND level <= ?4
                 ORDER BY {ORDER_BY_PATH}"
            ))?;
            let rows = stmt.query_map(
                params![root_path, descendants, bound, max_level],
                map_row_to_comment,
            )?;
            rows.collect()
        })
    }

    fn get_by_path(&self, prefix: &str, page: PageRequest) -> Result<Page<Comment>, StoreError> {
        let filter = Filter::path_prefix(prefix);
        self.with_conn("get_by_path", |conn| {
            filter.page(conn, ORDER_BY_PATH, page)
        })
    }

    fn get_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Comment>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let (placeholders, values) = id_placeholders(ids);
        self.with_conn("get_by_ids", |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COMMENT_COLUMNS} FROM comments WHERE id IN ({placeholders})"
            ))?;
            let rows = stmt.query_map(params_from_iter(values.iter()), map_row_to_comment)?;
            rows.collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comment::new_comment;
    use posthread_db::{open_database, DbRuntimeSettings};

    fn store() -> SqliteCommentStore {
        let pool = open_database(":memory:", DbRuntimeSettings::default())
            .expect("in-memory database should open");
        SqliteCommentStore::new(pool)
    }

    #[test]
    fn thread_query_uses_path_index() {
        let store = store();
        let conn = store.conn("plan").unwrap();
        let plan: Vec<String> = conn
            .prepare(
                "EXPLAIN QUERY PLAN SELECT id FROM comments
                 WHERE path >= ?1 AND path < ?3 AND (path = ?1 OR path >= ?2) AND level <= ?4",
            )
            .unwrap()
            .query_map(params!["a", "a/", "a0", 10], |row| row.get::<_, String>(3))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert!(
            plan.iter().any(|line| line.contains("idx_comments_path")),
            "plan was {plan:?}"
        );
    }

    #[test]
    fn like_wildcards_in_prefix_match_literally() {
        let store = store();
        let post = Uuid::new_v4();
        let root = new_comment(post, Uuid::new_v4(), "root", None).unwrap();
        store.create(&root).unwrap();

        let page = store.get_by_path("%", PageRequest::default()).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.info.total, 0);
    }

    #[test]
    fn equal_timestamps_fall_back_to_insertion_order() {
        let store = store();
        let post = Uuid::new_v4();
        let first = new_comment(post, Uuid::new_v4(), "first", None).unwrap();
        let mut second = new_comment(post, Uuid::new_v4(), "second", None).unwrap();
        second.created_at = first.created_at;
        store.create(&first).unwrap();
        store.create(&second).unwrap();

        let ids: Vec<Uuid> = store
            .list_by_post(post, PageRequest::default())
            .unwrap()
            .items
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }
}

//! Typed column readers shared by the SQLite-backed stores.
//!
//! UUIDs and timestamps are stored as TEXT. A value that fails to parse is
//! reported as `FromSqlConversionFailure` so it surfaces as a storage error
//! rather than a panic.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use uuid::Uuid;

/// Reads a non-null UUID column.
pub fn read_uuid(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Reads a nullable UUID column.
pub fn read_optional_uuid(row: &Row, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        Uuid::parse_str(&s)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// Reads a timestamp column written with `posthread_types::format_timestamp`.
pub fn read_timestamp(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    posthread_types::parse_timestamp(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Renders IDs for an `IN (...)` clause as positional placeholders.
///
/// Returns the placeholder list (`?1, ?2, ...`) and the bound values.
pub fn id_placeholders(ids: &[Uuid]) -> (String, Vec<String>) {
    let placeholders = (1..=ids.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let values = ids.iter().map(Uuid::to_string).collect();
    (placeholders, values)
}

//! Database layer for posthread.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! embedded SQL migrations, and a one-call bootstrap used by the server and
//! by tests.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: no external database process. WAL allows
//!   concurrent readers alongside a single writer, which matches a comment
//!   service where reads dominate.
//! - **`r2d2` connection pool**: bounded connection reuse without manual
//!   lifetime management.
//! - **Embedded migrations**: SQL files are compiled into the binary via
//!   `include_str!` so the schema ships with the code that queries it.

pub mod columns;
mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, open_database, DbConnection, DbPool, DbRuntimeSettings, PoolError};

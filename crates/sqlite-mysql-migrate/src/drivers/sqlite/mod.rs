//! SQLite source driver.
//!
//! - [`SqliteDialect`]: SQL syntax strategy
//! - [`SqliteReader`]: [`SchemaSource`](crate::core::traits::SchemaSource)
//!   over sqlx
//!
//! The database file is opened read-only; the source is never modified.

mod dialect;
mod reader;

pub use dialect::SqliteDialect;
pub use reader::SqliteReader;

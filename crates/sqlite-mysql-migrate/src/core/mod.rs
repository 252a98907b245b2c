//! Core abstractions shared by every pipeline stage.
//!
//! - [`schema`]: Table, column, and constraint metadata types
//! - [`value`]: SQL value representation
//! - [`traits`]: Source and target engine boundaries
//! - [`identifier`]: Identifier validation

pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

pub use schema::{Column, ForeignKey, Index, ReferentialAction, Table, TargetColumn};
pub use traits::{Dialect, ReadOptions, SchemaSource, SourceTable, TargetExecutor};
pub use value::{Row, SqlValue, ValueShape};

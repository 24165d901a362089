//! wf-db - Warehouse gateway for Wharf
//!
//! This crate provides the `Warehouse` trait every operator talks to and a
//! DuckDB implementation backed by a small connection pool.

pub mod duckdb;
pub mod error;
pub mod traits;

pub use duckdb::DuckDbBackend;
pub use error::{DbError, DbResult};
pub use traits::{BulkLoad, Row, Value, Warehouse};

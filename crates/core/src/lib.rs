//! Version-graph model for code generation sessions.
//!
//! Holds the commit/variant data model, the in-memory [`store::VersionGraph`]
//! with its head pointer, lineage extraction, and the per-variant execution
//! log. Nothing in this crate performs I/O.

pub mod commit;
pub mod error;
pub mod execution_log;
pub mod history;
pub mod store;
pub mod types;

//! Infrastructure layer
//!
//! Implementations backed by external systems, currently SQLite.

pub mod security;

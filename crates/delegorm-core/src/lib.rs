//! Core types and traits for delegorm.
//!
//! This crate provides the foundations the write pipeline is built on:
//!
//! - `Model` trait for ORM-style struct mapping
//! - `FieldInfo` column metadata, including delegation flags
//! - `IgnoreDelegated` call-scoped overrides
//! - `Connection` trait with dialect and capability reporting
//! - `Outcome` and `Cx` re-exports from asupersync for cancel-correct operations

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod connection;
pub mod delegation;
pub mod error;
pub mod field;
pub mod model;
pub mod row;
pub mod value;

pub use connection::{Capabilities, Connection, Dialect};
pub use delegation::{Delegation, IgnoreDelegated, WriteKind};
pub use error::{
    ConfigError, ConnectionError, ConnectionErrorKind, Error, NotSupportedError, QueryError,
    QueryErrorKind, Result, TypeError, Unsupported,
};
pub use field::FieldInfo;
pub use model::Model;
pub use row::{ColumnInfo, FromValue, Row};
pub use value::Value;

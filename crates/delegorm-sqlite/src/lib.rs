//! SQLite driver for delegorm.
//!
// FFI bindings require unsafe code - this is expected for database drivers
#![allow(unsafe_code)]
//!
//! Implements the `Connection` trait from delegorm-core on top of the
//! bundled libsqlite3. SQLite 3.35.0 and later understand
//! `INSERT/UPDATE ... RETURNING`; the connection reports this through
//! [`Capabilities`](delegorm_core::Capabilities) so writes of delegated
//! fields fail cleanly on older libraries.
//!
//! # Example
//!
//! ```rust,ignore
//! use delegorm_sqlite::SqliteConnection;
//! use delegorm_core::{Connection, Value, Cx, Outcome};
//!
//! let conn = SqliteConnection::open_memory()?;
//! conn.execute_raw("CREATE TABLE items (id INTEGER PRIMARY KEY, num INTEGER DEFAULT 1)")?;
//!
//! let cx = Cx::for_testing();
//! let row = conn
//!     .query_one(&cx, "INSERT INTO items DEFAULT VALUES RETURNING id, num", &[])
//!     .await;
//! ```
//!
//! # Type Mapping
//!
//! | Rust Type | SQLite Type |
//! |-----------|-------------|
//! | `bool` | INTEGER (0/1) |
//! | `i8`, `i16`, `i32`, `i64` | INTEGER |
//! | `f32`, `f64` | REAL |
//! | `String` | TEXT |
//! | `Vec<u8>` | BLOB |
//! | `serde_json::Value` | TEXT |
//! | `Option<T>` | NULL or T |

pub mod connection;
pub mod ffi;
pub mod types;

pub use connection::{OpenFlags, SqliteConfig, SqliteConnection};

/// The linked SQLite library version.
pub fn sqlite_version() -> &'static str {
    ffi::version()
}

/// The linked SQLite library version number.
pub fn sqlite_version_number() -> i32 {
    ffi::version_number()
}

/// Whether the linked SQLite understands `RETURNING`.
pub fn supports_returning() -> bool {
    sqlite_version_number() >= ffi::RETURNING_MIN_VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_version() {
        let version = sqlite_version();
        assert!(
            version.starts_with('3'),
            "Expected SQLite 3.x, got {}",
            version
        );
        assert!(supports_returning());
    }
}

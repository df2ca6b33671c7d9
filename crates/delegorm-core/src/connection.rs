//! Database connection traits.
//!
//! - [`Connection`] - Main trait for executing statements
//! - [`Dialect`] - SQL flavour the connection speaks
//! - [`Capabilities`] - write features the backend supports
//!
//! All operations integrate with asupersync's structured concurrency via `Cx` context
//! for proper cancellation and timeout handling.

use crate::row::Row;
use crate::value::Value;
use asupersync::{Cx, Outcome};

/// SQL dialect for generating dialect-specific SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// PostgreSQL dialect (uses $1, $2 placeholders)
    #[default]
    Postgres,
    /// SQLite dialect (uses ?1, ?2 placeholders)
    Sqlite,
    /// MySQL dialect (uses ? placeholders)
    Mysql,
}

impl Dialect {
    /// Generate a placeholder for the given parameter index (1-based).
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Sqlite => format!("?{index}"),
            Dialect::Mysql => "?".to_string(),
        }
    }

    /// Quote an identifier for this dialect.
    ///
    /// Embedded quote characters are doubled.
    pub fn quote_identifier(self, name: &str) -> String {
        match self {
            Dialect::Postgres | Dialect::Sqlite => {
                let escaped = name.replace('"', "\"\"");
                format!("\"{}\"", escaped)
            }
            Dialect::Mysql => {
                let escaped = name.replace('`', "``");
                format!("`{}`", escaped)
            }
        }
    }

    /// The INSERT tail used when no column is sent.
    pub const fn empty_insert_sql(self) -> &'static str {
        match self {
            Dialect::Postgres | Dialect::Sqlite => "DEFAULT VALUES",
            Dialect::Mysql => "() VALUES ()",
        }
    }
}

/// Write features a backend supports.
///
/// Checked before a write that needs them; a missing feature is reported
/// as [`crate::Error::NotSupported`] without touching the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// `INSERT/UPDATE ... RETURNING <columns>`
    pub returning: bool,
    /// An INSERT that sends no column at all
    pub empty_insert: bool,
}

impl Capabilities {
    /// The usual capabilities of a dialect's current server versions.
    pub const fn for_dialect(dialect: Dialect) -> Self {
        match dialect {
            Dialect::Postgres | Dialect::Sqlite => Self {
                returning: true,
                empty_insert: true,
            },
            Dialect::Mysql => Self {
                returning: false,
                empty_insert: true,
            },
        }
    }

    pub const fn returning(mut self, value: bool) -> Self {
        self.returning = value;
        self
    }

    pub const fn empty_insert(mut self, value: bool) -> Self {
        self.empty_insert = value;
        self
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::for_dialect(Dialect::default())
    }
}

/// A database connection capable of executing statements.
///
/// All operations are async and take a `Cx` context for cancellation/timeout support.
/// Implementations must be `Send + Sync` for use across async boundaries.
///
/// # Example
///
/// ```rust,ignore
/// let rows = conn.query(&cx, "SELECT * FROM heroes WHERE id = $1", &[Value::Int(1)]).await;
/// let row = conn
///     .query_one(&cx, "INSERT INTO heroes (name) VALUES ($1) RETURNING id", &[name])
///     .await;
/// ```
pub trait Connection: Send + Sync {
    /// Execute a query and return all rows.
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, crate::Error>> + Send;

    /// Execute a query and return the first row, if any.
    fn query_one(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Option<Row>, crate::Error>> + Send;

    /// Execute a statement (INSERT, UPDATE, DELETE) and return rows affected.
    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, crate::Error>> + Send;

    /// Execute an INSERT and return the last inserted ID.
    fn insert(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<i64, crate::Error>> + Send;

    /// The SQL dialect statements must be rendered in.
    fn dialect(&self) -> Dialect;

    /// Write features this backend supports.
    fn capabilities(&self) -> Capabilities {
        Capabilities::for_dialect(self.dialect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(Dialect::Postgres.placeholder(3), "$3");
        assert_eq!(Dialect::Sqlite.placeholder(3), "?3");
        assert_eq!(Dialect::Mysql.placeholder(3), "?");
    }

    #[test]
    fn test_quote_identifier_escapes() {
        assert_eq!(Dialect::Sqlite.quote_identifier("num_a"), "\"num_a\"");
        assert_eq!(Dialect::Postgres.quote_identifier("a\"b"), "\"a\"\"b\"");
        assert_eq!(Dialect::Mysql.quote_identifier("a`b"), "`a``b`");
    }

    #[test]
    fn test_capabilities_per_dialect() {
        assert!(Capabilities::for_dialect(Dialect::Postgres).returning);
        assert!(Capabilities::for_dialect(Dialect::Sqlite).returning);
        assert!(!Capabilities::for_dialect(Dialect::Mysql).returning);
        assert_eq!(Dialect::Mysql.empty_insert_sql(), "() VALUES ()");

        let caps = Capabilities::default().returning(false).empty_insert(false);
        assert!(!caps.returning);
        assert!(!caps.empty_insert);
    }
}

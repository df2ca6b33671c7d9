//! Error types for delegorm operations.

use std::fmt;

/// The primary error type for all delegorm operations.
#[derive(Debug)]
pub enum Error {
    /// Connection-related errors (open, lost handle)
    Connection(ConnectionError),
    /// Query execution errors reported by the database
    Query(QueryError),
    /// Type conversion errors
    Type(TypeError),
    /// Configuration errors
    Config(ConfigError),
    /// The backend cannot express the requested write
    NotSupported(NotSupportedError),
    /// I/O errors
    Io(std::io::Error),
    /// Operation was cancelled via asupersync
    Cancelled,
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to open the database
    Connect,
    /// Connection handle unusable (closed or poisoned lock)
    Disconnected,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    pub sqlstate: Option<String>,
    pub message: String,
    pub detail: Option<String>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax error in SQL
    Syntax,
    /// Constraint violation (unique, not null, check, ...)
    Constraint,
    /// Table, column or row not found
    NotFound,
    /// Other database error
    Database,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
    pub rust_type: Option<&'static str>,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

/// A write the connected backend cannot perform.
///
/// Raised before any SQL is sent. It is never retried and never downgraded
/// to a write without the missing feature.
#[derive(Debug)]
pub struct NotSupportedError {
    pub feature: Unsupported,
    pub table: Option<&'static str>,
    pub message: String,
}

/// The missing backend feature behind a [`NotSupportedError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unsupported {
    /// `INSERT/UPDATE ... RETURNING`
    Returning,
    /// An INSERT with no column list
    EmptyInsert,
    /// An UPDATE with nothing in its SET list
    EmptyUpdate,
}

impl Unsupported {
    pub const fn as_str(self) -> &'static str {
        match self {
            Unsupported::Returning => "RETURNING",
            Unsupported::EmptyInsert => "empty INSERT",
            Unsupported::EmptyUpdate => "empty UPDATE",
        }
    }
}

impl NotSupportedError {
    pub fn new(feature: Unsupported, table: &'static str, message: impl Into<String>) -> Self {
        Self {
            feature,
            table: Some(table),
            message: message.into(),
        }
    }
}

impl Error {
    /// Is this a connection error that likely requires reconnection?
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::Io(_))
    }

    /// Is this a [`Error::NotSupported`] error?
    pub fn is_not_supported(&self) -> bool {
        matches!(self, Error::NotSupported(_))
    }

    /// Get SQLSTATE if available (e.g., "23505" for unique violation)
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sqlstate.as_deref(),
            _ => None,
        }
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }
}

impl QueryError {
    /// Shorthand for an error raised by the ORM rather than the database.
    pub fn new(kind: QueryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            sql: None,
            sqlstate: None,
            message: message.into(),
            detail: None,
            source: None,
        }
    }

    /// Attach the statement that failed.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    /// Is this a unique constraint violation?
    pub fn is_unique_violation(&self) -> bool {
        self.sqlstate.as_deref() == Some("23505")
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Query(e) => {
                if let Some(sqlstate) = &e.sqlstate {
                    write!(f, "Query error (SQLSTATE {}): {}", sqlstate, e.message)
                } else {
                    write!(f, "Query error: {}", e.message)
                }
            }
            Error::Type(e) => {
                if let Some(col) = &e.column {
                    write!(
                        f,
                        "Type error in column '{}': expected {}, found {}",
                        col, e.expected, e.actual
                    )
                } else {
                    write!(f, "Type error: expected {}, found {}", e.expected, e.actual)
                }
            }
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::NotSupported(e) => write!(f, "Not supported: {}", e),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Cancelled => write!(f, "Operation cancelled"),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sqlstate) = &self.sqlstate {
            write!(f, "{} (SQLSTATE {})", self.message, sqlstate)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for NotSupportedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.table {
            Some(table) => write!(
                f,
                "{} on table '{}': {}",
                self.feature.as_str(),
                table,
                self.message
            ),
            None => write!(f, "{}: {}", self.feature.as_str(), self.message),
        }
    }
}

impl std::error::Error for NotSupportedError {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<NotSupportedError> for Error {
    fn from(err: NotSupportedError) -> Self {
        Error::NotSupported(err)
    }
}

/// Result type alias for delegorm operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlstate_helpers() {
        let query = QueryError {
            kind: QueryErrorKind::Constraint,
            sql: Some("INSERT INTO t DEFAULT VALUES".to_string()),
            sqlstate: Some("23505".to_string()),
            message: "unique violation".to_string(),
            detail: None,
            source: None,
        };

        assert!(query.is_unique_violation());

        let err = Error::Query(query);
        assert_eq!(err.sqlstate(), Some("23505"));
        assert_eq!(err.sql(), Some("INSERT INTO t DEFAULT VALUES"));
        assert!(!err.is_not_supported());
    }

    #[test]
    fn not_supported_is_distinct_and_names_the_table() {
        let err: Error = NotSupportedError::new(
            Unsupported::Returning,
            "only_delegated",
            "backend cannot return computed columns",
        )
        .into();

        assert!(err.is_not_supported());
        assert!(!err.is_connection_error());
        assert_eq!(
            err.to_string(),
            "Not supported: RETURNING on table 'only_delegated': backend cannot return computed columns"
        );
    }

    #[test]
    fn query_error_builder_keeps_sql() {
        let err = QueryError::new(QueryErrorKind::NotFound, "no row").with_sql("UPDATE t SET a = 1");
        assert_eq!(err.kind, QueryErrorKind::NotFound);
        assert_eq!(err.sql.as_deref(), Some("UPDATE t SET a = 1"));
        assert_eq!(Error::from(err).to_string(), "Query error: no row");
    }
}

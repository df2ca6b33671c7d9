//! SQLite connection implementation.
//!
//! Safe wrappers around SQLite's C API, implementing the `Connection` trait
//! from delegorm-core. `INSERT/UPDATE ... RETURNING` statements run through
//! [`Connection::query`] like any SELECT.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::result_large_err)]
#![allow(clippy::borrow_as_ptr)]

use crate::ffi;
use crate::types;
use delegorm_core::{
    Capabilities, ConfigError, Connection, ConnectionError, ConnectionErrorKind, Cx, Dialect, Error,
    Outcome, QueryError, QueryErrorKind, Row, Value, row::ColumnInfo,
};
use std::ffi::{CStr, CString, c_int};
use std::future::Future;
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard};

/// Configuration for opening SQLite connections.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Database path, or `:memory:`
    pub path: String,
    pub flags: OpenFlags,
    /// Milliseconds to wait on a locked database; 0 disables waiting
    pub busy_timeout_ms: u32,
}

/// Flags for `sqlite3_open_v2`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenFlags {
    pub read_only: bool,
    pub read_write: bool,
    pub create: bool,
    /// Interpret the path as a URI
    pub uri: bool,
    pub no_mutex: bool,
    pub full_mutex: bool,
}

impl OpenFlags {
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    pub fn read_write() -> Self {
        Self {
            read_write: true,
            ..Default::default()
        }
    }

    /// Read-write, creating the database if missing.
    pub fn create_read_write() -> Self {
        Self {
            read_write: true,
            create: true,
            ..Default::default()
        }
    }

    fn to_sqlite_flags(self) -> c_int {
        let mut flags = 0;
        for (set, flag) in [
            (self.read_only, ffi::SQLITE_OPEN_READONLY),
            (self.read_write, ffi::SQLITE_OPEN_READWRITE),
            (self.create, ffi::SQLITE_OPEN_CREATE),
            (self.uri, ffi::SQLITE_OPEN_URI),
            (self.no_mutex, ffi::SQLITE_OPEN_NOMUTEX),
            (self.full_mutex, ffi::SQLITE_OPEN_FULLMUTEX),
        ] {
            if set {
                flags |= flag;
            }
        }

        // Default to read-write if no mode specified
        if flags & (ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_READWRITE) == 0 {
            flags |= ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE;
        }

        flags
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            flags: OpenFlags::create_read_write(),
            busy_timeout_ms: 5000,
        }
    }
}

impl SqliteConfig {
    /// Config for a file-based database.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Config for an in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }
}

struct SqliteInner {
    db: *mut ffi::sqlite3,
}

// SAFETY: the handle is only used while holding the Mutex in SqliteConnection
unsafe impl Send for SqliteInner {}

/// A connection to a SQLite database.
///
/// The handle sits behind a `Mutex`, so one connection can be shared
/// across tasks. A poisoned lock surfaces as a connection error.
pub struct SqliteConnection {
    inner: Mutex<SqliteInner>,
    path: String,
    capabilities: Capabilities,
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.path)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

fn syntax_error(sql: &str, message: &str) -> Error {
    Error::Query(QueryError::new(QueryErrorKind::Syntax, message).with_sql(sql))
}

impl SqliteConnection {
    /// Open a new SQLite connection with the given configuration.
    pub fn open(config: &SqliteConfig) -> Result<Self, Error> {
        let c_path = CString::new(config.path.as_str()).map_err(|e| {
            Error::Config(ConfigError {
                message: "Invalid path: contains null byte".to_string(),
                source: Some(Box::new(e)),
            })
        })?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        let flags = config.flags.to_sqlite_flags();

        // SAFETY: valid pointers; the return code is checked
        let rc = unsafe { ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, ptr::null()) };

        if rc != ffi::SQLITE_OK {
            let msg = if db.is_null() {
                ffi::error_string(rc).to_string()
            } else {
                // SAFETY: db is a handle sqlite3_open_v2 allocated; closed right after
                unsafe {
                    let msg = CStr::from_ptr(ffi::sqlite3_errmsg(db))
                        .to_string_lossy()
                        .into_owned();
                    ffi::sqlite3_close(db);
                    msg
                }
            };

            return Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Connect,
                message: format!("Failed to open database: {}", msg),
                source: None,
            }));
        }

        if config.busy_timeout_ms > 0 {
            let ms = c_int::try_from(config.busy_timeout_ms).unwrap_or(c_int::MAX);
            // SAFETY: db is valid
            unsafe {
                ffi::sqlite3_busy_timeout(db, ms);
            }
        }

        let capabilities = Self::detect_capabilities();
        tracing::debug!(
            path = %config.path,
            sqlite_version = ffi::version(),
            returning = capabilities.returning,
            "opened SQLite database"
        );

        Ok(Self {
            inner: Mutex::new(SqliteInner { db }),
            path: config.path.clone(),
            capabilities,
        })
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, Error> {
        Self::open(&SqliteConfig::memory())
    }

    /// Open a file-based database.
    pub fn open_file(path: impl Into<String>) -> Result<Self, Error> {
        Self::open(&SqliteConfig::file(path))
    }

    fn detect_capabilities() -> Capabilities {
        Capabilities::for_dialect(Dialect::Sqlite)
            .returning(ffi::version_number() >= ffi::RETURNING_MIN_VERSION)
    }

    /// Replace the detected capabilities.
    ///
    /// Lets callers exercise the no-`RETURNING` path on a modern SQLite.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, SqliteInner>, Error> {
        self.inner.lock().map_err(|_| {
            Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Disconnected,
                message: "SQLite connection lock poisoned".to_string(),
                source: None,
            })
        })
    }

    /// Execute SQL directly without preparing (DDL, multiple statements).
    pub fn execute_raw(&self, sql: &str) -> Result<(), Error> {
        let inner = self.lock()?;
        let c_sql = CString::new(sql).map_err(|_| syntax_error(sql, "SQL contains null byte"))?;

        let mut errmsg: *mut std::ffi::c_char = ptr::null_mut();

        // SAFETY: all pointers are valid
        let rc = unsafe {
            ffi::sqlite3_exec(inner.db, c_sql.as_ptr(), None, ptr::null_mut(), &mut errmsg)
        };

        if rc != ffi::SQLITE_OK {
            let msg = if errmsg.is_null() {
                ffi::error_string(rc).to_string()
            } else {
                // SAFETY: errmsg was allocated by sqlite3_exec and is freed once
                unsafe {
                    let msg = CStr::from_ptr(errmsg).to_string_lossy().into_owned();
                    ffi::sqlite3_free(errmsg.cast());
                    msg
                }
            };
            return Err(Error::Query(
                QueryError::new(error_code_to_kind(rc), msg).with_sql(sql),
            ));
        }

        Ok(())
    }

    /// The rowid of the most recent successful INSERT.
    pub fn last_insert_rowid(&self) -> Result<i64, Error> {
        let inner = self.lock()?;
        // SAFETY: db is valid
        Ok(unsafe { ffi::sqlite3_last_insert_rowid(inner.db) })
    }

    /// Rows changed by the most recent statement.
    pub fn changes(&self) -> Result<u64, Error> {
        let inner = self.lock()?;
        // SAFETY: db is valid
        Ok(unsafe { ffi::sqlite3_changes(inner.db) } as u64)
    }

    fn query_sync(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, Error> {
        tracing::trace!(sql = %sql, params = params.len(), "sqlite query");
        let inner = self.lock()?;
        let stmt = Statement::prepare(inner.db, sql)?;
        stmt.bind_all(params)?;

        // SAFETY: stmt is valid
        let col_count = unsafe { ffi::sqlite3_column_count(stmt.raw) };
        let col_names: Vec<String> = (0..col_count)
            // SAFETY: stmt is valid and i < col_count
            .map(|i| unsafe { types::column_name(stmt.raw, i) }.unwrap_or_else(|| format!("col{i}")))
            .collect();
        let columns = Arc::new(ColumnInfo::new(col_names));

        let mut rows = Vec::new();
        loop {
            // SAFETY: stmt is valid
            match unsafe { ffi::sqlite3_step(stmt.raw) } {
                ffi::SQLITE_ROW => {
                    let values = (0..col_count)
                        // SAFETY: the last step returned SQLITE_ROW
                        .map(|i| unsafe { types::read_column(stmt.raw, i) })
                        .collect();
                    rows.push(Row::with_columns(Arc::clone(&columns), values));
                }
                ffi::SQLITE_DONE => break,
                _ => return Err(stmt.error()),
            }
        }

        Ok(rows)
    }

    fn execute_sync(&self, sql: &str, params: &[Value]) -> Result<u64, Error> {
        tracing::trace!(sql = %sql, params = params.len(), "sqlite execute");
        let inner = self.lock()?;
        let stmt = Statement::prepare(inner.db, sql)?;
        stmt.bind_all(params)?;

        // SAFETY: stmt is valid
        match unsafe { ffi::sqlite3_step(stmt.raw) } {
            ffi::SQLITE_DONE | ffi::SQLITE_ROW => {
                // SAFETY: db is valid
                Ok(unsafe { ffi::sqlite3_changes(inner.db) } as u64)
            }
            _ => Err(stmt.error()),
        }
    }

    fn insert_sync(&self, sql: &str, params: &[Value]) -> Result<i64, Error> {
        tracing::trace!(sql = %sql, params = params.len(), "sqlite insert");
        let inner = self.lock()?;
        let stmt = Statement::prepare(inner.db, sql)?;
        stmt.bind_all(params)?;

        // SAFETY: stmt is valid
        match unsafe { ffi::sqlite3_step(stmt.raw) } {
            // SAFETY: db is valid; read under the same lock as the step
            ffi::SQLITE_DONE | ffi::SQLITE_ROW => Ok(unsafe { ffi::sqlite3_last_insert_rowid(inner.db) }),
            _ => Err(stmt.error()),
        }
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        let inner = match self.inner.get_mut() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !inner.db.is_null() {
            // SAFETY: db is valid and no statement outlives the lock
            unsafe {
                ffi::sqlite3_close_v2(inner.db);
            }
            inner.db = ptr::null_mut();
        }
    }
}

/// A prepared statement, finalized on drop.
struct Statement {
    db: *mut ffi::sqlite3,
    raw: *mut ffi::sqlite3_stmt,
    sql: String,
}

impl Statement {
    fn prepare(db: *mut ffi::sqlite3, sql: &str) -> Result<Self, Error> {
        let c_sql = CString::new(sql).map_err(|_| syntax_error(sql, "SQL contains null byte"))?;
        let mut raw: *mut ffi::sqlite3_stmt = ptr::null_mut();

        // SAFETY: all pointers are valid
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(
                db,
                c_sql.as_ptr(),
                c_sql.as_bytes().len() as c_int,
                &mut raw,
                ptr::null_mut(),
            )
        };

        let stmt = Self {
            db,
            raw,
            sql: sql.to_string(),
        };
        if rc != ffi::SQLITE_OK {
            return Err(stmt.error());
        }
        if raw.is_null() {
            return Err(syntax_error(sql, "SQL contains no statement"));
        }
        Ok(stmt)
    }

    fn bind_all(&self, params: &[Value]) -> Result<(), Error> {
        for (i, param) in params.iter().enumerate() {
            // SAFETY: raw is a valid statement; the index is 1-based
            let rc = unsafe { types::bind_value(self.raw, (i + 1) as c_int, param) };
            if rc != ffi::SQLITE_OK {
                let (_, msg) = self.last_error();
                return Err(Error::Query(
                    QueryError::new(
                        QueryErrorKind::Database,
                        format!("Failed to bind parameter {}: {}", i + 1, msg),
                    )
                    .with_sql(self.sql.clone()),
                ));
            }
        }
        Ok(())
    }

    fn last_error(&self) -> (c_int, String) {
        // SAFETY: db is valid; errmsg points to a string owned by SQLite
        unsafe {
            (
                ffi::sqlite3_errcode(self.db),
                CStr::from_ptr(ffi::sqlite3_errmsg(self.db))
                    .to_string_lossy()
                    .into_owned(),
            )
        }
    }

    /// The connection's current error, tagged with this statement's SQL.
    fn error(&self) -> Error {
        let (code, msg) = self.last_error();
        Error::Query(QueryError::new(error_code_to_kind(code), msg).with_sql(self.sql.clone()))
    }
}

impl Drop for Statement {
    fn drop(&mut self) {
        if !self.raw.is_null() {
            // SAFETY: raw came from sqlite3_prepare_v2 and is finalized once
            unsafe {
                ffi::sqlite3_finalize(self.raw);
            }
        }
    }
}

fn error_code_to_kind(code: c_int) -> QueryErrorKind {
    match code & 0xff {
        ffi::SQLITE_CONSTRAINT => QueryErrorKind::Constraint,
        ffi::SQLITE_NOTFOUND => QueryErrorKind::NotFound,
        _ => QueryErrorKind::Database,
    }
}

impl Connection for SqliteConnection {
    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let result = self.query_sync(sql, params);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn query_one(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send {
        let result = self
            .query_sync(sql, params)
            .map(|rows| rows.into_iter().next());
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn execute(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let result = self.execute_sync(sql, params);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn insert(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<i64, Error>> + Send {
        let result = self.insert_sync(sql, params);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_with_items() -> SqliteConnection {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw(
            "CREATE TABLE items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT,
                num INTEGER NOT NULL DEFAULT 0,
                created TEXT DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_open_memory() {
        let conn = SqliteConnection::open_memory().unwrap();
        assert_eq!(conn.path(), ":memory:");
        assert_eq!(conn.dialect(), Dialect::Sqlite);
        assert!(conn.capabilities().returning);
        assert!(conn.capabilities().empty_insert);
    }

    #[test]
    fn test_execute_raw() {
        let conn = memory_with_items();
        conn.execute_raw("INSERT INTO items (name) VALUES ('Alice')")
            .unwrap();
        assert_eq!(conn.changes().unwrap(), 1);
        assert_eq!(conn.last_insert_rowid().unwrap(), 1);

        let err = conn.execute_raw("INSERT INTO nowhere VALUES (1)").unwrap_err();
        assert!(err.to_string().contains("nowhere"));
    }

    #[test]
    fn test_parameterized_query() {
        let conn = memory_with_items();
        conn.execute_sync(
            "INSERT INTO items (name, num) VALUES (?1, ?2)",
            &[Value::Text("Alice".to_string()), Value::Int(30)],
        )
        .unwrap();

        let rows = conn
            .query_sync(
                "SELECT * FROM items WHERE name = ?1",
                &[Value::Text("Alice".to_string())],
            )
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_named::<String>("name").unwrap(), "Alice");
        assert_eq!(rows[0].get_named::<i32>("num").unwrap(), 30);
    }

    #[test]
    fn test_returning_reports_database_defaults() {
        let conn = memory_with_items();
        let rows = conn
            .query_sync(
                "INSERT INTO \"items\" (\"name\") VALUES (?1) RETURNING \"id\", \"num\", \"created\"",
                &[Value::Text("Bob".to_string())],
            )
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_named::<i64>("id").unwrap(), 1);
        assert_eq!(rows[0].get_named::<i64>("num").unwrap(), 0);
        assert!(rows[0].get_named::<Option<String>>("created").unwrap().is_some());

        let rows = conn
            .query_sync(
                "UPDATE \"items\" SET \"num\" = \"num\" + ?1 WHERE \"id\" = ?2 RETURNING \"num\"",
                &[Value::BigInt(5), Value::BigInt(1)],
            )
            .unwrap();
        assert_eq!(rows[0].get_named::<i64>("num").unwrap(), 5);
    }

    #[test]
    fn test_empty_insert_uses_defaults() {
        let conn = memory_with_items();
        let id = conn.insert_sync("INSERT INTO \"items\" DEFAULT VALUES", &[]).unwrap();
        assert_eq!(id, 1);
        let rows = conn.query_sync("SELECT name FROM items", &[]).unwrap();
        assert_eq!(rows[0].get_named::<Option<String>>("name").unwrap(), None);
    }

    #[test]
    fn test_null_and_json_values() {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw("CREATE TABLE docs (body TEXT, note TEXT)").unwrap();
        conn.execute_sync(
            "INSERT INTO docs VALUES (?1, ?2)",
            &[Value::Json(serde_json::json!({"a": 1})), Value::Null],
        )
        .unwrap();

        let rows = conn.query_sync("SELECT * FROM docs", &[]).unwrap();
        assert_eq!(
            rows[0].get_named::<serde_json::Value>("body").unwrap(),
            serde_json::json!({"a": 1})
        );
        assert_eq!(rows[0].get_named::<Option<String>>("note").unwrap(), None);
    }

    #[test]
    fn test_constraint_errors_are_classified() {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw("CREATE TABLE u (name TEXT UNIQUE)").unwrap();
        conn.execute_sync("INSERT INTO u VALUES (?1)", &[Value::from("x")])
            .unwrap();

        let err = conn
            .execute_sync("INSERT INTO u VALUES (?1)", &[Value::from("x")])
            .unwrap_err();
        match err {
            Error::Query(q) => {
                assert_eq!(q.kind, QueryErrorKind::Constraint);
                assert_eq!(q.sql.as_deref(), Some("INSERT INTO u VALUES (?1)"));
            }
            other => panic!("expected a query error, got {other:?}"),
        }
    }

    #[test]
    fn test_bind_error_names_parameter() {
        let conn = memory_with_items();
        let err = conn
            .query_sync("SELECT * FROM items WHERE id = ?1", &[Value::Int(1), Value::Int(2)])
            .unwrap_err();
        assert!(err.to_string().contains("parameter 2"));
    }

    #[test]
    fn test_capability_override() {
        let conn = SqliteConnection::open_memory()
            .unwrap()
            .with_capabilities(Capabilities::for_dialect(Dialect::Sqlite).returning(false));
        assert!(!conn.capabilities().returning);
    }

    #[test]
    fn test_open_flags() {
        let tmp = std::env::temp_dir().join(format!("delegorm_flags_{}.db", std::process::id()));
        let _ = std::fs::remove_file(&tmp);

        let config = SqliteConfig::file(tmp.to_string_lossy().to_string())
            .flags(OpenFlags::create_read_write())
            .busy_timeout(100);
        let conn = SqliteConnection::open(&config).unwrap();
        conn.execute_raw("CREATE TABLE test (id INTEGER)").unwrap();
        drop(conn);

        let config =
            SqliteConfig::file(tmp.to_string_lossy().to_string()).flags(OpenFlags::read_only());
        let conn = SqliteConnection::open(&config).unwrap();
        assert!(conn.query_sync("SELECT * FROM test", &[]).unwrap().is_empty());
        assert!(conn.execute_raw("INSERT INTO test VALUES (1)").is_err());

        drop(conn);
        let _ = std::fs::remove_file(&tmp);
    }

    #[test]
    fn test_open_missing_file_read_only_fails() {
        let config = SqliteConfig::file("/nonexistent/dir/delegorm.db").flags(OpenFlags::read_only());
        let err = SqliteConnection::open(&config).unwrap_err();
        assert!(err.is_connection_error());
    }

    #[test]
    fn test_open_path_with_nul_is_config_error() {
        let err = SqliteConnection::open(&SqliteConfig::file("bad\0path.db")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}

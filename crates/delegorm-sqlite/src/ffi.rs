//! The subset of libsqlite3 the driver uses.
//!
//! Declarations come from `libsqlite3-sys`; this module narrows them to
//! what the driver touches and adds a few safe wrappers.

use std::ffi::{CStr, c_int};

pub use libsqlite3_sys::{
    SQLITE_BLOB, SQLITE_BUSY, SQLITE_CONSTRAINT, SQLITE_DONE, SQLITE_ERROR, SQLITE_FLOAT,
    SQLITE_INTEGER, SQLITE_LOCKED, SQLITE_MISUSE, SQLITE_NOTFOUND, SQLITE_NULL, SQLITE_OK,
    SQLITE_OPEN_CREATE, SQLITE_OPEN_FULLMUTEX, SQLITE_OPEN_NOMUTEX, SQLITE_OPEN_READONLY,
    SQLITE_OPEN_READWRITE, SQLITE_OPEN_URI, SQLITE_RANGE, SQLITE_ROW, SQLITE_TEXT,
    SQLITE_TRANSIENT, sqlite3, sqlite3_bind_blob, sqlite3_bind_double, sqlite3_bind_int,
    sqlite3_bind_int64, sqlite3_bind_null, sqlite3_bind_text, sqlite3_busy_timeout,
    sqlite3_changes, sqlite3_close, sqlite3_column_blob, sqlite3_column_bytes,
    sqlite3_column_count, sqlite3_column_double, sqlite3_column_int64, sqlite3_column_name,
    sqlite3_column_text, sqlite3_column_type, sqlite3_errcode, sqlite3_errmsg, sqlite3_exec,
    sqlite3_finalize, sqlite3_free, sqlite3_last_insert_rowid, sqlite3_open_v2,
    sqlite3_prepare_v2, sqlite3_step, sqlite3_stmt,
};

// `libsqlite3-sys` blocklists `sqlite3_close_v2` from its generated
// bindings; the symbol itself is still provided by the linked library.
unsafe extern "C" {
    pub fn sqlite3_close_v2(db: *mut sqlite3) -> c_int;
}

/// First SQLite release with `INSERT/UPDATE ... RETURNING`.
pub const RETURNING_MIN_VERSION: c_int = 3_035_000;

/// The linked SQLite library version, e.g. `"3.45.1"`.
pub fn version() -> &'static str {
    // SAFETY: sqlite3_libversion returns a pointer to a static string
    unsafe {
        CStr::from_ptr(libsqlite3_sys::sqlite3_libversion())
            .to_str()
            .unwrap_or("unknown")
    }
}

/// The linked SQLite library version as `X * 1_000_000 + Y * 1_000 + Z`.
pub fn version_number() -> c_int {
    // SAFETY: no preconditions
    unsafe { libsqlite3_sys::sqlite3_libversion_number() }
}

/// English description of a primary result code.
pub fn error_string(code: c_int) -> &'static str {
    // SAFETY: sqlite3_errstr returns a pointer to a static string
    unsafe {
        let ptr = libsqlite3_sys::sqlite3_errstr(code);
        if ptr.is_null() {
            "unknown error"
        } else {
            CStr::from_ptr(ptr).to_str().unwrap_or("unknown error")
        }
    }
}

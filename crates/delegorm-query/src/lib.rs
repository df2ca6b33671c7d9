//! Writes and query sets for delegorm models.
//!
//! `delegorm-query` is the **write layer**. It decides which columns an
//! INSERT or UPDATE sends, renders the statement with a `RETURNING` clause
//! for the columns the database decides, and writes the returned values
//! back onto the instance.
//!
//! # Role In The Architecture
//!
//! - **Write-set filtering**: [`write_set`] splits an instance into sent
//!   and returned columns, honoring per-call `ignore_delegated` overrides.
//! - **Returning coordination**: [`returning`] renders and runs the
//!   statements and rejects writes the backend cannot express.
//! - **Query sets**: [`QuerySet`] filters rows and runs bulk updates that
//!   drop delegated columns.
//!
//! Statements execute through the `Connection` trait from `delegorm-core`.
//! Most users reach this crate through the `delegorm` facade.

pub mod builder;
pub mod clause;
pub mod expr;
pub mod queryset;
pub mod returning;
pub mod write_set;

#[cfg(test)]
mod testing;

pub use builder::{InsertBuilder, RefreshBuilder, SaveBuilder, UpdateBuilder};
pub use clause::Where;
pub use expr::{BinaryOp, Expr};
pub use queryset::QuerySet;
pub use returning::{check_capabilities, insert_returning, refresh, update_returning};
pub use write_set::{BulkAssignments, WritePlan, filter_assignments, plan_insert, plan_update};

use asupersync::{Cx, Outcome};
use delegorm_core::{Connection, Row, Value};

/// Create a query set for a model.
///
/// # Example
///
/// ```ignore
/// let n = objects!(Item)
///     .ignore_delegated(["both"])
///     .update(cx, &conn, [("both", Value::from(2))])
///     .await;
/// ```
#[macro_export]
macro_rules! objects {
    ($model:ty) => {
        $crate::QuerySet::<$model>::new()
    };
}

/// Create an INSERT for a model instance.
///
/// # Example
///
/// ```ignore
/// insert!(&mut item)
///     .execute(cx, &conn)
///     .await?;
/// ```
#[macro_export]
macro_rules! insert {
    ($model:expr) => {
        $crate::builder::InsertBuilder::new($model)
    };
}

/// Create an UPDATE for a model instance.
///
/// # Example
///
/// ```ignore
/// update!(&mut item)
///     .ignore_delegated(["a"])
///     .execute(cx, &conn)
///     .await?;
/// ```
#[macro_export]
macro_rules! update {
    ($model:expr) => {
        $crate::builder::UpdateBuilder::new($model)
    };
}

/// INSERT a new instance or UPDATE a persisted one.
#[macro_export]
macro_rules! save {
    ($model:expr) => {
        $crate::builder::SaveBuilder::new($model)
    };
}

/// Reload an instance from its row.
#[macro_export]
macro_rules! refresh {
    ($model:expr) => {
        $crate::builder::RefreshBuilder::new($model)
    };
}

/// Raw SQL query execution.
///
/// For statements the builders do not express.
pub async fn raw_query<C: Connection>(
    cx: &Cx,
    conn: &C,
    sql: &str,
    params: &[Value],
) -> Outcome<Vec<Row>, delegorm_core::Error> {
    conn.query(cx, sql, params).await
}

/// Raw SQL statement execution.
pub async fn raw_execute<C: Connection>(
    cx: &Cx,
    conn: &C,
    sql: &str,
    params: &[Value],
) -> Outcome<u64, delegorm_core::Error> {
    conn.execute(cx, sql, params).await
}

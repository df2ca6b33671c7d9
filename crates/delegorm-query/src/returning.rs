//! Writing a model instance and reading back what the database decided.
//!
//! The statement is built from a [`WritePlan`]. When the plan leaves any
//! column to the database, the write carries a `RETURNING` clause and the
//! returned row is applied to the instance before the call completes.

use asupersync::{Cx, Outcome};
use delegorm_core::{
    Capabilities, Connection, Dialect, Error, IgnoreDelegated, Model, NotSupportedError,
    QueryError, QueryErrorKind, Row, Unsupported, Value, WriteKind,
};

use crate::write_set::{WritePlan, plan_insert, plan_update};

fn quoted_list(dialect: Dialect, columns: impl IntoIterator<Item = &'static str>) -> String {
    columns
        .into_iter()
        .map(|c| dialect.quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn push_returning(sql: &mut String, dialect: Dialect, columns: &[&'static str]) {
    if !columns.is_empty() {
        sql.push_str(" RETURNING ");
        sql.push_str(&quoted_list(dialect, columns.iter().copied()));
    }
}

/// Check a plan against backend capabilities before anything is sent.
#[allow(clippy::result_large_err)]
pub fn check_capabilities<M: Model>(plan: &WritePlan, caps: Capabilities) -> Result<(), Error> {
    if plan.sent.is_empty() {
        match plan.kind {
            WriteKind::Insert if !caps.empty_insert => {
                return Err(NotSupportedError::new(
                    Unsupported::EmptyInsert,
                    M::TABLE_NAME,
                    "every column is left to the database and the backend cannot insert a row without columns",
                )
                .into());
            }
            WriteKind::Update => {
                return Err(NotSupportedError::new(
                    Unsupported::EmptyUpdate,
                    M::TABLE_NAME,
                    "every non-key column is delegated; name one in ignore_delegated to update it",
                )
                .into());
            }
            WriteKind::Insert => {}
        }
    }
    if plan.needs_returning() && !caps.returning {
        return Err(NotSupportedError::new(
            Unsupported::Returning,
            M::TABLE_NAME,
            format!(
                "{} leaves {} to the database, which the backend cannot report back",
                plan.kind,
                plan.returning.join(", ")
            ),
        )
        .into());
    }
    Ok(())
}

/// Render the INSERT for a plan.
///
/// Returns the SQL, its parameters and the RETURNING columns (empty when
/// nothing has to be read back).
pub fn render_insert<M: Model>(
    plan: &WritePlan,
    dialect: Dialect,
) -> (String, Vec<Value>, Vec<&'static str>) {
    let table = dialect.quote_identifier(M::TABLE_NAME);
    let params: Vec<Value> = plan.sent.iter().map(|(_, v)| v.clone()).collect();

    let mut sql = if plan.sent.is_empty() {
        format!("INSERT INTO {} {}", table, dialect.empty_insert_sql())
    } else {
        let placeholders: Vec<_> = (1..=params.len()).map(|i| dialect.placeholder(i)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            quoted_list(dialect, plan.sent_columns()),
            placeholders.join(", ")
        )
    };

    let returning = if plan.needs_returning() {
        plan.returning_columns()
    } else {
        Vec::new()
    };
    push_returning(&mut sql, dialect, &returning);

    (sql, params, returning)
}

/// Render the UPDATE for a plan, keyed on the primary key.
pub fn render_update<M: Model>(
    plan: &WritePlan,
    dialect: Dialect,
) -> (String, Vec<Value>, Vec<&'static str>) {
    let mut params = Vec::with_capacity(plan.sent.len() + plan.key.len());
    let mut set_clauses = Vec::with_capacity(plan.sent.len());
    for (column, value) in &plan.sent {
        params.push(value.clone());
        set_clauses.push(format!(
            "{} = {}",
            dialect.quote_identifier(column),
            dialect.placeholder(params.len())
        ));
    }

    let mut sql = format!(
        "UPDATE {} SET {}",
        dialect.quote_identifier(M::TABLE_NAME),
        set_clauses.join(", ")
    );

    let mut key_clauses = Vec::with_capacity(plan.key.len());
    for (column, value) in &plan.key {
        params.push(value.clone());
        key_clauses.push(format!(
            "{} = {}",
            dialect.quote_identifier(column),
            dialect.placeholder(params.len())
        ));
    }
    sql.push_str(" WHERE ");
    sql.push_str(&key_clauses.join(" AND "));

    let returning = plan.returning.clone();
    push_returning(&mut sql, dialect, &returning);

    (sql, params, returning)
}

/// Render a SELECT of every column of one row, keyed on the primary key.
pub fn render_refresh<M: Model>(key: &[(&'static str, Value)], dialect: Dialect) -> (String, Vec<Value>) {
    let columns = quoted_list(dialect, M::fields().iter().map(|f| f.column_name));
    let mut params = Vec::with_capacity(key.len());
    let mut key_clauses = Vec::with_capacity(key.len());
    for (column, value) in key {
        params.push(value.clone());
        key_clauses.push(format!(
            "{} = {}",
            dialect.quote_identifier(column),
            dialect.placeholder(params.len())
        ));
    }
    let sql = format!(
        "SELECT {} FROM {} WHERE {}",
        columns,
        dialect.quote_identifier(M::TABLE_NAME),
        key_clauses.join(" AND ")
    );
    (sql, params)
}

#[allow(clippy::result_large_err)]
fn require_key<M: Model>(key: &[(&'static str, Value)], action: &str) -> Result<(), Error> {
    if key.is_empty() {
        return Err(Error::Custom(format!(
            "cannot {} a row of '{}': model has no primary key",
            action,
            M::TABLE_NAME
        )));
    }
    if let Some((column, _)) = key.iter().find(|(_, v)| v.is_null()) {
        return Err(Error::Custom(format!(
            "cannot {} a row of '{}': primary key '{}' is NULL",
            action,
            M::TABLE_NAME,
            column
        )));
    }
    Ok(())
}

fn key_not_found<M: Model>(sql: String) -> Error {
    QueryError::new(
        QueryErrorKind::NotFound,
        format!("no row of '{}' matches the primary key", M::TABLE_NAME),
    )
    .with_sql(sql)
    .into()
}

fn apply(model: &mut impl Model, row: &Row) -> Outcome<(), Error> {
    match model.apply_row(row) {
        Ok(()) => Outcome::Ok(()),
        Err(e) => Outcome::Err(e),
    }
}

/// INSERT a model instance and apply what the database reports back.
///
/// Delegated columns are written back from the RETURNING row. Without
/// anything to read back, an auto-increment key is set from the last
/// insert id.
#[tracing::instrument(level = "debug", skip_all, fields(table = M::TABLE_NAME))]
pub async fn insert_returning<M: Model, C: Connection>(
    cx: &Cx,
    conn: &C,
    model: &mut M,
    ignore: &IgnoreDelegated,
) -> Outcome<(), Error> {
    let plan = plan_insert(model, ignore);
    if let Err(e) = check_capabilities::<M>(&plan, conn.capabilities()) {
        return Outcome::Err(e);
    }

    let (sql, params, returning) = render_insert::<M>(&plan, conn.dialect());
    tracing::trace!(sql = %sql, returning = returning.len(), "insert");

    if returning.is_empty() {
        let id = match conn.insert(cx, &sql, &params).await {
            Outcome::Ok(id) => id,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        return match plan.generated_key {
            Some(column) => apply(model, &Row::new(vec![column.to_string()], vec![Value::BigInt(id)])),
            None => Outcome::Ok(()),
        };
    }

    let row = match conn.query_one(cx, &sql, &params).await {
        Outcome::Ok(Some(row)) => row,
        Outcome::Ok(None) => {
            return Outcome::Err(
                QueryError::new(QueryErrorKind::Database, "INSERT ... RETURNING produced no row")
                    .with_sql(sql)
                    .into(),
            );
        }
        Outcome::Err(e) => return Outcome::Err(e),
        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
        Outcome::Panicked(p) => return Outcome::Panicked(p),
    };

    tracing::debug!(columns = row.len(), "applying returned values");
    apply(model, &row)
}

/// UPDATE a model instance by primary key and apply what the database
/// reports back. Returns the number of rows updated; a key that matches no
/// row is a `NotFound` query error.
#[tracing::instrument(level = "debug", skip_all, fields(table = M::TABLE_NAME))]
pub async fn update_returning<M: Model, C: Connection>(
    cx: &Cx,
    conn: &C,
    model: &mut M,
    ignore: &IgnoreDelegated,
) -> Outcome<u64, Error> {
    let plan = plan_update(model, ignore);
    if let Err(e) = require_key::<M>(&plan.key, "update") {
        return Outcome::Err(e);
    }
    if let Err(e) = check_capabilities::<M>(&plan, conn.capabilities()) {
        return Outcome::Err(e);
    }

    let (sql, params, returning) = render_update::<M>(&plan, conn.dialect());
    tracing::trace!(sql = %sql, returning = returning.len(), "update");

    if returning.is_empty() {
        return match conn.execute(cx, &sql, &params).await {
            Outcome::Ok(0) => Outcome::Err(key_not_found::<M>(sql)),
            other => other,
        };
    }

    let row = match conn.query_one(cx, &sql, &params).await {
        Outcome::Ok(Some(row)) => row,
        Outcome::Ok(None) => return Outcome::Err(key_not_found::<M>(sql)),
        Outcome::Err(e) => return Outcome::Err(e),
        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
        Outcome::Panicked(p) => return Outcome::Panicked(p),
    };

    tracing::debug!(columns = row.len(), "applying returned values");
    match apply(model, &row) {
        Outcome::Ok(()) => Outcome::Ok(1),
        Outcome::Err(e) => Outcome::Err(e),
        Outcome::Cancelled(r) => Outcome::Cancelled(r),
        Outcome::Panicked(p) => Outcome::Panicked(p),
    }
}

/// Reload every column of a model instance from its row.
#[tracing::instrument(level = "debug", skip_all, fields(table = M::TABLE_NAME))]
pub async fn refresh<M: Model, C: Connection>(cx: &Cx, conn: &C, model: &mut M) -> Outcome<(), Error> {
    let key: Vec<(&'static str, Value)> = M::PRIMARY_KEY
        .iter()
        .copied()
        .zip(model.primary_key_value())
        .collect();
    if let Err(e) = require_key::<M>(&key, "refresh") {
        return Outcome::Err(e);
    }

    let (sql, params) = render_refresh::<M>(&key, conn.dialect());
    tracing::trace!(sql = %sql, "refresh");

    match conn.query_one(cx, &sql, &params).await {
        Outcome::Ok(Some(row)) => apply(model, &row),
        Outcome::Ok(None) => Outcome::Err(
            QueryError::new(
                QueryErrorKind::NotFound,
                format!("row of '{}' no longer exists", M::TABLE_NAME),
            )
            .with_sql(sql)
            .into(),
        ),
        Outcome::Err(e) => Outcome::Err(e),
        Outcome::Cancelled(r) => Outcome::Cancelled(r),
        Outcome::Panicked(p) => Outcome::Panicked(p),
    }
}

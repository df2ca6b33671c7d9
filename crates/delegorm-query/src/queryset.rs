//! Query sets: filtered views of a table with bulk writes.
//!
//! A [`QuerySet`] is an immutable value. [`QuerySet::filter`] and
//! [`QuerySet::ignore_delegated`] return new query sets, so chains built
//! from one base never share overrides.

use std::marker::PhantomData;

use asupersync::{Cx, Outcome};
use delegorm_core::{Connection, Dialect, Error, IgnoreDelegated, Model, Row, Value};

use crate::clause::{Where, and_where};
use crate::expr::Expr;
use crate::returning::insert_returning;
use crate::write_set::filter_assignments;

/// A filtered set of rows of `M`'s table.
#[derive(Debug)]
pub struct QuerySet<M: Model> {
    where_clause: Option<Where>,
    ignore: IgnoreDelegated,
    _marker: PhantomData<fn() -> M>,
}

impl<M: Model> Clone for QuerySet<M> {
    fn clone(&self) -> Self {
        Self {
            where_clause: self.where_clause.clone(),
            ignore: self.ignore.clone(),
            _marker: PhantomData,
        }
    }
}

impl<M: Model> Default for QuerySet<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> QuerySet<M> {
    /// Every row of the table, no overrides.
    pub fn new() -> Self {
        Self {
            where_clause: None,
            ignore: IgnoreDelegated::new(),
            _marker: PhantomData,
        }
    }

    /// A query set narrowed by `expr` (AND-ed with existing filters).
    #[must_use]
    pub fn filter(&self, expr: Expr) -> Self {
        Self {
            where_clause: Some(and_where(self.where_clause.clone(), expr)),
            ignore: self.ignore.clone(),
            _marker: PhantomData,
        }
    }

    /// A query set whose writes send these delegated fields.
    #[must_use]
    pub fn ignore_delegated<I, S>(&self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            where_clause: self.where_clause.clone(),
            ignore: self.ignore.with(fields),
            _marker: PhantomData,
        }
    }

    /// The override set carried by this query set.
    pub fn overrides(&self) -> &IgnoreDelegated {
        &self.ignore
    }

    fn push_where(&self, sql: &mut String, params: &mut Vec<Value>, dialect: Dialect) {
        if let Some(where_clause) = &self.where_clause {
            let (where_sql, where_params) = where_clause.build_with_dialect(dialect, params.len());
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
            params.extend(where_params);
        }
    }

    /// Build `SELECT COUNT(*)` for this query set.
    pub fn build_count(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut sql = format!("SELECT COUNT(*) FROM {}", dialect.quote_identifier(M::TABLE_NAME));
        let mut params = Vec::new();
        self.push_where(&mut sql, &mut params, dialect);
        (sql, params)
    }

    /// Build a SELECT of every model column for this query set.
    pub fn build_select(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let columns: Vec<_> = M::fields()
            .iter()
            .map(|f| dialect.quote_identifier(f.column_name))
            .collect();
        let mut sql = format!(
            "SELECT {} FROM {}",
            columns.join(", "),
            dialect.quote_identifier(M::TABLE_NAME)
        );
        let mut params = Vec::new();
        self.push_where(&mut sql, &mut params, dialect);
        (sql, params)
    }

    /// Build a bulk UPDATE from already filtered assignments.
    pub fn build_update(&self, set: &[(&'static str, Value)], dialect: Dialect) -> (String, Vec<Value>) {
        let mut params = Vec::with_capacity(set.len());
        let mut set_clauses = Vec::with_capacity(set.len());
        for (column, value) in set {
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
        self.push_where(&mut sql, &mut params, dialect);
        (sql, params)
    }

    /// Insert `model` with this query set's overrides and return it with
    /// the values the database decided.
    pub async fn create<C: Connection>(&self, cx: &Cx, conn: &C, mut model: M) -> Outcome<M, Error> {
        match insert_returning(cx, conn, &mut model, &self.ignore).await {
            Outcome::Ok(()) => Outcome::Ok(model),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Bulk UPDATE every matched row; returns the number of rows matched.
    ///
    /// Assignments to columns delegated for UPDATE are dropped unless this
    /// query set overrides them. When nothing is left to assign no UPDATE
    /// is sent and the matched rows are counted instead, so the result is
    /// the matched count rather than 0 even though no column changed.
    #[tracing::instrument(level = "debug", skip_all, fields(table = M::TABLE_NAME))]
    pub async fn update<C, I, S>(&self, cx: &Cx, conn: &C, assignments: I) -> Outcome<u64, Error>
    where
        C: Connection,
        I: IntoIterator<Item = (S, Value)>,
        S: AsRef<str>,
    {
        let filtered = match filter_assignments::<M, _, _>(assignments, &self.ignore) {
            Ok(filtered) => filtered,
            Err(e) => return Outcome::Err(e),
        };

        if filtered.set.is_empty() {
            tracing::debug!(
                dropped = ?filtered.dropped,
                "every assignment is delegated; counting matched rows instead"
            );
            return self.count(cx, conn).await;
        }

        let (sql, params) = self.build_update(&filtered.set, conn.dialect());
        tracing::trace!(sql = %sql, "bulk update");
        conn.execute(cx, &sql, &params).await
    }

    /// Count the rows this query set matches.
    pub async fn count<C: Connection>(&self, cx: &Cx, conn: &C) -> Outcome<u64, Error> {
        let (sql, params) = self.build_count(conn.dialect());
        tracing::trace!(sql = %sql, "count");

        let row = match conn.query_one(cx, &sql, &params).await {
            Outcome::Ok(row) => row,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        let count = match row.as_ref().map(|r| r.get_as::<i64>(0)) {
            Some(Ok(n)) => n,
            Some(Err(e)) => return Outcome::Err(e),
            None => 0,
        };
        Outcome::Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Load every matched row.
    pub async fn all<C: Connection>(&self, cx: &Cx, conn: &C) -> Outcome<Vec<M>, Error> {
        let (sql, params) = self.build_select(conn.dialect());
        tracing::trace!(sql = %sql, "select");

        let rows = match conn.query(cx, &sql, &params).await {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        match rows.iter().map(M::from_row).collect::<Result<Vec<_>, _>>() {
            Ok(models) => Outcome::Ok(models),
            Err(e) => Outcome::Err(e),
        }
    }

    /// Load exactly one matched row.
    pub async fn get<C: Connection>(&self, cx: &Cx, conn: &C) -> Outcome<M, Error> {
        let (sql, params) = self.build_select(conn.dialect());
        tracing::trace!(sql = %sql, "get");

        let mut rows: Vec<Row> = match conn.query(cx, &sql, &params).await {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        match rows.len() {
            0 => Outcome::Err(Error::Custom("Expected one row, found none".to_string())),
            1 => {
                let row = rows.remove(0);
                match M::from_row(&row) {
                    Ok(model) => Outcome::Ok(model),
                    Err(e) => Outcome::Err(e),
                }
            }
            n => Outcome::Err(Error::Custom(format!("Expected one row, found {n}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        MockConnection, PartiallyDelegated, Reply, block_on, expect_err, unwrap_outcome,
    };

    type Objects = QuerySet<PartiallyDelegated>;

    #[test]
    fn chained_overrides_do_not_leak_into_siblings() {
        let base = Objects::new().ignore_delegated(["insert"]);
        let left = base.ignore_delegated(["both"]);
        let right = base.filter(Expr::col("id").eq(1_i64));

        assert_eq!(base.overrides().names(), ["insert"]);
        assert_eq!(left.overrides().names(), ["insert", "both"]);
        assert_eq!(right.overrides().names(), ["insert"]);
        assert!(Objects::new().overrides().is_empty());
    }

    #[test]
    fn builds_filtered_statements() {
        let qs = Objects::new().filter(Expr::col("insert").eq(2_i64));
        let (sql, params) = qs.build_count(Dialect::Sqlite);
        assert_eq!(
            sql,
            "SELECT COUNT(*) FROM \"partially_delegated\" WHERE \"insert\" = ?1"
        );
        assert_eq!(params, vec![Value::BigInt(2)]);

        let (sql, params) = qs.build_update(&[("update", Value::BigInt(5))], Dialect::Postgres);
        assert_eq!(
            sql,
            "UPDATE \"partially_delegated\" SET \"update\" = $1 WHERE \"insert\" = $2"
        );
        assert_eq!(params, vec![Value::BigInt(5), Value::BigInt(2)]);

        let (sql, _) = Objects::new().build_select(Dialect::Mysql);
        assert_eq!(
            sql,
            "SELECT `id`, `insert`, `update`, `both` FROM `partially_delegated`"
        );
    }

    #[test]
    fn create_uses_query_set_overrides() {
        let conn = MockConnection::new(Dialect::Postgres, |_, _| {
            Ok(Reply::row(&["id", "both"], vec![Value::BigInt(1), Value::Null]))
        });

        block_on(|cx| async move {
            let created = unwrap_outcome(
                Objects::new()
                    .ignore_delegated(["insert"])
                    .create(
                        &cx,
                        &conn,
                        PartiallyDelegated {
                            id: None,
                            insert: Some(1),
                            update: Some(1),
                            both: Some(1),
                        },
                    )
                    .await,
            );
            assert_eq!(created.id, Some(1));
            assert_eq!(created.insert, Some(1));
            assert_eq!(created.update, Some(1));
            assert_eq!(created.both, None);
            assert_eq!(
                conn.sql(),
                vec![
                    "INSERT INTO \"partially_delegated\" (\"insert\", \"update\") VALUES ($1, $2) RETURNING \"id\", \"both\""
                        .to_string()
                ]
            );
        });
    }

    #[test]
    fn bulk_update_drops_delegated_columns() {
        let conn = MockConnection::new(Dialect::Postgres, |sql, _| {
            if sql.starts_with("SELECT COUNT(*)") {
                Ok(Reply::row(&["COUNT(*)"], vec![Value::BigInt(10)]))
            } else {
                Ok(Reply::affected(10))
            }
        });

        block_on(|cx| async move {
            let n = unwrap_outcome(
                Objects::new()
                    .update(&cx, &conn, [("insert", Value::from(2_i64))])
                    .await,
            );
            assert_eq!(n, 10);

            let n = unwrap_outcome(
                Objects::new()
                    .update(
                        &cx,
                        &conn,
                        [("update", Value::from(2_i64)), ("both", Value::from(2_i64))],
                    )
                    .await,
            );
            assert_eq!(n, 10);

            let n = unwrap_outcome(
                Objects::new()
                    .ignore_delegated(["both"])
                    .update(&cx, &conn, [("update", Value::from(2_i64)), ("both", Value::from(2_i64))])
                    .await,
            );
            assert_eq!(n, 10);

            assert_eq!(
                conn.sql(),
                vec![
                    "UPDATE \"partially_delegated\" SET \"insert\" = $1".to_string(),
                    "SELECT COUNT(*) FROM \"partially_delegated\"".to_string(),
                    "UPDATE \"partially_delegated\" SET \"both\" = $1".to_string(),
                ]
            );
        });
    }

    #[test]
    fn bulk_update_rejects_unknown_columns() {
        let conn = MockConnection::new(Dialect::Postgres, |_, _| Ok(Reply::affected(0)));

        block_on(|cx| async move {
            let err = expect_err(
                Objects::new()
                    .update(&cx, &conn, [("missing", Value::Null)])
                    .await,
            );
            assert!(matches!(err, Error::Custom(ref m) if m.contains("missing")));
            assert!(conn.statements().is_empty());
        });
    }

    #[test]
    fn get_requires_exactly_one_row() {
        let conn = MockConnection::new(Dialect::Sqlite, |_, params| {
            let row = |id: i64| {
                Row::new(
                    vec!["id".into(), "insert".into(), "update".into(), "both".into()],
                    vec![Value::BigInt(id), Value::Null, Value::Null, Value::Null],
                )
            };
            let rows = if params.is_empty() {
                vec![row(1), row(2)]
            } else {
                vec![row(1)]
            };
            Ok(Reply {
                rows,
                ..Reply::default()
            })
        });

        block_on(|cx| async move {
            let one = unwrap_outcome(
                Objects::new()
                    .filter(Expr::col("id").eq(1_i64))
                    .get(&cx, &conn)
                    .await,
            );
            assert_eq!(one.id, Some(1));

            let err = expect_err(Objects::new().get(&cx, &conn).await);
            assert!(err.to_string().contains("Expected one row, found 2"));

            let all = unwrap_outcome(Objects::new().all(&cx, &conn).await);
            assert_eq!(all.len(), 2);
        });
    }
}

//! WHERE clause.

use crate::expr::Expr;
use delegorm_core::{Dialect, Value};

/// WHERE clause.
#[derive(Debug, Clone)]
pub struct Where {
    expr: Expr,
}

impl Where {
    /// Create a new WHERE clause with the given expression.
    pub fn new(expr: Expr) -> Self {
        Self { expr }
    }

    /// Add an AND condition.
    pub fn and(self, expr: Expr) -> Self {
        Self {
            expr: self.expr.and(expr),
        }
    }

    /// Add an OR condition.
    pub fn or(self, expr: Expr) -> Self {
        Self {
            expr: self.expr.or(expr),
        }
    }

    /// Build the WHERE clause with a parameter offset.
    pub fn build_with_dialect(&self, dialect: Dialect, offset: usize) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let sql = self.expr.build_with_dialect(dialect, &mut params, offset);
        (sql, params)
    }
}

/// AND `expr` onto an optional clause.
pub(crate) fn and_where(clause: Option<Where>, expr: Expr) -> Where {
    match clause {
        Some(existing) => existing.and(expr),
        None => Where::new(expr),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_where_offset_numbering() {
        let clause = Where::new(Expr::col("id").eq(7_i64)).and(Expr::col("b").is_null());
        let (sql, params) = clause.build_with_dialect(Dialect::Postgres, 2);
        assert_eq!(sql, "\"id\" = $3 AND \"b\" IS NULL");
        assert_eq!(params, vec![Value::BigInt(7)]);
    }

    #[test]
    fn test_and_where_starts_fresh() {
        let clause = and_where(None, Expr::col("a").eq(1));
        let (sql, _) = clause.build_with_dialect(Dialect::Sqlite, 0);
        assert_eq!(sql, "\"a\" = ?1");

        let clause = and_where(Some(clause), Expr::col("b").eq(2));
        let (sql, _) = clause.build_with_dialect(Dialect::Sqlite, 0);
        assert_eq!(sql, "\"a\" = ?1 AND \"b\" = ?2");
    }

    #[test]
    fn test_or_clause() {
        let clause = Where::new(Expr::col("a").eq(1)).or(Expr::col("a").eq(2));
        let (sql, params) = clause.build_with_dialect(Dialect::Mysql, 0);
        assert_eq!(sql, "`a` = ? OR `a` = ?");
        assert_eq!(params.len(), 2);
    }
}

//! Field and column definitions.

use crate::delegation::{Delegation, WriteKind};

/// Metadata about a model field/column.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    /// Rust field name
    pub name: &'static str,
    /// Database column name (may differ from field name)
    pub column_name: &'static str,
    /// Whether this field is nullable
    pub nullable: bool,
    /// Whether this is a primary key
    pub primary_key: bool,
    /// Whether this field auto-increments
    pub auto_increment: bool,
    /// Default value expression (SQL). Informational; the schema owns it.
    pub default: Option<&'static str>,
    /// Which writes leave this column to the database
    pub delegation: Delegation,
}

impl FieldInfo {
    /// Create a new field info with minimal required data.
    pub const fn new(name: &'static str, column_name: &'static str) -> Self {
        Self {
            name,
            column_name,
            nullable: false,
            primary_key: false,
            auto_increment: false,
            default: None,
            delegation: Delegation::NONE,
        }
    }

    /// Set the database column name.
    pub const fn column(mut self, name: &'static str) -> Self {
        self.column_name = name;
        self
    }

    /// Set nullable flag.
    pub const fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    /// Set primary key flag.
    pub const fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        self
    }

    /// Set auto-increment flag.
    pub const fn auto_increment(mut self, value: bool) -> Self {
        self.auto_increment = value;
        self
    }

    /// Set default value.
    pub const fn default(mut self, expr: &'static str) -> Self {
        self.default = Some(expr);
        self
    }

    /// Set default value from optional.
    pub const fn default_opt(mut self, expr: Option<&'static str>) -> Self {
        self.default = expr;
        self
    }

    /// Never send this column; read it back after every write.
    pub const fn delegated(mut self, value: bool) -> Self {
        self.delegation.delegated = value;
        self
    }

    /// Leave this column out of INSERTs and read it back afterwards.
    pub const fn return_on_insert(mut self, value: bool) -> Self {
        self.delegation.return_on_insert = value;
        self
    }

    /// Leave this column out of UPDATEs and read it back afterwards.
    pub const fn return_on_update(mut self, value: bool) -> Self {
        self.delegation.return_on_update = value;
        self
    }

    /// Whether writes of `kind` leave this column to the database.
    pub const fn is_delegated_for(&self, kind: WriteKind) -> bool {
        self.delegation.excludes(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_delegation_flags() {
        const NUM: FieldInfo = FieldInfo::new("num", "num")
            .nullable(true)
            .return_on_insert(true)
            .return_on_update(true);

        assert!(NUM.nullable);
        assert!(!NUM.delegation.delegated);
        assert!(NUM.is_delegated_for(WriteKind::Insert));
        assert!(NUM.is_delegated_for(WriteKind::Update));
    }

    #[test]
    fn plain_field_is_never_delegated() {
        let b = FieldInfo::new("b", "b_col").default("'x'");
        assert_eq!(b.column_name, "b_col");
        assert_eq!(b.default, Some("'x'"));
        assert!(!b.is_delegated_for(WriteKind::Insert));
        assert!(!b.is_delegated_for(WriteKind::Update));
    }
}

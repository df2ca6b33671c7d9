//! Delegated fields: columns whose value the database decides.
//!
//! A delegated field is left out of the INSERT/UPDATE the ORM issues and is
//! read back with a `RETURNING` clause in the same statement. Delegation can
//! be scoped to one write kind, and any single call may suspend it for a set
//! of named fields with an [`IgnoreDelegated`] override.

use std::fmt;
use std::sync::Arc;

use crate::field::FieldInfo;

/// The kind of write a statement performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteKind {
    Insert,
    Update,
}

impl WriteKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            WriteKind::Insert => "INSERT",
            WriteKind::Update => "UPDATE",
        }
    }
}

impl fmt::Display for WriteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-field delegation flags.
///
/// `delegated` covers both write kinds. The granular flags cover one kind
/// each, and the field is sent normally on the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Delegation {
    pub delegated: bool,
    pub return_on_insert: bool,
    pub return_on_update: bool,
}

impl Delegation {
    /// No delegation: the field is always sent.
    pub const NONE: Delegation = Delegation {
        delegated: false,
        return_on_insert: false,
        return_on_update: false,
    };

    /// Delegated on every write.
    pub const FULL: Delegation = Delegation {
        delegated: true,
        return_on_insert: false,
        return_on_update: false,
    };

    pub const fn new(delegated: bool, return_on_insert: bool, return_on_update: bool) -> Self {
        Self {
            delegated,
            return_on_insert,
            return_on_update,
        }
    }

    /// Whether the field is left out of writes of this kind.
    pub const fn excludes(&self, kind: WriteKind) -> bool {
        self.delegated
            || match kind {
                WriteKind::Insert => self.return_on_insert,
                WriteKind::Update => self.return_on_update,
            }
    }

    /// Whether the field is delegated for any write kind.
    pub const fn is_any(&self) -> bool {
        self.delegated || self.return_on_insert || self.return_on_update
    }
}

/// A call-scoped set of field names whose delegation is suspended.
///
/// Names match either the Rust field name or the column name. The set is
/// immutable: [`IgnoreDelegated::with`] returns a new set, so two chains
/// built from one base never see each other's names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreDelegated {
    names: Arc<[String]>,
}

impl IgnoreDelegated {
    /// An empty override set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an override set from field names.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new().with(names)
    }

    /// Return a new set holding these names plus `names`.
    #[must_use]
    pub fn with<I, S>(&self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut merged: Vec<String> = self.names.to_vec();
        for name in names {
            let name = name.into();
            if !merged.contains(&name) {
                merged.push(name);
            }
        }
        Self {
            names: merged.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Whether `name` is a field or column this set names.
    pub fn contains_name(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Whether the set names this field, by field name or column name.
    pub fn covers(&self, field: &FieldInfo) -> bool {
        self.contains_name(field.name) || self.contains_name(field.column_name)
    }

    /// Whether `field` is left out of a write of `kind` under this override.
    pub fn excludes(&self, field: &FieldInfo, kind: WriteKind) -> bool {
        field.is_delegated_for(kind) && !self.covers(field)
    }

    /// Names that match no field in `fields`.
    ///
    /// Unknown names are harmless to the write itself; callers log them.
    pub fn unknown<'a>(&'a self, fields: &'a [FieldInfo]) -> impl Iterator<Item = &'a str> + 'a {
        self.names
            .iter()
            .filter(|n| {
                !fields
                    .iter()
                    .any(|f| f.name == n.as_str() || f.column_name == n.as_str())
            })
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delegated_excludes_both_kinds() {
        let d = Delegation::FULL;
        assert!(d.excludes(WriteKind::Insert));
        assert!(d.excludes(WriteKind::Update));
        assert!(d.is_any());
    }

    #[test]
    fn granular_flags_exclude_one_kind() {
        let on_insert = Delegation::new(false, true, false);
        assert!(on_insert.excludes(WriteKind::Insert));
        assert!(!on_insert.excludes(WriteKind::Update));

        let on_update = Delegation::new(false, false, true);
        assert!(!on_update.excludes(WriteKind::Insert));
        assert!(on_update.excludes(WriteKind::Update));

        assert!(!Delegation::NONE.is_any());
    }

    #[test]
    fn override_matches_field_or_column_name() {
        let field = FieldInfo::new("both", "both_col").delegated(true);
        let by_field = IgnoreDelegated::from_names(["both"]);
        let by_column = IgnoreDelegated::from_names(["both_col"]);
        let other = IgnoreDelegated::from_names(["insert"]);

        assert!(!by_field.excludes(&field, WriteKind::Update));
        assert!(!by_column.excludes(&field, WriteKind::Insert));
        assert!(other.excludes(&field, WriteKind::Update));
    }

    #[test]
    fn with_returns_a_new_set() {
        let base = IgnoreDelegated::from_names(["insert"]);
        let left = base.with(["both"]);
        let right = base.with(["update", "insert"]);

        assert_eq!(base.names(), ["insert"]);
        assert_eq!(left.names(), ["insert", "both"]);
        assert_eq!(right.names(), ["insert", "update"]);
        assert!(!right.contains_name("both"));
    }

    #[test]
    fn unknown_names_are_reported() {
        let fields = [
            FieldInfo::new("a", "a").delegated(true),
            FieldInfo::new("b", "b"),
        ];
        let set = IgnoreDelegated::from_names(["a", "nope"]);
        assert_eq!(set.unknown(&fields).collect::<Vec<_>>(), vec!["nope"]);
    }
}

//! Deciding which columns a write sends and which it asks back for.
//!
//! A column goes on the wire unless its field is delegated for the write
//! kind. An [`IgnoreDelegated`] override puts named fields back on the wire
//! for one call. Everything left out is requested back with `RETURNING`.

use delegorm_core::{Error, FieldInfo, IgnoreDelegated, Model, Result, Value, WriteKind};

/// The columns one INSERT or UPDATE of a model instance touches.
#[derive(Debug, Clone, PartialEq)]
pub struct WritePlan {
    pub kind: WriteKind,
    /// `(column, value)` pairs sent with the statement
    pub sent: Vec<(&'static str, Value)>,
    /// Columns the database decides and reports back
    pub returning: Vec<&'static str>,
    /// Primary key `(column, value)` pairs; the WHERE clause of an UPDATE
    pub key: Vec<(&'static str, Value)>,
    /// Auto-increment key left NULL on INSERT, assigned by the database
    pub generated_key: Option<&'static str>,
}

impl WritePlan {
    /// Whether the write has to report values back to the instance.
    pub fn needs_returning(&self) -> bool {
        !self.returning.is_empty()
    }

    /// Columns to list in a RETURNING clause.
    ///
    /// A generated key rides along whenever a RETURNING clause is issued.
    pub fn returning_columns(&self) -> Vec<&'static str> {
        let mut cols = Vec::with_capacity(self.returning.len() + 1);
        if let Some(key) = self.generated_key {
            cols.push(key);
        }
        cols.extend(self.returning.iter().copied());
        cols
    }

    pub fn sent_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.sent.iter().map(|(col, _)| *col)
    }
}

fn field_for<M: Model>(column: &str) -> Option<&'static FieldInfo> {
    M::fields().iter().find(|f| f.column_name == column)
}

fn log_unknown_overrides<M: Model>(ignore: &IgnoreDelegated) {
    for name in ignore.unknown(M::fields()) {
        tracing::debug!(
            table = M::TABLE_NAME,
            name = name,
            "ignore_delegated names no field of this model"
        );
    }
}

/// Split a model instance into the columns an INSERT sends and returns.
pub fn plan_insert<M: Model>(model: &M, ignore: &IgnoreDelegated) -> WritePlan {
    log_unknown_overrides::<M>(ignore);

    let mut plan = WritePlan {
        kind: WriteKind::Insert,
        sent: Vec::new(),
        returning: Vec::new(),
        key: Vec::new(),
        generated_key: None,
    };

    for (column, value) in model.to_row() {
        let Some(field) = field_for::<M>(column) else {
            plan.sent.push((column, value));
            continue;
        };
        if field.primary_key {
            plan.key.push((column, value.clone()));
        }
        if field.auto_increment && value.is_null() {
            plan.generated_key = Some(column);
            continue;
        }
        if ignore.excludes(field, WriteKind::Insert) {
            plan.returning.push(column);
        } else {
            plan.sent.push((column, value));
        }
    }

    plan
}

/// Split a model instance into the SET, WHERE and RETURNING parts of an UPDATE.
///
/// Primary key columns are never assigned.
pub fn plan_update<M: Model>(model: &M, ignore: &IgnoreDelegated) -> WritePlan {
    log_unknown_overrides::<M>(ignore);

    let mut plan = WritePlan {
        kind: WriteKind::Update,
        sent: Vec::new(),
        returning: Vec::new(),
        key: Vec::new(),
        generated_key: None,
    };

    for (column, value) in model.to_row() {
        let field = field_for::<M>(column);
        let is_key = field.map_or_else(|| M::PRIMARY_KEY.contains(&column), |f| f.primary_key);
        if is_key {
            plan.key.push((column, value));
            continue;
        }
        match field {
            Some(field) if ignore.excludes(field, WriteKind::Update) => plan.returning.push(column),
            _ => plan.sent.push((column, value)),
        }
    }

    plan
}

/// Assignments of a bulk UPDATE after delegated columns were dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkAssignments {
    /// `(column, value)` pairs kept for the SET clause
    pub set: Vec<(&'static str, Value)>,
    /// Columns named by the caller but left to the database
    pub dropped: Vec<&'static str>,
}

/// Filter caller-supplied `field = value` assignments for a bulk UPDATE.
///
/// Names may be field or column names. A field delegated for UPDATE is
/// dropped unless `ignore` names it. Naming a column the model does not
/// have is an error.
#[allow(clippy::result_large_err)]
pub fn filter_assignments<M, I, S>(assignments: I, ignore: &IgnoreDelegated) -> Result<BulkAssignments>
where
    M: Model,
    I: IntoIterator<Item = (S, Value)>,
    S: AsRef<str>,
{
    log_unknown_overrides::<M>(ignore);

    let mut out = BulkAssignments {
        set: Vec::new(),
        dropped: Vec::new(),
    };

    for (name, value) in assignments {
        let name = name.as_ref();
        let field = M::field_info(name).ok_or_else(|| {
            Error::Custom(format!(
                "cannot update unknown column '{}' of table '{}'",
                name,
                M::TABLE_NAME
            ))
        })?;
        if ignore.excludes(field, WriteKind::Update) {
            tracing::debug!(
                table = M::TABLE_NAME,
                column = field.column_name,
                "dropping delegated column from bulk update"
            );
            out.dropped.push(field.column_name);
        } else if let Some(slot) = out.set.iter_mut().find(|(c, _)| *c == field.column_name) {
            slot.1 = value;
        } else {
            out.set.push((field.column_name, value));
        }
    }

    Ok(out)
}

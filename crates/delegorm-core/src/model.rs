//! Model trait for ORM-style struct mapping.
//!
//! The `Model` trait defines the contract for structs that can be
//! mapped to database tables. It is typically derived using the
//! `#[derive(Model)]` macro from `delegorm-macros`.

use crate::Result;
use crate::field::FieldInfo;
use crate::row::Row;
use crate::value::Value;

/// Trait for types that can be mapped to database tables.
///
/// # Example
///
/// ```ignore
/// use delegorm::Model;
///
/// #[derive(Model)]
/// #[delegorm(table = "with_delegated_fields")]
/// struct WithDelegatedFields {
///     #[delegorm(primary_key, auto_increment)]
///     id: Option<i64>,
///     #[delegorm(delegated)]
///     a: Option<String>,
///     b: Option<String>,
/// }
/// ```
pub trait Model: Sized + Send + Sync {
    /// The name of the database table.
    const TABLE_NAME: &'static str;

    /// The primary key column name(s).
    const PRIMARY_KEY: &'static [&'static str];

    /// Get field metadata for all columns.
    fn fields() -> &'static [FieldInfo];

    /// Convert this model instance to `(column, value)` pairs.
    fn to_row(&self) -> Vec<(&'static str, Value)>;

    /// Construct a model instance from a database row.
    #[allow(clippy::result_large_err)]
    fn from_row(row: &Row) -> Result<Self>;

    /// Overwrite the fields whose columns appear in `row`.
    ///
    /// Columns the row does not carry are left as they are. This is how
    /// values reported by `RETURNING` land on an instance.
    #[allow(clippy::result_large_err)]
    fn apply_row(&mut self, row: &Row) -> Result<()>;

    /// Get the value of the primary key field(s).
    fn primary_key_value(&self) -> Vec<Value>;

    /// Check if this is a new record (primary key is None/default).
    fn is_new(&self) -> bool;

    /// Look up a field by Rust name or column name.
    fn field_info(name: &str) -> Option<&'static FieldInfo> {
        Self::fields()
            .iter()
            .find(|f| f.name == name || f.column_name == name)
    }
}

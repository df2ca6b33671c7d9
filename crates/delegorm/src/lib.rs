//! delegorm - ORM fields whose values the database decides.
//!
//! Some columns are best computed by the database: defaults, triggers,
//! generated columns. delegorm lets a model mark such fields as
//! *delegated*. Writes leave them out, and `RETURNING` reports the
//! database's value back onto the instance in the same round trip.
//!
//! - `#[delegorm(delegated)]`: never sent on INSERT or UPDATE
//! - `#[delegorm(return_on_insert)]`: never sent on INSERT
//! - `#[delegorm(return_on_update)]`: never sent on UPDATE
//!
//! Any write can send a delegated field anyway with
//! `.ignore_delegated(["field"])`, for that call only.
//!
//! # Quick Start
//!
//! ```ignore
//! use delegorm::prelude::*;
//!
//! #[derive(Model, Debug, Default)]
//! #[delegorm(table = "items")]
//! struct Item {
//!     #[delegorm(primary_key, auto_increment)]
//!     id: Option<i64>,
//!     #[delegorm(delegated)]
//!     created: Option<String>,
//!     #[delegorm(return_on_update)]
//!     revision: Option<i64>,
//!     name: Option<String>,
//! }
//!
//! async fn example(cx: &Cx, conn: &impl Connection) {
//!     let mut item = Item { name: Some("a".into()), ..Item::default() };
//!
//!     // INSERT ... RETURNING "id", "created"
//!     let _ = save!(&mut item).execute(cx, conn).await;
//!
//!     // UPDATE ... RETURNING "created", "revision"
//!     item.name = Some("b".into());
//!     let _ = save!(&mut item).execute(cx, conn).await;
//!
//!     // Bulk update; "revision" is dropped unless overridden
//!     let _ = objects!(Item)
//!         .ignore_delegated(["revision"])
//!         .update(cx, conn, [("revision", Value::from(0_i64))])
//!         .await;
//! }
//! ```

pub use delegorm_core::{
    Capabilities, ConfigError, Connection, ConnectionError, ConnectionErrorKind, Cx, Delegation,
    Dialect, Error, FieldInfo, FromValue, IgnoreDelegated, Model, NotSupportedError, Outcome,
    QueryError, QueryErrorKind, Result, Row, Unsupported, Value, WriteKind,
};

pub use delegorm_macros::Model;

pub use delegorm_query::{
    BinaryOp, Expr, InsertBuilder, QuerySet, RefreshBuilder, SaveBuilder, UpdateBuilder, Where,
    WritePlan, insert, objects, plan_insert, plan_update, raw_execute, raw_query, refresh, save,
    update,
};

pub use delegorm_sqlite::{OpenFlags, SqliteConfig, SqliteConnection};

#[cfg(test)]
mod generic_model_tests {
    use super::*;
    use std::marker::PhantomData;

    #[derive(Model, Debug, Clone)]
    struct Tagged<T: Clone + std::fmt::Debug + Send + Sync + Default> {
        #[delegorm(primary_key, auto_increment)]
        id: Option<i64>,
        #[delegorm(delegated)]
        stamp: Option<String>,
        #[delegorm(skip)]
        _marker: PhantomData<T>,
    }

    #[derive(Debug, Clone, Default)]
    struct Marker;

    #[test]
    fn test_generic_model_metadata() {
        assert_eq!(<Tagged<Marker> as Model>::TABLE_NAME, "tagged");
        assert_eq!(<Tagged<Marker> as Model>::PRIMARY_KEY, &["id"]);

        let fields = <Tagged<Marker> as Model>::fields();
        assert_eq!(fields.len(), 2);
        assert!(fields[1].delegation.delegated);
        assert!(fields[0].auto_increment);
    }

    #[test]
    fn test_generic_model_rows() {
        let mut model: Tagged<Marker> = Tagged {
            id: None,
            stamp: Some("mine".into()),
            _marker: PhantomData,
        };
        assert!(model.is_new());
        assert_eq!(model.to_row().len(), 2);

        let returned = Row::new(vec!["id".into()], vec![Value::BigInt(7)]);
        model.apply_row(&returned).unwrap();
        assert_eq!(model.id, Some(7));
        assert_eq!(model.stamp.as_deref(), Some("mine"));
        assert_eq!(model.primary_key_value(), vec![Value::BigInt(7)]);
        assert!(!model.is_new());
    }
}

/// Prelude module for convenient imports.
///
/// ```ignore
/// use delegorm::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Connection, Cx, Error, Expr, IgnoreDelegated, Model, Outcome, QuerySet, Result, Row,
        SqliteConnection, Value, insert, objects, refresh, save, update,
    };
}

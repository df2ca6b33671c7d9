//! Builders for writing one model instance.
//!
//! Each builder borrows the instance mutably: values the database decides
//! are written back onto it when the statement completes.

use crate::returning::{insert_returning, refresh, render_insert, render_update, update_returning};
use crate::write_set::{plan_insert, plan_update};
use asupersync::{Cx, Outcome};
use delegorm_core::{Connection, Dialect, IgnoreDelegated, Model, Value};

/// INSERT query builder.
#[derive(Debug)]
pub struct InsertBuilder<'a, M: Model> {
    model: &'a mut M,
    ignore: IgnoreDelegated,
}

impl<'a, M: Model> InsertBuilder<'a, M> {
    /// Create a new INSERT builder for the given model instance.
    pub fn new(model: &'a mut M) -> Self {
        Self {
            model,
            ignore: IgnoreDelegated::new(),
        }
    }

    /// Send these delegated fields for this call only.
    pub fn ignore_delegated<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore = self.ignore.with(fields);
        self
    }

    /// Use an existing override set.
    pub fn with_overrides(mut self, ignore: IgnoreDelegated) -> Self {
        self.ignore = ignore;
        self
    }

    /// Build the INSERT SQL and parameters with a specific dialect.
    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let plan = plan_insert(&*self.model, &self.ignore);
        let (sql, params, _) = render_insert::<M>(&plan, dialect);
        (sql, params)
    }

    /// Execute the INSERT and write returned values onto the instance.
    pub async fn execute<C: Connection>(self, cx: &Cx, conn: &C) -> Outcome<(), delegorm_core::Error> {
        insert_returning(cx, conn, self.model, &self.ignore).await
    }
}

/// UPDATE query builder.
#[derive(Debug)]
pub struct UpdateBuilder<'a, M: Model> {
    model: &'a mut M,
    ignore: IgnoreDelegated,
}

impl<'a, M: Model> UpdateBuilder<'a, M> {
    /// Create a new UPDATE builder for the given model instance.
    pub fn new(model: &'a mut M) -> Self {
        Self {
            model,
            ignore: IgnoreDelegated::new(),
        }
    }

    /// Send these delegated fields for this call only.
    pub fn ignore_delegated<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore = self.ignore.with(fields);
        self
    }

    pub fn with_overrides(mut self, ignore: IgnoreDelegated) -> Self {
        self.ignore = ignore;
        self
    }

    /// Build the UPDATE SQL and parameters with a specific dialect.
    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let plan = plan_update(&*self.model, &self.ignore);
        let (sql, params, _) = render_update::<M>(&plan, dialect);
        (sql, params)
    }

    /// Execute the UPDATE and return rows affected.
    pub async fn execute<C: Connection>(self, cx: &Cx, conn: &C) -> Outcome<u64, delegorm_core::Error> {
        update_returning(cx, conn, self.model, &self.ignore).await
    }
}

/// INSERT for new instances, UPDATE for persisted ones.
#[derive(Debug)]
pub struct SaveBuilder<'a, M: Model> {
    model: &'a mut M,
    ignore: IgnoreDelegated,
}

impl<'a, M: Model> SaveBuilder<'a, M> {
    pub fn new(model: &'a mut M) -> Self {
        Self {
            model,
            ignore: IgnoreDelegated::new(),
        }
    }

    /// Send these delegated fields for this call only.
    pub fn ignore_delegated<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore = self.ignore.with(fields);
        self
    }

    pub fn with_overrides(mut self, ignore: IgnoreDelegated) -> Self {
        self.ignore = ignore;
        self
    }

    /// Execute the INSERT or UPDATE.
    pub async fn execute<C: Connection>(self, cx: &Cx, conn: &C) -> Outcome<(), delegorm_core::Error> {
        if self.model.is_new() {
            return insert_returning(cx, conn, self.model, &self.ignore).await;
        }
        match update_returning(cx, conn, self.model, &self.ignore).await {
            Outcome::Ok(_) => Outcome::Ok(()),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }
}

/// Reload an instance from its row.
#[derive(Debug)]
pub struct RefreshBuilder<'a, M: Model> {
    model: &'a mut M,
}

impl<'a, M: Model> RefreshBuilder<'a, M> {
    pub fn new(model: &'a mut M) -> Self {
        Self { model }
    }

    pub async fn execute<C: Connection>(self, cx: &Cx, conn: &C) -> Outcome<(), delegorm_core::Error> {
        refresh(cx, conn, self.model).await
    }
}

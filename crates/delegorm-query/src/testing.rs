//! Test models and a scripted connection.

use std::sync::Mutex;

use asupersync::runtime::RuntimeBuilder;
use asupersync::{Cx, Outcome};
use delegorm_core::{Capabilities, Connection, Dialect, Error, Row, Value};
use delegorm_macros::Model;

#[derive(Model, Debug, Clone, Default, PartialEq)]
#[delegorm(table = "with_delegated_fields")]
pub(crate) struct WithDelegatedFields {
    #[delegorm(primary_key, auto_increment)]
    pub id: Option<i64>,
    #[delegorm(delegated)]
    pub a: Option<String>,
    pub b: Option<String>,
}

#[derive(Model, Debug, Clone, Default, PartialEq)]
#[delegorm(table = "only_delegated")]
pub(crate) struct OnlyDelegated {
    #[delegorm(primary_key, auto_increment)]
    pub id: Option<i64>,
    #[delegorm(delegated)]
    pub a: Option<String>,
}

#[derive(Model, Debug, Clone, Default, PartialEq)]
#[delegorm(table = "partially_delegated")]
pub(crate) struct PartiallyDelegated {
    #[delegorm(primary_key, auto_increment)]
    pub id: Option<i64>,
    #[delegorm(return_on_insert)]
    pub insert: Option<i64>,
    #[delegorm(return_on_update)]
    pub update: Option<i64>,
    #[delegorm(delegated)]
    pub both: Option<i64>,
}

#[derive(Model, Debug, Clone, Default, PartialEq)]
#[delegorm(table = "delegated_with_db_default")]
pub(crate) struct DelegatedWithDbDefault {
    #[delegorm(primary_key, auto_increment)]
    pub id: Option<i64>,
    #[delegorm(delegated, default = "CURRENT_TIMESTAMP")]
    pub now: Option<String>,
    #[delegorm(return_on_insert, return_on_update)]
    pub num: Option<i64>,
    #[delegorm(return_on_insert, default = "1")]
    pub num_a: Option<i64>,
    #[delegorm(return_on_update)]
    pub num_b: Option<i64>,
    pub b: Option<String>,
}

/// What the scripted database answers to one statement.
#[derive(Debug, Default)]
pub(crate) struct Reply {
    pub rows: Vec<Row>,
    pub affected: u64,
    pub last_id: i64,
}

impl Reply {
    pub fn row(columns: &[&str], values: Vec<Value>) -> Self {
        Self {
            rows: vec![Row::new(
                columns.iter().map(|c| (*c).to_string()).collect(),
                values,
            )],
            affected: 1,
            last_id: 0,
        }
    }

    pub fn affected(n: u64) -> Self {
        Self {
            affected: n,
            ..Self::default()
        }
    }

    pub fn inserted(id: i64) -> Self {
        Self {
            affected: 1,
            last_id: id,
            ..Self::default()
        }
    }
}

type Handler = Box<dyn Fn(&str, &[Value]) -> Result<Reply, Error> + Send + Sync>;

/// A connection that records statements and answers from a closure.
pub(crate) struct MockConnection {
    dialect: Dialect,
    capabilities: Capabilities,
    handler: Handler,
    log: Mutex<Vec<(String, Vec<Value>)>>,
}

impl MockConnection {
    pub fn new(
        dialect: Dialect,
        handler: impl Fn(&str, &[Value]) -> Result<Reply, Error> + Send + Sync + 'static,
    ) -> Self {
        Self {
            dialect,
            capabilities: Capabilities::for_dialect(dialect),
            handler: Box::new(handler),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Every statement seen so far.
    pub fn statements(&self) -> Vec<(String, Vec<Value>)> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    pub fn sql(&self) -> Vec<String> {
        self.statements().into_iter().map(|(sql, _)| sql).collect()
    }

    fn run(&self, sql: &str, params: &[Value]) -> Result<Reply, Error> {
        if let Ok(mut log) = self.log.lock() {
            log.push((sql.to_string(), params.to_vec()));
        }
        (self.handler)(sql, params)
    }
}

impl Connection for MockConnection {
    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let result = self.run(sql, params).map(|r| r.rows);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn query_one(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send {
        let result = self.run(sql, params).map(|r| r.rows.into_iter().next());
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn execute(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let result = self.run(sql, params).map(|r| r.affected);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn insert(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<i64, Error>> + Send {
        let result = self.run(sql, params).map(|r| r.last_id);
        async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
    }

    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }
}

pub(crate) fn block_on<F: Future>(f: impl FnOnce(Cx) -> F) -> F::Output {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    rt.block_on(f(cx))
}

pub(crate) fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

pub(crate) fn expect_err<T: std::fmt::Debug>(outcome: Outcome<T, Error>) -> Error {
    match outcome {
        Outcome::Err(e) => e,
        other => panic!("expected an error, got {other:?}"),
    }
}

#![allow(dead_code)]

use seqtable::connection::run_isolated;
use seqtable::dialect::{DdlProvider, LockHintProvider, TypeNameProvider};
use seqtable::memory::MemoryConnection;
use seqtable::schema::execute_script;
use seqtable::{
    Connection, Dialect, IsolationDelegate, MemoryDatabase, QueryResult, Result, Statement, Value,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Reads without any lock hint, so concurrent transactions race on the update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLockDialect;

impl LockHintProvider for NoLockDialect {
    fn for_update_string(&self) -> &'static str {
        ""
    }
}
impl TypeNameProvider for NoLockDialect {}
impl DdlProvider for NoLockDialect {}

impl Dialect for NoLockDialect {
    fn name(&self) -> &'static str {
        "nolock"
    }
}

pub fn create_counter(db: &Arc<MemoryDatabase>, table: &str, initial: i64) {
    let mut conn = db.connect();
    execute_script(
        &mut conn,
        &[
            format!("create table {} ( next_val bigint )", table),
            format!("insert into {} values ( {} )", table, initial),
        ],
    )
    .unwrap();
}

pub fn row_value(db: &MemoryDatabase, table: &str) -> i64 {
    db.column_values(table).unwrap()[0]
}

/// Isolation delegate that records every statement it prepares and can run
/// competing autocommit statements right after a query executes.
pub struct ScriptedDelegate {
    db: Arc<MemoryDatabase>,
    statements: Mutex<Vec<String>>,
    interference: Mutex<VecDeque<String>>,
}

impl ScriptedDelegate {
    pub fn new(db: Arc<MemoryDatabase>) -> Arc<Self> {
        Arc::new(Self {
            db,
            statements: Mutex::new(Vec::new()),
            interference: Mutex::new(VecDeque::new()),
        })
    }

    /// Queue `sql` to run on another connection after the next query.
    pub fn interfere_after_next_query(&self, sql: &str) {
        self.interference.lock().unwrap().push_back(sql.to_string());
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    pub fn count_starting_with(&self, prefix: &str) -> usize {
        self.statements()
            .iter()
            .filter(|sql| sql.starts_with(prefix))
            .count()
    }
}

impl IsolationDelegate for ScriptedDelegate {
    fn delegate_work(
        &self,
        work: &mut dyn FnMut(&mut dyn Connection) -> Result<()>,
        transacted: bool,
    ) -> Result<()> {
        let mut conn = RecordingConnection {
            inner: self.db.connect(),
            delegate: self,
        };
        run_isolated(&mut conn, work, transacted)
    }
}

struct RecordingConnection<'d> {
    inner: MemoryConnection,
    delegate: &'d ScriptedDelegate,
}

impl Connection for RecordingConnection<'_> {
    fn prepare<'c>(&'c mut self, sql: &str) -> Result<Box<dyn Statement + 'c>> {
        self.delegate.statements.lock().unwrap().push(sql.to_string());
        let inner = self.inner.prepare(sql)?;
        Ok(Box::new(InterferingStatement {
            inner,
            delegate: self.delegate,
        }))
    }

    fn begin(&mut self) -> Result<()> {
        self.inner.begin()
    }

    fn commit(&mut self) -> Result<()> {
        self.inner.commit()
    }

    fn rollback(&mut self) -> Result<()> {
        self.inner.rollback()
    }

    fn is_in_transaction(&self) -> bool {
        self.inner.is_in_transaction()
    }
}

struct InterferingStatement<'c> {
    inner: Box<dyn Statement + 'c>,
    delegate: &'c ScriptedDelegate,
}

impl Statement for InterferingStatement<'_> {
    fn sql(&self) -> &str {
        self.inner.sql()
    }

    fn bind(&mut self, position: usize, value: Value) -> Result<()> {
        self.inner.bind(position, value)
    }

    fn execute_query(&mut self) -> Result<QueryResult> {
        let result = self.inner.execute_query()?;
        let competing = self.delegate.interference.lock().unwrap().pop_front();
        if let Some(sql) = competing {
            self.delegate.db.connect().execute(&sql)?;
        }
        Ok(result)
    }

    fn execute_update(&mut self) -> Result<u64> {
        self.inner.execute_update()
    }
}

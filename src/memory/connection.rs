use super::parser::{Filter, MemStatement, Operand, Projection, StatementParser};
use super::storage::{IntRow, MemTable, SchemaUndo, Storage};
use crate::connection::{Connection, IsolationDelegate, Statement, run_isolated};
use crate::core::{Result, SeqError, Value};
use crate::result::QueryResult;
use log::{debug, trace, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared state of an in-memory database.
///
/// Connections serialize on one mutex. Row locks are table-level: `FOR UPDATE`
/// reads and all writes inside a transaction hold the table until commit or
/// rollback, and everyone else waits on `released` up to the lock timeout.
pub struct MemoryDatabase {
    storage: Mutex<Storage>,
    released: Condvar,
    next_connection_id: AtomicU64,
    lock_timeout: Duration,
    parser: StatementParser,
}

impl MemoryDatabase {
    pub fn new() -> Arc<Self> {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            storage: Mutex::new(Storage::new()),
            released: Condvar::new(),
            next_connection_id: AtomicU64::new(1),
            lock_timeout,
            parser: StatementParser::new(),
        })
    }

    pub fn connect(self: &Arc<Self>) -> MemoryConnection {
        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        trace!("memory connection {} opened", id);
        MemoryConnection {
            db: Arc::clone(self),
            id,
            txn: None,
            closed: false,
        }
    }

    pub fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self.storage.lock()?.contains(table))
    }

    pub fn table_names(&self) -> Result<Vec<String>> {
        Ok(self.storage.lock()?.table_names())
    }

    /// Committed values of the first column of `table`.
    pub fn column_values(&self, table: &str) -> Result<Vec<i64>> {
        let storage = self.storage.lock()?;
        let rows = storage.table(table)?.visible_rows(COMMITTED_READER);
        Ok(rows.iter().filter_map(|row| row.first().copied()).collect())
    }

    /// Waits until no other connection holds the lock on `table`, then takes
    /// it for `owner` when `hold` is set.
    ///
    /// Returns the guard and whether the lock was newly taken.
    fn acquire<'g>(
        &'g self,
        mut storage: MutexGuard<'g, Storage>,
        table: &str,
        owner: u64,
        hold: bool,
    ) -> Result<(MutexGuard<'g, Storage>, bool)> {
        let deadline = Instant::now() + self.lock_timeout;
        loop {
            let holder = storage.table(table)?.locked_by();
            match holder {
                Some(holder) if holder != owner => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(SeqError::Lock(format!(
                            "timed out waiting for the lock on {} held by connection {}",
                            table, holder
                        )));
                    }
                    let (guard, _) = self.released.wait_timeout(storage, deadline - now)?;
                    storage = guard;
                }
                Some(_) => return Ok((storage, false)),
                None => {
                    if hold {
                        storage.table_mut(table)?.lock(owner);
                    }
                    return Ok((storage, hold));
                }
            }
        }
    }
}

// Connection ids start at 1.
const COMMITTED_READER: u64 = 0;

#[derive(Debug, Default)]
struct TxnState {
    locked: Vec<String>,
    schema_undo: Vec<SchemaUndo>,
}

enum Outcome {
    Rows(QueryResult),
    Count(u64),
}

pub struct MemoryConnection {
    db: Arc<MemoryDatabase>,
    id: u64,
    txn: Option<TxnState>,
    closed: bool,
}

impl MemoryConnection {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn database(&self) -> &Arc<MemoryDatabase> {
        &self.db
    }

    /// Rolls back any open transaction and refuses further work.
    pub fn close(&mut self) -> Result<()> {
        if self.txn.is_some() {
            self.finish(false)?;
        }
        self.closed = true;
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(SeqError::Connection(format!(
                "connection {} is closed",
                self.id
            )));
        }
        Ok(())
    }

    fn lock_for_write<'g>(
        &mut self,
        db: &'g MemoryDatabase,
        storage: MutexGuard<'g, Storage>,
        table: &str,
    ) -> Result<MutexGuard<'g, Storage>> {
        let (storage, newly_locked) = db.acquire(storage, table, self.id, self.txn.is_some())?;
        if newly_locked {
            if let Some(txn) = self.txn.as_mut() {
                txn.locked.push(table.to_string());
            }
        }
        Ok(storage)
    }

    fn run(&mut self, statement: &MemStatement, params: &[Option<Value>]) -> Result<Outcome> {
        self.ensure_open()?;
        let db = Arc::clone(&self.db);
        let storage = db.storage.lock()?;

        match statement {
            MemStatement::Select {
                table,
                projection,
                filter,
                for_update,
            } => {
                let storage = if *for_update {
                    self.lock_for_write(&db, storage, table)?
                } else {
                    storage
                };
                let result = select(storage.table(table)?, self.id, projection, filter, params)?;
                Ok(Outcome::Rows(result))
            }
            MemStatement::Insert { table, rows } => {
                let mut storage = self.lock_for_write(&db, storage, table)?;
                let target = storage.table_mut(table)?;
                let width = target.columns().len();
                let new_rows = rows
                    .iter()
                    .map(|row| {
                        if row.len() != width {
                            return Err(SeqError::Unsupported(format!(
                                "{} has {} columns but {} values were given",
                                table,
                                width,
                                row.len()
                            )));
                        }
                        row.iter().map(|op| resolve(op, params)).collect::<Result<IntRow>>()
                    })
                    .collect::<Result<Vec<IntRow>>>()?;
                let count = new_rows.len() as u64;
                target.rows_mut().extend(new_rows);
                Ok(Outcome::Count(count))
            }
            MemStatement::Update {
                table,
                assignments,
                filter,
            } => {
                // Wait out other writers, but only lock once a row actually matches.
                let (storage, _) = db.acquire(storage, table, self.id, false)?;
                let (assignments, filter) = {
                    let target = storage.table(table)?;
                    let assignments = assignments
                        .iter()
                        .map(|(column, op)| Ok((target.column_index(column)?, resolve(op, params)?)))
                        .collect::<Result<Vec<_>>>()?;
                    let filter = filter
                        .as_ref()
                        .map(|f| Ok::<_, SeqError>((target.column_index(&f.column)?, resolve(&f.value, params)?)))
                        .transpose()?;
                    (assignments, filter)
                };
                let matched = storage
                    .table(table)?
                    .visible_rows(self.id)
                    .iter()
                    .any(|row| filter.is_none_or(|(index, expected)| row[index] == expected));
                if !matched {
                    return Ok(Outcome::Count(0));
                }

                let mut storage = self.lock_for_write(&db, storage, table)?;
                let target = storage.table_mut(table)?;
                let mut count = 0u64;
                for row in target.rows_mut().iter_mut() {
                    if filter.is_none_or(|(index, expected)| row[index] == expected) {
                        for (index, value) in &assignments {
                            row[*index] = *value;
                        }
                        count += 1;
                    }
                }
                Ok(Outcome::Count(count))
            }
            MemStatement::CreateTable {
                table,
                columns,
                if_not_exists,
            } => {
                let mut storage = storage;
                if storage.contains(table) && *if_not_exists {
                    return Ok(Outcome::Count(0));
                }
                storage.create_table(table, columns.clone())?;
                if let Some(txn) = self.txn.as_mut() {
                    txn.schema_undo.push(SchemaUndo::Created(table.clone()));
                }
                Ok(Outcome::Count(0))
            }
            MemStatement::DropTable { table, if_exists } => {
                if !storage.contains(table) {
                    return if *if_exists {
                        Ok(Outcome::Count(0))
                    } else {
                        Err(SeqError::TableNotFound(table.clone()))
                    };
                }
                let mut storage = self.lock_for_write(&db, storage, table)?;
                let dropped = storage.drop_table(table)?;
                drop(storage);
                match self.txn.as_mut() {
                    Some(txn) => txn.schema_undo.push(SchemaUndo::Dropped(table.clone(), dropped)),
                    None => db.released.notify_all(),
                }
                Ok(Outcome::Count(0))
            }
        }
    }

    fn finish(&mut self, keep_changes: bool) -> Result<()> {
        let Some(txn) = self.txn.take() else {
            return Err(SeqError::Transaction("no active transaction".into()));
        };

        let mut storage = self.db.storage.lock()?;
        if !keep_changes {
            for change in txn.schema_undo.into_iter().rev() {
                storage.undo(change);
            }
        }
        for table in &txn.locked {
            if let Ok(table) = storage.table_mut(table) {
                table.release(self.id, keep_changes);
            }
        }
        drop(storage);
        self.db.released.notify_all();

        debug!(
            "memory connection {} {} ({} tables locked)",
            self.id,
            if keep_changes { "committed" } else { "rolled back" },
            txn.locked.len()
        );
        Ok(())
    }
}

impl Connection for MemoryConnection {
    fn prepare<'c>(&'c mut self, sql: &str) -> Result<Box<dyn Statement + 'c>> {
        self.ensure_open()?;
        let parsed = self.db.parser.parse(sql)?;
        Ok(Box::new(MemoryStatement {
            conn: self,
            sql: sql.to_string(),
            parsed,
            params: Vec::new(),
        }))
    }

    fn begin(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.txn.is_some() {
            return Err(SeqError::Transaction(
                "transaction already in progress".into(),
            ));
        }
        self.txn = Some(TxnState::default());
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.finish(true)
    }

    fn rollback(&mut self) -> Result<()> {
        if self.txn.is_none() {
            return Ok(());
        }
        self.finish(false)
    }

    fn is_in_transaction(&self) -> bool {
        self.txn.is_some()
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        if self.txn.is_some() {
            if let Err(err) = self.finish(false) {
                warn!("rollback of connection {} on drop failed: {}", self.id, err);
            }
        }
    }
}

pub struct MemoryStatement<'c> {
    conn: &'c mut MemoryConnection,
    sql: String,
    parsed: MemStatement,
    params: Vec<Option<Value>>,
}

impl MemoryStatement<'_> {
    fn run(&mut self) -> Result<Outcome> {
        trace!("connection {} executing [{}]", self.conn.id, self.sql);
        self.conn.run(&self.parsed, &self.params)
    }
}

impl Statement for MemoryStatement<'_> {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn bind(&mut self, position: usize, value: Value) -> Result<()> {
        if position == 0 {
            return Err(SeqError::Unsupported(
                "parameter positions start at 1".into(),
            ));
        }
        if self.params.len() < position {
            self.params.resize(position, None);
        }
        self.params[position - 1] = Some(value);
        Ok(())
    }

    fn execute_query(&mut self) -> Result<QueryResult> {
        match self.run()? {
            Outcome::Rows(result) => Ok(result),
            Outcome::Count(_) => Err(SeqError::Unsupported(format!(
                "statement does not return rows: {}",
                self.sql
            ))),
        }
    }

    fn execute_update(&mut self) -> Result<u64> {
        if self.parsed.returns_rows() {
            return Err(SeqError::Unsupported(format!(
                "query passed to execute_update: {}",
                self.sql
            )));
        }
        match self.run()? {
            Outcome::Count(count) => Ok(count),
            Outcome::Rows(result) => Ok(result.row_count() as u64),
        }
    }
}

/// Hands out a fresh connection per unit of work.
pub struct MemoryIsolationDelegate {
    db: Arc<MemoryDatabase>,
}

impl MemoryIsolationDelegate {
    pub fn new(db: Arc<MemoryDatabase>) -> Self {
        Self { db }
    }
}

impl IsolationDelegate for MemoryIsolationDelegate {
    fn delegate_work(
        &self,
        work: &mut dyn FnMut(&mut dyn Connection) -> Result<()>,
        transacted: bool,
    ) -> Result<()> {
        let mut conn = self.db.connect();
        run_isolated(&mut conn, work, transacted)
    }
}

fn resolve(operand: &Operand, params: &[Option<Value>]) -> Result<i64> {
    match operand {
        Operand::Literal(value) => Ok(*value),
        Operand::Param(position) => {
            let value = params
                .get(position - 1)
                .and_then(Option::as_ref)
                .ok_or_else(|| {
                    SeqError::Unsupported(format!("parameter {} is not bound", position))
                })?;
            value.as_i64().ok_or_else(|| {
                SeqError::TypeMismatch(format!(
                    "parameter {} must be an integer, got {}",
                    position,
                    value.type_name()
                ))
            })
        }
    }
}

fn select(
    table: &MemTable,
    reader: u64,
    projection: &[Projection],
    filter: &Option<Filter>,
    params: &[Option<Value>],
) -> Result<QueryResult> {
    let mut columns = Vec::new();
    let mut indices = Vec::new();
    for item in projection {
        match item {
            Projection::Wildcard => {
                for (index, name) in table.columns().iter().enumerate() {
                    columns.push(name.clone());
                    indices.push(index);
                }
            }
            Projection::Column { name, alias } => {
                indices.push(table.column_index(name)?);
                columns.push(alias.clone().unwrap_or_else(|| name.clone()));
            }
        }
    }

    let filter = filter
        .as_ref()
        .map(|f| Ok::<_, SeqError>((table.column_index(&f.column)?, resolve(&f.value, params)?)))
        .transpose()?;

    let rows = table
        .visible_rows(reader)
        .iter()
        .filter(|row| filter.is_none_or(|(index, expected)| row[index] == expected))
        .map(|row| indices.iter().map(|&i| Value::Integer(row[i])).collect())
        .collect();

    Ok(QueryResult::new(columns, rows))
}

//! A single-row table that emulates a database sequence.
//!
//! Each allocation reads the current value under a pessimistic lock hint and
//! publishes `value + delta` with `update .. where value = old`. The lock hint
//! only avoids contention; the row count of the conditional update decides
//! whether the read value was really claimed. A zero count means another
//! transaction moved the row first and the read is repeated.

use super::{AccessCallback, DatabaseStructure, RetryPolicy, retry_until_allocated};
use crate::connection::{Connection, Statement, delegate};
use crate::core::{Identifier, IntegralValue, NumberType, QualifiedName, Result, SeqError};
use crate::dialect::{Dialect, LockMode};
use crate::optimizer::Optimizer;
use crate::result::QueryResult;
use crate::schema::{Column, Database, InitCommand};
use crate::session::Session;
use log::{error, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;
use tracing::{Level, event, info_span};

pub struct TableStructure {
    qualified_table_name: QualifiedName,
    table_name_text: String,
    value_column_name_text: String,
    initial_value: i64,
    increment_size: i64,
    number_type: NumberType,
    select_query: String,
    update_query: String,
    retry_policy: RetryPolicy,
    apply_increment_to_source: AtomicBool,
    access_counter: AtomicU64,
}

impl TableStructure {
    pub fn new(
        dialect: &dyn Dialect,
        qualified_table_name: QualifiedName,
        value_column: &Identifier,
        initial_value: i64,
        increment_size: i64,
        number_type: NumberType,
    ) -> Result<Self> {
        if increment_size < 1 {
            return Err(SeqError::Configuration(format!(
                "increment size must be positive, got {}",
                increment_size
            )));
        }
        if !number_type.contains(initial_value) {
            return Err(SeqError::Configuration(format!(
                "initial value {} does not fit in a {}",
                initial_value, number_type
            )));
        }

        let table_name_text = qualified_table_name.render(dialect);
        let value_column_name_text = value_column.render(dialect);

        let select_query = format!(
            "select {} as id_val from {}{}",
            value_column_name_text,
            dialect.append_lock_hint(LockMode::PessimisticWrite, &table_name_text),
            dialect.for_update_string()
        );
        let update_query = format!(
            "update {} set {}= ? where {}=?",
            table_name_text, value_column_name_text, value_column_name_text
        );

        Ok(Self {
            qualified_table_name,
            table_name_text,
            value_column_name_text,
            initial_value,
            increment_size,
            number_type,
            select_query,
            update_query,
            retry_policy: RetryPolicy::default(),
            apply_increment_to_source: AtomicBool::new(false),
            access_counter: AtomicU64::new(0),
        })
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn qualified_table_name(&self) -> &QualifiedName {
        &self.qualified_table_name
    }

    pub fn value_column_name(&self) -> &str {
        &self.value_column_name_text
    }

    pub fn number_type(&self) -> NumberType {
        self.number_type
    }

    pub fn select_query(&self) -> &str {
        &self.select_query
    }

    pub fn update_query(&self) -> &str {
        &self.update_query
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    pub fn applies_increment_to_source(&self) -> bool {
        self.apply_increment_to_source.load(Ordering::Acquire)
    }

    /// Amount the stored value advances per allocation.
    pub fn source_delta(&self) -> i64 {
        if self.applies_increment_to_source() {
            self.increment_size
        } else {
            1
        }
    }

    fn seed_statement(&self) -> String {
        format!(
            "insert into {} values ( {} )",
            self.table_name_text, self.initial_value
        )
    }

    /// Runs the read/compare-and-swap loop on `conn` and returns the claimed value.
    ///
    /// `conn` should already be inside the transaction the allocation commits
    /// with; see [`TableStructure::build_callback`].
    pub fn allocate(&self, conn: &mut dyn Connection, session: &Session) -> Result<IntegralValue> {
        let span = info_span!(
            "seqtable.allocate",
            table = %self.table_name_text,
            tenant = ?session.tenant_identifier()
        );
        let _enter = span.enter();

        let delta = self.source_delta();
        let value = retry_until_allocated(self.retry_policy, &self.table_name_text, |_| {
            let current = self.read_current(&mut *conn, session)?;
            let advanced = self.try_advance(&mut *conn, session, current, delta)?;
            Ok(advanced.map(|_| current))
        })?;

        self.access_counter.fetch_add(1, Ordering::Relaxed);
        event!(Level::DEBUG, value = value.value(), "allocated counter value");
        Ok(value)
    }

    fn read_current(&self, conn: &mut dyn Connection, session: &Session) -> Result<IntegralValue> {
        let result = prepare_statement(conn, &self.select_query, session)
            .and_then(|mut statement| execute_query(statement.as_mut(), session))
            .map_err(|err| {
                error!(
                    "could not read a hi value from {} [{}]: {}",
                    self.table_name_text, self.select_query, err
                );
                SeqError::sql(&self.select_query, err)
            })?;

        let Some(raw) = result.first_value() else {
            let err = SeqError::TableNotInitialized {
                table: self.table_name_text.clone(),
            };
            error!("{}", err);
            return Err(err);
        };
        IntegralValue::from_value(raw, self.number_type)
    }

    /// Publishes `current + delta` if the row still holds `current`.
    ///
    /// Returns the new value, or `None` when another transaction got there first.
    fn try_advance(
        &self,
        conn: &mut dyn Connection,
        session: &Session,
        current: IntegralValue,
        delta: i64,
    ) -> Result<Option<IntegralValue>> {
        let next = current.add(delta)?;

        let rows = prepare_statement(conn, &self.update_query, session)
            .and_then(|mut statement| {
                statement.bind(1, next.to_value())?;
                statement.bind(2, current.to_value())?;
                execute_update(statement.as_mut(), session)
            })
            .map_err(|err| {
                error!(
                    "unable to update hi value in table {} [{}]: {}",
                    self.table_name_text, self.update_query, err
                );
                SeqError::sql(&self.update_query, err)
            })?;

        match rows {
            0 => Ok(None),
            1 => Ok(Some(next)),
            n => {
                warn!(
                    "{} rows in {} held value {}; the table should have exactly one",
                    n, self.table_name_text, current
                );
                Ok(Some(next))
            }
        }
    }
}

impl DatabaseStructure for TableStructure {
    fn name(&self) -> &str {
        &self.table_name_text
    }

    fn initial_value(&self) -> i64 {
        self.initial_value
    }

    fn increment_size(&self) -> i64 {
        self.increment_size
    }

    fn times_accessed(&self) -> u64 {
        self.access_counter.load(Ordering::Relaxed)
    }

    fn prepare(&self, optimizer: &dyn Optimizer) {
        self.apply_increment_to_source.store(
            optimizer.apply_increment_size_to_source_values(),
            Ordering::Release,
        );
    }

    fn build_callback<'s>(&'s self, session: &'s Session) -> Box<dyn AccessCallback + 's> {
        Box::new(TableAccessCallback {
            structure: self,
            session,
        })
    }

    fn sql_create_strings(&self, dialect: &dyn Dialect) -> Vec<String> {
        vec![
            format!(
                "{} {} ( {} {} )",
                dialect.create_table_string(),
                self.table_name_text,
                self.value_column_name_text,
                dialect.type_name(NumberType::Long)
            ),
            self.seed_statement(),
        ]
    }

    fn sql_drop_strings(&self, dialect: &dyn Dialect) -> Vec<String> {
        vec![dialect.drop_table_string(&self.table_name_text)]
    }

    fn is_physical_sequence(&self) -> bool {
        false
    }

    fn register_exportables(&self, database: &mut Database) {
        let namespace = database.locate_namespace(
            self.qualified_table_name.catalog(),
            self.qualified_table_name.schema(),
        );
        if namespace
            .locate_table(self.qualified_table_name.object())
            .is_some()
        {
            return;
        }

        namespace
            .create_table(self.qualified_table_name.object().clone())
            .add_column(Column::new(&self.value_column_name_text, NumberType::Long));
        database.add_init_command(InitCommand::new(self.seed_statement()));
    }
}

/// Allocates through the session's isolation delegate in its own transaction.
pub struct TableAccessCallback<'s> {
    structure: &'s TableStructure,
    session: &'s Session,
}

impl AccessCallback for TableAccessCallback<'_> {
    fn next_value(&self) -> Result<IntegralValue> {
        delegate(self.session.isolation_delegate(), true, |conn| {
            self.structure.allocate(conn, self.session)
        })
    }

    fn tenant_identifier(&self) -> Option<&str> {
        self.session.tenant_identifier()
    }
}

fn prepare_statement<'c>(
    conn: &'c mut dyn Connection,
    sql: &str,
    session: &Session,
) -> Result<Box<dyn Statement + 'c>> {
    session.sql_statement_logger().log_statement(sql);
    let listener = session.event_listener();
    listener.prepare_statement_start();
    let statement = conn.prepare(sql);
    listener.prepare_statement_end();
    statement
}

fn execute_query(statement: &mut dyn Statement, session: &Session) -> Result<QueryResult> {
    let listener = session.event_listener();
    listener.execute_statement_start();
    let started = Instant::now();
    let result = statement.execute_query();
    listener.execute_statement_end(started.elapsed());
    result
}

fn execute_update(statement: &mut dyn Statement, session: &Session) -> Result<u64> {
    let listener = session.event_listener();
    listener.execute_statement_start();
    let started = Instant::now();
    let rows = statement.execute_update();
    listener.execute_statement_end(started.elapsed());
    rows
}

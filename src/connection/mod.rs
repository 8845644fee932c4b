pub mod isolation;

use crate::core::{Result, Value};
use crate::result::QueryResult;

pub use isolation::{IsolationDelegate, delegate, run_isolated};

/// A live database connection.
///
/// Mirrors the small part of a postgres-style driver the counter table
/// needs: prepared statements with positional parameters, and explicit
/// transaction control.
pub trait Connection {
    /// Prepare `sql`. The statement is released when the returned box drops.
    fn prepare<'c>(&'c mut self, sql: &str) -> Result<Box<dyn Statement + 'c>>;

    fn begin(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    fn is_in_transaction(&self) -> bool;

    /// Execute a parameterless statement, returning the affected row count.
    fn execute(&mut self, sql: &str) -> Result<u64> {
        let mut statement = self.prepare(sql)?;
        statement.execute_update()
    }

    /// Run a parameterless query.
    fn query(&mut self, sql: &str) -> Result<QueryResult> {
        let mut statement = self.prepare(sql)?;
        statement.execute_query()
    }
}

/// A prepared statement. Parameter positions are 1-based.
pub trait Statement {
    fn sql(&self) -> &str;

    fn bind(&mut self, position: usize, value: Value) -> Result<()>;

    fn execute_query(&mut self) -> Result<QueryResult>;

    fn execute_update(&mut self) -> Result<u64>;
}

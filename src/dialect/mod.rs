//! SQL text the counter table needs from a database vendor.
//!
//! The capabilities are split into three small traits so a backend only has to
//! override what differs from the defaults; [`Dialect`] bundles them.

use crate::core::{NumberType, Result, SeqError};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    None,
    PessimisticRead,
    PessimisticWrite,
}

/// Row-locking syntax for reads.
pub trait LockHintProvider {
    /// Returns the table reference decorated with any inline lock hint.
    fn append_lock_hint(&self, _mode: LockMode, table: &str) -> String {
        table.to_string()
    }

    /// Clause appended to a locking SELECT, including the leading space.
    fn for_update_string(&self) -> &'static str {
        " for update"
    }
}

/// Column type names.
pub trait TypeNameProvider {
    fn type_name(&self, number_type: NumberType) -> &'static str {
        match number_type {
            NumberType::Short => "smallint",
            NumberType::Integer => "integer",
            NumberType::Long => "bigint",
        }
    }
}

/// DDL statement fragments and identifier quoting.
pub trait DdlProvider {
    fn create_table_string(&self) -> &'static str {
        "create table"
    }

    fn drop_table_string(&self, table: &str) -> String {
        format!("drop table {}", table)
    }

    fn open_quote(&self) -> char {
        '"'
    }

    fn close_quote(&self) -> char {
        '"'
    }
}

pub trait Dialect: LockHintProvider + TypeNameProvider + DdlProvider + Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;
}

/// ANSI-ish defaults: `for update` locking, double-quoted identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericDialect;

impl LockHintProvider for GenericDialect {}
impl TypeNameProvider for GenericDialect {}
impl DdlProvider for GenericDialect {}

impl Dialect for GenericDialect {
    fn name(&self) -> &'static str {
        "generic"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgreSqlDialect;

impl LockHintProvider for PostgreSqlDialect {}
impl TypeNameProvider for PostgreSqlDialect {
    fn type_name(&self, number_type: NumberType) -> &'static str {
        match number_type {
            NumberType::Short => "int2",
            NumberType::Integer => "int4",
            NumberType::Long => "int8",
        }
    }
}

impl DdlProvider for PostgreSqlDialect {
    fn drop_table_string(&self, table: &str) -> String {
        format!("drop table if exists {} cascade", table)
    }
}

impl Dialect for PostgreSqlDialect {
    fn name(&self) -> &'static str {
        "postgresql"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl LockHintProvider for MySqlDialect {}
impl TypeNameProvider for MySqlDialect {}

impl DdlProvider for MySqlDialect {
    fn drop_table_string(&self, table: &str) -> String {
        format!("drop table if exists {}", table)
    }

    fn open_quote(&self) -> char {
        '`'
    }

    fn close_quote(&self) -> char {
        '`'
    }
}

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }
}

/// Locks through inline table hints; there is no `for update` clause.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerDialect;

impl LockHintProvider for SqlServerDialect {
    fn append_lock_hint(&self, mode: LockMode, table: &str) -> String {
        match mode {
            LockMode::PessimisticWrite => format!("{} with (updlock, rowlock)", table),
            LockMode::PessimisticRead => format!("{} with (holdlock, rowlock)", table),
            LockMode::None => table.to_string(),
        }
    }

    fn for_update_string(&self) -> &'static str {
        ""
    }
}

impl TypeNameProvider for SqlServerDialect {
    fn type_name(&self, number_type: NumberType) -> &'static str {
        match number_type {
            NumberType::Short => "smallint",
            NumberType::Integer => "int",
            NumberType::Long => "bigint",
        }
    }
}

impl DdlProvider for SqlServerDialect {
    fn open_quote(&self) -> char {
        '['
    }

    fn close_quote(&self) -> char {
        ']'
    }
}

impl Dialect for SqlServerDialect {
    fn name(&self) -> &'static str {
        "sqlserver"
    }
}

lazy_static! {
    static ref DIALECTS: HashMap<&'static str, Arc<dyn Dialect>> = {
        let mut m: HashMap<&'static str, Arc<dyn Dialect>> = HashMap::new();
        m.insert("generic", Arc::new(GenericDialect));
        m.insert("postgres", Arc::new(PostgreSqlDialect));
        m.insert("postgresql", Arc::new(PostgreSqlDialect));
        m.insert("mysql", Arc::new(MySqlDialect));
        m.insert("mariadb", Arc::new(MySqlDialect));
        m.insert("sqlserver", Arc::new(SqlServerDialect));
        m.insert("mssql", Arc::new(SqlServerDialect));
        m
    };
}

/// Looks a dialect up by (case-insensitive) name.
pub fn resolve(name: &str) -> Result<Arc<dyn Dialect>> {
    DIALECTS
        .get(name.trim().to_ascii_lowercase().as_str())
        .cloned()
        .ok_or_else(|| SeqError::Configuration(format!("Unknown dialect '{}'", name)))
}

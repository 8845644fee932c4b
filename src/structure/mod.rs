//! Database structures that hand out source values to optimizers.

pub mod retry;
pub mod table;

use crate::core::{IntegralValue, Result};
use crate::dialect::Dialect;
use crate::optimizer::Optimizer;
use crate::schema::Database;
use crate::session::Session;

pub use retry::{RetryPolicy, retry_until_allocated};
pub use table::TableStructure;

/// One session's handle for pulling values out of a structure.
pub trait AccessCallback {
    /// Allocates the next source value.
    fn next_value(&self) -> Result<IntegralValue>;

    fn tenant_identifier(&self) -> Option<&str>;
}

/// A durable source of unique integral values.
pub trait DatabaseStructure: Send + Sync {
    /// Rendered name of the underlying object.
    fn name(&self) -> &str;

    fn initial_value(&self) -> i64;

    fn increment_size(&self) -> i64;

    /// How many values have been allocated through this structure.
    fn times_accessed(&self) -> u64;

    /// Lets the consuming optimizer choose how far each allocation advances.
    fn prepare(&self, optimizer: &dyn Optimizer);

    fn build_callback<'s>(&'s self, session: &'s Session) -> Box<dyn AccessCallback + 's>;

    fn sql_create_strings(&self, dialect: &dyn Dialect) -> Vec<String>;

    fn sql_drop_strings(&self, dialect: &dyn Dialect) -> Vec<String>;

    /// False for emulations such as a counter table.
    fn is_physical_sequence(&self) -> bool;

    fn register_exportables(&self, database: &mut Database);
}

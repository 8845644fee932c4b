pub mod config;

use crate::core::{IntegralValue, Result};
use crate::dialect::Dialect;
use crate::optimizer::{Optimizer, OptimizerKind};
use crate::schema::Database;
use crate::session::Session;
use crate::structure::{DatabaseStructure, TableStructure};
use tracing::{Level, event, info_span};

pub use config::GeneratorConfig;

/// Identifier generator backed by a counter table.
pub struct TableSequenceGenerator {
    structure: TableStructure,
    optimizer: Box<dyn Optimizer>,
    optimizer_kind: OptimizerKind,
}

impl TableSequenceGenerator {
    pub fn configure(config: &GeneratorConfig, dialect: &dyn Dialect) -> Result<Self> {
        config.validate()?;

        let structure = TableStructure::new(
            dialect,
            config.qualified_table_name()?,
            &config.value_column_identifier()?,
            config.initial_value,
            config.increment_size,
            config.number_type,
        )?
        .with_retry_policy(config.retry);

        let optimizer_kind = config.optimizer_kind();
        let optimizer = optimizer_kind.build(
            config.number_type,
            config.increment_size,
            Some(config.initial_value),
        )?;
        structure.prepare(optimizer.as_ref());

        event!(
            Level::DEBUG,
            table = %structure.name(),
            optimizer = %optimizer_kind,
            increment = config.increment_size,
            "configured table sequence generator"
        );

        Ok(Self {
            structure,
            optimizer,
            optimizer_kind,
        })
    }

    /// Produces the next identifier for `session`.
    pub fn generate(&self, session: &Session) -> Result<IntegralValue> {
        let span = info_span!(
            "seqtable.generate",
            table = %self.structure.name(),
            optimizer = %self.optimizer_kind
        );
        let _enter = span.enter();

        let callback = self.structure.build_callback(session);
        self.optimizer.generate(callback.as_ref())
    }

    pub fn structure(&self) -> &TableStructure {
        &self.structure
    }

    pub fn optimizer(&self) -> &dyn Optimizer {
        self.optimizer.as_ref()
    }

    pub fn optimizer_kind(&self) -> OptimizerKind {
        self.optimizer_kind
    }

    pub fn register_exportables(&self, database: &mut Database) {
        self.structure.register_exportables(database);
    }

    pub fn sql_create_strings(&self, dialect: &dyn Dialect) -> Vec<String> {
        self.structure.sql_create_strings(dialect)
    }

    pub fn sql_drop_strings(&self, dialect: &dyn Dialect) -> Vec<String> {
        self.structure.sql_drop_strings(dialect)
    }
}

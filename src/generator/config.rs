use crate::core::{Identifier, NumberType, QualifiedName, Result, SeqError};
use crate::optimizer::OptimizerKind;
use crate::structure::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_TABLE_NAME: &str = "id_sequence";
pub const DEFAULT_VALUE_COLUMN: &str = "next_val";

/// Settings for a table-backed sequence generator.
///
/// Deserializes from JSON (missing fields take their defaults) or is built
/// from a flat key/value parameter map with [`GeneratorConfig::from_properties`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Table name, optionally qualified as `schema.table` or `catalog.schema.table`
    pub table_name: String,

    /// Catalog applied when `table_name` does not name one
    pub catalog: Option<String>,

    /// Schema applied when `table_name` does not name one
    pub schema: Option<String>,

    pub value_column: String,

    /// Value the table is seeded with
    pub initial_value: i64,

    /// Identifiers per block
    pub increment_size: i64,

    pub number_type: NumberType,

    /// Block policy; chosen from the increment size when unset
    pub optimizer: Option<OptimizerKind>,

    pub retry: RetryPolicy,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            catalog: None,
            schema: None,
            value_column: DEFAULT_VALUE_COLUMN.to_string(),
            initial_value: 1,
            increment_size: 1,
            number_type: NumberType::Long,
            optimizer: None,
            retry: RetryPolicy::Unbounded,
        }
    }
}

impl GeneratorConfig {
    pub fn new(table_name: &str) -> Self {
        Self {
            table_name: table_name.to_string(),
            ..Self::default()
        }
    }

    pub fn value_column(mut self, column: &str) -> Self {
        self.value_column = column.to_string();
        self
    }

    pub fn initial_value(mut self, initial_value: i64) -> Self {
        self.initial_value = initial_value;
        self
    }

    pub fn increment_size(mut self, increment_size: i64) -> Self {
        self.increment_size = increment_size;
        self
    }

    pub fn number_type(mut self, number_type: NumberType) -> Self {
        self.number_type = number_type;
        self
    }

    pub fn optimizer(mut self, kind: OptimizerKind) -> Self {
        self.optimizer = Some(kind);
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn schema(mut self, schema: &str) -> Self {
        self.schema = Some(schema.to_string());
        self
    }

    pub fn catalog(mut self, catalog: &str) -> Self {
        self.catalog = Some(catalog.to_string());
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SeqError::Configuration(format!("invalid generator config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads generator parameters such as `table_name`, `increment_size` and
    /// `optimizer`. Unknown keys are ignored.
    pub fn from_properties(props: &HashMap<String, String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(name) = props.get("table_name").or_else(|| props.get("sequence_name")) {
            config.table_name = name.clone();
        }
        if let Some(column) = props.get("value_column") {
            config.value_column = column.clone();
        }
        if let Some(catalog) = props.get("catalog") {
            config.catalog = Some(catalog.clone());
        }
        if let Some(schema) = props.get("schema") {
            config.schema = Some(schema.clone());
        }
        if let Some(raw) = props.get("initial_value") {
            config.initial_value = parse_number("initial_value", raw)?;
        }
        if let Some(raw) = props.get("increment_size") {
            config.increment_size = parse_number("increment_size", raw)?;
        }
        if let Some(raw) = props.get("number_type") {
            config.number_type = raw.parse()?;
        }
        if let Some(raw) = props.get("optimizer") {
            config.optimizer = Some(raw.parse()?);
        }
        if let Some(raw) = props.get("max_retries") {
            let max_attempts = parse_number("max_retries", raw)?;
            let max_attempts = u32::try_from(max_attempts).map_err(|_| {
                SeqError::Configuration(format!("max_retries out of range: {}", raw))
            })?;
            config.retry = RetryPolicy::Bounded { max_attempts };
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.increment_size < 1 {
            return Err(SeqError::Configuration(format!(
                "increment_size must be at least 1, got {}",
                self.increment_size
            )));
        }
        if !self.number_type.contains(self.initial_value) {
            return Err(SeqError::Configuration(format!(
                "initial_value {} does not fit in a {}",
                self.initial_value, self.number_type
            )));
        }
        self.retry.validate()?;
        self.qualified_table_name()?;
        self.value_column_identifier()?;
        Ok(())
    }

    /// Optimizer to use, falling back to the increment-based default.
    pub fn optimizer_kind(&self) -> OptimizerKind {
        self.optimizer
            .unwrap_or_else(|| OptimizerKind::default_for(self.increment_size))
    }

    pub fn qualified_table_name(&self) -> Result<QualifiedName> {
        let parsed = QualifiedName::parse(&self.table_name)?;
        if parsed.schema().is_some() {
            return Ok(parsed);
        }

        let catalog = self.catalog.as_deref().map(Identifier::parse).transpose()?;
        let schema = self.schema.as_deref().map(Identifier::parse).transpose()?;
        Ok(QualifiedName::new(catalog, schema, parsed.object().clone()))
    }

    pub fn value_column_identifier(&self) -> Result<Identifier> {
        Identifier::parse(&self.value_column)
    }
}

fn parse_number(key: &str, raw: &str) -> Result<i64> {
    raw.trim()
        .parse()
        .map_err(|_| SeqError::Configuration(format!("{} must be an integer, got '{}'", key, raw)))
}

use thiserror::Error;

/// Boxed error coming from a database driver.
pub type SourceError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum SeqError {
    #[error("could not read a hi value - you need to populate the table: {table}")]
    TableNotInitialized { table: String },

    #[error("SQL error executing [{statement}]: {source}")]
    Sql {
        statement: String,
        #[source]
        source: SourceError,
    },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Integral overflow: {0}")]
    Overflow(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Gave up allocating from '{table}' after {attempts} attempts")]
    RetriesExhausted { table: String, attempts: u32 },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Table '{0}' already exists")]
    TableExists(String),

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Lock error: {0}")]
    Lock(String),
}

impl SeqError {
    /// Wraps a driver error together with the statement that raised it.
    pub fn sql<E>(statement: impl Into<String>, source: E) -> Self
    where
        E: Into<SourceError>,
    {
        Self::Sql {
            statement: statement.into(),
            source: source.into(),
        }
    }

    /// True for failures caused by missing seed data rather than the database.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::TableNotInitialized { .. } | Self::Configuration(_))
    }
}

pub type Result<T> = std::result::Result<T, SeqError>;

impl<T> From<std::sync::PoisonError<T>> for SeqError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Lock(err.to_string())
    }
}

pub mod statistics;

use crate::connection::IsolationDelegate;
use log::debug;
use std::fmt;
use std::sync::Arc;

pub use statistics::{NoopListener, SessionEventListener, StatementStatistics};

/// Per-caller context an allocation runs under.
///
/// Carries the isolation delegate explicitly instead of relying on an ambient
/// transaction, plus the observability hooks and the tenant identifier.
#[derive(Clone)]
pub struct Session {
    isolation: Arc<dyn IsolationDelegate>,
    tenant_identifier: Option<String>,
    statement_logger: SqlStatementLogger,
    listener: Arc<dyn SessionEventListener>,
}

impl Session {
    pub fn new(isolation: Arc<dyn IsolationDelegate>) -> Self {
        Self {
            isolation,
            tenant_identifier: None,
            statement_logger: SqlStatementLogger::default(),
            listener: Arc::new(NoopListener),
        }
    }

    pub fn tenant(mut self, tenant: &str) -> Self {
        self.tenant_identifier = Some(tenant.to_string());
        self
    }

    pub fn statement_logger(mut self, logger: SqlStatementLogger) -> Self {
        self.statement_logger = logger;
        self
    }

    pub fn listener(mut self, listener: Arc<dyn SessionEventListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn isolation_delegate(&self) -> &dyn IsolationDelegate {
        self.isolation.as_ref()
    }

    pub fn tenant_identifier(&self) -> Option<&str> {
        self.tenant_identifier.as_deref()
    }

    pub fn sql_statement_logger(&self) -> &SqlStatementLogger {
        &self.statement_logger
    }

    pub fn event_listener(&self) -> &dyn SessionEventListener {
        self.listener.as_ref()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("tenant_identifier", &self.tenant_identifier)
            .field("statement_logger", &self.statement_logger)
            .finish_non_exhaustive()
    }
}

/// Logs SQL text before it is prepared.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlStatementLogger {
    log_to_stdout: bool,
    format_sql: bool,
}

impl SqlStatementLogger {
    pub fn new(log_to_stdout: bool, format_sql: bool) -> Self {
        Self {
            log_to_stdout,
            format_sql,
        }
    }

    pub fn log_statement(&self, sql: &str) {
        let text = if self.format_sql {
            format_basic(sql)
        } else {
            sql.to_string()
        };
        debug!(target: "seqtable::sql", "{}", text);
        if self.log_to_stdout {
            println!("SQL: {}", text);
        }
    }
}

const BREAK_BEFORE: [&str; 4] = ["from", "where", "set", "values"];

/// Puts each major clause on its own indented line.
fn format_basic(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 16);
    out.push_str("\n    ");
    for (i, word) in sql.split_whitespace().enumerate() {
        if i > 0 {
            if BREAK_BEFORE.contains(&word.to_ascii_lowercase().as_str()) {
                out.push_str("\n    ");
            } else {
                out.push(' ');
            }
        }
        out.push_str(word);
    }
    out
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Hooks fired around statement preparation and execution.
///
/// The caller times each execution and reports it to `execute_statement_end`.
pub trait SessionEventListener: Send + Sync {
    fn prepare_statement_start(&self) {}
    fn prepare_statement_end(&self) {}
    fn execute_statement_start(&self) {}
    fn execute_statement_end(&self, _elapsed: Duration) {}
}

#[derive(Debug, Default)]
pub struct NoopListener;

impl SessionEventListener for NoopListener {}

/// Counts statements and accumulates the time spent executing them.
#[derive(Debug, Default)]
pub struct StatementStatistics {
    prepared: AtomicU64,
    executed: AtomicU64,
    execution_nanos: AtomicU64,
}

impl StatementStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prepared_count(&self) -> u64 {
        self.prepared.load(Ordering::Relaxed)
    }

    pub fn executed_count(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }

    pub fn execution_time(&self) -> Duration {
        Duration::from_nanos(self.execution_nanos.load(Ordering::Relaxed))
    }
}

impl SessionEventListener for StatementStatistics {
    fn prepare_statement_end(&self) {
        self.prepared.fetch_add(1, Ordering::Relaxed);
    }

    fn execute_statement_end(&self, elapsed: Duration) {
        self.executed.fetch_add(1, Ordering::Relaxed);
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.execution_nanos.fetch_add(nanos, Ordering::Relaxed);
    }
}

use crate::core::{Result, SeqError};
use serde::{Deserialize, Serialize};
use tracing::{Level, event};

/// How often a lost compare-and-swap may be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RetryPolicy {
    /// Retry until the update wins; progress relies on the database lock manager.
    #[default]
    Unbounded,
    /// Give up with [`SeqError::RetriesExhausted`] after `max_attempts` losses.
    Bounded { max_attempts: u32 },
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Bounded { max_attempts: 0 } => Err(SeqError::Configuration(
                "retry policy needs at least one attempt".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// Calls `attempt` until it yields a value.
///
/// `Ok(None)` means the attempt lost a race and is retried; any error ends the
/// loop immediately.
pub fn retry_until_allocated<T, F>(policy: RetryPolicy, table: &str, mut attempt: F) -> Result<T>
where
    F: FnMut(u32) -> Result<Option<T>>,
{
    let mut attempts: u32 = 0;
    loop {
        attempts = attempts.saturating_add(1);
        if let Some(value) = attempt(attempts)? {
            return Ok(value);
        }

        if let RetryPolicy::Bounded { max_attempts } = policy {
            if attempts >= max_attempts {
                event!(Level::WARN, table = %table, attempts, "giving up on contended counter");
                return Err(SeqError::RetriesExhausted {
                    table: table.to_string(),
                    attempts,
                });
            }
        }
        event!(Level::DEBUG, table = %table, attempts, "counter update lost a race, retrying");
    }
}

use super::Connection;
use crate::core::{Result, SeqError};
use log::warn;

/// Runs a unit of work on a connection isolated from the caller's transaction.
///
/// With `transacted = true` the work gets its own transaction which commits on
/// success and rolls back on failure, so whatever it wrote outlives a later
/// rollback of the calling transaction.
pub trait IsolationDelegate: Send + Sync {
    fn delegate_work(
        &self,
        work: &mut dyn FnMut(&mut dyn Connection) -> Result<()>,
        transacted: bool,
    ) -> Result<()>;
}

/// Typed wrapper over [`IsolationDelegate::delegate_work`].
pub fn delegate<T, F>(isolation: &dyn IsolationDelegate, transacted: bool, mut work: F) -> Result<T>
where
    F: FnMut(&mut dyn Connection) -> Result<T>,
{
    let mut output = None;
    isolation.delegate_work(
        &mut |conn| {
            output = Some(work(conn)?);
            Ok(())
        },
        transacted,
    )?;
    output.ok_or_else(|| SeqError::Transaction("isolated work did not run".into()))
}

/// Wraps `work` in begin/commit on `conn`, rolling back when it fails.
///
/// Delegates that own a dedicated connection use this to implement
/// [`IsolationDelegate`].
pub fn run_isolated(
    conn: &mut dyn Connection,
    work: &mut dyn FnMut(&mut dyn Connection) -> Result<()>,
    transacted: bool,
) -> Result<()> {
    if !transacted {
        return work(conn);
    }

    if conn.is_in_transaction() {
        return Err(SeqError::Transaction(
            "isolated work needs a connection without an active transaction".into(),
        ));
    }

    conn.begin()?;
    match work(conn) {
        Ok(()) => conn.commit(),
        Err(err) => {
            if let Err(rollback_err) = conn.rollback() {
                warn!("rollback after failed isolated work also failed: {}", rollback_err);
            }
            Err(err)
        }
    }
}

//! In-memory SQL backend.
//!
//! Understands exactly the statements a counter table needs, with real
//! transactions, table-level write locks and read-committed visibility, so
//! the allocation protocol can be exercised without an external database.

pub mod connection;
pub mod parser;
pub mod storage;

pub use connection::{
    DEFAULT_LOCK_TIMEOUT, MemoryConnection, MemoryDatabase, MemoryIsolationDelegate,
    MemoryStatement,
};
pub use parser::{MemStatement, StatementParser};

// ============================================================================
// seqtable
// ============================================================================
//
// Sequence emulation on top of a one-row counter table. Values are claimed by
// reading the row under a lock hint and publishing the advanced value with a
// conditional update, each allocation in its own isolated transaction.

pub mod connection;
pub mod core;
pub mod dialect;
pub mod generator;
pub mod memory;
pub mod optimizer;
pub mod result;
pub mod schema;
pub mod session;
pub mod structure;

pub use connection::{Connection, IsolationDelegate, Statement};
pub use core::{Identifier, IntegralValue, NumberType, QualifiedName, Result, SeqError, Value};
pub use dialect::Dialect;
pub use generator::{GeneratorConfig, TableSequenceGenerator};
pub use memory::{MemoryDatabase, MemoryIsolationDelegate};
pub use optimizer::{Optimizer, OptimizerKind};
pub use result::QueryResult;
pub use schema::Database;
pub use session::Session;
pub use structure::{AccessCallback, DatabaseStructure, RetryPolicy, TableStructure};

pub mod error;
pub mod types;
pub mod value;

pub use error::{Result, SeqError, SourceError};
pub use types::{Identifier, NumberType, QualifiedName};
pub use value::{IntegralValue, Value};

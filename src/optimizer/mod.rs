//! Policies turning source values into identifier values.
//!
//! An optimizer decides how many identifiers each database round trip yields
//! and, through [`Optimizer::apply_increment_size_to_source_values`], how far
//! the structure advances its stored value per allocation.

pub mod hilo;
pub mod noop;
pub mod pooled;

use crate::core::{IntegralValue, NumberType, Result, SeqError};
use crate::structure::AccessCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use hilo::HiLoOptimizer;
pub use noop::NoopOptimizer;
pub use pooled::PooledOptimizer;

pub trait Optimizer: Send + Sync {
    /// Produces the next identifier, pulling source values from `callback` as needed.
    fn generate(&self, callback: &dyn AccessCallback) -> Result<IntegralValue>;

    /// Most recent source value seen for `tenant`.
    fn last_source_value(&self, tenant: Option<&str>) -> Option<IntegralValue>;

    fn increment_size(&self) -> i64;

    /// True when the structure must advance by the full increment per call.
    fn apply_increment_size_to_source_values(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    #[default]
    None,
    HiLo,
    Pooled,
}

impl OptimizerKind {
    /// Plain values for an increment of one, pooled blocks otherwise.
    pub fn default_for(increment_size: i64) -> Self {
        if increment_size <= 1 {
            Self::None
        } else {
            Self::Pooled
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::HiLo => "hilo",
            Self::Pooled => "pooled",
        }
    }

    pub fn build(
        self,
        number_type: NumberType,
        increment_size: i64,
        initial_value: Option<i64>,
    ) -> Result<Box<dyn Optimizer>> {
        if increment_size < 1 {
            return Err(SeqError::Configuration(format!(
                "{} optimizer needs a positive increment size, got {}",
                self, increment_size
            )));
        }
        Ok(match self {
            Self::None => Box::new(NoopOptimizer::new(number_type, increment_size)),
            Self::HiLo => Box::new(HiLoOptimizer::new(number_type, increment_size)),
            Self::Pooled => Box::new(PooledOptimizer::new(
                number_type,
                increment_size,
                initial_value,
            )),
        })
    }
}

impl FromStr for OptimizerKind {
    type Err = SeqError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "noop" => Ok(Self::None),
            "hilo" => Ok(Self::HiLo),
            "pooled" => Ok(Self::Pooled),
            other => Err(SeqError::Configuration(format!(
                "Unknown optimizer '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn tenant_key(callback: &dyn AccessCallback) -> Option<String> {
    callback.tenant_identifier().map(str::to_string)
}

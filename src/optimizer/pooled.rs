use super::{Optimizer, tenant_key};
use crate::core::{IntegralValue, NumberType, Result};
use crate::structure::AccessCallback;
use log::warn;
use std::collections::HashMap;
use std::sync::Mutex;

/// Source values are block upper bounds: `hi` covers `hi - increment + 1 ..= hi`.
///
/// The structure advances by the full increment, so every other process
/// sharing the table sees the same block layout.
pub struct PooledOptimizer {
    number_type: NumberType,
    increment_size: i64,
    initial_value: Option<i64>,
    pools: Mutex<HashMap<Option<String>, Pool>>,
}

#[derive(Debug, Clone, Copy)]
struct Pool {
    hi: IntegralValue,
    next: IntegralValue,
}

impl PooledOptimizer {
    /// `initial_value` is the table's seed, when known.
    pub fn new(number_type: NumberType, increment_size: i64, initial_value: Option<i64>) -> Self {
        Self {
            number_type,
            increment_size,
            initial_value,
            pools: Mutex::new(HashMap::new()),
        }
    }

    pub fn number_type(&self) -> NumberType {
        self.number_type
    }

    fn first_pool(&self, callback: &dyn AccessCallback) -> Result<Pool> {
        let first = callback.next_value()?;
        if first.value() < 1 {
            warn!(
                "pooled optimizer source returned {} as its first value; expected at least 1",
                first
            );
        }

        // A freshly seeded table hands out its initial value first; that value
        // starts the pool and the second read becomes its upper bound.
        let fresh = match self.initial_value {
            Some(initial) => first.value() == initial,
            None => first.value() < self.increment_size,
        };
        if !fresh {
            return Ok(Pool {
                hi: first,
                next: first.subtract(self.increment_size - 1)?,
            });
        }

        let hi = callback.next_value()?;
        if first.add(self.increment_size).is_ok_and(|expected| expected == hi) {
            Ok(Pool { hi, next: first })
        } else {
            // Someone else allocated between the two reads and owns the values
            // in between, so only the block below `hi` is ours.
            Ok(Pool {
                hi,
                next: hi.subtract(self.increment_size - 1)?,
            })
        }
    }

    fn following_pool(&self, callback: &dyn AccessCallback) -> Result<Pool> {
        let hi = callback.next_value()?;
        Ok(Pool {
            hi,
            next: hi.subtract(self.increment_size - 1)?,
        })
    }
}

impl Optimizer for PooledOptimizer {
    fn generate(&self, callback: &dyn AccessCallback) -> Result<IntegralValue> {
        let mut pools = self.pools.lock()?;
        let key = tenant_key(callback);

        let pool = match pools.get(&key) {
            None => self.first_pool(callback)?,
            Some(pool) if pool.next > pool.hi => self.following_pool(callback)?,
            Some(pool) => *pool,
        };

        let value = pool.next;
        pools.insert(
            key,
            Pool {
                next: value.increment()?,
                ..pool
            },
        );
        Ok(value)
    }

    fn last_source_value(&self, tenant: Option<&str>) -> Option<IntegralValue> {
        let pools = self.pools.lock().ok()?;
        pools.get(&tenant.map(str::to_string)).map(|pool| pool.hi)
    }

    fn increment_size(&self) -> i64 {
        self.increment_size
    }

    fn apply_increment_size_to_source_values(&self) -> bool {
        true
    }
}

use super::{Optimizer, tenant_key};
use crate::core::{IntegralValue, NumberType, Result};
use crate::structure::AccessCallback;
use std::collections::HashMap;
use std::sync::Mutex;

/// Returns every source value as-is; one round trip per identifier.
pub struct NoopOptimizer {
    number_type: NumberType,
    increment_size: i64,
    last_source: Mutex<HashMap<Option<String>, IntegralValue>>,
}

impl NoopOptimizer {
    pub fn new(number_type: NumberType, increment_size: i64) -> Self {
        Self {
            number_type,
            increment_size,
            last_source: Mutex::new(HashMap::new()),
        }
    }

    pub fn number_type(&self) -> NumberType {
        self.number_type
    }
}

impl Optimizer for NoopOptimizer {
    fn generate(&self, callback: &dyn AccessCallback) -> Result<IntegralValue> {
        let value = callback.next_value()?;
        self.last_source.lock()?.insert(tenant_key(callback), value);
        Ok(value)
    }

    fn last_source_value(&self, tenant: Option<&str>) -> Option<IntegralValue> {
        let last = self.last_source.lock().ok()?;
        last.get(&tenant.map(str::to_string)).copied()
    }

    fn increment_size(&self) -> i64 {
        self.increment_size
    }

    fn apply_increment_size_to_source_values(&self) -> bool {
        // Values are used directly, so the stored value must skip by the increment.
        self.increment_size > 1
    }
}

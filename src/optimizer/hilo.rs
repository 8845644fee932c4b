use super::{Optimizer, tenant_key};
use crate::core::{IntegralValue, NumberType, Result};
use crate::structure::AccessCallback;
use std::collections::HashMap;
use std::sync::Mutex;

/// Each source value `hi` owns the block `(hi - 1) * increment + 1 ..= hi * increment`.
///
/// The structure advances by one per call, so a block of `increment`
/// identifiers costs a single round trip.
pub struct HiLoOptimizer {
    number_type: NumberType,
    increment_size: i64,
    blocks: Mutex<HashMap<Option<String>, Block>>,
}

#[derive(Debug, Clone, Copy)]
struct Block {
    last_source_value: IntegralValue,
    upper_limit: IntegralValue,
    next: IntegralValue,
}

impl HiLoOptimizer {
    pub fn new(number_type: NumberType, increment_size: i64) -> Self {
        Self {
            number_type,
            increment_size,
            blocks: Mutex::new(HashMap::new()),
        }
    }

    pub fn number_type(&self) -> NumberType {
        self.number_type
    }

    fn next_block(&self, callback: &dyn AccessCallback) -> Result<Block> {
        let mut source = callback.next_value()?;
        while source.value() < 1 {
            source = callback.next_value()?;
        }
        let upper_limit = source.multiply_by(self.increment_size)?.increment()?;
        Ok(Block {
            last_source_value: source,
            upper_limit,
            next: upper_limit.subtract(self.increment_size)?,
        })
    }
}

impl Optimizer for HiLoOptimizer {
    fn generate(&self, callback: &dyn AccessCallback) -> Result<IntegralValue> {
        let mut blocks = self.blocks.lock()?;
        let key = tenant_key(callback);

        let block = match blocks.get(&key) {
            Some(block) if block.next < block.upper_limit => *block,
            _ => self.next_block(callback)?,
        };

        let value = block.next;
        blocks.insert(
            key,
            Block {
                next: value.increment()?,
                ..block
            },
        );
        Ok(value)
    }

    fn last_source_value(&self, tenant: Option<&str>) -> Option<IntegralValue> {
        let blocks = self.blocks.lock().ok()?;
        blocks
            .get(&tenant.map(str::to_string))
            .map(|block| block.last_source_value)
    }

    fn increment_size(&self) -> i64 {
        self.increment_size
    }

    fn apply_increment_size_to_source_values(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::test_support::SteppingSource;

    #[test]
    fn test_one_source_value_per_block() {
        let optimizer = HiLoOptimizer::new(NumberType::Long, 3);
        let source = SteppingSource::new(1, 1);

        let values: Vec<i64> = (0..7)
            .map(|_| optimizer.generate(&source).unwrap().value())
            .collect();

        assert_eq!(values, vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(source.calls.get(), 3);
        assert_eq!(optimizer.last_source_value(None).unwrap().value(), 3);
    }

    #[test]
    fn test_skips_non_positive_sources() {
        let optimizer = HiLoOptimizer::new(NumberType::Long, 10);
        let source = SteppingSource::new(-1, 1);

        assert_eq!(optimizer.generate(&source).unwrap().value(), 1);
        assert_eq!(source.calls.get(), 3);
    }

    #[test]
    fn test_gap_in_source_values_moves_block() {
        let optimizer = HiLoOptimizer::new(NumberType::Long, 2);
        // Another generator took every other hi value.
        let source = SteppingSource::new(1, 2);

        let values: Vec<i64> = (0..4)
            .map(|_| optimizer.generate(&source).unwrap().value())
            .collect();

        assert_eq!(values, vec![1, 2, 5, 6]);
    }

    #[test]
    fn test_block_overflow_is_reported() {
        let optimizer = HiLoOptimizer::new(NumberType::Long, 2);
        let source = SteppingSource::new(i64::MAX / 2 + 1, 1);
        assert!(optimizer.generate(&source).is_err());
    }
}

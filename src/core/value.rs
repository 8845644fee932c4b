use crate::core::{NumberType, Result, SeqError};
use std::cmp::Ordering;
use std::fmt;

/// A column value as it comes back from, or is bound to, a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Integer(_) => "INTEGER",
            Self::Float(_) => "FLOAT",
            Self::Text(_) => "TEXT",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Float(f) => {
                if f.is_finite() && f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                    Some(*f as i64)
                } else {
                    None
                }
            }
            Self::Text(s) => s.trim().parse().ok(),
            Self::Null => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) => write!(f, "'{}'", s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

/// An integral value constrained to the range of its [`NumberType`].
///
/// All arithmetic is checked: leaving the range is an [`SeqError::Overflow`],
/// never a silent wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntegralValue {
    number_type: NumberType,
    value: i64,
}

impl IntegralValue {
    pub fn new(number_type: NumberType, value: i64) -> Result<Self> {
        if !number_type.contains(value) {
            return Err(SeqError::Overflow(format!(
                "{} does not fit in a {}",
                value, number_type
            )));
        }
        Ok(Self { number_type, value })
    }

    /// Reads a driver value, rejecting NULL and non-integral data.
    pub fn from_value(value: &Value, number_type: NumberType) -> Result<Self> {
        let raw = value.as_i64().ok_or_else(|| {
            SeqError::TypeMismatch(format!(
                "Expected an integral value, got {} ({})",
                value,
                value.type_name()
            ))
        })?;
        Self::new(number_type, raw)
    }

    pub fn number_type(&self) -> NumberType {
        self.number_type
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn to_value(&self) -> Value {
        Value::Integer(self.value)
    }

    pub fn add(&self, delta: i64) -> Result<Self> {
        let next = self.value.checked_add(delta).ok_or_else(|| self.overflow("+", delta))?;
        Self::new(self.number_type, next).map_err(|_| self.overflow("+", delta))
    }

    pub fn subtract(&self, delta: i64) -> Result<Self> {
        let next = self.value.checked_sub(delta).ok_or_else(|| self.overflow("-", delta))?;
        Self::new(self.number_type, next).map_err(|_| self.overflow("-", delta))
    }

    pub fn multiply_by(&self, factor: i64) -> Result<Self> {
        let next = self.value.checked_mul(factor).ok_or_else(|| self.overflow("*", factor))?;
        Self::new(self.number_type, next).map_err(|_| self.overflow("*", factor))
    }

    pub fn increment(&self) -> Result<Self> {
        self.add(1)
    }

    fn overflow(&self, op: &str, operand: i64) -> SeqError {
        SeqError::Overflow(format!(
            "{} {} {} leaves the {} range",
            self.value, op, operand, self.number_type
        ))
    }
}

impl PartialOrd for IntegralValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IntegralValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl fmt::Display for IntegralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_value_accepts_integral_forms() {
        let long = IntegralValue::from_value(&Value::Integer(42), NumberType::Long).unwrap();
        assert_eq!(long.value(), 42);

        let from_float = IntegralValue::from_value(&Value::Float(7.0), NumberType::Integer).unwrap();
        assert_eq!(from_float.value(), 7);

        let from_text = IntegralValue::from_value(&Value::Text(" 9 ".into()), NumberType::Short).unwrap();
        assert_eq!(from_text.value(), 9);
    }

    #[test]
    fn test_from_value_rejects_null_and_fractions() {
        assert!(matches!(
            IntegralValue::from_value(&Value::Null, NumberType::Long),
            Err(SeqError::TypeMismatch(_))
        ));
        assert!(IntegralValue::from_value(&Value::Float(1.5), NumberType::Long).is_err());
    }

    #[test]
    fn test_arithmetic_respects_number_type() {
        let v = IntegralValue::new(NumberType::Short, i16::MAX as i64 - 1).unwrap();
        assert_eq!(v.increment().unwrap().value(), i16::MAX as i64);
        assert!(matches!(v.add(2), Err(SeqError::Overflow(_))));

        let v = IntegralValue::new(NumberType::Long, i64::MAX).unwrap();
        assert!(v.increment().is_err());

        let v = IntegralValue::new(NumberType::Integer, 3).unwrap();
        assert_eq!(v.multiply_by(20).unwrap().subtract(19).unwrap().value(), 41);
    }

    #[test]
    fn test_new_rejects_out_of_range() {
        assert!(IntegralValue::new(NumberType::Integer, i32::MAX as i64 + 1).is_err());
    }
}

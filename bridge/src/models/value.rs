//! Bus value model
//!
//! The federation bus carries tagged values. This module defines the closed
//! set of value kinds the bridge understands, the tagged value itself, and
//! the mapping from the bus's type names to kinds.
//!
//! # Critical Invariants
//!
//! - `BusValue` is a closed enum: every consumer matches it exhaustively
//! - `ValueType::type_name()` round-trips through `ValueType::from_type_name()`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A complex number as carried by the bus
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    /// Magnitude of the complex value
    pub fn norm(&self) -> f64 {
        self.re.hypot(self.im)
    }
}

/// Value kinds supported by the bus
///
/// The numeric ordering matches the bus's own data type table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ValueType {
    String,
    Double,
    Int,
    Complex,
    Vector,
    ComplexVector,
    Boolean,
}

/// Error returned when a type name is not in the bus's type table
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown value type name '{0}'")]
pub struct UnknownValueType(pub String);

impl ValueType {
    /// All value kinds, in bus table order
    pub const ALL: [ValueType; 7] = [
        ValueType::String,
        ValueType::Double,
        ValueType::Int,
        ValueType::Complex,
        ValueType::Vector,
        ValueType::ComplexVector,
        ValueType::Boolean,
    ];

    /// Look up a kind from one of the bus's type names
    ///
    /// Returns `None` for unknown names and for the untyped names
    /// (`""`, `"any"`, `"def"`), which carry no kind information.
    ///
    /// # Example
    /// ```
    /// use federate_bridge_core_rs::ValueType;
    ///
    /// assert_eq!(ValueType::from_type_name("double"), Some(ValueType::Double));
    /// assert_eq!(ValueType::from_type_name("INTEGER"), Some(ValueType::Int));
    /// assert_eq!(ValueType::from_type_name("any"), None);
    /// ```
    pub fn from_type_name(name: &str) -> Option<ValueType> {
        let kind = match name.trim().to_ascii_lowercase().as_str() {
            "string" | "s" | "str" => ValueType::String,
            "double" | "d" | "float" | "f" | "real" => ValueType::Double,
            "int" | "integer" | "i" | "int64" | "int32" | "long" => ValueType::Int,
            "complex" | "c" => ValueType::Complex,
            "vector" | "v" | "double_vector" => ValueType::Vector,
            "complex_vector" | "cv" => ValueType::ComplexVector,
            "bool" | "boolean" | "b" => ValueType::Boolean,
            _ => return None,
        };
        Some(kind)
    }

    /// Canonical bus type name
    pub fn type_name(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Double => "double",
            ValueType::Int => "int",
            ValueType::Complex => "complex",
            ValueType::Vector => "vector",
            ValueType::ComplexVector => "complex_vector",
            ValueType::Boolean => "boolean",
        }
    }

    /// Numeric code of this kind in the bus's data type table
    pub fn code(&self) -> i32 {
        match self {
            ValueType::String => 0,
            ValueType::Double => 1,
            ValueType::Int => 2,
            ValueType::Complex => 3,
            ValueType::Vector => 4,
            ValueType::ComplexVector => 5,
            ValueType::Boolean => 7,
        }
    }

    /// Whether the exchange path has a concrete conversion for this kind
    ///
    /// Complex and string kinds are accepted in configuration but have no
    /// exchange rule yet.
    pub fn is_exchangeable(&self) -> bool {
        matches!(
            self,
            ValueType::Double | ValueType::Vector | ValueType::Int | ValueType::Boolean
        )
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl FromStr for ValueType {
    type Err = UnknownValueType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ValueType::from_type_name(s).ok_or_else(|| UnknownValueType(s.to_string()))
    }
}

impl TryFrom<String> for ValueType {
    type Error = UnknownValueType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ValueType> for String {
    fn from(value: ValueType) -> Self {
        value.type_name().to_string()
    }
}

/// A tagged value as exchanged with the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum BusValue {
    Double(f64),
    Vector(Vec<f64>),
    Int(i64),
    Boolean(bool),
    Complex(Complex),
    ComplexVector(Vec<Complex>),
    String(String),
}

impl BusValue {
    /// Kind tag of this value
    pub fn value_type(&self) -> ValueType {
        match self {
            BusValue::Double(_) => ValueType::Double,
            BusValue::Vector(_) => ValueType::Vector,
            BusValue::Int(_) => ValueType::Int,
            BusValue::Boolean(_) => ValueType::Boolean,
            BusValue::Complex(_) => ValueType::Complex,
            BusValue::ComplexVector(_) => ValueType::ComplexVector,
            BusValue::String(_) => ValueType::String,
        }
    }

    /// Number of elements carried (1 for scalars, byte length for strings)
    pub fn len(&self) -> usize {
        match self {
            BusValue::Vector(v) => v.len(),
            BusValue::ComplexVector(v) => v.len(),
            BusValue::String(s) => s.len(),
            BusValue::Double(_) | BusValue::Int(_) | BusValue::Boolean(_) | BusValue::Complex(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names_round_trip() {
        for kind in ValueType::ALL {
            assert_eq!(ValueType::from_type_name(kind.type_name()), Some(kind));
        }
    }

    #[test]
    fn test_untyped_names_have_no_kind() {
        assert_eq!(ValueType::from_type_name(""), None);
        assert_eq!(ValueType::from_type_name("any"), None);
        assert!("quaternion".parse::<ValueType>().is_err());
    }

    #[test]
    fn test_value_type_deserializes_from_alias() {
        let kind: ValueType = serde_json::from_str("\"cv\"").unwrap();
        assert_eq!(kind, ValueType::ComplexVector);
        assert!(serde_json::from_str::<ValueType>("\"tensor\"").is_err());
    }

    #[test]
    fn test_exchangeable_kinds() {
        assert!(ValueType::Double.is_exchangeable());
        assert!(ValueType::Boolean.is_exchangeable());
        assert!(!ValueType::Complex.is_exchangeable());
        assert!(!ValueType::String.is_exchangeable());
    }
}

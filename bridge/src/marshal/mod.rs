//! Type marshalling between port buffers and bus values
//!
//! Stateless conversions in both directions:
//!
//! ```text
//! bus -> host   decode_into(&BusValue, &mut PortBuffer) -> Fill
//! host -> bus   encode(&PortBuffer, ValueType)          -> BusValue
//! ```
//!
//! # Critical Invariants
//!
//! - Vector reads copy at most `width` elements and pad the remainder with
//!   `UNSET_SENTINEL`, so missing data is visible downstream
//! - Copied elements are bit-for-bit the bus elements
//! - Integer narrowing to `i32` is unchecked (caller's responsibility)
//! - Complex and string kinds are rejected with `MarshalError::Unsupported`;
//!   they have no conversion rule yet

use crate::models::buffer::{BufferKind, PortBuffer, PortDescriptor};
use crate::models::value::{BusValue, ValueType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Value written into buffer slots for which the bus supplied no data
///
/// Matches the bus's "invalid property value" constant.
pub const UNSET_SENTINEL: f64 = -972.0;

/// Errors raised while converting between buffers and bus values
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MarshalError {
    #[error("value type {0} has no exchange conversion")]
    Unsupported(ValueType),

    #[error("buffer kind mismatch: port expects {expected}, buffer is {actual}")]
    BufferKind { expected: BufferKind, actual: BufferKind },

    #[error("buffer width mismatch: port expects {expected}, buffer has {actual}")]
    WidthMismatch { expected: usize, actual: usize },

    #[error("cannot store a {value} value in a {buffer} buffer")]
    ValueMismatch { value: ValueType, buffer: BufferKind },
}

/// Outcome of decoding a bus value into a buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    /// Slots written from bus data
    pub written: usize,
    /// Slots set to `UNSET_SENTINEL`
    pub padded: usize,
    /// Bus elements dropped because the buffer was narrower
    pub truncated: usize,
}

/// Value kind a pull should request from the bus for this port
///
/// Wide double ports (or ports declared `vector`) pull a vector; width-1
/// double ports pull a scalar.
pub fn request_kind(descriptor: &PortDescriptor) -> Result<ValueType, MarshalError> {
    match descriptor.value_type {
        ValueType::Double if descriptor.width > 1 => Ok(ValueType::Vector),
        ValueType::Double => Ok(ValueType::Double),
        ValueType::Vector => Ok(ValueType::Vector),
        ValueType::Int => Ok(ValueType::Int),
        ValueType::Boolean => Ok(ValueType::Boolean),
        other @ (ValueType::Complex | ValueType::ComplexVector | ValueType::String) => {
            Err(MarshalError::Unsupported(other))
        }
    }
}

/// Verify that a buffer has the shape the descriptor demands
pub fn check_shape(descriptor: &PortDescriptor, buffer: &PortBuffer) -> Result<(), MarshalError> {
    let expected = descriptor.buffer_kind();
    if buffer.kind() != expected {
        return Err(MarshalError::BufferKind {
            expected,
            actual: buffer.kind(),
        });
    }
    if buffer.width() != descriptor.width {
        return Err(MarshalError::WidthMismatch {
            expected: descriptor.width,
            actual: buffer.width(),
        });
    }
    Ok(())
}

/// Copy a bus value into a buffer
///
/// # Example
/// ```
/// use federate_bridge_core_rs::marshal::{decode_into, UNSET_SENTINEL};
/// use federate_bridge_core_rs::{BusValue, PortBuffer};
///
/// let mut buffer = PortBuffer::Double(vec![0.0; 3]);
/// let fill = decode_into(&BusValue::Vector(vec![4.2]), &mut buffer).unwrap();
/// assert_eq!(fill.padded, 2);
/// assert_eq!(buffer.as_doubles(), Some(&[4.2, UNSET_SENTINEL, UNSET_SENTINEL][..]));
/// ```
pub fn decode_into(value: &BusValue, buffer: &mut PortBuffer) -> Result<Fill, MarshalError> {
    match (value, buffer) {
        (BusValue::Double(x), PortBuffer::Double(slots)) => Ok(copy_padded(&[*x], slots)),
        (BusValue::Vector(values), PortBuffer::Double(slots)) => Ok(copy_padded(values, slots)),
        (BusValue::Int(i), PortBuffer::Int32(slots)) => match slots.first_mut() {
            Some(slot) => {
                *slot = *i as i32;
                Ok(Fill {
                    written: 1,
                    ..Fill::default()
                })
            }
            None => Ok(Fill::default()),
        },
        (BusValue::Boolean(b), PortBuffer::Boolean(slots)) => match slots.first_mut() {
            Some(slot) => {
                *slot = *b;
                Ok(Fill {
                    written: 1,
                    ..Fill::default()
                })
            }
            None => Ok(Fill::default()),
        },
        (BusValue::Complex(_), _) => Err(MarshalError::Unsupported(ValueType::Complex)),
        (BusValue::ComplexVector(_), _) => Err(MarshalError::Unsupported(ValueType::ComplexVector)),
        (BusValue::String(_), _) => Err(MarshalError::Unsupported(ValueType::String)),
        (value, buffer) => Err(MarshalError::ValueMismatch {
            value: value.value_type(),
            buffer: buffer.kind(),
        }),
    }
}

/// Build the bus value to publish from a buffer
///
/// Width-1 double buffers declared `double` publish a scalar; wider double
/// buffers, or buffers declared `vector`, publish the whole buffer as a
/// vector.
pub fn encode(buffer: &PortBuffer, value_type: ValueType) -> Result<BusValue, MarshalError> {
    match (buffer, value_type) {
        (PortBuffer::Double(slots), ValueType::Double) if slots.len() == 1 => Ok(BusValue::Double(slots[0])),
        (PortBuffer::Double(slots), ValueType::Double | ValueType::Vector) => {
            Ok(BusValue::Vector(slots.clone()))
        }
        (PortBuffer::Int32(slots), ValueType::Int) => slots
            .first()
            .map(|v| BusValue::Int(i64::from(*v)))
            .ok_or(MarshalError::WidthMismatch { expected: 1, actual: 0 }),
        (PortBuffer::Boolean(slots), ValueType::Boolean) => slots
            .first()
            .map(|v| BusValue::Boolean(*v))
            .ok_or(MarshalError::WidthMismatch { expected: 1, actual: 0 }),
        (_, kind @ (ValueType::Complex | ValueType::ComplexVector | ValueType::String)) => {
            Err(MarshalError::Unsupported(kind))
        }
        (buffer, kind) => Err(MarshalError::ValueMismatch {
            value: kind,
            buffer: buffer.kind(),
        }),
    }
}

fn copy_padded(source: &[f64], slots: &mut [f64]) -> Fill {
    let written = source.len().min(slots.len());
    slots[..written].copy_from_slice(&source[..written]);
    for slot in &mut slots[written..] {
        *slot = UNSET_SENTINEL;
    }
    Fill {
        written,
        padded: slots.len() - written,
        truncated: source.len() - written,
    }
}

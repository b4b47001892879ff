//! Port buffers and descriptors
//!
//! Every host port owns one fixed-width buffer of a single primitive type.
//! The width and element type come from a `PortDescriptor` fixed at
//! configuration time; the marshaller reads and writes buffers in place and
//! never changes their width.

use crate::config::ConfigError;
use crate::marshal::UNSET_SENTINEL;
use crate::models::value::ValueType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Element type of a port buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BufferKind {
    Double,
    Int32,
    Boolean,
    Bytes,
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BufferKind::Double => "double",
            BufferKind::Int32 => "int32",
            BufferKind::Boolean => "boolean",
            BufferKind::Bytes => "uint8",
        };
        f.write_str(name)
    }
}

/// Static shape of one port: width and declared value type
///
/// # Example
/// ```
/// use federate_bridge_core_rs::{BufferKind, PortDescriptor, ValueType};
///
/// let desc = PortDescriptor::new(3, ValueType::Vector).unwrap();
/// assert_eq!(desc.buffer_kind(), BufferKind::Double);
/// assert_eq!(desc.allocate().width(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDescriptor {
    /// Number of buffer slots (bytes for string ports)
    #[serde(default = "default_width")]
    pub width: usize,

    /// Declared value type of the port
    #[serde(rename = "type", default = "default_value_type")]
    pub value_type: ValueType,
}

fn default_width() -> usize {
    1
}

fn default_value_type() -> ValueType {
    ValueType::Double
}

impl Default for PortDescriptor {
    fn default() -> Self {
        Self {
            width: default_width(),
            value_type: default_value_type(),
        }
    }
}

impl PortDescriptor {
    /// Create a validated descriptor
    pub fn new(width: usize, value_type: ValueType) -> Result<Self, ConfigError> {
        let descriptor = Self { width, value_type };
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Check the width against the value type
    ///
    /// Integer and boolean ports carry exactly one value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 {
            return Err(ConfigError::Validation(format!(
                "port of type {} must have a width of at least 1",
                self.value_type
            )));
        }
        if matches!(self.value_type, ValueType::Int | ValueType::Boolean) && self.width != 1 {
            return Err(ConfigError::Validation(format!(
                "port of type {} must have width 1, got {}",
                self.value_type, self.width
            )));
        }
        Ok(())
    }

    /// Host element type backing this port
    pub fn buffer_kind(&self) -> BufferKind {
        match self.value_type {
            ValueType::Double | ValueType::Vector | ValueType::Complex | ValueType::ComplexVector => {
                BufferKind::Double
            }
            ValueType::Int => BufferKind::Int32,
            ValueType::Boolean => BufferKind::Boolean,
            ValueType::String => BufferKind::Bytes,
        }
    }

    /// Allocate a buffer of the described shape
    ///
    /// Double slots start at `UNSET_SENTINEL` so that a port which never
    /// received data is distinguishable from one that received zeros.
    pub fn allocate(&self) -> PortBuffer {
        match self.buffer_kind() {
            BufferKind::Double => PortBuffer::Double(vec![UNSET_SENTINEL; self.width]),
            BufferKind::Int32 => PortBuffer::Int32(vec![0; self.width]),
            BufferKind::Boolean => PortBuffer::Boolean(vec![false; self.width]),
            BufferKind::Bytes => PortBuffer::Bytes(vec![0; self.width]),
        }
    }
}

/// Fixed-width typed buffer bound to one port
///
/// Only slice access is exposed so the width cannot change after allocation.
#[derive(Debug, Clone, PartialEq)]
pub enum PortBuffer {
    Double(Vec<f64>),
    Int32(Vec<i32>),
    Boolean(Vec<bool>),
    Bytes(Vec<u8>),
}

impl PortBuffer {
    pub fn kind(&self) -> BufferKind {
        match self {
            PortBuffer::Double(_) => BufferKind::Double,
            PortBuffer::Int32(_) => BufferKind::Int32,
            PortBuffer::Boolean(_) => BufferKind::Boolean,
            PortBuffer::Bytes(_) => BufferKind::Bytes,
        }
    }

    pub fn width(&self) -> usize {
        match self {
            PortBuffer::Double(v) => v.len(),
            PortBuffer::Int32(v) => v.len(),
            PortBuffer::Boolean(v) => v.len(),
            PortBuffer::Bytes(v) => v.len(),
        }
    }

    pub fn as_doubles(&self) -> Option<&[f64]> {
        match self {
            PortBuffer::Double(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_doubles_mut(&mut self) -> Option<&mut [f64]> {
        match self {
            PortBuffer::Double(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int32(&self) -> Option<&[i32]> {
        match self {
            PortBuffer::Int32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_booleans(&self) -> Option<&[bool]> {
        match self {
            PortBuffer::Boolean(v) => Some(v),
            _ => None,
        }
    }

    /// Check that this buffer has the shape a descriptor demands
    pub fn matches(&self, descriptor: &PortDescriptor) -> bool {
        self.kind() == descriptor.buffer_kind() && self.width() == descriptor.width
    }
}

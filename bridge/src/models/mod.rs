//! Domain models for the federate bridge

pub mod buffer;
pub mod value;

// Re-exports
pub use buffer::{BufferKind, PortBuffer, PortDescriptor};
pub use value::{BusValue, Complex, UnknownValueType, ValueType};

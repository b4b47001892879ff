//! Federation bus contract
//!
//! The bridge consumes the bus only through this trait: federate lifecycle,
//! time requests, endpoint lookup and value exchange. Handles are opaque
//! `Copy` tokens issued by the bus; the bridge never interprets them.
//!
//! Every fallible bus call reports a `(code, message)` pair, modelled here as
//! `BusError`. Success carries no code.
//!
//! Implementations:
//! - `loopback::LoopbackBus` - in-process federation used by tests and the CLI

pub mod loopback;

use crate::config::FederateConfig;
use crate::models::value::{BusValue, ValueType};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Logical simulation time in seconds
pub type Time = f64;

/// Error codes reported by the bus
///
/// Numeric values follow the bus's own error table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BusErrorCode {
    RegistrationFailure,
    ConnectionFailure,
    InvalidObject,
    InvalidArgument,
    Discard,
    SystemFailure,
    InvalidStateTransition,
    InvalidFunctionCall,
    ExecutionFailure,
    InsufficientSpace,
    Other,
    Fatal,
}

impl BusErrorCode {
    /// Raw numeric code
    pub fn raw(&self) -> i32 {
        match self {
            BusErrorCode::RegistrationFailure => -1,
            BusErrorCode::ConnectionFailure => -2,
            BusErrorCode::InvalidObject => -3,
            BusErrorCode::InvalidArgument => -4,
            BusErrorCode::Discard => -5,
            BusErrorCode::SystemFailure => -6,
            BusErrorCode::InvalidStateTransition => -9,
            BusErrorCode::InvalidFunctionCall => -10,
            BusErrorCode::ExecutionFailure => -14,
            BusErrorCode::InsufficientSpace => -18,
            BusErrorCode::Other => -101,
            BusErrorCode::Fatal => -404,
        }
    }

    /// Map a raw code back; `0` (success) and unknown codes yield `None`
    pub fn from_raw(code: i32) -> Option<Self> {
        let code = match code {
            -1 => BusErrorCode::RegistrationFailure,
            -2 => BusErrorCode::ConnectionFailure,
            -3 => BusErrorCode::InvalidObject,
            -4 => BusErrorCode::InvalidArgument,
            -5 => BusErrorCode::Discard,
            -6 => BusErrorCode::SystemFailure,
            -9 => BusErrorCode::InvalidStateTransition,
            -10 => BusErrorCode::InvalidFunctionCall,
            -14 => BusErrorCode::ExecutionFailure,
            -18 => BusErrorCode::InsufficientSpace,
            -101 => BusErrorCode::Other,
            -404 => BusErrorCode::Fatal,
            _ => return None,
        };
        Some(code)
    }

    /// Whether the code reports a federate in the wrong state
    pub fn is_state_violation(&self) -> bool {
        matches!(
            self,
            BusErrorCode::InvalidStateTransition | BusErrorCode::InvalidFunctionCall | BusErrorCode::InvalidObject
        )
    }
}

impl fmt::Display for BusErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BusErrorCode::RegistrationFailure => "registration failure",
            BusErrorCode::ConnectionFailure => "connection failure",
            BusErrorCode::InvalidObject => "invalid object",
            BusErrorCode::InvalidArgument => "invalid argument",
            BusErrorCode::Discard => "discard",
            BusErrorCode::SystemFailure => "system failure",
            BusErrorCode::InvalidStateTransition => "invalid state transition",
            BusErrorCode::InvalidFunctionCall => "invalid function call",
            BusErrorCode::ExecutionFailure => "execution failure",
            BusErrorCode::InsufficientSpace => "insufficient space",
            BusErrorCode::Other => "other error",
            BusErrorCode::Fatal => "fatal error",
        };
        f.write_str(name)
    }
}

/// `(code, message)` pair reported by a failed bus call
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
#[error("{code} ({}): {message}", code.raw())]
pub struct BusError {
    pub code: BusErrorCode,
    pub message: String,
}

impl BusError {
    pub fn new(code: BusErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Time properties readable from a federate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeProperty {
    /// Configured time-step period
    Period,
}

/// The externally observable contract of the federation bus
///
/// Methods take `&self`: the bus owns whatever synchronisation its handles
/// need. `request_time` is the only call allowed to block.
pub trait FederationBus {
    type FederateHandle: Copy + fmt::Debug;
    type PublicationHandle: Copy + fmt::Debug;
    type InputHandle: Copy + fmt::Debug;

    // Federate lifecycle
    fn create_federate(&self, config: &FederateConfig) -> Result<Self::FederateHandle, BusError>;
    fn federate_is_valid(&self, fed: Self::FederateHandle) -> bool;
    fn federate_name(&self, fed: Self::FederateHandle) -> Result<String, BusError>;
    fn enter_initializing_mode(&self, fed: Self::FederateHandle) -> Result<(), BusError>;
    fn enter_executing_mode(&self, fed: Self::FederateHandle) -> Result<(), BusError>;
    fn destroy_federate(&self, fed: Self::FederateHandle);

    // Time
    fn request_time(&self, fed: Self::FederateHandle, requested: Time) -> Result<Time, BusError>;
    fn time_property(&self, fed: Self::FederateHandle, property: TimeProperty) -> Result<Time, BusError>;

    // Endpoints
    fn publication_by_name(&self, fed: Self::FederateHandle, name: &str) -> Result<Self::PublicationHandle, BusError>;
    fn publication_by_index(&self, fed: Self::FederateHandle, index: usize)
        -> Result<Self::PublicationHandle, BusError>;
    fn input_by_name(&self, fed: Self::FederateHandle, name: &str) -> Result<Self::InputHandle, BusError>;
    fn input_by_index(&self, fed: Self::FederateHandle, index: usize) -> Result<Self::InputHandle, BusError>;
    fn publication_name(&self, publication: Self::PublicationHandle) -> Result<String, BusError>;
    fn publication_type(&self, publication: Self::PublicationHandle) -> Result<String, BusError>;
    fn input_name(&self, input: Self::InputHandle) -> Result<String, BusError>;
    fn input_type(&self, input: Self::InputHandle) -> Result<String, BusError>;

    // Values
    fn publish(&self, publication: Self::PublicationHandle, value: &BusValue) -> Result<(), BusError>;

    /// Current value of an input converted to `kind`
    ///
    /// Vector pulls return however many elements the bus holds; the length
    /// is the element count.
    fn input_value(&self, input: Self::InputHandle, kind: ValueType) -> Result<BusValue, BusError>;
}

//! Port bindings
//!
//! Each host port is bound to exactly one bus endpoint: an `InputBinding`
//! pulls bus values into a host buffer, a `PublicationBinding` pushes a host
//! buffer onto the bus.
//!
//! # Resolution
//!
//! A binding names its endpoint with a `PortSelector` and resolves it against
//! the live federate at most once. The outcome, success or failure, is cached
//! for the binding's lifetime; exchanges resolve on first use if `resolve()`
//! was never called.
//!
//! Bindings borrow the federate (`&'fed Federate<B>`), so they cannot outlive
//! it, and they have no destroy call of their own.

pub mod input;
pub mod publication;

pub use input::{InputBinding, PullReport};
pub use publication::PublicationBinding;

use crate::error::{BridgeError, BridgeResult};
use crate::models::buffer::PortDescriptor;
use crate::models::value::ValueType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a port names its bus endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortSelector {
    /// Endpoint name (local or global key)
    Name(String),
    /// 0-based registration index
    Index(usize),
}

impl From<&str> for PortSelector {
    fn from(name: &str) -> Self {
        PortSelector::Name(name.to_string())
    }
}

impl From<String> for PortSelector {
    fn from(name: String) -> Self {
        PortSelector::Name(name)
    }
}

impl From<usize> for PortSelector {
    fn from(index: usize) -> Self {
        PortSelector::Index(index)
    }
}

impl fmt::Display for PortSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortSelector::Name(name) => write!(f, "'{}'", name),
            PortSelector::Index(index) => write!(f, "index {}", index),
        }
    }
}

/// A resolved bus endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint<H> {
    pub handle: H,
    pub name: String,
    /// Type the endpoint was registered with, `None` when untyped
    pub declared_type: Option<ValueType>,
}

/// Shared surface of input and publication bindings
pub trait PortBinding {
    /// Resolve the endpoint (cached after the first call)
    fn resolve(&mut self) -> BridgeResult<()>;

    /// Whether resolution has succeeded
    fn is_resolved(&self) -> bool;

    fn selector(&self) -> &PortSelector;

    fn descriptor(&self) -> &PortDescriptor;

    /// Name of the resolved endpoint
    fn endpoint_name(&self) -> Option<&str>;
}

/// Cached outcome of an endpoint lookup
#[derive(Debug)]
enum Resolution<H> {
    Pending,
    Ready(Endpoint<H>),
    Failed(BridgeError),
}

impl<H> Resolution<H> {
    fn get_or_resolve<F>(&mut self, lookup: F) -> BridgeResult<&Endpoint<H>>
    where
        F: FnOnce() -> BridgeResult<Endpoint<H>>,
    {
        if matches!(self, Resolution::Pending) {
            *self = match lookup() {
                Ok(endpoint) => Resolution::Ready(endpoint),
                Err(error) => Resolution::Failed(error),
            };
        }
        match self {
            Resolution::Ready(endpoint) => Ok(endpoint),
            Resolution::Failed(error) => Err(error.clone()),
            Resolution::Pending => Err(BridgeError::State("endpoint resolution did not complete".to_string())),
        }
    }

    fn endpoint(&self) -> Option<&Endpoint<H>> {
        match self {
            Resolution::Ready(endpoint) => Some(endpoint),
            _ => None,
        }
    }
}

/// Reject endpoints whose registered type has no exchange conversion
fn check_declared_type(declared: Option<ValueType>) -> BridgeResult<()> {
    match declared {
        Some(kind) if !kind.is_exchangeable() => Err(crate::marshal::MarshalError::Unsupported(kind).into()),
        _ => Ok(()),
    }
}

/// Endpoint name for log output, falling back to the selector
fn display_name(registered: String, selector: &PortSelector) -> String {
    if registered.is_empty() {
        selector.to_string()
    } else {
        registered
    }
}

fn not_found(selector: &PortSelector, error: impl fmt::Display) -> BridgeError {
    BridgeError::NotFound {
        selector: selector.to_string(),
        message: error.to_string(),
    }
}

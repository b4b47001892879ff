//! Federate Bridge Core - Rust Engine
//!
//! Connects a discretely-stepped host simulation loop to a federation bus
//! that coordinates independent federates through shared logical time.
//!
//! # Architecture
//!
//! - **lifecycle**: Federate creation, mode transitions and release
//! - **core**: Time synchronization (period, next hit time, time requests)
//! - **binding**: Port bindings resolving host ports to bus endpoints
//! - **marshal**: Conversions between port buffers and bus values
//! - **models**: Domain types (BusValue, ValueType, PortBuffer, PortDescriptor)
//! - **bus**: Federation bus contract and the in-process loopback bus
//! - **orchestrator**: Host-loop hooks (start, step, finish)
//!
//! # Critical Invariants
//!
//! 1. No value exchange before the federate is executing
//! 2. Granted time never decreases and never runs ahead of a request
//! 3. Each endpoint is resolved at most once
//! 4. The federate is destroyed exactly once

// Module declarations
pub mod binding;
pub mod bus;
pub mod config;
pub mod core;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod marshal;
pub mod models;
pub mod orchestrator;

// Re-exports for convenience
pub use binding::{Endpoint, InputBinding, PortBinding, PortSelector, PublicationBinding, PullReport};
pub use bus::{BusError, BusErrorCode, FederationBus, Time, TimeProperty};
pub use config::{ConfigError, ConfigSource, FederateConfig, PortConfig, PortDirection};
pub use core::time::{SyncPhase, TimeState, TimeSynchronizer};
pub use error::{BridgeError, BridgeResult};
pub use lifecycle::{Federate, FederateState};
pub use marshal::{Fill, MarshalError, UNSET_SENTINEL};
pub use models::{BufferKind, BusValue, Complex, PortBuffer, PortDescriptor, ValueType};
pub use orchestrator::{Orchestrator, StepResult};

//! Federate lifecycle management
//!
//! `Federate` owns the bus federate handle for one simulation run. It is the
//! ownership root of the run: time synchronizers and port bindings borrow it
//! (`&'fed Federate<B>`) and therefore cannot outlive it.
//!
//! # Lifecycle
//!
//! ```text
//! create ──> Unstarted ──enter_initializing──> Initializing ──enter_executing──> Executing
//!                                                                                   │
//!                    destroy (from any state) ──────────────────────────────> Terminated
//! ```
//!
//! # Critical Invariants
//!
//! - Only this module changes the lifecycle state
//! - Each transition reaches the bus at most once; repeating a passed
//!   transition is a no-op
//! - The bus handle is destroyed exactly once, either by `destroy()` or when
//!   the `Federate` is dropped

use crate::bus::FederationBus;
use crate::config::{ConfigError, ConfigSource, FederateConfig};
use crate::error::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;
use tracing::{debug, info, warn};

/// Lifecycle state of a federate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FederateState {
    /// Created, no mode entered yet
    Unstarted,
    Initializing,
    Executing,
    /// Destroyed; terminal
    Terminated,
}

impl fmt::Display for FederateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FederateState::Unstarted => "unstarted",
            FederateState::Initializing => "initializing",
            FederateState::Executing => "executing",
            FederateState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// A live bus federate and its lifecycle state
///
/// State lives in `Cell`s, which keeps `Federate` `!Sync`: one host thread
/// owns the federate and everything borrowing it.
///
/// # Example
/// ```
/// use federate_bridge_core_rs::bus::loopback::LoopbackBus;
/// use federate_bridge_core_rs::{ConfigSource, Federate, FederateState};
///
/// let bus = LoopbackBus::new();
/// let source = ConfigSource::Json(r#"{"name": "fed", "period": 1.0}"#.to_string());
/// let federate = Federate::create(bus, &source).unwrap();
///
/// federate.enter_initializing().unwrap();
/// federate.enter_executing().unwrap();
/// assert_eq!(federate.state(), FederateState::Executing);
///
/// federate.destroy().unwrap();
/// assert!(federate.destroy().is_err());
/// ```
pub struct Federate<B: FederationBus> {
    bus: B,
    handle: B::FederateHandle,
    name: String,
    state: Cell<FederateState>,
    destroyed: Cell<bool>,
}

impl<B: FederationBus> Federate<B> {
    /// Create a federate from a configuration source
    ///
    /// # Errors
    ///
    /// `BridgeError::Config` if the artifact cannot be read, parsed or
    /// validated, or if the bus rejects it.
    pub fn create(bus: B, source: &ConfigSource) -> BridgeResult<Self> {
        info!(source = %source.describe(), "loading federate configuration");
        let config = FederateConfig::load(source)?;
        Self::from_config(bus, &config)
    }

    /// Create a federate from an already-loaded configuration
    pub fn from_config(bus: B, config: &FederateConfig) -> BridgeResult<Self> {
        config.validate()?;

        let handle = bus.create_federate(config).map_err(ConfigError::Rejected)?;

        if !bus.federate_is_valid(handle) {
            bus.destroy_federate(handle);
            return Err(BridgeError::InvalidFederate(format!(
                "bus returned an invalid handle for federate '{}'",
                config.name
            )));
        }

        let name = match bus.federate_name(handle) {
            Ok(name) => name,
            Err(e) => {
                bus.destroy_federate(handle);
                return Err(ConfigError::Rejected(e).into());
            }
        };

        info!(federate = %name, "loaded federate");

        Ok(Self {
            bus,
            handle,
            name,
            state: Cell::new(FederateState::Unstarted),
            destroyed: Cell::new(false),
        })
    }

    /// Create a federate, run `f` with it, and always destroy it afterwards
    ///
    /// The destroy error is reported only when `f` itself succeeded, so the
    /// error that aborted the run is never masked.
    pub fn scope<T, F>(bus: B, source: &ConfigSource, f: F) -> BridgeResult<T>
    where
        F: FnOnce(&Federate<B>) -> BridgeResult<T>,
    {
        let federate = Self::create(bus, source)?;
        let result = f(&federate);
        let released = federate.destroy();
        match result {
            Ok(value) => released.map(|_| value),
            Err(e) => Err(e),
        }
    }

    /// Enter initializing mode
    ///
    /// No-op once initializing or executing.
    pub fn enter_initializing(&self) -> BridgeResult<()> {
        match self.state.get() {
            FederateState::Unstarted => {
                self.ensure_valid()?;
                self.bus
                    .enter_initializing_mode(self.handle)
                    .map_err(|e| BridgeError::State(format!("enter initializing mode: {}", e)))?;
                self.state.set(FederateState::Initializing);
                info!(federate = %self.name, "entered initializing mode");
                Ok(())
            }
            FederateState::Initializing | FederateState::Executing => {
                debug!(federate = %self.name, state = %self.state.get(), "already past initializing");
                Ok(())
            }
            FederateState::Terminated => Err(self.terminated_error()),
        }
    }

    /// Enter executing mode
    ///
    /// # Errors
    ///
    /// `BridgeError::Sequence` if initializing mode was never entered.
    pub fn enter_executing(&self) -> BridgeResult<()> {
        match self.state.get() {
            FederateState::Unstarted => Err(BridgeError::Sequence(format!(
                "federate '{}' must enter initializing mode before executing mode",
                self.name
            ))),
            FederateState::Initializing => {
                self.ensure_valid()?;
                self.bus
                    .enter_executing_mode(self.handle)
                    .map_err(|e| BridgeError::State(format!("enter executing mode: {}", e)))?;
                self.state.set(FederateState::Executing);
                info!(federate = %self.name, "entered executing mode");
                Ok(())
            }
            FederateState::Executing => {
                debug!(federate = %self.name, "already executing");
                Ok(())
            }
            FederateState::Terminated => Err(self.terminated_error()),
        }
    }

    /// Release the federate
    ///
    /// # Errors
    ///
    /// `BridgeError::DoubleFree` on any call after the first.
    pub fn destroy(&self) -> BridgeResult<()> {
        if self.destroyed.get() {
            return Err(BridgeError::DoubleFree(self.name.clone()));
        }
        self.bus.destroy_federate(self.handle);
        self.destroyed.set(true);
        self.state.set(FederateState::Terminated);
        info!(federate = %self.name, "federate terminated");
        Ok(())
    }

    pub fn state(&self) -> FederateState {
        self.state.get()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the handle is still usable
    pub fn is_valid(&self) -> bool {
        !self.destroyed.get() && self.bus.federate_is_valid(self.handle)
    }

    /// Fail with `InvalidFederate` unless the handle is usable
    pub fn ensure_valid(&self) -> BridgeResult<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(BridgeError::InvalidFederate(format!(
                "federate '{}' is not valid ({})",
                self.name,
                self.state.get()
            )))
        }
    }

    /// Fail with `Sequence` unless executing, `InvalidFederate` if unusable
    pub fn ensure_executing(&self, operation: &str) -> BridgeResult<()> {
        self.ensure_valid()?;
        match self.state.get() {
            FederateState::Executing => Ok(()),
            state => Err(BridgeError::Sequence(format!(
                "{} requires federate '{}' to be executing, it is {}",
                operation, self.name, state
            ))),
        }
    }

    pub(crate) fn bus(&self) -> &B {
        &self.bus
    }

    pub(crate) fn handle(&self) -> B::FederateHandle {
        self.handle
    }

    fn terminated_error(&self) -> BridgeError {
        BridgeError::InvalidFederate(format!("federate '{}' has been destroyed", self.name))
    }
}

impl<B: FederationBus> fmt::Debug for Federate<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Federate")
            .field("name", &self.name)
            .field("handle", &self.handle)
            .field("state", &self.state.get())
            .finish()
    }
}

impl<B: FederationBus> Drop for Federate<B> {
    fn drop(&mut self) {
        if !self.destroyed.get() {
            warn!(federate = %self.name, "federate dropped without destroy, releasing it");
            self.bus.destroy_federate(self.handle);
            self.destroyed.set(true);
            self.state.set(FederateState::Terminated);
        }
    }
}

//! Time synchronization with the federation
//!
//! The host loop advances in steps of the federate's configured period. The
//! `TimeSynchronizer` decides how far each step may go and asks the bus for
//! it; the bus answers with a granted time once every peer has committed far
//! enough.
//!
//! # Scheduling contract
//!
//! ```text
//! next_hit_time = last_granted + step_period
//! ```
//!
//! A request is never more than one period ahead of the last grant, and never
//! behind it.
//!
//! # Critical Invariants
//!
//! - `last_granted` is undefined before executing mode, becomes 0 at the
//!   executing transition without a bus round trip, then never decreases
//! - A grant above the (bounded) request or below the previous grant is a
//!   bus contract violation and fails the run
//! - The same time may not be requested twice in a row without an output
//!   exchange in between

use crate::bus::{FederationBus, Time, TimeProperty};
use crate::config::ConfigError;
use crate::error::{BridgeError, BridgeResult};
use crate::lifecycle::{Federate, FederateState};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Phase of the synchronizer state machine, derived from the federate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncPhase {
    Unstarted,
    Initializing,
    Executing,
    Terminated,
}

impl From<FederateState> for SyncPhase {
    fn from(state: FederateState) -> Self {
        match state {
            FederateState::Unstarted => SyncPhase::Unstarted,
            FederateState::Initializing => SyncPhase::Initializing,
            FederateState::Executing => SyncPhase::Executing,
            FederateState::Terminated => SyncPhase::Terminated,
        }
    }
}

/// Logical time bookkeeping of one federate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeState {
    /// Last time granted by the bus (`None` before executing mode)
    pub last_granted: Option<Time>,

    /// Configured step period in seconds
    pub step_period: Time,

    /// Request in flight, or the request that failed
    pub pending_request: Option<Time>,
}

impl TimeState {
    pub fn new(step_period: Time) -> Self {
        Self {
            last_granted: None,
            step_period,
            pending_request: None,
        }
    }
}

/// Issues time requests on behalf of one federate
///
/// Borrows the federate for the run; the federate's lifecycle state is read,
/// never changed.
pub struct TimeSynchronizer<'fed, B: FederationBus> {
    federate: &'fed Federate<B>,
    time: TimeState,
    /// Last time handed to the bus
    last_requested: Option<Time>,
    /// Whether outputs were exchanged since the last request
    exchanged: bool,
    grants: u64,
}

impl<'fed, B: FederationBus> TimeSynchronizer<'fed, B> {
    /// Bind to a federate and read its step period from the bus
    ///
    /// # Errors
    ///
    /// - `InvalidFederate` if the federate is not valid
    /// - `Config` if the period is missing, non-finite or not positive
    pub fn new(federate: &'fed Federate<B>) -> BridgeResult<Self> {
        federate.ensure_valid()?;
        let period = federate
            .bus()
            .time_property(federate.handle(), TimeProperty::Period)
            .map_err(ConfigError::Rejected)?;

        if !period.is_finite() || period <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "federate '{}' needs a positive time period, bus reports {}",
                federate.name(),
                period
            ))
            .into());
        }

        info!(federate = %federate.name(), period, "time period");

        Ok(Self {
            federate,
            time: TimeState::new(period),
            last_requested: None,
            exchanged: false,
            grants: 0,
        })
    }

    /// Current phase, as seen through the federate's lifecycle state
    pub fn phase(&self) -> SyncPhase {
        self.federate.state().into()
    }

    pub fn step_period(&self) -> Time {
        self.time.step_period
    }

    /// Snapshot of the time bookkeeping
    pub fn time_state(&self) -> TimeState {
        TimeState {
            last_granted: self.last_granted_time(),
            ..self.time
        }
    }

    /// Last granted time; defined from the executing transition onwards
    ///
    /// Before the first grant an executing federate is at time zero.
    pub fn last_granted_time(&self) -> Option<Time> {
        self.time.last_granted.or_else(|| {
            (self.federate.state() == FederateState::Executing).then_some(0.0)
        })
    }

    /// Number of grants received from the bus
    pub fn grant_count(&self) -> u64 {
        self.grants
    }

    /// Next instant the host should step at: `last_granted + step_period`
    ///
    /// # Errors
    ///
    /// `Sequence` before executing mode.
    pub fn next_hit_time(&self) -> BridgeResult<Time> {
        match self.last_granted_time() {
            Some(last) => Ok(last + self.time.step_period),
            None => Err(BridgeError::Sequence(format!(
                "federate '{}' has no granted time before executing mode",
                self.federate.name()
            ))),
        }
    }

    /// Record that outputs were exchanged since the last request
    pub fn mark_exchanged(&mut self) {
        self.exchanged = true;
    }

    /// Ask the bus to advance to `desired`, blocking until it grants
    ///
    /// `desired` is bounded to `[last_granted, last_granted + step_period]`.
    ///
    /// # Errors
    ///
    /// - `InvalidFederate` if the federate is not valid
    /// - `Sequence` outside executing mode, or when repeating the previous
    ///   request without an intervening exchange
    /// - `State` if the bus fails the request or grants an inconsistent time
    pub fn request_time(&mut self, desired: Time) -> BridgeResult<Time> {
        self.federate.ensure_executing("time request")?;
        let last = self.last_granted_time().unwrap_or(0.0);

        if desired.is_nan() {
            return Err(BridgeError::Sequence("requested time is not a number".to_string()));
        }

        let ceiling = last + self.time.step_period;
        let bounded = desired.clamp(last, ceiling);
        if bounded != desired {
            warn!(
                federate = %self.federate.name(),
                desired,
                bounded,
                "time request outside [last grant, last grant + period], bounded"
            );
        }

        if self.last_requested == Some(bounded) && !self.exchanged {
            return Err(BridgeError::Sequence(format!(
                "time {} requested twice without an output exchange",
                bounded
            )));
        }

        self.time.pending_request = Some(bounded);
        let granted = self
            .federate
            .bus()
            .request_time(self.federate.handle(), bounded)
            .map_err(|e| {
                let cause = if e.code.is_state_violation() {
                    "federate is not in a state that allows time requests"
                } else {
                    "bus failure"
                };
                BridgeError::State(format!(
                    "time request {} for federate '{}' failed ({}): {}",
                    bounded,
                    self.federate.name(),
                    cause,
                    e
                ))
            })?;

        if !granted.is_finite() || granted < last || granted > bounded {
            return Err(BridgeError::State(format!(
                "bus granted {} for a request of {} after a grant of {}",
                granted, bounded, last
            )));
        }

        self.time.pending_request = None;
        self.time.last_granted = Some(granted);
        self.last_requested = Some(bounded);
        self.exchanged = false;
        self.grants += 1;

        debug!(federate = %self.federate.name(), requested = bounded, granted, "federate at");
        Ok(granted)
    }
}

//! Host-loop driver
//!
//! Wires one federate, its time synchronizer and its port bindings into the
//! three hooks a discretely-stepped host calls:
//!
//! ```text
//! start  : validate ports -> initializing -> read period -> resolve all -> executing
//! step   : push publications -> request next hit time -> pull inputs
//! finish : destroy federate
//! ```
//!
//! Pushes always precede the time request and pulls always follow it. When
//! the host steps its federates in time order, a value read after a grant of
//! `t` is the newest one a peer published before `t`.

use crate::binding::{InputBinding, PortBinding, PublicationBinding};
use crate::bus::{FederationBus, Time};
use crate::config::{PortConfig, PortDirection};
use crate::core::time::TimeSynchronizer;
use crate::error::BridgeResult;
use crate::lifecycle::Federate;
use crate::models::buffer::PortBuffer;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ============================================================================
// Step Result
// ============================================================================

/// Result of a single step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// Step number (1-based, counts completed steps)
    pub step: usize,

    /// Time granted by the bus for this step
    pub granted_time: Time,

    /// Time the host should schedule the next step at
    pub next_time: Time,

    /// Number of publications pushed before the time request
    pub num_published: usize,

    /// Number of inputs pulled after the grant
    pub num_pulled: usize,

    /// Buffer slots filled with the unset sentinel across all inputs
    pub padded_slots: usize,
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Drives one federate through the host loop
///
/// # Example
/// ```
/// use federate_bridge_core_rs::bus::loopback::LoopbackBus;
/// use federate_bridge_core_rs::{ConfigSource, Federate, Orchestrator, PortConfig, PortDescriptor};
///
/// let source = ConfigSource::Json(
///     r#"{"name": "gen", "period": 0.5, "publications": [{"key": "out"}]}"#.to_string(),
/// );
/// let federate = Federate::create(LoopbackBus::new(), &source).unwrap();
/// let ports = [PortConfig::publication("out", PortDescriptor::default())];
///
/// let mut orchestrator = Orchestrator::start(&federate, &ports).unwrap();
/// assert_eq!(orchestrator.next_hit_time().unwrap(), 0.5);
///
/// let result = orchestrator.step().unwrap();
/// assert_eq!(result.granted_time, 0.5);
/// assert_eq!(result.next_time, 1.0);
///
/// orchestrator.finish().unwrap();
/// ```
pub struct Orchestrator<'fed, B: FederationBus> {
    federate: &'fed Federate<B>,
    clock: TimeSynchronizer<'fed, B>,

    publications: Vec<PublicationBinding<'fed, B>>,
    publication_buffers: Vec<PortBuffer>,

    inputs: Vec<InputBinding<'fed, B>>,
    input_buffers: Vec<PortBuffer>,

    steps: usize,
}

impl<'fed, B: FederationBus> Orchestrator<'fed, B> {
    /// Run-start hook
    ///
    /// Ports are bound in the order given; publication and input indices
    /// used by the buffer accessors count each direction separately.
    ///
    /// # Errors
    ///
    /// - `Config` for an invalid port descriptor or step period
    /// - `NotFound` / `Marshal` for a port that does not resolve, reported
    ///   before any exchange happens
    /// - `State` / `InvalidFederate` from the mode transitions
    pub fn start(federate: &'fed Federate<B>, ports: &[PortConfig]) -> BridgeResult<Self> {
        for port in ports {
            port.descriptor.validate()?;
        }

        federate.enter_initializing()?;
        let clock = TimeSynchronizer::new(federate)?;

        let mut publications = Vec::new();
        let mut publication_buffers = Vec::new();
        let mut inputs = Vec::new();
        let mut input_buffers = Vec::new();

        for port in ports {
            match port.direction {
                PortDirection::Publication => {
                    let mut binding = PublicationBinding::new(federate, port.selector.clone(), port.descriptor);
                    binding.resolve()?;
                    publications.push(binding);
                    publication_buffers.push(port.descriptor.allocate());
                }
                PortDirection::Input => {
                    let mut binding = InputBinding::new(federate, port.selector.clone(), port.descriptor);
                    binding.resolve()?;
                    inputs.push(binding);
                    input_buffers.push(port.descriptor.allocate());
                }
            }
        }

        federate.enter_executing()?;

        info!(
            federate = %federate.name(),
            period = clock.step_period(),
            publications = publications.len(),
            inputs = inputs.len(),
            "bridge started"
        );

        Ok(Self {
            federate,
            clock,
            publications,
            publication_buffers,
            inputs,
            input_buffers,
            steps: 0,
        })
    }

    /// Next instant the host should call `step` at
    pub fn next_hit_time(&self) -> BridgeResult<Time> {
        self.clock.next_hit_time()
    }

    /// Execute one step: push, advance time, pull
    ///
    /// A grant equal to the previous one still performs the full exchange.
    pub fn step(&mut self) -> BridgeResult<StepResult> {
        // STEP 1: PUSH
        for (binding, buffer) in self.publications.iter_mut().zip(&self.publication_buffers) {
            binding.push(buffer)?;
        }
        self.clock.mark_exchanged();

        // STEP 2: TIME
        let requested = self.clock.next_hit_time()?;
        let granted_time = self.clock.request_time(requested)?;

        // STEP 3: PULL
        let mut padded_slots = 0;
        for (binding, buffer) in self.inputs.iter_mut().zip(&mut self.input_buffers) {
            padded_slots += binding.pull(buffer)?.padded;
        }

        self.steps += 1;
        let next_time = self.clock.next_hit_time()?;

        debug!(
            federate = %self.federate.name(),
            step = self.steps,
            granted_time,
            padded_slots,
            "step complete"
        );

        Ok(StepResult {
            step: self.steps,
            granted_time,
            next_time,
            num_published: self.publications.len(),
            num_pulled: self.inputs.len(),
            padded_slots,
        })
    }

    /// Buffer the host writes before the next `step`
    pub fn publication_buffer_mut(&mut self, index: usize) -> Option<&mut PortBuffer> {
        self.publication_buffers.get_mut(index)
    }

    /// Buffer filled by the most recent `step`
    pub fn input_buffer(&self, index: usize) -> Option<&PortBuffer> {
        self.input_buffers.get(index)
    }

    pub fn num_publications(&self) -> usize {
        self.publications.len()
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    /// Endpoint names of the bound publications, in port order
    pub fn publication_names(&self) -> Vec<&str> {
        self.publications.iter().filter_map(|p| p.endpoint_name()).collect()
    }

    /// Endpoint names of the bound inputs, in port order
    pub fn input_names(&self) -> Vec<&str> {
        self.inputs.iter().filter_map(|i| i.endpoint_name()).collect()
    }

    /// Number of completed steps
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Last granted time (0 right after `start`)
    pub fn granted_time(&self) -> Option<Time> {
        self.clock.last_granted_time()
    }

    pub fn federate(&self) -> &'fed Federate<B> {
        self.federate
    }

    /// Run-end hook: destroys the federate
    pub fn finish(self) -> BridgeResult<()> {
        info!(federate = %self.federate.name(), steps = self.steps, "bridge finished");
        self.federate.destroy()
    }
}

//! Input binding: bus to host

use super::{check_declared_type, display_name, not_found, Endpoint, PortBinding, PortSelector, Resolution};
use crate::bus::FederationBus;
use crate::error::{BridgeError, BridgeResult};
use crate::lifecycle::Federate;
use crate::marshal::{self, Fill};
use crate::models::buffer::{PortBuffer, PortDescriptor};
use crate::models::value::ValueType;
use tracing::{debug, trace};

/// Slot accounting of one pull
pub type PullReport = Fill;

/// Binds one host input port to one bus input
///
/// # Example
///
/// Peers push, advance time, then pull:
///
/// ```
/// use federate_bridge_core_rs::bus::loopback::LoopbackBus;
/// use federate_bridge_core_rs::{
///     ConfigSource, Federate, InputBinding, PortBuffer, PortDescriptor, PublicationBinding, TimeSynchronizer,
///     ValueType, UNSET_SENTINEL,
/// };
///
/// let bus = LoopbackBus::new();
/// let writer = Federate::create(
///     bus.clone(),
///     &ConfigSource::Json(r#"{"name": "writer", "period": 1.0, "publications": [{"key": "out", "type": "vector"}]}"#.to_string()),
/// )
/// .unwrap();
/// let reader = Federate::create(
///     bus,
///     &ConfigSource::Json(r#"{"name": "reader", "period": 1.0, "subscriptions": [{"key": "writer/out", "type": "vector"}]}"#.to_string()),
/// )
/// .unwrap();
///
/// let mut output = PublicationBinding::new(&writer, "out", PortDescriptor::new(2, ValueType::Vector).unwrap());
/// let descriptor = PortDescriptor::new(3, ValueType::Double).unwrap();
/// let mut input = InputBinding::new(&reader, 0, descriptor);
///
/// for federate in [&writer, &reader] {
///     federate.enter_initializing().unwrap();
///     federate.enter_executing().unwrap();
/// }
/// let mut writer_clock = TimeSynchronizer::new(&writer).unwrap();
/// let mut reader_clock = TimeSynchronizer::new(&reader).unwrap();
///
/// output.push(&PortBuffer::Double(vec![1.0, 2.0])).unwrap();
/// writer_clock.mark_exchanged();
/// writer_clock.request_time(1.0).unwrap();
/// reader_clock.request_time(1.0).unwrap();
///
/// let mut buffer = descriptor.allocate();
/// let report = input.pull(&mut buffer).unwrap();
/// assert_eq!(buffer.as_doubles(), Some(&[1.0, 2.0, UNSET_SENTINEL][..]));
/// assert_eq!(report.padded, 1);
/// ```
pub struct InputBinding<'fed, B: FederationBus> {
    federate: &'fed Federate<B>,
    selector: PortSelector,
    descriptor: PortDescriptor,
    resolution: Resolution<B::InputHandle>,
}

impl<'fed, B: FederationBus> InputBinding<'fed, B> {
    pub fn new(federate: &'fed Federate<B>, selector: impl Into<PortSelector>, descriptor: PortDescriptor) -> Self {
        Self {
            federate,
            selector: selector.into(),
            descriptor,
            resolution: Resolution::Pending,
        }
    }

    /// Resolved endpoint, if resolution succeeded
    pub fn endpoint(&self) -> Option<&Endpoint<B::InputHandle>> {
        self.resolution.endpoint()
    }

    /// Read the input's current value into `buffer`
    ///
    /// Double ports wider than one slot pull a vector and pad missing
    /// elements with `UNSET_SENTINEL`; width-1 double ports pull a scalar.
    ///
    /// # Errors
    ///
    /// - `InvalidFederate` on a destroyed federate
    /// - `Sequence` before executing mode
    /// - `Marshal` if `buffer` does not match the descriptor
    /// - `NotFound` if the endpoint does not resolve
    /// - `State` if the bus fails the read
    pub fn pull(&mut self, buffer: &mut PortBuffer) -> BridgeResult<PullReport> {
        self.federate.ensure_executing("input pull")?;
        marshal::check_shape(&self.descriptor, buffer)?;
        let kind = marshal::request_kind(&self.descriptor)?;

        let federate = self.federate;
        let endpoint = self.endpoint_or_resolve()?;
        let value = federate.bus().input_value(endpoint.handle, kind).map_err(|e| {
            BridgeError::State(format!("reading input {} failed: {}", endpoint.name, e))
        })?;
        let fill = marshal::decode_into(&value, buffer)?;

        trace!(
            input = %endpoint.name,
            kind = %kind,
            received = value.len(),
            padded = fill.padded,
            truncated = fill.truncated,
            "pulled"
        );
        Ok(fill)
    }

    fn endpoint_or_resolve(&mut self) -> BridgeResult<&Endpoint<B::InputHandle>> {
        let Self {
            federate,
            selector,
            descriptor,
            resolution,
        } = self;
        resolution.get_or_resolve(|| lookup(federate, selector, descriptor))
    }
}

fn lookup<B: FederationBus>(
    federate: &Federate<B>,
    selector: &PortSelector,
    descriptor: &PortDescriptor,
) -> BridgeResult<Endpoint<B::InputHandle>> {
    federate.ensure_valid()?;
    marshal::request_kind(descriptor)?;

    let bus = federate.bus();
    let handle = match selector {
        PortSelector::Name(name) => bus.input_by_name(federate.handle(), name),
        PortSelector::Index(index) => bus.input_by_index(federate.handle(), *index),
    }
    .map_err(|e| not_found(selector, e))?;

    let name = display_name(bus.input_name(handle).map_err(|e| not_found(selector, e))?, selector);
    let declared_type = bus
        .input_type(handle)
        .map(|type_name| ValueType::from_type_name(&type_name))
        .map_err(|e| not_found(selector, e))?;
    check_declared_type(declared_type)?;

    debug!(
        federate = %federate.name(),
        selector = %selector,
        input = %name,
        declared = ?declared_type,
        width = descriptor.width,
        "resolved input"
    );
    Ok(Endpoint {
        handle,
        name,
        declared_type,
    })
}

impl<'fed, B: FederationBus> PortBinding for InputBinding<'fed, B> {
    fn resolve(&mut self) -> BridgeResult<()> {
        self.endpoint_or_resolve().map(|_| ())
    }

    fn is_resolved(&self) -> bool {
        self.resolution.endpoint().is_some()
    }

    fn selector(&self) -> &PortSelector {
        &self.selector
    }

    fn descriptor(&self) -> &PortDescriptor {
        &self.descriptor
    }

    fn endpoint_name(&self) -> Option<&str> {
        self.resolution.endpoint().map(|e| e.name.as_str())
    }
}

//! Publication binding: host to bus

use super::{check_declared_type, display_name, not_found, Endpoint, PortBinding, PortSelector, Resolution};
use crate::bus::FederationBus;
use crate::error::{BridgeError, BridgeResult};
use crate::lifecycle::Federate;
use crate::marshal;
use crate::models::buffer::{PortBuffer, PortDescriptor};
use crate::models::value::{BusValue, ValueType};
use tracing::{debug, trace};

/// Binds one host output port to one bus publication
pub struct PublicationBinding<'fed, B: FederationBus> {
    federate: &'fed Federate<B>,
    selector: PortSelector,
    descriptor: PortDescriptor,
    resolution: Resolution<B::PublicationHandle>,
}

impl<'fed, B: FederationBus> PublicationBinding<'fed, B> {
    pub fn new(federate: &'fed Federate<B>, selector: impl Into<PortSelector>, descriptor: PortDescriptor) -> Self {
        Self {
            federate,
            selector: selector.into(),
            descriptor,
            resolution: Resolution::Pending,
        }
    }

    /// Resolved endpoint, if resolution succeeded
    pub fn endpoint(&self) -> Option<&Endpoint<B::PublicationHandle>> {
        self.resolution.endpoint()
    }

    /// Publish the contents of `buffer`
    ///
    /// Does not block. The value becomes visible to subscribers once their
    /// granted time passes the publisher's current time.
    ///
    /// # Errors
    ///
    /// Same as `InputBinding::pull`.
    pub fn push(&mut self, buffer: &PortBuffer) -> BridgeResult<()> {
        self.federate.ensure_executing("publication push")?;
        marshal::check_shape(&self.descriptor, buffer)?;
        let value = marshal::encode(buffer, self.descriptor.value_type)?;

        let federate = self.federate;
        let endpoint = self.endpoint_or_resolve()?;
        federate
            .bus()
            .publish(endpoint.handle, &value)
            .map_err(|e| BridgeError::State(format!("publishing {} failed: {}", endpoint.name, e)))?;

        trace!(publication = %endpoint.name, value = %summary(&value), "pushed");
        Ok(())
    }

    fn endpoint_or_resolve(&mut self) -> BridgeResult<&Endpoint<B::PublicationHandle>> {
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
) -> BridgeResult<Endpoint<B::PublicationHandle>> {
    federate.ensure_valid()?;
    if !descriptor.value_type.is_exchangeable() {
        return Err(marshal::MarshalError::Unsupported(descriptor.value_type).into());
    }

    let bus = federate.bus();
    let handle = match selector {
        PortSelector::Name(name) => bus.publication_by_name(federate.handle(), name),
        PortSelector::Index(index) => bus.publication_by_index(federate.handle(), *index),
    }
    .map_err(|e| not_found(selector, e))?;

    let name = display_name(
        bus.publication_name(handle).map_err(|e| not_found(selector, e))?,
        selector,
    );
    let declared_type = bus
        .publication_type(handle)
        .map(|type_name| ValueType::from_type_name(&type_name))
        .map_err(|e| not_found(selector, e))?;
    check_declared_type(declared_type)?;

    debug!(
        federate = %federate.name(),
        selector = %selector,
        publication = %name,
        declared = ?declared_type,
        width = descriptor.width,
        "resolved publication"
    );
    Ok(Endpoint {
        handle,
        name,
        declared_type,
    })
}

/// Short rendering of a value for trace output
fn summary(value: &BusValue) -> String {
    match value {
        BusValue::Double(x) => x.to_string(),
        BusValue::Vector(v) if v.len() <= 4 => format!("{:?}", v),
        other => format!("{} x{}", other.value_type(), other.len()),
    }
}

impl<'fed, B: FederationBus> PortBinding for PublicationBinding<'fed, B> {
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

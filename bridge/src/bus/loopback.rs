//! In-process loopback federation
//!
//! A `LoopbackBus` is a cheap, clonable handle to one shared federation
//! held behind `Arc<Mutex<_>>`. Every federate created through any clone
//! joins the same federation, so several bridges in one process can exchange
//! values exactly as they would through an external bus.
//!
//! # Time semantics
//!
//! The loopback does not run a consensus protocol. Time requests are granted
//! immediately according to the configured `GrantPolicy`. Callers that run
//! several federates in one thread must step them in time order (always the
//! federate with the earliest next hit time) so that a grant never runs
//! ahead of a peer's publications.
//!
//! A value published while the publisher is at granted time `t` becomes
//! visible to a reader once the reader's granted time is strictly greater
//! than `t`. Values published in initializing mode are visible from the
//! first executing instant.
//!
//! # Registration
//!
//! - Local publication keys are registered as `<federate>/<key>`, global
//!   keys as-is; keys must be unique across the federation
//! - Input indices count subscriptions first, then named inputs
//! - Input lookup by name falls back to the target key of a subscription

use crate::bus::{BusError, BusErrorCode, FederationBus, Time, TimeProperty};
use crate::config::FederateConfig;
use crate::models::value::{BusValue, Complex, ValueType};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, trace};

/// Value returned for a scalar double input that has never received data
/// and has no configured default
pub const MISSING_DOUBLE: f64 = -1e49;

/// Handle of a loopback federate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FederateId(usize);

/// Handle of a loopback publication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicationId(usize);

/// Handle of a loopback input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputId(usize);

/// How requested times are turned into granted times
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum GrantPolicy {
    /// Grant exactly the requested time
    #[default]
    Immediate,
    /// Grant the largest multiple of `quantum` not above the request
    Quantized { quantum: Time },
}

impl GrantPolicy {
    fn grant(&self, requested: Time, current: Time) -> Time {
        let granted = match *self {
            GrantPolicy::Immediate => requested,
            GrantPolicy::Quantized { quantum } if quantum > 0.0 => (requested / quantum).floor() * quantum,
            GrantPolicy::Quantized { .. } => requested,
        };
        granted.max(current)
    }
}

/// Call counters kept by the loopback federation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusStats {
    pub federates_created: u32,
    pub federates_destroyed: u32,
    /// Mode-change calls that reached the bus
    pub mode_transitions: u32,
    /// Endpoint lookups by name or index, successful or not
    pub lookups: u32,
    pub publishes: u32,
    pub time_requests: u32,
    pub value_reads: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Startup,
    Initializing,
    Executing,
    Finalized,
}

#[derive(Debug)]
struct FederateSlot {
    name: String,
    period: Option<Time>,
    mode: Mode,
    granted: Time,
    freed: bool,
    publications: Vec<usize>,
    inputs: Vec<usize>,
}

impl FederateSlot {
    /// Time at which this federate observes the federation
    fn observed_time(&self) -> Time {
        match self.mode {
            Mode::Executing => self.granted,
            _ => Time::NEG_INFINITY,
        }
    }
}

#[derive(Debug)]
struct PublicationSlot {
    owner: usize,
    key: String,
    local_key: String,
    value_type: String,
    history: VecDeque<(Time, BusValue)>,
}

#[derive(Debug)]
struct InputSlot {
    owner: usize,
    name: String,
    local_name: String,
    value_type: String,
    targets: Vec<String>,
    default: Option<f64>,
}

#[derive(Debug, Default)]
struct Federation {
    federates: Vec<FederateSlot>,
    publications: Vec<PublicationSlot>,
    inputs: Vec<InputSlot>,
    grant_policy: GrantPolicy,
    injected_failure: Option<BusError>,
    stats: BusStats,
}

impl Federation {
    fn federate(&self, id: FederateId) -> Result<&FederateSlot, BusError> {
        match self.federates.get(id.0) {
            Some(slot) if !slot.freed => Ok(slot),
            _ => Err(BusError::new(BusErrorCode::InvalidObject, "federate object is not valid")),
        }
    }

    fn federate_mut(&mut self, id: FederateId) -> Result<&mut FederateSlot, BusError> {
        match self.federates.get_mut(id.0) {
            Some(slot) if !slot.freed => Ok(slot),
            _ => Err(BusError::new(BusErrorCode::InvalidObject, "federate object is not valid")),
        }
    }

    fn publication(&self, id: PublicationId) -> Result<&PublicationSlot, BusError> {
        self.publications
            .get(id.0)
            .filter(|p| !self.federates[p.owner].freed)
            .ok_or_else(|| BusError::new(BusErrorCode::InvalidObject, "publication object is not valid"))
    }

    fn input(&self, id: InputId) -> Result<&InputSlot, BusError> {
        self.inputs
            .get(id.0)
            .filter(|i| !self.federates[i.owner].freed)
            .ok_or_else(|| BusError::new(BusErrorCode::InvalidObject, "input object is not valid"))
    }

    fn live_publication_key(&self, key: &str) -> Option<usize> {
        self.publications
            .iter()
            .position(|p| p.key == key && !self.federates[p.owner].freed)
    }

    /// Earliest time any live federate observes or will observe
    ///
    /// A federate that has not reached executing mode yet starts reading at
    /// time zero.
    fn earliest_reader_time(&self) -> Option<Time> {
        self.federates
            .iter()
            .filter(|f| !f.freed)
            .map(|f| match f.mode {
                Mode::Executing => f.granted,
                Mode::Startup | Mode::Initializing | Mode::Finalized => 0.0,
            })
            .reduce(Time::min)
    }

    fn register(&mut self, config: &FederateConfig) -> Result<FederateId, BusError> {
        if self.federates.iter().any(|f| !f.freed && f.name == config.name) {
            return Err(BusError::new(
                BusErrorCode::RegistrationFailure,
                format!("duplicate federate name '{}'", config.name),
            ));
        }

        let owner = self.federates.len();
        let mut publication_ids = Vec::with_capacity(config.publications.len());
        let mut publications = Vec::with_capacity(config.publications.len());
        for publication in &config.publications {
            let key = if publication.global {
                publication.key.clone()
            } else {
                format!("{}/{}", config.name, publication.key)
            };
            if self.live_publication_key(&key).is_some() || publications.iter().any(|p: &PublicationSlot| p.key == key) {
                return Err(BusError::new(
                    BusErrorCode::RegistrationFailure,
                    format!("duplicate publication key '{}'", key),
                ));
            }
            publication_ids.push(self.publications.len() + publications.len());
            publications.push(PublicationSlot {
                owner,
                key,
                local_key: publication.key.clone(),
                value_type: publication.value_type.clone(),
                history: VecDeque::new(),
            });
        }

        let mut input_ids = Vec::new();
        let mut inputs = Vec::new();
        for subscription in &config.subscriptions {
            input_ids.push(self.inputs.len() + inputs.len());
            inputs.push(InputSlot {
                owner,
                name: String::new(),
                local_name: String::new(),
                value_type: subscription.value_type.clone(),
                targets: vec![subscription.key.clone()],
                default: subscription.default,
            });
        }
        for input in &config.inputs {
            let name = if input.global {
                input.key.clone()
            } else {
                format!("{}/{}", config.name, input.key)
            };
            input_ids.push(self.inputs.len() + inputs.len());
            inputs.push(InputSlot {
                owner,
                name,
                local_name: input.key.clone(),
                value_type: input.value_type.clone(),
                targets: input.targets.clone(),
                default: input.default,
            });
        }

        self.publications.extend(publications);
        self.inputs.extend(inputs);
        self.federates.push(FederateSlot {
            name: config.name.clone(),
            period: config.period,
            mode: Mode::Startup,
            granted: 0.0,
            freed: false,
            publications: publication_ids,
            inputs: input_ids,
        });
        self.stats.federates_created += 1;
        Ok(FederateId(owner))
    }

    fn current_value(&self, input: &InputSlot) -> Option<BusValue> {
        let reader_time = self.federates[input.owner].observed_time();
        input
            .targets
            .iter()
            .filter_map(|target| self.live_publication_key(target))
            .find_map(|index| {
                self.publications[index]
                    .history
                    .iter()
                    .rev()
                    .find(|(published_at, _)| *published_at < reader_time)
                    .map(|(_, value)| value.clone())
            })
    }
}

/// Handle to a shared in-process federation
#[derive(Debug, Clone, Default)]
pub struct LoopbackBus {
    inner: Arc<Mutex<Federation>>,
}

impl LoopbackBus {
    /// Create an empty federation
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty federation with a grant policy
    pub fn with_grant_policy(policy: GrantPolicy) -> Self {
        let bus = Self::new();
        bus.set_grant_policy(policy);
        bus
    }

    pub fn set_grant_policy(&self, policy: GrantPolicy) {
        self.lock().grant_policy = policy;
    }

    /// Make the next `request_time` call (by any federate) fail with `error`
    pub fn fail_next_time_request(&self, error: BusError) {
        self.lock().injected_failure = Some(error);
    }

    /// Snapshot of the call counters
    pub fn stats(&self) -> BusStats {
        self.lock().stats
    }

    /// Granted time of a live federate, looked up by name
    pub fn granted_time(&self, name: &str) -> Option<Time> {
        self.lock()
            .federates
            .iter()
            .find(|f| !f.freed && f.name == name)
            .map(|f| f.granted)
    }

    fn lock(&self) -> MutexGuard<'_, Federation> {
        // A panic while holding the lock cannot leave the federation
        // half-updated in a way later calls depend on
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl FederationBus for LoopbackBus {
    type FederateHandle = FederateId;
    type PublicationHandle = PublicationId;
    type InputHandle = InputId;

    fn create_federate(&self, config: &FederateConfig) -> Result<FederateId, BusError> {
        let id = self.lock().register(config)?;
        debug!(federate = %config.name, ?id, "registered loopback federate");
        Ok(id)
    }

    fn federate_is_valid(&self, fed: FederateId) -> bool {
        self.lock().federate(fed).is_ok()
    }

    fn federate_name(&self, fed: FederateId) -> Result<String, BusError> {
        Ok(self.lock().federate(fed)?.name.clone())
    }

    fn enter_initializing_mode(&self, fed: FederateId) -> Result<(), BusError> {
        let mut federation = self.lock();
        federation.stats.mode_transitions += 1;
        let slot = federation.federate_mut(fed)?;
        match slot.mode {
            Mode::Startup => {
                slot.mode = Mode::Initializing;
                Ok(())
            }
            _ => Err(BusError::new(
                BusErrorCode::InvalidStateTransition,
                "cannot enter initializing mode from the current state",
            )),
        }
    }

    fn enter_executing_mode(&self, fed: FederateId) -> Result<(), BusError> {
        let mut federation = self.lock();
        federation.stats.mode_transitions += 1;
        let slot = federation.federate_mut(fed)?;
        match slot.mode {
            Mode::Startup | Mode::Initializing => {
                slot.mode = Mode::Executing;
                slot.granted = 0.0;
                Ok(())
            }
            Mode::Executing => Ok(()),
            Mode::Finalized => Err(BusError::new(
                BusErrorCode::InvalidStateTransition,
                "federate is finalized",
            )),
        }
    }

    fn destroy_federate(&self, fed: FederateId) {
        let mut guard = self.lock();
        let federation = &mut *guard;
        if let Some(slot) = federation.federates.get_mut(fed.0) {
            if !slot.freed {
                slot.freed = true;
                slot.mode = Mode::Finalized;
                federation.stats.federates_destroyed += 1;
            }
        }
    }

    fn request_time(&self, fed: FederateId, requested: Time) -> Result<Time, BusError> {
        let mut federation = self.lock();
        federation.stats.time_requests += 1;
        if let Some(error) = federation.injected_failure.take() {
            return Err(error);
        }
        let policy = federation.grant_policy;
        let slot = federation.federate_mut(fed)?;
        if slot.mode != Mode::Executing {
            return Err(BusError::new(
                BusErrorCode::InvalidFunctionCall,
                "time request is only valid in executing mode",
            ));
        }
        let granted = policy.grant(requested, slot.granted);
        slot.granted = granted;
        trace!(federate = %slot.name, requested, granted, "loopback time grant");
        Ok(granted)
    }

    fn time_property(&self, fed: FederateId, property: TimeProperty) -> Result<Time, BusError> {
        let federation = self.lock();
        let slot = federation.federate(fed)?;
        match property {
            TimeProperty::Period => Ok(slot.period.unwrap_or(0.0)),
        }
    }

    fn publication_by_name(&self, fed: FederateId, name: &str) -> Result<PublicationId, BusError> {
        let mut federation = self.lock();
        federation.stats.lookups += 1;
        let federation = &*federation;
        let slot = federation.federate(fed)?;
        slot.publications
            .iter()
            .copied()
            .find(|&index| {
                let publication = &federation.publications[index];
                publication.key == name || publication.local_key == name
            })
            .map(PublicationId)
            .ok_or_else(|| {
                BusError::new(
                    BusErrorCode::InvalidArgument,
                    format!("the specified publication name '{}' is not a recognized publication", name),
                )
            })
    }

    fn publication_by_index(&self, fed: FederateId, index: usize) -> Result<PublicationId, BusError> {
        let mut federation = self.lock();
        federation.stats.lookups += 1;
        let slot = federation.federate(fed)?;
        slot.publications
            .get(index)
            .copied()
            .map(PublicationId)
            .ok_or_else(|| BusError::new(BusErrorCode::InvalidArgument, format!("the index {} is not valid", index)))
    }

    fn input_by_name(&self, fed: FederateId, name: &str) -> Result<InputId, BusError> {
        let mut federation = self.lock();
        federation.stats.lookups += 1;
        let federation = &*federation;
        let slot = federation.federate(fed)?;
        let by_name = slot.inputs.iter().copied().find(|&index| {
            let input = &federation.inputs[index];
            !input.name.is_empty() && (input.name == name || input.local_name == name)
        });
        let by_target = || {
            slot.inputs
                .iter()
                .copied()
                .find(|&index| federation.inputs[index].targets.iter().any(|t| t == name))
        };
        by_name
            .or_else(by_target)
            .map(InputId)
            .ok_or_else(|| {
                BusError::new(
                    BusErrorCode::InvalidArgument,
                    format!("the specified input name '{}' is not a recognized input", name),
                )
            })
    }

    fn input_by_index(&self, fed: FederateId, index: usize) -> Result<InputId, BusError> {
        let mut federation = self.lock();
        federation.stats.lookups += 1;
        let slot = federation.federate(fed)?;
        slot.inputs
            .get(index)
            .copied()
            .map(InputId)
            .ok_or_else(|| BusError::new(BusErrorCode::InvalidArgument, format!("the index {} is not valid", index)))
    }

    fn publication_name(&self, publication: PublicationId) -> Result<String, BusError> {
        Ok(self.lock().publication(publication)?.key.clone())
    }

    fn publication_type(&self, publication: PublicationId) -> Result<String, BusError> {
        Ok(self.lock().publication(publication)?.value_type.clone())
    }

    fn input_name(&self, input: InputId) -> Result<String, BusError> {
        Ok(self.lock().input(input)?.name.clone())
    }

    fn input_type(&self, input: InputId) -> Result<String, BusError> {
        Ok(self.lock().input(input)?.value_type.clone())
    }

    fn publish(&self, publication: PublicationId, value: &BusValue) -> Result<(), BusError> {
        let mut federation = self.lock();
        federation.stats.publishes += 1;
        let owner = federation.publication(publication)?.owner;
        let published_at = match federation.federates[owner].mode {
            Mode::Executing => federation.federates[owner].granted,
            Mode::Initializing => Time::NEG_INFINITY,
            Mode::Startup | Mode::Finalized => {
                return Err(BusError::new(
                    BusErrorCode::InvalidFunctionCall,
                    "publish is only valid in initializing or executing mode",
                ))
            }
        };
        let earliest_reader = federation.earliest_reader_time();

        let history = &mut federation.publications[publication.0].history;
        let same_instant = matches!(history.back(), Some((last_time, _)) if *last_time == published_at);
        if same_instant {
            if let Some(last) = history.back_mut() {
                last.1 = value.clone();
            }
        } else {
            history.push_back((published_at, value.clone()));
        }
        // An entry is dead once its successor is visible to every reader
        if let Some(earliest) = earliest_reader {
            while history.len() > 1 && history[1].0 < earliest {
                history.pop_front();
            }
        }
        Ok(())
    }

    fn input_value(&self, input: InputId, kind: ValueType) -> Result<BusValue, BusError> {
        let mut federation = self.lock();
        federation.stats.value_reads += 1;
        let slot = federation.input(input)?;
        let value = match federation.current_value(slot) {
            Some(value) => value,
            None => return Ok(missing_value(kind, slot.default)),
        };
        convert(&value, kind)
    }
}

/// Value reported for an input that has not received anything yet
fn missing_value(kind: ValueType, default: Option<f64>) -> BusValue {
    match kind {
        ValueType::Double => BusValue::Double(default.unwrap_or(MISSING_DOUBLE)),
        ValueType::Vector => BusValue::Vector(default.map(|d| vec![d]).unwrap_or_default()),
        ValueType::Int => BusValue::Int(default.map(|d| d as i64).unwrap_or(0)),
        ValueType::Boolean => BusValue::Boolean(default.map(|d| d != 0.0).unwrap_or(false)),
        ValueType::Complex => BusValue::Complex(Complex::new(default.unwrap_or(MISSING_DOUBLE), 0.0)),
        ValueType::ComplexVector => BusValue::ComplexVector(Vec::new()),
        ValueType::String => BusValue::String(String::new()),
    }
}

/// Convert a stored value to the kind a reader asks for
fn convert(value: &BusValue, kind: ValueType) -> Result<BusValue, BusError> {
    if value.value_type() == kind {
        return Ok(value.clone());
    }

    let numbers: Vec<f64> = match value {
        BusValue::Double(x) => vec![*x],
        BusValue::Vector(v) => v.clone(),
        BusValue::Int(i) => vec![*i as f64],
        BusValue::Boolean(b) => vec![if *b { 1.0 } else { 0.0 }],
        BusValue::Complex(c) => vec![c.re, c.im],
        BusValue::ComplexVector(cv) => cv.iter().flat_map(|c| [c.re, c.im]).collect(),
        BusValue::String(s) => parse_numbers(s)?,
    };
    let scalar = match value {
        BusValue::Complex(c) => c.norm(),
        _ => numbers.first().copied().unwrap_or(MISSING_DOUBLE),
    };

    let converted = match kind {
        ValueType::Double => BusValue::Double(scalar),
        ValueType::Vector => BusValue::Vector(numbers),
        ValueType::Int => BusValue::Int(scalar as i64),
        ValueType::Boolean => BusValue::Boolean(scalar != 0.0),
        ValueType::Complex => BusValue::Complex(Complex::new(
            numbers.first().copied().unwrap_or(0.0),
            numbers.get(1).copied().unwrap_or(0.0),
        )),
        ValueType::ComplexVector => BusValue::ComplexVector(
            numbers
                .chunks(2)
                .map(|pair| Complex::new(pair[0], pair.get(1).copied().unwrap_or(0.0)))
                .collect(),
        ),
        ValueType::String => BusValue::String(match numbers.as_slice() {
            [single] => single.to_string(),
            many => serde_json::to_string(many).unwrap_or_default(),
        }),
    };
    Ok(converted)
}

fn parse_numbers(text: &str) -> Result<Vec<f64>, BusError> {
    let trimmed = text.trim();
    match trimmed {
        "true" => return Ok(vec![1.0]),
        "false" => return Ok(vec![0.0]),
        _ => {}
    }
    if let Ok(x) = trimmed.parse::<f64>() {
        return Ok(vec![x]);
    }
    serde_json::from_str::<Vec<f64>>(trimmed).map_err(|_| {
        BusError::new(
            BusErrorCode::InvalidArgument,
            format!("cannot convert string '{}' to a numeric value", text),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(json: &str) -> FederateConfig {
        FederateConfig::from_json_str(json).unwrap()
    }

    fn executing(bus: &LoopbackBus, json: &str) -> FederateId {
        let fed = bus.create_federate(&config(json)).unwrap();
        bus.enter_initializing_mode(fed).unwrap();
        bus.enter_executing_mode(fed).unwrap();
        fed
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let bus = LoopbackBus::new();
        bus.create_federate(&config(r#"{"name": "a"}"#)).unwrap();
        let err = bus.create_federate(&config(r#"{"name": "a"}"#)).unwrap_err();
        assert_eq!(err.code, BusErrorCode::RegistrationFailure);
    }

    #[test]
    fn test_duplicate_global_keys_rejected() {
        let bus = LoopbackBus::new();
        bus.create_federate(&config(r#"{"name": "a", "publications": [{"key": "x", "global": true}]}"#))
            .unwrap();
        let err = bus
            .create_federate(&config(r#"{"name": "b", "publications": [{"key": "x", "global": true}]}"#))
            .unwrap_err();
        assert_eq!(err.code, BusErrorCode::RegistrationFailure);
    }

    #[test]
    fn test_value_visible_after_reader_advances() {
        let bus = LoopbackBus::new();
        let a = executing(&bus, r#"{"name": "a", "publications": [{"key": "out", "type": "double"}]}"#);
        let b = executing(&bus, r#"{"name": "b", "subscriptions": [{"key": "a/out"}]}"#);
        let publication = bus.publication_by_name(a, "out").unwrap();
        let input = bus.input_by_index(b, 0).unwrap();

        bus.publish(publication, &BusValue::Double(3.5)).unwrap();
        assert_eq!(bus.input_value(input, ValueType::Double).unwrap(), BusValue::Double(MISSING_DOUBLE));

        bus.request_time(b, 1.0).unwrap();
        assert_eq!(bus.input_value(input, ValueType::Double).unwrap(), BusValue::Double(3.5));
    }

    #[test]
    fn test_reader_sees_value_for_its_own_time() {
        let bus = LoopbackBus::new();
        let a = executing(&bus, r#"{"name": "a", "publications": [{"key": "out"}]}"#);
        let b = executing(&bus, r#"{"name": "b", "subscriptions": [{"key": "a/out"}]}"#);
        let publication = bus.publication_by_index(a, 0).unwrap();
        let input = bus.input_by_name(b, "a/out").unwrap();

        bus.publish(publication, &BusValue::Double(1.0)).unwrap();
        bus.request_time(a, 1.0).unwrap();
        bus.publish(publication, &BusValue::Double(2.0)).unwrap();

        bus.request_time(b, 1.0).unwrap();
        assert_eq!(bus.input_value(input, ValueType::Double).unwrap(), BusValue::Double(1.0));
        bus.request_time(b, 2.0).unwrap();
        assert_eq!(bus.input_value(input, ValueType::Double).unwrap(), BusValue::Double(2.0));
    }

    #[test]
    fn test_quantized_grants() {
        let bus = LoopbackBus::with_grant_policy(GrantPolicy::Quantized { quantum: 0.25 });
        let fed = executing(&bus, r#"{"name": "a"}"#);
        assert_eq!(bus.request_time(fed, 0.6).unwrap(), 0.5);
        assert_eq!(bus.request_time(fed, 0.3).unwrap(), 0.5);
        assert_eq!(bus.granted_time("a"), Some(0.5));
    }

    #[test]
    fn test_time_request_requires_executing() {
        let bus = LoopbackBus::new();
        let fed = bus.create_federate(&config(r#"{"name": "a"}"#)).unwrap();
        let err = bus.request_time(fed, 1.0).unwrap_err();
        assert_eq!(err.code, BusErrorCode::InvalidFunctionCall);
    }

    #[test]
    fn test_destroyed_handles_invalid() {
        let bus = LoopbackBus::new();
        let fed = bus.create_federate(&config(r#"{"name": "a", "publications": [{"key": "p"}]}"#)).unwrap();
        let publication = bus.publication_by_index(fed, 0).unwrap();
        bus.destroy_federate(fed);
        bus.destroy_federate(fed);
        assert!(!bus.federate_is_valid(fed));
        assert_eq!(bus.publication_name(publication).unwrap_err().code, BusErrorCode::InvalidObject);
        assert_eq!(bus.stats().federates_destroyed, 1);
    }

    #[test]
    fn test_conversions() {
        assert_eq!(convert(&BusValue::Double(2.0), ValueType::Vector).unwrap(), BusValue::Vector(vec![2.0]));
        assert_eq!(convert(&BusValue::Vector(vec![]), ValueType::Double).unwrap(), BusValue::Double(MISSING_DOUBLE));
        assert_eq!(convert(&BusValue::Double(2.7), ValueType::Int).unwrap(), BusValue::Int(2));
        assert_eq!(convert(&BusValue::Int(0), ValueType::Boolean).unwrap(), BusValue::Boolean(false));
        assert_eq!(
            convert(&BusValue::String("[1, 2]".to_string()), ValueType::Vector).unwrap(),
            BusValue::Vector(vec![1.0, 2.0])
        );
        assert!(convert(&BusValue::String("abc".to_string()), ValueType::Double).is_err());
        assert_eq!(
            convert(&BusValue::Complex(Complex::new(3.0, 4.0)), ValueType::Double).unwrap(),
            BusValue::Double(5.0)
        );
    }

    #[test]
    fn test_history_kept_for_federate_not_yet_executing() {
        let bus = LoopbackBus::new();
        let a = executing(&bus, r#"{"name": "a", "publications": [{"key": "out"}]}"#);
        let b = bus
            .create_federate(&config(r#"{"name": "b", "subscriptions": [{"key": "a/out"}]}"#))
            .unwrap();
        bus.enter_initializing_mode(b).unwrap();
        let publication = bus.publication_by_index(a, 0).unwrap();
        let input = bus.input_by_index(b, 0).unwrap();

        for step in 0..3 {
            bus.publish(publication, &BusValue::Double(step as f64)).unwrap();
            bus.request_time(a, (step + 1) as f64).unwrap();
        }

        bus.enter_executing_mode(b).unwrap();
        bus.request_time(b, 1.0).unwrap();
        assert_eq!(bus.input_value(input, ValueType::Double).unwrap(), BusValue::Double(0.0));
        bus.request_time(b, 3.0).unwrap();
        assert_eq!(bus.input_value(input, ValueType::Double).unwrap(), BusValue::Double(2.0));
    }

    #[test]
    fn test_history_pruned() {
        let bus = LoopbackBus::new();
        let a = executing(&bus, r#"{"name": "a", "publications": [{"key": "out"}]}"#);
        let publication = bus.publication_by_index(a, 0).unwrap();
        for step in 1..=5 {
            bus.publish(publication, &BusValue::Double(step as f64)).unwrap();
            bus.request_time(a, step as f64).unwrap();
        }
        let federation = bus.lock();
        assert!(federation.publications[0].history.len() <= 2);
    }
}

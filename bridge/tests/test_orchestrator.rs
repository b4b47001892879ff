//! Orchestrator integration tests
//!
//! Two federates share one loopback bus and are stepped in lockstep, writer
//! first, the way a host co-simulation drives them.

use federate_bridge_core_rs::bus::loopback::{LoopbackBus, MISSING_DOUBLE};
use federate_bridge_core_rs::logging::init_test_logging;
use federate_bridge_core_rs::{
    BridgeError, BusError, BusErrorCode, ConfigSource, Federate, FederateState, Orchestrator, PortConfig,
    PortDescriptor, ValueType, UNSET_SENTINEL,
};

const WRITER: &str = r#"{
    "name": "writer",
    "period": 1.0,
    "publications": [
        {"key": "signal", "type": "double"},
        {"key": "wave", "type": "vector"}
    ]
}"#;

const READER: &str = r#"{
    "name": "reader",
    "period": 1.0,
    "subscriptions": [
        {"key": "writer/signal", "type": "double"},
        {"key": "writer/wave", "type": "vector"}
    ]
}"#;

fn create(bus: &LoopbackBus, json: &str) -> Federate<LoopbackBus> {
    Federate::create(bus.clone(), &ConfigSource::Json(json.to_string())).unwrap()
}

fn writer_ports() -> Vec<PortConfig> {
    vec![
        PortConfig::publication("signal", PortDescriptor::default()),
        PortConfig::publication("wave", PortDescriptor::new(2, ValueType::Vector).unwrap()),
    ]
}

fn reader_ports() -> Vec<PortConfig> {
    vec![
        PortConfig::input("writer/signal", PortDescriptor::default()),
        PortConfig::input(1, PortDescriptor::new(3, ValueType::Double).unwrap()),
    ]
}

#[test]
fn test_values_arrive_one_step_later() {
    init_test_logging();
    let bus = LoopbackBus::new();
    let writer_fed = create(&bus, WRITER);
    let reader_fed = create(&bus, READER);

    let mut writer = Orchestrator::start(&writer_fed, &writer_ports()).unwrap();
    let mut reader = Orchestrator::start(&reader_fed, &reader_ports()).unwrap();
    assert_eq!(writer.publication_names(), vec!["writer/signal", "writer/wave"]);
    assert_eq!(reader.num_inputs(), 2);

    for step in 1..=3 {
        let value = step as f64 * 10.0;
        writer.publication_buffer_mut(0).unwrap().as_doubles_mut().unwrap()[0] = value;
        writer
            .publication_buffer_mut(1)
            .unwrap()
            .as_doubles_mut()
            .unwrap()
            .copy_from_slice(&[value, -value]);

        let written = writer.step().unwrap();
        let read = reader.step().unwrap();
        assert_eq!(written.granted_time, step as f64);
        assert_eq!(read.granted_time, step as f64);
        assert_eq!(written.num_published, 2);
        assert_eq!(read.num_pulled, 2);
        // Only the third slot of the width-3 input has no data
        assert_eq!(read.padded_slots, 1);

        assert_eq!(reader.input_buffer(0).unwrap().as_doubles(), Some(&[value][..]));
        assert_eq!(
            reader.input_buffer(1).unwrap().as_doubles(),
            Some(&[value, -value, UNSET_SENTINEL][..])
        );
    }

    writer.finish().unwrap();
    reader.finish().unwrap();
    assert_eq!(bus.stats().federates_destroyed, 2);
}

#[test]
fn test_reader_first_sees_previous_step() {
    let bus = LoopbackBus::new();
    let writer_fed = create(&bus, WRITER);
    let reader_fed = create(&bus, READER);
    let mut writer = Orchestrator::start(&writer_fed, &writer_ports()).unwrap();
    let mut reader = Orchestrator::start(&reader_fed, &reader_ports()).unwrap();

    // Reader steps before the writer has pushed anything
    reader.step().unwrap();
    assert_eq!(reader.input_buffer(0).unwrap().as_doubles(), Some(&[MISSING_DOUBLE][..]));

    writer.publication_buffer_mut(0).unwrap().as_doubles_mut().unwrap()[0] = 1.5;
    writer.step().unwrap();
    reader.step().unwrap();
    assert_eq!(reader.input_buffer(0).unwrap().as_doubles(), Some(&[1.5][..]));
}

#[test]
fn test_step_result_times() {
    let bus = LoopbackBus::new();
    let federate = create(&bus, r#"{"name": "solo", "period": 0.5}"#);
    let mut orchestrator = Orchestrator::start(&federate, &[]).unwrap();

    assert_eq!(orchestrator.next_hit_time().unwrap(), 0.5);
    let result = orchestrator.step().unwrap();
    assert_eq!(result.step, 1);
    assert_eq!(result.granted_time, 0.5);
    assert_eq!(result.next_time, 1.0);
    assert_eq!(orchestrator.granted_time(), Some(0.5));
}

#[test]
fn test_unresolvable_port_fails_start() {
    let bus = LoopbackBus::new();
    let federate = create(&bus, WRITER);
    let ports = [
        PortConfig::publication("signal", PortDescriptor::default()),
        PortConfig::publication(9, PortDescriptor::default()),
    ];
    assert!(matches!(
        Orchestrator::start(&federate, &ports),
        Err(BridgeError::NotFound { .. })
    ));
    // Failed before executing mode, and nothing was exchanged
    assert_eq!(federate.state(), FederateState::Initializing);
    assert_eq!(bus.stats().publishes, 0);
}

#[test]
fn test_missing_period_fails_start() {
    let bus = LoopbackBus::new();
    let federate = create(&bus, r#"{"name": "untimed"}"#);
    assert!(matches!(Orchestrator::start(&federate, &[]), Err(BridgeError::Config(_))));
}

#[test]
fn test_bus_failure_aborts_step() {
    let bus = LoopbackBus::new();
    let federate = create(&bus, WRITER);
    let mut orchestrator = Orchestrator::start(&federate, &writer_ports()).unwrap();

    bus.fail_next_time_request(BusError::new(BusErrorCode::ConnectionFailure, "lost broker"));
    assert!(matches!(orchestrator.step(), Err(BridgeError::State(_))));
    // Pushes happened before the failed request
    assert_eq!(bus.stats().publishes, 2);
}

#[test]
fn test_scoped_run_releases_on_error() {
    let bus = LoopbackBus::new();
    let source = ConfigSource::Json(WRITER.to_string());
    let result = Federate::scope(bus.clone(), &source, |federate| {
        let mut orchestrator = Orchestrator::start(federate, &writer_ports())?;
        orchestrator.step()?;
        bus.fail_next_time_request(BusError::new(BusErrorCode::Fatal, "shutdown"));
        orchestrator.step()
    });
    assert!(matches!(result, Err(BridgeError::State(_))));
    assert_eq!(bus.stats().federates_destroyed, 1);
}

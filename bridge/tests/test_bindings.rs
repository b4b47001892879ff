//! Tests for port binding resolution and exchange ordering

use federate_bridge_core_rs::bus::loopback::LoopbackBus;
use federate_bridge_core_rs::{
    BridgeError, ConfigSource, Federate, InputBinding, PortBinding, PortBuffer, PortDescriptor, PortSelector,
    PublicationBinding, TimeSynchronizer, ValueType,
};

const SOURCE: &str = r#"{
    "name": "source",
    "period": 1.0,
    "publications": [
        {"key": "a", "type": "double"},
        {"key": "b", "type": "double"},
        {"key": "shared", "type": "double", "global": true}
    ]
}"#;

const SINK: &str = r#"{
    "name": "sink",
    "period": 1.0,
    "subscriptions": [{"key": "source/a"}],
    "inputs": [{"key": "mix", "type": "double", "targets": ["shared"], "default": 0.5}]
}"#;

fn create(bus: &LoopbackBus, json: &str) -> Federate<LoopbackBus> {
    Federate::create(bus.clone(), &ConfigSource::Json(json.to_string())).unwrap()
}

#[test]
fn test_out_of_range_publication_index() {
    let bus = LoopbackBus::new();
    let federate = create(&bus, SOURCE);
    federate.enter_initializing().unwrap();

    let mut first = PublicationBinding::new(&federate, 0, PortDescriptor::default());
    let mut missing = PublicationBinding::new(&federate, 5, PortDescriptor::default());
    let mut last = PublicationBinding::new(&federate, 2, PortDescriptor::default());

    first.resolve().unwrap();
    match missing.resolve() {
        Err(BridgeError::NotFound { selector, .. }) => assert_eq!(selector, "index 5"),
        other => panic!("expected NotFound, got {:?}", other),
    }
    last.resolve().unwrap();

    assert!(first.is_resolved());
    assert!(!missing.is_resolved());
    assert_eq!(first.endpoint_name(), Some("source/a"));
    assert_eq!(last.endpoint_name(), Some("shared"));

    // The failed binding does not affect exchanges on the others
    federate.enter_executing().unwrap();
    first.push(&PortBuffer::Double(vec![1.0])).unwrap();
    assert!(matches!(
        missing.push(&PortBuffer::Double(vec![1.0])),
        Err(BridgeError::NotFound { .. })
    ));
    last.push(&PortBuffer::Double(vec![2.0])).unwrap();
    assert_eq!(bus.stats().publishes, 2);
}

#[test]
fn test_unknown_input_name() {
    let bus = LoopbackBus::new();
    let federate = create(&bus, SINK);
    let mut input = InputBinding::new(&federate, "nowhere", PortDescriptor::default());
    assert!(matches!(input.resolve(), Err(BridgeError::NotFound { .. })));
    assert_eq!(input.selector(), &PortSelector::Name("nowhere".to_string()));
}

#[test]
fn test_resolution_happens_once() {
    let bus = LoopbackBus::new();
    let source = create(&bus, SOURCE);
    source.enter_initializing().unwrap();
    source.enter_executing().unwrap();

    let before = bus.stats().lookups;
    let mut publication = PublicationBinding::new(&source, "b", PortDescriptor::default());
    for _ in 0..5 {
        publication.push(&PortBuffer::Double(vec![3.0])).unwrap();
    }
    publication.resolve().unwrap();
    assert_eq!(bus.stats().lookups, before + 1);
    assert_eq!(bus.stats().publishes, 5);
}

#[test]
fn test_input_resolution_by_name_and_target() {
    let bus = LoopbackBus::new();
    let federate = create(&bus, SINK);

    let mut by_target = InputBinding::new(&federate, "source/a", PortDescriptor::default());
    let mut by_local = InputBinding::new(&federate, "mix", PortDescriptor::default());
    let mut by_global = InputBinding::new(&federate, "sink/mix", PortDescriptor::default());
    let mut by_index = InputBinding::new(&federate, 0, PortDescriptor::default());
    by_target.resolve().unwrap();
    by_index.resolve().unwrap();
    by_local.resolve().unwrap();
    by_global.resolve().unwrap();

    assert_eq!(by_target.endpoint().unwrap().handle, by_index.endpoint().unwrap().handle);
    assert_eq!(by_local.endpoint().unwrap().handle, by_global.endpoint().unwrap().handle);
    assert_eq!(by_local.endpoint().unwrap().declared_type, Some(ValueType::Double));
    assert_eq!(by_target.endpoint().unwrap().declared_type, None);
}

#[test]
fn test_default_value_before_publish() {
    let bus = LoopbackBus::new();
    let federate = create(&bus, SINK);
    federate.enter_initializing().unwrap();
    federate.enter_executing().unwrap();

    let mut input = InputBinding::new(&federate, "mix", PortDescriptor::default());
    let mut buffer = PortBuffer::Double(vec![0.0]);
    input.pull(&mut buffer).unwrap();
    assert_eq!(buffer.as_doubles(), Some(&[0.5][..]));
}

#[test]
fn test_publish_then_pull_ordering() {
    let bus = LoopbackBus::new();
    let source = create(&bus, SOURCE);
    let sink = create(&bus, SINK);
    for federate in [&source, &sink] {
        federate.enter_initializing().unwrap();
        federate.enter_executing().unwrap();
    }

    let mut out = PublicationBinding::new(&source, "shared", PortDescriptor::default());
    let mut input = InputBinding::new(&sink, "mix", PortDescriptor::default());
    let mut buffer = PortBuffer::Double(vec![0.0]);

    // Published at t=0: not visible while the reader is still at t=0
    out.push(&PortBuffer::Double(vec![7.0])).unwrap();
    input.pull(&mut buffer).unwrap();
    assert_eq!(buffer.as_doubles(), Some(&[0.5][..]));

    let mut sink_sync = TimeSynchronizer::new(&sink).unwrap();
    sink_sync.request_time(1.0).unwrap();
    input.pull(&mut buffer).unwrap();
    assert_eq!(buffer.as_doubles(), Some(&[7.0][..]));
    assert_eq!(bus.granted_time("sink"), Some(1.0));
}

//! Tests for federate lifecycle management

use federate_bridge_core_rs::bus::loopback::LoopbackBus;
use federate_bridge_core_rs::{
    BridgeError, BridgeResult, BusErrorCode, ConfigError, ConfigSource, Federate, FederateState,
};
use std::fs;
use std::path::PathBuf;

fn source(name: &str) -> ConfigSource {
    ConfigSource::Json(format!(r#"{{"name": "{}", "period": 1.0}}"#, name))
}

#[test]
fn test_create_from_inline_json() {
    let federate = Federate::create(LoopbackBus::new(), &source("plant")).unwrap();
    assert_eq!(federate.name(), "plant");
    assert_eq!(federate.state(), FederateState::Unstarted);
    assert!(federate.is_valid());
}

#[test]
fn test_create_from_file() {
    let dir = std::env::temp_dir().join(format!("federate-bridge-lifecycle-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("controller.json");
    fs::write(&path, r#"{"name": "controller", "period": 0.1}"#).unwrap();

    let federate = Federate::create(LoopbackBus::new(), &ConfigSource::File(path.clone())).unwrap();
    assert_eq!(federate.name(), "controller");

    fs::remove_file(path).unwrap();
}

#[test]
fn test_unreadable_config() {
    let result = Federate::create(
        LoopbackBus::new(),
        &ConfigSource::File(PathBuf::from("/nonexistent/federate.json")),
    );
    assert!(matches!(result, Err(BridgeError::Config(ConfigError::Io { .. }))));
}

#[test]
fn test_malformed_config() {
    let result = Federate::create(LoopbackBus::new(), &ConfigSource::Json("{\"name\": ".to_string()));
    assert!(matches!(result, Err(BridgeError::Config(ConfigError::Parse(_)))));
}

#[test]
fn test_bus_rejection_leaves_no_handle() {
    let bus = LoopbackBus::new();
    let _first = Federate::create(bus.clone(), &source("dup")).unwrap();
    match Federate::create(bus.clone(), &source("dup")) {
        Err(BridgeError::Config(ConfigError::Rejected(e))) => {
            assert_eq!(e.code, BusErrorCode::RegistrationFailure)
        }
        other => panic!("expected bus rejection, got {:?}", other),
    }
    assert_eq!(bus.stats().federates_created, 1);
}

#[test]
fn test_executing_requires_initializing() {
    let federate = Federate::create(LoopbackBus::new(), &source("fed")).unwrap();
    assert!(matches!(federate.enter_executing(), Err(BridgeError::Sequence(_))));
    assert_eq!(federate.state(), FederateState::Unstarted);
}

#[test]
fn test_full_lifecycle() {
    let bus = LoopbackBus::new();
    let federate = Federate::create(bus.clone(), &source("fed")).unwrap();

    federate.enter_initializing().unwrap();
    assert_eq!(federate.state(), FederateState::Initializing);
    federate.enter_executing().unwrap();
    assert_eq!(federate.state(), FederateState::Executing);
    federate.destroy().unwrap();
    assert_eq!(federate.state(), FederateState::Terminated);

    assert_eq!(bus.stats().mode_transitions, 2);
    assert_eq!(bus.stats().federates_destroyed, 1);
}

#[test]
fn test_double_destroy() {
    let bus = LoopbackBus::new();
    let federate = Federate::create(bus.clone(), &source("fed")).unwrap();
    federate.destroy().unwrap();
    assert_eq!(federate.destroy(), Err(BridgeError::DoubleFree("fed".to_string())));

    drop(federate);
    assert_eq!(bus.stats().federates_destroyed, 1);
}

#[test]
fn test_ensure_valid_after_destroy() {
    let federate = Federate::create(LoopbackBus::new(), &source("fed")).unwrap();
    federate.destroy().unwrap();
    assert!(matches!(federate.ensure_valid(), Err(BridgeError::InvalidFederate(_))));
}

#[test]
fn test_scope_returns_value_and_destroys() {
    let bus = LoopbackBus::new();
    let value: BridgeResult<String> = Federate::scope(bus.clone(), &source("fed"), |fed| {
        fed.enter_initializing()?;
        fed.enter_executing()?;
        Ok(fed.name().to_string())
    });
    assert_eq!(value, Ok("fed".to_string()));
    assert_eq!(bus.stats().federates_destroyed, 1);
}

#[test]
fn test_scope_reports_destroy_inside_closure() {
    let bus = LoopbackBus::new();
    let result: BridgeResult<()> = Federate::scope(bus, &source("fed"), |fed| fed.destroy());
    assert_eq!(result, Err(BridgeError::DoubleFree("fed".to_string())));
}

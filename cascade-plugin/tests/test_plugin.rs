use cascade_plugin::{InstanceState, RuleEngineModel};
use serde_json::json;
use std::sync::{Arc, Mutex};

fn config_with_source(doc: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    let mut config = serde_json::Map::new();
    config.insert("source".to_string(), json!(doc.to_string()));
    config
}

fn sample_doc() -> serde_json::Value {
    json!({
        "MetaInfo": {
            "Inputs": [{"Name": "a", "Type": "float64"}],
            "Outputs": [{"Name": "tag", "Type": "float64"}]
        },
        "SubRuleSets": [{
            "Rules": [
                {"Condition": "a > 0", "Consequences": [
                    {"Assignment": {"Target": "tag", "Value": "1"}}
                ]},
                {"Condition": "a <= 0", "Consequences": [
                    {"Assignment": {"Target": "tag", "Value": "2"}}
                ]}
            ]
        }]
    })
}

#[test]
fn test_lifecycle() {
    let mut model = RuleEngineModel::new();
    assert_eq!(model.state(), InstanceState::Created);

    assert!(model.init(&config_with_source(sample_doc())));
    assert_eq!(model.state(), InstanceState::Initialized);

    let mut input = serde_json::Map::new();
    input.insert("a".to_string(), json!(5.0));
    assert!(model.set_input(&input));
    assert!(model.tick(0.05));

    let output = model.get_output();
    assert_eq!(output.get("tag"), Some(&json!(1.0)));
    assert_eq!(model.state(), InstanceState::Running);
}

#[test]
fn test_output_carries_identity_and_state() {
    let mut model = RuleEngineModel::new();
    model.set_id(42);
    model.set_model_id("rule-engine");
    model.set_instance_name("unit-7");
    model.set_force_side_id(3);
    assert!(model.init(&config_with_source(sample_doc())));
    assert!(model.tick(0.05));

    let output = model.get_output();
    assert_eq!(output.get("ID"), Some(&json!(42)));
    assert_eq!(output.get("ModelID"), Some(&json!("rule-engine")));
    assert_eq!(output.get("InstanceName"), Some(&json!("unit-7")));
    assert_eq!(output.get("ForceSideID"), Some(&json!(3)));
    assert_eq!(
        output.get("State"),
        Some(&json!(InstanceState::Running as u16))
    );
}

#[test]
fn test_init_failure_sets_error_state_and_allows_retry() {
    let mut model = RuleEngineModel::new();
    let logged = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&logged);
    model.set_log_fn(Box::new(move |message, level| {
        if let Ok(mut lines) = sink.lock() {
            lines.push((message.to_string(), level));
        }
    }));

    let mut bad = serde_json::Map::new();
    bad.insert("source".to_string(), json!("{ not json"));
    assert!(!model.init(&bad));
    assert_eq!(model.state(), InstanceState::Error);
    assert!(logged.lock().map(|l| !l.is_empty()).unwrap_or(false));

    // no partial state remains; a corrected init succeeds
    assert!(model.init(&config_with_source(sample_doc())));
    assert_eq!(model.state(), InstanceState::Initialized);
}

#[test]
fn test_missing_file_fails() {
    let mut model = RuleEngineModel::new();
    let mut config = serde_json::Map::new();
    config.insert("filePath".to_string(), json!("/nonexistent/rule.json"));
    assert!(!model.init(&config));
    assert_eq!(model.state(), InstanceState::Error);
}

#[test]
fn test_tick_before_init_fails() {
    let mut model = RuleEngineModel::new();
    assert!(!model.tick(0.05));
    assert!(!model.set_input(&serde_json::Map::new()));
}

#[test]
fn test_entry_points_round_trip() {
    let instance = cascade_plugin::cascade_create_model_object();
    assert!(!instance.is_null());
    // SAFETY: the pointer was just produced by cascade_create_model_object
    let state = unsafe { (*instance).state() };
    assert_eq!(state, InstanceState::Created);
    cascade_plugin::cascade_destroy_memory(instance, false);
}

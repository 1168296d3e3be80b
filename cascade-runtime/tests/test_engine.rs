use cascade_runtime::{RuleSetEngine, ValueMap};
use serde_json::json;

fn engine_from(doc: serde_json::Value) -> RuleSetEngine {
    let mut engine =
        RuleSetEngine::build_from_source(&doc.to_string()).expect("build failed");
    engine.init().expect("init failed");
    engine
}

fn input_map(value: serde_json::Value) -> ValueMap {
    match value {
        serde_json::Value::Object(map) => map,
        _ => panic!("expected an object"),
    }
}

fn output_num(engine: &RuleSetEngine, name: &str) -> f64 {
    engine
        .output()
        .get(name)
        .and_then(|v| v.as_f64())
        .unwrap_or_else(|| panic!("output {name} missing or not numeric"))
}

fn cache_num(engine: &RuleSetEngine, name: &str) -> f64 {
    engine
        .cache()
        .get(name)
        .and_then(|v| v.as_f64())
        .unwrap_or_else(|| panic!("cache {name} missing or not numeric"))
}

#[test]
fn test_identity_preprocess() {
    // inputs {x}, outputs {y} with y = x; no sub-rule-sets
    let mut engine = engine_from(json!({
        "MetaInfo": {
            "Inputs": [{"Name": "x", "Type": "float64"}],
            "Outputs": [{"Name": "y", "Type": "float64", "Value": "x"}]
        }
    }));
    engine.set_input(&input_map(json!({"x": 3.0})));
    engine.tick().expect("tick failed");
    assert_eq!(output_num(&engine, "y"), 3.0);
    assert!(engine.hit_rules().is_empty());
}

#[test]
fn test_two_rule_cascade() {
    let mut engine = engine_from(json!({
        "MetaInfo": {
            "Inputs": [
                {"Name": "a", "Type": "float64"},
                {"Name": "b", "Type": "float64"}
            ],
            "Outputs": [{"Name": "tag", "Type": "float64"}]
        },
        "SubRuleSets": [{
            "Rules": [
                {"Condition": "a > b", "Consequences": [
                    {"Assignment": {"Target": "tag", "Value": "1"}}
                ]},
                {"Condition": "a <= b", "Consequences": [
                    {"Assignment": {"Target": "tag", "Value": "2"}}
                ]}
            ]
        }]
    }));
    engine.set_input(&input_map(json!({"a": 2.0, "b": 5.0})));
    engine.tick().expect("tick failed");
    assert_eq!(engine.hit_rules(), &[1]);
    assert_eq!(output_num(&engine, "tag"), 2.0);
}

#[test]
fn test_cache_isolation_within_a_tick() {
    // S0 writes c; S1 reads c in the same tick and must see the pre-tick
    // value. The write lands for the next tick.
    let mut engine = engine_from(json!({
        "MetaInfo": {
            "Caches": [{"Name": "c", "Type": "float64", "InitValue": "0.0"}],
            "Outputs": [{"Name": "seen", "Type": "float64"}]
        },
        "SubRuleSets": [
            {"Rules": [{"Condition": "true", "Consequences": [
                {"Assignment": {"Target": "c", "Value": "10"}}
            ]}]},
            {"Rules": [{"Condition": "true", "Consequences": [
                {"Assignment": {"Target": "seen", "Value": "c"}}
            ]}]}
        ]
    }));
    engine.tick().expect("tick failed");
    assert_eq!(output_num(&engine, "seen"), 0.0);
    assert_eq!(cache_num(&engine, "c"), 10.0);

    engine.tick().expect("second tick failed");
    assert_eq!(output_num(&engine, "seen"), 10.0);
}

#[test]
fn test_write_back_commutativity() {
    // only S0 writes v; S1 merely reads it. The post-tick value must be
    // S0's staged value, not S1's stale snapshot.
    let mut engine = engine_from(json!({
        "MetaInfo": {
            "Caches": [{"Name": "v", "Type": "float64", "InitValue": "1"}],
            "Outputs": [{"Name": "echo", "Type": "float64"}]
        },
        "SubRuleSets": [
            {"Rules": [{"Condition": "true", "Consequences": [
                {"Assignment": {"Target": "v", "Value": "42"}}
            ]}]},
            {"Rules": [{"Condition": "v >= 0", "Consequences": [
                {"Assignment": {"Target": "echo", "Value": "v"}}
            ]}]}
        ]
    }));
    engine.tick().expect("tick failed");
    assert_eq!(cache_num(&engine, "v"), 42.0);
    assert_eq!(output_num(&engine, "echo"), 1.0);
}

#[test]
fn test_no_matching_atom_yields_minus_one() {
    let mut engine = engine_from(json!({
        "MetaInfo": {
            "Inputs": [{"Name": "a", "Type": "float64"}],
            "Outputs": [{"Name": "tag", "Type": "float64"}]
        },
        "SubRuleSets": [{
            "Rules": [{"Condition": "a > 100", "Consequences": [
                {"Assignment": {"Target": "tag", "Value": "1"}}
            ]}]
        }]
    }));
    engine.set_input(&input_map(json!({"a": 1.0})));
    engine.tick().expect("tick failed");
    assert_eq!(engine.hit_rules(), &[-1]);
    assert_eq!(output_num(&engine, "tag"), 0.0);
}

#[test]
fn test_intermediate_topological_order() {
    // a = b + 1, b = c * 2, c = input0: evaluated c, b, a
    let mut engine = engine_from(json!({
        "MetaInfo": {
            "Inputs": [{"Name": "input0", "Type": "float64"}],
            "Outputs": [
                {"Name": "a", "Type": "float64", "Value": "b + 1"},
                {"Name": "b", "Type": "float64", "Value": "c * 2"},
                {"Name": "c", "Type": "float64", "Value": "input0"}
            ]
        }
    }));
    engine.set_input(&input_map(json!({"input0": 3.0})));
    engine.tick().expect("tick failed");
    assert_eq!(output_num(&engine, "c"), 3.0);
    assert_eq!(output_num(&engine, "b"), 6.0);
    assert_eq!(output_num(&engine, "a"), 7.0);
}

#[test]
fn test_init_values_applied_once() {
    let mut engine = engine_from(json!({
        "MetaInfo": {
            "Caches": [{"Name": "c", "Type": "float64", "InitValue": "5"}],
            "Outputs": [{"Name": "y", "Type": "float64", "Value": "c"}]
        },
        "SubRuleSets": [{
            "Rules": [{"Condition": "true", "Consequences": [
                {"Assignment": {"Target": "c", "Value": "c + 1"}}
            ]}]
        }]
    }));
    assert_eq!(cache_num(&engine, "c"), 5.0);
    engine.tick().expect("tick failed");
    assert_eq!(cache_num(&engine, "c"), 6.0);
    engine.tick().expect("tick failed");
    // the InitValue does not re-apply per tick
    assert_eq!(cache_num(&engine, "c"), 7.0);
}

#[test]
fn test_fuzzy_helpers_and_math() {
    let mut engine = engine_from(json!({
        "MetaInfo": {
            "Inputs": [{"Name": "x", "Type": "float64"}],
            "Outputs": [
                {"Name": "tri", "Type": "float64", "Value": "trimf(x, 0, 10, 20)"},
                {"Name": "root", "Type": "float64", "Value": "sqrt(x) + pow(2, 3) + min(x, 1)"}
            ]
        }
    }));
    engine.set_input(&input_map(json!({"x": 4.0})));
    engine.tick().expect("tick failed");
    assert!((output_num(&engine, "tri") - 0.4).abs() < 1e-9);
    assert!((output_num(&engine, "root") - 11.0).abs() < 1e-9);
}

#[test]
fn test_string_matching_rule() {
    let mut engine = engine_from(json!({
        "MetaInfo": {
            "Inputs": [{"Name": "callsign", "Type": "string"}],
            "Outputs": [{"Name": "alert", "Type": "float64"}]
        },
        "SubRuleSets": [{
            "Rules": [
                {"Condition": "callsign == \"intruder\"", "Consequences": [
                    {"Assignment": {"Target": "alert", "Value": "1"}}
                ]}
            ]
        }]
    }));
    engine.set_input(&input_map(json!({"callsign": "intruder"})));
    engine.tick().expect("tick failed");
    assert_eq!(output_num(&engine, "alert"), 1.0);
    assert_eq!(engine.hit_rules(), &[0]);

    engine.set_input(&input_map(json!({"callsign": "friendly"})));
    engine.tick().expect("tick failed");
    assert_eq!(engine.hit_rules(), &[-1]);
}

#[test]
fn test_struct_members_and_arrays() {
    let mut engine = engine_from(json!({
        "TypeDefines": [
            {"Name": "Track", "Members": [
                {"Name": "dist", "Type": "float64"},
                {"Name": "id", "Type": "int32"}
            ]}
        ],
        "MetaInfo": {
            "Inputs": [{"Name": "contact", "Type": "Track"}],
            "Caches": [{"Name": "close", "Type": "Track[]"}],
            "Outputs": [{"Name": "count", "Type": "float64"}]
        },
        "SubRuleSets": [{
            "Rules": [
                {"Condition": "contact.dist < 100", "Consequences": [
                    {"Operation": {"Target": "close", "Operation": "push", "Args": ["contact"]}},
                    {"Assignment": {"Target": "count", "Value": "close.length()"}}
                ]}
            ]
        }]
    }));
    engine.set_input(&input_map(json!({"contact": {"dist": 50.0, "id": 7}})));
    engine.tick().expect("tick failed");
    // read-your-writes: the pushed element is visible inside the same atom
    assert_eq!(output_num(&engine, "count"), 1.0);
    engine.tick().expect("tick failed");
    assert_eq!(output_num(&engine, "count"), 2.0);
    let close = engine.cache().get("close").and_then(|v| v.as_array()).expect("close");
    assert_eq!(close.len(), 2);
    assert_eq!(close[0]["id"], json!(7));
}

#[test]
fn test_determinism() {
    let doc = json!({
        "MetaInfo": {
            "Inputs": [{"Name": "x", "Type": "float64"}],
            "Caches": [{"Name": "acc", "Type": "float64", "InitValue": "0"}],
            "Outputs": [{"Name": "y", "Type": "float64"}]
        },
        "SubRuleSets": [
            {"Rules": [
                {"Condition": "x > 0", "Consequences": [
                    {"Assignment": {"Target": "acc", "Value": "acc + x"}}
                ]}
            ]},
            {"Rules": [
                {"Condition": "true", "Consequences": [
                    {"Assignment": {"Target": "y", "Value": "acc * 2"}}
                ]}
            ]}
        ]
    });
    let run = || {
        let mut engine =
            RuleSetEngine::build_from_source(&doc.to_string()).expect("build failed");
        engine.init().expect("init failed");
        let mut outputs = Vec::new();
        for x in [1.0, 2.0, -1.0, 4.0] {
            engine.set_input(&input_map(json!({"x": x})));
            engine.tick().expect("tick failed");
            outputs.push(output_num(&engine, "y"));
        }
        outputs
    };
    assert_eq!(run(), run());
}

#[test]
fn test_empty_sub_rule_set_list_is_preprocess_only() {
    let mut engine = engine_from(json!({
        "MetaInfo": {
            "Inputs": [{"Name": "x", "Type": "float64"}],
            "Outputs": [{"Name": "y", "Type": "float64", "Value": "x * 2"}]
        },
        "SubRuleSets": []
    }));
    engine.set_input(&input_map(json!({"x": 21.0})));
    engine.tick().expect("tick failed");
    assert_eq!(output_num(&engine, "y"), 42.0);
}

#[test]
fn test_output_narrowing() {
    let mut engine = engine_from(json!({
        "MetaInfo": {
            "Inputs": [{"Name": "x", "Type": "float64"}],
            "Outputs": [
                {"Name": "flag", "Type": "bool"},
                {"Name": "level", "Type": "int32"}
            ]
        },
        "SubRuleSets": [{
            "Rules": [{"Condition": "true", "Consequences": [
                {"Assignment": {"Target": "flag", "Value": "x > 1"}},
                {"Assignment": {"Target": "level", "Value": "x + 0.75"}}
            ]}]
        }]
    }));
    engine.set_input(&input_map(json!({"x": 2.0})));
    engine.tick().expect("tick failed");
    assert_eq!(engine.output().get("flag"), Some(&json!(true)));
    assert_eq!(engine.output().get("level"), Some(&json!(2)));
}

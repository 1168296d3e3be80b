use cascade_compiler::ruleset::{read_source, RuleSetMetaInfo, TranslatorError};
use cascade_compiler::ContextStack;
use serde_json::json;

fn translate(doc: serde_json::Value) -> Result<(ContextStack, RuleSetMetaInfo), TranslatorError> {
    let mut ctx = ContextStack::new();
    let mut meta = RuleSetMetaInfo::default();
    read_source(&doc.to_string(), &mut ctx, &mut meta)?;
    Ok((ctx, meta))
}

#[test]
fn test_minimal_document() {
    let (ctx, meta) = translate(json!({
        "Version": "1.0",
        "MetaInfo": {
            "Inputs": [{"Name": "x", "Type": "float64"}],
            "Outputs": [{"Name": "y", "Type": "float64"}]
        }
    }))
    .expect("translation failed");
    assert_eq!(meta.input_vars, vec!["x"]);
    assert_eq!(meta.output_vars, vec!["y"]);
    // pre-defines pulled the tool functions in
    assert!(ctx.global.func_names.contains_key("min"));
    assert!(ctx.global.func_names.contains_key("trapmf"));
    assert!(ctx.global.extern_funcs.contains_key("atan2"));
}

#[test]
fn test_unsupported_version() {
    let result = translate(json!({
        "Version": "2.0",
        "MetaInfo": {}
    }));
    assert!(matches!(
        result,
        Err(TranslatorError::UnsupportedVersion(v)) if v == "2.0"
    ));
}

#[test]
fn test_duplicate_variable_names_rejected() {
    let result = translate(json!({
        "MetaInfo": {
            "Inputs": [{"Name": "x", "Type": "float64"}],
            "Caches": [{"Name": "x", "Type": "float64"}]
        }
    }));
    assert!(matches!(
        result,
        Err(TranslatorError::DuplicateVariable(name)) if name == "x"
    ));
}

#[test]
fn test_bad_init_value_rejected() {
    let result = translate(json!({
        "MetaInfo": {
            "Caches": [{"Name": "c", "Type": "float64", "InitValue": "1e3"}]
        }
    }));
    assert!(matches!(result, Err(TranslatorError::BadInitValue { .. })));
}

#[test]
fn test_self_dependency_rejected() {
    let result = translate(json!({
        "MetaInfo": {
            "Outputs": [{"Name": "y", "Type": "float64", "Value": "y + 1"}]
        }
    }));
    assert!(matches!(
        result,
        Err(TranslatorError::SelfDependency(name)) if name == "y"
    ));
}

#[test]
fn test_cyclic_intermediates_name_participants() {
    let result = translate(json!({
        "MetaInfo": {
            "Inputs": [{"Name": "i", "Type": "float64"}],
            "Outputs": [
                {"Name": "a", "Type": "float64", "Value": "b + 1"},
                {"Name": "b", "Type": "float64", "Value": "a * 2"},
                {"Name": "c", "Type": "float64", "Value": "i"}
            ]
        }
    }));
    match result {
        Err(TranslatorError::CyclicDependency(description)) => {
            assert!(description.contains('a') && description.contains('b'));
            assert!(!description.contains("c ->"));
        }
        other => panic!("expected cyclic dependency error, got {other:?}"),
    }
}

#[test]
fn test_modified_sets_recorded() {
    let (_, meta) = translate(json!({
        "MetaInfo": {
            "Inputs": [{"Name": "a", "Type": "float64"}],
            "Caches": [{"Name": "c", "Type": "float64", "InitValue": "0"}],
            "Outputs": [{"Name": "out", "Type": "float64", "Value": "a + 1"}]
        },
        "SubRuleSets": [{
            "Rules": [
                {
                    "Condition": "a > 0",
                    "Consequences": [
                        {"Assignment": {"Target": "c", "Value": "a"}},
                        {"Assignment": {"Target": "out", "Value": "1"}}
                    ]
                },
                {
                    "Condition": "true",
                    "Consequences": [
                        {"Assignment": {"Target": "c", "Value": "0"}}
                    ]
                }
            ]
        }]
    }))
    .expect("translation failed");

    assert!(meta.preprocess_modified.contains("out"));
    assert_eq!(meta.sub_rule_modified.len(), 1);
    let atoms = &meta.sub_rule_modified[0];
    assert_eq!(atoms.len(), 2);
    assert!(atoms[0].contains("c") && atoms[0].contains("out"));
    assert!(atoms[1].contains("c") && !atoms[1].contains("out"));
}

#[test]
fn test_struct_types_and_array_operations() {
    let (ctx, meta) = translate(json!({
        "TypeDefines": [
            {"Name": "Target", "Members": [
                {"Name": "dist", "Type": "float64"},
                {"Name": "hostile", "Type": "bool"}
            ]}
        ],
        "MetaInfo": {
            "Inputs": [{"Name": "contact", "Type": "Target"}],
            "Outputs": [{"Name": "tracks", "Type": "Target[]"}]
        },
        "SubRuleSets": [{
            "Rules": [{
                "Condition": "contact.dist < 1000",
                "Consequences": [
                    {"Operation": {"Target": "tracks", "Operation": "push", "Args": ["contact"]}}
                ]
            }]
        }]
    }))
    .expect("translation failed");
    assert!(ctx.global.type_defs.contains_key("Target"));
    assert_eq!(
        meta.type_defines.get("Target").map(Vec::len),
        Some(2)
    );
}

#[test]
fn test_reserved_type_name_rejected() {
    let result = translate(json!({
        "TypeDefines": [{"Name": "Cache", "Members": []}],
        "MetaInfo": {}
    }));
    assert!(matches!(result, Err(TranslatorError::ReservedTypeName(_))));
}

#[test]
fn test_string_equality_in_condition() {
    let (_, _) = translate(json!({
        "MetaInfo": {
            "Inputs": [{"Name": "name", "Type": "string"}],
            "Outputs": [{"Name": "flag", "Type": "float64"}]
        },
        "SubRuleSets": [{
            "Rules": [{
                "Condition": "name == \"boss\"",
                "Consequences": [{"Assignment": {"Target": "flag", "Value": "1"}}]
            }]
        }]
    }))
    .expect("string equality should dispatch to the overload");
}

#[test]
fn test_error_codes() {
    use cascade_diagnostics::error_codes;

    let err = translate(json!({
        "MetaInfo": {
            "Caches": [{"Name": "c", "Type": "float64", "InitValue": "1e3"}]
        }
    }))
    .unwrap_err();
    assert_eq!(err.code(), error_codes::BAD_INIT_VALUE);

    let err = translate(json!({
        "Version": "2.0",
        "MetaInfo": {}
    }))
    .unwrap_err();
    assert_eq!(err.code(), error_codes::UNSUPPORTED_VERSION);

    // an unrecognized consequence kind surfaces as a document error
    let err = translate(json!({
        "MetaInfo": {
            "Outputs": [{"Name": "y", "Type": "float64"}]
        },
        "SubRuleSets": [{
            "Rules": [{
                "Condition": "true",
                "Consequences": [{"Frobnicate": {"Target": "y"}}]
            }]
        }]
    }))
    .unwrap_err();
    assert_eq!(err.code(), error_codes::UNKNOWN_CONSEQUENCE);
    assert!(err.report().contains(error_codes::UNKNOWN_CONSEQUENCE));
}

#[test]
fn test_compile_error_carries_stage() {
    let result = translate(json!({
        "MetaInfo": {
            "Inputs": [{"Name": "a", "Type": "float64"}],
            "Outputs": [{"Name": "y", "Type": "float64"}]
        },
        "SubRuleSets": [{
            "Rules": [{
                "Condition": "nonsense_var > 0",
                "Consequences": [{"Assignment": {"Target": "y", "Value": "1"}}]
            }]
        }]
    }));
    match result {
        Err(TranslatorError::Compile { stage, detail }) => {
            assert!(stage.contains("sub-rule-set No.0"), "{stage}");
            assert!(detail.contains("nonsense_var"), "{detail}");
        }
        other => panic!("expected compile error, got {other:?}"),
    }
}

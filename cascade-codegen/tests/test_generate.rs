use cascade_codegen::Generator;
use serde_json::json;

fn sample_doc() -> String {
    json!({
        "TypeDefines": [
            {"Name": "Track", "Members": [
                {"Name": "dist", "Type": "float64"},
                {"Name": "id", "Type": "int32"}
            ]}
        ],
        "MetaInfo": {
            "Inputs": [{"Name": "a", "Type": "float64"}],
            "Caches": [{"Name": "c", "Type": "float64", "InitValue": "0"}],
            "Outputs": [{"Name": "tag", "Type": "float64", "Value": "a * 2"}]
        },
        "SubRuleSets": [{
            "Rules": [
                {"Condition": "a > 10", "Consequences": [
                    {"Assignment": {"Target": "c", "Value": "c + 1"}},
                    {"Assignment": {"Target": "tag", "Value": "1"}}
                ]},
                {"Condition": "a <= 10", "Consequences": [
                    {"Assignment": {"Target": "tag", "Value": "0"}}
                ]}
            ]
        }]
    })
    .to_string()
}

fn generate() -> Vec<(String, String)> {
    Generator::build_from_source(&sample_doc(), "demo-ruleset")
        .expect("build failed")
        .generate()
        .expect("generate failed")
}

fn file<'a>(files: &'a [(String, String)], name: &str) -> &'a str {
    files
        .iter()
        .find(|(path, _)| path == name)
        .map(|(_, content)| content.as_str())
        .unwrap_or_else(|| panic!("missing generated file {name}"))
}

#[test]
fn test_project_skeleton() {
    let files = generate();
    let paths: Vec<&String> = files.iter().map(|(p, _)| p).collect();
    assert!(paths.contains(&&"Cargo.toml".to_string()));
    assert!(paths.contains(&&"src/lib.rs".to_string()));
    assert!(paths.contains(&&"src/types.rs".to_string()));
    assert!(paths.contains(&&"src/funcs.rs".to_string()));
    assert!(paths.contains(&&"src/main.rs".to_string()));

    let cargo = file(&files, "Cargo.toml");
    assert!(cargo.contains("name = \"demo-ruleset\""));
    assert!(cargo.contains("serde_json"));
}

#[test]
fn test_interface_structs() {
    let files = generate();
    let types = file(&files, "src/types.rs");
    assert!(types.contains("pub struct Track"));
    assert!(types.contains("pub struct Input"));
    assert!(types.contains("pub struct Output"));
    assert!(types.contains("pub struct Cache"));
    // numeric members widen to f64 in the compute structs
    assert!(types.contains("pub dist: f64"));
    // and narrow to the declared type on serialization
    assert!(types.contains("as i32"));
    assert!(types.contains("from_value_map"));
    assert!(types.contains("to_value_map"));
}

#[test]
fn test_sub_rule_set_shape() {
    let files = generate();
    let lib = file(&files, "src/lib.rs");
    assert!(lib.contains("struct SubRuleSet0"));
    assert!(lib.contains("fn tick(&mut self, input: &Input, output: &mut Output, cache: &Cache) -> i64"));
    assert!(lib.contains("fn write_back(&mut self, hit: i64, cache: &mut Cache)"));
    // copy-on-read: the snapshot loads the cache field before first use
    assert!(lib.contains("fn load_c(&mut self, base: &Cache)"));
    assert!(lib.contains("self.load_c(cache);"));
    // atom 0 writes the cache, atom 1 does not
    assert!(lib.contains("0 => {"));
    assert!(lib.contains("cache.c = self.cache.c.clone();"));
    assert!(!lib.contains("1 => {"));
}

#[test]
fn test_driver_orchestration() {
    let files = generate();
    let lib = file(&files, "src/lib.rs");
    // preprocess commits directly before any sub-rule-set runs
    let tick_pos = lib.find("pub fn tick").expect("tick missing");
    let sub_pos = lib.find("self.sub_rule_set_0.tick").expect("sub tick missing");
    let preprocess_pos = lib.find("self.output.tag =").expect("preprocess missing");
    assert!(tick_pos < preprocess_pos && preprocess_pos < sub_pos);
    assert!(lib.contains("self.sub_rule_set_0.write_back(hit_0, &mut self.cache);"));
    // InitValue assignment lands in init, not in tick
    let init_pos = lib.find("pub fn init").expect("init missing");
    let init_assign = lib.find("self.cache.c =").expect("init assignment missing");
    assert!(init_pos < init_assign && init_assign < tick_pos);
}

#[test]
fn test_function_library() {
    let files = generate();
    let funcs = file(&files, "src/funcs.rs");
    assert!(funcs.contains("pub fn sin(a: f64) -> f64"));
    assert!(funcs.contains("pub fn str_equal(a: String, b: String) -> f64"));
    // pre-define helpers are emitted under their mangled names
    assert!(funcs.contains("__cascade_"));
    assert!(funcs.contains("trimf") || funcs.contains("trapmf"));
}

#[test]
fn test_condition_produces_boolean_f64() {
    let files = generate();
    let lib = file(&files, "src/lib.rs");
    assert!(lib.contains("as i64 as f64"));
}

//! Host binding for the interpreter back end: per-instance lifecycle,
//! state machine, log callback, and the plugin entry points.
//!
//! `init` builds the rule set from the configured source, `set_input`
//! replaces the input view, `tick` runs one evaluation cycle, and
//! `get_output` serializes the outputs together with the instance identity
//! and the numeric state. Failures log through the registered callback,
//! return `false`, and flip the instance into the error state; a caller
//! may re-invoke `init` with corrected input.

use cascade_diagnostics::{error_codes, Diagnostic, Span};
use cascade_runtime::{EngineError, RuleSetEngine, ValueMap};
use serde_json::Value;
use thiserror::Error;

/// Instance lifecycle states, in host-enum order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum InstanceState {
    Unspecified = 0,
    Created = 1,
    Initialized = 2,
    Running = 3,
    Stopped = 4,
    Destroyed = 5,
    Error = 6,
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("rule-set file \"{0}\" does not exist")]
    RuleSetNotFound(String),
    #[error("failed to read rule-set file \"{path}\": {cause}")]
    UnreadableRuleSet { path: String, cause: String },
    #[error("no \"source\" or \"filePath\" entry in the init configuration")]
    MissingRuleSetConfig,
    #[error("instance is not initialized")]
    NotInitialized,
}

impl HostError {
    pub fn code(&self) -> &'static str {
        match self {
            HostError::RuleSetNotFound(_)
            | HostError::UnreadableRuleSet { .. }
            | HostError::MissingRuleSetConfig => error_codes::RULESET_NOT_FOUND,
            HostError::NotInitialized => error_codes::BAD_PLUGIN_STATE,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.code(), self.to_string(), Span::unknown())
    }
}

/// Log callback: message plus severity level (1 info, 4 error)
pub type LogFn = Box<dyn Fn(&str, u32) + Send>;

pub const LOG_INFO: u32 = 1;
pub const LOG_ERROR: u32 = 4;

/// One rule-engine instance behind the plugin surface
pub struct RuleEngineModel {
    engine: Option<RuleSetEngine>,
    state: InstanceState,
    id: u64,
    model_id: String,
    instance_name: String,
    force_side_id: u16,
    log: Option<LogFn>,
    out_map: ValueMap,
}

impl Default for RuleEngineModel {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleEngineModel {
    pub fn new() -> Self {
        Self {
            engine: None,
            state: InstanceState::Created,
            id: 0,
            model_id: String::new(),
            instance_name: String::new(),
            force_side_id: 0,
            log: None,
            out_map: ValueMap::new(),
        }
    }

    pub fn set_log_fn(&mut self, log: LogFn) {
        self.log = Some(log);
    }

    pub fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    pub fn set_model_id(&mut self, model_id: &str) {
        self.model_id = model_id.to_string();
    }

    pub fn set_instance_name(&mut self, name: &str) {
        self.instance_name = name.to_string();
    }

    pub fn set_force_side_id(&mut self, id: u16) {
        self.force_side_id = id;
    }

    pub fn state(&self) -> InstanceState {
        self.state
    }

    fn write_log(&self, message: &str, level: u32) {
        if let Some(log) = &self.log {
            log(message, level);
        } else if level >= LOG_ERROR {
            log::error!("{message}");
        } else {
            log::info!("{message}");
        }
    }

    /// Build or load the rule set and run its init block. Returns `false`
    /// (and enters the error state) on any failure; no partial state
    /// remains and `init` may be retried.
    pub fn init(&mut self, config: &ValueMap) -> bool {
        self.engine = None;
        match self.try_init(config) {
            Ok(()) => {
                self.state = InstanceState::Initialized;
                true
            }
            Err(message) => {
                self.write_log(&format!("init rule engine error:\n{message}"), LOG_ERROR);
                self.engine = None;
                self.state = InstanceState::Error;
                false
            }
        }
    }

    fn try_init(&mut self, config: &ValueMap) -> Result<(), String> {
        let source = self
            .load_source(config)
            .map_err(|e| e.to_diagnostic().to_string())?;
        let mut engine =
            RuleSetEngine::build_from_source(&source).map_err(|e| e.report())?;
        engine
            .init()
            .map_err(|e| EngineError::Runtime(e).report())?;
        self.engine = Some(engine);
        Ok(())
    }

    fn load_source(&self, config: &ValueMap) -> Result<String, HostError> {
        if let Some(Value::String(source)) = config.get("source") {
            return Ok(source.clone());
        }
        if let Some(Value::String(path)) = config.get("filePath") {
            if !std::path::Path::new(path).exists() {
                return Err(HostError::RuleSetNotFound(path.clone()));
            }
            return std::fs::read_to_string(path).map_err(|e| HostError::UnreadableRuleSet {
                path: path.clone(),
                cause: e.to_string(),
            });
        }
        Err(HostError::MissingRuleSetConfig)
    }

    /// Replace the input view
    pub fn set_input(&mut self, values: &ValueMap) -> bool {
        match &mut self.engine {
            Some(engine) => {
                engine.set_input(values);
                true
            }
            None => {
                self.write_log(
                    &HostError::NotInitialized.to_diagnostic().to_string(),
                    LOG_ERROR,
                );
                false
            }
        }
    }

    /// Run one evaluation cycle and record the rules hit
    pub fn tick(&mut self, _dt: f64) -> bool {
        let Some(engine) = &mut self.engine else {
            self.write_log(
                &HostError::NotInitialized.to_diagnostic().to_string(),
                LOG_ERROR,
            );
            return false;
        };
        match engine.tick() {
            Ok(()) => {
                let report = format!(
                    "rule engine hit rules: {:?}\n\ncache: {}\n\ninput: {}\n\noutput: {}",
                    engine.hit_rules(),
                    Value::Object(engine.cache().clone()),
                    Value::Object(engine.input().clone()),
                    Value::Object(engine.output().clone()),
                );
                self.write_log(&report, LOG_INFO);
                true
            }
            Err(err) => {
                let message =
                    format!("rule engine tick error:\n{}", err.to_diagnostic());
                self.write_log(&message, LOG_ERROR);
                self.state = InstanceState::Error;
                false
            }
        }
    }

    /// Serialize the outputs plus instance identity and state
    pub fn get_output(&mut self) -> &ValueMap {
        self.state = InstanceState::Running;
        self.out_map = self
            .engine
            .as_ref()
            .map(|engine| engine.output().clone())
            .unwrap_or_default();
        self.out_map
            .insert("ForceSideID".to_string(), Value::from(self.force_side_id));
        self.out_map
            .insert("ModelID".to_string(), Value::String(self.model_id.clone()));
        self.out_map.insert(
            "InstanceName".to_string(),
            Value::String(self.instance_name.clone()),
        );
        self.out_map.insert("ID".to_string(), Value::from(self.id));
        self.out_map
            .insert("State".to_string(), Value::from(self.state as u16));
        &self.out_map
    }
}

/// Plugin entry point: allocate a fresh instance and hand it to the host
#[no_mangle]
pub extern "C" fn cascade_create_model_object() -> *mut RuleEngineModel {
    Box::into_raw(Box::new(RuleEngineModel::new()))
}

/// Plugin entry point: release an instance created by
/// `cascade_create_model_object`
#[no_mangle]
pub extern "C" fn cascade_destroy_memory(instance: *mut RuleEngineModel, _is_array: bool) {
    if !instance.is_null() {
        // SAFETY: the pointer came from Box::into_raw in
        // cascade_create_model_object and is dropped exactly once
        drop(unsafe { Box::from_raw(instance) });
    }
}

//! Canonical per-instance value maps plus the rule-set meta info.

use crate::error::RuntimeError;
use crate::value::{default_instance, ValueMap};
use cascade_compiler::ruleset::RuleSetMetaInfo;
use serde_json::Value;

#[derive(Debug, Default)]
pub struct DataStore {
    pub input: ValueMap,
    pub cache: ValueMap,
    pub output: ValueMap,
    pub meta: RuleSetMetaInfo,
}

impl DataStore {
    pub fn new(meta: RuleSetMetaInfo) -> Self {
        Self {
            input: ValueMap::new(),
            cache: ValueMap::new(),
            output: ValueMap::new(),
            meta,
        }
    }

    /// Fill input, cache and output with legal empty instances
    pub fn init(&mut self) -> Result<(), RuntimeError> {
        self.input.clear();
        self.cache.clear();
        self.output.clear();
        for group in 0..3 {
            let names = match group {
                0 => self.meta.input_vars.clone(),
                1 => self.meta.cache_vars.clone(),
                2 => self.meta.output_vars.clone(),
                _ => Vec::new(),
            };
            for name in names {
                let declared = self
                    .meta
                    .declared_type(&name)
                    .ok_or_else(|| RuntimeError::UnknownVariable(name.clone()))?
                    .to_string();
                let instance = default_instance(&self.meta, &declared)?;
                match group {
                    0 => self.input.insert(name, instance),
                    1 => self.cache.insert(name, instance),
                    _ => self.output.insert(name, instance),
                };
            }
        }
        Ok(())
    }

    /// Overlay the incoming input view onto the canonical input map
    pub fn set_input(&mut self, values: &ValueMap) {
        for (key, value) in values {
            self.input.insert(key.clone(), value.clone());
        }
    }

    /// Look a variable up across the three groups, with its declared type
    pub fn get(&self, name: &str) -> Option<(&Value, &str)> {
        let value = self
            .input
            .get(name)
            .or_else(|| self.cache.get(name))
            .or_else(|| self.output.get(name))?;
        let declared = self.meta.declared_type(name)?;
        Some((value, declared))
    }

    /// Store a fully assembled value back into whichever group holds it
    pub fn put_back(&mut self, name: &str, value: Value) {
        if let Some(slot) = self.output.get_mut(name) {
            *slot = value;
        } else if let Some(slot) = self.cache.get_mut(name) {
            *slot = value;
        } else if let Some(slot) = self.input.get_mut(name) {
            *slot = value;
        }
    }
}

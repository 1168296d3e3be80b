//! Copy-on-read staging between the interpreter and the canonical value
//! maps.
//!
//! Reads materialize tokens into a side buffer; member and index accesses
//! materialize child tokens lazily through the relation map so later writes
//! propagate on flush. Writes mark the root variable dirty; `write_back`
//! merges exactly the dirty roots into the canonical store, which is the
//! cache-isolation contract's write-back half.

use crate::error::RuntimeError;
use crate::store::DataStore;
use crate::value::{default_instance, narrow_numeric, read_numeric};
use cascade_compiler::ruleset::{is_numeric_data, RuleSetMetaInfo};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

pub type Token = usize;

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    /// Declared host-surface type of the value ("float64", "Vector3", "T[]")
    ty: String,
}

#[derive(Debug, Default)]
pub struct ResourceHandler {
    buffer: Vec<Slot>,
    /// input/cache/output name -> token
    buffer_map: HashMap<String, Token>,
    /// token -> member name or index -> child token
    relation: HashMap<Token, BTreeMap<String, Token>>,
    /// token -> root variable it was materialized from
    roots: HashMap<Token, String>,
    /// root variables written this run
    dirty: HashSet<String>,
    /// interned string literals
    strings: HashMap<String, Token>,
}

impl ResourceHandler {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, token: Token) -> Result<&Slot, RuntimeError> {
        self.buffer
            .get(token)
            .ok_or_else(|| RuntimeError::ValueShape(format!("dangling token {token}")))
    }

    fn push_slot(&mut self, value: Value, ty: String) -> Token {
        self.buffer.push(Slot { value, ty });
        self.buffer.len() - 1
    }

    /// Intern a string literal
    pub fn take_string(&mut self, s: &str) -> Token {
        if let Some(&token) = self.strings.get(s) {
            return token;
        }
        let token = self.push_slot(Value::String(s.to_string()), "string".to_string());
        self.strings.insert(s.to_string(), token);
        token
    }

    pub fn is_string(&self, token: Token) -> bool {
        self.slot(token)
            .map(|slot| matches!(slot.value, Value::String(_)))
            .unwrap_or(false)
    }

    pub fn read_string(&self, token: Token) -> Result<String, RuntimeError> {
        match &self.slot(token)?.value {
            Value::String(s) => Ok(s.clone()),
            other => Err(RuntimeError::ValueShape(format!(
                "expected a string, found {other}"
            ))),
        }
    }

    /// Read an input/cache/output variable into the buffer; the same name
    /// always resolves to the same token within one run
    pub fn read_in(&mut self, data: &DataStore, name: &str) -> Result<Token, RuntimeError> {
        if let Some(&token) = self.buffer_map.get(name) {
            return Ok(token);
        }
        let (value, declared) = data
            .get(name)
            .ok_or_else(|| RuntimeError::UnknownVariable(name.to_string()))?;
        let token = self.push_slot(value.clone(), declared.to_string());
        self.buffer_map.insert(name.to_string(), token);
        self.roots.insert(token, name.to_string());
        Ok(token)
    }

    /// Create a new empty instance of a declared type
    pub fn make_instance(
        &mut self,
        data: &DataStore,
        type_name: &str,
    ) -> Result<Token, RuntimeError> {
        let value = default_instance(&data.meta, type_name)?;
        Ok(self.push_slot(value, type_name.to_string()))
    }

    pub fn make_instance_like(
        &mut self,
        data: &DataStore,
        token: Token,
    ) -> Result<Token, RuntimeError> {
        let ty = self.slot(token)?.ty.clone();
        self.make_instance(data, &ty)
    }

    /// Materialize a named member of a struct value
    pub fn member_access(
        &mut self,
        data: &DataStore,
        base: Token,
        name: &str,
    ) -> Result<Token, RuntimeError> {
        if let Some(&token) = self.relation.get(&base).and_then(|m| m.get(name)) {
            return Ok(token);
        }
        let slot = self.slot(base)?;
        let base_ty = slot.ty.clone();
        if RuleSetMetaInfo::is_array_type(&base_ty) {
            return Err(RuntimeError::ValueShape(format!(
                "array type \"{base_ty}\" has no member \"{name}\""
            )));
        }
        let member_ty = data
            .meta
            .type_defines
            .get(&base_ty)
            .and_then(|members| {
                members
                    .iter()
                    .find(|(member, _)| member == name)
                    .map(|(_, ty)| ty.clone())
            })
            .ok_or_else(|| {
                RuntimeError::ValueShape(format!("type \"{base_ty}\" has no member \"{name}\""))
            })?;
        let value = match &slot.value {
            Value::Object(map) => map.get(name).cloned().unwrap_or(Value::Null),
            other => {
                return Err(RuntimeError::ValueShape(format!(
                    "expected a struct value, found {other}"
                )))
            }
        };
        let value = if value.is_null() {
            default_instance(&data.meta, &member_ty)?
        } else {
            value
        };
        let token = self.push_slot(value, member_ty);
        self.relation
            .entry(base)
            .or_default()
            .insert(name.to_string(), token);
        if let Some(root) = self.roots.get(&base).cloned() {
            self.roots.insert(token, root);
        }
        Ok(token)
    }

    /// Materialize an array element
    pub fn array_access(&mut self, base: Token, index: usize) -> Result<Token, RuntimeError> {
        let key = index.to_string();
        if let Some(&token) = self.relation.get(&base).and_then(|m| m.get(&key)) {
            return Ok(token);
        }
        let slot = self.slot(base)?;
        if !RuleSetMetaInfo::is_array_type(&slot.ty) {
            return Err(RuntimeError::ValueShape(format!(
                "type \"{}\" is not an array",
                slot.ty
            )));
        }
        let element_ty = RuleSetMetaInfo::element_type(&slot.ty).to_string();
        let element = match &slot.value {
            Value::Array(items) => items
                .get(index)
                .cloned()
                .ok_or(RuntimeError::IndexOutOfRange {
                    index,
                    len: items.len(),
                })?,
            other => {
                return Err(RuntimeError::ValueShape(format!(
                    "expected an array value, found {other}"
                )))
            }
        };
        let token = self.push_slot(element, element_ty);
        self.relation.entry(base).or_default().insert(key, token);
        if let Some(root) = self.roots.get(&base).cloned() {
            self.roots.insert(token, root);
        }
        Ok(token)
    }

    pub fn array_length(&self, token: Token) -> Result<usize, RuntimeError> {
        match &self.slot(token)?.value {
            Value::Array(items) => Ok(items.len()),
            other => Err(RuntimeError::ValueShape(format!(
                "expected an array value, found {other}"
            ))),
        }
    }

    /// Resize an array, default-constructing new elements; relation entries
    /// past the new length are discarded
    pub fn array_resize(
        &mut self,
        data: &DataStore,
        token: Token,
        len: usize,
    ) -> Result<(), RuntimeError> {
        let element_ty = RuleSetMetaInfo::element_type(&self.slot(token)?.ty).to_string();
        let filler = default_instance(&data.meta, &element_ty)?;
        match self
            .buffer
            .get_mut(token)
            .map(|slot| &mut slot.value)
        {
            Some(Value::Array(items)) => items.resize(len, filler),
            _ => {
                return Err(RuntimeError::ValueShape(
                    "resize target is not an array".to_string(),
                ))
            }
        }
        if let Some(children) = self.relation.get_mut(&token) {
            children.retain(|key, _| key.parse::<usize>().is_ok_and(|i| i < len));
        }
        self.mark_dirty(token);
        Ok(())
    }

    /// Append a fully assembled element to an array
    pub fn array_push(&mut self, token: Token, element: Value) -> Result<(), RuntimeError> {
        match self.buffer.get_mut(token).map(|slot| &mut slot.value) {
            Some(Value::Array(items)) => items.push(element),
            _ => {
                return Err(RuntimeError::ValueShape(
                    "push target is not an array".to_string(),
                ))
            }
        }
        self.mark_dirty(token);
        Ok(())
    }

    /// Numeric read of a scalar slot
    pub fn read_value(&self, token: Token) -> Result<f64, RuntimeError> {
        read_numeric(&self.slot(token)?.value)
    }

    /// Numeric write, narrowed to the slot's declared type
    pub fn write_value(&mut self, token: Token, value: f64) -> Result<(), RuntimeError> {
        let declared = self.slot(token)?.ty.clone();
        let narrowed = narrow_numeric(&declared, value);
        if let Some(slot) = self.buffer.get_mut(token) {
            slot.value = narrowed;
        }
        self.mark_dirty(token);
        Ok(())
    }

    /// Assign one managed value to another; both sides' staged children are
    /// folded in first, then invalidated. Numeric scalars assign across
    /// declared widths, narrowing to the destination's type.
    pub fn assign(&mut self, dst: Token, src: Token) -> Result<(), RuntimeError> {
        let (dst_ty, src_ty) = (self.slot(dst)?.ty.clone(), self.slot(src)?.ty.clone());
        if dst_ty != src_ty {
            if is_numeric_data(&dst_ty) && is_numeric_data(&src_ty) {
                let value = self.read_value(src)?;
                return self.write_value(dst, value);
            }
            return Err(RuntimeError::ValueShape(format!(
                "assignment between \"{dst_ty}\" and \"{src_ty}\" is not allowed"
            )));
        }
        let assembled = self.assemble(src)?;
        if let Some(slot) = self.buffer.get_mut(src) {
            slot.value = assembled.clone();
        }
        if let Some(slot) = self.buffer.get_mut(dst) {
            slot.value = assembled;
        }
        self.relation.remove(&src);
        self.relation.remove(&dst);
        self.mark_dirty(dst);
        Ok(())
    }

    /// Rebuild a value from its slot and staged children
    pub fn assemble(&self, token: Token) -> Result<Value, RuntimeError> {
        let slot = self.slot(token)?;
        let mut value = slot.value.clone();
        if let Some(children) = self.relation.get(&token) {
            match &mut value {
                Value::Array(items) => {
                    for (key, &child) in children {
                        if let Ok(index) = key.parse::<usize>() {
                            if let Some(item) = items.get_mut(index) {
                                *item = self.assemble(child)?;
                            }
                        }
                    }
                }
                Value::Object(map) => {
                    for (key, &child) in children {
                        map.insert(key.clone(), self.assemble(child)?);
                    }
                }
                _ => {}
            }
        }
        Ok(value)
    }

    fn mark_dirty(&mut self, token: Token) {
        if let Some(root) = self.roots.get(&token) {
            self.dirty.insert(root.clone());
        }
    }

    /// Merge every dirty root back into the canonical store, then clear all
    /// staging state
    pub fn write_back(&mut self, data: &mut DataStore) -> Result<(), RuntimeError> {
        let dirty = std::mem::take(&mut self.dirty);
        for name in dirty {
            if let Some(&token) = self.buffer_map.get(&name) {
                let value = self.assemble(token)?;
                data.put_back(&name, value);
            }
        }
        self.reset();
        Ok(())
    }

    /// Drop all staged state
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.buffer_map.clear();
        self.relation.clear();
        self.roots.clear();
        self.dirty.clear();
        self.strings.clear();
    }
}

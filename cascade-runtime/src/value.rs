//! Host value-map interchange: recursive tagged values with string-keyed
//! maps for structs, sequences for arrays, and scalars at the leaves.
//! Numeric host types widen to `f64` on read; writes narrow to the
//! variable's declared host type.

use crate::error::RuntimeError;
use cascade_compiler::ruleset::{is_base_data, RuleSetMetaInfo};
use serde_json::{Map, Number, Value};

pub type ValueMap = Map<String, Value>;

/// Default-construct an instance of a declared host-surface type
pub fn default_instance(
    meta: &RuleSetMetaInfo,
    type_name: &str,
) -> Result<Value, RuntimeError> {
    if RuleSetMetaInfo::is_array_type(type_name) {
        return Ok(Value::Array(Vec::new()));
    }
    if is_base_data(type_name) {
        return Ok(match type_name {
            "bool" => Value::Bool(false),
            "string" => Value::String(String::new()),
            "float32" | "float64" | "float128" => {
                Number::from_f64(0.0).map(Value::Number).unwrap_or(Value::Null)
            }
            _ => Value::Number(Number::from(0)),
        });
    }
    let members = meta
        .type_defines
        .get(type_name)
        .ok_or_else(|| RuntimeError::UnknownType(type_name.to_string()))?;
    let mut map = Map::new();
    for (name, member_ty) in members {
        map.insert(name.clone(), default_instance(meta, member_ty)?);
    }
    Ok(Value::Object(map))
}

/// Widen a host scalar to `f64`
pub fn read_numeric(value: &Value) -> Result<f64, RuntimeError> {
    match value {
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| RuntimeError::ValueShape("unrepresentable number".to_string())),
        other => Err(RuntimeError::ValueShape(format!(
            "expected a numeric value, found {other}"
        ))),
    }
}

/// Narrow an `f64` to the declared host type. Lossy by design; JSON cannot
/// carry non-finite numbers, which collapse to 0.
pub fn narrow_numeric(declared: &str, value: f64) -> Value {
    match declared {
        "bool" => Value::Bool(value != 0.0),
        "int8" => Value::Number(Number::from(value as i8 as i64)),
        "uint8" => Value::Number(Number::from(value as u8 as u64)),
        "int16" => Value::Number(Number::from(value as i16 as i64)),
        "uint16" => Value::Number(Number::from(value as u16 as u64)),
        "int32" => Value::Number(Number::from(value as i32 as i64)),
        "uint32" => Value::Number(Number::from(value as u32 as u64)),
        "int64" => Value::Number(Number::from(value as i64)),
        "uint64" => Value::Number(Number::from(value as u64)),
        _ => Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or_else(|| Value::Number(Number::from(0))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_compiler::ruleset::RuleSetMetaInfo;

    #[test]
    fn test_default_instance_nested() {
        let mut meta = RuleSetMetaInfo::default();
        meta.type_defines.insert(
            "Vector".to_string(),
            vec![
                ("x".to_string(), "float64".to_string()),
                ("tags".to_string(), "string[]".to_string()),
            ],
        );
        let v = default_instance(&meta, "Vector").expect("default failed");
        assert_eq!(v["x"], serde_json::json!(0.0));
        assert_eq!(v["tags"], serde_json::json!([]));
    }

    #[test]
    fn test_narrow_numeric() {
        assert_eq!(narrow_numeric("bool", 2.5), Value::Bool(true));
        assert_eq!(narrow_numeric("int32", 2.9), serde_json::json!(2));
        assert_eq!(narrow_numeric("float64", 2.5), serde_json::json!(2.5));
    }

    #[test]
    fn test_read_numeric_widens_bool() {
        assert_eq!(read_numeric(&Value::Bool(true)).ok(), Some(1.0));
    }
}

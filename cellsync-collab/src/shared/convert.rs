//! Conversions between JSON leaves and yrs values.

use serde_json::{Number, Value};
use std::collections::HashMap;
use std::sync::Arc;
use yrs::{Any, Array, Map, Out, ReadTxn};

use super::value::SharedValue;

/// Integers stay integers; every other number is stored as `f64`.
pub(crate) fn json_to_any(value: &Value) -> Any {
    match value {
        Value::Null => Any::Null,
        Value::Bool(b) => Any::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Any::BigInt(i),
            None => Any::Number(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => Any::String(Arc::from(s.as_str())),
        Value::Array(items) => Any::Array(items.iter().map(json_to_any).collect()),
        Value::Object(fields) => {
            let fields: HashMap<String, Any> = fields
                .iter()
                .map(|(k, v)| (k.clone(), json_to_any(v)))
                .collect();
            Any::Map(Arc::new(fields))
        }
    }
}

pub(crate) fn any_to_json(any: &Any) -> Value {
    match any {
        Any::Bool(b) => Value::Bool(*b),
        Any::Number(n) => Number::from_f64(*n).map_or(Value::Null, Value::Number),
        Any::BigInt(i) => Value::from(*i),
        Any::String(s) => Value::String(s.to_string()),
        Any::Array(items) => Value::Array(items.iter().map(any_to_json).collect()),
        Any::Map(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), any_to_json(v)))
                .collect(),
        ),
        // Null, Undefined and binary buffers
        _ => Value::Null,
    }
}

/// Owned snapshot of the node behind `out`.
pub(crate) fn project<T: ReadTxn>(out: &Out, txn: &T) -> SharedValue {
    match out {
        Out::Any(any) => SharedValue::Value(any_to_json(any)),
        Out::YMap(map) => SharedValue::Map(
            map.iter(txn)
                .map(|(key, value)| (key.to_string(), project(&value, txn)))
                .collect(),
        ),
        Out::YArray(array) => SharedValue::Array(
            array
                .iter(txn)
                .map(|value| project(&value, txn).to_json())
                .collect(),
        ),
        _ => SharedValue::Value(Value::Null),
    }
}

pub(crate) fn out_kind(out: &Out) -> &'static str {
    match out {
        Out::Any(_) => "value",
        Out::YMap(_) => "map",
        Out::YArray(_) => "array",
        _ => "other",
    }
}

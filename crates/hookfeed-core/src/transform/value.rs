//! Conversion between JSON values and Rhai values.
//!
//! | JSON                 | Rhai             |
//! |----------------------|------------------|
//! | `null`               | `()`             |
//! | boolean              | `bool`           |
//! | integral number      | `INT` (`i64`)    |
//! | other number         | `FLOAT` (`f64`)  |
//! | string               | `ImmutableString`|
//! | array                | `Array`          |
//! | object               | `Map`            |
//!
//! Rhai keeps arrays and object maps as distinct types, so `[]` and `{}`
//! both survive a round trip unchanged. On the way back a `char` becomes a
//! one-character string, non-finite floats become `null`, and any other Rhai
//! value is rendered with its display form.

use rhai::{Array, Dynamic, Map};
use serde_json::{Number, Value};

/// Convert a JSON value into a Rhai value
pub fn to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from_bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Dynamic::from_int(i),
            None => n.as_f64().map(Dynamic::from_float).unwrap_or(Dynamic::UNIT),
        },
        Value::String(s) => Dynamic::from(s.clone()),
        Value::Array(items) => Dynamic::from_array(items.iter().map(to_dynamic).collect()),
        Value::Object(object) => {
            let mut map = Map::new();
            for (key, item) in object {
                map.insert(key.as_str().into(), to_dynamic(item));
            }
            Dynamic::from_map(map)
        }
    }
}

/// Convert a Rhai value back into JSON
pub fn from_dynamic(value: &Dynamic) -> Value {
    let value = value.flatten_clone();

    if value.is_unit() {
        return Value::Null;
    }
    if let Ok(b) = value.as_bool() {
        return Value::Bool(b);
    }
    if let Ok(i) = value.as_int() {
        return Value::Number(i.into());
    }
    if let Ok(f) = value.as_float() {
        return Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null);
    }
    if let Ok(c) = value.as_char() {
        return Value::String(c.to_string());
    }
    if value.is_string() {
        return Value::String(value.to_string());
    }
    if value.is_array() {
        return match value.try_cast::<Array>() {
            Some(items) => Value::Array(items.iter().map(from_dynamic).collect()),
            None => Value::Null,
        };
    }
    if value.is_map() {
        return match value.try_cast::<Map>() {
            Some(map) => Value::Object(
                map.iter()
                    .map(|(key, item)| (key.to_string(), from_dynamic(item)))
                    .collect(),
            ),
            None => Value::Null,
        };
    }

    Value::String(value.to_string())
}

#[cfg(test)]
#[path = "value_tests.rs"]
mod tests;

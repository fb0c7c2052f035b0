//! Medial capitalization of metadata keys.

use serde_json::{Map, Value};

pub const KEY_SEPARATOR: char = '_';

/// `bob_the_builder` -> `bobTheBuilder`.
///
/// The character following each separator is upper-cased and every separator
/// is dropped, so the result never contains `_`.
pub fn to_medial_caps(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut capitalize_next = false;
    for ch in key.chars() {
        if ch == KEY_SEPARATOR {
            capitalize_next = true;
        } else if capitalize_next {
            out.extend(ch.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Key-case a string value; anything else is returned as is.
pub fn medial_caps_value(value: Value) -> Value {
    match value {
        Value::String(text) => Value::String(to_medial_caps(&text)),
        other => other,
    }
}

/// Rewrite every mapping key in `doc` to medial caps.
///
/// A bare string is itself key-cased. Inside a mapping, sequence elements go
/// back through this function (strings held directly in a sequence are
/// key-cased too), nested mappings recurse and other values are untouched.
pub fn normalize_keys(doc: &Value) -> Value {
    match doc {
        Value::String(text) => Value::String(to_medial_caps(text)),
        Value::Object(map) => Value::Object(normalize_map(map)),
        Value::Array(items) => Value::Array(items.iter().map(normalize_keys).collect()),
        scalar => scalar.clone(),
    }
}

fn normalize_map(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(key, value)| {
            let value = match value {
                Value::Array(items) => Value::Array(items.iter().map(normalize_keys).collect()),
                Value::Object(nested) => Value::Object(normalize_map(nested)),
                scalar => scalar.clone(),
            };
            (to_medial_caps(key), value)
        })
        .collect()
}

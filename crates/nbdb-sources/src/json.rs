//! Lenient accessors for loosely typed export files.

use std::collections::HashSet;

use nbdb_core::{is_blank_value, RawRecord};
use serde_json::Value;

/// A trimmed, non-empty string field.
pub(crate) fn text(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// The first of `keys` holding a non-empty string.
pub(crate) fn first_text(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| text(value, key))
}

/// Numbers are exported as either JSON numbers or strings.
pub(crate) fn number_or_string(value: &Value, key: &str) -> Option<f64> {
    value.get(key).and_then(|v| {
        v.as_f64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
    })
}

/// Identifiers are exported as either JSON strings or integers.
pub(crate) fn identifier(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A non-null, non-empty value to carry into a record's attribute bag.
pub(crate) fn present(value: &Value, key: &str) -> Option<Value> {
    value.get(key).filter(|v| !is_blank_value(v)).cloned()
}

/// Reads one exported object while remembering which keys an adapter
/// interpreted. Whatever is left is carried into the record unchanged.
pub(crate) struct Fields<'v> {
    object: &'v Value,
    used: HashSet<String>,
}

impl<'v> Fields<'v> {
    pub(crate) fn new(object: &'v Value) -> Self {
        Self {
            object,
            used: HashSet::new(),
        }
    }

    /// The raw value under `key`. The key counts as read even when absent.
    pub(crate) fn get(&mut self, key: &str) -> Option<&'v Value> {
        self.used.insert(key.to_string());
        self.object.get(key)
    }

    /// Mark keys that are interpreted some other way.
    pub(crate) fn skip(&mut self, keys: &[&str]) {
        self.used.extend(keys.iter().map(|key| (*key).to_string()));
    }

    /// [`first_text`], marking only the key the text came from.
    pub(crate) fn text(&mut self, keys: &[&str]) -> Option<String> {
        let (key, found) = keys
            .iter()
            .find_map(|key| text(self.object, key).map(|t| (*key, t)))?;
        self.used.insert(key.to_string());
        Some(found)
    }

    pub(crate) fn identifier(&mut self, keys: &[&str]) -> Option<String> {
        let (key, found) = keys
            .iter()
            .find_map(|key| identifier(self.object, key).map(|id| (*key, id)))?;
        self.used.insert(key.to_string());
        Some(found)
    }

    pub(crate) fn number(&mut self, key: &str) -> Option<f64> {
        let found = number_or_string(self.object, key)?;
        self.used.insert(key.to_string());
        Some(found)
    }

    pub(crate) fn present(&mut self, key: &str) -> Option<Value> {
        let found = present(self.object, key)?;
        self.used.insert(key.to_string());
        Some(found)
    }

    /// Copy every non-blank key nothing has read into `record.extra` under
    /// its own name. Fields the adapter already set are left alone.
    pub(crate) fn carry_rest(&self, record: &mut RawRecord) {
        let Some(object) = self.object.as_object() else {
            return;
        };
        for (key, value) in object {
            if self.used.contains(key) || is_blank_value(value) || record.extra.contains_key(key) {
                continue;
            }
            record.extra.insert(key.clone(), value.clone());
        }
    }
}

/// The array under the first matching key, or the value itself when it is
/// already an array.
pub(crate) fn list<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Vec<Value>> {
    if let Some(items) = value.as_array() {
        return Some(items);
    }
    keys.iter()
        .find_map(|key| value.get(key).and_then(Value::as_array))
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::spec::FieldId;

/// Field values of one wizard session. Absent means empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldStore {
    values: BTreeMap<FieldId, Value>,
}

/// Change notification returned by every store mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field: FieldId,
    pub previous: Option<Value>,
    pub current: Option<Value>,
}

impl FieldChange {
    pub fn is_change(&self) -> bool {
        self.previous != self.current
    }

    /// True when the field went from holding a value to holding nothing.
    pub fn is_clear(&self) -> bool {
        self.current.is_none() && self.previous.is_some()
    }
}

impl FieldStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(values: BTreeMap<FieldId, Value>) -> Self {
        let values = values
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .collect();
        Self { values }
    }

    /// Builds a store over a JSON object, ignoring anything that is not one.
    pub fn from_object(object: &Map<String, Value>) -> Self {
        Self::from_map(
            object
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        )
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.values.get(id)
    }

    pub fn get_str(&self, id: &str) -> Option<&str> {
        self.get(id).and_then(Value::as_str)
    }

    /// Whether the field holds a non-empty value.
    pub fn has_value(&self, id: &str) -> bool {
        self.get(id).is_some_and(|value| !is_empty_value(value))
    }

    /// Stores `value`; `null` removes the field.
    pub fn set(&mut self, id: impl Into<FieldId>, value: Value) -> FieldChange {
        let field = id.into();
        let previous = if value.is_null() {
            self.values.remove(&field)
        } else {
            self.values.insert(field.clone(), value)
        };
        let current = self.values.get(&field).cloned();
        FieldChange {
            field,
            previous,
            current,
        }
    }

    pub fn remove(&mut self, id: &str) -> FieldChange {
        self.set(id, Value::Null)
    }

    /// Resets the field to its declared default, or removes it when there is none.
    pub fn reset(&mut self, id: &str, default: Option<&Value>) -> FieldChange {
        self.set(id, default.cloned().unwrap_or(Value::Null))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldId, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &BTreeMap<FieldId, Value> {
        &self.values
    }

    pub fn into_values(self) -> BTreeMap<FieldId, Value> {
        self.values
    }

    /// JSON object view used by expressions.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        )
    }
}

/// `null`, empty strings (after trimming) and empty arrays count as no value.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::definition::WizardDefinition;
use crate::spec::FieldId;
use crate::store::FieldStore;

/// Single failed rule, surfaced inline next to the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FieldError {
    pub message: String,
    pub code: String,
}

impl FieldError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
        }
    }
}

/// Outcome of validating one step. Keys are field ids, or
/// `list[index].field` for entries of a structured list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, FieldError>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: BTreeMap::new(),
        }
    }

    pub fn from_errors(errors: BTreeMap<String, FieldError>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    pub fn error(&self, key: &str) -> Option<&FieldError> {
        self.errors.get(key)
    }

    pub fn code(&self, key: &str) -> Option<&str> {
        self.error(key).map(|error| error.code.as_str())
    }

    /// `key: message` lines in key order.
    pub fn messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|(key, error)| format!("{key}: {}", error.message))
            .collect()
    }
}

/// Owned copy of a wizard's field values handed to the create operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConfigurationSnapshot {
    pub wizard_id: String,
    pub wizard_version: String,
    #[serde(default)]
    pub fields: BTreeMap<FieldId, Value>,
}

impl ConfigurationSnapshot {
    /// Captures the values of fields the definition declares; anything else in
    /// the store is left out.
    pub fn capture(definition: &WizardDefinition, store: &FieldStore) -> Self {
        let fields = store
            .iter()
            .filter(|(id, _)| definition.field(id).is_some())
            .map(|(id, value)| (id.clone(), value.clone()))
            .collect();
        Self {
            wizard_id: definition.id().to_string(),
            wizard_version: definition.version().to_string(),
            fields,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.fields.get(id)
    }

    pub fn get_str(&self, id: &str) -> Option<&str> {
        self.get(id).and_then(Value::as_str)
    }

    pub fn to_store(&self) -> FieldStore {
        FieldStore::from_map(self.fields.clone())
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

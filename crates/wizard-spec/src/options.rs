use std::collections::{BTreeMap, BTreeSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::spec::{FieldId, FieldSpec};
use crate::store::FieldStore;

/// One selectable entry of a select or multi-select field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct OptionItem {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl OptionItem {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// Values of the fields an option set depends on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Upstream {
    values: BTreeMap<FieldId, Value>,
}

impl Upstream {
    pub fn for_field(field: &FieldSpec, store: &FieldStore) -> Self {
        let values = field
            .depends_on
            .iter()
            .filter_map(|id| store.get(id).map(|value| (id.clone(), value.clone())))
            .collect();
        Self { values }
    }

    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<FieldId>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.values.get(id)
    }

    pub fn get_str(&self, id: &str) -> Option<&str> {
        self.get(id).and_then(Value::as_str)
    }

    /// String entries of a multi-select upstream value; a single string yields one entry.
    pub fn get_strs(&self, id: &str) -> Vec<&str> {
        match self.get(id) {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            Some(Value::String(text)) => vec![text.as_str()],
            _ => Vec::new(),
        }
    }
}

/// Derives a field's selectable options from its upstream values. Must not
/// mutate the collections it reads from.
pub trait OptionProvider: Send + Sync {
    fn options(&self, upstream: &Upstream) -> Vec<OptionItem>;
}

pub(crate) struct FnProvider<F>(pub(crate) F);

impl<F> OptionProvider for FnProvider<F>
where
    F: Fn(&Upstream) -> Vec<OptionItem> + Send + Sync,
{
    fn options(&self, upstream: &Upstream) -> Vec<OptionItem> {
        (self.0)(upstream)
    }
}

/// Computed option sets of one wizard session, recomputed lazily.
#[derive(Debug, Clone, Default)]
pub struct OptionCache {
    entries: BTreeMap<FieldId, Vec<OptionItem>>,
    stale: BTreeSet<FieldId>,
}

impl OptionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&[OptionItem]> {
        self.entries.get(id).map(Vec::as_slice)
    }

    pub fn is_stale(&self, id: &str) -> bool {
        self.stale.contains(id)
    }

    pub fn mark_stale(&mut self, id: impl Into<FieldId>) {
        self.stale.insert(id.into());
    }

    pub fn stale_fields(&self) -> impl Iterator<Item = &FieldId> {
        self.stale.iter()
    }

    pub fn contains(&self, id: &str, option_id: &str) -> bool {
        self.get(id)
            .is_some_and(|items| items.iter().any(|item| item.id == option_id))
    }

    pub fn label(&self, id: &str, option_id: &str) -> Option<&str> {
        self.get(id)?
            .iter()
            .find(|item| item.id == option_id)
            .map(|item| item.label.as_str())
    }

    pub(crate) fn store(&mut self, id: &str, items: Vec<OptionItem>) {
        self.stale.remove(id);
        self.entries.insert(id.to_string(), items);
    }
}

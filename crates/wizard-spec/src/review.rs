use serde::Serialize;
use serde_json::Value;

use crate::definition::WizardDefinition;
use crate::options::OptionCache;
use crate::spec::{FieldKind, FieldSpec};
use crate::store::{FieldStore, is_empty_value};

const MASK: &str = "********";
const NOT_SET: &str = "(not set)";

/// One reviewed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewEntry {
    pub field_id: String,
    pub label: String,
    pub display: String,
    pub is_set: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewSection {
    pub step_id: String,
    pub title: String,
    pub optional: bool,
    pub entries: Vec<ReviewEntry>,
}

/// Summary shown before the create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewSummary {
    pub wizard_id: String,
    pub title: String,
    pub sections: Vec<ReviewSection>,
}

pub fn build_review(
    definition: &WizardDefinition,
    store: &FieldStore,
    options: &OptionCache,
) -> ReviewSummary {
    let sections = definition
        .steps()
        .iter()
        .filter(|step| !step.fields.is_empty())
        .map(|step| ReviewSection {
            step_id: step.id.clone(),
            title: step.title.clone(),
            optional: step.optional,
            entries: step
                .fields
                .iter()
                .map(|field| review_entry(field, store, options))
                .collect(),
        })
        .collect();

    ReviewSummary {
        wizard_id: definition.id().to_string(),
        title: definition.spec().title.clone(),
        sections,
    }
}

fn review_entry(field: &FieldSpec, store: &FieldStore, options: &OptionCache) -> ReviewEntry {
    let value = store.get(&field.id).filter(|value| !is_empty_value(value));
    let display = match value {
        None => NOT_SET.to_string(),
        Some(_) if field.secret => MASK.to_string(),
        Some(value) => display_value(field, value, options),
    };
    ReviewEntry {
        field_id: field.id.clone(),
        label: field.label.clone(),
        display,
        is_set: value.is_some(),
    }
}

fn display_value(field: &FieldSpec, value: &Value, options: &OptionCache) -> String {
    let option_label = |id: &str| {
        options
            .label(&field.id, id)
            .map(|label| format!("{label} ({id})"))
            .unwrap_or_else(|| id.to_string())
    };
    match (field.kind, value) {
        (FieldKind::Boolean, Value::Bool(flag)) => (if *flag { "Yes" } else { "No" }).to_string(),
        (FieldKind::Select, Value::String(id)) => option_label(id.as_str()),
        (FieldKind::MultiSelect, Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(option_label)
            .collect::<Vec<_>>()
            .join(", "),
        (FieldKind::List, Value::Array(items)) => match items.len() {
            1 => "1 entry".to_string(),
            count => format!("{count} entries"),
        },
        (_, Value::String(text)) => text.clone(),
        (_, other) => other.to_string(),
    }
}

/// Plain-text rendering of a review summary.
pub fn render_review_text(summary: &ReviewSummary) -> String {
    let mut lines = vec![format!("Review: {} ({})", summary.title, summary.wizard_id)];
    for section in &summary.sections {
        let suffix = if section.optional { " (optional)" } else { "" };
        lines.push(String::new());
        lines.push(format!("{}{suffix}", section.title));
        for entry in &section.entries {
            lines.push(format!("  {}: {}", entry.label, entry.display));
        }
    }
    lines.join("\n")
}

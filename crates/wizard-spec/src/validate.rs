use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::answers::{FieldError, ValidationResult};
use crate::definition::WizardDefinition;
use crate::options::{OptionCache, OptionItem};
use crate::spec::{FieldKind, FieldRule, FieldSpec, StepRule};
use crate::store::{FieldStore, is_empty_value};

/// Validates the step with the given id against the store.
pub fn validate_step(
    definition: &WizardDefinition,
    step_id: &str,
    store: &FieldStore,
    options: &OptionCache,
) -> ValidationResult {
    match definition.step_index(step_id) {
        Some(index) => validate_step_at(definition, index, store, options),
        None => unknown_step(definition, step_id),
    }
}

/// Field rules first, then whole-step rules for fields that are still clean.
pub fn validate_step_at(
    definition: &WizardDefinition,
    index: usize,
    store: &FieldStore,
    options: &OptionCache,
) -> ValidationResult {
    let Some(step) = definition.step(index) else {
        return unknown_step(definition, &format!("#{index}"));
    };

    let mut errors = BTreeMap::new();
    for field in &step.fields {
        if let Some((key, error)) = validate_field(definition, field, store, options.get(&field.id))
        {
            errors.insert(key, error);
        }
    }

    for rule in &step.rules {
        let field = rule.field();
        let nested = format!("{field}[");
        if errors
            .keys()
            .any(|key| key == field || key.starts_with(&nested))
        {
            continue;
        }
        if let Some(error) = check_step_rule(definition, rule, store, options) {
            errors.insert(field.to_string(), error);
        }
    }

    ValidationResult::from_errors(errors)
}

/// Checks one field and returns the first failure with the key it is reported under.
pub fn validate_field(
    definition: &WizardDefinition,
    field: &FieldSpec,
    store: &FieldStore,
    options: Option<&[OptionItem]>,
) -> Option<(String, FieldError)> {
    let value = match store.get(&field.id) {
        Some(value) if !is_empty_value(value) => value,
        _ => {
            return field
                .rules
                .iter()
                .find_map(|rule| match rule {
                    FieldRule::Required { message } => Some(FieldError::new(
                        "required",
                        message_or(message, format!("{} is required", field.label)),
                    )),
                    _ => None,
                })
                .map(|error| (field.id.clone(), error));
        }
    };

    if !matches_kind(field.kind, value) {
        return Some((
            field.id.clone(),
            FieldError::new(
                "type_mismatch",
                format!("expected a {} value", field.kind.as_str()),
            ),
        ));
    }

    if field.kind == FieldKind::List
        && let Some(failure) = validate_list(definition, field, value)
    {
        return Some(failure);
    }

    for rule in &field.rules {
        if let Some(error) = apply_rule(definition, rule, value, store) {
            return Some((field.id.clone(), error));
        }
    }

    check_offered(field, value, options).map(|error| (field.id.clone(), error))
}

fn unknown_step(definition: &WizardDefinition, step_id: &str) -> ValidationResult {
    let mut errors = BTreeMap::new();
    errors.insert(
        step_id.to_string(),
        FieldError::new(
            "unknown_step",
            format!("step '{step_id}' is not part of wizard '{}'", definition.id()),
        ),
    );
    ValidationResult::from_errors(errors)
}

fn matches_kind(kind: FieldKind, value: &Value) -> bool {
    match kind {
        FieldKind::Text | FieldKind::Select => value.is_string(),
        FieldKind::Number => value.is_number(),
        FieldKind::Boolean => value.is_boolean(),
        FieldKind::MultiSelect => value
            .as_array()
            .is_some_and(|items| items.iter().all(Value::is_string)),
        FieldKind::List => value.is_array(),
    }
}

fn validate_list(
    definition: &WizardDefinition,
    field: &FieldSpec,
    value: &Value,
) -> Option<(String, FieldError)> {
    let Some(list) = &field.list else {
        return Some((
            field.id.clone(),
            FieldError::new("missing_list_definition", "list fields are not defined"),
        ));
    };
    let items = value.as_array()?;

    if let Some(min_items) = list.min_items
        && items.len() < min_items
    {
        return Some((
            field.id.clone(),
            FieldError::new(
                "min_items",
                format!("add at least {min_items} entries (got {})", items.len()),
            ),
        ));
    }
    if let Some(max_items) = list.max_items
        && items.len() > max_items
    {
        return Some((
            field.id.clone(),
            FieldError::new(
                "max_items",
                format!("at most {max_items} entries are allowed (got {})", items.len()),
            ),
        ));
    }

    for (idx, entry) in items.iter().enumerate() {
        let Some(entry) = entry.as_object() else {
            return Some((
                format!("{}[{idx}]", field.id),
                FieldError::new("entry_type", "list entry must be an object"),
            ));
        };
        let entry_store = FieldStore::from_object(entry);
        for nested in &list.fields {
            if let Some((key, error)) = validate_field(definition, nested, &entry_store, None) {
                return Some((format!("{}[{idx}].{key}", field.id), error));
            }
        }
    }
    None
}

fn apply_rule(
    definition: &WizardDefinition,
    rule: &FieldRule,
    value: &Value,
    store: &FieldStore,
) -> Option<FieldError> {
    match rule {
        FieldRule::Required { .. } => None,
        FieldRule::Pattern { regex, message } => {
            let text = value.as_str()?;
            let compiled = definition.pattern(regex)?;
            (!compiled.is_match(text)).then(|| {
                FieldError::new(
                    "pattern_mismatch",
                    message_or(message, "value does not match the expected format"),
                )
            })
        }
        FieldRule::Cidr {
            min_prefix,
            max_prefix,
            message,
        } => {
            let text = value.as_str()?;
            match parse_cidr(text) {
                None => Some(FieldError::new(
                    "cidr_format",
                    message_or(message, "must be an IPv4 CIDR block such as 10.0.0.0/16"),
                )),
                Some(prefix) if prefix < *min_prefix || prefix > *max_prefix => {
                    Some(FieldError::new(
                        "cidr_prefix_range",
                        message_or(
                            message,
                            format!(
                                "prefix length must be between /{min_prefix} and /{max_prefix}"
                            ),
                        ),
                    ))
                }
                Some(_) => None,
            }
        }
        FieldRule::Range {
            min,
            max,
            exclusive_min,
            exclusive_max,
            message,
        } => {
            let number = value.as_f64()?;
            if let Some(min) = min {
                let below = if *exclusive_min {
                    number <= *min
                } else {
                    number < *min
                };
                if below {
                    let default = if *exclusive_min {
                        format!("must be greater than {min}")
                    } else {
                        format!("must be at least {min}")
                    };
                    return Some(FieldError::new("range_min", message_or(message, default)));
                }
            }
            if let Some(max) = max {
                let above = if *exclusive_max {
                    number >= *max
                } else {
                    number > *max
                };
                if above {
                    let default = if *exclusive_max {
                        format!("must be less than {max}")
                    } else {
                        format!("must be at most {max}")
                    };
                    return Some(FieldError::new("range_max", message_or(message, default)));
                }
            }
            None
        }
        FieldRule::Length { min, max, message } => {
            let (count, unit) = match value {
                Value::String(text) => (text.chars().count(), "characters"),
                Value::Array(items) => (items.len(), "entries"),
                _ => return None,
            };
            if let Some(min) = min
                && count < *min
            {
                return Some(FieldError::new(
                    "length_min",
                    message_or(message, format!("must contain at least {min} {unit}")),
                ));
            }
            if let Some(max) = max
                && count > *max
            {
                return Some(FieldError::new(
                    "length_max",
                    message_or(message, format!("must contain at most {max} {unit}")),
                ));
            }
            None
        }
        FieldRule::EqualsField { other, message } => (store.get(other) != Some(value)).then(|| {
            FieldError::new(
                "field_mismatch",
                message_or(message, format!("must match {}", label_of(definition, other))),
            )
        }),
        FieldRule::NotEqualsField { other, message } => {
            (store.get(other) == Some(value)).then(|| {
                FieldError::new(
                    "field_conflict",
                    message_or(
                        message,
                        format!("must differ from {}", label_of(definition, other)),
                    ),
                )
            })
        }
    }
}

fn check_offered(
    field: &FieldSpec,
    value: &Value,
    options: Option<&[OptionItem]>,
) -> Option<FieldError> {
    if !field.kind.is_selection() {
        return None;
    }
    let allowed: Vec<&str> = match (&field.choices, options) {
        (Some(choices), _) => choices.iter().map(String::as_str).collect(),
        (None, Some(items)) => items.iter().map(|item| item.id.as_str()).collect(),
        (None, None) => return None,
    };
    let selected: Vec<&str> = match value {
        Value::String(text) => vec![text.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => return None,
    };
    selected
        .into_iter()
        .find(|id| !allowed.contains(id))
        .map(|id| FieldError::new("invalid_option", format!("'{id}' is not an available option")))
}

fn check_step_rule(
    definition: &WizardDefinition,
    rule: &StepRule,
    store: &FieldStore,
    options: &OptionCache,
) -> Option<FieldError> {
    match rule {
        StepRule::MinSelected {
            field,
            min,
            message,
        } => {
            let count = match store.get(field) {
                Some(Value::Array(items)) => items.len(),
                Some(value) if !is_empty_value(value) => 1,
                _ => 0,
            };
            (count < *min).then(|| {
                FieldError::new(
                    "min_selected",
                    message_or(message, format!("select at least {min}")),
                )
            })
        }
        StepRule::DistinctMetadata {
            field,
            key,
            min,
            message,
        } => {
            let selected = selected_ids(store.get(field));
            let distinct: BTreeSet<&str> = options
                .get(field)
                .unwrap_or_default()
                .iter()
                .filter(|item| selected.contains(&item.id.as_str()))
                .filter_map(|item| item.meta(key))
                .collect();
            (distinct.len() < *min).then(|| {
                FieldError::new(
                    "distinct_metadata",
                    message_or(
                        message,
                        format!("selections must span at least {min} different {key} values"),
                    ),
                )
            })
        }
        StepRule::Condition {
            condition,
            message,
            code,
            ..
        } => (condition.evaluate_bool(store) == Some(true)).then(|| {
            FieldError::new(
                code.clone().unwrap_or_else(|| "condition".into()),
                message.clone(),
            )
        }),
        StepRule::Custom { check, .. } => definition
            .check(check)?
            .check(store)
            .map(|message| FieldError::new("custom", message)),
    }
}

fn selected_ids(value: Option<&Value>) -> Vec<&str> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        Some(Value::String(text)) => vec![text.as_str()],
        _ => Vec::new(),
    }
}

fn label_of<'a>(definition: &'a WizardDefinition, id: &'a str) -> &'a str {
    definition
        .field(id)
        .map(|field| field.label.as_str())
        .unwrap_or(id)
}

fn message_or(message: &Option<String>, default: impl Into<String>) -> String {
    message.clone().unwrap_or_else(|| default.into())
}

/// Prefix length of an `a.b.c.d/n` block, `None` when the text is not one.
fn parse_cidr(text: &str) -> Option<u8> {
    let (address, prefix) = text.split_once('/')?;
    let octets: Vec<&str> = address.split('.').collect();
    if octets.len() != 4
        || !octets
            .iter()
            .all(|octet| is_decimal(octet, 3) && octet.parse::<u8>().is_ok())
    {
        return None;
    }
    if !is_decimal(prefix, 2) {
        return None;
    }
    let prefix: u8 = prefix.parse().ok()?;
    (prefix <= 32).then_some(prefix)
}

fn is_decimal(text: &str, max_len: usize) -> bool {
    !text.is_empty() && text.len() <= max_len && text.bytes().all(|byte| byte.is_ascii_digit())
}

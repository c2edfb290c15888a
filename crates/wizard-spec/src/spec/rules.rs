use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::expr::Expr;
use crate::spec::field::FieldId;

fn default_min_prefix() -> u8 {
    16
}

fn default_max_prefix() -> u8 {
    28
}

/// Declarative per-field rule. Rules run in declaration order and the first
/// failure is the only one reported for the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum FieldRule {
    Required {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Full-string regular expression match.
    Pattern {
        regex: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// IPv4 CIDR block `a.b.c.d/n` with a bounded prefix length.
    Cidr {
        #[serde(default = "default_min_prefix")]
        min_prefix: u8,
        #[serde(default = "default_max_prefix")]
        max_prefix: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Numeric range, inclusive on both ends unless flagged exclusive.
    Range {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
        #[serde(default)]
        exclusive_min: bool,
        #[serde(default)]
        exclusive_max: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Character count for text, item count for arrays.
    Length {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    EqualsField {
        other: FieldId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    NotEqualsField {
        other: FieldId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl FieldRule {
    /// Field ids referenced by this rule other than the field it is declared on.
    pub fn referenced_field(&self) -> Option<&str> {
        match self {
            FieldRule::EqualsField { other, .. } | FieldRule::NotEqualsField { other, .. } => {
                Some(other)
            }
            _ => None,
        }
    }
}

/// Whole-step rule evaluated after every field of the step passed its own rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum StepRule {
    MinSelected {
        field: FieldId,
        min: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// The selected options must carry at least `min` distinct values for a
    /// metadata key, e.g. subnets spread over two availability zones.
    DistinctMetadata {
        field: FieldId,
        key: String,
        min: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Fails when `condition` evaluates to true.
    Condition {
        field: FieldId,
        condition: Expr,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
    /// Delegates to a check registered on the definition builder.
    Custom { field: FieldId, check: String },
}

impl StepRule {
    /// Field the rule's error is reported against.
    pub fn field(&self) -> &str {
        match self {
            StepRule::MinSelected { field, .. }
            | StepRule::DistinctMetadata { field, .. }
            | StepRule::Condition { field, .. }
            | StepRule::Custom { field, .. } => field,
        }
    }
}

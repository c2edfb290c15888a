use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::field::{FieldId, FieldSpec};
use crate::spec::rules::StepRule;

/// Identifier for wizard steps.
pub type StepId = String;

/// One configuration screen of a wizard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StepSpec {
    pub id: StepId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional steps may be left forward without passing validation.
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<StepRule>,
}

/// Reset cascade fired when `trigger` changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DependencyRule {
    pub trigger: FieldId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clear: Vec<FieldId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recompute: Vec<FieldId>,
}

impl DependencyRule {
    pub fn new(trigger: impl Into<FieldId>) -> Self {
        Self {
            trigger: trigger.into(),
            clear: Vec::new(),
            recompute: Vec::new(),
        }
    }

    /// Every field this rule touches, clear targets first.
    pub fn targets(&self) -> impl Iterator<Item = &FieldId> {
        self.clear.iter().chain(self.recompute.iter())
    }

    pub(crate) fn merge(&mut self, other: &DependencyRule) {
        for id in &other.clear {
            if !self.clear.contains(id) {
                self.clear.push(id.clone());
            }
        }
        for id in &other.recompute {
            if !self.recompute.contains(id) {
                self.recompute.push(id.clone());
            }
        }
    }
}

/// Top-level wizard definition as authored in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WizardSpec {
    pub id: String,
    pub title: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub steps: Vec<StepSpec>,
    /// Extra cascades on top of the ones implied by `depends_on`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencyRule>,
}

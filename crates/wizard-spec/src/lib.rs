#![allow(missing_docs)]

pub mod answers;
pub mod definition;
pub mod expr;
pub mod options;
pub mod resolve;
pub mod review;
pub mod spec;
pub mod store;
pub mod validate;

pub use answers::{ConfigurationSnapshot, FieldError, ValidationResult};
pub use definition::{DefinitionError, StepCheck, WizardDefinition, WizardDefinitionBuilder};
pub use expr::Expr;
pub use options::{OptionCache, OptionItem, OptionProvider, Upstream};
pub use resolve::{DependencyResolver, Resolution};
pub use review::{ReviewEntry, ReviewSection, ReviewSummary, build_review, render_review_text};
pub use spec::{
    DependencyRule, FieldId, FieldKind, FieldRule, FieldSpec, ListSpec, StepId, StepRule,
    StepSpec, WizardSpec,
};
pub use store::{FieldChange, FieldStore, is_empty_value};
pub use validate::{validate_field, validate_step, validate_step_at};

/// JSON Schema describing authored wizard definitions.
pub fn wizard_spec_schema() -> Result<serde_json::Value, serde_json::Error> {
    serde_json::to_value(schemars::schema_for!(WizardSpec))
}

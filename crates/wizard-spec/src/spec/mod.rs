pub mod field;
pub mod rules;
pub mod wizard;

pub use field::{FieldId, FieldKind, FieldSpec, ListSpec};
pub use rules::{FieldRule, StepRule};
pub use wizard::{DependencyRule, StepId, StepSpec, WizardSpec};

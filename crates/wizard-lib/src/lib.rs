#![allow(missing_docs)]

pub mod controller;
pub mod submission;

pub use controller::{
    ControllerError, ControllerPhase, Navigation, SubmissionStatus, SubmissionTicket,
    SubmitOutcome, WizardController, WizardState,
};
pub use submission::{
    CreateError, CreateOperation, ResourceId, SubmissionError, SubmissionPipeline,
};
pub use wizard_spec::{ConfigurationSnapshot, ValidationResult, WizardDefinition};

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};
use wizard_spec::{
    ConfigurationSnapshot, DependencyResolver, FieldStore, OptionCache, OptionItem, Resolution,
    ReviewSummary, StepId, StepSpec, ValidationResult, WizardDefinition, build_review,
    validate_step_at,
};

use crate::submission::{ResourceId, SubmissionError, SubmissionPipeline};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerPhase {
    /// Mounted with defaults, nothing touched yet.
    Idle,
    Navigating,
    Submitting,
    Completed,
    Cancelled,
}

impl ControllerPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControllerPhase::Idle => "idle",
            ControllerPhase::Navigating => "navigating",
            ControllerPhase::Submitting => "submitting",
            ControllerPhase::Completed => "completed",
            ControllerPhase::Cancelled => "cancelled",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, ControllerPhase::Completed | ControllerPhase::Cancelled)
    }
}

impl fmt::Display for ControllerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionStatus {
    Idle,
    InFlight,
    Succeeded { resource_id: ResourceId },
    Failed { error: SubmissionError },
}

/// Everything one wizard session owns.
#[derive(Debug, Clone)]
pub struct WizardState {
    pub active_step: usize,
    pub store: FieldStore,
    /// Steps that passed validation since their fields last changed from
    /// another step.
    pub visited: BTreeSet<StepId>,
    /// Steps edited since they were last validated.
    pub dirty: BTreeSet<StepId>,
    pub submission: SubmissionStatus,
    pub phase: ControllerPhase,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControllerError {
    #[error("a submission is in progress")]
    Busy,
    #[error("wizard is already {0}")]
    Finished(ControllerPhase),
    #[error("wizard has no field '{0}'")]
    UnknownField(String),
    #[error("step {index} is out of range (wizard has {count} steps)")]
    StepOutOfRange { index: usize, count: usize },
    #[error("snapshot belongs to wizard '{found}', expected '{expected}'")]
    WizardMismatch { expected: String, found: String },
}

/// Result of a navigation request.
#[derive(Debug, Clone, PartialEq)]
pub enum Navigation {
    Moved { from: usize, to: usize },
    /// Already at the requested position.
    Unchanged,
    /// The active step failed validation.
    Invalid(ValidationResult),
    /// A forward jump would skip a step that was never completed.
    Skipped { step: StepId },
}

impl Navigation {
    pub fn moved(&self) -> bool {
        matches!(self, Navigation::Moved { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Created {
        resource_id: ResourceId,
    },
    /// A required step failed; the controller moved to it.
    Invalid {
        step: StepId,
        index: usize,
        validation: ValidationResult,
    },
    /// The create operation failed; every field value is kept.
    Failed {
        error: SubmissionError,
    },
    /// Nothing happened: a submission was already in flight or the wizard is over.
    Rejected {
        phase: ControllerPhase,
    },
}

/// Snapshot handed out by [`WizardController::begin_submission`].
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionTicket {
    snapshot: ConfigurationSnapshot,
}

impl SubmissionTicket {
    pub fn snapshot(&self) -> &ConfigurationSnapshot {
        &self.snapshot
    }

    pub fn into_snapshot(self) -> ConfigurationSnapshot {
        self.snapshot
    }
}

/// State machine driving one wizard session.
#[derive(Debug)]
pub struct WizardController {
    definition: Arc<WizardDefinition>,
    state: WizardState,
    options: OptionCache,
}

impl WizardController {
    /// Mounts a session seeded with the definition's defaults.
    pub fn new(definition: Arc<WizardDefinition>) -> Self {
        let store = definition.default_store();
        Self::mount(definition, store)
    }

    /// Rebuilds a session from a snapshot of the same wizard. Option sets are
    /// recomputed and values no longer offered are dropped.
    pub fn from_snapshot(
        definition: Arc<WizardDefinition>,
        snapshot: &ConfigurationSnapshot,
    ) -> Result<Self, ControllerError> {
        if snapshot.wizard_id != definition.id() {
            return Err(ControllerError::WizardMismatch {
                expected: definition.id().to_string(),
                found: snapshot.wizard_id.clone(),
            });
        }
        if snapshot.wizard_version != definition.version() {
            warn!(
                wizard = %definition.id(),
                snapshot = %snapshot.wizard_version,
                definition = %definition.version(),
                "restoring snapshot taken from another wizard version"
            );
        }

        let mut restored = FieldStore::new();
        for (id, value) in &snapshot.fields {
            if definition.field(id).is_some() {
                restored.set(id.clone(), value.clone());
            }
        }
        let mut controller = Self::mount(definition, restored);
        let stale: Vec<String> = controller.options.stale_fields().cloned().collect();
        controller.refresh(stale);
        Ok(controller)
    }

    fn mount(definition: Arc<WizardDefinition>, store: FieldStore) -> Self {
        let mut options = OptionCache::new();
        for field in definition.fields().filter(|field| field.has_option_source()) {
            options.mark_stale(field.id.clone());
        }
        debug!(wizard = %definition.id(), steps = definition.step_count(), "wizard mounted");
        let mut controller = Self {
            definition,
            state: WizardState {
                active_step: 0,
                store,
                visited: BTreeSet::new(),
                dirty: BTreeSet::new(),
                submission: SubmissionStatus::Idle,
                phase: ControllerPhase::Idle,
            },
            options,
        };
        controller.enter_step(0);
        controller
    }

    pub fn definition(&self) -> &Arc<WizardDefinition> {
        &self.definition
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn phase(&self) -> ControllerPhase {
        self.state.phase
    }

    pub fn active_step(&self) -> usize {
        self.state.active_step
    }

    pub fn active_step_spec(&self) -> Option<&StepSpec> {
        self.definition.step(self.state.active_step)
    }

    pub fn store(&self) -> &FieldStore {
        &self.state.store
    }

    pub fn value(&self, id: &str) -> Option<&Value> {
        self.state.store.get(id)
    }

    pub fn is_visited(&self, step_id: &str) -> bool {
        self.state.visited.contains(step_id)
    }

    pub fn is_dirty(&self, step_id: &str) -> bool {
        self.state.dirty.contains(step_id)
    }

    pub fn submission(&self) -> &SubmissionStatus {
        &self.state.submission
    }

    /// Updates one field and runs the dependency cascade.
    pub fn set_field(
        &mut self,
        id: &str,
        value: Value,
    ) -> Result<Resolution, ControllerError> {
        self.ensure_editable()?;
        let definition = Arc::clone(&self.definition);
        let owner = definition
            .step_of_field(id)
            .ok_or_else(|| ControllerError::UnknownField(id.to_string()))?;
        self.state.phase = ControllerPhase::Navigating;
        // The value is checked against the options offered for the current upstream.
        if self.options.is_stale(id) {
            self.refresh(vec![id.to_string()]);
        }

        let change = self.state.store.set(id, value);
        if !change.is_change() {
            return Ok(Resolution::default());
        }
        if let Some(step) = definition.step(owner) {
            self.state.dirty.insert(step.id.clone());
            if owner != self.state.active_step {
                self.state.visited.remove(&step.id);
            }
        }

        let resolution = DependencyResolver::resolve(&definition, &mut self.state.store, id);
        self.apply(&resolution);
        debug!(
            field = id,
            cleared = resolution.cleared.len(),
            stale = resolution.stale.len(),
            "field updated"
        );
        Ok(resolution)
    }

    /// Validates the active step and advances one step when it passes. An
    /// optional step may be left even when it does not.
    pub fn request_next(&mut self) -> Result<Navigation, ControllerError> {
        self.ensure_editable()?;
        self.state.phase = ControllerPhase::Navigating;
        if let Some(blocked) = self.leave_active_step() {
            return Ok(blocked);
        }
        let from = self.state.active_step;
        let last = self.definition.step_count().saturating_sub(1);
        if from >= last {
            return Ok(Navigation::Unchanged);
        }
        self.enter_step(from + 1);
        Ok(Navigation::Moved { from, to: from + 1 })
    }

    pub fn request_previous(&mut self) -> Result<Navigation, ControllerError> {
        self.ensure_editable()?;
        self.state.phase = ControllerPhase::Navigating;
        let from = self.state.active_step;
        if from == 0 {
            return Ok(Navigation::Unchanged);
        }
        self.enter_step(from - 1);
        Ok(Navigation::Moved { from, to: from - 1 })
    }

    /// Moves to any earlier step. Moving forward requires the active step to
    /// pass and every step in between to be visited or optional.
    pub fn jump_to_step(&mut self, index: usize) -> Result<Navigation, ControllerError> {
        self.ensure_editable()?;
        let count = self.definition.step_count();
        if index >= count {
            return Err(ControllerError::StepOutOfRange { index, count });
        }
        self.state.phase = ControllerPhase::Navigating;
        let from = self.state.active_step;
        if index == from {
            return Ok(Navigation::Unchanged);
        }
        if index > from {
            if let Some(blocked) = self.leave_active_step() {
                return Ok(blocked);
            }
            let definition = Arc::clone(&self.definition);
            if let Some(step) = definition.steps()[from + 1..index]
                .iter()
                .find(|step| !step.optional && !self.state.visited.contains(&step.id))
            {
                debug!(step = %step.id, target = index, "forward jump rejected");
                return Ok(Navigation::Skipped {
                    step: step.id.clone(),
                });
            }
        }
        self.enter_step(index);
        Ok(Navigation::Moved { from, to: index })
    }

    /// Eager validation of the active step, e.g. for inline errors.
    pub fn validate_active_step(&mut self) -> ValidationResult {
        self.validate_step_index(self.state.active_step)
    }

    /// Current option set of a field, recomputed first when stale.
    pub fn options(&mut self, id: &str) -> Result<Vec<OptionItem>, ControllerError> {
        let definition = Arc::clone(&self.definition);
        let field = definition
            .field(id)
            .ok_or_else(|| ControllerError::UnknownField(id.to_string()))?;
        if field.has_option_source() {
            self.refresh(vec![id.to_string()]);
            return Ok(self.options.get(id).map(<[_]>::to_vec).unwrap_or_default());
        }
        Ok(field
            .choices
            .iter()
            .flatten()
            .map(|choice| OptionItem::new(choice.clone(), choice.clone()))
            .collect())
    }

    pub fn snapshot(&self) -> ConfigurationSnapshot {
        ConfigurationSnapshot::capture(&self.definition, &self.state.store)
    }

    pub fn review(&mut self) -> ReviewSummary {
        let stale: Vec<String> = self.options.stale_fields().cloned().collect();
        self.refresh(stale);
        build_review(&self.definition, &self.state.store, &self.options)
    }

    /// Validates every required step and, when they all pass, moves to
    /// `Submitting` and hands out the snapshot to create.
    pub fn begin_submission(&mut self) -> Result<SubmissionTicket, SubmitOutcome> {
        let phase = self.state.phase;
        if phase == ControllerPhase::Submitting || phase.is_finished() {
            debug!(%phase, "submission rejected");
            return Err(SubmitOutcome::Rejected { phase });
        }

        let definition = Arc::clone(&self.definition);
        for (index, step) in definition.steps().iter().enumerate() {
            if step.optional {
                continue;
            }
            let validation = self.validate_step_index(index);
            if validation.valid {
                self.state.visited.insert(step.id.clone());
                continue;
            }
            debug!(step = %step.id, errors = validation.errors.len(), "submission blocked");
            self.state.phase = ControllerPhase::Navigating;
            self.enter_step(index);
            return Err(SubmitOutcome::Invalid {
                step: step.id.clone(),
                index,
                validation,
            });
        }

        let snapshot = ConfigurationSnapshot::capture(&definition, &self.state.store);
        self.state.phase = ControllerPhase::Submitting;
        self.state.submission = SubmissionStatus::InFlight;
        info!(wizard = %definition.id(), "submission started");
        Ok(SubmissionTicket { snapshot })
    }

    /// Records the create result of a ticket obtained from `begin_submission`.
    pub fn finish_submission(
        &mut self,
        result: Result<ResourceId, SubmissionError>,
    ) -> SubmitOutcome {
        if self.state.phase != ControllerPhase::Submitting {
            return SubmitOutcome::Rejected {
                phase: self.state.phase,
            };
        }
        match result {
            Ok(resource_id) => {
                info!(wizard = %self.definition.id(), resource = %resource_id, "wizard completed");
                self.state.phase = ControllerPhase::Completed;
                self.state.submission = SubmissionStatus::Succeeded {
                    resource_id: resource_id.clone(),
                };
                self.discard();
                SubmitOutcome::Created { resource_id }
            }
            Err(SubmissionError::ConcurrentSubmissionRejected) => {
                self.state.phase = ControllerPhase::Navigating;
                self.state.submission = SubmissionStatus::Idle;
                SubmitOutcome::Rejected {
                    phase: ControllerPhase::Submitting,
                }
            }
            Err(error) => {
                warn!(wizard = %self.definition.id(), "submission failed: {error}");
                self.state.phase = ControllerPhase::Navigating;
                self.state.submission = SubmissionStatus::Failed {
                    error: error.clone(),
                };
                SubmitOutcome::Failed { error }
            }
        }
    }

    /// Returns a ticket's session to `Navigating` when its result will never
    /// be reported, keeping every field value.
    pub fn abandon_submission(&mut self) {
        if self.state.phase != ControllerPhase::Submitting {
            return;
        }
        warn!(wizard = %self.definition.id(), "submission abandoned before it finished");
        self.state.phase = ControllerPhase::Navigating;
        self.state.submission = SubmissionStatus::Idle;
    }

    /// Dropping the returned future before it completes abandons the submission.
    pub async fn submit(&mut self, pipeline: &SubmissionPipeline) -> SubmitOutcome {
        let ticket = match self.begin_submission() {
            Ok(ticket) => ticket,
            Err(outcome) => return outcome,
        };
        let mut pending = PendingSubmission {
            controller: self,
            armed: true,
        };
        let result = pipeline.execute(ticket.into_snapshot()).await;
        pending.settle(result)
    }

    pub fn cancel(&mut self) -> Result<(), ControllerError> {
        self.ensure_editable()?;
        debug!(wizard = %self.definition.id(), "wizard cancelled");
        self.state.phase = ControllerPhase::Cancelled;
        self.discard();
        Ok(())
    }

    fn ensure_editable(&self) -> Result<(), ControllerError> {
        match self.state.phase {
            ControllerPhase::Submitting => Err(ControllerError::Busy),
            phase if phase.is_finished() => Err(ControllerError::Finished(phase)),
            _ => Ok(()),
        }
    }

    // Validates the active step before moving forward; `Some` blocks the move.
    fn leave_active_step(&mut self) -> Option<Navigation> {
        let index = self.state.active_step;
        let validation = self.validate_step_index(index);
        let step = self.definition.step(index)?;
        if validation.valid {
            self.state.visited.insert(step.id.clone());
            self.state.dirty.remove(&step.id);
            return None;
        }
        if step.optional {
            debug!(step = %step.id, "leaving optional step with errors");
            return None;
        }
        debug!(step = %step.id, errors = validation.errors.len(), "navigation blocked");
        Some(Navigation::Invalid(validation))
    }

    fn validate_step_index(&mut self, index: usize) -> ValidationResult {
        self.refresh_step(index);
        validate_step_at(&self.definition, index, &self.state.store, &self.options)
    }

    fn enter_step(&mut self, index: usize) {
        let from = self.state.active_step;
        self.state.active_step = index;
        self.refresh_step(index);
        if from != index {
            debug!(from, to = index, "step changed");
        }
    }

    fn refresh_step(&mut self, index: usize) {
        let Some(step) = self.definition.step(index) else {
            return;
        };
        let fields: Vec<String> = step
            .fields
            .iter()
            .filter(|field| self.options.is_stale(&field.id))
            .map(|field| field.id.clone())
            .collect();
        self.refresh(fields);
    }

    fn refresh(&mut self, fields: Vec<String>) {
        if fields.is_empty() {
            return;
        }
        let resolution = DependencyResolver::refresh(
            &self.definition,
            &mut self.state.store,
            &mut self.options,
            fields.iter().map(String::as_str),
        );
        if !resolution.cleared.is_empty() {
            debug!(cleared = ?resolution.cleared, "stale selections dropped");
        }
        self.apply(&resolution);
    }

    // Marks option sets stale and forgets completion of other steps whose
    // values were cleared.
    fn apply(&mut self, resolution: &Resolution) {
        for id in &resolution.stale {
            self.options.mark_stale(id.clone());
        }
        for id in &resolution.cleared {
            let Some(owner) = self.definition.step_of_field(id) else {
                continue;
            };
            let Some(step) = self.definition.step(owner) else {
                continue;
            };
            self.state.dirty.insert(step.id.clone());
            if owner != self.state.active_step {
                self.state.visited.remove(&step.id);
            }
        }
    }

    fn discard(&mut self) {
        self.state.store = FieldStore::new();
        self.options = OptionCache::new();
        self.state.visited.clear();
        self.state.dirty.clear();
    }
}

struct PendingSubmission<'a> {
    controller: &'a mut WizardController,
    armed: bool,
}

impl PendingSubmission<'_> {
    fn settle(&mut self, result: Result<ResourceId, SubmissionError>) -> SubmitOutcome {
        self.armed = false;
        self.controller.finish_submission(result)
    }
}

impl Drop for PendingSubmission<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.controller.abandon_submission();
        }
    }
}

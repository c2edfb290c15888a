use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use wizard_lib::{
    ConfigurationSnapshot, ControllerError, ControllerPhase, CreateError, CreateOperation,
    Navigation, ResourceId, SubmissionPipeline, SubmissionStatus, SubmitOutcome,
    WizardController, WizardDefinition,
};
use wizard_spec::{OptionItem, WizardSpec};

const SUBNETS: &[(&str, &str)] = &[
    ("subnet-a1", "vpc-a"),
    ("subnet-a2", "vpc-a"),
    ("subnet-b1", "vpc-b"),
];

const GROUPS: &[(&str, &str)] = &[("sg-a", "vpc-a"), ("sg-b", "vpc-b"), ("sg-b2", "vpc-b")];

fn instance_spec() -> WizardSpec {
    serde_json::from_value(json!({
        "id": "launch-instance",
        "title": "Launch instance",
        "version": "1.0",
        "steps": [
            { "id": "details", "title": "Details", "fields": [
                { "id": "name", "type": "text", "label": "Name",
                  "rules": [{ "rule": "required" }] }
            ]},
            { "id": "network", "title": "Network", "optional": true, "fields": [
                { "id": "vpc", "type": "select", "label": "VPC", "options": "vpcs" },
                { "id": "subnet", "type": "select", "label": "Subnet", "options": "subnets",
                  "depends_on": ["vpc"], "rules": [{ "rule": "required" }] },
                { "id": "security_groups", "type": "multi_select", "label": "Security groups",
                  "options": "security_groups", "depends_on": ["vpc"] }
            ]},
            { "id": "storage", "title": "Storage", "fields": [
                { "id": "disk_gb", "type": "number", "label": "Disk size (GiB)",
                  "default_value": 20,
                  "rules": [{ "rule": "required" }, { "rule": "range", "min": 8, "max": 1024 }] },
                { "id": "volume_label", "type": "text", "label": "Volume label",
                  "depends_on": ["name"], "rules": [{ "rule": "required" }] }
            ]},
            { "id": "review", "title": "Review" }
        ]
    }))
    .expect("fixture should deserialize")
}

fn definition() -> Arc<WizardDefinition> {
    let definition = WizardDefinition::builder(instance_spec())
        .option_fn("vpcs", |_| {
            vec![
                OptionItem::new("vpc-a", "Production"),
                OptionItem::new("vpc-b", "Staging"),
            ]
        })
        .option_fn("subnets", |upstream| {
            let vpc = upstream.get_str("vpc");
            SUBNETS
                .iter()
                .filter(|(_, owner)| Some(*owner) == vpc)
                .map(|(id, owner)| OptionItem::new(*id, *id).with_meta("vpc_id", *owner))
                .collect()
        })
        .option_fn("security_groups", |upstream| {
            let vpc = upstream.get_str("vpc");
            GROUPS
                .iter()
                .filter(|(_, owner)| Some(*owner) == vpc)
                .map(|(id, owner)| OptionItem::new(*id, *id).with_meta("vpc_id", *owner))
                .collect()
        })
        .build()
        .expect("definition should build");
    Arc::new(definition)
}

#[derive(Default)]
struct CountingCreate {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl CreateOperation for CountingCreate {
    async fn create(&self, _snapshot: &ConfigurationSnapshot) -> Result<ResourceId, CreateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CreateError::new("capacity", "no capacity in zone"));
        }
        Ok(ResourceId::new("i-0001"))
    }
}

struct SlowCreate;

#[async_trait]
impl CreateOperation for SlowCreate {
    async fn create(&self, _snapshot: &ConfigurationSnapshot) -> Result<ResourceId, CreateError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(ResourceId::new("i-late"))
    }
}

fn completed_details(controller: &mut WizardController) {
    controller.set_field("name", json!("api-1")).unwrap();
    controller.set_field("volume_label", json!("api-root")).unwrap();
}

#[test]
fn mounts_idle_with_defaults() {
    let controller = WizardController::new(definition());
    assert_eq!(controller.phase(), ControllerPhase::Idle);
    assert_eq!(controller.active_step(), 0);
    assert_eq!(controller.value("disk_gb"), Some(&json!(20)));
    assert_eq!(controller.submission(), &SubmissionStatus::Idle);
}

#[test]
fn request_next_is_gated_by_the_active_step() {
    let mut controller = WizardController::new(definition());

    let blocked = controller.request_next().unwrap();
    match blocked {
        Navigation::Invalid(validation) => {
            assert_eq!(validation.code("name"), Some("required"));
        }
        other => panic!("expected validation errors, got {other:?}"),
    }
    assert_eq!(controller.active_step(), 0);
    assert_eq!(controller.phase(), ControllerPhase::Navigating);

    controller.set_field("name", json!("api-1")).unwrap();
    assert!(controller.is_dirty("details"));
    assert_eq!(
        controller.request_next().unwrap(),
        Navigation::Moved { from: 0, to: 1 }
    );
    assert!(controller.is_visited("details"));
    assert!(!controller.is_dirty("details"));
}

#[test]
fn optional_step_can_be_left_empty() {
    let mut controller = WizardController::new(definition());
    controller.set_field("name", json!("api-1")).unwrap();
    controller.request_next().unwrap();

    // Network is optional: its required subnet does not block.
    assert!(controller.request_next().unwrap().moved());
    assert_eq!(controller.active_step(), 2);
    assert!(!controller.is_visited("network"));

    // Storage is required again.
    assert!(matches!(
        controller.request_next().unwrap(),
        Navigation::Invalid(_)
    ));
    controller.set_field("volume_label", json!("api-root")).unwrap();
    assert!(controller.request_next().unwrap().moved());
    assert_eq!(controller.request_next().unwrap(), Navigation::Unchanged);
    assert_eq!(controller.active_step(), 3);
}

#[test]
fn previous_never_validates() {
    let mut controller = WizardController::new(definition());
    assert_eq!(controller.request_previous().unwrap(), Navigation::Unchanged);
    controller.set_field("name", json!("api-1")).unwrap();
    controller.request_next().unwrap();
    controller.request_next().unwrap();
    controller.set_field("disk_gb", json!(1)).unwrap();

    assert_eq!(
        controller.request_previous().unwrap(),
        Navigation::Moved { from: 2, to: 1 }
    );
}

#[test]
fn forward_jumps_cannot_skip_unvisited_required_steps() {
    let mut controller = WizardController::new(definition());
    completed_details(&mut controller);

    match controller.jump_to_step(3).unwrap() {
        Navigation::Skipped { step } => assert_eq!(step, "storage"),
        other => panic!("expected a rejected jump, got {other:?}"),
    }
    assert_eq!(controller.active_step(), 0);

    // Optional network in between does not block.
    assert!(controller.jump_to_step(2).unwrap().moved());
    assert!(controller.request_next().unwrap().moved());
    assert!(controller.jump_to_step(0).unwrap().moved());
    assert_eq!(controller.jump_to_step(0).unwrap(), Navigation::Unchanged);
    assert!(controller.jump_to_step(3).unwrap().moved());

    assert_eq!(
        controller.jump_to_step(9),
        Err(ControllerError::StepOutOfRange { index: 9, count: 4 })
    );
}

#[test]
fn forward_jump_requires_the_active_step_to_pass() {
    let mut controller = WizardController::new(definition());
    assert!(matches!(
        controller.jump_to_step(1).unwrap(),
        Navigation::Invalid(_)
    ));
    assert_eq!(controller.active_step(), 0);
}

#[test]
fn cascade_into_a_visited_step_revokes_its_visit() {
    let mut controller = WizardController::new(definition());
    completed_details(&mut controller);
    controller.jump_to_step(2).unwrap();
    controller.request_next().unwrap();
    assert!(controller.is_visited("storage"));

    controller.jump_to_step(0).unwrap();
    let resolution = controller.set_field("name", json!("api-2")).unwrap();
    assert_eq!(resolution.cleared, vec!["volume_label"]);
    assert!(controller.value("volume_label").is_none());
    assert!(!controller.is_visited("storage"));
    assert!(controller.is_dirty("storage"));

    assert_eq!(
        controller.jump_to_step(3).unwrap(),
        Navigation::Skipped {
            step: "storage".into()
        }
    );
}

#[test]
fn editing_a_visited_step_from_elsewhere_revokes_its_visit() {
    let mut controller = WizardController::new(definition());
    completed_details(&mut controller);
    controller.jump_to_step(2).unwrap();
    controller.request_next().unwrap();
    assert!(controller.is_visited("storage"));

    controller.jump_to_step(0).unwrap();
    controller.set_field("disk_gb", json!(null)).unwrap();
    assert!(!controller.is_visited("storage"));
    assert_eq!(
        controller.jump_to_step(3).unwrap(),
        Navigation::Skipped {
            step: "storage".into()
        }
    );
}

#[test]
fn editing_the_active_step_keeps_its_visit() {
    let mut controller = WizardController::new(definition());
    completed_details(&mut controller);
    controller.request_next().unwrap();
    assert!(controller.is_visited("details"));
    controller.request_previous().unwrap();
    controller.set_field("name", json!("api-9")).unwrap();
    assert!(controller.is_visited("details"));
}

#[test]
fn selection_outside_the_upstream_options_is_reported() {
    let mut controller = WizardController::new(definition());
    completed_details(&mut controller);
    controller.request_next().unwrap();

    controller.set_field("vpc", json!("vpc-a")).unwrap();
    controller.set_field("subnet", json!("subnet-b1")).unwrap();
    let validation = controller.validate_active_step();
    assert_eq!(validation.code("subnet"), Some("invalid_option"));
    assert_eq!(controller.value("subnet"), Some(&json!("subnet-b1")));
}

#[test]
fn setting_the_same_value_resolves_nothing() {
    let mut controller = WizardController::new(definition());
    completed_details(&mut controller);
    let resolution = controller.set_field("name", json!("api-1")).unwrap();
    assert!(resolution.is_empty());
    assert_eq!(controller.value("volume_label"), Some(&json!("api-root")));
}

#[test]
fn unknown_fields_are_rejected() {
    let mut controller = WizardController::new(definition());
    assert_eq!(
        controller.set_field("colour", json!("blue")),
        Err(ControllerError::UnknownField("colour".into()))
    );
    assert!(controller.options("colour").is_err());
}

#[test]
fn switching_vpc_clears_placement_and_filters_options() {
    let mut controller = WizardController::new(definition());
    completed_details(&mut controller);
    controller.request_next().unwrap();

    controller.set_field("vpc", json!("vpc-a")).unwrap();
    let subnets = controller.options("subnet").unwrap();
    assert_eq!(subnets.len(), 2);
    controller.set_field("subnet", json!("subnet-a1")).unwrap();
    controller
        .set_field("security_groups", json!(["sg-a"]))
        .unwrap();

    let resolution = controller.set_field("vpc", json!("vpc-b")).unwrap();
    assert!(resolution.cleared.contains(&"subnet".to_string()));
    assert!(resolution.cleared.contains(&"security_groups".to_string()));
    assert!(controller.value("subnet").is_none());
    assert!(controller.value("security_groups").is_none());

    let subnets = controller.options("subnet").unwrap();
    assert!(!subnets.is_empty());
    assert!(subnets.iter().all(|item| item.meta("vpc_id") == Some("vpc-b")));
    let groups = controller.options("security_groups").unwrap();
    let ids: Vec<&str> = groups.iter().map(|item| item.id.as_str()).collect();
    assert_eq!(ids, vec!["sg-b", "sg-b2"]);
}

#[test]
fn static_choices_are_exposed_as_options() {
    let mut controller = WizardController::new(definition());
    assert!(controller.options("name").unwrap().is_empty());
    let vpcs = controller.options("vpc").unwrap();
    assert_eq!(vpcs.len(), 2);
}

#[tokio::test]
async fn submit_creates_once_and_discards_the_store() {
    let stub = Arc::new(CountingCreate::default());
    let pipeline = SubmissionPipeline::shared(stub.clone());
    let mut controller = WizardController::new(definition());
    completed_details(&mut controller);

    let outcome = controller.submit(&pipeline).await;
    assert_eq!(
        outcome,
        SubmitOutcome::Created {
            resource_id: ResourceId::new("i-0001")
        }
    );
    assert_eq!(controller.phase(), ControllerPhase::Completed);
    assert!(controller.store().is_empty());
    assert_eq!(stub.calls.load(Ordering::SeqCst), 1);

    assert_eq!(
        controller.submit(&pipeline).await,
        SubmitOutcome::Rejected {
            phase: ControllerPhase::Completed
        }
    );
    assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        controller.set_field("name", json!("again")),
        Err(ControllerError::Finished(ControllerPhase::Completed))
    );
}

#[tokio::test]
async fn second_submission_while_submitting_is_a_no_op() {
    let stub = Arc::new(CountingCreate::default());
    let pipeline = SubmissionPipeline::shared(stub.clone());
    let mut controller = WizardController::new(definition());
    completed_details(&mut controller);

    let ticket = controller.begin_submission().expect("ticket");
    assert_eq!(controller.phase(), ControllerPhase::Submitting);
    assert_eq!(controller.submission(), &SubmissionStatus::InFlight);
    assert_eq!(
        controller.begin_submission().unwrap_err(),
        SubmitOutcome::Rejected {
            phase: ControllerPhase::Submitting
        }
    );

    assert_eq!(
        controller.set_field("name", json!("other")),
        Err(ControllerError::Busy)
    );
    assert_eq!(controller.request_next(), Err(ControllerError::Busy));
    assert_eq!(controller.request_previous(), Err(ControllerError::Busy));
    assert_eq!(controller.jump_to_step(0), Err(ControllerError::Busy));
    assert_eq!(controller.cancel(), Err(ControllerError::Busy));

    let result = pipeline.execute(ticket.into_snapshot()).await;
    let outcome = controller.finish_submission(result);
    assert!(matches!(outcome, SubmitOutcome::Created { .. }));
    assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_submission_keeps_values_for_a_retry() {
    let failing = SubmissionPipeline::new(CountingCreate {
        fail: true,
        ..CountingCreate::default()
    });
    let mut controller = WizardController::new(definition());
    completed_details(&mut controller);

    let outcome = controller.submit(&failing).await;
    assert!(matches!(outcome, SubmitOutcome::Failed { .. }));
    assert_eq!(controller.phase(), ControllerPhase::Navigating);
    assert_eq!(controller.value("name"), Some(&json!("api-1")));
    assert!(matches!(
        controller.submission(),
        SubmissionStatus::Failed { .. }
    ));

    let working = SubmissionPipeline::new(CountingCreate::default());
    assert!(matches!(
        controller.submit(&working).await,
        SubmitOutcome::Created { .. }
    ));
}

#[tokio::test]
async fn dropped_submit_returns_to_navigating() {
    let slow = SubmissionPipeline::new(SlowCreate);
    let mut controller = WizardController::new(definition());
    completed_details(&mut controller);

    let timed_out =
        tokio::time::timeout(Duration::from_millis(20), controller.submit(&slow)).await;
    assert!(timed_out.is_err());
    assert!(!slow.is_in_flight());
    assert_eq!(controller.phase(), ControllerPhase::Navigating);
    assert_eq!(controller.submission(), &SubmissionStatus::Idle);
    assert_eq!(controller.value("name"), Some(&json!("api-1")));
    assert!(controller.set_field("name", json!("api-2")).is_ok());

    let working = SubmissionPipeline::new(CountingCreate::default());
    assert!(matches!(
        controller.submit(&working).await,
        SubmitOutcome::Created { .. }
    ));
}

#[test]
fn abandoning_a_ticket_keeps_the_values() {
    let mut controller = WizardController::new(definition());
    completed_details(&mut controller);
    let _ticket = controller.begin_submission().expect("ticket");
    controller.abandon_submission();
    assert_eq!(controller.phase(), ControllerPhase::Navigating);
    assert_eq!(controller.value("volume_label"), Some(&json!("api-root")));
    assert!(controller.cancel().is_ok());
}

#[tokio::test]
async fn submit_moves_to_the_first_invalid_required_step() {
    let stub = Arc::new(CountingCreate::default());
    let pipeline = SubmissionPipeline::shared(stub.clone());
    let mut controller = WizardController::new(definition());
    completed_details(&mut controller);
    controller.set_field("disk_gb", json!(4)).unwrap();

    match controller.submit(&pipeline).await {
        SubmitOutcome::Invalid {
            step,
            index,
            validation,
        } => {
            assert_eq!(step, "storage");
            assert_eq!(index, 2);
            assert_eq!(validation.code("disk_gb"), Some("range_min"));
        }
        other => panic!("expected invalid outcome, got {other:?}"),
    }
    assert_eq!(controller.active_step(), 2);
    assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn cancel_discards_the_session() {
    let mut controller = WizardController::new(definition());
    completed_details(&mut controller);
    controller.cancel().unwrap();

    assert_eq!(controller.phase(), ControllerPhase::Cancelled);
    assert!(controller.store().is_empty());
    assert_eq!(
        controller.cancel(),
        Err(ControllerError::Finished(ControllerPhase::Cancelled))
    );
    assert_eq!(
        controller.request_next(),
        Err(ControllerError::Finished(ControllerPhase::Cancelled))
    );
}

#[test]
fn snapshot_restores_an_equivalent_session() {
    let mut controller = WizardController::new(definition());
    completed_details(&mut controller);
    controller.set_field("vpc", json!("vpc-b")).unwrap();
    controller.set_field("subnet", json!("subnet-b1")).unwrap();

    let raw = controller.snapshot().to_json_pretty().unwrap();
    let snapshot = ConfigurationSnapshot::from_json(&raw).unwrap();
    let mut restored = WizardController::from_snapshot(definition(), &snapshot).unwrap();

    assert_eq!(restored.store(), controller.store());
    assert_eq!(restored.snapshot(), controller.snapshot());
    for _ in 0..3 {
        assert!(restored.request_next().unwrap().moved());
    }
    assert_eq!(restored.active_step(), 3);
}

#[test]
fn restoring_drops_selections_that_are_no_longer_offered() {
    let mut snapshot = WizardController::new(definition()).snapshot();
    snapshot.fields.insert("vpc".into(), json!("vpc-a"));
    snapshot.fields.insert("subnet".into(), json!("subnet-b1"));

    let restored = WizardController::from_snapshot(definition(), &snapshot).unwrap();
    assert_eq!(restored.value("vpc"), Some(&json!("vpc-a")));
    assert!(restored.value("subnet").is_none());
}

#[test]
fn snapshots_of_other_wizards_are_refused() {
    let mut snapshot = WizardController::new(definition()).snapshot();
    snapshot.wizard_id = "create-bucket".into();
    let err = WizardController::from_snapshot(definition(), &snapshot).unwrap_err();
    assert!(matches!(err, ControllerError::WizardMismatch { .. }));
}

#[test]
fn review_labels_selected_options() {
    let mut controller = WizardController::new(definition());
    completed_details(&mut controller);
    controller.set_field("vpc", json!("vpc-a")).unwrap();

    let review = controller.review();
    let network = review
        .sections
        .iter()
        .find(|section| section.step_id == "network")
        .expect("network section");
    assert_eq!(network.entries[0].display, "Production (vpc-a)");
    assert!(network.optional);
}

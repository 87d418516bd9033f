mod common;

use audit_engine::InMemoryAuditSink;
use common::{application, fixture, policy_document, OWNER_EMAIL};
use information_protection::action::ActionType;
use information_protection::policy::{label_metadata_key, metadata_suffix};
use information_protection::{
    Action, AssignmentMethod, ContentFormat, ErrorKind, Identity, Policy, PolicyHandler, RulePolicyHandler,
    StaticExecutionState,
};
use proptest::prelude::*;
use std::sync::Arc;

fn labelled_with(label_id: &str, method: AssignmentMethod) -> StaticExecutionState {
    StaticExecutionState::new("report.docx")
        .with_metadata(label_metadata_key(label_id, metadata_suffix::ENABLED), "true")
        .with_metadata(label_metadata_key(label_id, metadata_suffix::METHOD), method.as_str())
}

fn handler() -> RulePolicyHandler {
    RulePolicyHandler::new(
        Arc::new(Policy::compile(policy_document()).unwrap()),
        Identity::new(OWNER_EMAIL),
        "engine-under-test",
        application(),
        Arc::new(InMemoryAuditSink::new()),
    )
}

#[test]
fn test_engine_exposes_policy_handler() {
    let fx = fixture();
    let state = labelled_with("A", AssignmentMethod::Standard).with_new_label("B");
    let actions = fx.engine.policy_handler().compute_actions(&state).unwrap();
    assert_eq!(actions, handler().compute_actions(&state).unwrap());
}

#[test]
fn test_unjustified_downgrade_starts_with_justify() {
    let handler = handler();
    let state = labelled_with("B", AssignmentMethod::Standard).with_new_label("A");

    let actions = handler.compute_actions(&state).unwrap();
    assert!(matches!(actions.first(), Some(Action::Justify(_))));
    assert_eq!(actions.iter().filter(|a| a.is_justify()).count(), 1);

    let metadata = actions.iter().position(|a| matches!(a, Action::Metadata(_))).unwrap();
    let apply = actions.iter().position(|a| matches!(a, Action::ApplyLabel(_))).unwrap();
    assert!(metadata > 0 && apply > metadata);
}

#[test]
fn test_justified_downgrade_has_no_justify() {
    let handler = handler();
    let state = labelled_with("B", AssignmentMethod::Standard)
        .with_new_label("A")
        .with_justification(true, "demo");

    let actions = handler.compute_actions(&state).unwrap();
    assert!(actions.iter().all(|a| !a.is_justify()));
    assert!(matches!(actions.last(), Some(Action::ApplyLabel(a)) if a.label_id == "A"));
}

#[test]
fn test_removing_a_label_is_a_downgrade() {
    let handler = handler();
    let state = labelled_with("general", AssignmentMethod::Standard).with_label_removed();

    let actions = handler.compute_actions(&state).unwrap();
    assert!(matches!(actions.first(), Some(Action::Justify(_))));
    assert!(actions.iter().any(|a| matches!(a, Action::RemoveContentFooter(_))));
}

#[test]
fn test_reapplying_current_label_is_a_no_op() {
    let handler = handler();
    let state = labelled_with("general", AssignmentMethod::Standard).with_new_label("general");
    assert!(handler.compute_actions(&state).unwrap().is_empty());
}

#[test]
fn test_standard_cannot_replace_privileged() {
    let handler = handler();
    let state = labelled_with("A", AssignmentMethod::Privileged).with_new_label("B");
    let err = handler.compute_actions(&state).unwrap_err();
    assert!(err.is(ErrorKind::PrivilegedRequired));

    let privileged = state.with_assignment_method(AssignmentMethod::Privileged);
    assert!(handler.compute_actions(&privileged).is_ok());
}

#[test]
fn test_unknown_label_is_bad_input() {
    let handler = handler();
    let err = handler
        .compute_actions(&StaticExecutionState::new("x").with_new_label("missing"))
        .unwrap_err();
    assert!(err.is(ErrorKind::BadInput));
}

#[test]
fn test_protected_label_order() {
    let handler = handler();
    let state = labelled_with("general", AssignmentMethod::Standard).with_new_label("confidential");

    let kinds: Vec<ActionType> = handler
        .compute_actions(&state)
        .unwrap()
        .iter()
        .map(Action::action_type)
        .collect();
    assert_eq!(
        kinds,
        vec![
            ActionType::REMOVE_CONTENT_FOOTER,
            ActionType::METADATA,
            ActionType::PROTECT_BY_TEMPLATE,
            ActionType::ADD_CONTENT_HEADER,
            ActionType::ADD_WATERMARK,
            ActionType::APPLY_LABEL,
        ]
    );
}

#[test]
fn test_unsupported_actions_are_filtered_but_justify_is_kept() {
    let handler = handler();
    let state = labelled_with("confidential", AssignmentMethod::Standard)
        .with_new_label("public")
        .with_supported_actions(ActionType::METADATA | ActionType::APPLY_LABEL);

    let kinds: Vec<ActionType> = handler
        .compute_actions(&state)
        .unwrap()
        .iter()
        .map(Action::action_type)
        .collect();
    assert_eq!(kinds, vec![ActionType::JUSTIFY, ActionType::METADATA, ActionType::APPLY_LABEL]);
}

fn arb_label() -> impl Strategy<Value = Option<String>> {
    prop::option::of(prop::sample::select(vec!["A", "B", "public", "general", "confidential"]).prop_map(str::to_string))
}

fn arb_state() -> impl Strategy<Value = StaticExecutionState> {
    (
        arb_label(),
        arb_label(),
        any::<bool>(),
        prop::sample::select(vec![AssignmentMethod::Standard, AssignmentMethod::Privileged, AssignmentMethod::Auto]),
        any::<bool>(),
        any::<u32>(),
    )
        .prop_map(|(current, target, justified, method, email, supported)| {
            let mut state = match &current {
                Some(id) => labelled_with(id, AssignmentMethod::Standard),
                None => StaticExecutionState::new("report.docx"),
            };
            state.new_label_id = target;
            state
                .with_justification(justified, "because")
                .with_assignment_method(method)
                .with_content_format(if email { ContentFormat::Email } else { ContentFormat::Default })
                .with_supported_actions(ActionType::from_bits_truncate(supported))
        })
}

proptest! {
    #[test]
    fn prop_compute_actions_is_deterministic(state in arb_state()) {
        let handler = handler();
        let first = handler.compute_actions(&state);
        let second = handler.compute_actions(&state.clone());

        match (first, second) {
            (Ok(a), Ok(b)) => prop_assert_eq!(a, b),
            (Err(a), Err(b)) => prop_assert_eq!(a.kind(), b.kind()),
            (a, b) => prop_assert!(false, "diverging results: {:?} vs {:?}", a, b),
        }
    }

    #[test]
    fn prop_justify_precedes_everything(state in arb_state()) {
        let handler = handler();
        if let Ok(actions) = handler.compute_actions(&state) {
            if let Some(position) = actions.iter().position(Action::is_justify) {
                prop_assert_eq!(position, 0);
            }
        }
    }
}

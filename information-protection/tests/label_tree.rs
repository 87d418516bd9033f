mod common;

use common::fixture;
use information_protection::{Label, LabelDefinition, Policy, PolicyDocument};
use proptest::prelude::*;

/// Nests definitions so that `parents[i]` (when `Some`) is the parent of label `i + 1`.
fn nested(parents: &[Option<usize>]) -> Vec<LabelDefinition> {
    fn build(index: usize, parents: &[Option<usize>]) -> LabelDefinition {
        let mut definition = LabelDefinition::new(format!("label-{index}"), format!("Label {index}"), index as i32);
        for (child, parent) in parents.iter().enumerate() {
            let child = child + 1;
            if *parent == Some(index) {
                definition = definition.with_child(build(child, parents));
            }
        }
        definition
    }

    let mut roots = vec![build(0, parents)];
    for (child, parent) in parents.iter().enumerate() {
        if parent.is_none() {
            roots.push(build(child + 1, parents));
        }
    }
    roots
}

fn assert_consistent(labels: &[Label]) {
    for label in labels {
        if let Some(parent) = label.parent() {
            assert!(
                parent.children().iter().any(|c| c.id() == label.id()),
                "{} missing from children of {}",
                label.id(),
                parent.id()
            );
        }
        for child in label.children() {
            assert_eq!(child.parent().map(|p| p.id().to_string()), Some(label.id().to_string()));
        }
    }
}

#[test]
fn test_engine_labels_are_consistent() {
    let fx = fixture();
    let roots = fx.engine.list_sensitivity_labels();
    assert_eq!(
        roots.iter().map(Label::id).collect::<Vec<_>>(),
        vec!["A", "public", "general", "confidential"]
    );

    let b = fx.engine.get_label_by_id("B").unwrap();
    assert_eq!(b.parent().unwrap().id(), "A");
    assert_eq!(b.sensitivity(), 5);
    assert!(fx.engine.get_label_by_id("nope").is_err());

    let all: Vec<Label> = roots.iter().flat_map(|r| std::iter::once(r.clone()).chain(r.children())).collect();
    assert_consistent(&all);
}

#[test]
fn test_depth_first_reports_depth() {
    let mut document = PolicyDocument::default();
    document.labels = vec![LabelDefinition::new("root", "Root", 0)
        .with_child(LabelDefinition::new("mid", "Mid", 1).with_child(LabelDefinition::new("leaf", "Leaf", 2)))];
    let policy = Policy::compile(document).unwrap();

    let walk: Vec<(usize, String)> = policy
        .labels()
        .depth_first()
        .map(|(depth, label)| (depth, label.id().to_string()))
        .collect();
    assert_eq!(
        walk,
        vec![(0, "root".to_string()), (1, "mid".to_string()), (2, "leaf".to_string())]
    );
}

proptest! {
    #[test]
    fn prop_compiled_tree_is_consistent(raw in prop::collection::vec(prop::option::of(any::<prop::sample::Index>()), 0..40)) {
        // Parent of label i + 1 is always an earlier label, so the input is a forest.
        let parents: Vec<Option<usize>> = raw
            .iter()
            .enumerate()
            .map(|(i, p)| p.map(|index| index.index(i + 1)))
            .collect();

        let mut document = PolicyDocument::default();
        document.labels = nested(&parents);
        let policy = Policy::compile(document).unwrap();

        let labels: Vec<Label> = policy.labels().depth_first().map(|(_, label)| label).collect();
        prop_assert_eq!(labels.len(), parents.len() + 1);
        prop_assert_eq!(policy.labels().len(), parents.len() + 1);
        assert_consistent(&labels);

        for (child, parent) in parents.iter().enumerate() {
            let label = policy.label(&format!("label-{}", child + 1)).unwrap();
            prop_assert_eq!(label.parent().map(|p| p.id().to_string()), parent.map(|p| format!("label-{p}")));
        }
    }
}

//! Sensitivity label hierarchy
//!
//! Labels live in an arena owned by [`LabelTree`]. A [`Label`] is a cheap
//! handle into that arena; its parent is an index, not a pointer, so the
//! tree has no reference cycles and can be shared freely across threads.

use crate::policy_data::{
    ContentMarkingDefinition, CustomActionDefinition, LabelDefinition, LabelProtection,
    WatermarkDefinition,
};
use chrono::{DateTime, Utc};
use error_common::{SdkError, SdkResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Policy attached to a label
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct LabelSettings {
    pub header: Option<ContentMarkingDefinition>,
    pub footer: Option<ContentMarkingDefinition>,
    pub watermark: Option<WatermarkDefinition>,
    pub protection: Option<LabelProtection>,
    pub custom_actions: Vec<CustomActionDefinition>,
}

#[derive(Debug)]
struct LabelNode {
    id: String,
    name: String,
    description: String,
    color: String,
    sensitivity: i32,
    tooltip: String,
    is_active: bool,
    parent: Option<usize>,
    children: Vec<usize>,
    settings: LabelSettings,
}

#[derive(Debug, Default)]
pub struct LabelTree {
    nodes: Vec<LabelNode>,
    roots: Vec<usize>,
    by_id: HashMap<String, usize>,
}

impl LabelTree {
    /// Builds the arena in pre-order without recursion.
    ///
    /// # Errors
    /// `BadInput` for empty or duplicate label ids.
    pub fn build(definitions: &[LabelDefinition]) -> SdkResult<Arc<Self>> {
        let mut tree = LabelTree::default();
        let mut pending: Vec<(&LabelDefinition, Option<usize>)> =
            definitions.iter().rev().map(|d| (d, None)).collect();

        while let Some((definition, parent)) = pending.pop() {
            let id = definition.id.trim();
            if id.is_empty() {
                return Err(SdkError::bad_input(format!(
                    "Label '{}' has an empty id",
                    definition.name
                )));
            }
            if tree.by_id.contains_key(id) {
                return Err(SdkError::bad_input(format!("Duplicate label id '{id}'")));
            }

            let index = tree.nodes.len();
            tree.nodes.push(LabelNode {
                id: id.to_string(),
                name: definition.name.clone(),
                description: definition.description.clone(),
                color: definition.color.clone(),
                sensitivity: definition.sensitivity,
                tooltip: definition.tooltip.clone(),
                is_active: definition.active,
                parent,
                children: Vec::with_capacity(definition.children.len()),
                settings: LabelSettings {
                    header: definition.header.clone(),
                    footer: definition.footer.clone(),
                    watermark: definition.watermark.clone(),
                    protection: definition.protection.clone(),
                    custom_actions: definition.custom_actions.clone(),
                },
            });
            tree.by_id.insert(id.to_string(), index);

            match parent.and_then(|p| tree.nodes.get_mut(p)) {
                Some(parent_node) => parent_node.children.push(index),
                None => tree.roots.push(index),
            }

            pending.extend(definition.children.iter().rev().map(|c| (c, Some(index))));
        }

        Ok(Arc::new(tree))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn label(self: &Arc<Self>, id: &str) -> Option<Label> {
        self.by_id.get(id).map(|&index| self.handle(index))
    }

    pub fn roots(self: &Arc<Self>) -> Vec<Label> {
        self.roots.iter().map(|&index| self.handle(index)).collect()
    }

    /// Pre-order walk yielding `(depth, label)`; roots have depth 0.
    pub fn depth_first(self: &Arc<Self>) -> DepthFirst {
        DepthFirst {
            tree: Arc::clone(self),
            stack: self.roots.iter().rev().map(|&index| (0, index)).collect(),
        }
    }

    fn handle(self: &Arc<Self>, index: usize) -> Label {
        Label {
            tree: Arc::clone(self),
            index,
        }
    }

    fn node(&self, index: usize) -> Option<&LabelNode> {
        self.nodes.get(index)
    }
}

pub struct DepthFirst {
    tree: Arc<LabelTree>,
    stack: Vec<(usize, usize)>,
}

impl Iterator for DepthFirst {
    type Item = (usize, Label);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, index) = self.stack.pop()?;
        if let Some(node) = self.tree.node(index) {
            self.stack
                .extend(node.children.iter().rev().map(|&child| (depth.saturating_add(1), child)));
        }
        Some((depth, self.tree.handle(index)))
    }
}

/// Read-only handle to one label of a [`LabelTree`]
#[derive(Clone)]
pub struct Label {
    tree: Arc<LabelTree>,
    index: usize,
}

// Handles are only created from indices that exist in their tree.
static MISSING: LabelNode = LabelNode {
    id: String::new(),
    name: String::new(),
    description: String::new(),
    color: String::new(),
    sensitivity: 0,
    tooltip: String::new(),
    is_active: false,
    parent: None,
    children: Vec::new(),
    settings: LabelSettings {
        header: None,
        footer: None,
        watermark: None,
        protection: None,
        custom_actions: Vec::new(),
    },
};

impl Label {
    fn node(&self) -> &LabelNode {
        self.tree.node(self.index).unwrap_or(&MISSING)
    }

    pub fn id(&self) -> &str {
        &self.node().id
    }

    pub fn name(&self) -> &str {
        &self.node().name
    }

    pub fn description(&self) -> &str {
        &self.node().description
    }

    pub fn color(&self) -> &str {
        &self.node().color
    }

    pub fn sensitivity(&self) -> i32 {
        self.node().sensitivity
    }

    pub fn tooltip(&self) -> &str {
        &self.node().tooltip
    }

    pub fn is_active(&self) -> bool {
        self.node().is_active
    }

    pub fn parent(&self) -> Option<Label> {
        self.node().parent.map(|index| self.tree.handle(index))
    }

    pub fn children(&self) -> Vec<Label> {
        self.node()
            .children
            .iter()
            .map(|&index| self.tree.handle(index))
            .collect()
    }

    /// Whether the label applies protection when set
    pub fn applies_protection(&self) -> bool {
        self.node().settings.protection.is_some()
    }

    pub(crate) fn settings(&self) -> &LabelSettings {
        &self.node().settings
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Label {}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Label")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("sensitivity", &self.sensitivity())
            .field("parent", &self.parent().map(|p| p.id().to_string()))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentMethod {
    #[default]
    Standard,
    Privileged,
    Auto,
}

impl AssignmentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentMethod::Standard => "Standard",
            AssignmentMethod::Privileged => "Privileged",
            AssignmentMethod::Auto => "Auto",
        }
    }
}

impl fmt::Display for AssignmentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssignmentMethod {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(AssignmentMethod::Standard),
            "privileged" => Ok(AssignmentMethod::Privileged),
            "auto" => Ok(AssignmentMethod::Auto),
            other => Err(SdkError::bad_input(format!("Unknown assignment method '{other}'"))),
        }
    }
}

/// Why a label is being applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionSource {
    #[default]
    Manual,
    Automatic,
    Recommended,
    Default,
}

impl ActionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionSource::Manual => "Manual",
            ActionSource::Automatic => "Automatic",
            ActionSource::Recommended => "Recommended",
            ActionSource::Default => "Default",
        }
    }
}

/// Label as applied to a piece of content
#[derive(Debug, Clone, PartialEq)]
pub struct ContentLabel {
    pub creation_time: DateTime<Utc>,
    pub assignment_method: AssignmentMethod,
    pub extended_properties: BTreeMap<String, String>,
    /// Protection on the content came from this label
    pub protection_applied_from_label: bool,
    pub label: Label,
}

/// How a host asks for a label change
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelingOptions {
    pub assignment_method: AssignmentMethod,
    pub action_source: ActionSource,
    pub downgrade_justified: bool,
    pub justification_message: String,
    pub extended_properties: BTreeMap<String, String>,
}

impl LabelingOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_assignment_method(mut self, method: AssignmentMethod) -> Self {
        self.assignment_method = method;
        self
    }

    pub fn with_action_source(mut self, source: ActionSource) -> Self {
        self.action_source = source;
        self
    }

    pub fn with_downgrade_justification(mut self, justified: bool, message: impl Into<String>) -> Self {
        self.downgrade_justified = justified;
        self.justification_message = message.into();
        self
    }

    pub fn with_extended_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extended_properties.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definitions() -> Vec<LabelDefinition> {
        vec![
            LabelDefinition::new("public", "Public", 0),
            LabelDefinition::new("general", "General", 1)
                .with_child(LabelDefinition::new("general-internal", "Internal", 2))
                .with_child(
                    LabelDefinition::new("general-partners", "Partners", 3)
                        .with_child(LabelDefinition::new("general-partners-eu", "EU Partners", 4)),
                ),
        ]
    }

    #[test]
    fn test_parent_child_consistency() {
        let tree = LabelTree::build(&definitions()).unwrap();
        assert_eq!(tree.len(), 5);

        for (_, label) in tree.depth_first() {
            if let Some(parent) = label.parent() {
                assert!(parent.children().contains(&label), "{} missing from {}", label.id(), parent.id());
            }
            for child in label.children() {
                assert_eq!(child.parent().as_ref(), Some(&label));
            }
        }
    }

    #[test]
    fn test_depth_first_order_and_depth() {
        let tree = LabelTree::build(&definitions()).unwrap();
        let walk: Vec<(usize, String)> = tree
            .depth_first()
            .map(|(depth, label)| (depth, label.id().to_string()))
            .collect();

        assert_eq!(
            walk,
            vec![
                (0, "public".to_string()),
                (0, "general".to_string()),
                (1, "general-internal".to_string()),
                (1, "general-partners".to_string()),
                (2, "general-partners-eu".to_string()),
            ]
        );
    }

    #[test]
    fn test_deep_tree_does_not_recurse() {
        let mut definition = LabelDefinition::new("level-1000", "Leaf", 1000);
        for level in (0..1000).rev() {
            definition = LabelDefinition::new(format!("level-{level}"), "Node", level).with_child(definition);
        }

        let tree = LabelTree::build(&[definition]).unwrap();
        let (depth, leaf) = tree.depth_first().last().unwrap();
        assert_eq!(depth, 1000);
        assert_eq!(leaf.id(), "level-1000");
        drop(tree);
    }

    #[test]
    fn test_duplicate_and_empty_ids_rejected() {
        let duplicate = vec![
            LabelDefinition::new("a", "A", 1),
            LabelDefinition::new("b", "B", 2).with_child(LabelDefinition::new("a", "Again", 3)),
        ];
        assert!(LabelTree::build(&duplicate).is_err());
        assert!(LabelTree::build(&[LabelDefinition::new(" ", "Blank", 1)]).is_err());
    }

    #[test]
    fn test_assignment_method_parsing() {
        assert_eq!("PRIVILEGED".parse::<AssignmentMethod>().unwrap(), AssignmentMethod::Privileged);
        assert!("manual".parse::<AssignmentMethod>().is_err());
    }
}

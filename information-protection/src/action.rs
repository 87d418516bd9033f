//! Policy-computed units of work
//!
//! [`Action`] is a closed sum type; hosts `match` on it to apply each step.
//! [`ActionType`] is the matching bit set used to advertise which actions a
//! host can perform and to test membership with `&`.

use crate::label::ActionSource;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, Not};

/// UI element names used for the markings this SDK writes
pub mod ui_element {
    pub const HEADER: &str = "ip_header";
    pub const FOOTER: &str = "ip_footer";
    pub const WATERMARK: &str = "ip_watermark";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionType(u32);

impl ActionType {
    pub const ADD_CONTENT_FOOTER: ActionType = ActionType(1 << 0);
    pub const ADD_CONTENT_HEADER: ActionType = ActionType(1 << 1);
    pub const ADD_WATERMARK: ActionType = ActionType(1 << 2);
    pub const CUSTOM: ActionType = ActionType(1 << 3);
    pub const JUSTIFY: ActionType = ActionType(1 << 4);
    pub const METADATA: ActionType = ActionType(1 << 5);
    pub const PROTECT_ADHOC: ActionType = ActionType(1 << 6);
    pub const PROTECT_BY_TEMPLATE: ActionType = ActionType(1 << 7);
    pub const PROTECT_DO_NOT_FORWARD: ActionType = ActionType(1 << 8);
    pub const REMOVE_CONTENT_FOOTER: ActionType = ActionType(1 << 9);
    pub const REMOVE_CONTENT_HEADER: ActionType = ActionType(1 << 10);
    pub const REMOVE_PROTECTION: ActionType = ActionType(1 << 11);
    pub const REMOVE_WATERMARK: ActionType = ActionType(1 << 12);
    pub const APPLY_LABEL: ActionType = ActionType(1 << 13);
    pub const RECOMMEND_LABEL: ActionType = ActionType(1 << 14);

    const ALL_BITS: u32 = (1 << 15) - 1;

    pub const fn empty() -> Self {
        ActionType(0)
    }

    pub const fn all() -> Self {
        ActionType(Self::ALL_BITS)
    }

    /// Unknown bits are dropped.
    pub const fn from_bits_truncate(bits: u32) -> Self {
        ActionType(bits & Self::ALL_BITS)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: ActionType) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn without(self, other: ActionType) -> Self {
        ActionType(self.0 & !other.0)
    }
}

impl BitOr for ActionType {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        ActionType(self.0 | rhs.0)
    }
}

impl BitOrAssign for ActionType {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ActionType {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        ActionType(self.0 & rhs.0)
    }
}

impl BitAndAssign for ActionType {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl BitXor for ActionType {
    type Output = Self;
    fn bitxor(self, rhs: Self) -> Self {
        ActionType(self.0 ^ rhs.0)
    }
}

impl Not for ActionType {
    type Output = Self;
    fn not(self) -> Self {
        ActionType(!self.0 & Self::ALL_BITS)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentMarkAlignment {
    #[default]
    Left,
    Right,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkLayout {
    Horizontal,
    #[default]
    Diagonal,
}

/// Header or footer to add
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentMarkAction {
    pub id: String,
    pub ui_element_name: String,
    pub text: String,
    pub font_name: String,
    pub font_size: u32,
    pub font_color: String,
    pub alignment: ContentMarkAlignment,
    pub margin: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatermarkAction {
    pub id: String,
    pub ui_element_name: String,
    pub layout: WatermarkLayout,
    pub text: String,
    pub font_name: String,
    pub font_size: u32,
    pub font_color: String,
}

/// Opaque property bag handed through to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomAction {
    pub id: String,
    pub name: String,
    pub properties: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JustifyAction {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataAction {
    pub id: String,
    pub metadata_to_remove: Vec<String>,
    pub metadata_to_add: Vec<(String, String)>,
}

/// Host must apply protection it defines itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectAdhocAction {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectByTemplateAction {
    pub id: String,
    pub template_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectDoNotForwardAction {
    pub id: String,
    pub owner: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveContentMarkAction {
    pub id: String,
    pub ui_element_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveProtectionAction {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveWatermarkAction {
    pub id: String,
    pub ui_element_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyLabelAction {
    pub id: String,
    pub label_id: String,
    pub action_source: ActionSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendLabelAction {
    pub id: String,
    pub label_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    AddContentFooter(ContentMarkAction),
    AddContentHeader(ContentMarkAction),
    AddWatermark(WatermarkAction),
    Custom(CustomAction),
    Justify(JustifyAction),
    Metadata(MetadataAction),
    ProtectAdhoc(ProtectAdhocAction),
    ProtectByTemplate(ProtectByTemplateAction),
    ProtectDoNotForward(ProtectDoNotForwardAction),
    RemoveContentFooter(RemoveContentMarkAction),
    RemoveContentHeader(RemoveContentMarkAction),
    RemoveProtection(RemoveProtectionAction),
    RemoveWatermark(RemoveWatermarkAction),
    ApplyLabel(ApplyLabelAction),
    RecommendLabel(RecommendLabelAction),
}

impl Action {
    pub fn id(&self) -> &str {
        match self {
            Action::AddContentFooter(a) | Action::AddContentHeader(a) => &a.id,
            Action::AddWatermark(a) => &a.id,
            Action::Custom(a) => &a.id,
            Action::Justify(a) => &a.id,
            Action::Metadata(a) => &a.id,
            Action::ProtectAdhoc(a) => &a.id,
            Action::ProtectByTemplate(a) => &a.id,
            Action::ProtectDoNotForward(a) => &a.id,
            Action::RemoveContentFooter(a) | Action::RemoveContentHeader(a) => &a.id,
            Action::RemoveProtection(a) => &a.id,
            Action::RemoveWatermark(a) => &a.id,
            Action::ApplyLabel(a) => &a.id,
            Action::RecommendLabel(a) => &a.id,
        }
    }

    pub fn action_type(&self) -> ActionType {
        match self {
            Action::AddContentFooter(_) => ActionType::ADD_CONTENT_FOOTER,
            Action::AddContentHeader(_) => ActionType::ADD_CONTENT_HEADER,
            Action::AddWatermark(_) => ActionType::ADD_WATERMARK,
            Action::Custom(_) => ActionType::CUSTOM,
            Action::Justify(_) => ActionType::JUSTIFY,
            Action::Metadata(_) => ActionType::METADATA,
            Action::ProtectAdhoc(_) => ActionType::PROTECT_ADHOC,
            Action::ProtectByTemplate(_) => ActionType::PROTECT_BY_TEMPLATE,
            Action::ProtectDoNotForward(_) => ActionType::PROTECT_DO_NOT_FORWARD,
            Action::RemoveContentFooter(_) => ActionType::REMOVE_CONTENT_FOOTER,
            Action::RemoveContentHeader(_) => ActionType::REMOVE_CONTENT_HEADER,
            Action::RemoveProtection(_) => ActionType::REMOVE_PROTECTION,
            Action::RemoveWatermark(_) => ActionType::REMOVE_WATERMARK,
            Action::ApplyLabel(_) => ActionType::APPLY_LABEL,
            Action::RecommendLabel(_) => ActionType::RECOMMEND_LABEL,
        }
    }

    pub fn is_justify(&self) -> bool {
        matches!(self, Action::Justify(_))
    }
}

/// Combined type bits of a sequence of actions
pub fn action_types(actions: &[Action]) -> ActionType {
    actions
        .iter()
        .fold(ActionType::empty(), |acc, action| acc | action.action_type())
}

/// Expands `${Item.Label}`, `${Item.Name}` and `${Item.Location}` in marking text.
pub fn expand_marking_text(text: &str, label_name: &str, content_identifier: &str) -> String {
    let item_name = std::path::Path::new(content_identifier)
        .file_name()
        .map_or_else(|| content_identifier.to_string(), |n| n.to_string_lossy().into_owned());

    text.replace("${Item.Label}", label_name)
        .replace("${Item.Name}", &item_name)
        .replace("${Item.Location}", content_identifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_combine_and_test() {
        let supported = ActionType::METADATA | ActionType::APPLY_LABEL | ActionType::JUSTIFY;
        assert!(supported.contains(ActionType::METADATA));
        assert!(!supported.contains(ActionType::ADD_WATERMARK));
        assert_eq!(supported & ActionType::APPLY_LABEL, ActionType::APPLY_LABEL);
        assert!((supported ^ supported).is_empty());
        assert!(!(!supported).contains(ActionType::JUSTIFY));
        assert!(ActionType::all().contains(ActionType::RECOMMEND_LABEL));
        assert_eq!(ActionType::from_bits_truncate(u32::MAX), ActionType::all());
    }

    #[test]
    fn test_every_variant_has_a_distinct_type() {
        let actions = vec![
            Action::Justify(JustifyAction { id: "j".to_string() }),
            Action::RemoveProtection(RemoveProtectionAction { id: "r".to_string() }),
            Action::ApplyLabel(ApplyLabelAction {
                id: "a".to_string(),
                label_id: "l".to_string(),
                action_source: ActionSource::Manual,
            }),
        ];
        let combined = action_types(&actions);
        assert_eq!(combined.bits().count_ones(), 3);
        assert_eq!(actions[2].id(), "a");
        assert!(actions[0].is_justify());
    }

    #[test]
    fn test_marking_text_substitution() {
        let text = expand_marking_text(
            "${Item.Label} - ${Item.Name} (${Item.Location})",
            "Confidential",
            "/data/plans/q3.docx",
        );
        assert_eq!(text, "Confidential - q3.docx (/data/plans/q3.docx)");
    }

    #[test]
    fn test_action_serializes_with_type_tag() {
        let action = Action::ProtectByTemplate(ProtectByTemplateAction {
            id: "protect_by_template-conf".to_string(),
            template_id: "tmpl".to_string(),
        });
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "protect_by_template");
        assert_eq!(json["template_id"], "tmpl");
    }
}

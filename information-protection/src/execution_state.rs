//! Context the policy handler pulls from the host for one evaluation

use crate::action::ActionType;
use crate::label::{ActionSource, AssignmentMethod};
use crate::protection::ProtectionDescriptor;
use error_common::SdkError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentState {
    #[default]
    Rest,
    Motion,
    Use,
}

impl fmt::Display for ContentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ContentState::Rest => "rest",
            ContentState::Motion => "motion",
            ContentState::Use => "use",
        })
    }
}

impl FromStr for ContentState {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rest" => Ok(ContentState::Rest),
            "motion" => Ok(ContentState::Motion),
            "use" => Ok(ContentState::Use),
            other => Err(SdkError::bad_input(format!("Unknown content state '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    #[default]
    Default,
    Email,
}

impl fmt::Display for ContentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ContentFormat::Default => "default",
            ContentFormat::Email => "email",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub id: String,
    pub count: u32,
    pub confidence_level: u32,
}

/// Read-only view of content and the requested change
///
/// The handler calls these accessors as often as it needs during one
/// evaluation, so implementations must return the same answers each time.
pub trait ExecutionState: Send + Sync {
    /// Label to apply; `None` removes the current label.
    fn new_label_id(&self) -> Option<String>;

    fn new_label_action_source(&self) -> ActionSource;

    /// Human-readable name or path of the content
    fn content_identifier(&self) -> String;

    fn content_state(&self) -> ContentState;

    /// Whether a downgrade was justified, and the justification text
    fn is_downgrade_justified(&self) -> (bool, String);

    fn new_label_assignment_method(&self) -> AssignmentMethod;

    fn new_label_extended_properties(&self) -> BTreeMap<String, String>;

    /// Metadata entries whose key is in `names` or starts with one of
    /// `name_prefixes`; both empty selects everything.
    fn content_metadata(&self, names: &[&str], name_prefixes: &[&str]) -> Vec<(String, String)>;

    fn protection_descriptor(&self) -> Option<ProtectionDescriptor>;

    fn content_format(&self) -> ContentFormat;

    /// Actions the host is able to perform
    fn supported_actions(&self) -> ActionType;

    fn classification_results(&self, _classification_ids: &[String]) -> Vec<ClassificationResult> {
        Vec::new()
    }

    /// Extra key/value pairs for audit records
    fn audit_metadata(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}

/// Plain-data [`ExecutionState`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StaticExecutionState {
    pub new_label_id: Option<String>,
    pub action_source: ActionSource,
    pub content_identifier: String,
    pub content_state: ContentState,
    pub downgrade_justified: bool,
    pub justification_message: String,
    pub assignment_method: AssignmentMethod,
    pub extended_properties: BTreeMap<String, String>,
    pub metadata: BTreeMap<String, String>,
    pub protection: Option<ProtectionDescriptor>,
    pub content_format: ContentFormat,
    pub supported_actions: ActionType,
    pub classification_results: Vec<ClassificationResult>,
    pub audit_metadata: BTreeMap<String, String>,
}

impl StaticExecutionState {
    /// State for `content_identifier` that supports every action.
    pub fn new(content_identifier: impl Into<String>) -> Self {
        Self {
            content_identifier: content_identifier.into(),
            supported_actions: ActionType::all(),
            ..Self::default()
        }
    }

    pub fn with_new_label(mut self, label_id: impl Into<String>) -> Self {
        self.new_label_id = Some(label_id.into());
        self
    }

    pub fn with_label_removed(mut self) -> Self {
        self.new_label_id = None;
        self
    }

    pub fn with_assignment_method(mut self, method: AssignmentMethod) -> Self {
        self.assignment_method = method;
        self
    }

    pub fn with_action_source(mut self, source: ActionSource) -> Self {
        self.action_source = source;
        self
    }

    pub fn with_justification(mut self, justified: bool, message: impl Into<String>) -> Self {
        self.downgrade_justified = justified;
        self.justification_message = message.into();
        self
    }

    pub fn with_extended_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extended_properties.insert(key.into(), value.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_metadata_map(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_protection(mut self, descriptor: Option<ProtectionDescriptor>) -> Self {
        self.protection = descriptor;
        self
    }

    pub fn with_content_state(mut self, state: ContentState) -> Self {
        self.content_state = state;
        self
    }

    pub fn with_content_format(mut self, format: ContentFormat) -> Self {
        self.content_format = format;
        self
    }

    pub fn with_supported_actions(mut self, supported: ActionType) -> Self {
        self.supported_actions = supported;
        self
    }

    pub fn with_audit_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.audit_metadata.insert(key.into(), value.into());
        self
    }
}

impl ExecutionState for StaticExecutionState {
    fn new_label_id(&self) -> Option<String> {
        self.new_label_id.clone()
    }

    fn new_label_action_source(&self) -> ActionSource {
        self.action_source
    }

    fn content_identifier(&self) -> String {
        self.content_identifier.clone()
    }

    fn content_state(&self) -> ContentState {
        self.content_state
    }

    fn is_downgrade_justified(&self) -> (bool, String) {
        (self.downgrade_justified, self.justification_message.clone())
    }

    fn new_label_assignment_method(&self) -> AssignmentMethod {
        self.assignment_method
    }

    fn new_label_extended_properties(&self) -> BTreeMap<String, String> {
        self.extended_properties.clone()
    }

    fn content_metadata(&self, names: &[&str], name_prefixes: &[&str]) -> Vec<(String, String)> {
        let select_all = names.is_empty() && name_prefixes.is_empty();
        self.metadata
            .iter()
            .filter(|(key, _)| {
                select_all
                    || names.contains(&key.as_str())
                    || name_prefixes.iter().any(|prefix| key.starts_with(prefix))
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn protection_descriptor(&self) -> Option<ProtectionDescriptor> {
        self.protection.clone()
    }

    fn content_format(&self) -> ContentFormat {
        self.content_format
    }

    fn supported_actions(&self) -> ActionType {
        self.supported_actions
    }

    fn classification_results(&self, classification_ids: &[String]) -> Vec<ClassificationResult> {
        self.classification_results
            .iter()
            .filter(|r| classification_ids.is_empty() || classification_ids.contains(&r.id))
            .cloned()
            .collect()
    }

    fn audit_metadata(&self) -> BTreeMap<String, String> {
        self.audit_metadata.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_filtering() {
        let state = StaticExecutionState::new("doc.docx")
            .with_metadata("MSIP_Label_a_Enabled", "true")
            .with_metadata("MSIP_Label_a_Method", "Standard")
            .with_metadata("Author", "alice");

        assert_eq!(state.content_metadata(&[], &["MSIP_Label_"]).len(), 2);
        assert_eq!(state.content_metadata(&["Author"], &[]), vec![("Author".to_string(), "alice".to_string())]);
        assert_eq!(state.content_metadata(&[], &[]).len(), 3);
    }

    #[test]
    fn test_defaults() {
        let state = StaticExecutionState::new("doc.docx");
        assert_eq!(state.supported_actions(), ActionType::all());
        assert_eq!(state.content_state(), ContentState::Rest);
        assert_eq!(state.is_downgrade_justified(), (false, String::new()));
        assert!(state.new_label_id().is_none());
    }

    #[test]
    fn test_content_state_parsing() {
        assert_eq!("MOTION".parse::<ContentState>().unwrap(), ContentState::Motion);
        assert!("flying".parse::<ContentState>().is_err());
    }
}

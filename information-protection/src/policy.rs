//! Policy evaluation against an [`ExecutionState`]
//!
//! [`RulePolicyHandler`] derives the action list from the label tree of the
//! engine's policy. Evaluation is a pure function of the execution state:
//! timestamps and random identifiers are stamped by the file handler when it
//! applies the actions, never here.

use crate::action::{
    ui_element, Action, ActionType, ApplyLabelAction, ContentMarkAction, CustomAction,
    JustifyAction, MetadataAction, ProtectAdhocAction, ProtectByTemplateAction,
    ProtectDoNotForwardAction, RemoveContentMarkAction, RemoveProtectionAction,
    RemoveWatermarkAction, WatermarkAction,
};
use crate::delegates::{ApplicationInfo, Identity};
use crate::error::from_audit;
use crate::execution_state::{ContentFormat, ExecutionState};
use crate::label::{AssignmentMethod, ContentLabel, Label};
use crate::policy_data::{ContentMarkingDefinition, LabelProtection, Policy};
use audit_engine::{AuditEntry, AuditEventType, AuditSink};
use chrono::{DateTime, Utc};
use error_common::{SdkError, SdkResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Prefix of every label metadata key
pub const LABEL_METADATA_PREFIX: &str = "MSIP_Label_";

pub mod metadata_suffix {
    pub const ENABLED: &str = "_Enabled";
    pub const SET_DATE: &str = "_SetDate";
    pub const METHOD: &str = "_Method";
    pub const NAME: &str = "_Name";
    pub const CONTENT_BITS: &str = "_ContentBits";
    pub const ACTION_ID: &str = "_ActionId";
    pub const EXTENDED: &str = "_Ext_";
}

/// Bits of the `_ContentBits` metadata value
pub mod content_bits {
    pub const HEADER: u32 = 1;
    pub const FOOTER: u32 = 2;
    pub const WATERMARK: u32 = 4;
    pub const ENCRYPTION: u32 = 8;
}

pub fn label_metadata_key(label_id: &str, suffix: &str) -> String {
    format!("{LABEL_METADATA_PREFIX}{label_id}{suffix}")
}

/// Evaluates labeling policy for one engine
pub trait PolicyHandler: Send + Sync {
    /// Label currently applied to the content, if any.
    fn get_sensitivity_label(&self, state: &dyn ExecutionState) -> SdkResult<Option<ContentLabel>>;

    /// Ordered actions that bring the content in line with the requested label.
    fn compute_actions(&self, state: &dyn ExecutionState) -> SdkResult<Vec<Action>>;

    /// Records that the actions computed for `state` were applied and persisted.
    fn notify_committed_actions(&self, state: &dyn ExecutionState) -> SdkResult<()>;

    /// Records that content was opened and inspected.
    fn notify_discovery(&self, _state: &dyn ExecutionState) -> SdkResult<()> {
        Ok(())
    }
}

/// Policy handler backed by a compiled [`Policy`]
pub struct RulePolicyHandler {
    policy: Arc<Policy>,
    identity: Identity,
    engine_id: String,
    application: ApplicationInfo,
    audit: Arc<dyn AuditSink>,
}

impl RulePolicyHandler {
    pub fn new(
        policy: Arc<Policy>,
        identity: Identity,
        engine_id: impl Into<String>,
        application: ApplicationInfo,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            policy,
            identity,
            engine_id: engine_id.into(),
            application,
            audit,
        }
    }

    pub fn policy(&self) -> &Arc<Policy> {
        &self.policy
    }

    fn resolve_target(&self, label_id: &str) -> SdkResult<Label> {
        let label = self
            .policy
            .label(label_id)
            .ok_or_else(|| SdkError::bad_input(format!("Label '{label_id}' is not defined by the policy")))?;
        if !label.is_active() {
            return Err(SdkError::bad_input(format!("Label '{label_id}' is not active")));
        }
        Ok(label)
    }

    fn audit_entry(
        &self,
        event_type: AuditEventType,
        state: &dyn ExecutionState,
        action: &str,
    ) -> AuditEntry {
        let mut entry = AuditEntry::new(
            event_type,
            self.identity.effective_email(),
            state.content_identifier(),
            action,
        )
        .with_field("engine_id", self.engine_id.as_str())
        .with_field("application_id", self.application.application_id.as_str())
        .with_field("content_state", state.content_state().to_string())
        .with_field("content_format", state.content_format().to_string());

        let extra = state.audit_metadata();
        if !extra.is_empty() {
            entry = entry.with_field("audit_metadata", serde_json::json!(extra));
        }
        entry
    }
}

/// Collects actions, dropping the ones the host cannot perform.
struct ActionList {
    supported: ActionType,
    actions: Vec<Action>,
}

impl ActionList {
    fn push(&mut self, action: Action) {
        if action.is_justify() || self.supported.contains(action.action_type()) {
            self.actions.push(action);
        } else {
            debug!(action = action.id(), "skipping unsupported action");
        }
    }
}

fn mark_action(id: String, ui_element_name: &str, marking: &ContentMarkingDefinition, text: String) -> ContentMarkAction {
    ContentMarkAction {
        id,
        ui_element_name: ui_element_name.to_string(),
        text,
        font_name: marking.font_name.clone(),
        font_size: marking.font_size,
        font_color: marking.font_color.clone(),
        alignment: marking.alignment,
        margin: marking.margin,
    }
}

fn content_bits_of(label: &Label) -> u32 {
    let settings = label.settings();
    let mut bits = 0;
    if settings.header.is_some() {
        bits |= content_bits::HEADER;
    }
    if settings.footer.is_some() {
        bits |= content_bits::FOOTER;
    }
    if settings.watermark.is_some() {
        bits |= content_bits::WATERMARK;
    }
    if settings.protection.is_some() {
        bits |= content_bits::ENCRYPTION;
    }
    bits
}

impl PolicyHandler for RulePolicyHandler {
    fn get_sensitivity_label(&self, state: &dyn ExecutionState) -> SdkResult<Option<ContentLabel>> {
        let metadata: BTreeMap<String, String> = state
            .content_metadata(&[], &[LABEL_METADATA_PREFIX])
            .into_iter()
            .collect();

        let label = metadata.iter().find_map(|(key, value)| {
            let id = key
                .strip_prefix(LABEL_METADATA_PREFIX)?
                .strip_suffix(metadata_suffix::ENABLED)?;
            if !value.eq_ignore_ascii_case("true") {
                return None;
            }
            self.policy.label(id)
        });
        let Some(label) = label else {
            return Ok(None);
        };

        let creation_time = metadata
            .get(&label_metadata_key(label.id(), metadata_suffix::SET_DATE))
            .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
            .map_or_else(DateTime::<Utc>::default, |t| t.with_timezone(&Utc));

        let assignment_method = metadata
            .get(&label_metadata_key(label.id(), metadata_suffix::METHOD))
            .and_then(|value| value.parse::<AssignmentMethod>().ok())
            .unwrap_or_default();

        let ext_prefix = label_metadata_key(label.id(), metadata_suffix::EXTENDED);
        let extended_properties = metadata
            .iter()
            .filter_map(|(key, value)| key.strip_prefix(&ext_prefix).map(|k| (k.to_string(), value.clone())))
            .collect();

        let protection_applied_from_label = state
            .protection_descriptor()
            .and_then(|d| d.label_id)
            .is_some_and(|id| id == label.id());

        Ok(Some(ContentLabel {
            creation_time,
            assignment_method,
            extended_properties,
            protection_applied_from_label,
            label,
        }))
    }

    fn compute_actions(&self, state: &dyn ExecutionState) -> SdkResult<Vec<Action>> {
        let current = self.get_sensitivity_label(state)?;
        let target = state
            .new_label_id()
            .map(|id| self.resolve_target(&id))
            .transpose()?;

        let current_id = current.as_ref().map(|c| c.label.id().to_string());
        if current_id.as_deref() == target.as_ref().map(Label::id) {
            return Ok(Vec::new());
        }

        let method = state.new_label_assignment_method();
        if let Some(current) = &current {
            if current.assignment_method == AssignmentMethod::Privileged && method == AssignmentMethod::Standard {
                return Err(SdkError::privileged_required(format!(
                    "Label '{}' was applied with privileged assignment",
                    current.label.id()
                )));
            }
        }

        let is_downgrade = match (&current, &target) {
            (Some(current), Some(target)) => target.sensitivity() < current.label.sensitivity(),
            (Some(_), None) => true,
            _ => false,
        };
        let (justified, _) = state.is_downgrade_justified();
        let target_key = target.as_ref().map_or("none", Label::id).to_string();

        let mut list = ActionList {
            supported: state.supported_actions(),
            actions: Vec::new(),
        };

        if is_downgrade && !justified && self.policy.requires_downgrade_justification() {
            list.push(Action::Justify(JustifyAction {
                id: format!("justify-{target_key}"),
            }));
        }

        if let Some(current) = &current {
            let old = current.label.settings();
            let old_id = current.label.id();
            if old.header.is_some() {
                list.push(Action::RemoveContentHeader(RemoveContentMarkAction {
                    id: format!("remove_content_header-{old_id}"),
                    ui_element_names: vec![ui_element::HEADER.to_string()],
                }));
            }
            if old.footer.is_some() {
                list.push(Action::RemoveContentFooter(RemoveContentMarkAction {
                    id: format!("remove_content_footer-{old_id}"),
                    ui_element_names: vec![ui_element::FOOTER.to_string()],
                }));
            }
            if old.watermark.is_some() {
                list.push(Action::RemoveWatermark(RemoveWatermarkAction {
                    id: format!("remove_watermark-{old_id}"),
                    ui_element_names: vec![ui_element::WATERMARK.to_string()],
                }));
            }

            let target_protects = target.as_ref().is_some_and(Label::applies_protection);
            if current.protection_applied_from_label && !target_protects {
                list.push(Action::RemoveProtection(RemoveProtectionAction {
                    id: format!("remove_protection-{old_id}"),
                }));
            }
        }

        let old_prefix = current_id.as_deref().map(|id| label_metadata_key(id, "_"));
        let mut metadata_to_remove: Vec<String> = match &old_prefix {
            Some(prefix) => state
                .content_metadata(&[], &[prefix.as_str()])
                .into_iter()
                .map(|(key, _)| key)
                .collect(),
            None => Vec::new(),
        };
        metadata_to_remove.sort();
        metadata_to_remove.dedup();

        let mut metadata_to_add = Vec::new();
        if let Some(target) = &target {
            let id = target.id();
            metadata_to_add.push((label_metadata_key(id, metadata_suffix::ENABLED), "true".to_string()));
            metadata_to_add.push((label_metadata_key(id, metadata_suffix::METHOD), method.as_str().to_string()));
            metadata_to_add.push((label_metadata_key(id, metadata_suffix::NAME), target.name().to_string()));
            metadata_to_add.push((
                label_metadata_key(id, metadata_suffix::CONTENT_BITS),
                content_bits_of(target).to_string(),
            ));
            for (key, value) in state.new_label_extended_properties() {
                metadata_to_add.push((label_metadata_key(id, &format!("{}{key}", metadata_suffix::EXTENDED)), value));
            }
        }

        if !metadata_to_remove.is_empty() || !metadata_to_add.is_empty() {
            list.push(Action::Metadata(MetadataAction {
                id: format!("metadata-{target_key}"),
                metadata_to_remove,
                metadata_to_add,
            }));
        }

        if let Some(target) = &target {
            let id = target.id();
            let settings = target.settings();
            let content_identifier = state.content_identifier();

            match &settings.protection {
                Some(LabelProtection::Template { template_id }) => {
                    list.push(Action::ProtectByTemplate(ProtectByTemplateAction {
                        id: format!("protect_by_template-{id}"),
                        template_id: template_id.clone(),
                    }));
                }
                Some(LabelProtection::DoNotForward) if state.content_format() == ContentFormat::Email => {
                    list.push(Action::ProtectDoNotForward(ProtectDoNotForwardAction {
                        id: format!("protect_do_not_forward-{id}"),
                        owner: self.identity.effective_email().to_string(),
                    }));
                }
                Some(LabelProtection::Adhoc | LabelProtection::DoNotForward) => {
                    list.push(Action::ProtectAdhoc(ProtectAdhocAction {
                        id: format!("protect_adhoc-{id}"),
                    }));
                }
                None => {}
            }

            let expand = |text: &str| crate::action::expand_marking_text(text, target.name(), &content_identifier);
            if let Some(header) = &settings.header {
                list.push(Action::AddContentHeader(mark_action(
                    format!("add_content_header-{id}"),
                    ui_element::HEADER,
                    header,
                    expand(&header.text),
                )));
            }
            if let Some(footer) = &settings.footer {
                list.push(Action::AddContentFooter(mark_action(
                    format!("add_content_footer-{id}"),
                    ui_element::FOOTER,
                    footer,
                    expand(&footer.text),
                )));
            }
            if let Some(watermark) = &settings.watermark {
                list.push(Action::AddWatermark(WatermarkAction {
                    id: format!("add_watermark-{id}"),
                    ui_element_name: ui_element::WATERMARK.to_string(),
                    layout: watermark.layout,
                    text: expand(&watermark.text),
                    font_name: watermark.font_name.clone(),
                    font_size: watermark.font_size,
                    font_color: watermark.font_color.clone(),
                }));
            }

            for (index, custom) in settings.custom_actions.iter().enumerate() {
                list.push(Action::Custom(CustomAction {
                    id: format!("custom-{id}-{index}"),
                    name: custom.name.clone(),
                    properties: custom.properties.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                }));
            }

            list.push(Action::ApplyLabel(ApplyLabelAction {
                id: format!("apply_label-{id}"),
                label_id: id.to_string(),
                action_source: state.new_label_action_source(),
            }));
        }

        debug!(
            engine_id = %self.engine_id,
            from = current_id.as_deref().unwrap_or("none"),
            to = %target_key,
            count = list.actions.len(),
            "computed actions"
        );
        Ok(list.actions)
    }

    fn notify_committed_actions(&self, state: &dyn ExecutionState) -> SdkResult<()> {
        let current = self.get_sensitivity_label(state)?;
        let new_label = state.new_label_id().and_then(|id| self.policy.label(&id));

        let old_id = current.as_ref().map(|c| c.label.id().to_string());
        let new_id = new_label.as_ref().map(|l| l.id().to_string());
        let action = match (&old_id, &new_id) {
            (Some(_), None) => "label_removed",
            (old, new) if old != new => "label_changed",
            _ => "protection_changed",
        };

        let (justified, justification) = state.is_downgrade_justified();
        let entry = self
            .audit_entry(AuditEventType::Change, state, action)
            .with_field("old_label_id", old_id.clone())
            .with_field("old_label_name", current.as_ref().map(|c| c.label.name().to_string()))
            .with_field("new_label_id", new_id.clone())
            .with_field("new_label_name", new_label.as_ref().map(|l| l.name().to_string()))
            .with_field("assignment_method", state.new_label_assignment_method().as_str())
            .with_field("action_source", state.new_label_action_source().as_str())
            .with_field("downgrade_justified", justified)
            .with_field("justification", justification);

        self.audit.record(&entry).map_err(from_audit)?;
        info!(
            engine_id = %self.engine_id,
            action,
            old_label = old_id.as_deref().unwrap_or("none"),
            new_label = new_id.as_deref().unwrap_or("none"),
            "committed actions recorded"
        );
        Ok(())
    }

    fn notify_discovery(&self, state: &dyn ExecutionState) -> SdkResult<()> {
        let current = self.get_sensitivity_label(state)?;
        let entry = self
            .audit_entry(AuditEventType::Discovery, state, "discovered")
            .with_field("label_id", current.as_ref().map(|c| c.label.id().to_string()))
            .with_field("label_name", current.as_ref().map(|c| c.label.name().to_string()))
            .with_field("protected", state.protection_descriptor().is_some());
        self.audit.record(&entry).map_err(from_audit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution_state::StaticExecutionState;
    use crate::policy_data::{LabelDefinition, PolicyDocument, TemplateDefinition};
    use crate::protection::{rights, UserRights};
    use audit_engine::InMemoryAuditSink;
    use error_common::ErrorKind;

    fn handler_with_sink() -> (RulePolicyHandler, Arc<InMemoryAuditSink>) {
        let document = PolicyDocument {
            templates: vec![TemplateDefinition {
                id: "tmpl-secret".to_string(),
                name: "Secret".to_string(),
                description: String::new(),
                user_rights: vec![UserRights::new(vec!["contoso.com".to_string()], vec![rights::VIEW.to_string()])],
            }],
            labels: vec![
                LabelDefinition::new("public", "Public", 0),
                LabelDefinition::new("general", "General", 1)
                    .with_footer("General use")
                    .with_child(
                        LabelDefinition::new("secret", "Secret", 9)
                            .with_header("SECRET ${Item.Name}")
                            .with_watermark("${Item.Label}")
                            .with_protection(LabelProtection::Template {
                                template_id: "tmpl-secret".to_string(),
                            }),
                    ),
            ],
            ..PolicyDocument::default()
        };
        let policy = Arc::new(Policy::compile(document).unwrap());
        let sink = Arc::new(InMemoryAuditSink::new());
        let handler = RulePolicyHandler::new(
            policy,
            Identity::new("alice@contoso.com"),
            "engine-1",
            ApplicationInfo::new("app-id", "tests", "1.0"),
            sink.clone(),
        );
        (handler, sink)
    }

    fn labelled(label_id: &str) -> StaticExecutionState {
        StaticExecutionState::new("/docs/plan.docx")
            .with_metadata(label_metadata_key(label_id, metadata_suffix::ENABLED), "true")
            .with_metadata(label_metadata_key(label_id, metadata_suffix::METHOD), "Standard")
            .with_metadata(label_metadata_key(label_id, metadata_suffix::SET_DATE), "2024-03-01T10:00:00Z")
    }

    #[test]
    fn test_reads_applied_label() {
        let (handler, _) = handler_with_sink();
        let state = labelled("general").with_metadata(label_metadata_key("general", "_Ext_owner"), "finance");

        let label = handler.get_sensitivity_label(&state).unwrap().unwrap();
        assert_eq!(label.label.id(), "general");
        assert_eq!(label.assignment_method, AssignmentMethod::Standard);
        assert_eq!(label.extended_properties.get("owner").map(String::as_str), Some("finance"));
        assert_eq!(label.creation_time.to_rfc3339(), "2024-03-01T10:00:00+00:00");
    }

    #[test]
    fn test_unknown_or_disabled_label_reads_as_none() {
        let (handler, _) = handler_with_sink();
        let state = StaticExecutionState::new("a.txt")
            .with_metadata(label_metadata_key("ghost", metadata_suffix::ENABLED), "true")
            .with_metadata(label_metadata_key("general", metadata_suffix::ENABLED), "false");
        assert!(handler.get_sensitivity_label(&state).unwrap().is_none());
    }

    #[test]
    fn test_upgrade_action_order() {
        let (handler, _) = handler_with_sink();
        let state = labelled("general").with_new_label("secret");

        let actions = handler.compute_actions(&state).unwrap();
        let types: Vec<ActionType> = actions.iter().map(Action::action_type).collect();
        assert_eq!(
            types,
            vec![
                ActionType::REMOVE_CONTENT_FOOTER,
                ActionType::METADATA,
                ActionType::PROTECT_BY_TEMPLATE,
                ActionType::ADD_CONTENT_HEADER,
                ActionType::ADD_WATERMARK,
                ActionType::APPLY_LABEL,
            ]
        );

        let Action::AddContentHeader(header) = &actions[3] else {
            panic!("expected header");
        };
        assert_eq!(header.text, "SECRET plan.docx");

        let Action::Metadata(metadata) = &actions[1] else {
            panic!("expected metadata");
        };
        assert!(metadata.metadata_to_remove.iter().all(|k| k.starts_with("MSIP_Label_general_")));
        assert!(metadata
            .metadata_to_add
            .contains(&("MSIP_Label_secret_ContentBits".to_string(), "13".to_string())));
    }

    #[test]
    fn test_downgrade_requires_justification_first() {
        let (handler, _) = handler_with_sink();
        let state = labelled("secret").with_new_label("public");

        let actions = handler.compute_actions(&state).unwrap();
        assert!(actions[0].is_justify());
        assert!(actions.iter().skip(1).all(|a| !a.is_justify()));

        let justified = state.clone().with_justification(true, "declassified");
        assert!(handler.compute_actions(&justified).unwrap().iter().all(|a| !a.is_justify()));
    }

    #[test]
    fn test_removal_is_a_downgrade() {
        let (handler, _) = handler_with_sink();
        let actions = handler.compute_actions(&labelled("general").with_label_removed()).unwrap();
        assert!(actions[0].is_justify());
        assert!(actions.iter().all(|a| a.action_type() != ActionType::APPLY_LABEL));
    }

    #[test]
    fn test_same_label_yields_nothing() {
        let (handler, _) = handler_with_sink();
        assert!(handler.compute_actions(&labelled("general").with_new_label("general")).unwrap().is_empty());
    }

    #[test]
    fn test_unsupported_actions_are_filtered_but_justify_kept() {
        let (handler, _) = handler_with_sink();
        let state = labelled("secret")
            .with_new_label("public")
            .with_supported_actions(ActionType::METADATA);

        let types: Vec<ActionType> = handler.compute_actions(&state).unwrap().iter().map(Action::action_type).collect();
        assert_eq!(types, vec![ActionType::JUSTIFY, ActionType::METADATA]);
    }

    #[test]
    fn test_privileged_label_needs_privileged_change() {
        let (handler, _) = handler_with_sink();
        let state = labelled("general")
            .with_metadata(label_metadata_key("general", metadata_suffix::METHOD), "Privileged")
            .with_new_label("secret");

        let err = handler.compute_actions(&state).unwrap_err();
        assert!(err.is(ErrorKind::PrivilegedRequired));

        let privileged = state.with_assignment_method(AssignmentMethod::Privileged);
        assert!(handler.compute_actions(&privileged).is_ok());
    }

    #[test]
    fn test_unknown_target_is_bad_input() {
        let (handler, _) = handler_with_sink();
        let err = handler
            .compute_actions(&StaticExecutionState::new("a.txt").with_new_label("nope"))
            .unwrap_err();
        assert!(err.is(ErrorKind::BadInput));
    }

    #[test]
    fn test_notify_writes_change_audit() {
        let (handler, sink) = handler_with_sink();
        let state = labelled("secret").with_new_label("general").with_justification(true, "shared with partners");

        handler.notify_committed_actions(&state).unwrap();

        let entries = sink.entries_of(AuditEventType::Change);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "label_changed");
        assert_eq!(entries[0].subject, "alice@contoso.com");
        assert_eq!(entries[0].field("old_label_id").unwrap(), "secret");
        assert_eq!(entries[0].field("justification").unwrap(), "shared with partners");
    }
}

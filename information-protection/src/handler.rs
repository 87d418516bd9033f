//! Per-content label and protection handler
//!
//! A handler is bound to one piece of content. Label and protection changes
//! are staged in two independent slots (last write wins) and only reach the
//! output when [`FileHandler::commit`] or [`FileHandler::commit_async`] runs.
//! A commit builds the whole output in memory before writing it, so the
//! target either receives every staged change or is left untouched.
//!
//! Only one commit may be in flight per handler; a second one fails with
//! `BadInput` instead of queueing.

use crate::action::{Action, ActionType, ContentMarkAction, WatermarkAction};
use crate::async_op::OperationScope;
use crate::container::{output_file_name, Container, ContentMarking, MarkingKind, ProtectionRecord};
use crate::engine::FileEngine;
use crate::error::from_audit;
use crate::execution_state::{ContentFormat, ContentState, StaticExecutionState};
use crate::label::{ContentLabel, LabelingOptions};
use crate::observer::FileHandlerObserver;
use crate::policy::{label_metadata_key, metadata_suffix, PolicyHandler};
use crate::protection::{rights, ProtectionDescriptor, ProtectionDescriptorBuilder, ProtectionHandler, ProtectionType, UserRights};
use crate::storage::write_atomic;
use audit_engine::{AuditEntry, AuditEventType};
use chrono::Utc;
use error_common::{SdkError, SdkResult};
use parking_lot::Mutex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Actions this handler knows how to apply
pub const FILE_HANDLER_SUPPORTED_ACTIONS: ActionType = ActionType::all()
    .without(ActionType::PROTECT_DO_NOT_FORWARD)
    .without(ActionType::RECOMMEND_LABEL);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    Path(PathBuf),
    Bytes { data: Vec<u8>, name: String },
}

impl ContentSource {
    fn read(&self) -> SdkResult<Vec<u8>> {
        match self {
            ContentSource::Path(path) => std::fs::read(path)
                .map_err(|e| SdkError::from(e).with_context("path", path.display().to_string())),
            ContentSource::Bytes { data, .. } => Ok(data.clone()),
        }
    }

    fn file_name(&self) -> String {
        match self {
            ContentSource::Path(path) => path
                .file_name()
                .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned()),
            ContentSource::Bytes { name, .. } => name.clone(),
        }
    }

    fn identifier(&self) -> String {
        match self {
            ContentSource::Path(path) => path.display().to_string(),
            ContentSource::Bytes { name, .. } => name.clone(),
        }
    }
}

/// Where a commit writes its output
#[derive(Debug, Clone)]
pub enum CommitTarget {
    Path(PathBuf),
    Buffer(Arc<Mutex<Vec<u8>>>),
}

impl CommitTarget {
    /// Buffer target plus the handle to read it back.
    pub fn buffer() -> (Self, Arc<Mutex<Vec<u8>>>) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        (CommitTarget::Buffer(Arc::clone(&buffer)), buffer)
    }

    fn write(&self, bytes: &[u8]) -> SdkResult<()> {
        match self {
            CommitTarget::Path(path) => write_atomic(path, bytes),
            CommitTarget::Buffer(buffer) => {
                let mut buffer = buffer.lock();
                buffer.clear();
                buffer.extend_from_slice(bytes);
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileHandlerSettings {
    source: ContentSource,
    content_identifier: Option<String>,
    content_state: ContentState,
    content_format: ContentFormat,
    audit_discovery: bool,
}

impl FileHandlerSettings {
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self::new(ContentSource::Path(path.into()))
    }

    pub fn for_bytes(data: Vec<u8>, name: impl Into<String>) -> Self {
        Self::new(ContentSource::Bytes {
            data,
            name: name.into(),
        })
    }

    fn new(source: ContentSource) -> Self {
        Self {
            source,
            content_identifier: None,
            content_state: ContentState::Rest,
            content_format: ContentFormat::Default,
            audit_discovery: false,
        }
    }

    /// Name used in audit records and marking text; defaults to the path or stream name.
    pub fn with_content_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.content_identifier = Some(identifier.into());
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

    /// Record a discovery audit event when the handler is created.
    pub fn with_audit_discovery(mut self, enabled: bool) -> Self {
        self.audit_discovery = enabled;
        self
    }

    pub fn source(&self) -> &ContentSource {
        &self.source
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Modified,
    Committing,
    Committed,
}

#[derive(Debug, Clone, PartialEq)]
enum StagedLabel {
    Unchanged,
    Set { label_id: String, options: LabelingOptions },
    Delete { options: LabelingOptions },
}

#[derive(Debug, Clone, PartialEq)]
enum StagedProtection {
    Unchanged,
    Set(ProtectionDescriptor),
    Remove,
}

#[derive(Debug)]
struct CommittedChange {
    state: StaticExecutionState,
    notified: bool,
}

#[derive(Debug)]
struct HandlerState {
    phase: Phase,
    label: StagedLabel,
    protection: StagedProtection,
    committed: Option<CommittedChange>,
}

enum ProtectionPlan {
    Keep,
    Remove,
    Apply(ProtectionDescriptor),
}

struct HandlerInner {
    engine: FileEngine,
    source_name: String,
    content_identifier: String,
    content_state: ContentState,
    content_format: ContentFormat,
    original: Container,
    label: Option<ContentLabel>,
    protection: Option<ProtectionHandler>,
    state: Mutex<HandlerState>,
}

/// Stateful view of one piece of content
pub struct FileHandler {
    inner: Arc<HandlerInner>,
}

impl FileHandler {
    pub(crate) fn create(engine: FileEngine, settings: FileHandlerSettings) -> SdkResult<Self> {
        let bytes = settings.source.read()?;
        let original = Container::parse(&bytes)?;
        let issued_to = engine.identity().effective_email().to_string();

        let protection = original.header.protection.as_ref().map(|record| {
            ProtectionHandler::new(record.descriptor.clone(), record.content_id.clone(), &issued_to)
        });

        let mut inner = HandlerInner {
            engine,
            source_name: settings.source.file_name(),
            content_identifier: settings
                .content_identifier
                .clone()
                .unwrap_or_else(|| settings.source.identifier()),
            content_state: settings.content_state,
            content_format: settings.content_format,
            original,
            label: None,
            protection,
            state: Mutex::new(HandlerState {
                phase: Phase::Created,
                label: StagedLabel::Unchanged,
                protection: StagedProtection::Unchanged,
                committed: None,
            }),
        };

        let inspection = inner.execution_state(None, &LabelingOptions::default());
        let policy_handler = inner.engine.rule_handler();
        inner.label = policy_handler.get_sensitivity_label(&inspection)?;
        if settings.audit_discovery {
            policy_handler.notify_discovery(&inspection)?;
        }

        debug!(
            content = %inner.content_identifier,
            label = inner.label.as_ref().map_or("none", |l| l.label.id()),
            protected = inner.protection.is_some(),
            "file handler created"
        );

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Label of the content as it was opened
    pub fn get_label(&self) -> Option<ContentLabel> {
        self.inner.label.clone()
    }

    /// Protection of the content as it was opened
    pub fn get_protection(&self) -> Option<ProtectionHandler> {
        self.inner.protection.clone()
    }

    pub fn content_identifier(&self) -> &str {
        &self.inner.content_identifier
    }

    /// Stages `label_id` for the next commit.
    ///
    /// # Errors
    /// `JustificationRequired` for an unjustified downgrade, `BadInput` for
    /// unknown or inactive labels, `PrivilegedRequired` when a privileged
    /// label would be replaced by a standard assignment.
    pub fn set_label(&self, label_id: &str, options: &LabelingOptions) -> SdkResult<()> {
        self.inner.scope("FileHandler::set_label").run(|| {
            self.inner
                .stage_label(Some(label_id), options)
                .map(|()| StagedLabel::Set {
                    label_id: label_id.to_string(),
                    options: options.clone(),
                })
                .and_then(|staged| self.inner.store_label(staged))
        })
    }

    /// Stages removal of the current label.
    pub fn delete_label(&self, options: &LabelingOptions) -> SdkResult<()> {
        self.inner.scope("FileHandler::delete_label").run(|| {
            self.inner.stage_label(None, options)?;
            self.inner.store_label(StagedLabel::Delete {
                options: options.clone(),
            })
        })
    }

    pub fn set_protection(&self, descriptor: ProtectionDescriptor) -> SdkResult<()> {
        self.inner.store_protection(StagedProtection::Set(descriptor))
    }

    pub fn remove_protection(&self) -> SdkResult<()> {
        self.inner.store_protection(StagedProtection::Remove)
    }

    /// Writes every staged change to `target` on the calling thread.
    ///
    /// Returns `false` without writing when nothing was staged.
    pub fn commit(&self, target: CommitTarget) -> SdkResult<bool> {
        let inner = &self.inner;
        inner
            .scope("FileHandler::commit")
            .run(|| inner.begin_commit().and_then(|staged| inner.finish_commit(staged, &target)))
    }

    pub fn commit_async<O, C>(&self, target: CommitTarget, observer: Arc<O>, context: C)
    where
        O: FileHandlerObserver<C> + ?Sized + 'static,
        C: Send + 'static,
    {
        // Checked before dispatch so a concurrent second commit is rejected.
        let begun = self.inner.begin_commit();
        let inner = Arc::clone(&self.inner);
        let scope = inner.scope("FileHandler::commit_async");

        self.inner.engine.shared().runtime.dispatcher().dispatch(
            &scope,
            context,
            move || inner.finish_commit(begun?, &target),
            move |result, context| match result {
                Ok(committed) => observer.on_commit_success(committed, context),
                Err(error) => observer.on_commit_failure(error, context),
            },
        );
    }

    /// Reports the committed change to the audit trail.
    ///
    /// # Errors
    /// `BadInput` unless called exactly once after a successful commit.
    pub fn notify_commit_successful(&self, content_identifier: &str) -> SdkResult<()> {
        self.inner.scope("FileHandler::notify_commit_successful").run(|| {
            let mut state = self.inner.state.lock();
            let Some(committed) = state.committed.as_mut() else {
                return Err(SdkError::bad_input("No successful commit to report"));
            };
            if committed.notified {
                return Err(SdkError::bad_input("Commit was already reported"));
            }

            let mut execution_state = committed.state.clone();
            execution_state.content_identifier = content_identifier.to_string();
            self.inner.engine.rule_handler().notify_committed_actions(&execution_state)?;
            committed.notified = true;
            Ok(())
        })
    }

    /// Committed but not yet reported through [`notify_commit_successful`](Self::notify_commit_successful)
    pub fn has_pending_notification(&self) -> bool {
        self.inner
            .state
            .lock()
            .committed
            .as_ref()
            .is_some_and(|c| !c.notified)
    }

    /// Output name matching the staged protection state.
    pub fn get_output_file_name(&self) -> String {
        let state = self.inner.state.lock();
        let originally_protected = self.inner.protection.is_some();
        let protection_from_label = self
            .inner
            .label
            .as_ref()
            .is_some_and(|l| l.protection_applied_from_label);

        let protected = match (&state.protection, &state.label) {
            (StagedProtection::Set(_), _) => true,
            (StagedProtection::Remove, _) => false,
            (StagedProtection::Unchanged, StagedLabel::Unchanged) => originally_protected,
            (StagedProtection::Unchanged, StagedLabel::Set { label_id, .. }) => {
                self.inner
                    .engine
                    .policy()
                    .label(label_id)
                    .is_some_and(|l| l.applies_protection())
                    || (originally_protected && !protection_from_label)
            }
            (StagedProtection::Unchanged, StagedLabel::Delete { .. }) => {
                originally_protected && !protection_from_label
            }
        };
        output_file_name(&self.inner.source_name, protected)
    }

    pub fn is_protected(path: &Path) -> SdkResult<bool> {
        Ok(Container::read_header_from_path(path)?.is_some_and(|h| h.protection.is_some()))
    }

    pub fn is_protected_bytes(mut bytes: &[u8]) -> bool {
        Container::read_header(&mut bytes)
            .ok()
            .flatten()
            .is_some_and(|h| h.protection.is_some())
    }
}

impl fmt::Debug for FileHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandler")
            .field("content_identifier", &self.inner.content_identifier)
            .field("phase", &self.inner.state.lock().phase)
            .finish()
    }
}

impl HandlerInner {
    fn scope(&self, name: &'static str) -> OperationScope {
        self.engine.shared().scope(name)
    }

    fn execution_state(&self, new_label_id: Option<String>, options: &LabelingOptions) -> StaticExecutionState {
        let mut state = StaticExecutionState::new(self.content_identifier.clone())
            .with_metadata_map(self.original.header.metadata.clone())
            .with_protection(self.original.header.protection.as_ref().map(|r| r.descriptor.clone()))
            .with_content_state(self.content_state)
            .with_content_format(self.content_format)
            .with_supported_actions(FILE_HANDLER_SUPPORTED_ACTIONS)
            .with_assignment_method(options.assignment_method)
            .with_action_source(options.action_source)
            .with_justification(options.downgrade_justified, options.justification_message.clone())
            .with_audit_metadata("session_id", self.engine.shared().session_id.clone());
        state.new_label_id = new_label_id;
        state.extended_properties = options.extended_properties.clone();
        state
    }

    fn ensure_open(state: &HandlerState) -> SdkResult<()> {
        match state.phase {
            Phase::Committing => Err(SdkError::bad_input("Cannot stage changes while a commit is in progress")),
            Phase::Committed => Err(SdkError::bad_input("Handler has already been committed")),
            Phase::Created | Phase::Modified => Ok(()),
        }
    }

    /// Validates a label change without staging it.
    fn stage_label(&self, label_id: Option<&str>, options: &LabelingOptions) -> SdkResult<()> {
        Self::ensure_open(&self.state.lock())?;
        let state = self.execution_state(label_id.map(str::to_string), options);
        let actions = self.engine.rule_handler().compute_actions(&state)?;
        if actions.iter().any(Action::is_justify) {
            return Err(SdkError::justification_required()
                .with_context("label_id", label_id.unwrap_or("none")));
        }
        Ok(())
    }

    fn store_label(&self, staged: StagedLabel) -> SdkResult<()> {
        let mut state = self.state.lock();
        Self::ensure_open(&state)?;
        state.label = staged;
        state.phase = Phase::Modified;
        Ok(())
    }

    fn store_protection(&self, staged: StagedProtection) -> SdkResult<()> {
        let mut state = self.state.lock();
        Self::ensure_open(&state)?;
        state.protection = staged;
        state.phase = Phase::Modified;
        Ok(())
    }

    /// `None` when nothing is staged.
    fn begin_commit(&self) -> SdkResult<Option<(StagedLabel, StagedProtection)>> {
        let mut state = self.state.lock();
        match state.phase {
            Phase::Committing => Err(SdkError::bad_input("A commit is already in progress for this handler")),
            Phase::Committed => Err(SdkError::bad_input("Handler has already been committed")),
            Phase::Created => Ok(None),
            Phase::Modified => {
                state.phase = Phase::Committing;
                Ok(Some((state.label.clone(), state.protection.clone())))
            }
        }
    }

    fn finish_commit(&self, staged: Option<(StagedLabel, StagedProtection)>, target: &CommitTarget) -> SdkResult<bool> {
        let Some((label, protection)) = staged else {
            debug!(content = %self.content_identifier, "nothing staged, commit skipped");
            return Ok(false);
        };

        let outcome = self.materialize(&label, &protection).and_then(|(container, state)| {
            target.write(&container.to_bytes()?)?;
            Ok(state)
        });

        let mut handler_state = self.state.lock();
        match outcome {
            Ok(execution_state) => {
                handler_state.phase = Phase::Committed;
                handler_state.committed = Some(CommittedChange {
                    state: execution_state,
                    notified: false,
                });
                info!(content = %self.content_identifier, "commit succeeded");
                Ok(true)
            }
            Err(error) => {
                handler_state.phase = Phase::Modified;
                Err(error)
            }
        }
    }

    fn materialize(
        &self,
        label: &StagedLabel,
        protection: &StagedProtection,
    ) -> SdkResult<(Container, StaticExecutionState)> {
        let policy_handler = self.engine.rule_handler();
        let current_label_id = self.label.as_ref().map(|l| l.label.id().to_string());

        let (state, actions) = match label {
            StagedLabel::Unchanged => (self.execution_state(current_label_id, &LabelingOptions::default()), Vec::new()),
            StagedLabel::Set { label_id, options } => {
                let state = self.execution_state(Some(label_id.clone()), options);
                let actions = policy_handler.compute_actions(&state)?;
                (state, actions)
            }
            StagedLabel::Delete { options } => {
                let state = self.execution_state(None, options);
                let actions = policy_handler.compute_actions(&state)?;
                (state, actions)
            }
        };

        let mut header = self.original.header.clone();
        let mut plan = ProtectionPlan::Keep;

        for action in &actions {
            match action {
                Action::Justify(_) => return Err(SdkError::justification_required()),
                Action::RemoveContentHeader(a) | Action::RemoveContentFooter(a) => {
                    header.markings.retain(|m| !a.ui_element_names.contains(&m.ui_element_name));
                }
                Action::RemoveWatermark(a) => {
                    header.markings.retain(|m| !a.ui_element_names.contains(&m.ui_element_name));
                }
                Action::RemoveProtection(_) => plan = ProtectionPlan::Remove,
                Action::Metadata(a) => {
                    for key in &a.metadata_to_remove {
                        header.metadata.remove(key);
                    }
                    for (key, value) in &a.metadata_to_add {
                        header.metadata.insert(key.clone(), value.clone());
                    }
                }
                Action::ProtectByTemplate(a) => {
                    let descriptor = ProtectionDescriptorBuilder::from_template(a.template_id.clone())
                        .build()?
                        .with_label_id(state.new_label_id.clone());
                    plan = ProtectionPlan::Apply(self.resolve_template(descriptor)?);
                }
                Action::ProtectAdhoc(_) => {
                    let descriptor = match protection {
                        StagedProtection::Set(descriptor) => descriptor.clone(),
                        _ => self.owner_only_descriptor()?,
                    };
                    plan = ProtectionPlan::Apply(descriptor.with_label_id(state.new_label_id.clone()));
                }
                Action::ProtectDoNotForward(_) => {
                    return Err(SdkError::not_supported("Do Not Forward protection applies to e-mail only"));
                }
                Action::AddContentHeader(a) => add_mark(&mut header.markings, MarkingKind::Header, a),
                Action::AddContentFooter(a) => add_mark(&mut header.markings, MarkingKind::Footer, a),
                Action::AddWatermark(a) => add_watermark(&mut header.markings, a),
                Action::Custom(a) => debug!(action = %a.id, name = %a.name, "custom action left to the host"),
                Action::ApplyLabel(a) => {
                    header.metadata.insert(
                        label_metadata_key(&a.label_id, metadata_suffix::SET_DATE),
                        Utc::now().to_rfc3339(),
                    );
                    header.metadata.insert(
                        label_metadata_key(&a.label_id, metadata_suffix::ACTION_ID),
                        Uuid::new_v4().to_string(),
                    );
                }
                Action::RecommendLabel(_) => {}
            }
        }

        match protection {
            StagedProtection::Set(descriptor) => {
                plan = ProtectionPlan::Apply(self.resolve_template(descriptor.clone())?);
            }
            StagedProtection::Remove => plan = ProtectionPlan::Remove,
            StagedProtection::Unchanged => {}
        }

        self.check_rights(&plan, &header)?;

        let (body, record) = match plan {
            ProtectionPlan::Keep => (self.original.body.clone(), self.original.header.protection.clone()),
            ProtectionPlan::Remove => (self.plaintext()?, None),
            ProtectionPlan::Apply(descriptor) => {
                let plaintext = self.plaintext()?;
                let descriptor = descriptor.with_owner(self.engine.identity().effective_email());
                let (ciphertext, wrapped_key) = self.engine.shared().keystore.seal(&plaintext)?;
                let record = ProtectionRecord {
                    descriptor,
                    wrapped_key,
                    content_id: Uuid::new_v4().to_string(),
                    protected_at: Utc::now(),
                };
                (ciphertext, Some(record))
            }
        };

        header.protection = record;
        header.original_file_name = Some(self.source_name.clone());
        Ok((Container { header, body }, state))
    }

    fn check_rights(&self, plan: &ProtectionPlan, header: &crate::container::ContainerHeader) -> SdkResult<()> {
        let Some(access) = &self.protection else {
            return Ok(());
        };

        let denied = match plan {
            ProtectionPlan::Keep => {
                let modified = header.metadata != self.original.header.metadata
                    || header.markings != self.original.header.markings;
                (modified && !access.access_check(rights::EDIT)).then_some("Modifying protected content requires EDIT")
            }
            ProtectionPlan::Remove => (!access.access_check(rights::EXPORT))
                .then_some("Removing protection requires OWNER or EXPORT"),
            ProtectionPlan::Apply(_) => {
                (!access.access_check(rights::OWNER)).then_some("Replacing protection requires OWNER")
            }
        };

        match denied {
            Some(message) => Err(SdkError::access_denied(message)
                .with_context("issued_to", access.issued_to())
                .with_context("content_id", access.content_id())),
            None => Ok(()),
        }
    }

    /// Template descriptors without grants take them from the policy.
    fn resolve_template(&self, mut descriptor: ProtectionDescriptor) -> SdkResult<ProtectionDescriptor> {
        if descriptor.protection_type != ProtectionType::TemplateBased || !descriptor.user_rights.is_empty() {
            return Ok(descriptor);
        }
        let template_id = descriptor.template_id.clone().unwrap_or_default();
        let policy = self.engine.policy();
        let template = policy
            .template(&template_id)
            .ok_or_else(|| SdkError::bad_input(format!("Unknown protection template '{template_id}'")))?;

        descriptor.user_rights = template.user_rights.clone();
        if descriptor.name.is_empty() {
            descriptor.name = template.name.clone();
        }
        if descriptor.description.is_empty() {
            descriptor.description = template.description.clone();
        }
        Ok(descriptor)
    }

    fn owner_only_descriptor(&self) -> SdkResult<ProtectionDescriptor> {
        ProtectionDescriptorBuilder::from_user_rights(vec![UserRights::new(
            vec![self.engine.identity().effective_email().to_string()],
            vec![rights::OWNER.to_string()],
        )])
        .build()
    }

    fn plaintext(&self) -> SdkResult<Vec<u8>> {
        let Some(record) = &self.original.header.protection else {
            return Ok(self.original.body.clone());
        };

        let plaintext = self.engine.shared().keystore.open(&self.original.body, &record.wrapped_key)?;
        let entry = AuditEntry::new(
            AuditEventType::Access,
            self.engine.identity().effective_email(),
            self.content_identifier.clone(),
            "decrypted",
        )
        .with_field("content_id", record.content_id.as_str())
        .with_field("engine_id", self.engine.id());
        self.engine.shared().audit.record(&entry).map_err(from_audit)?;
        Ok(plaintext)
    }
}

fn add_mark(markings: &mut Vec<ContentMarking>, kind: MarkingKind, action: &ContentMarkAction) {
    markings.retain(|m| m.ui_element_name != action.ui_element_name);
    markings.push(ContentMarking {
        kind,
        ui_element_name: action.ui_element_name.clone(),
        text: action.text.clone(),
    });
}

fn add_watermark(markings: &mut Vec<ContentMarking>, action: &WatermarkAction) {
    markings.retain(|m| m.ui_element_name != action.ui_element_name);
    markings.push(ContentMarking {
        kind: MarkingKind::Watermark,
        ui_element_name: action.ui_element_name.clone(),
        text: action.text.clone(),
    });
}

impl Drop for HandlerInner {
    fn drop(&mut self) {
        let pending = self.state.get_mut().committed.as_ref().is_some_and(|c| !c.notified);
        if pending {
            warn!(
                content = %self.content_identifier,
                "handler dropped after a commit that was never reported with notify_commit_successful"
            );
        }
    }
}

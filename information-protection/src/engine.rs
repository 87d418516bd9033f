//! Engine: one identity's view of policy, labels and templates

use crate::async_op::OperationScope;
use crate::delegates::Identity;
use crate::handler::{FileHandler, FileHandlerSettings};
use crate::label::Label;
use crate::observer::FileHandlerObserver;
use crate::policy::{PolicyHandler, RulePolicyHandler};
use crate::policy_data::{Policy, TemplateDefinition};
use crate::policy_sync;
use crate::profile::ProfileShared;
use crate::storage::{write_atomic, EngineRecord};
use error_common::{SdkError, SdkResult};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Custom setting holding an inline policy document (JSON or YAML)
pub const CUSTOM_SETTING_POLICY_DATA: &str = "policy_data";
/// Custom setting naming a policy document on disk
pub const CUSTOM_SETTING_POLICY_FILE: &str = "policy_file";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    engine_id: Option<String>,
    identity: Identity,
    client_data: String,
    locale: String,
    custom_settings: Vec<(String, String)>,
    protection_only: bool,
    policy_endpoint: Option<String>,
}

impl EngineSettings {
    /// Settings for a new engine acting as `identity`.
    pub fn new(identity: Identity) -> Self {
        Self {
            engine_id: None,
            identity,
            client_data: String::new(),
            locale: "en-US".to_string(),
            custom_settings: Vec::new(),
            protection_only: false,
            policy_endpoint: None,
        }
    }

    /// Settings that reload a stored engine; the identity comes from storage.
    pub fn for_engine_id(engine_id: impl Into<String>) -> Self {
        Self::new(Identity::default()).with_engine_id(engine_id)
    }

    pub fn with_engine_id(mut self, engine_id: impl Into<String>) -> Self {
        self.engine_id = Some(engine_id.into());
        self
    }

    /// Opaque host data stored with the engine record.
    pub fn with_client_data(mut self, client_data: impl Into<String>) -> Self {
        self.client_data = client_data.into();
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    /// Adds a name/value setting; a repeated name replaces the earlier value.
    pub fn with_custom_setting(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.custom_settings.retain(|(n, _)| *n != name);
        self.custom_settings.push((name, value.into()));
        self
    }

    /// Engine without a labeling policy; only protection operations are useful.
    pub fn with_protection_only(mut self, protection_only: bool) -> Self {
        self.protection_only = protection_only;
        self
    }

    /// Service base URL the policy is fetched from.
    pub fn with_policy_endpoint(mut self, url: impl Into<String>) -> Self {
        self.policy_endpoint = Some(url.into());
        self
    }

    pub fn engine_id(&self) -> Option<&str> {
        self.engine_id.as_deref()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn client_data(&self) -> &str {
        &self.client_data
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn custom_settings(&self) -> &[(String, String)] {
        &self.custom_settings
    }

    pub fn custom_setting(&self, name: &str) -> Option<&str> {
        self.custom_settings
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_protection_only(&self) -> bool {
        self.protection_only
    }

    pub fn policy_endpoint(&self) -> Option<&str> {
        self.policy_endpoint.as_deref()
    }

    /// Fills in what the caller left empty from a stored record.
    pub(crate) fn restore_from(mut self, record: &EngineRecord) -> Self {
        if self.identity.email.trim().is_empty() {
            self.identity = record.identity.clone();
        }
        if self.client_data.is_empty() {
            self.client_data = record.client_data.clone();
        }
        self
    }
}

/// Engine ids name files under the profile directory.
pub(crate) fn validate_engine_id(engine_id: &str) -> SdkResult<()> {
    let invalid = engine_id.trim().is_empty()
        || engine_id == "."
        || engine_id == ".."
        || engine_id.contains(['/', '\\', '\0']);
    if invalid {
        return Err(SdkError::bad_input(format!("Invalid engine id '{engine_id}'")));
    }
    Ok(())
}

struct EngineInner {
    id: String,
    settings: EngineSettings,
    shared: Arc<ProfileShared>,
    policy: Arc<Policy>,
    policy_handler: Arc<RulePolicyHandler>,
}

/// Loaded engine
///
/// Clones share the same policy and profile resources.
#[derive(Clone)]
pub struct FileEngine {
    inner: Arc<EngineInner>,
}

impl FileEngine {
    pub(crate) fn load(id: String, settings: EngineSettings, shared: Arc<ProfileShared>) -> SdkResult<Self> {
        let document = policy_sync::resolve_policy(&id, &settings, &shared)?;
        let policy = Arc::new(Policy::compile(document)?);
        let policy_handler = Arc::new(RulePolicyHandler::new(
            Arc::clone(&policy),
            settings.identity.clone(),
            id.clone(),
            shared.application.clone(),
            Arc::clone(&shared.audit),
        ));

        info!(
            engine_id = %id,
            labels = policy.labels().len(),
            protection_only = settings.protection_only,
            "engine loaded"
        );

        Ok(Self {
            inner: Arc::new(EngineInner {
                id,
                settings,
                shared,
                policy,
                policy_handler,
            }),
        })
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.inner.settings
    }

    pub fn identity(&self) -> &Identity {
        &self.inner.settings.identity
    }

    /// Top-level labels; children hang off each label.
    pub fn list_sensitivity_labels(&self) -> Vec<Label> {
        self.inner.policy.labels().roots()
    }

    /// # Errors
    /// `BadInput` when the policy has no label with `label_id`.
    pub fn get_label_by_id(&self, label_id: &str) -> SdkResult<Label> {
        self.inner
            .policy
            .label(label_id)
            .ok_or_else(|| SdkError::bad_input(format!("Label '{label_id}' is not defined by the policy")))
    }

    pub fn default_sensitivity_label(&self) -> Option<Label> {
        self.inner.policy.default_label()
    }

    pub fn list_protection_templates(&self) -> Vec<TemplateDefinition> {
        self.inner.policy.templates().cloned().collect()
    }

    pub fn more_info_url(&self) -> Option<&str> {
        self.inner.policy.more_info_url()
    }

    pub fn is_labeling_required(&self) -> bool {
        self.inner.policy.is_labeling_required()
    }

    pub fn policy_handler(&self) -> Arc<dyn PolicyHandler> {
        Arc::clone(&self.inner.policy_handler) as Arc<dyn PolicyHandler>
    }

    /// Writes the engine's policy document to `path` as JSON.
    pub fn export_policy_file(&self, path: &Path) -> SdkResult<()> {
        let json = self.inner.policy.document().to_json_pretty()?;
        write_atomic(path, json.as_bytes())
    }

    pub fn create_file_handler(&self, settings: FileHandlerSettings) -> SdkResult<FileHandler> {
        self.scope("FileEngine::create_file_handler")
            .run(|| FileHandler::create(self.clone(), settings))
    }

    pub fn create_file_handler_async<O, C>(&self, settings: FileHandlerSettings, observer: Arc<O>, context: C)
    where
        O: FileHandlerObserver<C> + ?Sized + 'static,
        C: Send + 'static,
    {
        let engine = self.clone();
        let scope = self.scope("FileEngine::create_file_handler_async");
        self.inner.shared.runtime.dispatcher().dispatch(
            &scope,
            context,
            move || FileHandler::create(engine, settings),
            move |result, context| match result {
                Ok(handler) => observer.on_create_file_handler_success(handler, context),
                Err(error) => observer.on_create_file_handler_failure(error, context),
            },
        );
    }

    fn scope(&self, name: &'static str) -> OperationScope {
        self.inner.shared.scope(name)
    }

    pub(crate) fn shared(&self) -> &Arc<ProfileShared> {
        &self.inner.shared
    }

    pub(crate) fn policy(&self) -> &Arc<Policy> {
        &self.inner.policy
    }

    pub(crate) fn rule_handler(&self) -> Arc<RulePolicyHandler> {
        Arc::clone(&self.inner.policy_handler)
    }
}

impl fmt::Debug for FileEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileEngine")
            .field("id", &self.inner.id)
            .field("identity", &self.inner.settings.identity)
            .field("labels", &self.inner.policy.labels().len())
            .finish()
    }
}

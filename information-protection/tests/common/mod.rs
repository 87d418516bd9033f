#![allow(dead_code)]

use audit_engine::{AuditSink, InMemoryAuditSink};
use information_protection::engine::CUSTOM_SETTING_POLICY_DATA;
use information_protection::policy_data::{LabelProtection, TemplateDefinition};
use information_protection::protection::{rights, UserRights};
use information_protection::{
    ApplicationInfo, EngineSettings, FileEngine, FileProfile, Identity, LabelDefinition, PolicyDocument,
    ProfileSettings, RuntimeConfig, SdkRuntime,
};
use std::path::Path;
use std::sync::Arc;

pub const OWNER_EMAIL: &str = "alice@contoso.com";
pub const TEMPLATE_ID: &str = "tpl-confidential";

pub fn application() -> ApplicationInfo {
    ApplicationInfo::new("7c6b1f9e-sample", "Labeling Tests", "1.0.0")
}

/// `A` (1) with child `B` (5), plus a few labels carrying markings and protection.
pub fn policy_document() -> PolicyDocument {
    let mut document = PolicyDocument::default();
    document.more_info_url = Some("https://contoso.com/labels".to_string());
    document.labels = vec![
        LabelDefinition::new("A", "A", 1).with_child(LabelDefinition::new("B", "B", 5)),
        LabelDefinition::new("public", "Public", 0),
        LabelDefinition::new("general", "General", 2).with_footer("General"),
        LabelDefinition::new("confidential", "Confidential", 8)
            .with_header("Confidential: ${Item.Label}")
            .with_watermark("${Item.Name}")
            .with_protection(LabelProtection::Template {
                template_id: TEMPLATE_ID.to_string(),
            }),
    ];
    document.templates = vec![TemplateDefinition {
        id: TEMPLATE_ID.to_string(),
        name: "Confidential - All Employees".to_string(),
        description: String::new(),
        user_rights: vec![UserRights::new(
            vec!["contoso.com".to_string()],
            vec![rights::VIEW.to_string(), rights::EDIT.to_string()],
        )],
    }];
    document
}

pub fn policy_json() -> String {
    policy_document().to_json_pretty().unwrap()
}

pub struct Fixture {
    pub runtime: Arc<SdkRuntime>,
    pub audit: Arc<InMemoryAuditSink>,
    pub profile: FileProfile,
    pub engine: FileEngine,
}

pub fn runtime() -> Arc<SdkRuntime> {
    SdkRuntime::new(RuntimeConfig {
        thread_name: "ip-sdk-test".to_string(),
        ..RuntimeConfig::default()
    })
    .unwrap()
}

pub fn profile_settings(storage: Option<&Path>, runtime: &Arc<SdkRuntime>, audit: &Arc<InMemoryAuditSink>) -> ProfileSettings {
    let settings = match storage {
        Some(path) => ProfileSettings::new(path, application()),
        None => ProfileSettings::in_memory(application()),
    };
    settings
        .with_runtime(Arc::clone(runtime))
        .with_audit_sink(Arc::clone(audit) as Arc<dyn AuditSink>)
}

pub fn engine_settings(email: &str) -> EngineSettings {
    EngineSettings::new(Identity::new(email)).with_custom_setting(CUSTOM_SETTING_POLICY_DATA, policy_json())
}

pub fn fixture_for(storage: Option<&Path>, email: &str) -> Fixture {
    let runtime = runtime();
    let audit = Arc::new(InMemoryAuditSink::new());
    let profile = FileProfile::load(profile_settings(storage, &runtime, &audit)).unwrap();
    let engine = profile.add_engine(engine_settings(email)).unwrap();
    Fixture {
        runtime,
        audit,
        profile,
        engine,
    }
}

pub fn fixture() -> Fixture {
    fixture_for(None, OWNER_EMAIL)
}

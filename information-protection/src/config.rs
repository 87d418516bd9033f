//! SDK configuration from the environment or a YAML file

use crate::delegates::{ApplicationInfo, LogLevel};
use crate::error::from_audit;
use crate::profile::ProfileSettings;
use crate::runtime::{RuntimeConfig, SdkRuntime};
use audit_engine::JsonLinesAuditSink;
use error_common::{SdkError, SdkResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

pub const ENV_STORAGE_PATH: &str = "IP_SDK_STORAGE_PATH";
pub const ENV_IN_MEMORY: &str = "IP_SDK_IN_MEMORY";
pub const ENV_LOG_LEVEL: &str = "IP_SDK_LOG_LEVEL";
pub const ENV_DISPATCH_THREADS: &str = "IP_SDK_DISPATCH_THREADS";
pub const ENV_LOCALE: &str = "IP_SDK_LOCALE";
pub const ENV_REDACT_LOGS: &str = "IP_SDK_REDACT_LOGS";
pub const ENV_AUDIT_LOG: &str = "IP_SDK_AUDIT_LOG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    /// Profile directory; ignored when `in_memory` is set
    pub storage_path: Option<PathBuf>,
    pub in_memory: bool,
    pub log_level: LogLevel,
    /// Maximum number of operations running at once
    pub dispatch_threads: usize,
    pub locale: String,
    pub redact_logs: bool,
    /// JSON-lines audit file; audit events go to `tracing` when unset
    pub audit_log: Option<PathBuf>,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            storage_path: None,
            in_memory: false,
            log_level: LogLevel::Info,
            dispatch_threads: RuntimeConfig::default().max_blocking_threads,
            locale: "en-US".to_string(),
            redact_logs: true,
            audit_log: None,
        }
    }
}

impl SdkConfig {
    /// Defaults overridden by any `IP_SDK_*` variables that are set.
    pub fn from_env() -> SdkResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> SdkResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self::default().with_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies the `IP_SDK_*` values `lookup` returns on top of `self`, without validating.
    pub fn with_overrides<F>(mut self, lookup: F) -> SdkResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_STORAGE_PATH).filter(|p| !p.is_empty()) {
            self.storage_path = Some(PathBuf::from(path));
        }
        if let Some(value) = lookup(ENV_IN_MEMORY) {
            self.in_memory = parse_flag(ENV_IN_MEMORY, &value)?;
        }
        if let Some(value) = lookup(ENV_LOG_LEVEL) {
            self.log_level = LogLevel::from_str(&value)
                .map_err(|e| SdkError::bad_input(format!("{ENV_LOG_LEVEL}: {e}")))?;
        }
        if let Some(value) = lookup(ENV_DISPATCH_THREADS) {
            self.dispatch_threads = value.trim().parse().map_err(|e| {
                SdkError::bad_input(format!("{ENV_DISPATCH_THREADS} must be a positive integer: {e}"))
            })?;
        }
        if let Some(locale) = lookup(ENV_LOCALE) {
            self.locale = locale;
        }
        if let Some(value) = lookup(ENV_REDACT_LOGS) {
            self.redact_logs = parse_flag(ENV_REDACT_LOGS, &value)?;
        }
        if let Some(path) = lookup(ENV_AUDIT_LOG).filter(|p| !p.is_empty()) {
            self.audit_log = Some(PathBuf::from(path));
        }
        Ok(self)
    }

    pub fn from_file(path: &Path) -> SdkResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SdkError::from(e).with_context("path", path.display().to_string()))?;
        let config: Self = serde_yaml::from_str(&text)
            .map_err(|e| SdkError::bad_input(format!("Invalid SDK configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SdkResult<()> {
        if !self.in_memory && self.storage_path.is_none() {
            return Err(SdkError::bad_input(format!(
                "Either {ENV_STORAGE_PATH} must be set or {ENV_IN_MEMORY} enabled"
            )));
        }
        if self.dispatch_threads == 0 {
            return Err(SdkError::bad_input("dispatch_threads must be at least 1"));
        }
        if self.locale.trim().is_empty() {
            return Err(SdkError::bad_input("locale must not be empty"));
        }
        Ok(())
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            max_blocking_threads: self.dispatch_threads,
            ..RuntimeConfig::default()
        }
    }

    /// Profile settings for `application`; delegates are added by the caller.
    ///
    /// The profile runs on its own runtime sized by `dispatch_threads`.
    pub fn profile_settings(&self, application: ApplicationInfo) -> SdkResult<ProfileSettings> {
        let settings = match (&self.storage_path, self.in_memory) {
            (Some(path), false) => ProfileSettings::new(path.clone(), application),
            _ => ProfileSettings::in_memory(application),
        };
        let settings = settings
            .with_min_log_level(self.log_level)
            .with_log_redaction(self.redact_logs)
            .with_runtime(SdkRuntime::new(self.runtime_config())?);

        match &self.audit_log {
            Some(path) => {
                let sink = JsonLinesAuditSink::new(path).map_err(from_audit)?;
                Ok(settings.with_audit_sink(Arc::new(sink)))
            }
            None => Ok(settings),
        }
    }
}

fn parse_flag(name: &str, value: &str) -> SdkResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(SdkError::bad_input(format!("{name} must be a boolean, got '{other}'"))),
    }
}

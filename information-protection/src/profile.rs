//! Profile: root object that owns delegates, storage and loaded engines

use crate::async_op::{deliver_detached, OperationScope};
use crate::delegates::{ApplicationInfo, AuthDelegate, ConsentDelegate, HttpDelegate, LogLevel, LoggerDelegate};
use crate::engine::{validate_engine_id, EngineSettings, FileEngine};
use crate::error::from_logger;
use crate::keystore::KeyStore;
use crate::observer::ProfileObserver;
use crate::runtime::SdkRuntime;
use crate::storage::{EngineCache, EngineRecord};
use audit_engine::{AuditSink, TracingAuditSink};
use chrono::Utc;
use dashmap::{DashMap, DashSet};
use error_common::{SdkError, SdkResult};
use logger_redacted::{DelegateLayer, RedactionConfig, TokenRedactor};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Settings for [`FileProfile::load`]
#[derive(Clone)]
pub struct ProfileSettings {
    storage_path: Option<PathBuf>,
    application: ApplicationInfo,
    auth: Option<Arc<dyn AuthDelegate>>,
    consent: Option<Arc<dyn ConsentDelegate>>,
    http: Option<Arc<dyn HttpDelegate>>,
    logger: Option<Arc<dyn LoggerDelegate>>,
    min_log_level: LogLevel,
    session_id: Option<String>,
    audit: Option<Arc<dyn AuditSink>>,
    runtime: Option<Arc<SdkRuntime>>,
    redact_logs: bool,
}

impl ProfileSettings {
    /// Profile whose engines, keys and caches live under `path`.
    pub fn new(path: impl Into<PathBuf>, application: ApplicationInfo) -> Self {
        Self::with_storage(Some(path.into()), application)
    }

    /// Profile that keeps nothing on disk.
    pub fn in_memory(application: ApplicationInfo) -> Self {
        Self::with_storage(None, application)
    }

    fn with_storage(storage_path: Option<PathBuf>, application: ApplicationInfo) -> Self {
        Self {
            storage_path,
            application,
            auth: None,
            consent: None,
            http: None,
            logger: None,
            min_log_level: LogLevel::Info,
            session_id: None,
            audit: None,
            runtime: None,
            redact_logs: true,
        }
    }

    pub fn with_auth_delegate(mut self, delegate: Arc<dyn AuthDelegate>) -> Self {
        self.auth = Some(delegate);
        self
    }

    pub fn with_consent_delegate(mut self, delegate: Arc<dyn ConsentDelegate>) -> Self {
        self.consent = Some(delegate);
        self
    }

    pub fn with_http_delegate(mut self, delegate: Arc<dyn HttpDelegate>) -> Self {
        self.http = Some(delegate);
        self
    }

    /// Routes the profile's log events to `delegate`.
    pub fn with_logger_delegate(mut self, delegate: Arc<dyn LoggerDelegate>) -> Self {
        self.logger = Some(delegate);
        self
    }

    pub fn with_min_log_level(mut self, level: LogLevel) -> Self {
        self.min_log_level = level;
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Audit destination; defaults to `tracing` events under the `audit` target.
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Runs the profile's operations on `runtime` instead of the global one.
    pub fn with_runtime(mut self, runtime: Arc<SdkRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn with_log_redaction(mut self, enabled: bool) -> Self {
        self.redact_logs = enabled;
        self
    }

    pub fn storage_path(&self) -> Option<&Path> {
        self.storage_path.as_deref()
    }

    pub fn application(&self) -> &ApplicationInfo {
        &self.application
    }

    /// Runtime set with [`with_runtime`](Self::with_runtime); the global one is used otherwise.
    pub fn runtime(&self) -> Option<&Arc<SdkRuntime>> {
        self.runtime.as_ref()
    }

    fn resolve_runtime(&self) -> SdkResult<Arc<SdkRuntime>> {
        match &self.runtime {
            Some(runtime) => Ok(Arc::clone(runtime)),
            None => SdkRuntime::global(),
        }
    }
}

impl fmt::Debug for ProfileSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileSettings")
            .field("storage_path", &self.storage_path)
            .field("application", &self.application)
            .field("has_auth_delegate", &self.auth.is_some())
            .field("has_consent_delegate", &self.consent.is_some())
            .field("has_http_delegate", &self.http.is_some())
            .field("has_logger_delegate", &self.logger.is_some())
            .field("min_log_level", &self.min_log_level)
            .field("redact_logs", &self.redact_logs)
            .finish()
    }
}

/// State shared by a profile and every engine and handler it creates
pub(crate) struct ProfileShared {
    pub(crate) runtime: Arc<SdkRuntime>,
    pub(crate) log: Option<tracing::Dispatch>,
    pub(crate) keystore: KeyStore,
    pub(crate) audit: Arc<dyn AuditSink>,
    pub(crate) application: ApplicationInfo,
    pub(crate) auth: Option<Arc<dyn AuthDelegate>>,
    pub(crate) consent: Option<Arc<dyn ConsentDelegate>>,
    pub(crate) http: Option<Arc<dyn HttpDelegate>>,
    pub(crate) storage_path: Option<PathBuf>,
    pub(crate) session_id: String,
    /// URLs the user answered `AcceptAlways` for
    pub(crate) consented_urls: DashSet<String>,
    logger: Option<Arc<dyn LoggerDelegate>>,
}

impl ProfileShared {
    pub(crate) fn scope(&self, name: &'static str) -> OperationScope {
        OperationScope::new(name, self.log.clone())
    }
}

impl Drop for ProfileShared {
    fn drop(&mut self) {
        if let Some(logger) = &self.logger {
            logger.flush();
        }
    }
}

struct ProfileInner {
    shared: Arc<ProfileShared>,
    engines: DashMap<String, FileEngine>,
    cache: EngineCache,
}

/// Loaded profile
///
/// Cheap to clone; clones share engines and storage.
#[derive(Clone)]
pub struct FileProfile {
    inner: Arc<ProfileInner>,
}

impl FileProfile {
    /// Loads a profile on the calling thread.
    pub fn load(settings: ProfileSettings) -> SdkResult<Self> {
        let runtime = settings.resolve_runtime()?;
        Self::load_on(settings, runtime)
    }

    pub fn load_async<O, C>(settings: ProfileSettings, observer: Arc<O>, context: C)
    where
        O: ProfileObserver<C> + ?Sized + 'static,
        C: Send + 'static,
    {
        let deliver = move |result: SdkResult<FileProfile>, context: C| match result {
            Ok(profile) => observer.on_load_success(profile, context),
            Err(error) => observer.on_load_failure(error, context),
        };

        let runtime = match settings.resolve_runtime() {
            Ok(runtime) => runtime,
            Err(error) => return deliver_detached("FileProfile::load_async", error, context, deliver),
        };

        let scope = OperationScope::new("FileProfile::load_async", None);
        let worker_runtime = Arc::clone(&runtime);
        runtime
            .dispatcher()
            .dispatch(&scope, context, move || Self::load_on(settings, worker_runtime), deliver);
    }

    fn load_on(settings: ProfileSettings, runtime: Arc<SdkRuntime>) -> SdkResult<Self> {
        if settings.application.application_id.trim().is_empty() {
            return Err(SdkError::bad_input("ApplicationInfo.application_id must not be empty"));
        }

        let log = match &settings.logger {
            Some(logger) => {
                let log_dir = settings.storage_path.clone().unwrap_or_else(std::env::temp_dir);
                logger.init(&log_dir, settings.min_log_level).map_err(from_logger)?;
                let redactor = settings
                    .redact_logs
                    .then(|| TokenRedactor::new(RedactionConfig::default()));
                Some(DelegateLayer::new(Arc::clone(logger)).with_redactor(redactor).into_dispatch())
            }
            None => None,
        };

        OperationScope::new("FileProfile::load", log.clone()).run(move || {
            let (keystore, cache) = match &settings.storage_path {
                Some(path) => {
                    std::fs::create_dir_all(path)
                        .map_err(|e| SdkError::from(e).with_context("path", path.display().to_string()))?;
                    (KeyStore::load_or_create(path)?, EngineCache::open(path)?)
                }
                None => (KeyStore::in_memory()?, EngineCache::in_memory()),
            };

            let session_id = settings
                .session_id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            info!(
                application_id = %settings.application.application_id,
                session_id = %session_id,
                storage = ?settings.storage_path,
                master_key = ?keystore.location(),
                "profile loaded"
            );

            let shared = ProfileShared {
                runtime,
                log,
                keystore,
                audit: settings.audit.unwrap_or_else(|| Arc::new(TracingAuditSink)),
                application: settings.application,
                auth: settings.auth,
                consent: settings.consent,
                http: settings.http,
                storage_path: settings.storage_path,
                session_id,
                consented_urls: DashSet::new(),
                logger: settings.logger,
            };

            Ok(Self {
                inner: Arc::new(ProfileInner {
                    shared: Arc::new(shared),
                    engines: DashMap::new(),
                    cache,
                }),
            })
        })
    }

    pub fn session_id(&self) -> &str {
        &self.inner.shared.session_id
    }

    pub fn storage_path(&self) -> Option<&Path> {
        self.inner.shared.storage_path.as_deref()
    }

    /// Ids of the engines stored with this profile, loaded or not.
    pub fn list_engines(&self) -> SdkResult<Vec<String>> {
        self.scope("FileProfile::list_engines").run(|| Ok(self.engine_ids()))
    }

    pub fn list_engines_async<O, C>(&self, observer: Arc<O>, context: C)
    where
        O: ProfileObserver<C> + ?Sized + 'static,
        C: Send + 'static,
    {
        let profile = self.clone();
        self.dispatch(
            "FileProfile::list_engines_async",
            context,
            move || Ok(profile.engine_ids()),
            move |result, context| match result {
                Ok(ids) => observer.on_list_engines_success(ids, context),
                Err(error) => observer.on_list_engines_failure(error, context),
            },
        );
    }

    /// Loads or creates an engine.
    ///
    /// An engine id that is already loaded returns the loaded engine. An id
    /// known only from storage reuses the stored identity when `settings`
    /// carries none.
    pub fn add_engine(&self, settings: EngineSettings) -> SdkResult<FileEngine> {
        self.scope("FileProfile::add_engine").run(|| self.add_engine_inner(settings))
    }

    pub fn add_engine_async<O, C>(&self, settings: EngineSettings, observer: Arc<O>, context: C)
    where
        O: ProfileObserver<C> + ?Sized + 'static,
        C: Send + 'static,
    {
        let profile = self.clone();
        self.dispatch(
            "FileProfile::add_engine_async",
            context,
            move || profile.add_engine_inner(settings),
            move |result, context| match result {
                Ok(engine) => observer.on_add_engine_success(engine, context),
                Err(error) => observer.on_add_engine_failure(error, context),
            },
        );
    }

    /// Drops a loaded engine from memory; its stored record is kept.
    pub fn unload_engine(&self, engine_id: &str) -> SdkResult<()> {
        self.scope("FileProfile::unload_engine").run(|| self.unload_engine_inner(engine_id))
    }

    pub fn unload_engine_async<O, C>(&self, engine_id: &str, observer: Arc<O>, context: C)
    where
        O: ProfileObserver<C> + ?Sized + 'static,
        C: Send + 'static,
    {
        let profile = self.clone();
        let engine_id = engine_id.to_string();
        self.dispatch(
            "FileProfile::unload_engine_async",
            context,
            move || profile.unload_engine_inner(&engine_id),
            move |result, context| match result {
                Ok(()) => observer.on_unload_engine_success(context),
                Err(error) => observer.on_unload_engine_failure(error, context),
            },
        );
    }

    /// Unloads an engine and deletes its stored record and cached policy.
    pub fn delete_engine(&self, engine_id: &str) -> SdkResult<()> {
        self.scope("FileProfile::delete_engine").run(|| self.delete_engine_inner(engine_id))
    }

    pub fn delete_engine_async<O, C>(&self, engine_id: &str, observer: Arc<O>, context: C)
    where
        O: ProfileObserver<C> + ?Sized + 'static,
        C: Send + 'static,
    {
        let profile = self.clone();
        let engine_id = engine_id.to_string();
        self.dispatch(
            "FileProfile::delete_engine_async",
            context,
            move || profile.delete_engine_inner(&engine_id),
            move |result, context| match result {
                Ok(()) => observer.on_delete_engine_success(context),
                Err(error) => observer.on_delete_engine_failure(error, context),
            },
        );
    }

    /// Loaded engine with `engine_id`, if any.
    pub fn loaded_engine(&self, engine_id: &str) -> Option<FileEngine> {
        self.inner.engines.get(engine_id).map(|e| e.value().clone())
    }

    fn scope(&self, name: &'static str) -> OperationScope {
        self.inner.shared.scope(name)
    }

    fn dispatch<T, C, W, D>(&self, name: &'static str, context: C, work: W, deliver: D)
    where
        T: Send + 'static,
        C: Send + 'static,
        W: FnOnce() -> SdkResult<T> + Send + 'static,
        D: FnOnce(SdkResult<T>, C) + Send + 'static,
    {
        let scope = self.scope(name);
        self.inner.shared.runtime.dispatcher().dispatch(&scope, context, work, deliver);
    }

    fn engine_ids(&self) -> Vec<String> {
        let mut ids = self.inner.cache.ids();
        for engine in self.inner.engines.iter() {
            if !ids.contains(engine.key()) {
                ids.push(engine.key().clone());
            }
        }
        ids
    }

    fn add_engine_inner(&self, mut settings: EngineSettings) -> SdkResult<FileEngine> {
        if let Some(id) = settings.engine_id() {
            validate_engine_id(id)?;
            if let Some(loaded) = self.inner.engines.get(id) {
                debug!(engine_id = %id, "engine already loaded");
                return Ok(loaded.value().clone());
            }
            if let Some(record) = self.inner.cache.get(id) {
                settings = settings.restore_from(&record);
            }
        }
        if settings.identity().email.trim().is_empty() {
            return Err(SdkError::bad_input("Engine identity must carry an e-mail address"));
        }

        let engine_id = settings
            .engine_id()
            .map_or_else(|| Uuid::new_v4().to_string(), str::to_string);
        let settings = settings.with_engine_id(engine_id.clone());
        let engine = FileEngine::load(engine_id.clone(), settings, Arc::clone(&self.inner.shared))?;

        self.inner.cache.upsert(EngineRecord {
            id: engine_id.clone(),
            identity: engine.identity().clone(),
            client_data: engine.settings().client_data().to_string(),
            locale: engine.settings().locale().to_string(),
            created_at: Utc::now(),
        })?;

        // A concurrent add of the same id keeps whichever engine landed first.
        let engine = self
            .inner
            .engines
            .entry(engine_id.clone())
            .or_insert(engine)
            .value()
            .clone();
        info!(engine_id = %engine_id, "engine added");
        Ok(engine)
    }

    fn unload_engine_inner(&self, engine_id: &str) -> SdkResult<()> {
        match self.inner.engines.remove(engine_id) {
            Some(_) => {
                info!(engine_id = %engine_id, "engine unloaded");
                Ok(())
            }
            None => Err(SdkError::bad_input(format!("Engine '{engine_id}' is not loaded"))),
        }
    }

    fn delete_engine_inner(&self, engine_id: &str) -> SdkResult<()> {
        validate_engine_id(engine_id)?;
        let was_loaded = self.inner.engines.remove(engine_id).is_some();
        let was_stored = self.inner.cache.remove(engine_id)?;
        if !was_loaded && !was_stored {
            return Err(SdkError::bad_input(format!("Engine '{engine_id}' does not exist")));
        }
        if let Some(path) = &self.inner.shared.storage_path {
            crate::policy_sync::discard_cached_policy(path, engine_id)?;
        }
        info!(engine_id = %engine_id, "engine deleted");
        Ok(())
    }
}

impl fmt::Debug for FileProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileProfile")
            .field("session_id", &self.inner.shared.session_id)
            .field("storage_path", &self.inner.shared.storage_path)
            .field("loaded_engines", &self.inner.engines.len())
            .finish()
    }
}

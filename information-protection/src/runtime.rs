//! Process-wide SDK runtime
//!
//! Initialisation and teardown are explicit. [`SdkRuntime::global`] creates
//! the shared runtime on first use; [`release_all_resources`] stops it and
//! must be called only after every profile, engine and handler has been
//! dropped. While any of those objects is alive the release is refused.

use crate::async_op::Dispatcher;
use error_common::{SdkError, SdkResult};
use lazy_static::lazy_static;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

lazy_static! {
    static ref GLOBAL_RUNTIME: Mutex<Option<Arc<SdkRuntime>>> = Mutex::new(None);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub worker_threads: usize,
    /// Upper bound on concurrently executing operations
    pub max_blocking_threads: usize,
    pub thread_name: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: 1,
            max_blocking_threads: 16,
            thread_name: "ip-sdk-dispatch".to_string(),
        }
    }
}

/// Owns the thread pool that runs asynchronous SDK operations
pub struct SdkRuntime {
    dispatcher: Dispatcher,
    config: RuntimeConfig,
}

impl SdkRuntime {
    /// Creates an isolated runtime, independent of the global one.
    pub fn new(config: RuntimeConfig) -> SdkResult<Arc<Self>> {
        let dispatcher = Dispatcher::new(
            config.worker_threads,
            config.max_blocking_threads,
            &config.thread_name,
        )?;
        Ok(Arc::new(Self { dispatcher, config }))
    }

    /// Returns the global runtime, creating it with defaults on first use.
    pub fn global() -> SdkResult<Arc<Self>> {
        let mut slot = GLOBAL_RUNTIME.lock();
        if let Some(runtime) = slot.as_ref() {
            return Ok(Arc::clone(runtime));
        }
        let runtime = Self::new(RuntimeConfig::default())?;
        *slot = Some(Arc::clone(&runtime));
        info!("SDK runtime initialized");
        Ok(runtime)
    }

    /// Initialises the global runtime with `config`.
    ///
    /// # Errors
    /// `BadInput` if the global runtime already exists.
    pub fn init_global(config: RuntimeConfig) -> SdkResult<Arc<Self>> {
        let mut slot = GLOBAL_RUNTIME.lock();
        if slot.is_some() {
            return Err(SdkError::bad_input("SDK runtime is already initialized"));
        }
        let runtime = Self::new(config)?;
        *slot = Some(Arc::clone(&runtime));
        info!("SDK runtime initialized");
        Ok(runtime)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn is_released(&self) -> bool {
        self.dispatcher.is_released()
    }

    /// Stops this runtime once the caller holds the last reference.
    ///
    /// # Errors
    /// `BadInput` while profiles, engines or handlers still use it.
    pub fn release(self: Arc<Self>) -> SdkResult<()> {
        match Arc::try_unwrap(self) {
            Ok(runtime) => {
                runtime.dispatcher.shutdown();
                Ok(())
            }
            Err(runtime) => Err(outstanding(&runtime)),
        }
    }

    pub(crate) fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

fn outstanding(runtime: &Arc<SdkRuntime>) -> SdkError {
    SdkError::bad_input(format!(
        "SDK runtime still has {} outstanding reference(s); release profiles, engines and handlers first",
        Arc::strong_count(runtime).saturating_sub(1)
    ))
}

/// Tears down the global runtime.
///
/// Succeeds trivially when the runtime was never initialised. A later call
/// to [`SdkRuntime::global`] starts a fresh runtime.
///
/// # Errors
/// `BadInput` while SDK objects created on the global runtime are alive.
pub fn release_all_resources() -> SdkResult<()> {
    let mut slot = GLOBAL_RUNTIME.lock();
    let Some(runtime) = slot.take() else {
        return Ok(());
    };

    match Arc::try_unwrap(runtime) {
        Ok(runtime) => {
            runtime.dispatcher.shutdown();
            info!("SDK runtime released");
            Ok(())
        }
        Err(runtime) => {
            let error = outstanding(&runtime);
            *slot = Some(runtime);
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_refused_while_referenced() {
        let runtime = SdkRuntime::new(RuntimeConfig::default()).unwrap();
        let holder = Arc::clone(&runtime);

        let err = Arc::clone(&runtime).release().unwrap_err();
        assert!(err.message().contains("outstanding"));

        drop(holder);
        runtime.release().unwrap();
    }
}

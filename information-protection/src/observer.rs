//! Completion callbacks for asynchronous operations
//!
//! Observer traits are generic over the caller's context type `C`. Every
//! method has a no-op default, so an observer only implements the callbacks
//! it cares about. One observer may serve many in-flight operations; the
//! context tells the calls apart.

use crate::async_op::Promise;
use crate::engine::FileEngine;
use crate::handler::FileHandler;
use crate::profile::FileProfile;
use error_common::SdkError;

pub trait ProfileObserver<C>: Send + Sync {
    fn on_load_success(&self, _profile: FileProfile, _context: C) {}
    fn on_load_failure(&self, _error: SdkError, _context: C) {}

    fn on_list_engines_success(&self, _engine_ids: Vec<String>, _context: C) {}
    fn on_list_engines_failure(&self, _error: SdkError, _context: C) {}

    fn on_unload_engine_success(&self, _context: C) {}
    fn on_unload_engine_failure(&self, _error: SdkError, _context: C) {}

    fn on_add_engine_success(&self, _engine: FileEngine, _context: C) {}
    fn on_add_engine_failure(&self, _error: SdkError, _context: C) {}

    fn on_delete_engine_success(&self, _context: C) {}
    fn on_delete_engine_failure(&self, _error: SdkError, _context: C) {}
}

pub trait FileHandlerObserver<C>: Send + Sync {
    fn on_create_file_handler_success(&self, _handler: FileHandler, _context: C) {}
    fn on_create_file_handler_failure(&self, _error: SdkError, _context: C) {}

    /// `committed` is `false` when there was nothing to write.
    fn on_commit_success(&self, _committed: bool, _context: C) {}
    fn on_commit_failure(&self, _error: SdkError, _context: C) {}
}

/// Observer that fulfils the [`Promise`] passed as context
///
/// ```no_run
/// use information_protection::{promise, ApplicationInfo, FileProfile, ProfileSettings, PromiseObserver};
/// use std::sync::Arc;
///
/// # fn main() -> information_protection::SdkResult<()> {
/// let settings = ProfileSettings::in_memory(ApplicationInfo::new("app-id", "Sample", "1.0"));
/// let (promise, pending) = promise::<FileProfile>();
/// FileProfile::load_async(settings, Arc::new(PromiseObserver), promise);
/// let profile = pending.wait()?;
/// println!("session {}", profile.session_id());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct PromiseObserver;

impl ProfileObserver<Promise<FileProfile>> for PromiseObserver {
    fn on_load_success(&self, profile: FileProfile, context: Promise<FileProfile>) {
        context.fulfill(Ok(profile));
    }

    fn on_load_failure(&self, error: SdkError, context: Promise<FileProfile>) {
        context.fulfill(Err(error));
    }
}

impl ProfileObserver<Promise<Vec<String>>> for PromiseObserver {
    fn on_list_engines_success(&self, engine_ids: Vec<String>, context: Promise<Vec<String>>) {
        context.fulfill(Ok(engine_ids));
    }

    fn on_list_engines_failure(&self, error: SdkError, context: Promise<Vec<String>>) {
        context.fulfill(Err(error));
    }
}

impl ProfileObserver<Promise<FileEngine>> for PromiseObserver {
    fn on_add_engine_success(&self, engine: FileEngine, context: Promise<FileEngine>) {
        context.fulfill(Ok(engine));
    }

    fn on_add_engine_failure(&self, error: SdkError, context: Promise<FileEngine>) {
        context.fulfill(Err(error));
    }
}

impl ProfileObserver<Promise<()>> for PromiseObserver {
    fn on_unload_engine_success(&self, context: Promise<()>) {
        context.fulfill(Ok(()));
    }

    fn on_unload_engine_failure(&self, error: SdkError, context: Promise<()>) {
        context.fulfill(Err(error));
    }

    fn on_delete_engine_success(&self, context: Promise<()>) {
        context.fulfill(Ok(()));
    }

    fn on_delete_engine_failure(&self, error: SdkError, context: Promise<()>) {
        context.fulfill(Err(error));
    }
}

impl FileHandlerObserver<Promise<FileHandler>> for PromiseObserver {
    fn on_create_file_handler_success(&self, handler: FileHandler, context: Promise<FileHandler>) {
        context.fulfill(Ok(handler));
    }

    fn on_create_file_handler_failure(&self, error: SdkError, context: Promise<FileHandler>) {
        context.fulfill(Err(error));
    }
}

impl FileHandlerObserver<Promise<bool>> for PromiseObserver {
    fn on_commit_success(&self, committed: bool, context: Promise<bool>) {
        context.fulfill(Ok(committed));
    }

    fn on_commit_failure(&self, error: SdkError, context: Promise<bool>) {
        context.fulfill(Err(error));
    }
}

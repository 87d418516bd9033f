//! Observer-based completion for long-running SDK operations
//!
//! Every `*_async` entry point takes an observer and a caller-owned context.
//! The work runs on the runtime's blocking pool and exactly one of the
//! observer's success/failure methods receives the context back, always on a
//! pool thread rather than the thread that issued the call. Because the
//! context is moved into a single `FnOnce` delivery closure, it cannot be
//! delivered twice.

use error_common::{SdkError, SdkResult};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Names an operation and the log sink its work should be scoped to
#[derive(Clone)]
pub(crate) struct OperationScope {
    name: &'static str,
    log: Option<tracing::Dispatch>,
}

impl OperationScope {
    pub(crate) fn new(name: &'static str, log: Option<tracing::Dispatch>) -> Self {
        Self { name, log }
    }

    /// Runs `work` on the current thread; panics become `Internal` errors.
    pub(crate) fn run<T, W>(&self, work: W) -> SdkResult<T>
    where
        W: FnOnce() -> SdkResult<T>,
    {
        let name = self.name;
        let call = move || {
            let result = panic::catch_unwind(AssertUnwindSafe(work)).unwrap_or_else(|payload| {
                Err(SdkError::internal(format!(
                    "{name} panicked: {}",
                    panic_message(payload.as_ref())
                )))
            });
            match &result {
                Ok(_) => debug!(operation = name, "operation succeeded"),
                Err(e) => warn!(operation = name, error_kind = e.kind().name(), "operation failed: {}", e.message()),
            }
            result
        };

        match &self.log {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, call),
            None => call(),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Thread pool that executes operations and delivers their completions
pub(crate) struct Dispatcher {
    handle: Handle,
    runtime: parking_lot::Mutex<Option<Runtime>>,
    released: AtomicBool,
}

impl Dispatcher {
    pub(crate) fn new(worker_threads: usize, max_blocking_threads: usize, thread_name: &str) -> SdkResult<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .max_blocking_threads(max_blocking_threads.max(1))
            .thread_name(thread_name)
            .enable_all()
            .build()
            .map_err(|e| SdkError::internal(format!("Failed to start dispatcher: {e}")))?;

        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: parking_lot::Mutex::new(Some(runtime)),
            released: AtomicBool::new(false),
        })
    }

    /// Runs `work` off the calling thread, then hands its result and `context` to `deliver`.
    pub(crate) fn dispatch<T, C, W, D>(&self, scope: &OperationScope, context: C, work: W, deliver: D)
    where
        T: Send + 'static,
        C: Send + 'static,
        W: FnOnce() -> SdkResult<T> + Send + 'static,
        D: FnOnce(SdkResult<T>, C) + Send + 'static,
    {
        if self.released.load(Ordering::Acquire) {
            let error = SdkError::internal(format!(
                "{} issued after the SDK runtime was released",
                scope.name
            ));
            deliver_detached(scope.name, error, context, deliver);
            return;
        }

        let scope = scope.clone();
        // Dropping the JoinHandle detaches the task.
        let _task = self.handle.spawn_blocking(move || {
            let result = scope.run(work);
            deliver(result, context);
        });
    }

    pub(crate) fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    pub(crate) fn shutdown(&self) {
        self.released.store(true, Ordering::Release);
        if let Some(runtime) = self.runtime.lock().take() {
            runtime.shutdown_background();
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Delivers a failure on a fresh thread when no dispatcher is available.
pub(crate) fn deliver_detached<T, C, D>(name: &'static str, error: SdkError, context: C, deliver: D)
where
    T: Send + 'static,
    C: Send + 'static,
    D: FnOnce(SdkResult<T>, C) + Send + 'static,
{
    let spawned = std::thread::Builder::new()
        .name("ip-sdk-detached".to_string())
        .spawn(move || deliver(Err(error), context));

    if let Err(e) = spawned {
        // Nothing left to run the callback on; dropping the context is the only option.
        tracing::error!(operation = name, "failed to spawn completion thread: {e}");
    }
}

/// Sending half of a one-shot result, usable as an operation context
pub struct Promise<T> {
    sender: oneshot::Sender<SdkResult<T>>,
}

impl<T> Promise<T> {
    pub fn fulfill(self, result: SdkResult<T>) {
        // The receiver may have been dropped; the result is simply discarded then.
        let _ = self.sender.send(result);
    }
}

/// Receiving half of a [`Promise`]
pub struct PendingResult<T> {
    receiver: oneshot::Receiver<SdkResult<T>>,
}

impl<T> PendingResult<T> {
    /// Blocks the current thread until the operation completes.
    ///
    /// Must not be called from inside an async task; use [`recv`](Self::recv) there.
    pub fn wait(self) -> SdkResult<T> {
        self.receiver.blocking_recv().unwrap_or_else(|_| Err(dropped_promise()))
    }

    pub async fn recv(self) -> SdkResult<T> {
        self.receiver.await.unwrap_or_else(|_| Err(dropped_promise()))
    }
}

fn dropped_promise() -> SdkError {
    SdkError::internal("Operation completed without fulfilling its promise")
}

/// Creates a linked promise/result pair.
pub fn promise<T>() -> (Promise<T>, PendingResult<T>) {
    let (sender, receiver) = oneshot::channel();
    (Promise { sender }, PendingResult { receiver })
}

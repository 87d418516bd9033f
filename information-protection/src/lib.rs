//! Sensitivity labeling and content protection
//!
//! The object graph is `FileProfile` → `FileEngine` → `FileHandler`. A
//! profile owns the host's delegates, the protection master key and the
//! engine cache. An engine binds one identity to a compiled labeling policy.
//! A handler reads one piece of content, stages label and protection changes
//! and commits them atomically.
//!
//! Long-running operations come in two forms: a blocking call returning
//! [`SdkResult`], and an `*_async` variant that reports exactly once to an
//! observer on a dispatcher thread. [`PromiseObserver`] with [`promise`]
//! turns the latter into something a caller can wait on or `.await`.

pub mod action;
pub mod async_op;
pub mod config;
pub mod container;
pub mod delegates;
pub mod engine;
mod error;
pub mod execution_state;
pub mod handler;
mod keystore;
pub mod label;
pub mod observer;
pub mod policy;
pub mod policy_data;
mod policy_sync;
pub mod profile;
pub mod protection;
pub mod runtime;
mod storage;

pub use action::{Action, ActionType};
pub use async_op::{promise, PendingResult, Promise};
pub use config::SdkConfig;
pub use delegates::{
    ApplicationInfo, AuthDelegate, Consent, ConsentDelegate, HttpDelegate, HttpRequest, HttpRequestType,
    HttpResponse, Identity, LogLevel, LoggerDelegate, OAuth2Challenge, OAuth2Token,
};
pub use engine::{EngineSettings, FileEngine};
pub use error_common::{ErrorKind, SdkError, SdkResult};
pub use execution_state::{ContentFormat, ContentState, ExecutionState, StaticExecutionState};
pub use handler::{CommitTarget, ContentSource, FileHandler, FileHandlerSettings};
pub use label::{ActionSource, AssignmentMethod, ContentLabel, Label, LabelingOptions};
pub use observer::{FileHandlerObserver, ProfileObserver, PromiseObserver};
pub use policy::{PolicyHandler, RulePolicyHandler};
pub use policy_data::{LabelDefinition, Policy, PolicyDocument};
pub use profile::{FileProfile, ProfileSettings};
pub use protection::{ProtectionDescriptor, ProtectionDescriptorBuilder, ProtectionHandler};
pub use runtime::{release_all_resources, RuntimeConfig, SdkRuntime};

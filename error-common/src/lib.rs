//! Common error handling for the Information Protection SDK
//!
//! Every fallible SDK operation, synchronous or asynchronous, reports an
//! [`SdkError`] tagged with one [`ErrorKind`] from a closed set. Errors are
//! cheap to clone so an asynchronous failure can be handed to an observer
//! while the dispatcher keeps its own copy for logging.
//!
//! # Error Kinds
//!
//! - **BadInput**: caller supplied an invalid argument or document
//! - **FileIo**: reading or writing content failed
//! - **Network**: non-retryable transport failure
//! - **TransientNetwork**: retryable transport failure (the host decides when)
//! - **Internal**: unexpected SDK state
//! - **JustificationRequired**: a label downgrade needs a justification
//! - **NotSupportedOperation**: the operation is not available in this setup
//! - **PrivilegedRequired**: a privileged label cannot be replaced by a standard one
//! - **AccessDenied**: the identity lacks the rights for the operation
//! - **ConsentDenied**: the user refused consent for a service endpoint
//! - **PolicySync**: policy could not be synchronised
//!
//! # Example
//!
//! ```rust
//! use error_common::{ErrorKind, SdkError, SdkResult};
//!
//! fn open(path: &str) -> SdkResult<()> {
//!     if path.is_empty() {
//!         return Err(SdkError::bad_input("File path cannot be empty")
//!             .with_context("field", "path"));
//!     }
//!     Ok(())
//! }
//!
//! let err = open("").unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::BadInput);
//! assert!(!err.is_retryable());
//! ```

pub mod codes;
pub mod context;
pub mod reporting;
pub mod types;

pub use context::ErrorContext;
pub use reporting::{log_error, ErrorReporter};
pub use types::{ErrorKind, SdkError, SdkResult};

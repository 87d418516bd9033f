//! Audit trail for the Information Protection SDK
//!
//! The SDK records three kinds of events:
//! - **Discovery**: a handler opened content and read its label
//! - **Change**: a committed label or protection change was reported
//! - **Access**: protected content was decrypted
//!
//! Entries go to an [`AuditSink`]. Hosts pick the in-memory sink, the
//! `tracing` sink, or the JSON-lines file sink, or implement their own.
//!
//! # Example
//!
//! ```rust
//! use audit_engine::{AuditEntry, AuditEventType, AuditSink, InMemoryAuditSink};
//!
//! let sink = InMemoryAuditSink::new();
//! let entry = AuditEntry::new(AuditEventType::Change, "alice@contoso.com", "plan.docx", "label_changed")
//!     .with_field("new_label", "Confidential");
//! sink.record(&entry).unwrap();
//! assert_eq!(sink.entries_of(AuditEventType::Change).len(), 1);
//! ```

pub mod entry;
pub mod error;
pub mod sink;

pub use entry::*;
pub use error::*;
pub use sink::*;

//! Sample host for the information protection SDK
//!
//! `file_sample` loads a profile and one engine, then performs a single
//! operation on a file: show its status, set or delete a label, protect it
//! with custom rights or a template, or remove protection. Modified content
//! is written next to the input as `<stem>_modified<ext>`.
//!
//! ```bash
//! file_sample --policy policy.json --listlabels
//! file_sample --policy policy.json --username alice@contoso.com -f plan.docx --setlabel general
//! file_sample --policy policy.json --username alice@contoso.com -f plan_modified.docx --setlabel public -j "Publishing"
//! file_sample --username alice@contoso.com -f plan.docx --protect bob@contoso.com --rights VIEW,EDIT
//! ```

pub mod cli;
pub mod commands;
pub mod delegates;
pub mod output;

pub use cli::{Args, ConsentArg, ContentStateArg};
pub use commands::run;

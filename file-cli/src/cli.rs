use clap::{Parser, ValueEnum};
use information_protection::{AssignmentMethod, Consent, ContentState};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "file_sample", version)]
#[command(about = "Label, protect and inspect files with the information protection SDK")]
pub struct Args {
    /// Path to the file to work on
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Show the label and protection of the file
    #[arg(short = 'g', long = "getfilestatus")]
    pub get_file_status: bool,

    /// Set the label with this id; downgrades need --justification
    #[arg(short = 's', long = "setlabel", value_name = "LABEL_ID")]
    pub set_label: Option<String>,

    /// Delete the current label; needs --justification when it is a downgrade
    #[arg(short = 'd', long = "delete")]
    pub delete: bool,

    /// Protect for this comma-separated list of users
    #[arg(short = 'p', long = "protect", value_name = "USERS", requires = "rights")]
    pub protect: Option<String>,

    /// Comma-separated rights granted to the --protect users
    #[arg(short = 'r', long = "rights", value_name = "RIGHTS")]
    pub rights: Option<String>,

    /// Protect with a policy template
    #[arg(long = "templateid", value_name = "TEMPLATE_ID")]
    pub template_id: Option<String>,

    /// Remove protection from the file
    #[arg(short = 'u', long = "unprotect")]
    pub unprotect: bool,

    /// Show all labels with their ids
    #[arg(short = 'l', long = "listlabels")]
    pub list_labels: bool,

    /// Standard assignment; replaces standard labels only (default)
    #[arg(long, conflicts_with_all = ["privileged", "auto"])]
    pub standard: bool,

    /// Privileged assignment; replaces any label
    #[arg(long, conflicts_with = "auto")]
    pub privileged: bool,

    /// Automatic assignment
    #[arg(long)]
    pub auto: bool,

    /// Justification for label downgrades and removals
    #[arg(short = 'j', long)]
    pub justification: Option<String>,

    /// Identity the engine acts as
    #[arg(long, env = "FILE_SAMPLE_USERNAME")]
    pub username: Option<String>,

    /// Bearer token handed to the policy service
    #[arg(long = "protectiontoken", env = "FILE_SAMPLE_PROTECTION_TOKEN", hide_env_values = true)]
    pub protection_token: Option<String>,

    /// Policy service base URL
    #[arg(long = "protectionbaseurl", value_name = "URL")]
    pub protection_base_url: Option<String>,

    /// Local policy document (JSON or YAML)
    #[arg(long, value_name = "PATH")]
    pub policy: Option<PathBuf>,

    /// Write the engine's policy document to this path and exit
    #[arg(long = "exportpolicy", value_name = "PATH")]
    pub export_policy: Option<PathBuf>,

    /// Extended property key stored with the label
    #[arg(long = "extendedkey", requires = "extended_value")]
    pub extended_key: Option<String>,

    #[arg(long = "extendedvalue", requires = "extended_key")]
    pub extended_value: Option<String>,

    #[arg(long = "contentstate", value_enum, default_value_t = ContentStateArg::Rest)]
    pub content_state: ContentStateArg,

    #[arg(long, env = "IP_SDK_LOCALE", default_value = "en-US")]
    pub locale: String,

    /// Answer given when the SDK asks to contact a service
    #[arg(long, value_enum, default_value_t = ConsentArg::Accept)]
    pub consent: ConsentArg,

    /// Profile directory holding the master key, engines and logs
    #[arg(long, env = "IP_SDK_STORAGE_PATH", default_value = "file_sample_data")]
    pub storage: PathBuf,

    /// YAML SDK configuration; replaces --storage and --locale
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log SDK activity to stderr
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Args {
    /// `--auto` wins over `--privileged`.
    pub fn assignment_method(&self) -> AssignmentMethod {
        if self.auto {
            AssignmentMethod::Auto
        } else if self.privileged {
            AssignmentMethod::Privileged
        } else {
            AssignmentMethod::Standard
        }
    }

    pub fn extended_properties(&self) -> Vec<(String, String)> {
        match (&self.extended_key, &self.extended_value) {
            (Some(key), Some(value)) => vec![(key.clone(), value.clone())],
            _ => Vec::new(),
        }
    }

    /// Operations that only need protection, not a labeling policy
    pub fn is_protection_only(&self) -> bool {
        self.unprotect || self.protect.is_some() || self.template_id.is_some()
    }

    /// Operations that write a modified copy of the file
    pub fn modifies_file(&self) -> bool {
        self.set_label.is_some() || self.delete || self.is_protection_only()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ContentStateArg {
    Rest,
    Motion,
    Use,
}

impl From<ContentStateArg> for ContentState {
    fn from(state: ContentStateArg) -> Self {
        match state {
            ContentStateArg::Rest => ContentState::Rest,
            ContentStateArg::Motion => ContentState::Motion,
            ContentStateArg::Use => ContentState::Use,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConsentArg {
    /// Ask on the terminal
    Prompt,
    Accept,
    Always,
    Reject,
}

impl ConsentArg {
    /// Fixed answer; `None` for [`ConsentArg::Prompt`].
    pub fn answer(self) -> Option<Consent> {
        match self {
            ConsentArg::Prompt => None,
            ConsentArg::Accept => Some(Consent::Accept),
            ConsentArg::Always => Some(Consent::AcceptAlways),
            ConsentArg::Reject => Some(Consent::Reject),
        }
    }
}

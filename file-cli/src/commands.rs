use crate::cli::Args;
use crate::delegates::{CliConsent, ReqwestHttpDelegate, StaticTokenAuth};
use crate::output::{modified_output_path, render_labels, render_status};
use anyhow::{bail, Context};
use information_protection::engine::CUSTOM_SETTING_POLICY_DATA;
use information_protection::protection::UserRights;
use information_protection::{
    promise, ApplicationInfo, CommitTarget, EngineSettings, FileEngine, FileHandler, FileHandlerSettings,
    FileProfile, Identity, LabelingOptions, ProfileSettings, PromiseObserver, ProtectionDescriptorBuilder,
    SdkConfig,
};
use logger_redacted::FileLoggerDelegate;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub const APPLICATION_ID: &str = "3f8d2c61-file-sample";
const APPLICATION_NAME: &str = "file_sample";
const LOG_FILE_NAME: &str = "file_sample.log";
/// Identity for read-only operations when no --username is given
const ANONYMOUS_USER: &str = "anonymous@localhost";

pub fn application() -> ApplicationInfo {
    ApplicationInfo::new(APPLICATION_ID, APPLICATION_NAME, env!("CARGO_PKG_VERSION"))
}

/// Runs the operation selected by `args`, writing human-readable output to `out`.
pub fn run(args: &Args, out: &mut dyn Write) -> anyhow::Result<()> {
    if args.file.is_none() && args.export_policy.is_none() && !args.list_labels {
        bail!("Nothing to do: pass --file, --listlabels or --exportpolicy (see --help)");
    }

    let username = match (&args.username, args.modifies_file()) {
        (Some(name), _) => name.clone(),
        (None, true) => bail!("Changing a file requires --username"),
        (None, false) => ANONYMOUS_USER.to_string(),
    };

    let profile = load_profile(args)?;
    let engine = add_engine(&profile, args, &username, out)?;

    if let Some(path) = &args.export_policy {
        engine.export_policy_file(path)?;
        writeln!(out, "Policy file exported to: {}", path.display())?;
        return Ok(());
    }

    if args.list_labels {
        write!(out, "{}", render_labels(&engine.list_sensitivity_labels()))?;
        return Ok(());
    }

    let Some(file) = &args.file else {
        return Ok(());
    };
    let handler = open_handler(&engine, file, args)?;

    if args.get_file_status {
        return show_status(&handler, out);
    }

    if let Some(label_id) = &args.set_label {
        let options = labeling_options(args);
        handler.set_label(label_id, &options)?;
        return commit(&handler, file, out).map(|_| ());
    }

    if args.delete {
        handler.delete_label(&labeling_options(args))?;
        return commit(&handler, file, out).map(|_| ());
    }

    if args.unprotect {
        if !FileHandler::is_protected(file)? {
            writeln!(out, "File is not protected, no change made.")?;
            return Ok(());
        }
        handler.remove_protection()?;
        return commit(&handler, file, out).map(|_| ());
    }

    if let (Some(users), Some(rights)) = (&args.protect, &args.rights) {
        let grant = UserRights::new(split_list(users), split_list(rights));
        handler.set_protection(ProtectionDescriptorBuilder::from_user_rights(vec![grant]).build()?)?;
        return commit(&handler, file, out).map(|_| ());
    }

    if let Some(template_id) = &args.template_id {
        handler.set_protection(ProtectionDescriptorBuilder::from_template(template_id.clone()).build()?)?;
        return commit(&handler, file, out).map(|_| ());
    }

    show_status(&handler, out)
}

/// `--config` wins outright; otherwise `IP_SDK_*` values with `--storage` and `--locale` on top.
fn sdk_config<F>(args: &Args, lookup: F) -> anyhow::Result<SdkConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let config = match &args.config {
        Some(path) => SdkConfig::from_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => SdkConfig {
            storage_path: Some(args.storage.clone()),
            locale: args.locale.clone(),
            ..SdkConfig::default().with_overrides(lookup)?
        },
    };
    config.validate()?;
    Ok(config)
}

fn load_profile(args: &Args) -> anyhow::Result<FileProfile> {
    let config = sdk_config(args, |name| std::env::var(name).ok())?;
    debug!(?config, "SDK configuration");

    let mut settings: ProfileSettings = config
        .profile_settings(application())?
        .with_consent_delegate(Arc::new(CliConsent::new(args.consent)))
        .with_logger_delegate(Arc::new(FileLoggerDelegate::new().with_file_name(LOG_FILE_NAME)));
    if let Some(token) = &args.protection_token {
        settings = settings.with_auth_delegate(Arc::new(StaticTokenAuth::new(token.clone())));
    }
    if args.protection_base_url.is_some() {
        settings = settings.with_http_delegate(Arc::new(ReqwestHttpDelegate::new()?));
    }

    let profile = FileProfile::load(settings)?;
    debug!(session_id = %profile.session_id(), storage = ?profile.storage_path(), "profile loaded");
    Ok(profile)
}

/// Engine ids are derived from the user so repeated runs reuse one cached engine.
pub fn engine_id_for(username: &str) -> String {
    format!("file-sample-{}", username.to_ascii_lowercase())
}

fn add_engine(profile: &FileProfile, args: &Args, username: &str, out: &mut dyn Write) -> anyhow::Result<FileEngine> {
    let mut settings = EngineSettings::new(Identity::new(username))
        .with_engine_id(engine_id_for(username))
        .with_locale(args.locale.clone());

    if let Some(path) = &args.policy {
        let document = std::fs::read_to_string(path).with_context(|| format!("Failed to read path: {}", path.display()))?;
        writeln!(out, "Using policy from file: {}", path.display())?;
        settings = settings.with_custom_setting(CUSTOM_SETTING_POLICY_DATA, document);
    } else if let Some(url) = &args.protection_base_url {
        settings = settings.with_policy_endpoint(url.clone());
    } else if args.is_protection_only() {
        settings = settings.with_protection_only(true);
    } else {
        bail!("No policy found: pass --policy <file> or --protectionbaseurl <url>");
    }

    let (promise, pending) = promise::<FileEngine>();
    profile.add_engine_async(settings, Arc::new(PromiseObserver), promise);
    let engine = pending.wait()?;
    info!(engine_id = %engine.id(), "engine ready");
    Ok(engine)
}

fn open_handler(engine: &FileEngine, file: &Path, args: &Args) -> anyhow::Result<FileHandler> {
    let settings = FileHandlerSettings::for_path(file)
        .with_content_identifier(file.display().to_string())
        .with_content_state(args.content_state.into());

    let (promise, pending) = promise::<FileHandler>();
    engine.create_file_handler_async(settings, Arc::new(PromiseObserver), promise);
    Ok(pending.wait()?)
}

fn labeling_options(args: &Args) -> LabelingOptions {
    let mut options = LabelingOptions::new().with_assignment_method(args.assignment_method());
    if let Some(message) = args.justification.as_deref().filter(|m| !m.is_empty()) {
        options = options.with_downgrade_justification(true, message);
    }
    for (key, value) in args.extended_properties() {
        options = options.with_extended_property(key, value);
    }
    options
}

fn show_status(handler: &FileHandler, out: &mut dyn Write) -> anyhow::Result<()> {
    let label = handler.get_label();
    let protection = handler.get_protection();
    write!(out, "{}", render_status(label.as_ref(), protection.as_ref()))?;
    Ok(())
}

/// Commits to the `_modified` path. A failed commit leaves any existing file there untouched.
fn commit(handler: &FileHandler, input: &Path, out: &mut dyn Write) -> anyhow::Result<Option<PathBuf>> {
    let output = modified_output_path(input, &handler.get_output_file_name());

    let (promise, pending) = promise::<bool>();
    handler.commit_async(CommitTarget::Path(output.clone()), Arc::new(PromiseObserver), promise);

    match pending.wait() {
        Ok(true) => {
            writeln!(out, "New file created: {}", output.display())?;
            handler.notify_commit_successful(&output.display().to_string())?;
            Ok(Some(output))
        }
        Ok(false) => {
            writeln!(out, "No changes to commit.")?;
            Ok(None)
        }
        Err(error) => Err(error.into()),
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

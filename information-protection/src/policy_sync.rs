//! Where an engine's policy document comes from
//!
//! Sources are tried in a fixed order: inline `policy_data`, a
//! `policy_file` on disk, the remote policy endpoint, and finally an empty
//! policy for protection-only engines. Remotely fetched policies are cached
//! under `<profile>/policy/<engine id>.json` and reused when the service is
//! unreachable.

use crate::delegates::{Consent, HttpRequest, HttpRequestType, HttpResponse, Identity, OAuth2Challenge};
use crate::engine::{EngineSettings, CUSTOM_SETTING_POLICY_DATA, CUSTOM_SETTING_POLICY_FILE};
use crate::policy_data::PolicyDocument;
use crate::profile::ProfileShared;
use crate::storage::write_atomic;
use error_common::{SdkError, SdkResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const POLICY_CACHE_DIR: &str = "policy";

pub(crate) fn resolve_policy(
    engine_id: &str,
    settings: &EngineSettings,
    shared: &ProfileShared,
) -> SdkResult<PolicyDocument> {
    if let Some(data) = settings.custom_setting(CUSTOM_SETTING_POLICY_DATA) {
        debug!(engine_id, "policy from inline data");
        return PolicyDocument::parse(data);
    }
    if let Some(file) = settings.custom_setting(CUSTOM_SETTING_POLICY_FILE) {
        debug!(engine_id, file, "policy from file");
        return PolicyDocument::from_file(Path::new(file));
    }
    if let Some(endpoint) = settings.policy_endpoint() {
        return sync_remote(engine_id, endpoint, settings.identity(), shared);
    }
    if settings.is_protection_only() {
        debug!(engine_id, "protection-only engine, no labeling policy");
        return Ok(PolicyDocument::default());
    }

    Err(SdkError::not_supported(
        "No policy source configured: set policy_data, policy_file or a policy endpoint, or enable protection-only mode",
    ))
}

fn sync_remote(
    engine_id: &str,
    endpoint: &str,
    identity: &Identity,
    shared: &ProfileShared,
) -> SdkResult<PolicyDocument> {
    let cache_file = shared.storage_path.as_deref().map(|p| cache_path(p, engine_id));

    match fetch(endpoint, identity, shared) {
        Ok(document) => {
            if let Some(file) = &cache_file {
                write_atomic(file, document.to_json_pretty()?.as_bytes())?;
            }
            info!(engine_id, endpoint, labels = document.labels.len(), "policy synchronized");
            Ok(document)
        }
        Err(error) if error.is_retryable() => match cache_file.filter(|f| f.exists()) {
            Some(file) => {
                warn!(
                    engine_id,
                    endpoint,
                    "policy service unavailable, using cached policy: {}",
                    error.message()
                );
                PolicyDocument::from_file(&file)
            }
            None => Err(error),
        },
        Err(error) => Err(error),
    }
}

fn fetch(endpoint: &str, identity: &Identity, shared: &ProfileShared) -> SdkResult<PolicyDocument> {
    ensure_consent(endpoint, shared)?;

    let auth = shared
        .auth
        .as_ref()
        .ok_or_else(|| SdkError::access_denied("No auth delegate configured for the policy service"))?;
    let base = endpoint.trim_end_matches('/');
    let challenge = OAuth2Challenge::new(base, base, format!("{base}/.default"));
    let token = auth
        .acquire_oauth2_token(identity, &challenge)
        .ok_or_else(|| SdkError::access_denied("Auth delegate returned no token").with_context("endpoint", base))?;

    let http = shared
        .http
        .as_ref()
        .ok_or_else(|| SdkError::not_supported("Fetching policy requires an HTTP delegate"))?;
    let request = HttpRequest::new(HttpRequestType::Get, format!("{base}/policy"))
        .with_header("Authorization", format!("Bearer {}", token.access_token))
        .with_header("Accept", "application/json");

    let response = http.send(&request)?;
    check_status(&response, &request.url)?;

    let body = std::str::from_utf8(&response.body)
        .map_err(|e| SdkError::policy_sync(format!("Policy response is not UTF-8: {e}")))?;
    PolicyDocument::parse(body).map_err(|e| {
        SdkError::policy_sync(format!("Policy response could not be parsed: {}", e.message()))
            .with_context("url", request.url.as_str())
    })
}

fn ensure_consent(url: &str, shared: &ProfileShared) -> SdkResult<()> {
    if shared.consented_urls.contains(url) {
        return Ok(());
    }
    let Some(delegate) = &shared.consent else {
        return Ok(());
    };

    match delegate.get_user_consent(url) {
        Consent::AcceptAlways => {
            shared.consented_urls.insert(url.to_string());
            Ok(())
        }
        Consent::Accept => Ok(()),
        Consent::Reject => Err(SdkError::consent_denied(format!("User declined to contact {url}"))),
    }
}

fn check_status(response: &HttpResponse, url: &str) -> SdkResult<()> {
    let status = response.status_code;
    let error = match status {
        200..=299 => return Ok(()),
        408 | 429 | 500..=599 => SdkError::transient_network(format!("Policy service returned HTTP {status}")),
        _ => SdkError::network(format!("Policy service returned HTTP {status}")),
    };
    Err(error.with_context("url", url).with_context("request_id", response.id.as_str()))
}

fn cache_path(storage: &Path, engine_id: &str) -> PathBuf {
    storage.join(POLICY_CACHE_DIR).join(format!("{engine_id}.json"))
}

/// Removes the cached policy of a deleted engine.
pub(crate) fn discard_cached_policy(storage: &Path, engine_id: &str) -> SdkResult<()> {
    match std::fs::remove_file(cache_path(storage, engine_id)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

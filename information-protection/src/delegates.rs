//! Capabilities the host application provides to the SDK

use error_common::SdkResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub use logger_redacted::{LogLevel, LoggerDelegate};

/// User on whose behalf an engine operates
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Identity {
    pub email: String,
    pub delegated_email: Option<String>,
}

impl Identity {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            delegated_email: None,
        }
    }

    pub fn with_delegated_email(mut self, delegated_email: impl Into<String>) -> Self {
        self.delegated_email = Some(delegated_email.into());
        self
    }

    /// Identity that rights are evaluated for
    pub fn effective_email(&self) -> &str {
        self.delegated_email.as_deref().unwrap_or(&self.email)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuth2Challenge {
    pub authority: String,
    pub resource: String,
    pub scope: String,
}

impl OAuth2Challenge {
    pub fn new(authority: impl Into<String>, resource: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            resource: resource.into(),
            scope: scope.into(),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct OAuth2Token {
    pub access_token: String,
}

impl OAuth2Token {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }
}

impl std::fmt::Debug for OAuth2Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth2Token").field("access_token", &"[REDACTED]").finish()
    }
}

/// Supplies bearer tokens; called synchronously whenever a service needs one.
pub trait AuthDelegate: Send + Sync {
    /// Returns `None` when no token could be obtained.
    fn acquire_oauth2_token(&self, identity: &Identity, challenge: &OAuth2Challenge) -> Option<OAuth2Token>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Consent {
    AcceptAlways,
    Accept,
    Reject,
}

/// Asked before the SDK first contacts a service endpoint
pub trait ConsentDelegate: Send + Sync {
    fn get_user_consent(&self, url: &str) -> Consent;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpRequestType {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub id: String,
    pub request_type: HttpRequestType,
    pub url: String,
    pub body: Vec<u8>,
    /// Header names are stored lower-cased
    pub headers: BTreeMap<String, String>,
}

impl HttpRequest {
    pub fn new(request_type: HttpRequestType, url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            request_type,
            url: url.into(),
            body: Vec::new(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub id: String,
    pub status_code: u16,
    pub body: Vec<u8>,
    pub headers: BTreeMap<String, String>,
}

impl HttpResponse {
    pub fn new(request_id: impl Into<String>, status_code: u16, body: Vec<u8>) -> Self {
        Self {
            id: request_id.into(),
            status_code,
            body,
            headers: BTreeMap::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Transport the SDK uses for service calls
///
/// Timeouts and retries belong to the implementation. Return
/// `TransientNetwork` for failures worth retrying and `Network` otherwise.
pub trait HttpDelegate: Send + Sync {
    fn send(&self, request: &HttpRequest) -> SdkResult<HttpResponse>;
}

/// Describes the host application to services and audit records
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApplicationInfo {
    pub application_id: String,
    pub application_name: String,
    pub application_version: String,
}

impl ApplicationInfo {
    pub fn new(
        application_id: impl Into<String>,
        application_name: impl Into<String>,
        application_version: impl Into<String>,
    ) -> Self {
        Self {
            application_id: application_id.into(),
            application_name: application_name.into(),
            application_version: application_version.into(),
        }
    }
}

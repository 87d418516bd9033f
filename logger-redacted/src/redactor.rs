#![allow(clippy::unwrap_used)]

use base64::{engine::general_purpose, Engine as _};
use lazy_static::lazy_static;
use regex::Regex;
use sha2::{Digest, Sha256};

lazy_static! {
    static ref BEARER_REGEX: Regex = Regex::new(r"(?i)\bbearer\s+[A-Za-z0-9\-._~+/]+=*").unwrap();
    static ref JWT_REGEX: Regex = Regex::new(r"\beyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]*").unwrap();
    static ref SECRET_REGEX: Regex = Regex::new(
        r"(?i)\b(password|passwd|secret|client_secret|access_token|refresh_token)\s*[=:]\s*[^\s&;,]+"
    ).unwrap();
    static ref EMAIL_REGEX: Regex = Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap();
}

/// What the redactor scrubs from log text
#[derive(Debug, Clone)]
pub struct RedactionConfig {
    pub redact_bearer_tokens: bool,
    pub redact_jwts: bool,
    pub redact_secrets: bool,
    pub redact_emails: bool,
    /// Replace identities with a short stable hash instead of a mask
    pub hash_for_correlation: bool,
    pub custom_patterns: Vec<(Regex, String)>,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            redact_bearer_tokens: true,
            redact_jwts: true,
            redact_secrets: true,
            redact_emails: true,
            hash_for_correlation: true,
            custom_patterns: Vec::new(),
        }
    }
}

impl RedactionConfig {
    pub fn with_custom_pattern(mut self, pattern: Regex, replacement: impl Into<String>) -> Self {
        self.custom_patterns.push((pattern, replacement.into()));
        self
    }
}

/// Strips OAuth tokens, credentials and user identities from log messages
#[derive(Debug, Clone, Default)]
pub struct TokenRedactor {
    config: RedactionConfig,
}

impl TokenRedactor {
    pub fn new(config: RedactionConfig) -> Self {
        Self { config }
    }

    pub fn redact(&self, text: &str) -> String {
        let mut result = text.to_string();

        // Bearer headers usually wrap a JWT, so they go first.
        if self.config.redact_bearer_tokens {
            result = BEARER_REGEX.replace_all(&result, "Bearer [REDACTED]").into_owned();
        }

        if self.config.redact_jwts {
            result = JWT_REGEX.replace_all(&result, "[JWT]").into_owned();
        }

        if self.config.redact_secrets {
            result = SECRET_REGEX.replace_all(&result, "$1=[REDACTED]").into_owned();
        }

        if self.config.redact_emails {
            result = self.redact_emails(&result);
        }

        for (pattern, replacement) in &self.config.custom_patterns {
            result = pattern.replace_all(&result, replacement.as_str()).into_owned();
        }

        result
    }

    fn redact_emails(&self, text: &str) -> String {
        EMAIL_REGEX
            .replace_all(text, |caps: &regex::Captures| {
                let email = caps.get(0).map_or("", |m| m.as_str());
                if self.config.hash_for_correlation {
                    format!("EMAIL[{}]", hash_value(email))
                } else {
                    mask_email(email)
                }
            })
            .into_owned()
    }
}

fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let first_local = local.chars().next().map(String::from).unwrap_or_default();
            let first_domain = domain.chars().next().map(String::from).unwrap_or_default();
            format!("{first_local}***@{first_domain}***")
        }
        None => "***@***".to_string(),
    }
}

/// Short stable fingerprint so redacted values can still be correlated
pub fn hash_value(value: &str) -> String {
    let digest = Sha256::digest(value.to_lowercase().as_bytes());
    general_purpose::STANDARD.encode(digest.get(..8).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_redaction() {
        let redactor = TokenRedactor::default();
        let redacted = redactor.redact("GET /policy Authorization: Bearer abc.def-123==");
        assert!(redacted.contains("Bearer [REDACTED]"));
        assert!(!redacted.contains("abc.def-123"));
    }

    #[test]
    fn test_jwt_redaction() {
        let redactor = TokenRedactor::default();
        let redacted = redactor.redact("token eyJhbGciOi.eyJzdWIiOiIx.sig-part acquired");
        assert_eq!(redacted, "token [JWT] acquired");
    }

    #[test]
    fn test_secret_assignment_redaction() {
        let redactor = TokenRedactor::default();
        let redacted = redactor.redact("login password=hunter2&client_secret: s3cr3t");
        assert!(redacted.contains("password=[REDACTED]"));
        assert!(redacted.contains("client_secret=[REDACTED]"));
        assert!(!redacted.contains("hunter2"));
    }

    #[test]
    fn test_email_masking() {
        let redactor = TokenRedactor::new(RedactionConfig {
            hash_for_correlation: false,
            ..Default::default()
        });

        let redacted = redactor.redact("engine added for alice@contoso.com");
        assert_eq!(redacted, "engine added for a***@c***");
    }

    #[test]
    fn test_email_hash_is_stable_and_case_insensitive() {
        let redactor = TokenRedactor::default();
        let a = redactor.redact("Alice@Contoso.com");
        let b = redactor.redact("alice@contoso.com");
        assert_eq!(a, b);
        assert!(a.starts_with("EMAIL["));
    }

    #[test]
    fn test_custom_pattern() {
        let config = RedactionConfig::default()
            .with_custom_pattern(Regex::new(r"tenant-\d+").unwrap(), "tenant-[ID]");
        let redactor = TokenRedactor::new(config);
        assert_eq!(redactor.redact("sync tenant-4411"), "sync tenant-[ID]");
    }
}

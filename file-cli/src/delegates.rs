//! Delegates the sample hands to the SDK

use crate::cli::ConsentArg;
use dialoguer::Select;
use information_protection::{
    AuthDelegate, Consent, ConsentDelegate, HttpDelegate, HttpRequest, HttpRequestType, HttpResponse, Identity,
    OAuth2Challenge, OAuth2Token, SdkError, SdkResult,
};
use std::time::Duration;
use tracing::{debug, warn};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Hands out a token supplied on the command line
pub struct StaticTokenAuth {
    token: String,
}

impl StaticTokenAuth {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

impl AuthDelegate for StaticTokenAuth {
    fn acquire_oauth2_token(&self, identity: &Identity, challenge: &OAuth2Challenge) -> Option<OAuth2Token> {
        debug!(user = %identity.email, resource = %challenge.resource, "token requested");
        (!self.token.is_empty()).then(|| OAuth2Token::new(self.token.clone()))
    }
}

pub struct CliConsent {
    mode: ConsentArg,
}

impl CliConsent {
    pub fn new(mode: ConsentArg) -> Self {
        Self { mode }
    }
}

impl ConsentDelegate for CliConsent {
    fn get_user_consent(&self, url: &str) -> Consent {
        if let Some(answer) = self.mode.answer() {
            return answer;
        }

        let choice = Select::new()
            .with_prompt(format!("Allow file_sample to contact {url}?"))
            .items(&["Accept", "Always accept", "Reject"])
            .default(0)
            .interact();
        match choice {
            Ok(0) => Consent::Accept,
            Ok(1) => Consent::AcceptAlways,
            Ok(_) => Consent::Reject,
            Err(e) => {
                warn!("consent prompt failed, rejecting: {e}");
                Consent::Reject
            }
        }
    }
}

/// Blocking `reqwest` transport
pub struct ReqwestHttpDelegate {
    client: reqwest::blocking::Client,
}

impl ReqwestHttpDelegate {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("file_sample/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl HttpDelegate for ReqwestHttpDelegate {
    fn send(&self, request: &HttpRequest) -> SdkResult<HttpResponse> {
        let mut builder = match request.request_type {
            HttpRequestType::Get => self.client.get(&request.url),
            HttpRequestType::Post => self.client.post(&request.url).body(request.body.clone()),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().map_err(|e| transport_error(&e, &request.url))?;
        let status_code = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();
        let body = response.bytes().map_err(|e| transport_error(&e, &request.url))?.to_vec();

        Ok(HttpResponse {
            id: request.id.clone(),
            status_code,
            body,
            headers,
        })
    }
}

fn transport_error(error: &reqwest::Error, url: &str) -> SdkError {
    let failure = if error.is_timeout() || error.is_connect() {
        SdkError::transient_network(error.to_string())
    } else {
        SdkError::network(error.to_string())
    };
    failure.with_context("url", url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_consent_answers() {
        assert_eq!(CliConsent::new(ConsentArg::Always).get_user_consent("https://x"), Consent::AcceptAlways);
        assert_eq!(CliConsent::new(ConsentArg::Reject).get_user_consent("https://x"), Consent::Reject);
    }

    #[test]
    fn test_empty_token_is_no_token() {
        let challenge = OAuth2Challenge::new("https://a", "https://r", "s");
        let identity = Identity::new("alice@contoso.com");
        assert!(StaticTokenAuth::new("").acquire_oauth2_token(&identity, &challenge).is_none());
        assert_eq!(
            StaticTokenAuth::new("t0k3n")
                .acquire_oauth2_token(&identity, &challenge)
                .map(|t| t.access_token),
            Some("t0k3n".to_string())
        );
    }
}

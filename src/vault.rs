use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use base64::Engine;
use tracing::{error, info};

use crate::api::{CaptureEndpoint, ProxyResult, RelayError, TokenData};
use crate::config::Credentials;
use crate::template::ProxyCall;

// The vault protocol: three stateless HTTPS calls with basic auth and no
// retries. A transient failure surfaces to the caller immediately.

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VaultApi {
    async fn create_capture_endpoint(&self) -> Result<CaptureEndpoint, RelayError>;
    async fn list_tokens(&self) -> Result<Vec<TokenData>, RelayError>;
    async fn invoke_proxy(
        &self,
        token: &TokenData,
        call: ProxyCall,
        debug: bool,
    ) -> Result<ProxyResult, RelayError>;
}

#[derive(Clone)]
pub struct VaultClient {
    http: reqwest::Client,
    base_url: String,
}

impl VaultClient {
    pub fn new(base_url: String) -> anyhow::Result<VaultClient> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;

        Ok(VaultClient { http, base_url })
    }

    fn basic_auth(credentials: &Credentials) -> String {
        let encoded =
            base64::engine::general_purpose::STANDARD.encode(&credentials.pci_basic_auth);
        format!("Basic {}", encoded)
    }

    /// Returns the response body for 2xx statuses. Anything >= 400 is logged
    /// in full here and reduced to a generic `VaultRejected` for the caller:
    /// vault error payloads can echo request data back and must not travel
    /// any further than our logs.
    async fn read_checked(response: reqwest::Response, what: &str) -> Result<String, RelayError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport("failed to read vault response", e))?;

        if status >= StatusCode::BAD_REQUEST {
            error!(status = status.as_u16(), "vault rejected {}: {}", what, body);
            return Err(RelayError::VaultRejected { status });
        }

        Ok(body)
    }
}

fn transport(what: &str, err: reqwest::Error) -> RelayError {
    error!("{}: {}", what, err);
    RelayError::Transport(err)
}

fn decode(what: &str, err: serde_json::Error) -> RelayError {
    // Protocol mismatch with the vault, not a caller problem. The body is
    // deliberately not logged: a capture response carries the endpoint secret.
    error!("failed to decode {}: {}", what, err);
    RelayError::Decode(err)
}

/// Builds the `/proxy/post` URL. `reference` is forwarded URL-encoded when
/// non-empty and omitted otherwise; `debug=true` is only ever appended when
/// the operator flag is set.
pub fn proxy_url(
    base_url: &str,
    credentials: &Credentials,
    token: &str,
    reference: Option<&str>,
    debug: bool,
) -> String {
    let mut url = format!(
        "{}/proxy/post?user={}&passphrase={}&token={}",
        base_url,
        urlencoding::encode(&credentials.pci_key),
        urlencoding::encode(&credentials.pci_passphrase),
        urlencoding::encode(token),
    );
    if let Some(reference) = reference.filter(|r| !r.is_empty()) {
        url.push_str("&reference=");
        url.push_str(&urlencoding::encode(reference));
    }
    if debug {
        url.push_str("&debug=true");
    }
    url
}

#[async_trait]
impl VaultApi for VaultClient {
    async fn create_capture_endpoint(&self) -> Result<CaptureEndpoint, RelayError> {
        info!("creating capture endpoint");
        let credentials = Credentials::resolve()?;

        let url = format!(
            "{}/capture?user={}&passphrase={}",
            self.base_url,
            urlencoding::encode(&credentials.pci_key),
            urlencoding::encode(&credentials.pci_passphrase),
        );

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, Self::basic_auth(&credentials))
            .send()
            .await
            .map_err(|e| transport("failed to create capture endpoint", e))?;

        let body = Self::read_checked(response, "capture endpoint creation").await?;
        let endpoint: CaptureEndpoint =
            serde_json::from_str(&body).map_err(|e| decode("capture endpoint", e))?;

        info!("capture endpoint created: {}", endpoint.url);
        Ok(endpoint)
    }

    async fn list_tokens(&self) -> Result<Vec<TokenData>, RelayError> {
        info!("retrieving list of tokens");
        let credentials = Credentials::resolve()?;

        let url = format!(
            "{}/vault?user={}",
            self.base_url,
            urlencoding::encode(&credentials.pci_key),
        );

        let response = self
            .http
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, Self::basic_auth(&credentials))
            .send()
            .await
            .map_err(|e| transport("failed to list tokens", e))?;

        let body = Self::read_checked(response, "token listing").await?;

        // The vault keys the listing by user id. A listing without our key
        // just means we have no tokens yet.
        let mut listing: HashMap<String, Vec<TokenData>> =
            serde_json::from_str(&body).map_err(|e| decode("token listing", e))?;
        let tokens = listing.remove(&credentials.pci_key).unwrap_or_default();

        info!("retrieved a list of {} tokens", tokens.len());
        Ok(tokens)
    }

    async fn invoke_proxy(
        &self,
        token: &TokenData,
        call: ProxyCall,
        debug: bool,
    ) -> Result<ProxyResult, RelayError> {
        info!("posting proxy request for token");
        let credentials = Credentials::resolve()?;

        let url = proxy_url(
            &self.base_url,
            &credentials,
            &token.token,
            token.reference.as_deref(),
            debug,
        );

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, Self::basic_auth(&credentials))
            .json(&call)
            .send()
            .await
            .map_err(|e| transport("failed to post proxy request", e))?;

        let body = Self::read_checked(response, "proxy request").await?;
        let result: ProxyResult =
            serde_json::from_str(&body).map_err(|e| decode("proxy response", e))?;

        // Only returned when the debug flag was sent; this is the substituted
        // request with the real card data in it.
        if let Some(populated) = &result.populated_template {
            info!("populated template: {}", populated);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::proxy_url;
    use crate::config::Credentials;

    fn test_credentials() -> Credentials {
        Credentials {
            pci_basic_auth: "someone:hunter2".to_string(),
            pci_key: "test-user".to_string(),
            pci_passphrase: "test-pass".to_string(),
            stripe_key: "sk_test_abc123".to_string(),
        }
    }

    #[test]
    fn proxy_url_with_reference_and_no_debug() {
        let url = proxy_url(
            "https://vault.example.com/v1",
            &test_credentials(),
            "tok_123",
            Some("order-9"),
            false,
        );

        assert_eq!(
            url,
            "https://vault.example.com/v1/proxy/post\
             ?user=test-user&passphrase=test-pass&token=tok_123&reference=order-9"
        );
        assert!(!url.contains("debug="));
    }

    #[test]
    fn proxy_url_omits_empty_reference() {
        for reference in [None, Some("")] {
            let url = proxy_url(
                "https://vault.example.com/v1",
                &test_credentials(),
                "tok_123",
                reference,
                false,
            );
            assert!(!url.contains("reference="), "{:?}", url);
        }
    }

    #[test]
    fn proxy_url_encodes_the_reference() {
        let url = proxy_url(
            "https://vault.example.com/v1",
            &test_credentials(),
            "tok_123",
            Some("order 9/a"),
            false,
        );

        assert!(url.ends_with("&reference=order%209%2Fa"), "{:?}", url);
    }

    #[test]
    fn proxy_url_appends_debug_only_when_asked() {
        let url = proxy_url(
            "https://vault.example.com/v1",
            &test_credentials(),
            "tok_123",
            None,
            true,
        );

        assert!(url.ends_with("&debug=true"), "{:?}", url);
    }
}

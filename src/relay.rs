use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use bytes::Bytes;

use crate::api::{CaptureEndpoint, RelayError, TokenData, TokenListResponse};
use crate::config::Credentials;
use crate::router;
use crate::template::{stripe_source_template, ProxyCall, Webhook};

// The relay's own HTTP surface: three thin adapters over the vault client.
// Authenticating the front-end is left to deployment middleware.

pub async fn get_secret(
    state: State<router::State>,
) -> Result<Json<CaptureEndpoint>, RelayError> {
    let endpoint = state.vault.create_capture_endpoint().await.map_err(|e| {
        tracing::error!("could not get capture endpoint: {}", e);
        e
    })?;

    Ok(Json(endpoint))
}

pub async fn get_tokens(
    state: State<router::State>,
) -> Result<Json<TokenListResponse>, RelayError> {
    match state.vault.list_tokens().await {
        Ok(tokens) => {
            *state.token_cache.write().await = Some(tokens.clone());
            Ok(Json(TokenListResponse { tokens }))
        }
        Err(err) => {
            // Fall back to the last good listing if we have one; the vault
            // being briefly unreachable should not blank out the front-end.
            if let Some(tokens) = state.token_cache.read().await.clone() {
                tracing::warn!("serving cached tokens, vault listing failed: {}", err);
                return Ok(Json(TokenListResponse { tokens }));
            }
            Err(err)
        }
    }
}

pub async fn post_stripe(state: State<router::State>, body: Bytes) -> Result<StatusCode, RelayError> {
    let token_data: TokenData =
        serde_json::from_slice(&body).map_err(|e| RelayError::ClientRequest {
            reason: e.to_string(),
        })?;

    let credentials = Credentials::resolve()?;
    let call = ProxyCall {
        request: stripe_source_template(&credentials),
        webhook: state.webhook_url.clone().map(|url| Webhook { url }),
    };

    state
        .vault
        .invoke_proxy(&token_data, call, state.debug_proxy)
        .await
        .map_err(|e| {
            tracing::error!("could not post token to stripe: {}", e);
            e
        })?;

    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::extract::State;
    use axum::http::StatusCode;
    use bytes::Bytes;
    use tokio::sync::RwLock;

    use crate::api::{ProxyResult, RelayError, TokenData};
    use crate::relay::{get_tokens, post_stripe};
    use crate::router;
    use crate::vault::MockVaultApi;

    fn set_test_credentials() {
        std::env::set_var("PCI_BASIC_AUTH", "someone:hunter2");
        std::env::set_var("PCI_KEY", "test-user");
        std::env::set_var("PCI_PASSPHRASE", "test-pass");
        std::env::set_var("STRIPE_KEY", "sk_test_abc123");
    }

    fn state_with(vault: MockVaultApi, debug: bool) -> router::State {
        router::State {
            vault: Arc::new(vault),
            token_cache: Arc::new(RwLock::new(None)),
            webhook_url: Some("https://hooks.example.com/stripe".to_string()),
            debug_proxy: debug,
        }
    }

    fn some_tokens() -> Vec<TokenData> {
        vec![TokenData {
            token: "tok_123".to_string(),
            reference: Some("order-9".to_string()),
        }]
    }

    #[tokio::test]
    async fn get_tokens_refreshes_the_cache() {
        let mut vault = MockVaultApi::new();
        vault.expect_list_tokens().returning(|| Ok(some_tokens()));

        let state = state_with(vault, false);
        let response = get_tokens(State(state.clone())).await.unwrap();

        assert_eq!(response.0.tokens.len(), 1);
        assert_eq!(state.token_cache.read().await.as_deref().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn get_tokens_serves_the_cache_when_the_vault_is_down() {
        let mut vault = MockVaultApi::new();
        vault.expect_list_tokens().returning(|| {
            Err(RelayError::VaultRejected {
                status: StatusCode::SERVICE_UNAVAILABLE,
            })
        });

        let state = state_with(vault, false);
        *state.token_cache.write().await = Some(some_tokens());

        let response = get_tokens(State(state)).await.unwrap();
        assert_eq!(response.0.tokens[0].token, "tok_123");
    }

    #[tokio::test]
    async fn get_tokens_fails_when_the_vault_is_down_and_nothing_is_cached() {
        let mut vault = MockVaultApi::new();
        vault.expect_list_tokens().returning(|| {
            Err(RelayError::VaultRejected {
                status: StatusCode::SERVICE_UNAVAILABLE,
            })
        });

        let result = get_tokens(State(state_with(vault, false))).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn post_stripe_forwards_token_reference_and_debug_flag() {
        set_test_credentials();

        let mut vault = MockVaultApi::new();
        vault
            .expect_invoke_proxy()
            .withf(|token, call, debug| {
                token.token == "tok_123"
                    && token.reference.as_deref() == Some("order-9")
                    && call.webhook.is_some()
                    && !debug
            })
            .returning(|_, _, _| {
                Ok(ProxyResult {
                    populated_template: None,
                })
            });

        let body = Bytes::from(r#"{"token":"tok_123","reference":"order-9"}"#);
        let status = post_stripe(State(state_with(vault, false)), body)
            .await
            .unwrap();

        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn post_stripe_rejects_a_malformed_body() {
        let vault = MockVaultApi::new();

        let result = post_stripe(State(state_with(vault, false)), Bytes::from("not json")).await;

        let err = result.unwrap_err();
        assert!(matches!(err, RelayError::ClientRequest { .. }), "{:?}", err);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::api::TokenData;
use crate::{relay, vault};

/// Last good token listing, served when the vault cannot be reached.
pub type TokenCache = Arc<RwLock<Option<Vec<TokenData>>>>;

#[derive(Clone)]
pub struct State {
    pub vault: Arc<dyn vault::VaultApi + Send + Sync>,
    pub token_cache: TokenCache,
    pub webhook_url: Option<String>,
    pub debug_proxy: bool,
}

async fn index() -> &'static str {
    "pcirelay"
}

pub fn router<V: vault::VaultApi + Send + Sync + 'static>(
    vault: V,
    warm_tokens: Option<Vec<TokenData>>,
    webhook_url: Option<String>,
    debug_proxy: bool,
) -> Router {
    let state = State {
        vault: Arc::new(vault),
        token_cache: Arc::new(RwLock::new(warm_tokens)),
        webhook_url,
        debug_proxy,
    };

    Router::new()
        .route("/", get(index))
        .route("/get-secret", get(relay::get_secret))
        .route("/get-tokens", get(relay::get_tokens))
        .route("/stripe", post(relay::post_stripe))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

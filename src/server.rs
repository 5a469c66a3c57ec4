use std::future::Future;
use std::net::TcpListener;

use crate::config::Config;
use crate::router;
use crate::vault::{VaultApi, VaultClient};

pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F)
where
    F: Future<Output = ()>,
{
    let vault =
        VaultClient::new(config.vault_base_url.clone()).expect("failed to create vault client");

    if config.debug_proxy {
        tracing::warn!(
            "proxy debug mode is on: substituted requests will be written to the logs"
        );
    }

    // Warm the token cache so the front-end has a listing even if the vault
    // is briefly unavailable later. Not fatal: we still serve, degraded.
    let warm_tokens = match vault.list_tokens().await {
        Ok(tokens) => Some(tokens),
        Err(err) => {
            tracing::error!("failed to prefetch tokens from the vault: {}", err);
            None
        }
    };

    let app = router::router(
        vault,
        warm_tokens,
        config.webhook_url.clone(),
        config.debug_proxy,
    );

    // run our app with hyper
    // `axum::Server` is a re-export of `hyper::Server`
    tracing::info!("listening on {:?}", listener.local_addr().unwrap());
    axum::Server::from_tcp(listener)
        .unwrap()
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
        .unwrap()
}

use std::net::TcpListener;

use envconfig::Envconfig;

use pcirelay::config::Config;
use pcirelay::server::serve;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::init_from_env().expect("failed to load configuration from environment");

    // Failing to bind is the one startup error we do not serve through.
    let listener = TcpListener::bind(config.address).expect("failed to bind listening address");

    serve(config, listener, async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutting down");
    })
    .await
}

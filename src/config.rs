use envconfig::Envconfig;
use std::net::SocketAddr;

use crate::api::RelayError;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(default = "0.0.0.0:8080")]
    pub address: SocketAddr,
    #[envconfig(default = "https://api.pcivault.io/v1")]
    pub vault_base_url: String,
    /// Where the vault should deliver the processor's response. Omitted from
    /// the proxy call when unset.
    pub webhook_url: Option<String>,
    /// Asks the vault to echo the substituted request back so it can be
    /// logged. Test cards only: with real card data this writes PANs to the
    /// relay's logs. Never defaulted to on.
    #[envconfig(default = "false")]
    pub debug_proxy: bool,
}

/// The relay's own secrets. Resolved from the environment on every call that
/// needs them rather than cached, so nothing sensitive lingers in process
/// state between requests.
#[derive(Envconfig, Clone)]
pub struct Credentials {
    pub pci_basic_auth: String,
    pub pci_key: String,
    pub pci_passphrase: String,
    pub stripe_key: String,
}

impl Credentials {
    /// Fails closed: a missing variable surfaces as `AuthConfiguration`
    /// before any network call is attempted, instead of sending an empty
    /// credential to the vault.
    pub fn resolve() -> Result<Credentials, RelayError> {
        Ok(Credentials::init_from_env()?)
    }
}

use base64::Engine;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::config::Credentials;

// Builds the request descriptor the vault populates and forwards to Stripe.
// Pure data construction: no card value ever passes through here, only the
// {{placeholder}} syntax the vault substitutes from the token's data.

pub const STRIPE_SOURCES_URL: &str = "https://api.stripe.com/v1/sources";

/// A single outbound header. Kept as a list entry rather than a map key so
/// the order we declare is the order the vault sends; some processors care
/// about byte-for-byte request reproducibility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

// The vault's wire format for a header is a single-entry JSON object,
// `{"Content-Type": "application/x-www-form-urlencoded"}`.
impl Serialize for Header {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.name, &self.value)?;
        map.end()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProxyRequestTemplate {
    pub method: String,
    pub url: String,
    pub headers: Vec<Header>,
    pub body: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Webhook {
    pub url: String,
}

/// JSON envelope POSTed to the vault's `/proxy/post`.
#[derive(Debug, Clone, Serialize)]
pub struct ProxyCall {
    pub request: ProxyRequestTemplate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook: Option<Webhook>,
}

// Field names are percent-encoded for Stripe's form API (`card[number]`
// becomes `card%5Bnumber%5D`); placeholder values stay literal so the vault
// can still find and substitute them.
fn form_field(name: &str, value: &str) -> String {
    format!("{}={}", urlencoding::encode(name), value)
}

/// Template for creating a Stripe card source from a vault token.
pub fn stripe_source_template(credentials: &Credentials) -> ProxyRequestTemplate {
    // Stripe convention: secret key as the basic-auth username, empty password.
    let authorization = format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode(format!("{}:", credentials.stripe_key))
    );

    let body = [
        form_field("type", "card"),
        form_field("card[number]", "{{card_number}}"),
        form_field("card[exp_month]", "{{expiry_month}}"),
        form_field("card[exp_year]", "{{expiry_year}}"),
    ]
    .join("&");

    ProxyRequestTemplate {
        method: "POST".to_string(),
        url: STRIPE_SOURCES_URL.to_string(),
        headers: vec![
            Header {
                name: "Content-Type".to_string(),
                value: "application/x-www-form-urlencoded".to_string(),
            },
            Header {
                name: "Authorization".to_string(),
                value: authorization,
            },
        ],
        body,
    }
}

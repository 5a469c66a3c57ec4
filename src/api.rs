use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Define the API interface for the relay here.
// This is used for serializing responses and deserializing requests,
// both on our own surface and on the vault protocol.

/// One-time capture URL issued by the vault. Handed straight to the
/// front-end, never stored.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaptureEndpoint {
    pub url: String,
    pub secret: String,
}

/// Opaque reference to card data held by the vault.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenData {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenListResponse {
    pub tokens: Vec<TokenData>,
}

/// Body of the vault's proxy response. `populated_template` is only present
/// when the call was made with the debug flag, and holds the substituted
/// request including the raw card data.
#[derive(Debug, Default, Deserialize)]
pub struct ProxyResult {
    pub populated_template: Option<String>,
}

/// Everything that can go wrong while brokering a vault call.
///
/// Display strings are what the relay's own caller sees, so they must never
/// embed vault response bodies: the vault echoes request data into its error
/// payloads, and those can contain card details. Full detail goes to the
/// logs at the point of failure instead.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("vault credentials are not configured: {0}")]
    AuthConfiguration(#[from] envconfig::Error),
    #[error("could not reach the vault (see logs)")]
    Transport(#[from] reqwest::Error),
    #[error("vault rejected the request: {status} (see logs)")]
    VaultRejected { status: StatusCode },
    #[error("unexpected vault response (see logs)")]
    Decode(#[from] serde_json::Error),
    #[error("invalid request body: {reason}")]
    ClientRequest { reason: String },
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::ClientRequest { .. } => StatusCode::BAD_REQUEST,
            RelayError::AuthConfiguration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::Transport(_) | RelayError::VaultRejected { .. } | RelayError::Decode(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

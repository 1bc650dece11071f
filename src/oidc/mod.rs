//! OIDC integration
//!
//! This module holds the provider client used for the authorization
//! redirect and code exchange, and the verifier that checks identity
//! tokens against the provider's published keys.

pub mod provider;
pub mod verifier;

pub use provider::{ProviderClient, TokenResponse};
pub use verifier::{Claims, IdTokenVerifier, JsonWebKey, JsonWebKeySet};

use serde::Deserialize;

/// Query parameters delivered to the callback endpoint by the provider.
#[derive(Deserialize, Debug)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
}

/// OIDC discovery document, fetched from the issuer's well-known location.
#[derive(Debug, Clone, Deserialize)]
pub struct OidcDiscoveryDocument {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
}

/// Fetch and parse the discovery document for an issuer URL.
///
/// # Errors
///
/// Returns an error if the request fails, the response status is not
/// success, or the body is not a valid discovery document.
pub async fn fetch_discovery_document(
    issuer_url: &str,
) -> Result<OidcDiscoveryDocument, String> {
    let discovery_url = format!(
        "{}/.well-known/openid-configuration",
        issuer_url.trim_end_matches('/')
    );
    log::debug!("fetching discovery document from {discovery_url}");

    let response = reqwest::get(&discovery_url)
        .await
        .map_err(|e| format!("failed to fetch discovery document: {e}"))?;

    if !response.status().is_success() {
        return Err(format!(
            "discovery document request failed with status {}",
            response.status()
        ));
    }

    response
        .json::<OidcDiscoveryDocument>()
        .await
        .map_err(|e| format!("failed to parse discovery document: {e}"))
}

use serde::Deserialize;
use std::collections::HashMap;

use crate::errors::AuthError;
use crate::settings::Settings;

use super::fetch_discovery_document;

/// Response body of the token endpoint.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: Option<String>,
    pub expires_in: Option<u64>,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub scope: Option<String>,
}

/// Identity-provider client with endpoints resolved at startup.
///
/// Endpoints are resolved once from the issuer's discovery document and
/// are read-only afterwards; the client is cheap to clone into each
/// server worker.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    pub issuer_url: String,
    pub jwks_uri: String,
    auth_url: url::Url,
    token_url: String,
    client_id: String,
    client_secret: Option<String>,
    redirect_uri: String,
    scope: String,
    http_client: reqwest::Client,
}

impl ProviderClient {
    /// Resolve provider endpoints from the issuer's discovery document.
    ///
    /// # Errors
    ///
    /// Returns an error if the discovery document cannot be fetched or
    /// the client ID is not configured. Discovery failures are fatal to
    /// startup, not to a request.
    pub async fn discover(settings: &Settings) -> anyhow::Result<Self> {
        let document = fetch_discovery_document(&settings.provider.issuer_url)
            .await
            .map_err(anyhow::Error::msg)?;

        log::info!(
            "resolved provider endpoints for issuer {}",
            document.issuer
        );

        Self::from_endpoints(
            settings,
            &document.issuer,
            &document.authorization_endpoint,
            &document.token_endpoint,
            &document.jwks_uri,
        )
    }

    /// Build a client from already-resolved endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error if the client ID is not configured or the
    /// authorization endpoint is not a valid URL.
    pub fn from_endpoints(
        settings: &Settings,
        issuer: &str,
        authorization_endpoint: &str,
        token_endpoint: &str,
        jwks_uri: &str,
    ) -> anyhow::Result<Self> {
        let client_id = settings
            .provider
            .get_client_id()
            .ok_or_else(|| anyhow::anyhow!("client ID not configured"))?;
        let client_secret = settings.provider.get_client_secret();

        let auth_url = url::Url::parse(authorization_endpoint)?;
        let redirect_uri = format!(
            "{}/demo/callback",
            settings.application.redirect_base_url.trim_end_matches('/')
        );

        Ok(Self {
            issuer_url: issuer.to_string(),
            jwks_uri: jwks_uri.to_string(),
            auth_url,
            token_url: token_endpoint.to_string(),
            client_id,
            client_secret,
            redirect_uri,
            scope: settings.provider.scope_param(),
            http_client: reqwest::Client::new(),
        })
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Build the authorization URL a browser is redirected to when no
    /// session is present.
    #[must_use]
    pub fn authorization_url(&self, state: &str) -> String {
        let mut url = self.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.scope)
            .append_pair("state", state);
        url.to_string()
    }

    /// Exchange an authorization code for tokens at the token endpoint.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenExchangeFailed` when the request fails,
    /// the provider answers with a non-success status, or the response
    /// body does not parse.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AuthError> {
        let mut params = HashMap::new();
        params.insert("grant_type", "authorization_code");
        params.insert("code", code);
        params.insert("redirect_uri", &self.redirect_uri);
        params.insert("client_id", &self.client_id);
        if let Some(ref secret) = self.client_secret {
            params.insert("client_secret", secret);
        }

        log::debug!("exchanging authorization code at {}", self.token_url);

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::TokenExchangeFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(AuthError::TokenExchangeFailed(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::TokenExchangeFailed(format!("invalid token response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use serial_test::serial;

    fn test_client() -> ProviderClient {
        ProviderClient::from_endpoints(
            &Settings::default(),
            "http://localhost:9080/auth/realms/zxc-realm",
            "http://localhost:9080/auth/realms/zxc-realm/protocol/openid-connect/auth",
            "http://localhost:9080/auth/realms/zxc-realm/protocol/openid-connect/token",
            "http://localhost:9080/auth/realms/zxc-realm/protocol/openid-connect/certs",
        )
        .unwrap()
    }

    // Serialized with the settings tests, which toggle the credential
    // environment variables this assertion depends on.
    #[test]
    #[serial]
    fn test_authorization_url_query_parameters() {
        let client = test_client();
        let auth_url = url::Url::parse(&client.authorization_url("somestate")).unwrap();

        let pairs: std::collections::HashMap<_, _> = auth_url.query_pairs().collect();
        assert_eq!(pairs["client_id"], "confidential-client");
        assert_eq!(pairs["redirect_uri"], "http://localhost:8081/demo/callback");
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["scope"], "openid profile email");
        assert_eq!(pairs["state"], "somestate");
    }

    #[test]
    fn test_missing_client_id_is_rejected() {
        let mut settings = Settings::default();
        settings.provider.client_id = None;
        settings.provider.client_id_env = None;

        let result = ProviderClient::from_endpoints(
            &settings,
            "http://issuer",
            "http://issuer/auth",
            "http://issuer/token",
            "http://issuer/certs",
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_exchange_against_unreachable_endpoint_fails() {
        let mut client = test_client();
        client.token_url = "http://127.0.0.1:1/token".to_string();

        let err = client.exchange_code("somecode").await.unwrap_err();
        assert!(matches!(err, AuthError::TokenExchangeFailed(_)));
    }
}

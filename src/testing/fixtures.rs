//! Fixtures for exercising the auth gate and the submit pipeline without
//! a live identity provider.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use p256::ecdsa::{signature::Signer, Signature, SigningKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;

use crate::oidc::{JsonWebKey, ProviderClient};
use crate::settings::Settings;

/// Key ID advertised by [`TestKey::jwk`].
pub const TEST_KEY_ID: &str = "test-key";

// Any 32-byte value below the P-256 group order is a valid scalar; a
// fixed seed keeps tokens reproducible across test runs.
const TEST_KEY_SEED: [u8; 32] = [7u8; 32];

/// A fixed P-256 key pair for signing ES256 identity tokens in tests.
pub struct TestKey {
    signing_key: SigningKey,
}

impl TestKey {
    /// # Panics
    ///
    /// Never panics; the fixed seed is a valid P-256 scalar.
    #[must_use]
    pub fn new() -> Self {
        Self {
            signing_key: SigningKey::from_slice(&TEST_KEY_SEED)
                .expect("fixed seed is a valid P-256 scalar"),
        }
    }

    /// The public half as a JWK, ready for `IdTokenVerifier::install_keys`.
    ///
    /// # Panics
    ///
    /// Never panics; an uncompressed point always carries both coordinates.
    #[must_use]
    pub fn jwk(&self) -> JsonWebKey {
        let point = self.signing_key.verifying_key().to_encoded_point(false);
        JsonWebKey {
            kty: "EC".to_string(),
            kid: Some(TEST_KEY_ID.to_string()),
            alg: Some("ES256".to_string()),
            key_use: Some("sig".to_string()),
            n: None,
            e: None,
            crv: Some("P-256".to_string()),
            x: Some(URL_SAFE_NO_PAD.encode(point.x().expect("uncompressed point has x"))),
            y: Some(URL_SAFE_NO_PAD.encode(point.y().expect("uncompressed point has y"))),
        }
    }

    /// Sign an ES256 identity token over the given claims.
    #[must_use]
    pub fn sign_id_token(&self, claims: &serde_json::Value) -> String {
        self.sign_id_token_with_kid(claims, TEST_KEY_ID)
    }

    /// # Panics
    ///
    /// Panics if the claims value cannot be serialized to JSON.
    #[must_use]
    pub fn sign_id_token_with_kid(&self, claims: &serde_json::Value, kid: &str) -> String {
        let header = serde_json::json!({ "alg": "ES256", "typ": "JWT", "kid": kid });

        let header_b64 =
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).expect("serialize header"));
        let payload_b64 =
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).expect("serialize claims"));
        let message = format!("{header_b64}.{payload_b64}");

        // JOSE ES256 signatures are the raw r || s concatenation
        let signature: Signature = self.signing_key.sign(message.as_bytes());
        format!("{message}.{}", URL_SAFE_NO_PAD.encode(signature.to_bytes()))
    }
}

impl Default for TestKey {
    fn default() -> Self {
        Self::new()
    }
}

/// Default settings for tests; callers override individual fields.
#[must_use]
pub fn test_settings() -> Settings {
    Settings::default()
}

/// Claims accepted by a verifier built from [`test_settings`]: matching
/// issuer and audience, ten minutes of validity.
#[must_use]
pub fn test_claims(settings: &Settings) -> serde_json::Value {
    serde_json::json!({
        "iss": settings.provider.issuer_url.clone(),
        "aud": settings.provider.client_id.clone(),
        "exp": Utc::now().timestamp() + 600,
        "iat": Utc::now().timestamp(),
        "sub": "test-user",
    })
}

/// Provider client with pre-resolved local endpoints. The token endpoint
/// points at an unroutable port so an unexpected exchange attempt fails
/// fast instead of hanging.
///
/// # Panics
///
/// Panics if the default settings carry no client ID.
#[must_use]
pub fn test_provider_client(settings: &Settings) -> ProviderClient {
    let issuer = settings.provider.issuer_url.clone();
    ProviderClient::from_endpoints(
        settings,
        &issuer,
        &format!("{issuer}/protocol/openid-connect/auth"),
        "http://127.0.0.1:1/protocol/openid-connect/token",
        "http://127.0.0.1:1/protocol/openid-connect/certs",
    )
    .expect("test settings carry a client ID")
}

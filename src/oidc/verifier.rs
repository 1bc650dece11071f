// Identity-token verification with JWKS fetching and caching.
// Supports RS256 and ES256 signatures and registered-claims validation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use p256::ecdsa::{Signature as EcdsaSignature, VerifyingKey as EcdsaVerifyingKey};
use p256::EncodedPoint;
use rsa::{pkcs1v15::VerifyingKey as RsaVerifyingKey, RsaPublicKey};
use sha2::Sha256;

use crate::errors::AuthError;

/// Tolerated clock drift between this host and the token issuer.
const CLOCK_SKEW_SECONDS: i64 = 300;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("signature verification failed")]
    SignatureInvalid,

    #[error("claim '{claim}' validation failed: expected '{expected}', got '{actual}'")]
    ClaimMismatch {
        claim: String,
        expected: String,
        actual: String,
    },

    #[error("failed to fetch JWKS: {0}")]
    JwksFetchFailed(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("token has expired")]
    TokenExpired,

    #[error("token is not yet valid")]
    TokenNotYetValid,

    #[error("invalid token: {0}")]
    Malformed(String),

    #[error("failed to decode key: {0}")]
    KeyDecodingFailed(String),
}

impl From<VerifyError> for AuthError {
    fn from(err: VerifyError) -> Self {
        Self::InvalidCredential(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct JwtHeader {
    alg: String,
    kid: Option<String>,
}

/// Registered claims decoded from a verified identity token. Carried only
/// as proof of a completed login; no business data is read from them.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    pub iss: Option<String>,
    pub aud: Option<serde_json::Value>,
    pub exp: Option<i64>,
    pub nbf: Option<i64>,
    pub iat: Option<i64>,
    pub sub: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JsonWebKeySet {
    pub keys: Vec<JsonWebKey>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JsonWebKey {
    pub kty: String,
    pub kid: Option<String>,
    pub alg: Option<String>,
    #[serde(rename = "use")]
    pub key_use: Option<String>,

    // RSA keys
    pub n: Option<String>,
    pub e: Option<String>,

    // EC keys
    pub crv: Option<String>,
    pub x: Option<String>,
    pub y: Option<String>,
}

/// Cached provider keys, keyed by key ID, with a bounded lifetime and a
/// backoff window after a failed fetch.
struct JwksCache {
    keys: HashMap<String, JsonWebKey>,
    last_updated: Option<DateTime<Utc>>,
    last_failure: Option<DateTime<Utc>>,
    cache_duration: Duration,
    retry_backoff: Duration,
}

impl JwksCache {
    fn new() -> Self {
        Self {
            keys: HashMap::new(),
            last_updated: None,
            last_failure: None,
            cache_duration: Duration::from_secs(3600),
            retry_backoff: Duration::from_secs(300),
        }
    }

    fn is_valid(&self) -> bool {
        self.last_updated.is_some_and(|updated| {
            let elapsed = Utc::now().signed_duration_since(updated);
            elapsed.to_std().unwrap_or(Duration::MAX) < self.cache_duration
        })
    }

    fn should_retry_fetch(&self) -> bool {
        self.last_failure.is_none_or(|failed| {
            let elapsed = Utc::now().signed_duration_since(failed);
            elapsed.to_std().unwrap_or(Duration::MAX) >= self.retry_backoff
        })
    }

    fn get(&self, kid: &str) -> Option<&JsonWebKey> {
        self.keys.get(kid)
    }

    fn store(&mut self, keys: Vec<JsonWebKey>) {
        self.keys.clear();
        for key in keys {
            if let Some(kid) = key.kid.clone() {
                self.keys.insert(kid, key);
            }
        }
        debug!("cached {} provider keys", self.keys.len());
        self.last_updated = Some(Utc::now());
        self.last_failure = None;
    }

    fn record_fetch_failure(&mut self) {
        self.last_failure = Some(Utc::now());
    }
}

/// Verifies identity tokens against the provider's published keys.
///
/// Stateless apart from the key cache, which is shared across clones and
/// refreshed on expiry or on a miss for an unknown key ID.
pub struct IdTokenVerifier {
    jwks_uri: String,
    expected_issuer: String,
    expected_audience: String,
    cache: Arc<RwLock<JwksCache>>,
}

impl Clone for IdTokenVerifier {
    fn clone(&self) -> Self {
        Self {
            jwks_uri: self.jwks_uri.clone(),
            expected_issuer: self.expected_issuer.clone(),
            expected_audience: self.expected_audience.clone(),
            cache: Arc::clone(&self.cache),
        }
    }
}

impl IdTokenVerifier {
    #[must_use]
    pub fn new(jwks_uri: &str, expected_issuer: &str, expected_audience: &str) -> Self {
        Self {
            jwks_uri: jwks_uri.to_string(),
            expected_issuer: expected_issuer.to_string(),
            expected_audience: expected_audience.to_string(),
            cache: Arc::new(RwLock::new(JwksCache::new())),
        }
    }

    /// Seed the key cache directly, bypassing the JWKS endpoint.
    pub async fn install_keys(&self, keys: Vec<JsonWebKey>) {
        self.cache.write().await.store(keys);
    }

    /// Fetch the provider's JWKS and refresh the cache.
    ///
    /// # Errors
    ///
    /// Returns `VerifyError::JwksFetchFailed` if the fetch is skipped due
    /// to backoff, the request fails, or the body is not a valid key set.
    pub async fn refresh_keys(&self) -> Result<(), VerifyError> {
        if !self.cache.read().await.should_retry_fetch() {
            return Err(VerifyError::JwksFetchFailed(
                "skipping fetch due to recent failure".to_string(),
            ));
        }

        debug!("fetching JWKS from {}", self.jwks_uri);
        match fetch_jwks(&self.jwks_uri).await {
            Ok(jwks) => {
                self.cache.write().await.store(jwks.keys);
                Ok(())
            }
            Err(e) => {
                self.cache.write().await.record_fetch_failure();
                Err(VerifyError::JwksFetchFailed(e))
            }
        }
    }

    /// Verify a raw identity token: signature against the provider keys,
    /// then expiry, issuer, and audience claims.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredential` for every failure mode —
    /// malformed, expired, bad signature, unknown key, or claim mismatch.
    pub async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        Ok(self.verify_inner(token).await?)
    }

    async fn verify_inner(&self, token: &str) -> Result<Claims, VerifyError> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(VerifyError::Malformed("expected three segments".to_string()));
        }

        let header = decode_header(parts[0])?;
        match header.alg.as_str() {
            "RS256" | "ES256" => {}
            alg => return Err(VerifyError::UnsupportedAlgorithm(alg.to_string())),
        }

        let kid = header.kid.as_deref().unwrap_or("default");
        let key = self.public_key(kid).await?;

        verify_signature(&parts, &header.alg, &key)?;

        let claims = decode_claims(parts[1])?;
        self.validate_claims(&claims)?;

        Ok(claims)
    }

    /// Look up a verification key, refreshing the cache when it is stale
    /// or does not know the key ID.
    async fn public_key(&self, kid: &str) -> Result<JsonWebKey, VerifyError> {
        {
            let cache = self.cache.read().await;
            if cache.is_valid() {
                if let Some(key) = cache.get(kid) {
                    return Ok(key.clone());
                }
            }
        }

        self.refresh_keys().await?;

        let cache = self.cache.read().await;
        cache
            .get(kid)
            .cloned()
            .ok_or_else(|| VerifyError::KeyNotFound(kid.to_string()))
    }

    fn validate_claims(&self, claims: &Claims) -> Result<(), VerifyError> {
        let now = Utc::now().timestamp();

        if let Some(exp) = claims.exp {
            if now > exp + CLOCK_SKEW_SECONDS {
                return Err(VerifyError::TokenExpired);
            }
        }
        if let Some(nbf) = claims.nbf {
            if now < nbf - CLOCK_SKEW_SECONDS {
                return Err(VerifyError::TokenNotYetValid);
            }
        }

        if let Some(ref iss) = claims.iss {
            if *iss != self.expected_issuer {
                return Err(VerifyError::ClaimMismatch {
                    claim: "iss".to_string(),
                    expected: self.expected_issuer.clone(),
                    actual: iss.clone(),
                });
            }
        }

        let audiences = claims.aud.as_ref().map(extract_audiences).unwrap_or_default();
        if !audiences.is_empty() && !audiences.iter().any(|aud| *aud == self.expected_audience) {
            return Err(VerifyError::ClaimMismatch {
                claim: "aud".to_string(),
                expected: self.expected_audience.clone(),
                actual: format!("{audiences:?}"),
            });
        }

        Ok(())
    }
}

/// Fetch a JSON Web Key Set from the given URI.
async fn fetch_jwks(jwks_uri: &str) -> Result<JsonWebKeySet, String> {
    let response = reqwest::get(jwks_uri)
        .await
        .map_err(|e| format!("failed to fetch JWKS: {e}"))?;

    if !response.status().is_success() {
        return Err(format!(
            "JWKS request failed with status {}",
            response.status()
        ));
    }

    response
        .json::<JsonWebKeySet>()
        .await
        .map_err(|e| format!("failed to parse JWKS: {e}"))
}

fn decode_segment(segment: &str, what: &str) -> Result<Vec<u8>, VerifyError> {
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| VerifyError::Malformed(format!("invalid {what} encoding: {e}")))
}

fn decode_header(segment: &str) -> Result<JwtHeader, VerifyError> {
    let bytes = decode_segment(segment, "header")?;
    serde_json::from_slice(&bytes)
        .map_err(|e| VerifyError::Malformed(format!("invalid header JSON: {e}")))
}

fn decode_claims(segment: &str) -> Result<Claims, VerifyError> {
    let bytes = decode_segment(segment, "claims")?;
    serde_json::from_slice(&bytes)
        .map_err(|e| VerifyError::Malformed(format!("invalid claims JSON: {e}")))
}

fn verify_signature(parts: &[&str], algorithm: &str, key: &JsonWebKey) -> Result<(), VerifyError> {
    let signing_input = format!("{}.{}", parts[0], parts[1]);
    let signature = decode_segment(parts[2], "signature")?;

    match algorithm {
        "RS256" => verify_rsa_signature(&signing_input, &signature, key),
        "ES256" => verify_ecdsa_signature(&signing_input, &signature, key),
        alg => Err(VerifyError::UnsupportedAlgorithm(alg.to_string())),
    }
}

fn verify_rsa_signature(
    signing_input: &str,
    signature: &[u8],
    key: &JsonWebKey,
) -> Result<(), VerifyError> {
    use rsa::signature::Verifier;

    let n = key
        .n
        .as_ref()
        .ok_or_else(|| VerifyError::KeyDecodingFailed("missing RSA modulus (n)".to_string()))?;
    let e = key
        .e
        .as_ref()
        .ok_or_else(|| VerifyError::KeyDecodingFailed("missing RSA exponent (e)".to_string()))?;

    let n_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(n)
        .map_err(|e| VerifyError::KeyDecodingFailed(format!("invalid modulus encoding: {e}")))?;
    let e_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(e)
        .map_err(|e| VerifyError::KeyDecodingFailed(format!("invalid exponent encoding: {e}")))?;

    let rsa_key = RsaPublicKey::new(
        rsa::BigUint::from_bytes_be(&n_bytes),
        rsa::BigUint::from_bytes_be(&e_bytes),
    )
    .map_err(|e| VerifyError::KeyDecodingFailed(format!("invalid RSA key: {e}")))?;

    let verifying_key = RsaVerifyingKey::<Sha256>::new(rsa_key);
    let signature = rsa::pkcs1v15::Signature::try_from(signature)
        .map_err(|_| VerifyError::SignatureInvalid)?;

    verifying_key
        .verify(signing_input.as_bytes(), &signature)
        .map_err(|_| VerifyError::SignatureInvalid)
}

fn verify_ecdsa_signature(
    signing_input: &str,
    signature: &[u8],
    key: &JsonWebKey,
) -> Result<(), VerifyError> {
    use p256::ecdsa::signature::Verifier;

    let x = key
        .x
        .as_ref()
        .ok_or_else(|| VerifyError::KeyDecodingFailed("missing EC x coordinate".to_string()))?;
    let y = key
        .y
        .as_ref()
        .ok_or_else(|| VerifyError::KeyDecodingFailed("missing EC y coordinate".to_string()))?;

    let x_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(x)
        .map_err(|e| VerifyError::KeyDecodingFailed(format!("invalid x coordinate: {e}")))?;
    let y_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(y)
        .map_err(|e| VerifyError::KeyDecodingFailed(format!("invalid y coordinate: {e}")))?;

    // Uncompressed SEC1 point: 0x04 || x || y
    let mut point_bytes = vec![0x04];
    point_bytes.extend_from_slice(&x_bytes);
    point_bytes.extend_from_slice(&y_bytes);

    let encoded_point = EncodedPoint::from_bytes(&point_bytes)
        .map_err(|e| VerifyError::KeyDecodingFailed(format!("invalid EC point: {e}")))?;
    let verifying_key = EcdsaVerifyingKey::from_encoded_point(&encoded_point)
        .map_err(|e| VerifyError::KeyDecodingFailed(format!("invalid ECDSA key: {e}")))?;

    // JOSE ES256 signatures are the raw r || s concatenation
    let signature =
        EcdsaSignature::from_slice(signature).map_err(|_| VerifyError::SignatureInvalid)?;

    verifying_key
        .verify(signing_input.as_bytes(), &signature)
        .map_err(|_| VerifyError::SignatureInvalid)
}

fn extract_audiences(aud: &serde_json::Value) -> Vec<String> {
    match aud {
        serde_json::Value::String(s) => vec![s.clone()],
        serde_json::Value::Array(values) => values
            .iter()
            .filter_map(|v| v.as_str().map(ToString::to_string))
            .collect(),
        _ => vec![],
    }
}

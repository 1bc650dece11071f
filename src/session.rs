use actix_web::{cookie::Cookie, HttpRequest};
use log::debug;

use crate::errors::AuthError;
use crate::oidc::{Claims, IdTokenVerifier};

/// Cookie carrying the raw identity token.
pub const ID_TOKEN_COOKIE: &str = "id_token";

/// Extract the session credential from the request, if present.
#[must_use]
pub fn credential_from_request(req: &HttpRequest) -> Option<String> {
    req.cookie(ID_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

/// Build the session cookie set at callback time.
///
/// The cookie holds the raw signed token; the token's own `exp` claim
/// bounds its useful life, so no cookie-level expiry is set and nothing
/// is stored server-side.
#[must_use]
pub fn create_session_cookie(id_token: &str) -> Cookie<'static> {
    Cookie::build(ID_TOKEN_COOKIE, id_token.to_owned())
        .path("/")
        .finish()
}

/// Verify the session credential attached to a request.
///
/// # Errors
///
/// Returns `AuthError::InvalidCredential` when the cookie is absent or the
/// token fails the verifier's signature/claims check.
pub async fn verify_session(
    req: &HttpRequest,
    verifier: &IdTokenVerifier,
) -> Result<Claims, AuthError> {
    let Some(token) = credential_from_request(req) else {
        debug!("no {ID_TOKEN_COOKIE} cookie on request");
        return Err(AuthError::InvalidCredential(
            "no identity token in cookie".to_string(),
        ));
    };

    verifier.verify(&token).await
}

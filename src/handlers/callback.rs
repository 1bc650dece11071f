// Authorization callback handler
use actix_web::{web, HttpResponse};
use log::{error, info};

use crate::errors::AuthError;
use crate::oidc::{CallbackParams, ProviderClient};
use crate::session;
use crate::settings::Settings;

/// `GET /demo/callback` — complete the authorization round trip.
///
/// The returned `state` must equal the value issued at redirect time or
/// the request is rejected before any exchange is attempted. A matching
/// state leads to the code exchange; the identity token from the exchange
/// response becomes the session cookie.
///
/// # Errors
///
/// - `AuthError::StateMismatch` (400) when `state` differs from the issued value
/// - `AuthError::TokenExchangeFailed` (500) when the provider rejects the code
/// - `AuthError::MissingIdentityToken` (500) when the response has no `id_token`
pub async fn callback(
    query: web::Query<CallbackParams>,
    provider: web::Data<ProviderClient>,
    settings: web::Data<Settings>,
) -> Result<HttpResponse, AuthError> {
    let params = query.into_inner();

    if params.state.as_deref() != Some(settings.auth.state.as_str()) {
        error!("callback state did not match the issued value");
        return Err(AuthError::StateMismatch);
    }

    // A missing code is exchanged as the empty string and rejected by the
    // provider, surfacing as the same exchange failure.
    let code = params.code.unwrap_or_default();
    let tokens = provider.exchange_code(&code).await.map_err(|e| {
        error!("token exchange failed: {e}");
        e
    })?;

    let id_token = tokens.id_token.ok_or(AuthError::MissingIdentityToken)?;
    info!("authorization round trip completed, establishing session");

    Ok(HttpResponse::Found()
        .cookie(session::create_session_cookie(&id_token))
        .append_header(("Location", "/hello"))
        .finish())
}

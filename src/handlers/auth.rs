// Entry-point handler: route the browser into or past the login flow
use actix_web::{web, HttpRequest, HttpResponse};

use crate::oidc::ProviderClient;
use crate::session::ID_TOKEN_COOKIE;
use crate::settings::Settings;

use super::found;

/// `GET /` — with a session cookie present, continue to the landing page;
/// otherwise start the authorization round trip at the provider.
///
/// Only cookie presence is checked here. The landing page re-verifies the
/// credential on every request, so a stale or forged cookie just bounces
/// back through this redirect.
pub async fn index(
    req: HttpRequest,
    provider: web::Data<ProviderClient>,
    settings: web::Data<Settings>,
) -> HttpResponse {
    if req.cookie(ID_TOKEN_COOKIE).is_some() {
        return found("/hello");
    }

    found(&provider.authorization_url(&settings.auth.state))
}

// Landing-page handlers: the order form and the submit pipeline
use actix_web::{web, HttpRequest, HttpResponse};
use log::{error, info, warn};
use serde::Deserialize;
use std::path::Path;

use crate::errors::PipelineError;
use crate::oidc::IdTokenVerifier;
use crate::order;
use crate::publisher::OrderPublisher;
use crate::session;
use crate::settings::Settings;

use super::{found, pages};

#[derive(Deserialize)]
pub struct OrderForm {
    pub id: String,
}

/// `GET /hello` — render the order form for a verified session.
pub async fn order_page(
    req: HttpRequest,
    verifier: web::Data<IdTokenVerifier>,
    settings: web::Data<Settings>,
) -> HttpResponse {
    if let Err(e) = session::verify_session(&req, &verifier).await {
        warn!("session verification failed: {e}");
        return found("/");
    }

    pages::order_form(&settings)
}

/// `POST /hello` — run the submit pipeline for a verified session:
/// load the baseline record, stamp it with the submitted identifier,
/// serialize, publish, then render the form again.
///
/// # Errors
///
/// Every pipeline failure (form parse, load, serialize, publish) aborts
/// the request with a 500 and a generic message; nothing is persisted, so
/// there is no partial state to unwind.
pub async fn submit_order(
    req: HttpRequest,
    form: Option<web::Form<OrderForm>>,
    verifier: web::Data<IdTokenVerifier>,
    settings: web::Data<Settings>,
    publisher: web::Data<dyn OrderPublisher>,
) -> Result<HttpResponse, PipelineError> {
    if let Err(e) = session::verify_session(&req, &verifier).await {
        warn!("session verification failed: {e}");
        return Ok(found("/"));
    }

    let form = form.ok_or(PipelineError::FormParse)?;

    let record = order::load_and_stamp(Path::new(&settings.order.source_path), &form.id)
        .map_err(|e| {
            error!("order load failed: {e}");
            PipelineError::from(e)
        })?;

    let payload = serde_json::to_vec(&record).map_err(|e| {
        error!("order serialization failed: {e}");
        PipelineError::from(e)
    })?;

    publisher.publish(&payload).await.map_err(|e| {
        error!("order publish failed: {e}");
        PipelineError::from(e)
    })?;

    info!("sent message with id: {}", record.order_uid);

    Ok(pages::order_form(&settings))
}

#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use actix_web::{middleware::Logger, web, App, HttpServer};
use std::sync::Arc;

use ordergate::{
    handlers::{callback, health, index, order_page, submit_order},
    oidc::{IdTokenVerifier, ProviderClient},
    publisher::{NatsPublisher, OrderPublisher},
    settings::Settings,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load configuration from Settings.toml and environment variables.
    // This also loads .env and initializes the logger.
    let settings = Settings::load()
        .map_err(|e| std::io::Error::other(format!("Failed to load settings: {e}")))?;

    // Resolve provider endpoints once; they are read-only afterwards
    let provider = ProviderClient::discover(&settings)
        .await
        .map_err(|e| std::io::Error::other(format!("Failed to resolve identity provider: {e}")))?;

    let verifier = IdTokenVerifier::new(
        &provider.jwks_uri,
        &provider.issuer_url,
        provider.client_id(),
    );
    if let Err(e) = verifier.refresh_keys().await {
        log::warn!("could not prefetch provider keys, retrying on first verification: {e}");
    }

    // The anti-forgery value is a pre-shared constant, not a per-flow
    // nonce; a captured callback URL stays replayable.
    log::warn!(
        "auth.state is a fixed value shared by every authorization round trip"
    );

    let publisher: Arc<dyn OrderPublisher> = Arc::new(NatsPublisher::new(settings.broker.clone()));

    start_server(settings, provider, verifier, publisher).await
}

/// Start the HTTP server with process-wide state shared across workers
///
/// # Errors
///
/// Returns an error if server binding fails or the server fails to start
async fn start_server(
    settings: Settings,
    provider: ProviderClient,
    verifier: IdTokenVerifier,
    publisher: Arc<dyn OrderPublisher>,
) -> std::io::Result<()> {
    let bind_address = settings.get_bind_address();
    print_startup_info(&bind_address, &settings);

    let publisher = web::Data::from(publisher);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(settings.clone()))
            .app_data(web::Data::new(provider.clone()))
            .app_data(web::Data::new(verifier.clone()))
            .app_data(publisher.clone())
            .wrap(Logger::default())
            .configure(configure_services)
    })
    .bind(&bind_address)?
    .run()
    .await
}

fn configure_services(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/hello", web::get().to(order_page))
        .route("/hello", web::post().to(submit_order))
        .route("/demo/callback", web::get().to(callback))
        .route("/ping", web::get().to(health));
}

fn print_startup_info(bind_address: &str, settings: &Settings) {
    println!("Starting ordergate on http://{bind_address}");
    println!();
    println!("Endpoints:");
    println!("  GET      /              - Session check / login redirect");
    println!("  GET|POST /hello         - Order form and submit pipeline");
    println!("  GET      /demo/callback - Authorization callback");
    println!("  GET      /ping          - Health check");
    println!();
    println!("Identity provider issuer: {}", settings.provider.issuer_url);
    println!(
        "Broker: {} (cluster {}, client {}), topic {}",
        settings.broker.url,
        settings.broker.cluster_id,
        settings.broker.client_id,
        settings.broker.topic
    );
    println!("Order baseline: {}", settings.order.source_path);
}

// HTTP request handlers for the order bridge
pub mod auth;
pub mod callback;
pub mod order;
pub mod pages;

// Re-export the main handler functions
pub use auth::index;
pub use callback::callback;
pub use order::{order_page, submit_order};
pub use pages::health;

use actix_web::HttpResponse;

/// 302 redirect to the given location.
#[must_use]
pub(crate) fn found(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .append_header(("Location", location.to_owned()))
        .finish()
}

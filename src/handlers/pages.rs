use actix_web::HttpResponse;
use std::fs;

use crate::settings::Settings;

/// Form template compiled into the binary; a malformed template is a
/// build-time problem, never a request-time one.
const DEFAULT_ORDER_FORM: &str = include_str!("../static/order.html");

/// Health check endpoint
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "message": "ordergate is running",
    }))
}

/// Render the order form, preferring an override from the assets folder
/// over the embedded template.
#[must_use]
pub fn order_form(settings: &Settings) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(order_form_html(settings))
}

fn order_form_html(settings: &Settings) -> String {
    let override_path = format!("{}/order.html", settings.static_files.assets_folder);
    fs::read_to_string(&override_path).unwrap_or_else(|_| DEFAULT_ORDER_FORM.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_template_has_the_submit_form() {
        assert!(DEFAULT_ORDER_FORM.contains(r#"<form action="/hello" method="post">"#));
        assert!(DEFAULT_ORDER_FORM.contains(r#"name="id""#));
    }

    #[test]
    fn test_missing_override_falls_back_to_embedded() {
        let mut settings = Settings::default();
        settings.static_files.assets_folder = "/nonexistent".to_string();
        assert_eq!(order_form_html(&settings), DEFAULT_ORDER_FORM);
    }
}

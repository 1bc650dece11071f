// Integration tests for the submit pipeline: load, stamp, serialize,
// publish, and the all-or-nothing failure behavior.
use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use chrono::{DateTime, Utc};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

use ordergate::handlers::{order_page, submit_order};
use ordergate::oidc::IdTokenVerifier;
use ordergate::publisher::OrderPublisher;
use ordergate::session::create_session_cookie;
use ordergate::settings::Settings;
use ordergate::testing::{
    test_claims, test_settings, FailingPublisher, RecordingPublisher, TestKey,
};

struct Pipeline {
    settings: Settings,
    verifier: IdTokenVerifier,
    key: TestKey,
    _baseline: Option<NamedTempFile>,
}

impl Pipeline {
    /// Settings pointing at a temp baseline file, plus a verifier seeded
    /// with the test key so signed tokens pass the session check.
    async fn new(baseline: &str) -> Self {
        let mut file = NamedTempFile::new().expect("create baseline");
        file.write_all(baseline.as_bytes()).expect("write baseline");

        let mut settings = test_settings();
        settings.order.source_path = file.path().to_string_lossy().into_owned();

        Self {
            verifier: seeded_verifier(&settings).await,
            settings,
            key: TestKey::new(),
            _baseline: Some(file),
        }
    }

    /// Settings pointing at a path that does not exist.
    async fn without_baseline() -> Self {
        let mut settings = test_settings();
        settings.order.source_path = "/nonexistent/ord.json".to_string();

        Self {
            verifier: seeded_verifier(&settings).await,
            settings,
            key: TestKey::new(),
            _baseline: None,
        }
    }

    fn session_token(&self) -> String {
        self.key.sign_id_token(&test_claims(&self.settings))
    }
}

async fn seeded_verifier(settings: &Settings) -> IdTokenVerifier {
    let verifier = IdTokenVerifier::new(
        "http://127.0.0.1:1/certs",
        &settings.provider.issuer_url,
        "confidential-client",
    );
    verifier.install_keys(vec![TestKey::new().jwk()]).await;
    verifier
}

macro_rules! init_app {
    ($pipeline:expr, $publisher:expr) => {{
        let publisher: Arc<dyn OrderPublisher> = $publisher;
        test::init_service(
            App::new()
                .app_data(web::Data::new($pipeline.settings.clone()))
                .app_data(web::Data::new($pipeline.verifier.clone()))
                .app_data(web::Data::from(publisher))
                .route("/hello", web::get().to(order_page))
                .route("/hello", web::post().to(submit_order)),
        )
        .await
    }};
}

#[actix_web::test]
async fn submitted_identifier_is_published_exactly_once() {
    let pipeline = Pipeline::new(r#"{"order_uid":"X","other":"Y"}"#).await;
    let recorder = Arc::new(RecordingPublisher::new());
    let app = init_app!(pipeline, Arc::clone(&recorder) as Arc<dyn OrderPublisher>);

    let before = Utc::now();
    let req = test::TestRequest::post()
        .uri("/hello")
        .cookie(create_session_cookie(&pipeline.session_token()))
        .set_form([("id", "abc123")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    let after = Utc::now();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    assert!(std::str::from_utf8(&body).unwrap().contains("<form"));

    let messages = recorder.messages();
    assert_eq!(messages.len(), 1);

    let published: serde_json::Value = serde_json::from_slice(&messages[0]).unwrap();
    assert_eq!(published["order_uid"], "abc123");
    assert_eq!(published["other"], "Y");

    let stamped: DateTime<Utc> = published["date_created"]
        .as_str()
        .expect("date_created is a string")
        .parse()
        .expect("date_created parses as a timestamp");
    assert!(stamped >= before && stamped <= after);
}

#[actix_web::test]
async fn baseline_fields_pass_through_to_the_published_message() {
    let pipeline = Pipeline::new(
        r#"{"order_uid":"X","date_created":"2021-11-26T06:22:19Z","items":[{"name":"widget","qty":2}],"customer":"acme"}"#,
    )
    .await;
    let recorder = Arc::new(RecordingPublisher::new());
    let app = init_app!(pipeline, Arc::clone(&recorder) as Arc<dyn OrderPublisher>);

    let req = test::TestRequest::post()
        .uri("/hello")
        .cookie(create_session_cookie(&pipeline.session_token()))
        .set_form([("id", "ord-77")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let published: serde_json::Value =
        serde_json::from_slice(&recorder.messages()[0]).unwrap();
    assert_eq!(published["order_uid"], "ord-77");
    assert_eq!(published["items"][0]["name"], "widget");
    assert_eq!(published["items"][0]["qty"], 2);
    assert_eq!(published["customer"], "acme");
    assert_ne!(published["date_created"], "2021-11-26T06:22:19Z");
}

#[actix_web::test]
async fn unreachable_broker_returns_500_and_publishes_nothing() {
    let pipeline = Pipeline::new(r#"{"order_uid":"X"}"#).await;
    let app = init_app!(pipeline, Arc::new(FailingPublisher::connect_refused()));

    let req = test::TestRequest::post()
        .uri("/hello")
        .cookie(create_session_cookie(&pipeline.session_token()))
        .set_form([("id", "abc123")])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = test::read_body(resp).await;
    assert_eq!(body, "Error publishing order");
}

#[actix_web::test]
async fn rejected_publish_returns_500() {
    let pipeline = Pipeline::new(r#"{"order_uid":"X"}"#).await;
    let app = init_app!(pipeline, Arc::new(FailingPublisher::rejected()));

    let req = test::TestRequest::post()
        .uri("/hello")
        .cookie(create_session_cookie(&pipeline.session_token()))
        .set_form([("id", "abc123")])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn missing_baseline_returns_500_and_publishes_nothing() {
    let pipeline = Pipeline::without_baseline().await;
    let recorder = Arc::new(RecordingPublisher::new());
    let app = init_app!(pipeline, Arc::clone(&recorder) as Arc<dyn OrderPublisher>);

    let req = test::TestRequest::post()
        .uri("/hello")
        .cookie(create_session_cookie(&pipeline.session_token()))
        .set_form([("id", "abc123")])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = test::read_body(resp).await;
    assert_eq!(body, "Error loading order");
    assert!(recorder.messages().is_empty());
}

#[actix_web::test]
async fn submit_without_form_body_returns_500() {
    let pipeline = Pipeline::new(r#"{"order_uid":"X"}"#).await;
    let recorder = Arc::new(RecordingPublisher::new());
    let app = init_app!(pipeline, Arc::clone(&recorder) as Arc<dyn OrderPublisher>);

    let req = test::TestRequest::post()
        .uri("/hello")
        .cookie(create_session_cookie(&pipeline.session_token()))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = test::read_body(resp).await;
    assert_eq!(body, "Error parsing form");
    assert!(recorder.messages().is_empty());
}

#[actix_web::test]
async fn expired_session_redirects_home_and_publishes_nothing() {
    let pipeline = Pipeline::new(r#"{"order_uid":"X"}"#).await;
    let recorder = Arc::new(RecordingPublisher::new());
    let app = init_app!(pipeline, Arc::clone(&recorder) as Arc<dyn OrderPublisher>);

    let mut claims = test_claims(&pipeline.settings);
    claims["exp"] = serde_json::json!(Utc::now().timestamp() - 3600);
    let token = pipeline.key.sign_id_token(&claims);

    let req = test::TestRequest::post()
        .uri("/hello")
        .cookie(create_session_cookie(&token))
        .set_form([("id", "abc123")])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert!(recorder.messages().is_empty());
}

#[actix_web::test]
async fn landing_page_renders_form_for_valid_session() {
    let pipeline = Pipeline::new(r#"{"order_uid":"X"}"#).await;
    let app = init_app!(pipeline, Arc::new(RecordingPublisher::new()));

    let req = test::TestRequest::get()
        .uri("/hello")
        .cookie(create_session_cookie(&pipeline.session_token()))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    let html = std::str::from_utf8(&body).unwrap();
    assert!(html.contains(r#"<form action="/hello" method="post">"#));
    assert!(html.contains(r#"name="id""#));
}

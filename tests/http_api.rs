use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;
use uuid::Uuid;

use industrial_storefront::api::{router, AppState};
use industrial_storefront::config::Config;
use industrial_storefront::mail::RecordingMailer;
use industrial_storefront::quoting::{EventPublisher, MemoryProductCatalog, MemoryQuoteRepository, QuoteService, QuoteSettings};
use industrial_storefront::rate_limit::RateLimiter;
use industrial_storefront::redirects::{MemoryRedirectStore, RedirectService};
use industrial_storefront::storage::MemoryDocumentStore;

/// Router over in-memory quote and redirect stores. The pool never connects.
fn app() -> (Router, Arc<RecordingMailer>) {
    let config = Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some("postgres://localhost/storefront_test".into()),
        "QUOTE_RATE_LIMIT_PER_MINUTE" => Some("2".into()),
        "BUSINESS_NAME" => Some("Acme Pumps".into()),
        _ => None,
    })
    .unwrap();
    let db = PgPoolOptions::new().connect_lazy(&config.database_url).unwrap();
    let mailer = Arc::new(RecordingMailer::default());
    let quotes = QuoteService::new(
        Arc::new(MemoryQuoteRepository::default()),
        Arc::new(MemoryProductCatalog::default()),
        Arc::new(MemoryDocumentStore::default()),
        mailer.clone(),
        EventPublisher::default(),
        QuoteSettings::from_config(&config),
    );
    let state = AppState {
        db,
        config: Arc::new(config),
        quotes: Arc::new(quotes),
        redirects: RedirectService::new(Arc::new(MemoryRedirectStore::default()), Duration::from_secs(60)),
        rate_limiter: Arc::new(RateLimiter::default()),
        events: EventPublisher::default(),
        mailer: mailer.clone(),
    };
    (router(state), mailer)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn get(uri: &str) -> Request<Body> { Request::builder().uri(uri).body(Body::empty()).unwrap() }

fn post(uri: &str, body: &Value, ip: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", ip)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn quote_form() -> Value {
    json!({
        "name": "Jane Citizen",
        "email": "jane@example.com",
        "phone": "0400 000 000",
        "deliveryAddress": {"street": "1 Pipe St", "suburb": "Welshpool", "state": "WA", "postcode": "6106"},
        "items": [{"id": Uuid::new_v4(), "name": "Gate Valve", "sku": "GV-1", "brand": "Bermad", "quantity": 3}]
    })
}

#[tokio::test]
async fn health_and_shipping() {
    let (app, _) = app();
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, get("/api/shipping/classify?postcode=6050")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["zone"], "metro");
    assert_eq!(body["shipping"]["message"], "Free delivery to Perth");

    let (_, body) = send(&app, get("/api/admin/logistics/regions")).await;
    assert!(body.as_array().is_some_and(|regions| regions.iter().any(|r| r["name"] == "Darwin")));
}

#[tokio::test]
async fn quote_form_is_rate_limited_per_client() {
    let (app, mailer) = app();
    for _ in 0..2 {
        let (status, body) = send(&app, post("/api/quote", &quote_form(), "203.0.113.9")).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert!(body["quoteNumber"].as_str().is_some_and(|n| n.starts_with("Q-")));
    }
    let (status, body) = send(&app, post("/api/quote", &quote_form(), "203.0.113.9, 10.0.0.1")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "Too many requests. Please try again later.");
    let (status, _) = send(&app, post("/api/quote", &quote_form(), "198.51.100.4")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(mailer.sent().await.len(), 6);
}

#[tokio::test]
async fn quote_form_validation_and_unknown_tokens() {
    let (app, _) = app();
    let mut form = quote_form();
    form["items"] = json!([]);
    let (status, body) = send(&app, post("/api/quote", &form, "192.0.2.1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some_and(|e| e.contains("items")));

    let (status, body) = send(&app, post("/api/approve-quote/not-a-token", &json!({}), "192.0.2.1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Invalid token");
}

#[tokio::test]
async fn redirects_are_served_before_routing() {
    let (app, _) = app();
    let body = json!({"fromPath": "/Products/Old-Valve/", "toPath": "/products/gate-valve"});
    let (status, created) = send(&app, post("/api/admin/redirects", &body, "192.0.2.1")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["fromPath"], "/products/old-valve");
    assert_eq!(created["statusCode"], 301);

    let (status, body) = send(&app, post("/api/admin/redirects", &json!({"fromPath": "/products/old-valve", "toPath": "/x"}), "192.0.2.1")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "A redirect from this path already exists");

    let resp = app.clone().oneshot(get("/products/old-valve")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(resp.headers()[header::LOCATION], "/products/gate-valve");

    let (_, listed) = send(&app, get("/api/admin/redirects")).await;
    assert_eq!(listed[0]["hitCount"], 1);

    let (status, body) = send(&app, get("/products/never-existed")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Page not found");

    let (status, _) = send(&app, post("/api/admin/redirects", &json!({"fromPath": "/a", "toPath": "/a/"}), "192.0.2.1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn contact_form_mails_sales_and_sender() {
    let (app, mailer) = app();
    let form = json!({"name": "Sam", "email": "sam@mine.test", "company": "Pilbara Iron", "message": "Need <b>40</b> valves"});
    let (status, body) = send(&app, post("/api/contact", &form, "203.0.113.20")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));

    let sent = mailer.sent().await;
    assert_eq!(sent.len(), 2);
    let sales = sent.iter().find(|m| m.subject == "Contact Form: Sam from Pilbara Iron").unwrap();
    assert_eq!(sales.reply_to.as_deref(), Some("sam@mine.test"));
    assert!(sales.html.contains("Need &lt;b&gt;40&lt;/b&gt; valves"));
    assert!(sent.iter().any(|m| m.to == "sam@mine.test" && m.subject == "Thank you for contacting Acme Pumps"));

    let (status, body) = send(&app, post("/api/contact", &json!({"name": "Sam", "email": "sam@mine.test"}), "203.0.113.20")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Name, email, and message are required");

    let (status, _) = send(&app, post("/api/contact", &form, "203.0.113.20")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    let (status, _) = send(&app, post("/api/quote", &quote_form(), "203.0.113.20")).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn admin_badges_and_short_searches() {
    let (app, _) = app();
    let (status, body) = send(&app, get("/api/admin/stats/badges")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"quotes": 0}));

    send(&app, post("/api/quote", &quote_form(), "203.0.113.30")).await;
    let (_, body) = send(&app, get("/api/admin/stats/badges")).await;
    assert_eq!(body["quotes"], 1);

    for uri in ["/api/admin/search", "/api/admin/search?q=Q", "/api/admin/search?q=%20x%20"] {
        let (status, body) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"results": []}));
    }
}

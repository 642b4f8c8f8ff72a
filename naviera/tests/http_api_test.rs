//! End-to-end HTTP tests over the full router with in-memory backends.
//!
//! Run with: `cargo test --test http_api_test`

#![allow(clippy::unwrap_used)]

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use naviera::auth::{MemorySessionStore, PasswordHasher, SessionId, SessionStore};
use naviera::bootstrap::ensure_staff_account;
use naviera::catalog::Catalog;
use naviera::config::BootstrapConfig;
use naviera::mail::RecordingMailer;
use naviera::seed::{demo_fleet, DemoFleet};
use naviera::storage::Storage;
use naviera::{build_router, AppState, Config};
use naviera_core::environment::Clock;
use naviera_testing::test_clock;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const PASSWORD: &str = "Harbour-Light-42";

struct App {
    router: Router,
    mailer: RecordingMailer,
    sessions: Arc<MemorySessionStore>,
    fleet: DemoFleet,
}

async fn app() -> App {
    let clock: Arc<dyn Clock> = Arc::new(test_clock());
    let storage = Storage::memory();
    let fleet = demo_fleet(&Catalog::new(&storage), clock.today()).await.unwrap();

    let mut config = Config::default();
    config.sessions.bcrypt_cost = 4;
    let staff = BootstrapConfig {
        admin_username: Some("purser".to_string()),
        admin_email: Some("purser@naviera.test".to_string()),
        admin_password: Some(PASSWORD.to_string()),
        seed_demo_catalog: false,
    };
    ensure_staff_account(&storage, PasswordHasher::new(4), &staff, clock.as_ref())
        .await
        .unwrap();

    let mailer = RecordingMailer::new();
    let sessions = Arc::new(MemorySessionStore::new(clock.clone()));
    let state = AppState::new(storage, sessions.clone(), Arc::new(mailer.clone()), clock, &config);
    App {
        router: build_router(state),
        mailer,
        sessions,
        fleet,
    }
}

async fn call(app: &App, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn login(app: &App, username: &str) -> String {
    let (status, body) = call(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": username, "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["token"].as_str().unwrap().to_string()
}

/// Register, log in and fill the client profile.
async fn customer(app: &App, username: &str, dni: &str) -> String {
    let (status, body) = call(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "username": username,
            "first_name": "Lucía",
            "last_name": "Pereyra",
            "email": format!("{username}@example.com"),
            "password1": PASSWORD,
            "password2": PASSWORD,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let token = login(app, username).await;
    let (status, body) = call(
        app,
        Method::POST,
        "/api/account/client",
        Some(&token),
        Some(json!({
            "first_name": "Lucía",
            "last_name": "Pereyra",
            "dni": dni,
            "nationality": "Argentina",
            "gender": "female",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    token
}

#[tokio::test]
async fn customer_books_through_the_wizard() {
    let app = app().await;
    let token = customer(&app, "lucia", "AR-30111222").await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/booking/step1",
        Some(&token),
        Some(json!({
            "voyage_ship_id": app.fleet.patagonia_leg,
            "cabin_type_id": app.fleet.balcony,
            "passenger_count": 2,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["step"], "register_passengers");

    let passengers = json!({
        "passengers": [
            { "first_name": "Lucía", "last_name": "Pereyra", "dni": "AR-30111222",
              "birth_date": "1988-07-21", "nationality": "Argentina", "gender": "female" },
            { "first_name": "Tomás", "last_name": "Pereyra", "dni": "AR-30111223",
              "birth_date": "1986-02-09", "nationality": "Argentina", "gender": "male" },
        ]
    });
    let (status, body) = call(&app, Method::POST, "/api/booking/step2", Some(&token), Some(passengers)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["step"], "confirm");

    let (status, body) = call(&app, Method::POST, "/api/booking/confirm", Some(&token), None).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["reservation"]["status"], "confirmed");
    let reservation_id = body["reservation"]["id"].as_str().unwrap().to_string();

    let (status, body) = call(&app, Method::GET, "/api/booking", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["step"], "select_cabin");

    let (status, body) = call(&app, Method::GET, "/api/account/reservations", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let listed = body.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], reservation_id.as_str());
    assert_eq!(listed[0]["ship_name"], "Aurora Austral");
    assert!(!listed[0]["voyage_name"].as_str().unwrap().is_empty());
    assert!(listed[0]["cabin_number"].is_string());
    assert_eq!(listed[0]["client_name"], "Lucía Pereyra");
}

#[tokio::test]
async fn confirming_without_passengers_is_a_bad_request() {
    let app = app().await;
    let token = customer(&app, "mateo", "AR-27000111").await;

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/booking/step1",
        Some(&token),
        Some(json!({
            "voyage_ship_id": app.fleet.delta_leg,
            "cabin_type_id": app.fleet.inside,
            "passenger_count": 1,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&app, Method::POST, "/api/booking/confirm", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn account_pages_need_a_session() {
    let app = app().await;
    let (status, _) = call(&app, Method::GET, "/api/account", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&app, Method::GET, "/api/account", Some("not-a-session"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logging_out_ends_the_session() {
    let app = app().await;
    let token = customer(&app, "valen", "AR-40111000").await;

    let (status, body) = call(&app, Method::GET, "/api/account", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "valen");

    let (status, _) = call(&app, Method::POST, "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, Method::GET, "/api/account", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn back_office_is_staff_only() {
    let app = app().await;
    let customer_token = customer(&app, "joaquin", "UY-4500123").await;
    let (status, _) = call(&app, Method::GET, "/api/admin/ships", Some(&customer_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let staff_token = login(&app, "purser").await;
    let (status, body) = call(&app, Method::GET, "/api/admin/ships", Some(&staff_token), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["total"], 2);

    let (status, body) = call(&app, Method::GET, "/api/admin/users?is_staff=false", Some(&staff_token), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[tokio::test]
async fn duplicate_registration_reports_the_field() {
    let app = app().await;
    customer(&app, "sofia", "AR-35111999").await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "username": "sofia",
            "first_name": "Sofía",
            "last_name": "Ibarra",
            "email": "other@example.com",
            "password1": PASSWORD,
            "password2": PASSWORD,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body.to_string().contains("username"), "{body}");
}

#[tokio::test]
async fn contact_form_is_forwarded_by_mail() {
    let app = app().await;
    let (status, _) = call(
        &app,
        Method::POST,
        "/api/contact",
        None,
        Some(json!({
            "name": "Ana Gómez",
            "email": "ana@example.com",
            "subject": "Group booking",
            "message": "We are twelve people travelling in March.",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let sent = app.mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].reply_to.as_deref(), Some("ana@example.com"));
    assert!(sent[0].subject.contains("Group booking"));
    assert!(sent[0].body.contains("Reference: "));
}

#[tokio::test]
async fn responses_carry_the_correlation_id() {
    let app = app().await;
    let sent = "6f1d8a52-3c1e-4b7a-9a3e-2d1c0b9e8f71";
    let request = Request::builder()
        .uri("/health")
        .header("X-Correlation-ID", sent)
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["X-Correlation-ID"], sent);

    let request = Request::builder()
        .uri("/health")
        .header("X-Correlation-ID", "order-42")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    let replaced = response.headers()["X-Correlation-ID"].to_str().unwrap();
    assert_ne!(replaced, "order-42");
    assert!(uuid::Uuid::parse_str(replaced).is_ok());
}

#[tokio::test]
async fn public_pages_and_probes_answer() {
    let app = app().await;
    for uri in ["/health", "/ready", "/api/home", "/api/destinations", "/api/offers", "/api/ships"] {
        let (status, _) = call(&app, Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
    }
}

#[tokio::test]
async fn catalog_lists_search_filter_and_page() {
    let app = app().await;
    let staff = login(&app, "purser").await;

    // Nine cabins across both ships; only Aurora's 201 and 202 contain "20".
    let (status, body) = call(&app, Method::GET, "/api/admin/cabins?q=20", Some(&staff), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["total"], 2);
    let numbers: Vec<&str> = body["items"].as_array().unwrap().iter().map(|c| c["number"].as_str().unwrap()).collect();
    assert!(numbers.iter().all(|n| n.starts_with("20")), "{numbers:?}");

    // Five inside cabins: 101-103 on Aurora, 101-102 on Estrella.
    let inside = format!("/api/admin/cabins?filter.cabin_type_id={}", app.fleet.inside);
    let (_, body) = call(&app, Method::GET, &inside, Some(&staff), None).await;
    assert_eq!(body["total"], 5);
    assert_eq!(body["page"], 1);
    assert_eq!(body["items"].as_array().unwrap().len(), 5);

    let (_, body) = call(&app, Method::GET, &format!("{inside}&per_page=2&page=3"), Some(&staff), None).await;
    assert_eq!(body["total"], 5);
    assert_eq!(body["page"], 3);
    assert_eq!(body["per_page"], 2);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);

    let (_, body) = call(
        &app,
        Method::GET,
        "/api/admin/cabins?q=103&filter.status=maintenance",
        Some(&staff),
        None,
    )
    .await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["status"], "maintenance");

    let (status, _) = call(&app, Method::GET, "/api/admin/cabins?per_page=lots", Some(&staff), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

async fn user_id(app: &App, token: &str) -> String {
    let (status, body) = call(app, Method::GET, "/api/account", Some(token), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["user"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn deactivating_an_account_ends_its_sessions() {
    let app = app().await;
    let customer_token = customer(&app, "bruno", "AR-28999000").await;
    let customer_id = user_id(&app, &customer_token).await;
    let staff = login(&app, "purser").await;

    let (status, body) = call(
        &app,
        Method::PUT,
        &format!("/api/admin/users/{customer_id}"),
        Some(&staff),
        Some(json!({ "is_staff": false, "is_active": false, "role_id": null })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["is_active"], false);

    let (status, _) = call(&app, Method::GET, "/api/account", Some(&customer_token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": "bruno", "password": PASSWORD })),
    )
    .await;
    assert_ne!(status, StatusCode::OK);
}

#[tokio::test]
async fn staff_cannot_remove_their_own_access() {
    let app = app().await;
    let staff = login(&app, "purser").await;
    let own_id = user_id(&app, &staff).await;

    for update in [
        json!({ "is_staff": false, "is_active": true, "role_id": null }),
        json!({ "is_staff": true, "is_active": false, "role_id": null }),
    ] {
        let (status, body) = call(
            &app,
            Method::PUT,
            &format!("/api/admin/users/{own_id}"),
            Some(&staff),
            Some(update),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    }

    let (status, _) = call(&app, Method::GET, "/api/admin/ships", Some(&staff), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn an_abandoned_wizard_is_discarded_on_return() {
    let app = app().await;
    let token = customer(&app, "rocio", "AR-33444555").await;
    let (status, _) = call(
        &app,
        Method::POST,
        "/api/booking/step1",
        Some(&token),
        Some(json!({
            "voyage_ship_id": app.fleet.patagonia_leg,
            "cabin_type_id": app.fleet.inside,
            "passenger_count": 1,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Two hours without touching the wizard, past the 30 minute limit.
    let id: SessionId = token.parse().unwrap();
    let mut session = app.sessions.get(id).await.unwrap();
    let wizard = session.wizard.as_mut().unwrap();
    wizard.updated_at -= chrono::Duration::hours(2);
    app.sessions.update(&session).await.unwrap();

    let (status, body) = call(&app, Method::GET, "/api/booking", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["step"], "select_cabin");
    assert!(app.sessions.get(id).await.unwrap().wizard.is_none());

    let (status, _) = call(&app, Method::POST, "/api/booking/confirm", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

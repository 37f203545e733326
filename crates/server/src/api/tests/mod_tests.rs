use super::*;
use axum::{
    body::{self, Body},
    http::Request,
};
use notifier::LogDispatcher;
use reservations::ApiContext;
use serde_json::{json, Value};
use shared::domain::{MenuCategory, MenuItemId, NewMenuItem, ReservationStatus};
use storage::Storage;
use tower::ServiceExt;

use crate::auth::AuthConfig;

struct TestApp {
    router: Router,
    garlic_bread: MenuItemId,
    lasagne: MenuItemId,
}

async fn add_item(
    storage: &Storage,
    name: &str,
    price_cents: i64,
    category: MenuCategory,
) -> MenuItemId {
    storage
        .insert_menu_item(&NewMenuItem {
            name: name.to_string(),
            description: None,
            price_cents,
            category,
            image_url: None,
            is_spicy: false,
        })
        .await
        .expect("menu item")
}

async fn test_app_with_cors(cors_origin: Option<&str>) -> TestApp {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .create_admin("host", "correct horse")
        .await
        .expect("admin");
    let lasagne = add_item(&storage, "Lasagne", 1350, MenuCategory::Mains).await;
    let garlic_bread = add_item(&storage, "Garlic bread", 450, MenuCategory::Starters).await;

    let ctx = ApiContext::new(
        Arc::new(storage.clone()),
        Arc::new(LogDispatcher::new("Test Deli")),
    );
    let state = AppState {
        ctx,
        storage,
        auth: AuthConfig {
            jwt_secret: "route-secret".into(),
            token_ttl_minutes: 30,
        },
        require_seating_area: false,
    };
    TestApp {
        router: build_router(Arc::new(state), cors_origin).expect("router"),
        garlic_bread,
        lasagne,
    }
}

async fn test_app() -> TestApp {
    test_app_with_cors(None).await
}

fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request")
}

async fn read_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

async fn sign_in(app: &TestApp) -> String {
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/token",
            None,
            json!({ "username": "host", "password": "correct horse" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["token_type"], "bearer");
    body["access_token"].as_str().expect("token").to_string()
}

fn booking(items: Value) -> Value {
    json!({
        "date": "2024-06-01",
        "time": "18:30",
        "guests": 4,
        "name": "Ada Lovelace",
        "email": "ada@example.com",
        "phone": "555-0100",
        "table_number": 3,
        "items": items,
    })
}

async fn book(app: &TestApp, items: Value) -> i64 {
    let response = app
        .router
        .clone()
        .oneshot(json_request(Method::POST, "/reservations", None, booking(items)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    assert_eq!(body["reservation"]["status"], "pending");
    body["reservation"]["id"].as_i64().expect("id")
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let app = test_app().await;
    let response = app
        .router
        .oneshot(get_request("/healthz", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn wrong_password_is_unauthorized_with_bearer_challenge() {
    let app = test_app().await;
    let response = app
        .router
        .oneshot(json_request(
            Method::POST,
            "/token",
            None,
            json!({ "username": "host", "password": "nope" }),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    assert_eq!(read_json(response).await["code"], "unauthorized");
}

#[tokio::test]
async fn admin_routes_require_a_valid_token() {
    let app = test_app().await;

    let missing = app
        .router
        .clone()
        .oneshot(get_request("/reservations", None))
        .await
        .expect("response");
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(missing.headers()[header::WWW_AUTHENTICATE], "Bearer");

    let forged = app
        .router
        .oneshot(json_request(
            Method::PATCH,
            "/reservations/1/status",
            Some("not-a-jwt"),
            json!({ "status": "confirmed" }),
        ))
        .await
        .expect("response");
    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn users_me_echoes_signed_in_operator() {
    let app = test_app().await;
    let token = sign_in(&app).await;

    let response = app
        .router
        .oneshot(get_request("/users/me", Some(&token)))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["username"], "host");
}

#[tokio::test]
async fn menu_can_be_ordered_by_category() {
    let app = test_app().await;

    let response = app
        .router
        .clone()
        .oneshot(get_request("/menu?order=category", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let items: Vec<MenuItem> = serde_json::from_value(read_json(response).await).expect("menu");
    let names: Vec<&str> = items.iter().map(|item| item.name.as_str()).collect();
    assert_eq!(names, vec!["Garlic bread", "Lasagne"]);

    let bogus = app
        .router
        .oneshot(get_request("/menu?order=price", None))
        .await
        .expect("response");
    assert_eq!(bogus.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_booking_is_rejected_with_message() {
    let app = test_app().await;
    let mut body = booking(json!([]));
    body["guests"] = json!(12);

    let response = app
        .router
        .oneshot(json_request(Method::POST, "/reservations", None, body))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = read_json(response).await;
    assert_eq!(error["code"], "validation");
    assert!(error["message"].as_str().unwrap().contains("between 1 and 8"));
}

#[tokio::test]
async fn undecodable_booking_fields_are_validation_errors() {
    let app = test_app().await;

    let mut off_grid = booking(json!([]));
    off_grid["time"] = json!("18:15");
    let response = app
        .router
        .clone()
        .oneshot(json_request(Method::POST, "/reservations", None, off_grid))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .expect("content type")
        .starts_with("application/json"));
    let error = read_json(response).await;
    assert_eq!(error["code"], "validation");
    assert!(error["message"].as_str().unwrap().contains("time"));

    let mut crowd = booking(json!([]));
    crowd["guests"] = json!(300);
    let response = app
        .router
        .oneshot(json_request(Method::POST, "/reservations", None, crowd))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["code"], "validation");
}

#[tokio::test]
async fn booking_lifecycle_over_http() {
    let app = test_app().await;
    let id = book(
        &app,
        json!([
            { "menu_item_id": app.lasagne.0, "quantity": 2 },
            { "menu_item_id": app.garlic_bread.0, "quantity": 1 },
        ]),
    )
    .await;
    let token = sign_in(&app).await;

    let listed = app
        .router
        .clone()
        .oneshot(get_request("/reservations", Some(&token)))
        .await
        .expect("response");
    assert_eq!(listed.status(), StatusCode::OK);
    let listed: Vec<Reservation> = serde_json::from_value(read_json(listed).await).expect("list");
    assert_eq!(listed.len(), 1);

    let detail = app
        .router
        .clone()
        .oneshot(get_request(&format!("/reservations/{id}"), Some(&token)))
        .await
        .expect("response");
    assert_eq!(detail.status(), StatusCode::OK);
    let detail: ReservationDetail =
        serde_json::from_value(read_json(detail).await).expect("detail");
    assert_eq!(detail.total_cents, 2 * 1350 + 450);

    let status_uri = format!("/reservations/{id}/status");
    for expected_changed in [true, false] {
        let response = app
            .router
            .clone()
            .oneshot(json_request(
                Method::PATCH,
                &status_uri,
                Some(&token),
                json!({ "status": "confirmed" }),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let update: StatusUpdateResponse =
            serde_json::from_value(read_json(response).await).expect("update");
        assert_eq!(update.changed, expected_changed);
        assert_eq!(update.reservation.status, ReservationStatus::Confirmed);
    }

    let cancel_confirmed = app
        .router
        .oneshot(json_request(
            Method::PATCH,
            &status_uri,
            Some(&token),
            json!({ "status": "cancelled" }),
        ))
        .await
        .expect("response");
    assert_eq!(cancel_confirmed.status(), StatusCode::CONFLICT);
    assert_eq!(read_json(cancel_confirmed).await["code"], "conflict");
}

#[tokio::test]
async fn status_endpoint_only_accepts_confirmed_or_cancelled() {
    let app = test_app().await;
    let id = book(&app, json!([])).await;
    let token = sign_in(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            Method::PATCH,
            &format!("/reservations/{id}/status"),
            Some(&token),
            json!({ "status": "pending" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["code"], "validation");

    let unknown = app
        .router
        .oneshot(json_request(
            Method::PATCH,
            &format!("/reservations/{id}/status"),
            Some(&token),
            json!({ "status": "seated" }),
        ))
        .await
        .expect("response");
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(unknown).await["code"], "validation");
}

#[tokio::test]
async fn unknown_reservation_is_not_found() {
    let app = test_app().await;
    let token = sign_in(&app).await;

    let response = app
        .router
        .oneshot(get_request("/reservations/404", Some(&token)))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn notification_endpoint_reports_dispatch_failures() {
    let app = test_app().await;
    let token = sign_in(&app).await;
    let notification = |email: &str| {
        json!({
            "type": "confirmed",
            "reservation": {
                "name": "Ada Lovelace",
                "email": email,
                "date": "2024-06-01",
                "time": "18:30",
                "guests": 4,
                "table_number": 3,
            }
        })
    };

    let sent = app
        .router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/notifications",
            Some(&token),
            notification("ada@example.com"),
        ))
        .await
        .expect("response");
    assert_eq!(sent.status(), StatusCode::NO_CONTENT);

    let failed = app
        .router
        .oneshot(json_request(
            Method::POST,
            "/notifications",
            Some(&token),
            notification(""),
        ))
        .await
        .expect("response");
    assert_eq!(failed.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(read_json(failed).await["code"], "upstream");
}

#[tokio::test]
async fn configured_origin_gets_cors_headers() {
    let app = test_app_with_cors(Some("http://localhost:5173")).await;

    let response = app
        .router
        .oneshot(
            Request::get("/menu")
                .header(header::ORIGIN, "http://localhost:5173")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:5173"
    );
}

#[tokio::test]
async fn admin_feed_requires_websocket_upgrade() {
    let app = test_app().await;
    let token = sign_in(&app).await;

    let response = app
        .router
        .oneshot(get_request(&format!("/admin/feed?token={token}"), None))
        .await
        .expect("response");

    // Without upgrade headers the request never reaches the socket.
    assert!(response.status().is_client_error());
}

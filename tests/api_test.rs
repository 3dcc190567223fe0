#[macro_use]
mod common;

use actix_web::http::{header, Method, StatusCode};
use actix_web::test;
use serde_json::{json, Value};

use agriloop_server::models::UserRole;

#[actix_rt::test]
async fn health_is_public_and_carries_security_headers() {
    let app = test_app!(common::unreachable_db(), common::auth_service(), 100);

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let headers = resp.headers();
    assert_eq!(headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
    assert_eq!(headers.get(header::X_FRAME_OPTIONS).unwrap(), "DENY");
    assert!(headers.contains_key(header::STRICT_TRANSPORT_SECURITY));
    assert!(headers.contains_key("x-request-id"));

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "healthy");
}

#[actix_rt::test]
async fn status_reports_an_unreachable_database() {
    let app = test_app!(common::unreachable_db(), common::auth_service(), 100);

    let req = test::TestRequest::get().uri("/api/status").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["database"], "unreachable");
    assert_eq!(body["data"]["version"], env!("CARGO_PKG_VERSION"));
}

#[actix_rt::test]
async fn protected_routes_require_a_token() {
    let app = test_app!(common::unreachable_db(), common::auth_service(), 100);

    for (method, uri) in [
        (Method::GET, "/api/transactions"),
        (Method::GET, "/api/listings/mine"),
        (Method::POST, "/api/listings"),
        (Method::POST, "/api/auth/logout"),
        (Method::GET, "/api/users/me"),
    ] {
        let req = test::TestRequest::default().method(method.clone()).uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{} {}", method, uri);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Missing authentication token");
    }
}

#[actix_rt::test]
async fn garbage_tokens_are_rejected() {
    let app = test_app!(common::unreachable_db(), common::auth_service(), 100);

    let req = test::TestRequest::get()
        .uri("/api/transactions")
        .insert_header((header::AUTHORIZATION, "Bearer not-a-jwt"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Invalid or expired token");
}

#[actix_rt::test]
async fn tokens_signed_with_another_secret_are_rejected() {
    let app = test_app!(common::unreachable_db(), common::auth_service(), 100);

    let mut other = agriloop_server::config::AuthConfig::for_tests();
    other.jwt_secret = "a-completely-different-secret".to_string();
    let foreign = agriloop_server::auth::AuthService::new(other);

    let req = test::TestRequest::get()
        .uri("/api/reports/summary")
        .insert_header((header::AUTHORIZATION, common::bearer_for(&foreign, UserRole::Buyer)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn register_validation_errors_are_listed() {
    let app = test_app!(common::unreachable_db(), common::auth_service(), 100);

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({
            "email": "not-an-email",
            "username": "ok_name",
            "password": "short",
            "role": "producer"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Validation failed");
    let errors = body["errors"].as_array().expect("errors array");
    assert!(errors.iter().any(|e| e == "Invalid email format"));
    assert!(errors.iter().any(|e| e == "Password must be at least 8 characters"));
}

#[actix_rt::test]
async fn admin_accounts_cannot_self_register() {
    let app = test_app!(common::unreachable_db(), common::auth_service(), 100);

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({
            "email": "root@agriloop.test",
            "username": "root_user",
            "password": common::TEST_PASSWORD,
            "role": "admin"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn unknown_roles_and_malformed_json_are_bad_requests() {
    let app = test_app!(common::unreachable_db(), common::auth_service(), 100);

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({
            "email": "farmer@agriloop.test",
            "username": "farmer",
            "password": common::TEST_PASSWORD,
            "role": "wizard"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload("{\"email\": ")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));
}

#[actix_rt::test]
async fn empty_refresh_token_is_rejected() {
    let app = test_app!(common::unreachable_db(), common::auth_service(), 100);

    let req = test::TestRequest::post()
        .uri("/api/auth/refresh")
        .set_json(json!({ "refresh_token": "   " }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn listing_creation_checks_role_then_payload() {
    let auth = common::auth_service();
    let app = test_app!(common::unreachable_db(), auth.clone(), 100);

    let payload = json!({
        "material_id": "7b0f3c8e-5d1a-4b7e-9a55-2f0d6c1e8a41",
        "title": "Straw",
        "quantity": 0.0,
        "unit": "tonnes",
        "price_per_unit": 10.0,
        "location": "Evora"
    });

    let req = test::TestRequest::post()
        .uri("/api/listings")
        .insert_header((header::AUTHORIZATION, common::bearer_for(&auth, UserRole::Buyer)))
        .set_json(&payload)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::post()
        .uri("/api/listings")
        .insert_header((header::AUTHORIZATION, common::bearer_for(&auth, UserRole::Producer)))
        .set_json(&payload)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert!(body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e == "Quantity must be greater than zero"));
}

#[actix_rt::test]
async fn malformed_path_ids_are_bad_requests() {
    let auth = common::auth_service();
    let app = test_app!(common::unreachable_db(), auth.clone(), 100);

    let req = test::TestRequest::get()
        .uri("/api/transactions/not-a-uuid")
        .insert_header((header::AUTHORIZATION, common::bearer_for(&auth, UserRole::Buyer)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn preflight_is_answered_for_allowed_origins() {
    let app = test_app!(common::unreachable_db(), common::auth_service(), 100);

    let req = test::TestRequest::default()
        .method(Method::OPTIONS)
        .uri("/api/transactions")
        .insert_header((header::ORIGIN, common::ALLOWED_ORIGIN))
        .insert_header((header::ACCESS_CONTROL_REQUEST_METHOD, "PATCH"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let headers = resp.headers();
    assert_eq!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), common::ALLOWED_ORIGIN);
    assert!(headers
        .get(header::ACCESS_CONTROL_ALLOW_METHODS)
        .unwrap()
        .to_str()
        .unwrap()
        .contains("PATCH"));
}

#[actix_rt::test]
async fn unknown_origins_get_no_allow_origin_header() {
    let app = test_app!(common::unreachable_db(), common::auth_service(), 100);

    let req = test::TestRequest::get()
        .uri("/health")
        .insert_header((header::ORIGIN, "http://evil.test"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(!resp.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[actix_rt::test]
async fn oversized_bodies_are_refused() {
    let app = test_app!(common::unreachable_db(), common::auth_service(), 100);

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .insert_header((header::CONTENT_LENGTH, "10485760"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[actix_rt::test]
async fn requests_over_the_limit_get_429() {
    let app = test_app!(common::unreachable_db(), common::auth_service(), 2);

    for _ in 0..2 {
        let req = test::TestRequest::get().uri("/health").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Rate limit exceeded. Please try again later.");
}

#[actix_rt::test]
async fn rate_limits_are_tracked_per_user() {
    let auth = common::auth_service();
    let app = test_app!(common::unreachable_db(), auth.clone(), 1);

    let first = common::bearer_for(&auth, UserRole::Buyer);
    let second = common::bearer_for(&auth, UserRole::Buyer);

    let req = test::TestRequest::get()
        .uri("/health")
        .insert_header((header::AUTHORIZATION, first.clone()))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/health")
        .insert_header((header::AUTHORIZATION, second))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/health")
        .insert_header((header::AUTHORIZATION, first))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::TOO_MANY_REQUESTS);
}

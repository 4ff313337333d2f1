//! Handler-level tests that run without a database: health, version, and
//! the auth middleware's gatekeeping.

use actix_web::{http::StatusCode, test, web, App};
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use printlink_api::app_state::AppState;
use printlink_api::config::Config;
use printlink_api::http::middleware::token_auth::TokenAuth;
use printlink_api::http::routes;

fn state_for(config: &Config) -> AppState {
    AppState::new(
        config.service.clone(),
        config.auth.clone(),
        config.paymongo.clone(),
        config.payments.clone(),
        None,
        None,
    )
}

fn test_state() -> (Config, AppState) {
    let config: Config = serde_json::from_str("{}").expect("default config");
    let state = state_for(&config);
    (config, state)
}

macro_rules! test_app {
    () => {{
        let (config, state) = test_state();
        test_app!(config, state)
    }};
    ($config:expr, $state:expr) => {{
        test::init_service(
            App::new()
                .app_data(web::Data::new($state))
                .wrap(TokenAuth::new($config.auth.clone()))
                .configure(routes::configure),
        )
        .await
    }};
}

#[actix_rt::test]
async fn healthz_is_ok() {
    let app = test_app!();
    let req = test::TestRequest::get().uri("/healthz").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["status"], "ok");
}

#[actix_rt::test]
async fn readyz_fails_without_database() {
    let app = test_app!();
    let req = test::TestRequest::get().uri("/readyz").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["ready"], false);
}

#[actix_rt::test]
async fn version_reports_service_name() {
    let app = test_app!();
    let req = test::TestRequest::get().uri("/version").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["name"], "printlink-api");
}

#[actix_rt::test]
async fn protected_routes_reject_missing_token() {
    let app = test_app!();
    for uri in ["/api/posts", "/api/notifications", "/api/requests"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "uri: {}", uri);
    }
}

#[actix_rt::test]
async fn malformed_bearer_token_is_rejected_before_lookup() {
    let app = test_app!();
    let req = test::TestRequest::get()
        .uri("/api/posts")
        .insert_header(("Authorization", "Token not-a-bearer"))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn bypassed_routes_skip_auth() {
    // Without a database the handler answers 503, not 401: the middleware
    // let the request through.
    let app = test_app!();
    let req = test::TestRequest::get().uri("/api/roles").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[actix_rt::test]
async fn login_validation_lists_missing_fields() {
    let app = test_app!();
    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(serde_json::json!({ "email": "not-an-email", "password": "" }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(res).await;
    let missing: Vec<String> = body["missing"]
        .as_array()
        .expect("missing fields listed")
        .iter()
        .filter_map(|v| v.as_str().map(String::from))
        .collect();
    assert!(missing.contains(&"email".to_string()));
    assert!(missing.contains(&"password".to_string()));
}

#[actix_rt::test]
async fn register_validation_rejects_short_password() {
    let app = test_app!();
    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(serde_json::json!({
            "username": "maria",
            "email": "maria@example.com",
            "password": "short",
            "role_id": 2,
            "first_name": "Maria",
            "last_name": "Santos",
        }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["missing"][0], "password");
}

#[actix_rt::test]
async fn webhook_route_is_bypassed_but_requires_signature() {
    let app = test_app!();
    let req = test::TestRequest::post()
        .uri("/api/paymongo/webhook")
        .set_payload("{}")
        .to_request();
    let res = test::call_service(&app, req).await;
    // 401 from the handler's signature check, not from the auth middleware
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["details"], "missing Paymongo-Signature header");
}

#[actix_rt::test]
async fn users_images_route_reaches_the_handler() {
    // With auth disabled, a wired route answers 503 (no database) while an
    // unknown path falls through to 404.
    let mut config: Config = serde_json::from_str("{}").expect("default config");
    config.auth.enabled = false;
    let state = state_for(&config);
    let app = test_app!(config, state);

    let req = test::TestRequest::get().uri("/api/users/1/images").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    let req = test::TestRequest::get().uri("/api/users/1/gallery").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn forgot_password_is_reachable_without_token() {
    // Bypassed route: the handler gets as far as the database (503), the
    // middleware never answers 401.
    let app = test_app!();
    let req = test::TestRequest::post()
        .uri("/api/auth/forgot-password")
        .set_json(serde_json::json!({ "email": "maria@example.com" }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[actix_rt::test]
async fn reset_password_rejects_short_replacement() {
    let app = test_app!();
    let req = test::TestRequest::post()
        .uri("/api/auth/reset-password")
        .set_json(serde_json::json!({
            "email": "maria@example.com",
            "token": "abc123",
            "password": "short",
        }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["missing"][0], "password");
}

#[actix_rt::test]
async fn success_landing_rejects_session_without_payment() {
    // The session id comes from the payer's browser; an unpaid session must
    // not flip anything. The gateway is consulted first, so this fails with
    // 409 before any database access.
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/checkout_sessions/cs_unpaid"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {
                "id": "cs_unpaid",
                "attributes": {
                    "checkout_url": "https://checkout.paymongo.com/cs_unpaid",
                    "payments": []
                }
            }
        })))
        .mount(&server)
        .await;

    let mut config: Config = serde_json::from_str("{}").expect("default config");
    config.paymongo.base_url = server.uri();
    let state = state_for(&config);
    let app = test_app!(config, state);

    let req = test::TestRequest::get()
        .uri("/api/payments/success?session_id=cs_unpaid")
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[actix_rt::test]
async fn success_landing_surfaces_gateway_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/checkout_sessions/cs_missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let mut config: Config = serde_json::from_str("{}").expect("default config");
    config.paymongo.base_url = server.uri();
    let state = state_for(&config);
    let app = test_app!(config, state);

    let req = test::TestRequest::get()
        .uri("/api/payments/success?session_id=cs_missing")
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
}

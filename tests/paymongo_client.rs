//! PayMongo client tests against a mocked gateway.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use printlink_api::config::PaymongoConfig;
use printlink_api::paymongo::{Client, NewCheckoutSession, PayMongoError};

fn client_for(server: &MockServer) -> Client {
    let config = PaymongoConfig {
        base_url: server.uri(),
        secret_key: "sk_test_123".to_string(),
        ..PaymongoConfig::default()
    };
    Client::new(&config)
}

fn checkout_params() -> NewCheckoutSession {
    NewCheckoutSession {
        amount_centavos: 20_000,
        currency: "PHP".to_string(),
        description: "Down payment for \"Logo pack\"".to_string(),
        line_item_name: "Logo pack".to_string(),
        payment_method_types: vec!["gcash".to_string(), "card".to_string()],
        billing_name: "maria".to_string(),
        billing_email: "maria@example.com".to_string(),
        billing_phone: None,
        send_email_receipt: true,
        success_url: "http://localhost/success".to_string(),
        cancel_url: "http://localhost/failed".to_string(),
    }
}

#[actix_rt::test]
async fn create_checkout_session_sends_expected_payload() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/checkout_sessions"))
        .and(header_exists("authorization"))
        .and(body_partial_json(json!({
            "data": {
                "attributes": {
                    "currency": "PHP",
                    "payment_method_types": ["gcash", "card"],
                    "line_items": [{
                        "name": "Logo pack",
                        "amount": 20_000,
                        "quantity": 1,
                    }],
                }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "id": "cs_test_1",
                "attributes": {
                    "checkout_url": "https://checkout.paymongo.com/cs_test_1",
                    "payments": []
                }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = client_for(&server)
        .create_checkout_session(&checkout_params())
        .await
        .expect("session created");

    assert_eq!(session.id, "cs_test_1");
    assert_eq!(
        session.checkout_url,
        "https://checkout.paymongo.com/cs_test_1"
    );
    assert!(session.payment_ids.is_empty());
}

#[actix_rt::test]
async fn refund_flow_uses_payment_id_from_session() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/checkout_sessions/cs_test_2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "id": "cs_test_2",
                "attributes": {
                    "checkout_url": "https://checkout.paymongo.com/cs_test_2",
                    "payments": [{"id": "pay_abc"}]
                }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/refunds"))
        .and(body_partial_json(json!({
            "data": {
                "attributes": {
                    "payment_id": "pay_abc",
                    "amount": 20_000,
                    "reason": "others",
                }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "id": "ref_1",
                "attributes": { "status": "pending" }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let refund = client_for(&server)
        .refund_checkout_session("cs_test_2", 20_000)
        .await
        .expect("refund created");

    assert_eq!(refund.id, "ref_1");
    assert_eq!(refund.status, "pending");
}

#[actix_rt::test]
async fn session_without_payments_cannot_be_refunded() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/checkout_sessions/cs_unpaid"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
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

    let err = client_for(&server)
        .refund_checkout_session("cs_unpaid", 10_000)
        .await
        .expect_err("no payment to refund");

    assert!(matches!(err, PayMongoError::NoPayment(id) if id == "cs_unpaid"));
}

#[actix_rt::test]
async fn gateway_errors_carry_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/checkout_sessions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "errors": [{"code": "authentication_failed"}]
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .create_checkout_session(&checkout_params())
        .await
        .expect_err("unauthorized");

    match err {
        PayMongoError::Api { status, body } => {
            assert_eq!(status, 401);
            assert!(body.contains("authentication_failed"));
        }
        other => panic!("unexpected error: {}", other),
    }
}

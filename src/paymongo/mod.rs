/// PayMongo gateway client
///
/// Checkout sessions carry the down payment and balance charges; declines
/// refund through the payment id attached to the session. All amounts are
/// centavos, PayMongo's native unit.
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Sha256;
use std::time::Duration;

use crate::config::PaymongoConfig;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum PayMongoError {
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("gateway returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("checkout session {0} has no completed payment")]
    NoPayment(String),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("signature header is malformed")]
    MalformedHeader,
    #[error("webhook timestamp outside tolerance window")]
    StaleTimestamp,
    #[error("signature mismatch")]
    Mismatch,
}

/// Parameters for a new checkout session.
#[derive(Debug, Clone)]
pub struct NewCheckoutSession {
    pub amount_centavos: i64,
    pub currency: String,
    pub description: String,
    pub line_item_name: String,
    pub payment_method_types: Vec<String>,
    pub billing_name: String,
    pub billing_email: String,
    pub billing_phone: Option<String>,
    pub send_email_receipt: bool,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub checkout_url: String,
    pub payment_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    pub id: String,
    pub status: String,
}

#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl Client {
    pub fn new(config: &PaymongoConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.http_timeout_ms))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
        }
    }

    pub async fn create_checkout_session(
        &self,
        params: &NewCheckoutSession,
    ) -> Result<CheckoutSession, PayMongoError> {
        let body = json!({
            "data": {
                "attributes": {
                    "currency": params.currency,
                    "description": params.description,
                    "send_email_receipt": params.send_email_receipt,
                    "line_items": [{
                        "name": params.line_item_name,
                        "description": params.description,
                        "amount": params.amount_centavos,
                        "currency": params.currency,
                        "quantity": 1,
                    }],
                    "payment_method_types": params.payment_method_types,
                    "success_url": params.success_url,
                    "cancel_url": params.cancel_url,
                    "billing": {
                        "name": params.billing_name,
                        "email": params.billing_email,
                        "phone": params.billing_phone,
                    },
                }
            }
        });

        let response = self
            .http
            .post(format!("{}/checkout_sessions", self.base_url))
            .basic_auth(&self.secret_key, None::<&str>)
            .json(&body)
            .send()
            .await?;

        let value = Self::into_json(response).await?;
        Ok(parse_checkout_session(&value))
    }

    pub async fn get_checkout_session(&self, id: &str) -> Result<CheckoutSession, PayMongoError> {
        let response = self
            .http
            .get(format!("{}/checkout_sessions/{}", self.base_url, id))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await?;

        let value = Self::into_json(response).await?;
        Ok(parse_checkout_session(&value))
    }

    /// Refund the full amount of a gateway payment.
    pub async fn create_refund(
        &self,
        payment_id: &str,
        amount_centavos: i64,
        reason: &str,
    ) -> Result<Refund, PayMongoError> {
        let body = json!({
            "data": {
                "attributes": {
                    "payment_id": payment_id,
                    "amount": amount_centavos,
                    "reason": reason,
                }
            }
        });

        let response = self
            .http
            .post(format!("{}/refunds", self.base_url))
            .basic_auth(&self.secret_key, None::<&str>)
            .json(&body)
            .send()
            .await?;

        let value = Self::into_json(response).await?;
        let id = value["data"]["id"].as_str().unwrap_or_default().to_string();
        let status = value["data"]["attributes"]["status"]
            .as_str()
            .unwrap_or("pending")
            .to_string();
        Ok(Refund { id, status })
    }

    /// Fetch the session and refund its first payment in full.
    pub async fn refund_checkout_session(
        &self,
        session_id: &str,
        amount_centavos: i64,
    ) -> Result<Refund, PayMongoError> {
        let session = self.get_checkout_session(session_id).await?;
        let payment_id = session
            .payment_ids
            .first()
            .ok_or_else(|| PayMongoError::NoPayment(session_id.to_string()))?;
        self.create_refund(payment_id, amount_centavos, "others").await
    }

    async fn into_json(response: reqwest::Response) -> Result<serde_json::Value, PayMongoError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PayMongoError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

fn parse_checkout_session(value: &serde_json::Value) -> CheckoutSession {
    let data = &value["data"];
    let payment_ids = data["attributes"]["payments"]
        .as_array()
        .map(|payments| {
            payments
                .iter()
                .filter_map(|p| p["id"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    CheckoutSession {
        id: data["id"].as_str().unwrap_or_default().to_string(),
        checkout_url: data["attributes"]["checkout_url"]
            .as_str()
            .unwrap_or_default()
            .to_string(),
        payment_ids,
    }
}

/// Webhook event envelope, flattened to the two fields the handlers need.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub event_type: String,
    pub resource_id: String,
}

pub fn parse_webhook_event(body: &[u8]) -> Option<WebhookEvent> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let attributes = &value["data"]["attributes"];
    let event_type = attributes["type"].as_str()?.to_string();
    let resource_id = attributes["data"]["id"].as_str()?.to_string();
    Some(WebhookEvent {
        event_type,
        resource_id,
    })
}

/// Verify a `Paymongo-Signature` header (`t=<unix>,te=<hex>,li=<hex>`).
///
/// The signed message is `<t>.<raw body>`; either the test (`te`) or live
/// (`li`) digest may match.
pub fn verify_webhook_signature(
    secret: &str,
    header: &str,
    body: &[u8],
    now_unix: i64,
    tolerance_secs: u64,
) -> Result<(), WebhookError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        let (key, value) = part
            .trim()
            .split_once('=')
            .ok_or(WebhookError::MalformedHeader)?;
        match key {
            "t" => {
                timestamp =
                    Some(value.parse().map_err(|_| WebhookError::MalformedHeader)?);
            }
            "te" | "li" => {
                if !value.is_empty() {
                    signatures.push(hex::decode(value).map_err(|_| WebhookError::MalformedHeader)?);
                }
            }
            _ => {} // Unknown components are ignored
        }
    }

    let timestamp = timestamp.ok_or(WebhookError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(WebhookError::MalformedHeader);
    }

    if (now_unix - timestamp).unsigned_abs() > tolerance_secs {
        return Err(WebhookError::StaleTimestamp);
    }

    for signature in &signatures {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| WebhookError::MalformedHeader)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        if mac.verify_slice(signature).is_ok() {
            return Ok(());
        }
    }

    Err(WebhookError::Mismatch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sign(secret: &str, timestamp: i64, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn valid_test_signature_passes() {
        let body = br#"{"data":{"attributes":{"type":"checkout_session.payment.paid"}}}"#;
        let header = format!("t=1700000000,te={},li=", sign("whsk_test", 1_700_000_000, body));
        assert_eq!(
            verify_webhook_signature("whsk_test", &header, body, 1_700_000_030, 300),
            Ok(())
        );
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let body = b"{}";
        let header = format!("t=1700000000,te={}", sign("other", 1_700_000_000, body));
        assert_eq!(
            verify_webhook_signature("whsk_test", &header, body, 1_700_000_000, 300),
            Err(WebhookError::Mismatch)
        );
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let body = b"{}";
        let header = format!("t=1700000000,li={}", sign("whsk", 1_700_000_000, body));
        assert_eq!(
            verify_webhook_signature("whsk", &header, body, 1_700_001_000, 300),
            Err(WebhookError::StaleTimestamp)
        );
    }

    #[test]
    fn malformed_header_is_rejected() {
        assert_eq!(
            verify_webhook_signature("whsk", "not-a-header", b"{}", 0, 300),
            Err(WebhookError::MalformedHeader)
        );
        assert_eq!(
            verify_webhook_signature("whsk", "t=123", b"{}", 123, 300),
            Err(WebhookError::MalformedHeader)
        );
    }

    #[test]
    fn webhook_event_extracts_session_id() {
        let body = br#"{
            "data": {
                "attributes": {
                    "type": "checkout_session.payment.paid",
                    "data": {"id": "cs_abc123", "attributes": {}}
                }
            }
        }"#;
        let event = parse_webhook_event(body).unwrap();
        assert_eq!(event.event_type, "checkout_session.payment.paid");
        assert_eq!(event.resource_id, "cs_abc123");
    }

    #[test]
    fn checkout_session_parser_reads_payments() {
        let value = serde_json::json!({
            "data": {
                "id": "cs_1",
                "attributes": {
                    "checkout_url": "https://checkout.paymongo.com/cs_1",
                    "payments": [{"id": "pay_1"}, {"id": "pay_2"}]
                }
            }
        });
        let session = parse_checkout_session(&value);
        assert_eq!(session.id, "cs_1");
        assert_eq!(session.checkout_url, "https://checkout.paymongo.com/cs_1");
        assert_eq!(session.payment_ids, vec!["pay_1", "pay_2"]);
    }
}

/// Payment endpoints: initiation, balance checkout, gateway redirect
/// landings, the PayMongo webhook, and the admin/reporting views.
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::app_state::AppState;
use crate::domain::{self, PaymentStatus, RequestStatus};
use crate::errors::ApiError;
use crate::http::middleware::token_auth::Authenticated;
use crate::paymongo::{self, NewCheckoutSession};
use crate::repository::notifications::NewNotification;
use crate::repository::payments::{InitialPayment, NewPayment, PaymentRepository};
use crate::repository::posts::PostRepository;
use crate::repository::requests::RequestRepository;
use crate::repository::users::UserRepository;

use super::{ensure_updated, require_admin, require_self_or_admin, PageQuery};

#[derive(Debug, Deserialize, Validate)]
pub struct InitiateRequest {
    pub request_id: i64,
    /// "down", "balance", or "full"; amounts derive from the post price.
    #[validate(length(min = 1))]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub session_id: String,
}

fn kind_amount(kind: &str, price_centavos: i64, down_percent: i64) -> Result<i64, ApiError> {
    let (down, balance) = domain::split_down_payment(price_centavos, down_percent);
    match kind {
        "down" => Ok(down),
        "balance" => Ok(balance),
        "full" => Ok(price_centavos),
        _ => Err(ApiError::BadRequest {
            missing: vec![],
            reason: Some("kind must be one of: down, balance, full".to_string()),
        }),
    }
}

// POST /api/payments/initiate
pub async fn initiate(
    state: web::Data<AppState>,
    auth: Authenticated,
    payload: web::Json<InitiateRequest>,
) -> Result<impl Responder, ApiError> {
    payload.validate().map_err(ApiError::validation)?;

    let pool = state.pool()?.clone();
    let request = RequestRepository::new(pool.clone())
        .get(payload.request_id)
        .await
        .map_err(ApiError::database)?
        .ok_or(ApiError::NotFound {
            resource: "request".to_string(),
        })?;

    if request.user_id != auth.0.id && request.target_user_id != auth.0.id {
        return Err(ApiError::Forbidden {
            reason: Some("not a party to this request".to_string()),
        });
    }

    let post_id = request.post_id.ok_or(ApiError::BadRequest {
        missing: vec![],
        reason: Some("request has no post to charge for".to_string()),
    })?;
    let post = PostRepository::new(pool.clone())
        .get(post_id)
        .await
        .map_err(ApiError::database)?
        .ok_or(ApiError::NotFound {
            resource: "post".to_string(),
        })?;

    let payments = PaymentRepository::new(pool);
    if payments
        .find_by_request(request.id, &payload.kind)
        .await
        .map_err(ApiError::database)?
        .is_some()
    {
        return Err(ApiError::Conflict {
            reason: format!("a {} payment already exists for this request", payload.kind),
        });
    }

    let amount = kind_amount(
        &payload.kind,
        post.price_centavos,
        state.payments_config.down_payment_percent,
    )?;

    let payment = payments
        .insert(NewPayment {
            request_id: request.id,
            user_id: request.user_id,
            amount_centavos: amount,
            kind: payload.kind.clone(),
        })
        .await
        .map_err(ApiError::database)?;

    Ok(HttpResponse::Created().json(payment))
}

// POST /api/payments/balance/{request_id}
pub async fn balance(
    state: web::Data<AppState>,
    auth: Authenticated,
    path: web::Path<i64>,
) -> Result<impl Responder, ApiError> {
    let request_id = path.into_inner();
    let pool = state.pool()?.clone();

    let request = RequestRepository::new(pool.clone())
        .get(request_id)
        .await
        .map_err(ApiError::database)?
        .ok_or(ApiError::NotFound {
            resource: "request".to_string(),
        })?;

    if request.user_id != auth.0.id && request.target_user_id != auth.0.id {
        return Err(ApiError::Forbidden {
            reason: Some("not a party to this request".to_string()),
        });
    }
    if request.status != RequestStatus::Accepted.as_str() {
        return Err(ApiError::Conflict {
            reason: "balance is only payable on an accepted request".to_string(),
        });
    }

    let post_id = request.post_id.ok_or(ApiError::BadRequest {
        missing: vec![],
        reason: Some("request has no post to charge for".to_string()),
    })?;
    let post = PostRepository::new(pool.clone())
        .get(post_id)
        .await
        .map_err(ApiError::database)?
        .ok_or(ApiError::NotFound {
            resource: "post".to_string(),
        })?;

    let (_down, balance) = domain::split_down_payment(
        post.price_centavos,
        state.payments_config.down_payment_percent,
    );

    let payments = PaymentRepository::new(pool.clone());
    let payment = match payments
        .find_by_request(request_id, "balance")
        .await
        .map_err(ApiError::database)?
    {
        Some(existing) => existing,
        None => payments
            .insert(NewPayment {
                request_id,
                user_id: request.user_id,
                amount_centavos: balance,
                kind: "balance".to_string(),
            })
            .await
            .map_err(ApiError::database)?,
    };
    domain::guard_payment_transition(&payment.status, PaymentStatus::Initiated)?;

    let payer = UserRepository::new(pool)
        .find_by_id(request.user_id)
        .await
        .map_err(ApiError::database)?
        .ok_or(ApiError::NotFound {
            resource: "user".to_string(),
        })?;

    let session = state
        .paymongo
        .create_checkout_session(&NewCheckoutSession {
            amount_centavos: balance,
            currency: state.payments_config.currency.clone(),
            description: format!("Remaining balance for \"{}\"", post.title),
            line_item_name: post.title.clone(),
            payment_method_types: state.payments_config.payment_method_types.clone(),
            billing_name: payer.username.clone(),
            billing_email: payer.email.clone(),
            billing_phone: None,
            send_email_receipt: state.payments_config.send_email_receipt,
            success_url: state.paymongo_config.success_url.clone(),
            cancel_url: state.paymongo_config.cancel_url.clone(),
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, request_id = request_id, "Balance checkout failed");
            ApiError::Gateway {
                details: e.to_string(),
            }
        })?;

    let updated = payments
        .set_amount_and_transaction(payment.id, balance, &session.id)
        .await
        .map_err(ApiError::database)?;
    ensure_updated(updated, "payment")?;
    let flipped = payments
        .set_status(payment.id, &payment.status, PaymentStatus::Initiated)
        .await
        .map_err(ApiError::database)?;
    ensure_updated(flipped, "payment")?;

    Ok(HttpResponse::Ok().json(json!({
        "payment_id": payment.id,
        "amount_centavos": balance,
        "checkout_url": session.checkout_url,
    })))
}

async fn find_by_session(
    payments: &PaymentRepository,
    session_id: &str,
) -> Result<InitialPayment, ApiError> {
    payments
        .find_by_transaction(session_id)
        .await
        .map_err(ApiError::database)?
        .ok_or(ApiError::NotFound {
            resource: "payment".to_string(),
        })
}

async fn mark_paid(
    state: &AppState,
    payments: &PaymentRepository,
    payment: &InitialPayment,
) -> Result<(), ApiError> {
    domain::guard_payment_transition(&payment.status, PaymentStatus::Paid)?;
    let changed = payments
        .set_status(payment.id, &payment.status, PaymentStatus::Paid)
        .await
        .map_err(ApiError::database)?;
    if changed == 0 {
        // Redirect landing and webhook can race; the loser is a no-op.
        tracing::info!(payment_id = payment.id, "Payment already settled");
        return Ok(());
    }

    let request = RequestRepository::new(state.pool()?.clone())
        .get(payment.request_id)
        .await
        .map_err(ApiError::database)?;

    let notifier = state.notifier()?;
    let mut recipients = vec![payment.user_id];
    if let Some(ref request) = request {
        if request.target_user_id != payment.user_id {
            recipients.push(request.target_user_id);
        }
    }
    for recipient in recipients {
        if let Err(e) = notifier
            .send(NewNotification {
                user_id: recipient,
                target_user_id: None,
                request_id: Some(payment.request_id),
                content: format!(
                    "Payment of {} centavos ({}) confirmed",
                    payment.amount_centavos, payment.kind
                ),
                status: "unread".to_string(),
            })
            .await
        {
            tracing::warn!(error = %e, payment_id = payment.id, "Failed to notify payment");
        }
    }
    Ok(())
}

fn ensure_session_settled(session: &paymongo::CheckoutSession) -> Result<(), ApiError> {
    if session.payment_ids.is_empty() {
        return Err(ApiError::Conflict {
            reason: "checkout session has no completed payment".to_string(),
        });
    }
    Ok(())
}

// GET /api/payments/success
//
// The landing is reachable without a token, so the session id alone proves
// nothing; the gateway is asked whether money actually moved before any
// status flips.
pub async fn success(
    state: web::Data<AppState>,
    query: web::Query<SessionQuery>,
) -> Result<impl Responder, ApiError> {
    let session = state
        .paymongo
        .get_checkout_session(&query.session_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, session_id = %query.session_id, "Session lookup failed");
            ApiError::Gateway {
                details: e.to_string(),
            }
        })?;
    ensure_session_settled(&session)?;

    let payments = PaymentRepository::new(state.pool()?.clone());
    let payment = find_by_session(&payments, &session.id).await?;
    mark_paid(&state, &payments, &payment).await?;

    Ok(HttpResponse::Ok().json(json!({
        "payment_id": payment.id,
        "status": PaymentStatus::Paid,
    })))
}

// GET /api/payments/failed
pub async fn failed(
    state: web::Data<AppState>,
    query: web::Query<SessionQuery>,
) -> Result<impl Responder, ApiError> {
    let payments = PaymentRepository::new(state.pool()?.clone());
    let payment = find_by_session(&payments, &query.session_id).await?;

    domain::guard_payment_transition(&payment.status, PaymentStatus::Failed)?;
    payments
        .set_status(payment.id, &payment.status, PaymentStatus::Failed)
        .await
        .map_err(ApiError::database)?;

    Ok(HttpResponse::Ok().json(json!({
        "payment_id": payment.id,
        "status": PaymentStatus::Failed,
    })))
}

// POST /api/paymongo/webhook
pub async fn webhook(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<impl Responder, ApiError> {
    let header = req
        .headers()
        .get("Paymongo-Signature")
        .and_then(|h| h.to_str().ok())
        .ok_or(ApiError::Unauthorized {
            reason: Some("missing Paymongo-Signature header".to_string()),
        })?;

    paymongo::verify_webhook_signature(
        &state.paymongo_config.webhook_secret,
        header,
        &body,
        chrono::Utc::now().timestamp(),
        state.paymongo_config.webhook_tolerance_secs,
    )
    .map_err(|e| {
        tracing::warn!(error = %e, "Webhook signature rejected");
        ApiError::Unauthorized {
            reason: Some(e.to_string()),
        }
    })?;

    let event = paymongo::parse_webhook_event(&body).ok_or(ApiError::BadRequest {
        missing: vec![],
        reason: Some("unparseable webhook payload".to_string()),
    })?;

    tracing::info!(
        event_type = %event.event_type,
        resource_id = %event.resource_id,
        "PayMongo webhook received"
    );

    if event.event_type == "checkout_session.payment.paid" {
        let payments = PaymentRepository::new(state.pool()?.clone());
        match payments
            .find_by_transaction(&event.resource_id)
            .await
            .map_err(ApiError::database)?
        {
            Some(payment) => mark_paid(&state, &payments, &payment).await?,
            None => {
                // Unknown session; acknowledge so the gateway stops retrying
                tracing::warn!(resource_id = %event.resource_id, "Webhook for unknown session");
            }
        }
    }

    Ok(HttpResponse::Ok().json(json!({ "received": true })))
}

// GET /api/users/{id}/requests-payments
pub async fn requests_payments(
    state: web::Data<AppState>,
    auth: Authenticated,
    path: web::Path<i64>,
) -> Result<impl Responder, ApiError> {
    let user_id = path.into_inner();
    require_self_or_admin(&auth.0, user_id)?;

    let rows = PaymentRepository::new(state.pool()?.clone())
        .requests_with_payments(user_id)
        .await
        .map_err(ApiError::database)?;
    Ok(HttpResponse::Ok().json(rows))
}

// GET /api/admin/payments
pub async fn admin_list(
    state: web::Data<AppState>,
    auth: Authenticated,
    query: web::Query<PageQuery>,
) -> Result<impl Responder, ApiError> {
    require_admin(&auth.0)?;
    let pagination = query.pagination()?;

    let (items, total) = PaymentRepository::new(state.pool()?.clone())
        .list_all(pagination)
        .await
        .map_err(ApiError::database)?;

    Ok(HttpResponse::Ok().json(json!({
        "items": items,
        "page": { "limit": query.limit, "offset": query.offset, "total": total },
    })))
}

// POST /api/admin/payments/{id}/approve
//
// Manual settlement for payments whose webhook never arrived.
pub async fn admin_approve(
    state: web::Data<AppState>,
    auth: Authenticated,
    path: web::Path<i64>,
) -> Result<impl Responder, ApiError> {
    require_admin(&auth.0)?;
    let payment_id = path.into_inner();

    let payments = PaymentRepository::new(state.pool()?.clone());
    let payment = payments
        .get(payment_id)
        .await
        .map_err(ApiError::database)?
        .ok_or(ApiError::NotFound {
            resource: "payment".to_string(),
        })?;

    mark_paid(&state, &payments, &payment).await?;

    Ok(HttpResponse::Ok().json(json!({
        "payment_id": payment_id,
        "status": PaymentStatus::Paid,
    })))
}

// GET /api/sales-report
pub async fn sales_report(
    state: web::Data<AppState>,
    auth: Authenticated,
) -> Result<impl Responder, ApiError> {
    let report = PaymentRepository::new(state.pool()?.clone())
        .sales_report(auth.0.id)
        .await
        .map_err(ApiError::database)?;
    Ok(HttpResponse::Ok().json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paymongo::CheckoutSession;

    fn session(payment_ids: Vec<String>) -> CheckoutSession {
        CheckoutSession {
            id: "cs_abc123".to_string(),
            checkout_url: "https://checkout.example.test/cs_abc123".to_string(),
            payment_ids,
        }
    }

    #[test]
    fn session_without_payments_is_not_settled() {
        let err = ensure_session_settled(&session(vec![])).unwrap_err();
        assert!(matches!(err, ApiError::Conflict { .. }));
    }

    #[test]
    fn session_with_payment_is_settled() {
        assert!(ensure_session_settled(&session(vec!["pay_1".to_string()])).is_ok());
    }

    #[test]
    fn kind_amount_covers_down_balance_and_full() {
        assert_eq!(kind_amount("down", 10_000, 20).unwrap(), 2_000);
        assert_eq!(kind_amount("balance", 10_000, 20).unwrap(), 8_000);
        assert_eq!(kind_amount("full", 10_000, 20).unwrap(), 10_000);
        assert!(kind_amount("tip", 10_000, 20).is_err());
    }
}

/// Work request lifecycle: create, accept (down payment checkout), decline
/// (refund).
use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::app_state::AppState;
use crate::domain::{self, PaymentStatus, RequestStatus};
use crate::errors::ApiError;
use crate::http::middleware::token_auth::Authenticated;
use crate::paymongo::NewCheckoutSession;
use crate::repository::notifications::{NewNotification, Notification, NotificationRepository};
use crate::repository::payments::{InitialPayment, NewPayment, PaymentRepository};
use crate::repository::posts::PostRepository;
use crate::repository::requests::{NewWorkRequest, RequestRepository, WorkRequest};
use crate::repository::users::UserRepository;

use super::ensure_updated;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRequest {
    pub target_user_id: i64,
    pub post_id: Option<i64>,
    #[validate(length(min = 1, max = 50))]
    pub request_type: String,
    #[validate(length(min = 1, max = 5000))]
    pub request_content: String,
}

// POST /api/requests
pub async fn create(
    state: web::Data<AppState>,
    auth: Authenticated,
    payload: web::Json<CreateRequest>,
) -> Result<impl Responder, ApiError> {
    payload.validate().map_err(ApiError::validation)?;

    if payload.target_user_id == auth.0.id {
        return Err(ApiError::BadRequest {
            missing: vec![],
            reason: Some("cannot send a request to yourself".to_string()),
        });
    }

    let pool = state.pool()?.clone();

    if let Some(post_id) = payload.post_id {
        PostRepository::new(pool.clone())
            .get(post_id)
            .await
            .map_err(ApiError::database)?
            .ok_or(ApiError::NotFound {
                resource: "post".to_string(),
            })?;
    }

    let request = RequestRepository::new(pool)
        .insert(NewWorkRequest {
            user_id: auth.0.id,
            target_user_id: payload.target_user_id,
            post_id: payload.post_id,
            request_type: payload.request_type.clone(),
            request_content: payload.request_content.clone(),
        })
        .await
        .map_err(ApiError::database)?;

    let notifier = state.notifier()?;
    if let Err(e) = notifier
        .send(NewNotification {
            user_id: payload.target_user_id,
            target_user_id: Some(auth.0.id),
            request_id: Some(request.id),
            content: format!("{} sent you a {} request", auth.0.username, request.request_type),
            status: "unread".to_string(),
        })
        .await
    {
        tracing::warn!(error = %e, request_id = request.id, "Failed to notify request target");
    }

    Ok(HttpResponse::Created().json(request))
}

// GET /api/requests
pub async fn list(
    state: web::Data<AppState>,
    auth: Authenticated,
) -> Result<impl Responder, ApiError> {
    let requests = RequestRepository::new(state.pool()?.clone())
        .list_involving(auth.0.id)
        .await
        .map_err(ApiError::database)?;
    Ok(HttpResponse::Ok().json(requests))
}

async fn load_request(
    repo: &RequestRepository,
    id: i64,
    target_user_id: i64,
) -> Result<WorkRequest, ApiError> {
    let request = repo
        .get(id)
        .await
        .map_err(ApiError::database)?
        .ok_or(ApiError::NotFound {
            resource: "request".to_string(),
        })?;

    // Only the receiving side may resolve a request
    if request.target_user_id != target_user_id {
        return Err(ApiError::Forbidden {
            reason: Some("only the request target may resolve it".to_string()),
        });
    }

    Ok(request)
}

fn ensure_notification_matches(
    notification: &Notification,
    request_id: i64,
    recipient_id: i64,
) -> Result<(), ApiError> {
    if notification.user_id != recipient_id {
        return Err(ApiError::Forbidden {
            reason: Some("notification belongs to another user".to_string()),
        });
    }
    if notification.request_id != Some(request_id) {
        return Err(ApiError::BadRequest {
            missing: vec![],
            reason: Some("notification does not reference this request".to_string()),
        });
    }
    Ok(())
}

/// The notification named in the path must exist, belong to the caller, and
/// point at the request being resolved.
async fn load_notification(
    notifications: &NotificationRepository,
    notification_id: i64,
    request_id: i64,
    recipient_id: i64,
) -> Result<(), ApiError> {
    let notification = notifications
        .get(notification_id)
        .await
        .map_err(ApiError::database)?
        .ok_or(ApiError::NotFound {
            resource: "notification".to_string(),
        })?;
    ensure_notification_matches(&notification, request_id, recipient_id)
}

/// Find the down payment for a request, creating a pending one when the
/// sender never called initiate.
async fn down_payment_for(
    payments: &PaymentRepository,
    request: &WorkRequest,
    amount_centavos: i64,
) -> Result<InitialPayment, ApiError> {
    if let Some(payment) = payments
        .find_by_request(request.id, "down")
        .await
        .map_err(ApiError::database)?
    {
        return Ok(payment);
    }

    payments
        .insert(NewPayment {
            request_id: request.id,
            user_id: request.user_id,
            amount_centavos,
            kind: "down".to_string(),
        })
        .await
        .map_err(ApiError::database)
}

// POST /api/requests/{id}/accept/{notification_id}
pub async fn accept(
    state: web::Data<AppState>,
    auth: Authenticated,
    path: web::Path<(i64, i64)>,
) -> Result<impl Responder, ApiError> {
    let (request_id, notification_id) = path.into_inner();
    let pool = state.pool()?.clone();

    let requests = RequestRepository::new(pool.clone());
    let request = load_request(&requests, request_id, auth.0.id).await?;
    domain::guard_request_transition(&request.status, RequestStatus::Accepted)?;

    let notifications = NotificationRepository::new(pool.clone());
    load_notification(&notifications, notification_id, request_id, auth.0.id).await?;

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

    let (down, _balance) = domain::split_down_payment(
        post.price_centavos,
        state.payments_config.down_payment_percent,
    );

    let payments = PaymentRepository::new(pool.clone());
    let payment = down_payment_for(&payments, &request, down).await?;
    domain::guard_payment_transition(&payment.status, PaymentStatus::Initiated)?;

    let sender = UserRepository::new(pool.clone())
        .find_by_id(request.user_id)
        .await
        .map_err(ApiError::database)?
        .ok_or(ApiError::NotFound {
            resource: "user".to_string(),
        })?;

    // Gateway first: a failed checkout leaves request and payment untouched.
    let session = state
        .paymongo
        .create_checkout_session(&NewCheckoutSession {
            amount_centavos: down,
            currency: state.payments_config.currency.clone(),
            description: format!("Down payment for \"{}\"", post.title),
            line_item_name: post.title.clone(),
            payment_method_types: state.payments_config.payment_method_types.clone(),
            billing_name: sender.username.clone(),
            billing_email: sender.email.clone(),
            billing_phone: None,
            send_email_receipt: state.payments_config.send_email_receipt,
            success_url: state.paymongo_config.success_url.clone(),
            cancel_url: state.paymongo_config.cancel_url.clone(),
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, request_id = request_id, "Checkout session failed");
            ApiError::Gateway {
                details: e.to_string(),
            }
        })?;

    let changed = requests
        .set_status(request_id, &request.status, RequestStatus::Accepted)
        .await
        .map_err(ApiError::database)?;
    if changed == 0 {
        return Err(ApiError::Conflict {
            reason: "request was resolved concurrently".to_string(),
        });
    }

    let updated = payments
        .set_amount_and_transaction(payment.id, down, &session.id)
        .await
        .map_err(ApiError::database)?;
    ensure_updated(updated, "payment")?;
    let flipped = payments
        .set_status(payment.id, &payment.status, PaymentStatus::Initiated)
        .await
        .map_err(ApiError::database)?;
    ensure_updated(flipped, "payment")?;

    notifications
        .set_status(notification_id, "accepted")
        .await
        .map_err(ApiError::database)?;

    let notifier = state.notifier()?;
    if let Err(e) = notifier
        .send(NewNotification {
            user_id: request.user_id,
            target_user_id: Some(auth.0.id),
            request_id: Some(request_id),
            content: format!(
                "{} accepted your request. Pay the down payment at {}",
                auth.0.username, session.checkout_url
            ),
            status: "unread".to_string(),
        })
        .await
    {
        tracing::warn!(error = %e, request_id = request_id, "Failed to notify sender of accept");
    }

    Ok(HttpResponse::Ok().json(json!({
        "request_id": request_id,
        "status": RequestStatus::Accepted,
        "payment_id": payment.id,
        "amount_centavos": down,
        "checkout_url": session.checkout_url,
    })))
}

// POST /api/requests/{id}/decline/{notification_id}
pub async fn decline(
    state: web::Data<AppState>,
    auth: Authenticated,
    path: web::Path<(i64, i64)>,
) -> Result<impl Responder, ApiError> {
    let (request_id, notification_id) = path.into_inner();
    let pool = state.pool()?.clone();

    let requests = RequestRepository::new(pool.clone());
    let request = load_request(&requests, request_id, auth.0.id).await?;
    domain::guard_request_transition(&request.status, RequestStatus::Declined)?;

    let notifications = NotificationRepository::new(pool.clone());
    load_notification(&notifications, notification_id, request_id, auth.0.id).await?;

    let payments = PaymentRepository::new(pool.clone());
    let down_payment = payments
        .find_by_request(request_id, "down")
        .await
        .map_err(ApiError::database)?;

    // Money already moved through the gateway has to come back before the
    // decline is recorded.
    let mut refunded_payment_id = None;
    if let Some(ref payment) = down_payment {
        if let Some(ref session_id) = payment.transaction_id {
            if payment.status == PaymentStatus::Initiated.as_str()
                || payment.status == PaymentStatus::Paid.as_str()
            {
                domain::guard_payment_transition(&payment.status, PaymentStatus::Refunded)?;

                let refund = state
                    .paymongo
                    .refund_checkout_session(session_id, payment.amount_centavos)
                    .await
                    .map_err(|e| {
                        tracing::error!(error = %e, payment_id = payment.id, "Refund failed");
                        ApiError::Gateway {
                            details: e.to_string(),
                        }
                    })?;
                tracing::info!(
                    payment_id = payment.id,
                    refund_id = %refund.id,
                    refund_status = %refund.status,
                    "Down payment refunded"
                );

                payments
                    .set_status(payment.id, &payment.status, PaymentStatus::Refunded)
                    .await
                    .map_err(ApiError::database)?;
                refunded_payment_id = Some(payment.id);
            }
        }
    }

    let changed = requests
        .set_status(request_id, &request.status, RequestStatus::Declined)
        .await
        .map_err(ApiError::database)?;
    if changed == 0 {
        return Err(ApiError::Conflict {
            reason: "request was resolved concurrently".to_string(),
        });
    }

    notifications
        .set_status(notification_id, "declined")
        .await
        .map_err(ApiError::database)?;

    let notifier = state.notifier()?;
    if let Err(e) = notifier
        .send(NewNotification {
            user_id: request.user_id,
            target_user_id: Some(auth.0.id),
            request_id: Some(request_id),
            content: format!("{} declined your request", auth.0.username),
            status: "unread".to_string(),
        })
        .await
    {
        tracing::warn!(error = %e, request_id = request_id, "Failed to notify sender of decline");
    }

    Ok(HttpResponse::Ok().json(json!({
        "request_id": request_id,
        "status": RequestStatus::Declined,
        "refunded_payment_id": refunded_payment_id,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(user_id: i64, request_id: Option<i64>) -> Notification {
        Notification {
            id: 77,
            user_id,
            target_user_id: Some(1),
            request_id,
            content: "Maria sent you a design request".to_string(),
            status: "unread".to_string(),
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn notification_for_recipient_and_request_passes() {
        let n = notification(9, Some(4));
        assert!(ensure_notification_matches(&n, 4, 9).is_ok());
    }

    #[test]
    fn notification_of_another_user_is_forbidden() {
        let n = notification(9, Some(4));
        let err = ensure_notification_matches(&n, 4, 8).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden { .. }));
    }

    #[test]
    fn notification_for_another_request_is_rejected() {
        let n = notification(9, Some(5));
        let err = ensure_notification_matches(&n, 4, 9).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { .. }));

        let unlinked = notification(9, None);
        let err = ensure_notification_matches(&unlinked, 4, 9).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { .. }));
    }
}

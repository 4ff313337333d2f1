/// Notification inbox
use actix_web::{web, HttpResponse, Responder};
use serde_json::json;

use crate::app_state::AppState;
use crate::errors::ApiError;
use crate::http::middleware::token_auth::Authenticated;
use crate::repository::notifications::NotificationRepository;

// GET /api/notifications
pub async fn list(
    state: web::Data<AppState>,
    auth: Authenticated,
) -> Result<impl Responder, ApiError> {
    let notifications = NotificationRepository::new(state.pool()?.clone())
        .list_for_user(auth.0.id)
        .await
        .map_err(ApiError::database)?;
    Ok(HttpResponse::Ok().json(notifications))
}

// POST /api/notifications/{id}/read
pub async fn mark_read(
    state: web::Data<AppState>,
    auth: Authenticated,
    path: web::Path<i64>,
) -> Result<impl Responder, ApiError> {
    let notification_id = path.into_inner();
    let repo = NotificationRepository::new(state.pool()?.clone());

    let notification = repo
        .get(notification_id)
        .await
        .map_err(ApiError::database)?
        .ok_or(ApiError::NotFound {
            resource: "notification".to_string(),
        })?;

    if notification.user_id != auth.0.id {
        return Err(ApiError::Forbidden {
            reason: Some("not your notification".to_string()),
        });
    }

    repo.set_status(notification_id, "read")
        .await
        .map_err(ApiError::database)?;

    Ok(HttpResponse::Ok().json(json!({ "read": true })))
}

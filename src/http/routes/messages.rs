/// Direct messaging
use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use validator::Validate;

use crate::app_state::AppState;
use crate::errors::ApiError;
use crate::http::middleware::token_auth::Authenticated;
use crate::repository::messages::MessageRepository;
use crate::repository::users::UserRepository;

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    pub receiver_id: i64,
    #[validate(length(min = 1, max = 5000))]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ConversationQuery {
    pub peer_id: i64,
}

// POST /api/messages
pub async fn send(
    state: web::Data<AppState>,
    auth: Authenticated,
    payload: web::Json<SendMessageRequest>,
) -> Result<impl Responder, ApiError> {
    payload.validate().map_err(ApiError::validation)?;

    if payload.receiver_id == auth.0.id {
        return Err(ApiError::BadRequest {
            missing: vec![],
            reason: Some("cannot message yourself".to_string()),
        });
    }

    let pool = state.pool()?.clone();
    UserRepository::new(pool.clone())
        .find_by_id(payload.receiver_id)
        .await
        .map_err(ApiError::database)?
        .ok_or(ApiError::NotFound {
            resource: "user".to_string(),
        })?;

    let message = MessageRepository::new(pool)
        .insert(auth.0.id, payload.receiver_id, &payload.content)
        .await
        .map_err(ApiError::database)?;

    // Push the message onto the recipient's channel for realtime clients
    let notifier = state.notifier()?;
    match serde_json::to_string(&message) {
        Ok(json) => notifier.publish(payload.receiver_id, &json).await,
        Err(e) => tracing::error!(error = %e, "Failed to serialize message"),
    }

    Ok(HttpResponse::Created().json(message))
}

// GET /api/messages?peer_id=
pub async fn conversation(
    state: web::Data<AppState>,
    auth: Authenticated,
    query: web::Query<ConversationQuery>,
) -> Result<impl Responder, ApiError> {
    let messages = MessageRepository::new(state.pool()?.clone())
        .conversation(auth.0.id, query.peer_id)
        .await
        .map_err(ApiError::database)?;
    Ok(HttpResponse::Ok().json(messages))
}

// GET /api/messages/partners
pub async fn partners(
    state: web::Data<AppState>,
    auth: Authenticated,
) -> Result<impl Responder, ApiError> {
    let partners = MessageRepository::new(state.pool()?.clone())
        .partners(auth.0.id)
        .await
        .map_err(ApiError::database)?;
    Ok(HttpResponse::Ok().json(partners))
}

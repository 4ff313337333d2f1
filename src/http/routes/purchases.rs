/// Purchase history
use actix_web::{web, HttpResponse, Responder};

use crate::app_state::AppState;
use crate::errors::ApiError;
use crate::http::middleware::token_auth::Authenticated;
use crate::repository::payments::PaymentRepository;

use super::require_self_or_admin;

// GET /api/purchases/{user_id}
pub async fn for_user(
    state: web::Data<AppState>,
    auth: Authenticated,
    path: web::Path<i64>,
) -> Result<impl Responder, ApiError> {
    let user_id = path.into_inner();
    require_self_or_admin(&auth.0, user_id)?;

    let purchases = PaymentRepository::new(state.pool()?.clone())
        .purchases_for_user(user_id)
        .await
        .map_err(ApiError::database)?;

    Ok(HttpResponse::Ok().json(purchases))
}

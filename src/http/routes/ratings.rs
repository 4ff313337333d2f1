/// Ratings for designers and providers
use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::app_state::AppState;
use crate::errors::ApiError;
use crate::http::middleware::token_auth::Authenticated;
use crate::repository::ratings::RatingRepository;
use crate::repository::users::UserRepository;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRatingRequest {
    pub rated_user_id: i64,
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRatingRequest {
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

// POST /api/ratings
pub async fn create(
    state: web::Data<AppState>,
    auth: Authenticated,
    payload: web::Json<CreateRatingRequest>,
) -> Result<impl Responder, ApiError> {
    payload.validate().map_err(ApiError::validation)?;

    if payload.rated_user_id == auth.0.id {
        return Err(ApiError::BadRequest {
            missing: vec![],
            reason: Some("cannot rate yourself".to_string()),
        });
    }

    let pool = state.pool()?.clone();
    UserRepository::new(pool.clone())
        .find_by_id(payload.rated_user_id)
        .await
        .map_err(ApiError::database)?
        .ok_or(ApiError::NotFound {
            resource: "user".to_string(),
        })?;

    let ratings = RatingRepository::new(pool);
    if ratings
        .exists(auth.0.id, payload.rated_user_id)
        .await
        .map_err(ApiError::database)?
    {
        return Err(ApiError::Conflict {
            reason: "you already rated this user".to_string(),
        });
    }

    let rating = ratings
        .insert(
            auth.0.id,
            payload.rated_user_id,
            payload.rating,
            payload.comment.as_deref(),
        )
        .await
        .map_err(ApiError::database)?;

    Ok(HttpResponse::Created().json(rating))
}

// PUT /api/ratings/{id}
pub async fn update(
    state: web::Data<AppState>,
    auth: Authenticated,
    path: web::Path<i64>,
    payload: web::Json<UpdateRatingRequest>,
) -> Result<impl Responder, ApiError> {
    payload.validate().map_err(ApiError::validation)?;
    let rating_id = path.into_inner();

    let ratings = RatingRepository::new(state.pool()?.clone());
    let existing = ratings
        .get(rating_id)
        .await
        .map_err(ApiError::database)?
        .ok_or(ApiError::NotFound {
            resource: "rating".to_string(),
        })?;

    if existing.rater_user_id != auth.0.id {
        return Err(ApiError::Forbidden {
            reason: Some("only the original rater may edit a rating".to_string()),
        });
    }

    let updated = ratings
        .update(rating_id, payload.rating, payload.comment.as_deref())
        .await
        .map_err(ApiError::database)?
        .ok_or(ApiError::NotFound {
            resource: "rating".to_string(),
        })?;

    Ok(HttpResponse::Ok().json(updated))
}

// GET /api/ratings/user/{user_id}
pub async fn for_user(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<impl Responder, ApiError> {
    let user_id = path.into_inner();
    let ratings = RatingRepository::new(state.pool()?.clone());

    let items = ratings
        .list_for_user(user_id)
        .await
        .map_err(ApiError::database)?;
    let average = ratings
        .average_for_user(user_id)
        .await
        .map_err(ApiError::database)?;

    Ok(HttpResponse::Ok().json(json!({
        "items": items,
        "average": average,
    })))
}

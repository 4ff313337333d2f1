/// User listings, profiles, and admin approval
use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::app_state::AppState;
use crate::errors::ApiError;
use crate::http::middleware::token_auth::Authenticated;
use crate::repository::notifications::NewNotification;
use crate::repository::posts::PostRepository;
use crate::repository::ratings::RatingRepository;
use crate::repository::skills::SkillRepository;
use crate::repository::users::{NewProfile, UserRepository};

use super::{require_admin, require_self_or_admin, PageQuery};

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1))]
    pub first_name: String,
    #[validate(length(min = 1))]
    pub last_name: String,
    pub profile_picture: Option<String>,
    pub cover_photo: Option<String>,
    pub zipcode: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBioSkillsRequest {
    #[validate(length(max = 2000))]
    pub bio: String,
    #[serde(default)]
    pub skills: Vec<i64>,
    #[serde(default)]
    pub printing_skills: Vec<i64>,
}

// GET /api/users
pub async fn list(
    state: web::Data<AppState>,
    auth: Authenticated,
    query: web::Query<PageQuery>,
) -> Result<impl Responder, ApiError> {
    let pagination = query.pagination()?;
    let (users, total) = UserRepository::new(state.pool()?.clone())
        .list_others(auth.0.id, pagination)
        .await
        .map_err(ApiError::database)?;

    Ok(HttpResponse::Ok().json(json!({
        "items": users,
        "page": { "limit": query.limit, "offset": query.offset, "total": total },
    })))
}

// GET /api/users/providers
pub async fn providers(state: web::Data<AppState>) -> Result<impl Responder, ApiError> {
    let providers = UserRepository::new(state.pool()?.clone())
        .list_providers()
        .await
        .map_err(ApiError::database)?;
    Ok(HttpResponse::Ok().json(providers))
}

// GET /api/users/{id}/profile
pub async fn get_profile(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<impl Responder, ApiError> {
    let user_id = path.into_inner();
    let pool = state.pool()?.clone();

    let profile = UserRepository::new(pool.clone())
        .profile(user_id)
        .await
        .map_err(ApiError::database)?
        .ok_or(ApiError::NotFound {
            resource: "profile".to_string(),
        })?;

    let skills_repo = SkillRepository::new(pool.clone());
    let skills = skills_repo
        .skills_for_user(user_id)
        .await
        .map_err(ApiError::database)?;
    let printing_skills = skills_repo
        .printing_skills_for_user(user_id)
        .await
        .map_err(ApiError::database)?;
    let average_rating = RatingRepository::new(pool)
        .average_for_user(user_id)
        .await
        .map_err(ApiError::database)?;

    Ok(HttpResponse::Ok().json(json!({
        "profile": profile,
        "skills": skills,
        "printing_skills": printing_skills,
        "average_rating": average_rating,
    })))
}

// GET /api/users/{id}/images
pub async fn images(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<impl Responder, ApiError> {
    let user_id = path.into_inner();
    let images = PostRepository::new(state.pool()?.clone())
        .user_images(user_id)
        .await
        .map_err(ApiError::database)?;
    Ok(HttpResponse::Ok().json(json!({ "images": images })))
}

// PUT /api/users/{id}/profile
pub async fn update_profile(
    state: web::Data<AppState>,
    auth: Authenticated,
    path: web::Path<i64>,
    payload: web::Json<UpdateProfileRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = path.into_inner();
    require_self_or_admin(&auth.0, user_id)?;
    payload.validate().map_err(ApiError::validation)?;

    let updated = UserRepository::new(state.pool()?.clone())
        .update_profile(
            user_id,
            NewProfile {
                first_name: payload.first_name.clone(),
                last_name: payload.last_name.clone(),
                profile_picture: payload.profile_picture.clone(),
                cover_photo: payload.cover_photo.clone(),
                zipcode: payload.zipcode.clone(),
                bio: None,
            },
        )
        .await
        .map_err(ApiError::database)?;

    if updated == 0 {
        return Err(ApiError::NotFound {
            resource: "profile".to_string(),
        });
    }

    Ok(HttpResponse::Ok().json(json!({ "updated": true })))
}

// PUT /api/users/{id}/bio-skills
pub async fn update_bio_skills(
    state: web::Data<AppState>,
    auth: Authenticated,
    path: web::Path<i64>,
    payload: web::Json<UpdateBioSkillsRequest>,
) -> Result<impl Responder, ApiError> {
    let user_id = path.into_inner();
    require_self_or_admin(&auth.0, user_id)?;
    payload.validate().map_err(ApiError::validation)?;

    let pool = state.pool()?.clone();
    UserRepository::new(pool.clone())
        .update_bio(user_id, &payload.bio)
        .await
        .map_err(ApiError::database)?;

    let skills = SkillRepository::new(pool);
    skills
        .replace_user_skills(user_id, &payload.skills)
        .await
        .map_err(ApiError::database)?;
    skills
        .replace_user_printing_skills(user_id, &payload.printing_skills)
        .await
        .map_err(ApiError::database)?;

    Ok(HttpResponse::Ok().json(json!({ "updated": true })))
}

// POST /api/users/{id}/verify
pub async fn verify(
    state: web::Data<AppState>,
    auth: Authenticated,
    path: web::Path<i64>,
) -> Result<impl Responder, ApiError> {
    require_admin(&auth.0)?;
    let user_id = path.into_inner();

    let updated = UserRepository::new(state.pool()?.clone())
        .set_verified(user_id, true)
        .await
        .map_err(ApiError::database)?;

    if updated == 0 {
        return Err(ApiError::NotFound {
            resource: "user".to_string(),
        });
    }

    let notifier = state.notifier()?;
    if let Err(e) = notifier
        .send(NewNotification {
            user_id,
            target_user_id: Some(auth.0.id),
            request_id: None,
            content: "Your account has been approved".to_string(),
            status: "unread".to_string(),
        })
        .await
    {
        tracing::warn!(error = %e, user_id = user_id, "Failed to notify approved user");
    }

    Ok(HttpResponse::Ok().json(json!({ "verified": true })))
}

// GET /api/skills
pub async fn skills(state: web::Data<AppState>) -> Result<impl Responder, ApiError> {
    let skills = SkillRepository::new(state.pool()?.clone())
        .all_skills()
        .await
        .map_err(ApiError::database)?;
    Ok(HttpResponse::Ok().json(skills))
}

// GET /api/printing-skills
pub async fn printing_skills(state: web::Data<AppState>) -> Result<impl Responder, ApiError> {
    let skills = SkillRepository::new(state.pool()?.clone())
        .all_printing_skills()
        .await
        .map_err(ApiError::database)?;
    Ok(HttpResponse::Ok().json(skills))
}

/// Physical store locations for printing providers
use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::app_state::AppState;
use crate::errors::ApiError;
use crate::http::middleware::token_auth::Authenticated;
use crate::repository::stores::{NewStore, StoreRepository};

#[derive(Debug, Deserialize, Validate)]
pub struct StoreRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

// POST /api/stores
pub async fn create(
    state: web::Data<AppState>,
    auth: Authenticated,
    payload: web::Json<StoreRequest>,
) -> Result<impl Responder, ApiError> {
    payload.validate().map_err(ApiError::validation)?;

    let store = StoreRepository::new(state.pool()?.clone())
        .insert(NewStore {
            user_id: auth.0.id,
            name: payload.name.clone(),
            description: payload.description.clone(),
            latitude: payload.latitude,
            longitude: payload.longitude,
        })
        .await
        .map_err(ApiError::database)?;

    Ok(HttpResponse::Created().json(store))
}

// GET /api/stores
pub async fn list(state: web::Data<AppState>) -> Result<impl Responder, ApiError> {
    let stores = StoreRepository::new(state.pool()?.clone())
        .list_all()
        .await
        .map_err(ApiError::database)?;
    Ok(HttpResponse::Ok().json(stores))
}

// GET /api/stores/{id}
pub async fn get(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<impl Responder, ApiError> {
    let store = StoreRepository::new(state.pool()?.clone())
        .get(path.into_inner())
        .await
        .map_err(ApiError::database)?
        .ok_or(ApiError::NotFound {
            resource: "store".to_string(),
        })?;
    Ok(HttpResponse::Ok().json(store))
}

// PUT /api/stores/{id}
pub async fn update(
    state: web::Data<AppState>,
    auth: Authenticated,
    path: web::Path<i64>,
    payload: web::Json<StoreRequest>,
) -> Result<impl Responder, ApiError> {
    payload.validate().map_err(ApiError::validation)?;
    let store_id = path.into_inner();
    let repo = StoreRepository::new(state.pool()?.clone());

    let existing = repo
        .get(store_id)
        .await
        .map_err(ApiError::database)?
        .ok_or(ApiError::NotFound {
            resource: "store".to_string(),
        })?;

    if existing.user_id != auth.0.id {
        return Err(ApiError::Forbidden {
            reason: Some("only the owner may edit a store".to_string()),
        });
    }

    let store = repo
        .update(
            store_id,
            NewStore {
                user_id: existing.user_id,
                name: payload.name.clone(),
                description: payload.description.clone(),
                latitude: payload.latitude,
                longitude: payload.longitude,
            },
        )
        .await
        .map_err(ApiError::database)?
        .ok_or(ApiError::NotFound {
            resource: "store".to_string(),
        })?;

    Ok(HttpResponse::Ok().json(store))
}

// DELETE /api/stores/{id}
pub async fn delete(
    state: web::Data<AppState>,
    auth: Authenticated,
    path: web::Path<i64>,
) -> Result<impl Responder, ApiError> {
    let store_id = path.into_inner();
    let repo = StoreRepository::new(state.pool()?.clone());

    let existing = repo
        .get(store_id)
        .await
        .map_err(ApiError::database)?
        .ok_or(ApiError::NotFound {
            resource: "store".to_string(),
        })?;

    if existing.user_id != auth.0.id && auth.0.role_name != "admin" {
        return Err(ApiError::Forbidden {
            reason: Some("only the owner or an admin may delete a store".to_string()),
        });
    }

    repo.delete(store_id).await.map_err(ApiError::database)?;
    Ok(HttpResponse::Ok().json(json!({ "deleted": true })))
}

// GET /api/stores/search?q=
pub async fn search(
    state: web::Data<AppState>,
    query: web::Query<SearchQuery>,
) -> Result<impl Responder, ApiError> {
    let stores = StoreRepository::new(state.pool()?.clone())
        .search(&query.q)
        .await
        .map_err(ApiError::database)?;
    Ok(HttpResponse::Ok().json(stores))
}

// GET /api/stores/user/{user_id}
pub async fn for_user(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<impl Responder, ApiError> {
    let stores = StoreRepository::new(state.pool()?.clone())
        .for_user(path.into_inner())
        .await
        .map_err(ApiError::database)?;
    Ok(HttpResponse::Ok().json(stores))
}

/// Post feed and tag endpoints
use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::app_state::AppState;
use crate::errors::ApiError;
use crate::http::middleware::token_auth::Authenticated;
use crate::repository::posts::{NewPost, PostFilter, PostRepository};
use crate::repository::tags::TagRepository;

use super::PageQuery;

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1))]
    pub content: String,
    #[validate(range(min = 0))]
    pub price_centavos: i64,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// "designer" | "provider" | "client"
    pub role: Option<String>,
    pub user_id: Option<i64>,
    pub tag: Option<String>,
    #[serde(default = "super::default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

#[derive(Debug, Deserialize)]
pub struct TagSearchQuery {
    pub tag: String,
    #[serde(default = "super::default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn role_filter(alias: &str) -> Result<String, ApiError> {
    match alias {
        "designer" => Ok("graphic_designer".to_string()),
        "provider" => Ok("printing_provider".to_string()),
        "client" => Ok("client".to_string()),
        _ => Err(ApiError::BadRequest {
            missing: vec![],
            reason: Some("role must be one of: designer, provider, client".to_string()),
        }),
    }
}

// POST /api/posts
pub async fn create(
    state: web::Data<AppState>,
    auth: Authenticated,
    payload: web::Json<CreatePostRequest>,
) -> Result<impl Responder, ApiError> {
    payload.validate().map_err(ApiError::validation)?;

    let pool = state.pool()?.clone();
    let post = PostRepository::new(pool.clone())
        .insert(NewPost {
            user_id: auth.0.id,
            title: payload.title.clone(),
            content: payload.content.clone(),
            price_centavos: payload.price_centavos,
            images: payload.images.clone(),
        })
        .await
        .map_err(ApiError::database)?;

    let tags_repo = TagRepository::new(pool);
    if !payload.tags.is_empty() {
        tags_repo
            .attach_to_post(post.id, &payload.tags)
            .await
            .map_err(ApiError::database)?;
    }
    let tags = tags_repo
        .for_post(post.id)
        .await
        .map_err(ApiError::database)?;

    Ok(HttpResponse::Created().json(json!({ "post": post, "tags": tags })))
}

// GET /api/posts
pub async fn list(
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<impl Responder, ApiError> {
    let pagination = PageQuery {
        limit: query.limit,
        offset: query.offset,
    }
    .pagination()?;
    let author_role = match query.role.as_deref() {
        Some(alias) => Some(role_filter(alias)?),
        None => None,
    };

    let posts = PostRepository::new(state.pool()?.clone())
        .list(
            PostFilter {
                author_id: query.user_id,
                author_role,
                tag: query.tag.clone(),
            },
            pagination,
        )
        .await
        .map_err(ApiError::database)?;

    Ok(HttpResponse::Ok().json(posts))
}

// GET /api/posts/mine
pub async fn mine(
    state: web::Data<AppState>,
    auth: Authenticated,
    query: web::Query<PageQuery>,
) -> Result<impl Responder, ApiError> {
    let pagination = query.pagination()?;
    let posts = PostRepository::new(state.pool()?.clone())
        .list(
            PostFilter {
                author_id: Some(auth.0.id),
                ..PostFilter::default()
            },
            pagination,
        )
        .await
        .map_err(ApiError::database)?;

    Ok(HttpResponse::Ok().json(posts))
}

// GET /api/posts/search?tag=
pub async fn search(
    state: web::Data<AppState>,
    query: web::Query<TagSearchQuery>,
) -> Result<impl Responder, ApiError> {
    let pagination = PageQuery {
        limit: query.limit,
        offset: query.offset,
    }
    .pagination()?;
    let posts = PostRepository::new(state.pool()?.clone())
        .list(
            PostFilter {
                tag: Some(query.tag.clone()),
                ..PostFilter::default()
            },
            pagination,
        )
        .await
        .map_err(ApiError::database)?;

    Ok(HttpResponse::Ok().json(posts))
}

// GET /api/posts/{id}
pub async fn get(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<impl Responder, ApiError> {
    let post_id = path.into_inner();
    let pool = state.pool()?.clone();

    let post = PostRepository::new(pool.clone())
        .get(post_id)
        .await
        .map_err(ApiError::database)?
        .ok_or(ApiError::NotFound {
            resource: "post".to_string(),
        })?;

    let tags = TagRepository::new(pool)
        .for_post(post_id)
        .await
        .map_err(ApiError::database)?;

    Ok(HttpResponse::Ok().json(json!({ "post": post, "tags": tags })))
}

// PUT /api/posts/{id}
pub async fn update(
    state: web::Data<AppState>,
    auth: Authenticated,
    path: web::Path<i64>,
    payload: web::Json<CreatePostRequest>,
) -> Result<impl Responder, ApiError> {
    payload.validate().map_err(ApiError::validation)?;
    let post_id = path.into_inner();
    let pool = state.pool()?.clone();
    let repo = PostRepository::new(pool.clone());

    let existing = repo
        .get(post_id)
        .await
        .map_err(ApiError::database)?
        .ok_or(ApiError::NotFound {
            resource: "post".to_string(),
        })?;

    if existing.user_id != auth.0.id {
        return Err(ApiError::Forbidden {
            reason: Some("only the author may edit a post".to_string()),
        });
    }

    let post = repo
        .update(
            post_id,
            &payload.title,
            &payload.content,
            payload.price_centavos,
            &payload.images,
        )
        .await
        .map_err(ApiError::database)?
        .ok_or(ApiError::NotFound {
            resource: "post".to_string(),
        })?;

    let tags_repo = TagRepository::new(pool);
    if !payload.tags.is_empty() {
        tags_repo
            .attach_to_post(post.id, &payload.tags)
            .await
            .map_err(ApiError::database)?;
    }
    let tags = tags_repo
        .for_post(post.id)
        .await
        .map_err(ApiError::database)?;

    Ok(HttpResponse::Ok().json(json!({ "post": post, "tags": tags })))
}

// DELETE /api/posts/{id}
pub async fn delete(
    state: web::Data<AppState>,
    auth: Authenticated,
    path: web::Path<i64>,
) -> Result<impl Responder, ApiError> {
    let post_id = path.into_inner();
    let repo = PostRepository::new(state.pool()?.clone());

    let existing = repo
        .get(post_id)
        .await
        .map_err(ApiError::database)?
        .ok_or(ApiError::NotFound {
            resource: "post".to_string(),
        })?;

    if existing.user_id != auth.0.id && auth.0.role_name != "admin" {
        return Err(ApiError::Forbidden {
            reason: Some("only the author or an admin may delete a post".to_string()),
        });
    }

    repo.delete(post_id).await.map_err(ApiError::database)?;
    Ok(HttpResponse::Ok().json(json!({ "deleted": true })))
}

// GET /api/tags
pub async fn tags(state: web::Data<AppState>) -> Result<impl Responder, ApiError> {
    let tags = TagRepository::new(state.pool()?.clone())
        .all()
        .await
        .map_err(ApiError::database)?;
    Ok(HttpResponse::Ok().json(tags))
}

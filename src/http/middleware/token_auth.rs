/// Bearer-token authentication middleware
///
/// Resolves `Authorization: Bearer <token>` against stored token digests
/// and injects the authenticated user into request extensions.
use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, FromRequest, HttpMessage, HttpRequest, HttpResponse,
};
use futures_util::future::LocalBoxFuture;
use serde::Serialize;
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use crate::app_state::AppState;
use crate::config::AuthConfig;
use crate::repository::tokens::{AuthUser, TokenRepository};
use crate::security;

#[derive(Serialize)]
struct AuthErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    missing: Option<Vec<String>>,
}

#[derive(Clone)]
pub struct TokenAuth {
    config: AuthConfig,
}

impl TokenAuth {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }
}

impl<S, B> Transform<S, ServiceRequest> for TokenAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = TokenAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TokenAuthMiddleware {
            service: Rc::new(service),
            config: self.config.clone(),
        }))
    }
}

pub struct TokenAuthMiddleware<S> {
    service: Rc<S>,
    config: AuthConfig,
}

impl<S> TokenAuthMiddleware<S> {
    fn is_bypassed(&self, path: &str) -> bool {
        self.config.bypass_paths.iter().any(|bp| path == bp)
    }

    fn is_protected(&self, path: &str) -> bool {
        self.config
            .protect_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix))
    }
}

fn bearer_token(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

impl<S, B> Service<ServiceRequest> for TokenAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Skip if disabled
        if !self.config.enabled {
            let service = self.service.clone();
            return Box::pin(async move {
                let res = service.call(req).await?;
                Ok(res.map_into_left_body())
            });
        }

        let path = req.path().to_string();

        // Skip bypassed paths
        if self.is_bypassed(&path) {
            let service = self.service.clone();
            return Box::pin(async move {
                let res = service.call(req).await?;
                Ok(res.map_into_left_body())
            });
        }

        // Skip unprotected paths
        if !self.is_protected(&path) {
            let service = self.service.clone();
            return Box::pin(async move {
                let res = service.call(req).await?;
                Ok(res.map_into_left_body())
            });
        }

        let token = match bearer_token(&req) {
            Some(t) => t,
            None => {
                let response = HttpResponse::Unauthorized().json(AuthErrorResponse {
                    error: "unauthorized".to_string(),
                    reason: None,
                    missing: Some(vec!["authorization".to_string()]),
                });
                let (req, _) = req.into_parts();
                return Box::pin(async move {
                    Ok(ServiceResponse::new(req, response).map_into_right_body())
                });
            }
        };

        let pool = req
            .app_data::<actix_web::web::Data<AppState>>()
            .and_then(|state| state.postgres.clone());

        let service = self.service.clone();

        Box::pin(async move {
            let pool = match pool {
                Some(pool) => pool,
                None => {
                    tracing::error!("Database not available for auth");
                    let response = HttpResponse::ServiceUnavailable().json(AuthErrorResponse {
                        error: "service_unavailable".to_string(),
                        reason: Some("database_unavailable".to_string()),
                        missing: None,
                    });
                    let (req, _) = req.into_parts();
                    return Ok(ServiceResponse::new(req, response).map_into_right_body());
                }
            };

            let digest = security::hash_token(&token);
            let user = match TokenRepository::new(pool).resolve(&digest).await {
                Ok(user) => user,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to resolve token");
                    let response = HttpResponse::InternalServerError().json(AuthErrorResponse {
                        error: "internal".to_string(),
                        reason: Some("token_lookup_failed".to_string()),
                        missing: None,
                    });
                    let (req, _) = req.into_parts();
                    return Ok(ServiceResponse::new(req, response).map_into_right_body());
                }
            };

            let user = match user {
                Some(user) => user,
                None => {
                    tracing::warn!(path = %path, "Unknown or revoked token");
                    let response = HttpResponse::Unauthorized().json(AuthErrorResponse {
                        error: "unauthorized".to_string(),
                        reason: Some("invalid_token".to_string()),
                        missing: None,
                    });
                    let (req, _) = req.into_parts();
                    return Ok(ServiceResponse::new(req, response).map_into_right_body());
                }
            };

            req.extensions_mut().insert(user);

            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}

/// Extractor for the authenticated user placed by [`TokenAuth`].
pub struct Authenticated(pub AuthUser);

impl FromRequest for Authenticated {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        let user = req.extensions().get::<AuthUser>().cloned();
        ready(match user {
            Some(user) => Ok(Authenticated(user)),
            None => Err(crate::errors::ApiError::Unauthorized {
                reason: Some("authentication required".to_string()),
            }
            .into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn middleware() -> TokenAuthMiddleware<()> {
        TokenAuthMiddleware {
            service: Rc::new(()),
            config: AuthConfig::default(),
        }
    }

    #[test]
    fn bypass_is_exact_match() {
        let mw = middleware();
        assert!(mw.is_bypassed("/api/auth/login"));
        assert!(!mw.is_bypassed("/api/auth/login/extra"));
    }

    #[test]
    fn api_prefix_is_protected() {
        let mw = middleware();
        assert!(mw.is_protected("/api/posts"));
        assert!(!mw.is_protected("/healthz"));
    }
}

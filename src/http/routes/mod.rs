/// Route modules

pub mod auth;
pub mod health;
pub mod messages;
pub mod notifications;
pub mod payments;
pub mod posts;
pub mod purchases;
pub mod ratings;
pub mod requests;
pub mod stores;
pub mod users;
pub mod version;

use actix_web::web;
use serde::Deserialize;

use crate::errors::ApiError;
use crate::repository::tokens::AuthUser;
use crate::repository::Pagination;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

impl PageQuery {
    pub fn pagination(&self) -> Result<Pagination, ApiError> {
        if self.limit < 1 || self.limit > 200 {
            return Err(ApiError::BadRequest {
                missing: vec![],
                reason: Some("limit must be between 1 and 200".to_string()),
            });
        }
        if self.offset < 0 {
            return Err(ApiError::BadRequest {
                missing: vec![],
                reason: Some("offset must not be negative".to_string()),
            });
        }
        Ok(Pagination {
            limit: self.limit,
            offset: self.offset,
        })
    }
}

/// Guard a compare-and-swap style UPDATE: zero affected rows means another
/// request changed the row first.
pub fn ensure_updated(rows: u64, what: &str) -> Result<(), ApiError> {
    if rows == 0 {
        return Err(ApiError::Conflict {
            reason: format!("{} was updated concurrently", what),
        });
    }
    Ok(())
}

pub fn require_admin(user: &AuthUser) -> Result<(), ApiError> {
    if user.role_name == "admin" {
        Ok(())
    } else {
        Err(ApiError::Forbidden {
            reason: Some("admin role required".to_string()),
        })
    }
}

pub fn require_self_or_admin(user: &AuthUser, target_user_id: i64) -> Result<(), ApiError> {
    if user.id == target_user_id || user.role_name == "admin" {
        Ok(())
    } else {
        Err(ApiError::Forbidden {
            reason: Some("not allowed for this user".to_string()),
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/healthz", web::get().to(health::healthz))
        .route("/readyz", web::get().to(health::readyz))
        .route("/version", web::get().to(version::version))
        .service(
            web::scope("/api")
                .service(
                    web::scope("/auth")
                        .route("/register", web::post().to(auth::register))
                        .route("/login", web::post().to(auth::login))
                        .route("/logout", web::post().to(auth::logout))
                        .route("/verify-email", web::post().to(auth::verify_email))
                        .route("/forgot-password", web::post().to(auth::forgot_password))
                        .route("/reset-password", web::post().to(auth::reset_password)),
                )
                .route("/roles", web::get().to(auth::roles))
                .route("/skills", web::get().to(users::skills))
                .route("/printing-skills", web::get().to(users::printing_skills))
                .service(
                    web::scope("/users")
                        .route("/me", web::get().to(auth::me))
                        .route("/providers", web::get().to(users::providers))
                        .route("", web::get().to(users::list))
                        .route("/{id}/profile", web::get().to(users::get_profile))
                        .route("/{id}/images", web::get().to(users::images))
                        .route("/{id}/profile", web::put().to(users::update_profile))
                        .route("/{id}/bio-skills", web::put().to(users::update_bio_skills))
                        .route("/{id}/verify", web::post().to(users::verify))
                        .route(
                            "/{id}/requests-payments",
                            web::get().to(payments::requests_payments),
                        ),
                )
                .service(
                    web::scope("/posts")
                        .route("", web::post().to(posts::create))
                        .route("", web::get().to(posts::list))
                        .route("/mine", web::get().to(posts::mine))
                        .route("/search", web::get().to(posts::search))
                        .route("/{id}", web::get().to(posts::get))
                        .route("/{id}", web::put().to(posts::update))
                        .route("/{id}", web::delete().to(posts::delete)),
                )
                .route("/tags", web::get().to(posts::tags))
                .service(
                    web::scope("/requests")
                        .route("", web::post().to(requests::create))
                        .route("", web::get().to(requests::list))
                        .route(
                            "/{id}/accept/{notification_id}",
                            web::post().to(requests::accept),
                        )
                        .route(
                            "/{id}/decline/{notification_id}",
                            web::post().to(requests::decline),
                        ),
                )
                .service(
                    web::scope("/payments")
                        .route("/initiate", web::post().to(payments::initiate))
                        .route("/balance/{request_id}", web::post().to(payments::balance))
                        .route("/success", web::get().to(payments::success))
                        .route("/failed", web::get().to(payments::failed)),
                )
                .route("/paymongo/webhook", web::post().to(payments::webhook))
                .route("/purchases/{user_id}", web::get().to(purchases::for_user))
                .service(
                    web::scope("/admin").service(
                        web::scope("/payments")
                            .route("", web::get().to(payments::admin_list))
                            .route("/{id}/approve", web::post().to(payments::admin_approve)),
                    ),
                )
                .route("/sales-report", web::get().to(payments::sales_report))
                .service(
                    web::scope("/messages")
                        .route("", web::post().to(messages::send))
                        .route("", web::get().to(messages::conversation))
                        .route("/partners", web::get().to(messages::partners)),
                )
                .service(
                    web::scope("/notifications")
                        .route("", web::get().to(notifications::list))
                        .route("/{id}/read", web::post().to(notifications::mark_read)),
                )
                .service(
                    web::scope("/ratings")
                        .route("", web::post().to(ratings::create))
                        .route("/{id}", web::put().to(ratings::update))
                        .route("/user/{user_id}", web::get().to(ratings::for_user)),
                )
                .service(
                    web::scope("/stores")
                        .route("", web::post().to(stores::create))
                        .route("", web::get().to(stores::list))
                        .route("/search", web::get().to(stores::search))
                        .route("/user/{user_id}", web::get().to(stores::for_user))
                        .route("/{id}", web::get().to(stores::get))
                        .route("/{id}", web::put().to(stores::update))
                        .route("/{id}", web::delete().to(stores::delete)),
                ),
        );
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ensure_updated_accepts_any_affected_rows() {
        assert!(ensure_updated(1, "payment").is_ok());
        assert!(ensure_updated(3, "payment").is_ok());
    }

    #[test]
    fn ensure_updated_turns_lost_race_into_conflict() {
        let err = ensure_updated(0, "payment").unwrap_err();
        match err {
            ApiError::Conflict { reason } => {
                assert_eq!(reason, "payment was updated concurrently");
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }
}

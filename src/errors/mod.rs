/// Error handling module
///
/// Provides unified error responses
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;

#[derive(Debug)]
pub enum ApiError {
    Internal {
        reason: String,
    },
    BadRequest {
        missing: Vec<String>,
        reason: Option<String>,
    },
    Unauthorized {
        reason: Option<String>,
    },
    Forbidden {
        reason: Option<String>,
    },
    NotFound {
        resource: String,
    },
    Conflict {
        reason: String,
    },
    Gateway {
        details: String,
    },
    ServiceUnavailable {
        details: String,
    },
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<String>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Internal { reason } => write!(f, "Internal error: {}", reason),
            ApiError::BadRequest { missing, reason } => {
                write!(f, "Bad request: {:?}, {:?}", missing, reason)
            }
            ApiError::Unauthorized { reason } => write!(f, "Unauthorized: {:?}", reason),
            ApiError::Forbidden { reason } => write!(f, "Forbidden: {:?}", reason),
            ApiError::NotFound { resource } => write!(f, "Not found: {}", resource),
            ApiError::Conflict { reason } => write!(f, "Conflict: {}", reason),
            ApiError::Gateway { details } => write!(f, "Payment gateway error: {}", details),
            ApiError::ServiceUnavailable { details } => {
                write!(f, "Service unavailable: {}", details)
            }
        }
    }
}

impl ApiError {
    /// Map a sqlx error to an internal error, logging the cause.
    pub fn database(e: sqlx::Error) -> Self {
        tracing::error!(error = %e, "Database query failed");
        ApiError::Internal {
            reason: "Database query failed".to_string(),
        }
    }

    /// Convert validator output into a BadRequest listing offending fields.
    pub fn validation(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .keys()
            .map(|k| k.to_string())
            .collect();
        fields.sort();
        ApiError::BadRequest {
            missing: fields,
            reason: Some("validation failed".to_string()),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Gateway { .. } => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let response = match self {
            ApiError::Internal { reason } => ErrorResponse {
                error: "Internal server error".to_string(),
                details: Some(reason.clone()),
                missing: None,
            },
            ApiError::BadRequest { missing, reason } => ErrorResponse {
                error: "Bad request".to_string(),
                details: reason.clone(),
                missing: if missing.is_empty() {
                    None
                } else {
                    Some(missing.clone())
                },
            },
            ApiError::Unauthorized { reason } => ErrorResponse {
                error: "Unauthorized".to_string(),
                details: reason.clone(),
                missing: None,
            },
            ApiError::Forbidden { reason } => ErrorResponse {
                error: "Forbidden".to_string(),
                details: reason.clone(),
                missing: None,
            },
            ApiError::NotFound { resource } => ErrorResponse {
                error: format!("{} not found", resource),
                details: None,
                missing: None,
            },
            ApiError::Conflict { reason } => ErrorResponse {
                error: "Conflict".to_string(),
                details: Some(reason.clone()),
                missing: None,
            },
            ApiError::Gateway { details } => ErrorResponse {
                error: "Payment gateway error".to_string(),
                details: Some(details.clone()),
                missing: None,
            },
            ApiError::ServiceUnavailable { details } => ErrorResponse {
                error: "Service unavailable".to_string(),
                details: Some(details.clone()),
                missing: None,
            },
        };
        HttpResponse::build(status).json(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_variants() {
        assert_eq!(
            ApiError::NotFound {
                resource: "post".into()
            }
            .status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Conflict {
                reason: "already accepted".into()
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Gateway {
                details: "refund failed".into()
            }
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn validation_lists_fields_sorted() {
        use validator::Validate;

        #[derive(Validate)]
        struct Payload {
            #[validate(length(min = 1))]
            username: String,
            #[validate(email)]
            email: String,
        }

        let bad = Payload {
            username: String::new(),
            email: "not-an-email".into(),
        };
        let err = ApiError::validation(bad.validate().unwrap_err());
        match err {
            ApiError::BadRequest { missing, .. } => {
                assert_eq!(missing, vec!["email".to_string(), "username".to_string()]);
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}

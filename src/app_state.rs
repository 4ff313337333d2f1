/// Application state

use crate::config::{AuthConfig, PaymentsConfig, PaymongoConfig, ServiceConfig};
use crate::notify::Notifier;
use crate::paymongo;
use redis::aio::ConnectionManager;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub service_config: ServiceConfig,
    pub auth_config: AuthConfig,
    pub paymongo_config: PaymongoConfig,
    pub payments_config: PaymentsConfig,
    pub postgres: Option<PgPool>,
    pub redis: Option<ConnectionManager>,
    pub paymongo: paymongo::Client,
}

impl AppState {
    pub fn new(
        service_config: ServiceConfig,
        auth_config: AuthConfig,
        paymongo_config: PaymongoConfig,
        payments_config: PaymentsConfig,
        postgres: Option<PgPool>,
        redis: Option<ConnectionManager>,
    ) -> Self {
        let paymongo = paymongo::Client::new(&paymongo_config);
        Self {
            service_config,
            auth_config,
            paymongo_config,
            payments_config,
            postgres,
            redis,
            paymongo,
        }
    }

    /// Pool accessor used by every handler that needs the database.
    pub fn pool(&self) -> Result<&PgPool, crate::errors::ApiError> {
        self.postgres
            .as_ref()
            .ok_or_else(|| crate::errors::ApiError::ServiceUnavailable {
                details: "Database not available".to_string(),
            })
    }

    pub fn notifier(&self) -> Result<Notifier, crate::errors::ApiError> {
        Ok(Notifier::new(self.pool()?.clone(), self.redis.clone()))
    }
}

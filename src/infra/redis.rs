/// Redis integration

use crate::config::IntegrationsConfig;
use redis::{aio::ConnectionManager, Client};
use std::time::Duration;

pub async fn init_redis(config: &IntegrationsConfig) -> Option<ConnectionManager> {
    if !config.enable_redis {
        tracing::info!("Redis integration disabled");
        return None;
    }

    if config.redis_url.is_empty() {
        tracing::warn!("Redis enabled but redis_url is empty");
        return None;
    }

    tracing::info!(
        redis_url = %config.redis_url.split('@').last().unwrap_or("***"),
        connect_timeout_ms = %config.redis_connect_timeout_ms,
        "Initializing Redis connection"
    );

    match Client::open(config.redis_url.as_str()) {
        Ok(client) => {
            match tokio::time::timeout(
                Duration::from_millis(config.redis_connect_timeout_ms),
                ConnectionManager::new(client),
            )
            .await
            {
                Ok(Ok(manager)) => {
                    tracing::info!("Redis connection initialized successfully");
                    Some(manager)
                }
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "Failed to connect to Redis");
                    None
                }
                Err(_) => {
                    tracing::error!("Redis connection timeout");
                    None
                }
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to create Redis client");
            None
        }
    }
}

pub async fn check_redis_health(manager: &mut ConnectionManager) -> Result<(), String> {
    match redis::cmd("PING")
        .query_async::<_, String>(manager)
        .await
    {
        Ok(_pong) => Ok(()),
        Err(e) => Err(format!("Redis health check failed: {}", e)),
    }
}

/// Notification fan-out
///
/// Persists the notification row and, when Redis is up, publishes it on the
/// recipient's channel for the realtime layer. Redis being down degrades to
/// DB-only delivery.
use redis::aio::ConnectionManager;
use sqlx::PgPool;

use crate::repository::notifications::{NewNotification, Notification, NotificationRepository};

pub fn channel_for_user(user_id: i64) -> String {
    format!("notify:user:{}", user_id)
}

#[derive(Clone)]
pub struct Notifier {
    pool: PgPool,
    redis: Option<ConnectionManager>,
}

impl Notifier {
    pub fn new(pool: PgPool, redis: Option<ConnectionManager>) -> Self {
        Self { pool, redis }
    }

    pub async fn send(&self, notification: NewNotification) -> Result<Notification, sqlx::Error> {
        let repo = NotificationRepository::new(self.pool.clone());
        let saved = repo.insert(notification).await?;

        match serde_json::to_string(&saved) {
            Ok(payload) => self.publish(saved.user_id, &payload).await,
            Err(e) => tracing::error!(error = %e, "Failed to serialize notification"),
        }

        Ok(saved)
    }

    /// Fire a payload at the user's channel. Delivery is best-effort.
    pub async fn publish(&self, user_id: i64, payload: &str) {
        let Some(redis_conn) = self.redis.clone() else {
            return;
        };

        let channel = channel_for_user(user_id);
        let mut conn = redis_conn;
        match redis::cmd("PUBLISH")
            .arg(&channel)
            .arg(payload)
            .query_async::<_, i64>(&mut conn)
            .await
        {
            Ok(receivers) => {
                tracing::debug!(channel = %channel, receivers = receivers, "Event published");
            }
            Err(e) => {
                tracing::warn!(error = %e, channel = %channel, "Failed to publish event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_names_are_per_recipient() {
        assert_eq!(channel_for_user(7), "notify:user:7");
        assert_ne!(channel_for_user(7), channel_for_user(8));
    }
}

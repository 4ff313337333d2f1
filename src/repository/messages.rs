use serde::Serialize;
use sqlx::PgPool;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Chat-list entry: the peer plus the latest exchanged message.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ChatPartner {
    pub peer_id: i64,
    pub peer_username: String,
    pub last_message: String,
    pub last_message_at: chrono::DateTime<chrono::Utc>,
}

pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        sender_id: i64,
        receiver_id: i64,
        content: &str,
    ) -> Result<Message, sqlx::Error> {
        sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (sender_id, receiver_id, content)
            VALUES ($1, $2, $3)
            RETURNING id, sender_id, receiver_id, content, created_at
            "#,
        )
        .bind(sender_id)
        .bind(receiver_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await
    }

    /// Full conversation between two users, oldest first.
    pub async fn conversation(
        &self,
        user_id: i64,
        peer_id: i64,
    ) -> Result<Vec<Message>, sqlx::Error> {
        sqlx::query_as::<_, Message>(
            r#"
            SELECT id, sender_id, receiver_id, content, created_at
            FROM messages
            WHERE (sender_id = $1 AND receiver_id = $2)
               OR (sender_id = $2 AND receiver_id = $1)
            ORDER BY created_at
            "#,
        )
        .bind(user_id)
        .bind(peer_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Everyone the user has exchanged messages with, most recent first.
    pub async fn partners(&self, user_id: i64) -> Result<Vec<ChatPartner>, sqlx::Error> {
        sqlx::query_as::<_, ChatPartner>(
            r#"
            SELECT DISTINCT ON (peer_id)
                   CASE WHEN m.sender_id = $1 THEN m.receiver_id ELSE m.sender_id END AS peer_id,
                   u.username AS peer_username,
                   m.content AS last_message,
                   m.created_at AS last_message_at
            FROM messages m
            JOIN users u
              ON u.id = CASE WHEN m.sender_id = $1 THEN m.receiver_id ELSE m.sender_id END
            WHERE m.sender_id = $1 OR m.receiver_id = $1
            ORDER BY peer_id, m.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }
}

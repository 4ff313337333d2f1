use serde::Serialize;
use sqlx::PgPool;

use crate::domain::RequestStatus;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WorkRequest {
    pub id: i64,
    pub user_id: i64,
    pub target_user_id: i64,
    pub post_id: Option<i64>,
    pub request_type: String,
    pub request_content: String,
    pub status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Request joined with both usernames, for the inbox listing.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WorkRequestDetail {
    pub id: i64,
    pub user_id: i64,
    pub sender_username: String,
    pub target_user_id: i64,
    pub target_username: String,
    pub post_id: Option<i64>,
    pub post_title: Option<String>,
    pub request_type: String,
    pub request_content: String,
    pub status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct NewWorkRequest {
    pub user_id: i64,
    pub target_user_id: i64,
    pub post_id: Option<i64>,
    pub request_type: String,
    pub request_content: String,
}

pub struct RequestRepository {
    pool: PgPool,
}

impl RequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, request: NewWorkRequest) -> Result<WorkRequest, sqlx::Error> {
        sqlx::query_as::<_, WorkRequest>(
            r#"
            INSERT INTO work_requests (user_id, target_user_id, post_id, request_type, request_content)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, target_user_id, post_id, request_type,
                      request_content, status, created_at
            "#,
        )
        .bind(request.user_id)
        .bind(request.target_user_id)
        .bind(request.post_id)
        .bind(&request.request_type)
        .bind(&request.request_content)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get(&self, id: i64) -> Result<Option<WorkRequest>, sqlx::Error> {
        sqlx::query_as::<_, WorkRequest>(
            r#"
            SELECT id, user_id, target_user_id, post_id, request_type,
                   request_content, status, created_at
            FROM work_requests
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Persist a transition already validated by the domain guard. The WHERE
    /// clause re-checks the stored status so a concurrent accept/decline
    /// loses cleanly (zero rows updated).
    pub async fn set_status(
        &self,
        id: i64,
        from: &str,
        to: RequestStatus,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE work_requests SET status = $3 WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from)
        .bind(to.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// All requests the user sent or received, newest first.
    pub async fn list_involving(&self, user_id: i64) -> Result<Vec<WorkRequestDetail>, sqlx::Error> {
        sqlx::query_as::<_, WorkRequestDetail>(
            r#"
            SELECT wr.id, wr.user_id, su.username AS sender_username,
                   wr.target_user_id, tu.username AS target_username,
                   wr.post_id, p.title AS post_title,
                   wr.request_type, wr.request_content, wr.status, wr.created_at
            FROM work_requests wr
            JOIN users su ON su.id = wr.user_id
            JOIN users tu ON tu.id = wr.target_user_id
            LEFT JOIN posts p ON p.id = wr.post_id
            WHERE wr.user_id = $1 OR wr.target_user_id = $1
            ORDER BY wr.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }
}

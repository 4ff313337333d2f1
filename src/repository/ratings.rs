use serde::Serialize;
use sqlx::PgPool;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Rating {
    pub id: i64,
    pub rater_user_id: i64,
    pub rated_user_id: i64,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub struct RatingRepository {
    pool: PgPool,
}

impl RatingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// One rating per rater/rated pair; the unique index rejects duplicates.
    pub async fn insert(
        &self,
        rater_user_id: i64,
        rated_user_id: i64,
        rating: i32,
        comment: Option<&str>,
    ) -> Result<Rating, sqlx::Error> {
        sqlx::query_as::<_, Rating>(
            r#"
            INSERT INTO ratings (rater_user_id, rated_user_id, rating, comment)
            VALUES ($1, $2, $3, $4)
            RETURNING id, rater_user_id, rated_user_id, rating, comment, created_at
            "#,
        )
        .bind(rater_user_id)
        .bind(rated_user_id)
        .bind(rating)
        .bind(comment)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get(&self, id: i64) -> Result<Option<Rating>, sqlx::Error> {
        sqlx::query_as::<_, Rating>(
            r#"
            SELECT id, rater_user_id, rated_user_id, rating, comment, created_at
            FROM ratings
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn update(
        &self,
        id: i64,
        rating: i32,
        comment: Option<&str>,
    ) -> Result<Option<Rating>, sqlx::Error> {
        sqlx::query_as::<_, Rating>(
            r#"
            UPDATE ratings
            SET rating = $2, comment = $3
            WHERE id = $1
            RETURNING id, rater_user_id, rated_user_id, rating, comment, created_at
            "#,
        )
        .bind(id)
        .bind(rating)
        .bind(comment)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn list_for_user(&self, rated_user_id: i64) -> Result<Vec<Rating>, sqlx::Error> {
        sqlx::query_as::<_, Rating>(
            r#"
            SELECT id, rater_user_id, rated_user_id, rating, comment, created_at
            FROM ratings
            WHERE rated_user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(rated_user_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn average_for_user(&self, rated_user_id: i64) -> Result<f64, sqlx::Error> {
        let avg: Option<f64> = sqlx::query_scalar(
            "SELECT AVG(rating)::float8 FROM ratings WHERE rated_user_id = $1",
        )
        .bind(rated_user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(avg.unwrap_or(0.0))
    }

    pub async fn exists(
        &self,
        rater_user_id: i64,
        rated_user_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM ratings WHERE rater_user_id = $1 AND rated_user_id = $2",
        )
        .bind(rater_user_id)
        .bind(rated_user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }
}

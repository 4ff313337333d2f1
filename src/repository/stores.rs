use serde::{Deserialize, Serialize};
use sqlx::PgPool;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Store {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct NewStore {
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

pub struct StoreRepository {
    pool: PgPool,
}

impl StoreRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, store: NewStore) -> Result<Store, sqlx::Error> {
        sqlx::query_as::<_, Store>(
            r#"
            INSERT INTO stores (user_id, name, description, latitude, longitude)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, name, description, latitude, longitude, created_at
            "#,
        )
        .bind(store.user_id)
        .bind(&store.name)
        .bind(&store.description)
        .bind(store.latitude)
        .bind(store.longitude)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get(&self, id: i64) -> Result<Option<Store>, sqlx::Error> {
        sqlx::query_as::<_, Store>(
            r#"
            SELECT id, user_id, name, description, latitude, longitude, created_at
            FROM stores
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn update(&self, id: i64, store: NewStore) -> Result<Option<Store>, sqlx::Error> {
        sqlx::query_as::<_, Store>(
            r#"
            UPDATE stores
            SET name = $2, description = $3, latitude = $4, longitude = $5
            WHERE id = $1
            RETURNING id, user_id, name, description, latitude, longitude, created_at
            "#,
        )
        .bind(id)
        .bind(&store.name)
        .bind(&store.description)
        .bind(store.latitude)
        .bind(store.longitude)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn delete(&self, id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM stores WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn list_all(&self) -> Result<Vec<Store>, sqlx::Error> {
        sqlx::query_as::<_, Store>(
            r#"
            SELECT id, user_id, name, description, latitude, longitude, created_at
            FROM stores
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    pub async fn search(&self, query: &str) -> Result<Vec<Store>, sqlx::Error> {
        sqlx::query_as::<_, Store>(
            r#"
            SELECT id, user_id, name, description, latitude, longitude, created_at
            FROM stores
            WHERE name ILIKE $1 OR description ILIKE $1
            ORDER BY name
            "#,
        )
        .bind(format!("%{}%", query))
        .fetch_all(&self.pool)
        .await
    }

    pub async fn for_user(&self, user_id: i64) -> Result<Vec<Store>, sqlx::Error> {
        sqlx::query_as::<_, Store>(
            r#"
            SELECT id, user_id, name, description, latitude, longitude, created_at
            FROM stores
            WHERE user_id = $1
            ORDER BY name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }
}

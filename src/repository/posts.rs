use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::Pagination;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub price_centavos: i64,
    pub images: Vec<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Post joined with author and role, the shape the feed endpoints return.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PostWithAuthor {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub role_name: String,
    pub title: String,
    pub content: String,
    pub price_centavos: i64,
    pub images: Vec<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub price_centavos: i64,
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub author_id: Option<i64>,
    pub author_role: Option<String>,
    pub tag: Option<String>,
}

pub struct PostRepository {
    pool: PgPool,
}

impl PostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, post: NewPost) -> Result<Post, sqlx::Error> {
        sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (user_id, title, content, price_centavos, images)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, title, content, price_centavos, images, created_at
            "#,
        )
        .bind(post.user_id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.price_centavos)
        .bind(&post.images)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get(&self, id: i64) -> Result<Option<Post>, sqlx::Error> {
        sqlx::query_as::<_, Post>(
            r#"
            SELECT id, user_id, title, content, price_centavos, images, created_at
            FROM posts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// List posts, optionally filtered by author, author role, or tag.
    pub async fn list(
        &self,
        filter: PostFilter,
        pagination: Pagination,
    ) -> Result<Vec<PostWithAuthor>, sqlx::Error> {
        let mut query_builder = sqlx::QueryBuilder::new(
            r#"
            SELECT p.id, p.user_id, u.username, r.name AS role_name,
                   p.title, p.content, p.price_centavos, p.images, p.created_at
            FROM posts p
            JOIN users u ON u.id = p.user_id
            JOIN roles r ON r.id = u.role_id
            WHERE 1=1
            "#,
        );

        if let Some(author_id) = filter.author_id {
            query_builder.push(" AND p.user_id = ");
            query_builder.push_bind(author_id);
        }

        if let Some(ref role) = filter.author_role {
            query_builder.push(" AND r.name = ");
            query_builder.push_bind(role);
        }

        if let Some(ref tag) = filter.tag {
            query_builder.push(
                " AND EXISTS (SELECT 1 FROM post_tags pt JOIN tags t ON t.id = pt.tag_id \
                 WHERE pt.post_id = p.id AND t.name ILIKE ",
            );
            query_builder.push_bind(format!("%{}%", tag));
            query_builder.push(")");
        }

        query_builder.push(" ORDER BY p.created_at DESC LIMIT ");
        query_builder.push_bind(pagination.limit);
        query_builder.push(" OFFSET ");
        query_builder.push_bind(pagination.offset);

        query_builder
            .build_query_as::<PostWithAuthor>()
            .fetch_all(&self.pool)
            .await
    }

    pub async fn update(
        &self,
        id: i64,
        title: &str,
        content: &str,
        price_centavos: i64,
        images: &[String],
    ) -> Result<Option<Post>, sqlx::Error> {
        sqlx::query_as::<_, Post>(
            r#"
            UPDATE posts
            SET title = $2, content = $3, price_centavos = $4, images = $5
            WHERE id = $1
            RETURNING id, user_id, title, content, price_centavos, images, created_at
            "#,
        )
        .bind(id)
        .bind(title)
        .bind(content)
        .bind(price_centavos)
        .bind(images)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn delete(&self, id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Every image across a user's posts.
    pub async fn user_images(&self, user_id: i64) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT unnest(images)
            FROM posts
            WHERE user_id = $1
            ORDER BY 1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }
}

use serde::Serialize;
use sqlx::PgPool;

/// Authenticated principal resolved from a bearer token.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role_id: i64,
    pub role_name: String,
}

pub struct TokenRepository {
    pool: PgPool,
}

impl TokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store a new token digest for the user.
    pub async fn insert(&self, user_id: i64, token_hash: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO auth_tokens (user_id, token_hash)
            VALUES ($1, $2)
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Resolve a token digest to its user, bumping last_used_at.
    pub async fn resolve(&self, token_hash: &str) -> Result<Option<AuthUser>, sqlx::Error> {
        let user = sqlx::query_as::<_, AuthUser>(
            r#"
            UPDATE auth_tokens t
            SET last_used_at = now()
            FROM users u
            JOIN roles r ON r.id = u.role_id
            WHERE t.token_hash = $1 AND u.id = t.user_id
            RETURNING u.id, u.username, u.email, u.role_id, r.name AS role_name
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Revoke every token for the user (logout everywhere).
    pub async fn delete_for_user(&self, user_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM auth_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Store a password reset token digest, replacing any earlier one.
    pub async fn store_password_reset(
        &self,
        email: &str,
        token_hash: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO password_resets (email, token_hash)
            VALUES ($1, $2)
            ON CONFLICT (email)
            DO UPDATE SET token_hash = EXCLUDED.token_hash, created_at = now()
            "#,
        )
        .bind(email)
        .bind(token_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Redeem a reset token. The row is deleted on match so a token can only
    /// be used once; expired rows never match.
    pub async fn consume_password_reset(
        &self,
        email: &str,
        token_hash: &str,
        max_age_secs: u64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM password_resets
            WHERE email = $1
              AND token_hash = $2
              AND created_at > now() - make_interval(secs => $3)
            "#,
        )
        .bind(email)
        .bind(token_hash)
        .bind(max_age_secs as f64)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

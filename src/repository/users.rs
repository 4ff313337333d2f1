use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::Pagination;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)] // Never send the password hash to clients
    pub password_hash: String,
    pub role_id: i64,
    pub verified: bool,
    pub email_verified: bool,
    #[serde(skip_serializing)]
    pub verification_code: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub profile_picture: Option<String>,
    pub cover_photo: Option<String>,
    pub zipcode: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Role {
    pub id: i64,
    pub name: String,
}

/// User row joined with role name, for listings.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role_id: i64,
    pub role_name: String,
    pub verified: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Designer/provider listing entry with profile and rating aggregate.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProviderSummary {
    pub id: i64,
    pub username: String,
    pub role_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_picture: Option<String>,
    pub bio: Option<String>,
    pub average_rating: f64,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role_id: i64,
    pub verification_code: String,
}

#[derive(Debug, Clone)]
pub struct NewProfile {
    pub first_name: String,
    pub last_name: String,
    pub profile_picture: Option<String>,
    pub cover_photo: Option<String>,
    pub zipcode: Option<String>,
    pub bio: Option<String>,
}

pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn roles(&self) -> Result<Vec<Role>, sqlx::Error> {
        sqlx::query_as::<_, Role>("SELECT id, name FROM roles ORDER BY id")
            .fetch_all(&self.pool)
            .await
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role_id, verified,
                   email_verified, verification_code, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role_id, verified,
                   email_verified, verification_code, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Create user plus profile in one transaction, returning the user id.
    pub async fn create_with_profile(
        &self,
        user: NewUser,
        profile: NewProfile,
    ) -> Result<i64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let user_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO users (username, email, password_hash, role_id, verification_code)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role_id)
        .bind(&user.verification_code)
        .fetch_one(&mut tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, first_name, last_name, profile_picture,
                                  cover_photo, zipcode, bio)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user_id)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.profile_picture)
        .bind(&profile.cover_photo)
        .bind(&profile.zipcode)
        .bind(&profile.bio)
        .execute(&mut tx)
        .await?;

        tx.commit().await?;
        Ok(user_id)
    }

    pub async fn profile(&self, user_id: i64) -> Result<Option<Profile>, sqlx::Error> {
        sqlx::query_as::<_, Profile>(
            r#"
            SELECT user_id, first_name, last_name, profile_picture, cover_photo, zipcode, bio
            FROM profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn update_profile(
        &self,
        user_id: i64,
        profile: NewProfile,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET first_name = $2,
                last_name = $3,
                profile_picture = COALESCE($4, profile_picture),
                cover_photo = COALESCE($5, cover_photo),
                zipcode = COALESCE($6, zipcode)
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.profile_picture)
        .bind(&profile.cover_photo)
        .bind(&profile.zipcode)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn update_bio(&self, user_id: i64, bio: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE profiles SET bio = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(bio)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Admin approval flag.
    pub async fn set_verified(&self, user_id: i64, verified: bool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET verified = $2 WHERE id = $1")
            .bind(user_id)
            .bind(verified)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn set_password(&self, user_id: i64, password_hash: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Redeem an email verification code.
    pub async fn verify_email(&self, email: &str, code: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email_verified = TRUE, verification_code = NULL
            WHERE email = $1 AND verification_code = $2
            "#,
        )
        .bind(email)
        .bind(code)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List all users except the caller, with role names.
    pub async fn list_others(
        &self,
        current_user_id: i64,
        pagination: Pagination,
    ) -> Result<(Vec<UserSummary>, i64), sqlx::Error> {
        let users = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT u.id, u.username, u.email, u.role_id, r.name AS role_name,
                   u.verified, u.created_at
            FROM users u
            JOIN roles r ON r.id = u.role_id
            WHERE u.id <> $1
            ORDER BY u.created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(current_user_id)
        .bind(pagination.limit)
        .bind(pagination.offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE id <> $1")
            .bind(current_user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok((users, total))
    }

    /// Graphic designers and printing providers with their average rating.
    pub async fn list_providers(&self) -> Result<Vec<ProviderSummary>, sqlx::Error> {
        sqlx::query_as::<_, ProviderSummary>(
            r#"
            SELECT u.id, u.username, r.name AS role_name,
                   p.first_name, p.last_name, p.profile_picture, p.bio,
                   COALESCE(AVG(rt.rating), 0)::float8 AS average_rating
            FROM users u
            JOIN roles r ON r.id = u.role_id
            LEFT JOIN profiles p ON p.user_id = u.id
            LEFT JOIN ratings rt ON rt.rated_user_id = u.id
            WHERE r.name IN ('graphic_designer', 'printing_provider')
            GROUP BY u.id, u.username, r.name, p.first_name, p.last_name,
                     p.profile_picture, p.bio
            ORDER BY u.username
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    /// First admin user, the recipient of registration approval requests.
    pub async fn admin_user_id(&self) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT u.id
            FROM users u
            JOIN roles r ON r.id = u.role_id
            WHERE r.name = 'admin'
            ORDER BY u.id
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
    }
}

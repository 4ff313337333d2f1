use serde::Serialize;
use sqlx::PgPool;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Skill {
    pub id: i64,
    pub name: String,
}

pub struct SkillRepository {
    pool: PgPool,
}

impl SkillRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn all_skills(&self) -> Result<Vec<Skill>, sqlx::Error> {
        sqlx::query_as::<_, Skill>("SELECT id, name FROM skills ORDER BY name")
            .fetch_all(&self.pool)
            .await
    }

    pub async fn all_printing_skills(&self) -> Result<Vec<Skill>, sqlx::Error> {
        sqlx::query_as::<_, Skill>("SELECT id, name FROM printing_skills ORDER BY name")
            .fetch_all(&self.pool)
            .await
    }

    pub async fn skills_for_user(&self, user_id: i64) -> Result<Vec<Skill>, sqlx::Error> {
        sqlx::query_as::<_, Skill>(
            r#"
            SELECT s.id, s.name
            FROM skills s
            JOIN user_skills us ON us.skill_id = s.id
            WHERE us.user_id = $1
            ORDER BY s.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn printing_skills_for_user(&self, user_id: i64) -> Result<Vec<Skill>, sqlx::Error> {
        sqlx::query_as::<_, Skill>(
            r#"
            SELECT s.id, s.name
            FROM printing_skills s
            JOIN user_printing_skills us ON us.printing_skill_id = s.id
            WHERE us.user_id = $1
            ORDER BY s.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Replace the user's skill set wholesale.
    pub async fn replace_user_skills(
        &self,
        user_id: i64,
        skill_ids: &[i64],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM user_skills WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut tx)
            .await?;
        for skill_id in skill_ids {
            sqlx::query(
                "INSERT INTO user_skills (user_id, skill_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(user_id)
            .bind(skill_id)
            .execute(&mut tx)
            .await?;
        }
        tx.commit().await
    }

    pub async fn replace_user_printing_skills(
        &self,
        user_id: i64,
        skill_ids: &[i64],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM user_printing_skills WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut tx)
            .await?;
        for skill_id in skill_ids {
            sqlx::query(
                "INSERT INTO user_printing_skills (user_id, printing_skill_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(user_id)
            .bind(skill_id)
            .execute(&mut tx)
            .await?;
        }
        tx.commit().await
    }
}

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // argon2, never exposed in JSON
    pub display_name: Option<String>,
    pub preferred_model: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

const USER_COLUMNS: &str =
    "id, email, password_hash, display_name, preferred_model, created_at, updated_at";

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    /// Create a new user with hashed password.
    pub async fn create(db: &PgPool, email: &str, password_hash: &str) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, password_hash)
            VALUES ($1, $2)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(password_hash)
        .fetch_one(db)
        .await
        .context("insert user")?;
        Ok(user)
    }

    /// Fields left as `None` keep their current value.
    pub async fn update_profile(
        db: &PgPool,
        id: Uuid,
        email: Option<&str>,
        display_name: Option<&str>,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET email = COALESCE($2, email),
                   display_name = COALESCE($3, display_name),
                   updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(email)
        .bind(display_name)
        .fetch_optional(db)
        .await
        .context("update user")?;
        Ok(user)
    }

    pub async fn set_preferred_model(
        db: &PgPool,
        id: Uuid,
        model: Option<&str>,
    ) -> anyhow::Result<bool> {
        let res = sqlx::query(
            "UPDATE users SET preferred_model = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(model)
        .execute(db)
        .await
        .context("update preferred model")?;
        Ok(res.rows_affected() > 0)
    }

    /// Profile, scans and scan limit rows go with it (ON DELETE CASCADE).
    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(db)
            .await
            .context("delete user")?;
        Ok(res.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[sqlx::test(migrations = "./migrations")]
    async fn duplicate_email_is_a_conflict(db: PgPool) {
        User::create(&db, "taken@example.com", "hash").await.unwrap();
        let err = AppError::from(User::create(&db, "taken@example.com", "hash").await.unwrap_err());
        assert_eq!(err.status(), axum::http::StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "Email already registered");

        let other = User::create(&db, "free@example.com", "hash").await.unwrap();
        let err = AppError::from(
            User::update_profile(&db, other.id, Some("taken@example.com"), None)
                .await
                .unwrap_err(),
        );
        assert_eq!(err.status(), axum::http::StatusCode::CONFLICT);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn preferred_model_round_trips(db: PgPool) {
        let user = User::create(&db, "model@example.com", "hash").await.unwrap();
        assert!(User::set_preferred_model(&db, user.id, Some("b/other")).await.unwrap());
        let user = User::find_by_id(&db, user.id).await.unwrap().unwrap();
        assert_eq!(user.preferred_model.as_deref(), Some("b/other"));
        assert!(!User::set_preferred_model(&db, Uuid::new_v4(), None).await.unwrap());
    }
}

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::matcher::Restrictions;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DietaryProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub allergies: Vec<String>,
    pub dietary_preferences: Vec<String>,
    pub health_restrictions: Vec<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl DietaryProfile {
    pub fn restrictions(&self) -> Restrictions<'_> {
        Restrictions {
            allergies: &self.allergies,
            dietary_preferences: &self.dietary_preferences,
            health_restrictions: &self.health_restrictions,
        }
    }

    pub async fn find_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<Self>> {
        let row = sqlx::query_as::<_, DietaryProfile>(
            r#"
            SELECT id, user_id, allergies, dietary_preferences, health_restrictions,
                   created_at, updated_at
              FROM dietary_profiles
             WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(db)
        .await
        .context("select dietary profile")?;
        Ok(row)
    }

    /// Read the profile, creating an empty one on first access. Concurrent
    /// first calls converge on the same row through the unique user_id.
    pub async fn get_or_create(db: &PgPool, user_id: Uuid) -> anyhow::Result<Self> {
        sqlx::query(
            r#"
            INSERT INTO dietary_profiles (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .execute(db)
        .await
        .context("insert default dietary profile")?;

        Self::find_by_user(db, user_id)
            .await?
            .context("dietary profile missing after insert")
    }

    /// Full-list replace; creates the row when it does not exist yet.
    pub async fn upsert(
        db: &PgPool,
        user_id: Uuid,
        allergies: &[String],
        dietary_preferences: &[String],
        health_restrictions: &[String],
    ) -> anyhow::Result<Self> {
        let row = sqlx::query_as::<_, DietaryProfile>(
            r#"
            INSERT INTO dietary_profiles (user_id, allergies, dietary_preferences, health_restrictions)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
               SET allergies = EXCLUDED.allergies,
                   dietary_preferences = EXCLUDED.dietary_preferences,
                   health_restrictions = EXCLUDED.health_restrictions,
                   updated_at = now()
            RETURNING id, user_id, allergies, dietary_preferences, health_restrictions,
                      created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(allergies)
        .bind(dietary_preferences)
        .bind(health_restrictions)
        .fetch_one(db)
        .await
        .context("upsert dietary profile")?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo::User;

    #[sqlx::test(migrations = "./migrations")]
    async fn first_read_creates_empty_profile_once(db: PgPool) {
        let user = User::create(&db, "profile@example.com", "hash").await.unwrap();
        let first = DietaryProfile::get_or_create(&db, user.id).await.unwrap();
        assert!(first.allergies.is_empty());
        assert!(first.dietary_preferences.is_empty());
        assert!(first.health_restrictions.is_empty());
        assert!(first.restrictions().is_empty());

        let second = DietaryProfile::get_or_create(&db, user.id).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn upsert_replaces_every_list(db: PgPool) {
        let user = User::create(&db, "replace@example.com", "hash").await.unwrap();
        let peanut = vec!["peanut".to_string()];
        let vegan = vec!["vegan".to_string()];
        DietaryProfile::upsert(&db, user.id, &peanut, &vegan, &[]).await.unwrap();

        let replaced = DietaryProfile::upsert(&db, user.id, &[], &[], &["diabetes".to_string()])
            .await
            .unwrap();
        assert!(replaced.allergies.is_empty());
        assert!(replaced.dietary_preferences.is_empty());
        assert_eq!(replaced.health_restrictions, vec!["diabetes"]);
    }
}

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScanLimit {
    pub user_id: Uuid,
    pub scans_used: i32,
    pub max_scans: i32,
    pub reset_date: OffsetDateTime,
}

/// First instant (UTC) of the month containing `now`.
pub fn month_start(now: OffsetDateTime) -> OffsetDateTime {
    let now = now.to_offset(time::UtcOffset::UTC);
    let date = Date::from_calendar_date(now.year(), now.month(), 1)
        .unwrap_or_else(|_| now.date());
    PrimitiveDateTime::new(date, Time::MIDNIGHT).assume_utc()
}

/// First instant (UTC) of the month after the one containing `now`.
pub fn next_reset(now: OffsetDateTime) -> OffsetDateTime {
    let now = now.to_offset(time::UtcOffset::UTC);
    let (year, month) = match now.month() {
        Month::December => (now.year() + 1, Month::January),
        m => (now.year(), m.next()),
    };
    let date = Date::from_calendar_date(year, month, 1).unwrap_or_else(|_| now.date());
    PrimitiveDateTime::new(date, Time::MIDNIGHT).assume_utc()
}

impl ScanLimit {
    pub fn remaining(&self) -> i32 {
        (self.max_scans - self.scans_used).max(0)
    }

    /// Read the limit row, creating it with `default_max` on first access and
    /// rolling the counter over once `reset_date` has passed.
    pub async fn get_or_create(
        db: &PgPool,
        user_id: Uuid,
        default_max: i32,
    ) -> anyhow::Result<Self> {
        let now = OffsetDateTime::now_utc();
        sqlx::query(
            r#"
            INSERT INTO scan_limits (user_id, scans_used, max_scans, reset_date)
            VALUES ($1, 0, $2, $3)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(default_max)
        .bind(next_reset(now))
        .execute(db)
        .await
        .context("insert default scan limit")?;

        Self::reset_if_due(db, user_id, now).await?;

        let row = sqlx::query_as::<_, ScanLimit>(
            r#"
            SELECT user_id, scans_used, max_scans, reset_date
              FROM scan_limits
             WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(db)
        .await
        .context("select scan limit")?;
        Ok(row)
    }

    async fn reset_if_due(db: &PgPool, user_id: Uuid, now: OffsetDateTime) -> anyhow::Result<()> {
        let res = sqlx::query(
            r#"
            UPDATE scan_limits
               SET scans_used = 0, reset_date = $3
             WHERE user_id = $1 AND reset_date <= $2
            "#,
        )
        .bind(user_id)
        .bind(now)
        .bind(next_reset(now))
        .execute(db)
        .await
        .context("reset scan limit")?;
        if res.rows_affected() > 0 {
            tracing::info!(%user_id, "monthly scan counter reset");
        }
        Ok(())
    }

    /// Take one scan from the quota. `None` when the quota is used up; the
    /// conditional update keeps concurrent uploads from overshooting it.
    pub async fn try_consume(
        db: &PgPool,
        user_id: Uuid,
        default_max: i32,
    ) -> anyhow::Result<Option<Self>> {
        Self::get_or_create(db, user_id, default_max).await?;
        let row = sqlx::query_as::<_, ScanLimit>(
            r#"
            UPDATE scan_limits
               SET scans_used = scans_used + 1
             WHERE user_id = $1 AND scans_used < max_scans
            RETURNING user_id, scans_used, max_scans, reset_date
            "#,
        )
        .bind(user_id)
        .fetch_optional(db)
        .await
        .context("consume scan")?;
        Ok(row)
    }

    /// Give a scan back after a failed upload.
    pub async fn release(db: &PgPool, user_id: Uuid) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE scan_limits
               SET scans_used = GREATEST(scans_used - 1, 0)
             WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(db)
        .await
        .context("release scan")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn next_reset_is_first_of_next_month() {
        assert_eq!(next_reset(datetime!(2024-03-15 10:30 UTC)), datetime!(2024-04-01 0:00 UTC));
        assert_eq!(next_reset(datetime!(2024-01-31 23:59 UTC)), datetime!(2024-02-01 0:00 UTC));
    }

    #[test]
    fn next_reset_rolls_over_year() {
        assert_eq!(next_reset(datetime!(2024-12-31 23:59 UTC)), datetime!(2025-01-01 0:00 UTC));
    }

    #[test]
    fn next_reset_uses_utc() {
        // 2024-03-31 23:30 at -02:00 is already April in UTC
        assert_eq!(next_reset(datetime!(2024-03-31 23:30 -2)), datetime!(2024-05-01 0:00 UTC));
    }

    #[test]
    fn month_start_truncates() {
        assert_eq!(month_start(datetime!(2024-07-19 8:00 UTC)), datetime!(2024-07-01 0:00 UTC));
    }

    #[test]
    fn remaining_never_negative() {
        let mut limit = ScanLimit {
            user_id: Uuid::new_v4(),
            scans_used: 9,
            max_scans: 10,
            reset_date: datetime!(2024-04-01 0:00 UTC),
        };
        assert_eq!(limit.remaining(), 1);
        limit.scans_used = 12;
        assert_eq!(limit.remaining(), 0);
    }

    async fn user(db: &PgPool, email: &str) -> Uuid {
        crate::users::repo::User::create(db, email, "hash").await.unwrap().id
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn first_read_creates_defaults(db: PgPool) {
        let user_id = user(&db, "limits@example.com").await;
        let limit = ScanLimit::get_or_create(&db, user_id, crate::config::DEFAULT_MAX_SCANS)
            .await
            .unwrap();
        assert_eq!(limit.scans_used, 0);
        assert_eq!(limit.max_scans, 10);
        assert_eq!(limit.reset_date, next_reset(OffsetDateTime::now_utc()));

        let again = ScanLimit::get_or_create(&db, user_id, 99).await.unwrap();
        assert_eq!(again.max_scans, 10);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn try_consume_refuses_past_max(db: PgPool) {
        let user_id = user(&db, "quota@example.com").await;
        for used in 1..=3 {
            let limit = ScanLimit::try_consume(&db, user_id, 3)
                .await
                .unwrap()
                .expect("within quota");
            assert_eq!(limit.scans_used, used);
        }
        assert!(ScanLimit::try_consume(&db, user_id, 3).await.unwrap().is_none());
        assert!(ScanLimit::try_consume(&db, user_id, 3).await.unwrap().is_none());

        let limit = ScanLimit::get_or_create(&db, user_id, 3).await.unwrap();
        assert_eq!(limit.scans_used, 3);
        assert_eq!(limit.remaining(), 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn release_refunds_without_going_negative(db: PgPool) {
        let user_id = user(&db, "refund@example.com").await;
        ScanLimit::try_consume(&db, user_id, 3).await.unwrap();
        ScanLimit::release(&db, user_id).await.unwrap();
        ScanLimit::release(&db, user_id).await.unwrap();
        let limit = ScanLimit::get_or_create(&db, user_id, 3).await.unwrap();
        assert_eq!(limit.scans_used, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn past_reset_date_rolls_counter_over(db: PgPool) {
        let user_id = user(&db, "rollover@example.com").await;
        ScanLimit::get_or_create(&db, user_id, 10).await.unwrap();
        sqlx::query("UPDATE scan_limits SET scans_used = 10, reset_date = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(datetime!(2020-01-01 0:00 UTC))
            .execute(&db)
            .await
            .unwrap();

        let limit = ScanLimit::get_or_create(&db, user_id, 10).await.unwrap();
        assert_eq!(limit.scans_used, 0);
        assert!(limit.reset_date > OffsetDateTime::now_utc());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn missing_user_is_not_found(db: PgPool) {
        let err = ScanLimit::get_or_create(&db, Uuid::new_v4(), 10).await.unwrap_err();
        let err = crate::error::AppError::from(err);
        assert_eq!(err.status(), axum::http::StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "User not found");
    }
}

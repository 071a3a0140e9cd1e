use serde::Serialize;
use sqlx::types::Decimal;
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    pub name: String,
    pub destination: String,
    pub budget: Decimal,
    pub start_date: Date,
    pub end_date: Date,
    pub img_url: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug)]
pub struct NewTrip {
    pub name: String,
    pub destination: String,
    pub budget: Decimal,
    pub start_date: Date,
    pub end_date: Date,
    pub img_url: Option<String>,
}

impl Trip {
    pub async fn create(db: &PgPool, user_id: Uuid, new: &NewTrip) -> anyhow::Result<Trip> {
        let trip = sqlx::query_as::<_, Trip>(
            r#"
            INSERT INTO trips (user_id, name, destination, budget, start_date, end_date, img_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, user_id, name, destination, budget, start_date, end_date,
                      img_url, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(&new.name)
        .bind(&new.destination)
        .bind(new.budget)
        .bind(new.start_date)
        .bind(new.end_date)
        .bind(new.img_url.as_deref())
        .fetch_one(db)
        .await?;
        Ok(trip)
    }

    pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Trip>> {
        let rows = sqlx::query_as::<_, Trip>(
            r#"
            SELECT id, user_id, name, destination, budget, start_date, end_date,
                   img_url, created_at, updated_at
            FROM trips
            WHERE user_id = $1
            ORDER BY start_date DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Ownership scoping happens here: a trip belonging to someone else is
    /// the same as no trip at all.
    pub async fn find_for_user(
        db: &PgPool,
        user_id: Uuid,
        trip_id: Uuid,
    ) -> anyhow::Result<Option<Trip>> {
        let trip = sqlx::query_as::<_, Trip>(
            r#"
            SELECT id, user_id, name, destination, budget, start_date, end_date,
                   img_url, created_at, updated_at
            FROM trips
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(trip_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(trip)
    }

    /// Deletes a trip owned by the caller, returning the deleted row so the
    /// handler can clean up the stored image afterwards.
    pub async fn delete_for_user(
        db: &PgPool,
        user_id: Uuid,
        trip_id: Uuid,
    ) -> anyhow::Result<Option<Trip>> {
        let trip = sqlx::query_as::<_, Trip>(
            r#"
            DELETE FROM trips
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, name, destination, budget, start_date, end_date,
                      img_url, created_at, updated_at
            "#,
        )
        .bind(trip_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(trip)
    }
}

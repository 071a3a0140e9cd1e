use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::types::Decimal;
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// The one category allow-list, shared by the create and update paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Food,
    Transportation,
    Accommodation,
    Entertainment,
    Shopping,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Food,
        Category::Transportation,
        Category::Accommodation,
        Category::Entertainment,
        Category::Shopping,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "FOOD",
            Category::Transportation => "TRANSPORTATION",
            Category::Accommodation => "ACCOMMODATION",
            Category::Entertainment => "ENTERTAINMENT",
            Category::Shopping => "SHOPPING",
            Category::Other => "OTHER",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or(())
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub name: String,
    pub amount: Decimal,
    pub category: String,
    #[sqlx(rename = "expense_date")]
    pub date: Date,
    pub notes: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Validated expense fields, used for both insert and update.
#[derive(Debug)]
pub struct ExpenseFields {
    pub name: String,
    pub amount: Decimal,
    pub category: Category,
    pub date: Date,
    /// `None` on update leaves the stored notes untouched.
    pub notes: Option<String>,
}

const EXPENSE_COLUMNS: &str =
    "id, trip_id, name, amount, category, expense_date, notes, created_at, updated_at";

impl Expense {
    pub async fn create(
        db: &PgPool,
        trip_id: Uuid,
        fields: &ExpenseFields,
    ) -> anyhow::Result<Expense> {
        let expense = sqlx::query_as::<_, Expense>(&format!(
            r#"
            INSERT INTO expenses (trip_id, name, amount, category, expense_date, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {EXPENSE_COLUMNS}
            "#
        ))
        .bind(trip_id)
        .bind(&fields.name)
        .bind(fields.amount)
        .bind(fields.category.as_str())
        .bind(fields.date)
        .bind(fields.notes.as_deref())
        .fetch_one(db)
        .await?;
        Ok(expense)
    }

    /// Caller must have resolved `trip_id` through an ownership-scoped query.
    pub async fn list_for_trip(db: &PgPool, trip_id: Uuid) -> anyhow::Result<Vec<Expense>> {
        let rows = sqlx::query_as::<_, Expense>(&format!(
            r#"
            SELECT {EXPENSE_COLUMNS}
            FROM expenses
            WHERE trip_id = $1
            ORDER BY expense_date ASC, created_at ASC
            "#
        ))
        .bind(trip_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Reaches the expense only through a trip the caller owns.
    pub async fn find_for_user(
        db: &PgPool,
        user_id: Uuid,
        expense_id: Uuid,
    ) -> anyhow::Result<Option<Expense>> {
        let expense = sqlx::query_as::<_, Expense>(
            r#"
            SELECT e.id, e.trip_id, e.name, e.amount, e.category, e.expense_date,
                   e.notes, e.created_at, e.updated_at
            FROM expenses e
            JOIN trips t ON t.id = e.trip_id
            WHERE e.id = $1 AND t.user_id = $2
            "#,
        )
        .bind(expense_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(expense)
    }

    /// Scoped update; absent notes keep the stored value via COALESCE.
    pub async fn update_for_user(
        db: &PgPool,
        user_id: Uuid,
        expense_id: Uuid,
        fields: &ExpenseFields,
    ) -> anyhow::Result<Option<Expense>> {
        let expense = sqlx::query_as::<_, Expense>(
            r#"
            UPDATE expenses e
            SET name = $3, amount = $4, category = $5, expense_date = $6,
                notes = COALESCE($7, e.notes), updated_at = now()
            FROM trips t
            WHERE e.id = $1 AND e.trip_id = t.id AND t.user_id = $2
            RETURNING e.id, e.trip_id, e.name, e.amount, e.category, e.expense_date,
                      e.notes, e.created_at, e.updated_at
            "#,
        )
        .bind(expense_id)
        .bind(user_id)
        .bind(&fields.name)
        .bind(fields.amount)
        .bind(fields.category.as_str())
        .bind(fields.date)
        .bind(fields.notes.as_deref())
        .fetch_optional(db)
        .await?;
        Ok(expense)
    }

    pub async fn delete_for_user(
        db: &PgPool,
        user_id: Uuid,
        expense_id: Uuid,
    ) -> anyhow::Result<bool> {
        let deleted = sqlx::query_scalar::<_, Uuid>(
            r#"
            DELETE FROM expenses e
            USING trips t
            WHERE e.id = $1 AND e.trip_id = t.id AND t.user_id = $2
            RETURNING e.id
            "#,
        )
        .bind(expense_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(deleted.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trips_through_strings() {
        for category in Category::ALL {
            assert_eq!(Category::from_str(category.as_str()), Ok(category));
        }
    }

    #[test]
    fn category_rejects_unknown_and_lowercase_values() {
        assert!(Category::from_str("GROCERIES").is_err());
        assert!(Category::from_str("food").is_err());
        assert!(Category::from_str("").is_err());
    }

    #[test]
    fn category_serde_uses_uppercase_names() {
        assert_eq!(
            serde_json::to_value(Category::Transportation).unwrap(),
            serde_json::json!("TRANSPORTATION")
        );
        let parsed: Category = serde_json::from_str("\"SHOPPING\"").unwrap();
        assert_eq!(parsed, Category::Shopping);
    }
}

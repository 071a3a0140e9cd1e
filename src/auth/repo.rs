use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub avatar_url: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RefreshToken {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub created_at: OffsetDateTime,
}

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, avatar_url, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, avatar_url, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn create(
        db: &PgPool,
        username: &str,
        email: &str,
        password_hash: &str,
        avatar_url: Option<&str>,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash, avatar_url)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, email, password_hash, avatar_url, created_at, updated_at
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(avatar_url)
        .fetch_one(db)
        .await?;
        Ok(user)
    }
}

impl RefreshToken {
    pub async fn insert(db: &PgPool, user_id: Uuid, token_hash: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash)
            VALUES ($1, $2)
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Single-statement compare-and-delete. Exactly one concurrent caller can
    /// win for a given digest; everyone else sees `false` and gets rejected.
    pub async fn consume(db: &PgPool, user_id: Uuid, token_hash: &str) -> anyhow::Result<bool> {
        let deleted = sqlx::query_scalar::<_, Uuid>(
            r#"
            DELETE FROM refresh_tokens
            WHERE user_id = $1 AND token_hash = $2
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .fetch_optional(db)
        .await?;
        Ok(deleted.is_some())
    }

    pub async fn list_for_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<RefreshToken>> {
        let rows = sqlx::query_as::<_, RefreshToken>(
            r#"
            SELECT id, user_id, token_hash, created_at
            FROM refresh_tokens
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }
}

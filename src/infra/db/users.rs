use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::repos::{RepoError, UsersRepo};
use crate::domain::entities::{UserRecord, UserWithPassword};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    joined_at: OffsetDateTime,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            joined_at: row.joined_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct UserWithPasswordRow {
    id: i64,
    username: String,
    joined_at: OffsetDateTime,
    password_hash: String,
}

#[async_trait]
impl UsersRepo for PostgresRepositories {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<UserRecord, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (username, password_hash) \
             VALUES ($1, $2) \
             RETURNING id, username, joined_at",
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, joined_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Into::into))
    }

    async fn find_with_password(
        &self,
        username: &str,
    ) -> Result<Option<UserWithPassword>, RepoError> {
        let row = sqlx::query_as::<_, UserWithPasswordRow>(
            "SELECT id, username, joined_at, password_hash \
             FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(|row| UserWithPassword {
            user: UserRecord {
                id: row.id,
                username: row.username,
                joined_at: row.joined_at,
            },
            password_hash: row.password_hash,
        }))
    }
}

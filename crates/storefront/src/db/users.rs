//! User repository for database operations.
//!
//! Queries are built at runtime with `sqlx::query_as` so the crate builds
//! without a live database.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::instrument;

use pennyshop_core::{Money, UserId, Username};

use super::{PgStore, RepositoryError, UserStore, conflict_on_unique};
use crate::models::{StoredCredentials, User};

/// Raw `storefront.user` row before username validation.
#[derive(FromRow)]
struct UserRow {
    id: UserId,
    username: String,
    balance: Money,
    last_login: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let username = Username::parse(&row.username).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid username in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            username,
            balance: row.balance,
            last_login: row.last_login,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct CredentialsRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

impl UserStore for PgStore {
    #[instrument(skip(self, password_hash))]
    async fn create_user(
        &self,
        username: &Username,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO storefront.user (username, password_hash)
            VALUES ($1, $2)
            RETURNING id, username, balance, last_login, created_at
            ",
        )
        .bind(username.as_str())
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "username"))?;

        User::try_from(row)
    }

    #[instrument(skip(self))]
    async fn get_credentials(
        &self,
        username: &Username,
    ) -> Result<Option<StoredCredentials>, RepositoryError> {
        let row = sqlx::query_as::<_, CredentialsRow>(
            r"
            SELECT id, username, balance, last_login, created_at, password_hash
            FROM storefront.user
            WHERE username = $1
            ",
        )
        .bind(username.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            Ok(StoredCredentials {
                user: User::try_from(r.user)?,
                password_hash: r.password_hash,
            })
        })
        .transpose()
    }

    #[instrument(skip(self), fields(user_id = %id))]
    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, username, balance, last_login, created_at
            FROM storefront.user
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    #[instrument(skip(self), fields(user_id = %id))]
    async fn touch_last_login(&self, id: UserId, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE storefront.user SET last_login = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

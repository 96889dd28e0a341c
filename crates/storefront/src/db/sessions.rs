//! Session repository.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::instrument;

use pennyshop_core::{CsrfToken, SessionId, UserId};

use super::{PgStore, RepositoryError, SessionStore, conflict_on_unique};
use crate::models::{NewSession, Session};

#[derive(FromRow)]
struct SessionRow {
    session_id: String,
    csrf_token: String,
    user_id: UserId,
    ip_addr: Option<String>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for Session {
    type Error = RepositoryError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let source_addr = row
            .ip_addr
            .as_deref()
            .map(str::parse::<IpAddr>)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid ip_addr in database: {e}"))
            })?;

        Ok(Self {
            id: SessionId::new(row.session_id),
            csrf_token: CsrfToken::new(row.csrf_token),
            user_id: row.user_id,
            source_addr,
            expires_at: row.expires_at,
        })
    }
}

impl SessionStore for PgStore {
    #[instrument(skip_all)]
    async fn get_session(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r"
            SELECT session_id, csrf_token, user_id, ip_addr, expires_at
            FROM storefront.session
            WHERE session_id = $1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Session::try_from).transpose()
    }

    #[instrument(skip_all, fields(user_id = %session.user_id))]
    async fn insert_session(&self, session: NewSession) -> Result<Session, RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO storefront.session (session_id, csrf_token, user_id, ip_addr, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(session.id.as_str())
        .bind(session.csrf_token.as_str())
        .bind(session.user_id)
        .bind(session.source_addr.map(|addr| addr.to_string()))
        .bind(session.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "session id"))?;

        Ok(Session::from(session))
    }

    #[instrument(skip(self))]
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.session WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

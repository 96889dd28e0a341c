//! Balance and purchase ledger repository.
//!
//! Writes go through [`PgLedgerTx`], which holds a database transaction with
//! a bounded `lock_timeout`. `SELECT ... FOR UPDATE` keeps the rows it reads
//! locked until commit, so concurrent purchases against the same user are
//! serialized by the database rather than by the application.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, Postgres, Transaction};
use tracing::instrument;

use pennyshop_core::{ItemId, Money, PurchaseId, UserId};

use super::{LedgerStore, LedgerTx, PgStore, RepositoryError};
use crate::models::{Purchase, UserPurchase};

/// An open ledger transaction on `PostgreSQL`.
///
/// Dropping it without calling [`LedgerTx::commit`] rolls back.
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[derive(FromRow)]
struct PurchaseRow {
    id: PurchaseId,
    user_id: UserId,
    item_id: ItemId,
    price: Money,
    purchased_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct UserPurchaseRow {
    username: String,
    item_name: String,
    price: Money,
    purchased_at: DateTime<Utc>,
}

impl LedgerStore for PgStore {
    type Tx = PgLedgerTx;

    async fn begin(&self) -> Result<PgLedgerTx, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // SET does not accept bind parameters; the value is an integer we own.
        let millis = self.lock_timeout.as_millis();
        sqlx::query(&format!("SET LOCAL lock_timeout = {millis}"))
            .execute(&mut *tx)
            .await?;

        Ok(PgLedgerTx { tx })
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn balance(&self, user_id: UserId) -> Result<Option<Money>, RepositoryError> {
        let balance = sqlx::query_scalar::<_, Money>(
            "SELECT balance FROM storefront.user WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(balance)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn purchases(&self, user_id: UserId) -> Result<Vec<UserPurchase>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserPurchaseRow>(
            r"
            SELECT u.username, i.name AS item_name, p.price, p.purchased_at
            FROM storefront.purchase p
            JOIN storefront.user u ON u.id = p.user_id
            JOIN storefront.item i ON i.id = p.item_id
            WHERE p.user_id = $1
            ORDER BY p.purchased_at, p.id
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| UserPurchase {
                username: r.username,
                item_name: r.item_name,
                price_paid: r.price,
                purchased_at: r.purchased_at,
            })
            .collect())
    }
}

impl LedgerTx for PgLedgerTx {
    async fn lock_item_price(&mut self, item_id: ItemId) -> Result<Option<Money>, RepositoryError> {
        let price = sqlx::query_scalar::<_, Money>(
            "SELECT price FROM storefront.item WHERE id = $1 FOR UPDATE",
        )
        .bind(item_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(price)
    }

    async fn lock_balance(&mut self, user_id: UserId) -> Result<Option<Money>, RepositoryError> {
        let balance = sqlx::query_scalar::<_, Money>(
            "SELECT balance FROM storefront.user WHERE id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(balance)
    }

    async fn set_balance(&mut self, user_id: UserId, balance: Money) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE storefront.user SET balance = $2 WHERE id = $1")
            .bind(user_id)
            .bind(balance)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn insert_purchase(
        &mut self,
        user_id: UserId,
        item_id: ItemId,
        price_paid: Money,
    ) -> Result<Purchase, RepositoryError> {
        let row = sqlx::query_as::<_, PurchaseRow>(
            r"
            INSERT INTO storefront.purchase (user_id, item_id, price)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, item_id, price, purchased_at
            ",
        )
        .bind(user_id)
        .bind(item_id)
        .bind(price_paid)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(Purchase {
            id: row.id,
            user_id: row.user_id,
            item_id: row.item_id,
            price_paid: row.price,
            purchased_at: row.purchased_at,
        })
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }
}

//! Item repository. Items are reference data; the core only reads them.

use sqlx::FromRow;
use tracing::instrument;

use pennyshop_core::{ItemId, Money};

use super::{ItemStore, PgStore, RepositoryError};
use crate::models::Item;

#[derive(FromRow)]
struct ItemRow {
    id: ItemId,
    name: String,
    description: String,
    price: Money,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
        }
    }
}

impl ItemStore for PgStore {
    #[instrument(skip(self), fields(item_id = %id))]
    async fn get_item(&self, id: ItemId) -> Result<Option<Item>, RepositoryError> {
        let row = sqlx::query_as::<_, ItemRow>(
            "SELECT id, name, description, price FROM storefront.item WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Item::from))
    }

    #[instrument(skip(self))]
    async fn list_items(&self) -> Result<Vec<Item>, RepositoryError> {
        let rows = sqlx::query_as::<_, ItemRow>(
            "SELECT id, name, description, price FROM storefront.item ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Item::from).collect())
    }
}

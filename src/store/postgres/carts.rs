use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, query, query_as, FromRow, Postgres, Row};
use uuid::Uuid;

use super::{try_get_quantity, try_get_session, PgUnitOfWork};
use crate::domain::aggregates::{Cart, CartItem};
use crate::domain::value_objects::{Owner, Quantity, SessionId};
use crate::store::CartRepository;
use crate::{Result, ShopError};

const CART_COLUMNS: &str = "id, user_id, session_id, created_at, updated_at";
const ITEM_COLUMNS: &str = "id, cart_id, variant_id, quantity, price, added_at";

// The partial unique indexes turn a racing second insert into a no-op.
const INSERT_CART_SQL: &str = r"
    INSERT INTO carts (id, user_id, session_id, created_at, updated_at)
    VALUES ($1, $2, $3, $4, $4)
    ON CONFLICT DO NOTHING
";

#[async_trait]
impl CartRepository for PgUnitOfWork {
    async fn resolve_cart(&mut self, owner: &Owner, now: DateTime<Utc>) -> Result<Cart> {
        let fresh = Cart::new(owner, now);
        query(INSERT_CART_SQL)
            .bind(fresh.id)
            .bind(fresh.user_id)
            .bind(fresh.session_id.as_ref().map(SessionId::as_str))
            .bind(now)
            .execute(self.conn()?)
            .await?;

        let cart = match owner {
            Owner::User(user_id) => {
                query_as::<Postgres, Cart>(&format!(
                    "SELECT {CART_COLUMNS} FROM carts WHERE user_id = $1 ORDER BY created_at DESC LIMIT 1"
                ))
                .bind(user_id)
                .fetch_optional(self.conn()?)
                .await?
            }
            Owner::Session(session) => self.find_session_cart(session).await?,
            Owner::Anonymous => Some(fresh),
        };
        cart.ok_or_else(|| ShopError::Internal(format!("cart for {owner} vanished after upsert")))
    }

    async fn find_session_cart(&mut self, session: &SessionId) -> Result<Option<Cart>> {
        let cart = query_as::<Postgres, Cart>(&format!(
            "SELECT {CART_COLUMNS} FROM carts WHERE session_id = $1 AND user_id IS NULL \
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(session.as_str())
        .fetch_optional(self.conn()?)
        .await?;
        Ok(cart)
    }

    async fn touch_cart(&mut self, cart_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        query("UPDATE carts SET updated_at = $2 WHERE id = $1")
            .bind(cart_id)
            .bind(now)
            .execute(self.conn()?)
            .await?;
        Ok(())
    }

    async fn delete_cart(&mut self, cart_id: Uuid) -> Result<u64> {
        let rows_affected = query("DELETE FROM carts WHERE id = $1")
            .bind(cart_id)
            .execute(self.conn()?)
            .await?
            .rows_affected();
        Ok(rows_affected)
    }

    async fn cart_items(&mut self, cart_id: Uuid) -> Result<Vec<CartItem>> {
        let items = query_as::<Postgres, CartItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM cart_items WHERE cart_id = $1 ORDER BY added_at, id"
        ))
        .bind(cart_id)
        .fetch_all(self.conn()?)
        .await?;
        Ok(items)
    }

    async fn lock_cart_items(&mut self, cart_id: Uuid) -> Result<Vec<CartItem>> {
        let items = query_as::<Postgres, CartItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM cart_items WHERE cart_id = $1 ORDER BY added_at, id FOR UPDATE"
        ))
        .bind(cart_id)
        .fetch_all(self.conn()?)
        .await?;
        Ok(items)
    }

    async fn cart_item(&mut self, cart_id: Uuid, item_id: Uuid) -> Result<Option<CartItem>> {
        let item = query_as::<Postgres, CartItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM cart_items WHERE cart_id = $1 AND id = $2"
        ))
        .bind(cart_id)
        .bind(item_id)
        .fetch_optional(self.conn()?)
        .await?;
        Ok(item)
    }

    async fn lock_cart_item(&mut self, cart_id: Uuid, variant_id: Uuid) -> Result<Option<CartItem>> {
        let item = query_as::<Postgres, CartItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM cart_items WHERE cart_id = $1 AND variant_id = $2 FOR UPDATE"
        ))
        .bind(cart_id)
        .bind(variant_id)
        .fetch_optional(self.conn()?)
        .await?;
        Ok(item)
    }

    async fn upsert_cart_item(&mut self, item: &CartItem) -> Result<CartItem> {
        let stored = query_as::<Postgres, CartItem>(&format!(
            "INSERT INTO cart_items (id, cart_id, variant_id, quantity, price, added_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (cart_id, variant_id) DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity \
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(item.id)
        .bind(item.cart_id)
        .bind(item.variant_id)
        .bind(item.quantity.value())
        .bind(item.price)
        .bind(item.added_at)
        .fetch_one(self.conn()?)
        .await?;
        Ok(stored)
    }

    async fn set_cart_item_quantity(&mut self, item_id: Uuid, quantity: Quantity) -> Result<CartItem> {
        let item = query_as::<Postgres, CartItem>(&format!(
            "UPDATE cart_items SET quantity = $2 WHERE id = $1 RETURNING {ITEM_COLUMNS}"
        ))
        .bind(item_id)
        .bind(quantity.value())
        .fetch_one(self.conn()?)
        .await?;
        Ok(item)
    }

    async fn delete_cart_item(&mut self, cart_id: Uuid, item_id: Uuid) -> Result<u64> {
        let rows_affected = query("DELETE FROM cart_items WHERE cart_id = $1 AND id = $2")
            .bind(cart_id)
            .bind(item_id)
            .execute(self.conn()?)
            .await?
            .rows_affected();
        Ok(rows_affected)
    }

    async fn clear_cart_items(&mut self, cart_id: Uuid) -> Result<u64> {
        let rows_affected = query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id)
            .execute(self.conn()?)
            .await?
            .rows_affected();
        Ok(rows_affected)
    }
}

impl<'r> FromRow<'r, PgRow> for Cart {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            session_id: try_get_session(row, "session_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for CartItem {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            cart_id: row.try_get("cart_id")?,
            variant_id: row.try_get("variant_id")?,
            quantity: try_get_quantity(row, "quantity")?,
            price: row.try_get("price")?,
            added_at: row.try_get("added_at")?,
        })
    }
}

use async_trait::async_trait;
use sqlx::{postgres::PgRow, query_as, query_scalar, FromRow, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use super::{try_get_session, PgUnitOfWork};
use crate::domain::aggregates::{WishlistItem, WishlistOwner};
use crate::domain::value_objects::SessionId;
use crate::store::WishlistRepository;
use crate::{Result, ShopError};

const COLUMNS: &str = "id, user_id, session_id, variant_id, added_at";

/// Appends the owner predicate; session rows never carry a user.
fn push_owner(builder: &mut QueryBuilder<'_, Postgres>, owner: &WishlistOwner) {
    match owner {
        WishlistOwner::User(user_id) => {
            builder.push(" user_id = ").push_bind(*user_id);
        }
        WishlistOwner::Session(session) => {
            builder.push(" user_id IS NULL AND session_id = ").push_bind(session.as_str().to_string());
        }
    }
}

fn select(owner: &WishlistOwner) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("SELECT {COLUMNS} FROM wishlist_items WHERE"));
    push_owner(&mut builder, owner);
    builder
}

fn delete(owner: &WishlistOwner) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("DELETE FROM wishlist_items WHERE");
    push_owner(&mut builder, owner);
    builder
}

#[async_trait]
impl WishlistRepository for PgUnitOfWork {
    async fn wishlist(&mut self, owner: &WishlistOwner) -> Result<Vec<WishlistItem>> {
        let mut builder = select(owner);
        builder.push(" ORDER BY added_at DESC, id DESC");
        let items = builder.build_query_as::<WishlistItem>().fetch_all(self.conn()?).await?;
        Ok(items)
    }

    async fn wishlist_item_for(&mut self, owner: &WishlistOwner, variant_id: Uuid) -> Result<Option<WishlistItem>> {
        let mut builder = select(owner);
        builder.push(" AND variant_id = ").push_bind(variant_id);
        let item = builder.build_query_as::<WishlistItem>().fetch_optional(self.conn()?).await?;
        Ok(item)
    }

    async fn add_wishlist_item(&mut self, item: &WishlistItem) -> Result<(WishlistItem, bool)> {
        let inserted = query_as::<Postgres, WishlistItem>(&format!(
            "INSERT INTO wishlist_items (id, user_id, session_id, variant_id, added_at) \
             VALUES ($1, $2, $3, $4, $5) ON CONFLICT DO NOTHING RETURNING {COLUMNS}"
        ))
        .bind(item.id)
        .bind(item.user_id)
        .bind(item.session_id.as_ref().map(SessionId::as_str))
        .bind(item.variant_id)
        .bind(item.added_at)
        .fetch_optional(self.conn()?)
        .await?;
        if let Some(created) = inserted {
            return Ok((created, true));
        }

        let owner = match (&item.user_id, &item.session_id) {
            (Some(user_id), _) => WishlistOwner::User(*user_id),
            (None, Some(session)) => WishlistOwner::Session(session.clone()),
            (None, None) => return Err(ShopError::validation("Invalid data")),
        };
        let existing = self.wishlist_item_for(&owner, item.variant_id).await?.ok_or_else(|| {
            ShopError::Internal(format!("wishlist row for variant {} vanished", item.variant_id))
        })?;
        Ok((existing, false))
    }

    async fn delete_wishlist_item(&mut self, owner: &WishlistOwner, item_id: Uuid) -> Result<u64> {
        let mut builder = delete(owner);
        builder.push(" AND id = ").push_bind(item_id);
        Ok(builder.build().execute(self.conn()?).await?.rows_affected())
    }

    async fn delete_wishlist_variant(&mut self, owner: &WishlistOwner, variant_id: Uuid) -> Result<u64> {
        let mut builder = delete(owner);
        builder.push(" AND variant_id = ").push_bind(variant_id);
        Ok(builder.build().execute(self.conn()?).await?.rows_affected())
    }

    async fn count_wishlist(&mut self, owner: &WishlistOwner) -> Result<i64> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM wishlist_items WHERE");
        push_owner(&mut builder, owner);
        let count = builder.build_query_scalar::<i64>().fetch_one(self.conn()?).await?;
        Ok(count)
    }

    async fn wishlisted_among(&mut self, owner: &WishlistOwner, variant_ids: &[Uuid]) -> Result<Vec<Uuid>> {
        if variant_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = variant_ids.to_vec();
        let found = match owner {
            WishlistOwner::User(user_id) => {
                query_scalar::<Postgres, Uuid>(
                    "SELECT variant_id FROM wishlist_items WHERE user_id = $1 AND variant_id = ANY($2)",
                )
                .bind(*user_id)
                .bind(ids)
                .fetch_all(self.conn()?)
                .await?
            }
            WishlistOwner::Session(session) => {
                query_scalar::<Postgres, Uuid>(
                    "SELECT variant_id FROM wishlist_items \
                     WHERE user_id IS NULL AND session_id = $1 AND variant_id = ANY($2)",
                )
                .bind(session.as_str())
                .bind(ids)
                .fetch_all(self.conn()?)
                .await?
            }
        };
        Ok(found)
    }

    async fn lock_wishlist(&mut self, owner: &WishlistOwner) -> Result<Vec<WishlistItem>> {
        let mut builder = select(owner);
        builder.push(" ORDER BY added_at DESC, id DESC FOR UPDATE");
        let items = builder.build_query_as::<WishlistItem>().fetch_all(self.conn()?).await?;
        Ok(items)
    }

    async fn clear_wishlist(&mut self, owner: &WishlistOwner) -> Result<u64> {
        let rows_affected = delete(owner).build().execute(self.conn()?).await?.rows_affected();
        Ok(rows_affected)
    }
}

impl<'r> FromRow<'r, PgRow> for WishlistItem {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            session_id: try_get_session(row, "session_id")?,
            variant_id: row.try_get("variant_id")?,
            added_at: row.try_get("added_at")?,
        })
    }
}


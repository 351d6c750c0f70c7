//! Cart operations.

use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::domain::aggregates::cart::reconcile_line;
use crate::domain::aggregates::{CartItem, CartView, IncomingLine, LineMerge};
use crate::domain::value_objects::{Identity, Owner, Quantity, SessionId};
use crate::store::{CartRepository, CatalogRepository, DynStore, UnitOfWork};
use crate::{Result, ShopError};

#[derive(Clone, Debug, Serialize)]
pub struct CartMerge {
    pub merged_items: usize,
    pub cart: CartView,
}

#[derive(Clone)]
pub struct CartService {
    store: DynStore,
}

/// Writes one reconciled line and returns the stored row.
async fn write_line(uow: &mut dyn UnitOfWork, merge: LineMerge) -> Result<CartItem> {
    match merge {
        LineMerge::Increment { item_id, quantity } => uow.set_cart_item_quantity(item_id, quantity).await,
        LineMerge::Insert(item) => uow.upsert_cart_item(&item).await,
    }
}

impl CartService {
    #[must_use]
    pub fn new(store: DynStore) -> Self { Self { store } }

    pub async fn current(&self, identity: &Identity) -> Result<CartView> {
        let mut uow = self.store.begin().await?;
        let cart = uow.resolve_cart(&identity.owner(), Utc::now()).await?;
        let items = uow.cart_items(cart.id).await?;
        uow.commit().await?;
        Ok(CartView::new(cart, items))
    }

    /// Adds at the catalog's current price; repeat adds only raise the quantity.
    pub async fn add_item(&self, identity: &Identity, variant_id: Uuid, quantity: Quantity) -> Result<CartItem> {
        let now = Utc::now();
        let mut uow = self.store.begin().await?;

        let variant = uow.variant(variant_id).await?.ok_or_else(|| ShopError::not_found("Variant"))?;
        let price = variant.require_price()?;

        let cart = uow.resolve_cart(&identity.owner(), now).await?;
        let existing = uow.lock_cart_item(cart.id, variant_id).await?;
        let incoming = IncomingLine { variant_id, quantity, price, added_at: now };
        let item = write_line(uow.as_mut(), reconcile_line(cart.id, existing.as_ref(), incoming)?).await?;
        uow.touch_cart(cart.id, now).await?;
        uow.commit().await?;

        info!(cart_id = %cart.id, variant_id = %variant_id, quantity = %item.quantity, "cart item added");
        Ok(item)
    }

    pub async fn update_quantity(&self, identity: &Identity, item_id: Uuid, quantity: i64) -> Result<CartItem> {
        let quantity = Quantity::new(quantity)?;
        let now = Utc::now();
        let mut uow = self.store.begin().await?;

        let cart = uow.resolve_cart(&identity.owner(), now).await?;
        let item = uow.cart_item(cart.id, item_id).await?.ok_or_else(|| ShopError::not_found("Cart item"))?;
        let updated = uow.set_cart_item_quantity(item.id, quantity).await?;
        uow.touch_cart(cart.id, now).await?;
        uow.commit().await?;
        Ok(updated)
    }

    pub async fn remove_item(&self, identity: &Identity, item_id: Uuid) -> Result<()> {
        let now = Utc::now();
        let mut uow = self.store.begin().await?;

        let cart = uow.resolve_cart(&identity.owner(), now).await?;
        if uow.delete_cart_item(cart.id, item_id).await? == 0 {
            return Err(ShopError::not_found("Cart item"));
        }
        uow.touch_cart(cart.id, now).await?;
        uow.commit().await?;
        Ok(())
    }

    /// Returns how many items were removed.
    pub async fn clear(&self, identity: &Identity) -> Result<u64> {
        let now = Utc::now();
        let mut uow = self.store.begin().await?;

        let cart = uow.resolve_cart(&identity.owner(), now).await?;
        let removed = uow.clear_cart_items(cart.id).await?;
        uow.touch_cart(cart.id, now).await?;
        uow.commit().await?;
        Ok(removed)
    }

    /// Folds the guest cart for `from_session` into the caller's cart and deletes it.
    pub async fn merge(&self, identity: &Identity, from_session: &str) -> Result<CartMerge> {
        let principal = identity.require_user()?;
        let session = SessionId::parse(from_session)?
            .ok_or_else(|| ShopError::invalid_field("from_session_id", "This field is required."))?;
        let now = Utc::now();
        let mut uow = self.store.begin().await?;

        let guest = uow.find_session_cart(&session).await?.ok_or_else(|| ShopError::not_found("Guest cart"))?;
        let target = uow.resolve_cart(&Owner::User(principal.user_id), now).await?;

        let guest_items = uow.lock_cart_items(guest.id).await?;
        for item in &guest_items {
            let existing = uow.lock_cart_item(target.id, item.variant_id).await?;
            let merge = reconcile_line(target.id, existing.as_ref(), IncomingLine::from_guest(item))?;
            write_line(uow.as_mut(), merge).await?;
        }

        uow.clear_cart_items(guest.id).await?;
        uow.delete_cart(guest.id).await?;
        uow.touch_cart(target.id, now).await?;
        let items = uow.cart_items(target.id).await?;
        uow.commit().await?;

        info!(
            guest_cart_id = %guest.id,
            cart_id = %target.id,
            merged_items = guest_items.len(),
            "guest cart merged"
        );
        let mut cart = target;
        cart.touch(now);
        Ok(CartMerge { merged_items: guest_items.len(), cart: CartView::new(cart, items) })
    }
}

//! Wishlist operations.

use std::collections::BTreeMap;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::domain::aggregates::wishlist::{wishlist_flags, MAX_BULK_CHECK};
use crate::domain::aggregates::{WishlistItem, WishlistOwner};
use crate::domain::value_objects::{Identity, SessionId};
use crate::store::{CatalogRepository, DynStore, UnitOfWork, WishlistRepository};
use crate::{Result, ShopError};

#[derive(Clone)]
pub struct WishlistService {
    store: DynStore,
}

impl WishlistService {
    #[must_use]
    pub fn new(store: DynStore) -> Self { Self { store } }

    pub async fn list(&self, identity: &Identity) -> Result<Vec<WishlistItem>> {
        let Some(owner) = WishlistOwner::lookup(&identity.owner()) else {
            return Ok(Vec::new());
        };
        let mut uow = self.store.begin().await?;
        uow.wishlist(&owner).await
    }

    /// Idempotent; the flag reports whether a new row was created.
    pub async fn add(&self, identity: &Identity, variant_id: Uuid) -> Result<(WishlistItem, bool)> {
        let owner = WishlistOwner::require(&identity.owner())?;
        let mut uow = self.store.begin().await?;
        if uow.variant(variant_id).await?.is_none() {
            return Err(ShopError::not_found("Variant"));
        }
        let added = uow.add_wishlist_item(&WishlistItem::new(&owner, variant_id, Utc::now())).await?;
        uow.commit().await?;
        Ok(added)
    }

    pub async fn remove(&self, identity: &Identity, item_id: Uuid) -> Result<()> {
        let owner = WishlistOwner::lookup(&identity.owner()).ok_or_else(|| ShopError::not_found("Wishlist item"))?;
        let mut uow = self.store.begin().await?;
        if uow.delete_wishlist_item(&owner, item_id).await? == 0 {
            return Err(ShopError::not_found("Wishlist item"));
        }
        uow.commit().await
    }

    pub async fn remove_variant(&self, identity: &Identity, variant_id: Uuid) -> Result<()> {
        let owner = WishlistOwner::lookup(&identity.owner()).ok_or_else(|| ShopError::not_found("Wishlist item"))?;
        let mut uow = self.store.begin().await?;
        if uow.delete_wishlist_variant(&owner, variant_id).await? == 0 {
            return Err(ShopError::not_found("Wishlist item"));
        }
        uow.commit().await
    }

    pub async fn count(&self, identity: &Identity) -> Result<i64> {
        let Some(owner) = WishlistOwner::lookup(&identity.owner()) else {
            return Ok(0);
        };
        let mut uow = self.store.begin().await?;
        uow.count_wishlist(&owner).await
    }

    pub async fn exists(&self, identity: &Identity, variant_id: Uuid) -> Result<bool> {
        let Some(owner) = WishlistOwner::lookup(&identity.owner()) else {
            return Ok(false);
        };
        let mut uow = self.store.begin().await?;
        Ok(uow.wishlist_item_for(&owner, variant_id).await?.is_some())
    }

    /// Membership flag for every requested variant, resolved in a single lookup.
    pub async fn check(&self, identity: &Identity, variant_ids: &[Uuid]) -> Result<BTreeMap<Uuid, bool>> {
        if variant_ids.len() > MAX_BULK_CHECK {
            return Err(ShopError::invalid_field(
                "variants",
                format!("At most {MAX_BULK_CHECK} variants can be checked at once."),
            ));
        }
        let present = match WishlistOwner::lookup(&identity.owner()) {
            Some(owner) => {
                let mut uow = self.store.begin().await?;
                uow.wishlisted_among(&owner, variant_ids).await?
            }
            None => Vec::new(),
        };
        Ok(wishlist_flags(variant_ids, &present))
    }

    /// Moves the guest session's rows onto the caller and returns the merged list.
    pub async fn merge(&self, identity: &Identity, from_session: &str) -> Result<Vec<WishlistItem>> {
        let principal = identity.require_user()?;
        let session = SessionId::parse(from_session)?
            .ok_or_else(|| ShopError::invalid_field("from_session_id", "This field is required."))?;
        let guest = WishlistOwner::Session(session);
        let target = WishlistOwner::User(principal.user_id);
        let mut uow = self.store.begin().await?;

        let guest_rows = uow.lock_wishlist(&guest).await?;
        let mut created = 0usize;
        for row in &guest_rows {
            let (_, inserted) = uow.add_wishlist_item(&WishlistItem::new(&target, row.variant_id, row.added_at)).await?;
            created += usize::from(inserted);
        }
        uow.clear_wishlist(&guest).await?;
        let merged = uow.wishlist(&target).await?;
        uow.commit().await?;

        info!(user_id = %principal.user_id, guest_rows = guest_rows.len(), created, "guest wishlist merged");
        Ok(merged)
    }
}

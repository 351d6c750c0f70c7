//! Wishlist storage.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::aggregates::{WishlistItem, WishlistOwner};
use crate::Result;

#[async_trait]
pub trait WishlistRepository: Send {
    /// Newest first.
    async fn wishlist(&mut self, owner: &WishlistOwner) -> Result<Vec<WishlistItem>>;

    async fn wishlist_item_for(&mut self, owner: &WishlistOwner, variant_id: Uuid) -> Result<Option<WishlistItem>>;

    /// Get-or-create on (owner, variant). Returns the stored row and whether it was created.
    async fn add_wishlist_item(&mut self, item: &WishlistItem) -> Result<(WishlistItem, bool)>;

    async fn delete_wishlist_item(&mut self, owner: &WishlistOwner, item_id: Uuid) -> Result<u64>;

    async fn delete_wishlist_variant(&mut self, owner: &WishlistOwner, variant_id: Uuid) -> Result<u64>;

    async fn count_wishlist(&mut self, owner: &WishlistOwner) -> Result<i64>;

    /// Subset of `variant_ids` the owner has wishlisted, answered in one query.
    async fn wishlisted_among(&mut self, owner: &WishlistOwner, variant_ids: &[Uuid]) -> Result<Vec<Uuid>>;

    /// Owner's rows, row-locked until commit.
    async fn lock_wishlist(&mut self, owner: &WishlistOwner) -> Result<Vec<WishlistItem>>;

    async fn clear_wishlist(&mut self, owner: &WishlistOwner) -> Result<u64>;
}

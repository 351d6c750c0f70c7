//! Cart storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartItem};
use crate::domain::value_objects::{Owner, Quantity, SessionId};
use crate::Result;

#[async_trait]
pub trait CartRepository: Send {
    /// The owner's cart, created on first use. Concurrent first requests for
    /// the same owner converge on one row; anonymous owners always get a new cart.
    async fn resolve_cart(&mut self, owner: &Owner, now: DateTime<Utc>) -> Result<Cart>;

    /// Guest cart for a session token (carts without a user).
    async fn find_session_cart(&mut self, session: &SessionId) -> Result<Option<Cart>>;

    async fn touch_cart(&mut self, cart_id: Uuid, now: DateTime<Utc>) -> Result<()>;

    async fn delete_cart(&mut self, cart_id: Uuid) -> Result<u64>;

    /// Items in insertion order.
    async fn cart_items(&mut self, cart_id: Uuid) -> Result<Vec<CartItem>>;

    /// Items in insertion order, row-locked until commit.
    async fn lock_cart_items(&mut self, cart_id: Uuid) -> Result<Vec<CartItem>>;

    async fn cart_item(&mut self, cart_id: Uuid, item_id: Uuid) -> Result<Option<CartItem>>;

    /// The (cart, variant) row, row-locked until commit.
    async fn lock_cart_item(&mut self, cart_id: Uuid, variant_id: Uuid) -> Result<Option<CartItem>>;

    /// Inserts the line, or adds its quantity to the existing (cart, variant)
    /// row, which keeps its own price. Returns the stored row.
    async fn upsert_cart_item(&mut self, item: &CartItem) -> Result<CartItem>;

    async fn set_cart_item_quantity(&mut self, item_id: Uuid, quantity: Quantity) -> Result<CartItem>;

    async fn delete_cart_item(&mut self, cart_id: Uuid, item_id: Uuid) -> Result<u64>;

    async fn clear_cart_items(&mut self, cart_id: Uuid) -> Result<u64>;
}

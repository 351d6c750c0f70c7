//! Order storage.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::aggregates::{Order, OrderItem};
use crate::Result;

#[async_trait]
pub trait OrderRepository: Send {
    /// Returns `false` without writing when the order number is already taken.
    async fn insert_order(&mut self, order: &Order) -> Result<bool>;

    async fn insert_order_item(&mut self, item: &OrderItem) -> Result<()>;

    /// Persists the mutable columns: statuses, totals, payment, tracking and notes.
    async fn save_order(&mut self, order: &Order) -> Result<()>;

    async fn order(&mut self, id: Uuid) -> Result<Option<Order>>;

    async fn lock_order(&mut self, id: Uuid) -> Result<Option<Order>>;

    async fn order_by_number(&mut self, order_number: &str) -> Result<Option<Order>>;

    async fn order_items(&mut self, order_id: Uuid) -> Result<Vec<OrderItem>>;

    /// Newest first; every order when `user_id` is `None`.
    async fn orders(&mut self, user_id: Option<Uuid>) -> Result<Vec<Order>>;
}

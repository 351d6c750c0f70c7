//! Payment storage.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::aggregates::Payment;
use crate::Result;

#[async_trait]
pub trait PaymentRepository: Send {
    async fn insert_payment(&mut self, payment: &Payment) -> Result<()>;

    async fn save_payment(&mut self, payment: &Payment) -> Result<()>;

    async fn payment(&mut self, id: Uuid) -> Result<Option<Payment>>;

    async fn lock_payment(&mut self, id: Uuid) -> Result<Option<Payment>>;

    /// Most recent payment carrying the gateway transaction id, row-locked.
    async fn lock_payment_by_transaction(&mut self, transaction_id: &str) -> Result<Option<Payment>>;

    /// Newest first; every payment when `user_id` is `None`, otherwise those on the user's orders.
    async fn payments(&mut self, user_id: Option<Uuid>) -> Result<Vec<Payment>>;
}

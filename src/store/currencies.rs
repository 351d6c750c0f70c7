//! Currency and FX rate storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::aggregates::{Currency, FxRate};
use crate::Result;

#[async_trait]
pub trait CurrencyRepository: Send {
    /// Ordered by code.
    async fn currencies(&mut self) -> Result<Vec<Currency>>;

    async fn currency(&mut self, id: Uuid) -> Result<Option<Currency>>;

    async fn currency_by_code(&mut self, code: &str) -> Result<Option<Currency>>;

    async fn base_currency(&mut self) -> Result<Option<Currency>>;

    /// Fails with `Conflict` when the code is taken.
    async fn insert_currency(&mut self, currency: &Currency) -> Result<()>;

    async fn save_currency(&mut self, currency: &Currency) -> Result<()>;

    /// Drops the base flag from every currency.
    async fn clear_base_currency(&mut self, now: DateTime<Utc>) -> Result<u64>;

    async fn latest_rate(&mut self, base_id: Uuid, quote_id: Uuid) -> Result<Option<FxRate>>;

    async fn insert_rate(&mut self, rate: &FxRate) -> Result<()>;

    /// Newest first.
    async fn rates(&mut self) -> Result<Vec<FxRate>>;
}

//! Catalog read model access.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::aggregates::CatalogVariant;
use crate::Result;

#[async_trait]
pub trait CatalogRepository: Send {
    /// Current catalog view of a variant, including its effective unit price.
    async fn variant(&mut self, id: Uuid) -> Result<Option<CatalogVariant>>;
}

//! Persistence seam.
//!
//! Every service operation opens one [`UnitOfWork`], performs its reads and
//! writes through the repository traits and commits. Dropping a unit of work
//! without committing discards everything it wrote.

use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;

pub mod carts;
pub mod catalog;
pub mod currencies;
pub mod memory;
pub mod orders;
pub mod payments;
pub mod postgres;
pub mod principals;
pub mod wishlists;

pub use carts::CartRepository;
pub use catalog::CatalogRepository;
pub use currencies::CurrencyRepository;
pub use memory::{MemoryState, MemoryStore};
pub use orders::OrderRepository;
pub use payments::PaymentRepository;
pub use postgres::PgStore;
pub use principals::PrincipalRepository;
pub use wishlists::WishlistRepository;

/// One all-or-nothing transaction over every aggregate.
#[async_trait]
pub trait UnitOfWork:
    CatalogRepository
    + CartRepository
    + WishlistRepository
    + OrderRepository
    + PaymentRepository
    + CurrencyRepository
    + PrincipalRepository
    + Send
{
    async fn commit(&mut self) -> Result<()>;
}

#[async_trait]
pub trait Store: Send + Sync {
    fn backend_tag(&self) -> &'static str;

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;
}

pub type DynStore = Arc<dyn Store>;

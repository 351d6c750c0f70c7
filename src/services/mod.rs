//! Application services.
//!
//! Each operation opens one unit of work, applies the aggregate rules and
//! commits; events are dispatched only once the commit has succeeded.

use crate::config::CommerceSettings;
use crate::notify::DynNotifier;
use crate::store::DynStore;

pub mod carts;
pub mod currencies;
pub mod identity;
pub mod orders;
pub mod payments;
pub mod wishlists;

pub use carts::{CartMerge, CartService};
pub use currencies::{CurrencyChanges, CurrencyService, NewCurrency, RecordRate};
pub use identity::IdentityService;
pub use orders::{OrderLineRequest, OrderService, PlaceOrder, StatusUpdate};
pub use payments::{ConfirmPayment, InitiatePayment, PaymentService};
pub use wishlists::WishlistService;

/// Every service wired to the same store and notifier.
#[derive(Clone)]
pub struct Services {
    pub identity: IdentityService,
    pub carts: CartService,
    pub wishlists: WishlistService,
    pub orders: OrderService,
    pub payments: PaymentService,
    pub currencies: CurrencyService,
}

impl Services {
    #[must_use]
    pub fn new(store: DynStore, notifier: DynNotifier, settings: CommerceSettings) -> Self {
        Self {
            identity: IdentityService::new(store.clone()),
            carts: CartService::new(store.clone()),
            wishlists: WishlistService::new(store.clone()),
            orders: OrderService::new(store.clone(), notifier.clone(), settings),
            payments: PaymentService::new(store.clone(), notifier),
            currencies: CurrencyService::new(store),
        }
    }
}

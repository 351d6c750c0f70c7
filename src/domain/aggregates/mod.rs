//! Aggregates module
pub mod cart;
pub mod currency;
pub mod order;
pub mod payment;
pub mod product;
pub mod wishlist;

pub use cart::{Cart, CartItem, CartView, IncomingLine, LineMerge};
pub use currency::{Currency, FxRate, FxSnapshot};
pub use order::{Order, OrderDraft, OrderItem, OrderPaymentStatus, OrderStatus, OrderView};
pub use payment::{Payment, PaymentAttempt, PaymentStatus};
pub use product::CatalogVariant;
pub use wishlist::{WishlistItem, WishlistOwner};

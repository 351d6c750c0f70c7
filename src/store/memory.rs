//! Process-local store.
//!
//! A unit of work holds the store lock for its whole lifetime and writes to a
//! private copy of the state; `commit` swaps the copy in. Transactions are
//! therefore fully serialised, which also stands in for row locks.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::aggregates::{
    Cart, CartItem, CatalogVariant, Currency, FxRate, Order, OrderItem, Payment, WishlistItem, WishlistOwner,
};
use crate::domain::value_objects::{Owner, Principal, Quantity, SessionId};
use crate::store::{
    CartRepository, CatalogRepository, CurrencyRepository, OrderRepository, PaymentRepository, PrincipalRepository,
    Store, UnitOfWork, WishlistRepository,
};
use crate::{Result, ShopError};

#[derive(Clone, Debug)]
pub struct TokenGrant {
    pub principal: Principal,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default)]
pub struct MemoryState {
    pub variants: HashMap<Uuid, CatalogVariant>,
    pub tokens: HashMap<String, TokenGrant>,
    pub carts: Vec<Cart>,
    pub cart_items: Vec<CartItem>,
    pub wishlist_items: Vec<WishlistItem>,
    pub orders: Vec<Order>,
    pub order_items: Vec<OrderItem>,
    pub payments: Vec<Payment>,
    pub currencies: Vec<Currency>,
    pub fx_rates: Vec<FxRate>,
}

impl MemoryState {
    #[must_use]
    pub fn with_variant(mut self, variant: CatalogVariant) -> Self {
        self.variants.insert(variant.id, variant);
        self
    }

    #[must_use]
    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currencies.push(currency);
        self
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, principal: Principal) -> Self {
        self.tokens.insert(token.into(), TokenGrant { principal, expires_at: None });
        self
    }

    pub fn items_of(&self, cart_id: Uuid) -> Vec<&CartItem> {
        self.cart_items.iter().filter(|i| i.cart_id == cart_id).collect()
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn from_state(state: MemoryState) -> Self {
        Self { state: Arc::new(Mutex::new(state)) }
    }

    /// Copy of the committed state.
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    /// Edits committed state directly, outside any unit of work.
    pub async fn update(&self, edit: impl FnOnce(&mut MemoryState) + Send) {
        edit(&mut *self.state.lock().await);
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend_tag(&self) -> &'static str { "memory" }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let committed = Arc::clone(&self.state).lock_owned().await;
        let work = committed.clone();
        Ok(Box::new(MemoryUnitOfWork { committed, work }))
    }
}

pub struct MemoryUnitOfWork {
    committed: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(&mut self) -> Result<()> {
        *self.committed = self.work.clone();
        Ok(())
    }
}

#[async_trait]
impl CatalogRepository for MemoryUnitOfWork {
    async fn variant(&mut self, id: Uuid) -> Result<Option<CatalogVariant>> {
        Ok(self.work.variants.get(&id).cloned())
    }
}

fn is_session_cart(cart: &Cart, session: &SessionId) -> bool {
    cart.user_id.is_none() && cart.session_id.as_ref() == Some(session)
}

#[async_trait]
impl CartRepository for MemoryUnitOfWork {
    async fn resolve_cart(&mut self, owner: &Owner, now: DateTime<Utc>) -> Result<Cart> {
        let existing = match owner {
            Owner::User(id) => self.work.carts.iter().rev().find(|c| c.user_id == Some(*id)),
            Owner::Session(s) => self.work.carts.iter().rev().find(|c| is_session_cart(c, s)),
            Owner::Anonymous => None,
        };
        if let Some(cart) = existing {
            return Ok(cart.clone());
        }
        let cart = Cart::new(owner, now);
        self.work.carts.push(cart.clone());
        Ok(cart)
    }

    async fn find_session_cart(&mut self, session: &SessionId) -> Result<Option<Cart>> {
        Ok(self.work.carts.iter().rev().find(|c| is_session_cart(c, session)).cloned())
    }

    async fn touch_cart(&mut self, cart_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        if let Some(cart) = self.work.carts.iter_mut().find(|c| c.id == cart_id) {
            cart.touch(now);
        }
        Ok(())
    }

    async fn delete_cart(&mut self, cart_id: Uuid) -> Result<u64> {
        self.work.cart_items.retain(|i| i.cart_id != cart_id);
        Ok(remove_where(&mut self.work.carts, |c| c.id == cart_id))
    }

    async fn cart_items(&mut self, cart_id: Uuid) -> Result<Vec<CartItem>> {
        Ok(self.work.items_of(cart_id).into_iter().cloned().collect())
    }

    async fn lock_cart_items(&mut self, cart_id: Uuid) -> Result<Vec<CartItem>> {
        self.cart_items(cart_id).await
    }

    async fn cart_item(&mut self, cart_id: Uuid, item_id: Uuid) -> Result<Option<CartItem>> {
        Ok(self.work.cart_items.iter().find(|i| i.cart_id == cart_id && i.id == item_id).cloned())
    }

    async fn lock_cart_item(&mut self, cart_id: Uuid, variant_id: Uuid) -> Result<Option<CartItem>> {
        Ok(self.work.cart_items.iter().find(|i| i.cart_id == cart_id && i.variant_id == variant_id).cloned())
    }

    async fn upsert_cart_item(&mut self, item: &CartItem) -> Result<CartItem> {
        let existing = self
            .work
            .cart_items
            .iter_mut()
            .find(|i| i.cart_id == item.cart_id && i.variant_id == item.variant_id);
        if let Some(row) = existing {
            row.quantity = row.quantity.add(item.quantity)?;
            return Ok(row.clone());
        }
        self.work.cart_items.push(item.clone());
        Ok(item.clone())
    }

    async fn set_cart_item_quantity(&mut self, item_id: Uuid, quantity: Quantity) -> Result<CartItem> {
        let item = self
            .work
            .cart_items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| ShopError::not_found("Cart item"))?;
        item.quantity = quantity;
        Ok(item.clone())
    }

    async fn delete_cart_item(&mut self, cart_id: Uuid, item_id: Uuid) -> Result<u64> {
        Ok(remove_where(&mut self.work.cart_items, |i| i.cart_id == cart_id && i.id == item_id))
    }

    async fn clear_cart_items(&mut self, cart_id: Uuid) -> Result<u64> {
        Ok(remove_where(&mut self.work.cart_items, |i| i.cart_id == cart_id))
    }
}

#[async_trait]
impl WishlistRepository for MemoryUnitOfWork {
    async fn wishlist(&mut self, owner: &WishlistOwner) -> Result<Vec<WishlistItem>> {
        let mut items: Vec<WishlistItem> =
            self.work.wishlist_items.iter().filter(|w| w.owned_by(owner)).cloned().collect();
        items.sort_by(|a, b| b.added_at.cmp(&a.added_at));
        Ok(items)
    }

    async fn wishlist_item_for(&mut self, owner: &WishlistOwner, variant_id: Uuid) -> Result<Option<WishlistItem>> {
        Ok(self.work.wishlist_items.iter().find(|w| w.owned_by(owner) && w.variant_id == variant_id).cloned())
    }

    async fn add_wishlist_item(&mut self, item: &WishlistItem) -> Result<(WishlistItem, bool)> {
        let owner = match (&item.user_id, &item.session_id) {
            (Some(user), _) => WishlistOwner::User(*user),
            (None, Some(session)) => WishlistOwner::Session(session.clone()),
            (None, None) => return Err(ShopError::validation("Invalid data")),
        };
        if let Some(existing) = self.wishlist_item_for(&owner, item.variant_id).await? {
            return Ok((existing, false));
        }
        self.work.wishlist_items.push(item.clone());
        Ok((item.clone(), true))
    }

    async fn delete_wishlist_item(&mut self, owner: &WishlistOwner, item_id: Uuid) -> Result<u64> {
        Ok(remove_where(&mut self.work.wishlist_items, |w| w.owned_by(owner) && w.id == item_id))
    }

    async fn delete_wishlist_variant(&mut self, owner: &WishlistOwner, variant_id: Uuid) -> Result<u64> {
        Ok(remove_where(&mut self.work.wishlist_items, |w| w.owned_by(owner) && w.variant_id == variant_id))
    }

    async fn count_wishlist(&mut self, owner: &WishlistOwner) -> Result<i64> {
        let count = self.work.wishlist_items.iter().filter(|w| w.owned_by(owner)).count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn wishlisted_among(&mut self, owner: &WishlistOwner, variant_ids: &[Uuid]) -> Result<Vec<Uuid>> {
        Ok(self
            .work
            .wishlist_items
            .iter()
            .filter(|w| w.owned_by(owner) && variant_ids.contains(&w.variant_id))
            .map(|w| w.variant_id)
            .collect())
    }

    async fn lock_wishlist(&mut self, owner: &WishlistOwner) -> Result<Vec<WishlistItem>> {
        self.wishlist(owner).await
    }

    async fn clear_wishlist(&mut self, owner: &WishlistOwner) -> Result<u64> {
        Ok(remove_where(&mut self.work.wishlist_items, |w| w.owned_by(owner)))
    }
}

#[async_trait]
impl OrderRepository for MemoryUnitOfWork {
    async fn insert_order(&mut self, order: &Order) -> Result<bool> {
        if self.work.orders.iter().any(|o| o.order_number == order.order_number) {
            return Ok(false);
        }
        self.work.orders.push(order.clone());
        Ok(true)
    }

    async fn insert_order_item(&mut self, item: &OrderItem) -> Result<()> {
        if !self.work.orders.iter().any(|o| o.id == item.order_id) {
            return Err(ShopError::validation("Related resource not found"));
        }
        self.work.order_items.push(item.clone());
        Ok(())
    }

    async fn save_order(&mut self, order: &Order) -> Result<()> {
        let slot = self
            .work
            .orders
            .iter_mut()
            .find(|o| o.id == order.id)
            .ok_or_else(|| ShopError::not_found("Order"))?;
        *slot = order.clone();
        Ok(())
    }

    async fn order(&mut self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.work.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn lock_order(&mut self, id: Uuid) -> Result<Option<Order>> {
        self.order(id).await
    }

    async fn order_by_number(&mut self, order_number: &str) -> Result<Option<Order>> {
        Ok(self.work.orders.iter().find(|o| o.order_number.as_str() == order_number).cloned())
    }

    async fn order_items(&mut self, order_id: Uuid) -> Result<Vec<OrderItem>> {
        Ok(self.work.order_items.iter().filter(|i| i.order_id == order_id).cloned().collect())
    }

    async fn orders(&mut self, user_id: Option<Uuid>) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .work
            .orders
            .iter()
            .filter(|o| user_id.is_none() || o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}

#[async_trait]
impl PaymentRepository for MemoryUnitOfWork {
    async fn insert_payment(&mut self, payment: &Payment) -> Result<()> {
        self.work.payments.push(payment.clone());
        Ok(())
    }

    async fn save_payment(&mut self, payment: &Payment) -> Result<()> {
        let slot = self
            .work
            .payments
            .iter_mut()
            .find(|p| p.id == payment.id)
            .ok_or_else(|| ShopError::not_found("Payment"))?;
        *slot = payment.clone();
        Ok(())
    }

    async fn payment(&mut self, id: Uuid) -> Result<Option<Payment>> {
        Ok(self.work.payments.iter().find(|p| p.id == id).cloned())
    }

    async fn lock_payment(&mut self, id: Uuid) -> Result<Option<Payment>> {
        self.payment(id).await
    }

    async fn lock_payment_by_transaction(&mut self, transaction_id: &str) -> Result<Option<Payment>> {
        Ok(self
            .work
            .payments
            .iter()
            .filter(|p| p.transaction_id.as_deref() == Some(transaction_id))
            .max_by_key(|p| p.created_at)
            .cloned())
    }

    async fn payments(&mut self, user_id: Option<Uuid>) -> Result<Vec<Payment>> {
        let orders = &self.work.orders;
        let mut payments: Vec<Payment> = self
            .work
            .payments
            .iter()
            .filter(|p| {
                user_id.is_none() || orders.iter().any(|o| o.id == p.order_id && o.user_id == user_id)
            })
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }
}

#[async_trait]
impl CurrencyRepository for MemoryUnitOfWork {
    async fn currencies(&mut self) -> Result<Vec<Currency>> {
        let mut currencies = self.work.currencies.clone();
        currencies.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(currencies)
    }

    async fn currency(&mut self, id: Uuid) -> Result<Option<Currency>> {
        Ok(self.work.currencies.iter().find(|c| c.id == id).cloned())
    }

    async fn currency_by_code(&mut self, code: &str) -> Result<Option<Currency>> {
        Ok(self.work.currencies.iter().find(|c| c.code == code).cloned())
    }

    async fn base_currency(&mut self) -> Result<Option<Currency>> {
        Ok(self.work.currencies.iter().find(|c| c.is_base_currency).cloned())
    }

    async fn insert_currency(&mut self, currency: &Currency) -> Result<()> {
        if self.work.currencies.iter().any(|c| c.code == currency.code) {
            return Err(ShopError::Conflict("Resource already exists".into()));
        }
        self.work.currencies.push(currency.clone());
        Ok(())
    }

    async fn save_currency(&mut self, currency: &Currency) -> Result<()> {
        if self.work.currencies.iter().any(|c| c.code == currency.code && c.id != currency.id) {
            return Err(ShopError::Conflict("Resource already exists".into()));
        }
        let slot = self
            .work
            .currencies
            .iter_mut()
            .find(|c| c.id == currency.id)
            .ok_or_else(|| ShopError::not_found("Currency"))?;
        *slot = currency.clone();
        Ok(())
    }

    async fn clear_base_currency(&mut self, now: DateTime<Utc>) -> Result<u64> {
        let mut cleared = 0;
        for currency in self.work.currencies.iter_mut().filter(|c| c.is_base_currency) {
            currency.is_base_currency = false;
            currency.updated_at = now;
            cleared += 1;
        }
        Ok(cleared)
    }

    async fn latest_rate(&mut self, base_id: Uuid, quote_id: Uuid) -> Result<Option<FxRate>> {
        Ok(self
            .work
            .fx_rates
            .iter()
            .filter(|r| r.base_currency_id == base_id && r.quote_currency_id == quote_id)
            .max_by_key(|r| r.as_of)
            .cloned())
    }

    async fn insert_rate(&mut self, rate: &FxRate) -> Result<()> {
        self.work.fx_rates.push(rate.clone());
        Ok(())
    }

    async fn rates(&mut self) -> Result<Vec<FxRate>> {
        let mut rates = self.work.fx_rates.clone();
        rates.sort_by(|a, b| b.as_of.cmp(&a.as_of));
        Ok(rates)
    }
}

#[async_trait]
impl PrincipalRepository for MemoryUnitOfWork {
    async fn principal_for_token(&mut self, token: &str, now: DateTime<Utc>) -> Result<Option<Principal>> {
        Ok(self
            .work
            .tokens
            .get(token)
            .filter(|grant| grant.expires_at.map_or(true, |at| at > now))
            .map(|grant| grant.principal))
    }
}

fn remove_where<T>(rows: &mut Vec<T>, pred: impl Fn(&T) -> bool) -> u64 {
    let before = rows.len();
    rows.retain(|row| !pred(row));
    u64::try_from(before - rows.len()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use testresult::TestResult;

    #[tokio::test]
    async fn test_uncommitted_work_is_discarded() -> TestResult {
        let store = MemoryStore::new();
        {
            let mut uow = store.begin().await?;
            uow.resolve_cart(&Owner::Anonymous, Utc::now()).await?;
        }
        assert!(store.snapshot().await.carts.is_empty());

        let mut uow = store.begin().await?;
        uow.resolve_cart(&Owner::Anonymous, Utc::now()).await?;
        uow.commit().await?;
        drop(uow);
        assert_eq!(store.snapshot().await.carts.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_session_cart_resolves_once() -> TestResult {
        let store = MemoryStore::new();
        let owner = Owner::Session(SessionId::parse("S1")?.ok_or("blank")?);
        let mut uow = store.begin().await?;
        let first = uow.resolve_cart(&owner, Utc::now()).await?;
        let second = uow.resolve_cart(&owner, Utc::now()).await?;
        assert_eq!(first.id, second.id);
        let anon_a = uow.resolve_cart(&Owner::Anonymous, Utc::now()).await?;
        let anon_b = uow.resolve_cart(&Owner::Anonymous, Utc::now()).await?;
        assert_ne!(anon_a.id, anon_b.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_cart_line_sums_into_first_row() -> TestResult {
        let store = MemoryStore::new();
        let mut uow = store.begin().await?;
        let cart = uow.resolve_cart(&Owner::Anonymous, Utc::now()).await?;
        let item = CartItem {
            id: Uuid::now_v7(), cart_id: cart.id, variant_id: Uuid::now_v7(),
            quantity: Quantity::new(1)?, price: Decimal::ONE, added_at: Utc::now(),
        };
        uow.upsert_cart_item(&item).await?;
        let dup = CartItem { id: Uuid::now_v7(), quantity: Quantity::new(4)?, price: Decimal::TEN, ..item.clone() };
        let stored = uow.upsert_cart_item(&dup).await?;
        assert_eq!((stored.id, stored.quantity, stored.price), (item.id, Quantity::new(5)?, Decimal::ONE));
        assert_eq!(uow.cart_items(cart.id).await?.len(), 1);

        let overflow = CartItem { id: Uuid::now_v7(), quantity: Quantity::new(i64::from(i32::MAX))?, ..item };
        assert!(matches!(uow.upsert_cart_item(&overflow).await, Err(ShopError::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_expired_token_is_ignored() -> TestResult {
        let principal = Principal { user_id: Uuid::now_v7(), is_staff: false };
        let mut state = MemoryState::default().with_token("live", principal);
        state.tokens.insert(
            "stale".into(),
            TokenGrant { principal, expires_at: Some(Utc::now() - chrono::Duration::hours(1)) },
        );
        let store = MemoryStore::from_state(state);
        let mut uow = store.begin().await?;
        assert_eq!(uow.principal_for_token("live", Utc::now()).await?, Some(principal));
        assert_eq!(uow.principal_for_token("stale", Utc::now()).await?, None);
        assert_eq!(uow.principal_for_token("nope", Utc::now()).await?, None);
        Ok(())
    }
}

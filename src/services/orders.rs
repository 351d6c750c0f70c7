//! Order placement and administration.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::CommerceSettings;
use crate::domain::aggregates::{FxSnapshot, Order, OrderDraft, OrderStatus, OrderView};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::{check_money, Identity, OrderNumber, Quantity};
use crate::notify::{dispatch, DynNotifier};
use crate::store::{CatalogRepository, CurrencyRepository, DynStore, OrderRepository, UnitOfWork};
use crate::{Result, ShopError};

/// Produces a candidate order number for the given instant.
pub type NumberSource = Arc<dyn Fn(DateTime<Utc>) -> OrderNumber + Send + Sync>;

#[derive(Clone, Debug)]
pub struct OrderLineRequest {
    pub variant_id: Uuid,
    pub quantity: Quantity,
    pub discount_amount: Decimal,
}

#[derive(Clone, Debug)]
pub struct PlaceOrder {
    pub guest_email: Option<String>,
    pub currency_id: Uuid,
    pub shipping_address_id: Option<Uuid>,
    pub billing_address_id: Option<Uuid>,
    pub payment_method: Option<String>,
    pub admin_notes: Option<String>,
    pub shipping_cost_base: Decimal,
    pub discount_base: Decimal,
    pub items: Vec<OrderLineRequest>,
}

impl PlaceOrder {
    fn check(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(ShopError::invalid_field("items", "At least one item is required."));
        }
        for line in &self.items {
            check_money("items", line.discount_amount)?;
        }
        check_money("shipping_cost_base", self.shipping_cost_base)?;
        check_money("discount_base", self.discount_base)
    }
}

#[derive(Clone, Debug)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub admin_notes: Option<String>,
}

#[derive(Clone)]
pub struct OrderService {
    store: DynStore,
    notifier: DynNotifier,
    settings: CommerceSettings,
    numbers: NumberSource,
}

impl OrderService {
    #[must_use]
    pub fn new(store: DynStore, notifier: DynNotifier, settings: CommerceSettings) -> Self {
        Self { store, notifier, settings, numbers: Arc::new(OrderNumber::generate) }
    }

    #[must_use]
    pub fn with_number_source(mut self, numbers: NumberSource) -> Self {
        self.numbers = numbers;
        self
    }

    /// Prices every line from the catalog and persists the order in one transaction.
    pub async fn place(&self, identity: &Identity, request: PlaceOrder) -> Result<OrderView> {
        request.check()?;
        let now = Utc::now();
        let mut uow = self.store.begin().await?;

        let currency = uow
            .currency(request.currency_id)
            .await?
            .ok_or_else(|| ShopError::invalid_field("currency", "Unknown currency."))?;
        if !currency.is_active {
            return Err(ShopError::invalid_field("currency", "Currency is not active."));
        }
        let base = uow.base_currency().await?;
        let latest = match &base {
            Some(b) if b.id != currency.id => uow.latest_rate(b.id, currency.id).await?,
            _ => None,
        };

        let draft = OrderDraft {
            user_id: identity.user_id(),
            guest_email: request.guest_email,
            currency_id: currency.id,
            shipping_address_id: request.shipping_address_id,
            billing_address_id: request.billing_address_id,
            payment_method: request.payment_method,
            admin_notes: request.admin_notes,
            shipping_cost_base: request.shipping_cost_base,
            discount_base: request.discount_base,
            fx: FxSnapshot::resolve(&currency, base.as_ref(), latest.as_ref()),
        };
        draft.check_identity()?;

        let mut order = self.open_order(uow.as_mut(), &draft, now).await?;
        let mut items = Vec::with_capacity(request.items.len());
        for line in &request.items {
            let variant = uow.variant(line.variant_id).await?.ok_or_else(|| {
                ShopError::invalid_field("items", format!("Variant {} does not exist.", line.variant_id))
            })?;
            let item = order.price_line(&variant, line.quantity, line.discount_amount)?;
            uow.insert_order_item(&item).await?;
            items.push(item);
        }
        order.apply_totals(&items, draft.shipping_cost_base, draft.discount_base)?;
        uow.save_order(&order).await?;
        uow.commit().await?;

        info!(
            order_number = %order.order_number,
            items = items.len(),
            total = %order.total_amount_base,
            "order placed"
        );
        dispatch(self.notifier.as_ref(), &[DomainEvent::order_placed(&order)]).await;
        Ok(OrderView { order, items })
    }

    /// Inserts the order shell under a fresh number, retrying on collisions.
    async fn open_order(&self, uow: &mut dyn UnitOfWork, draft: &OrderDraft, now: DateTime<Utc>) -> Result<Order> {
        for attempt in 1..=self.settings.order_number_attempts {
            let order = Order::open((self.numbers)(now), draft, now);
            if uow.insert_order(&order).await? {
                return Ok(order);
            }
            debug!(attempt, order_number = %order.order_number, "order number collision");
        }
        warn!(attempts = self.settings.order_number_attempts, "order numbers exhausted");
        Err(ShopError::Conflict("Could not allocate a unique order number.".into()))
    }

    /// Staff see every order, customers their own.
    pub async fn list(&self, identity: &Identity) -> Result<Vec<Order>> {
        let principal = identity.require_user()?;
        let scope = (!principal.is_staff).then_some(principal.user_id);
        let mut uow = self.store.begin().await?;
        uow.orders(scope).await
    }

    /// Orders belonging to someone else read as missing.
    pub async fn get(&self, identity: &Identity, order_id: Uuid) -> Result<OrderView> {
        let principal = identity.require_user()?;
        let mut uow = self.store.begin().await?;
        let order = uow
            .order(order_id)
            .await?
            .filter(|o| principal.is_staff || o.is_owned_by(principal.user_id))
            .ok_or_else(|| ShopError::not_found("Order"))?;
        let items = uow.order_items(order.id).await?;
        Ok(OrderView { order, items })
    }

    pub async fn confirm_payment(
        &self,
        identity: &Identity,
        order_id: Uuid,
        transaction_id: &str,
        payment_method: Option<String>,
    ) -> Result<Order> {
        identity.require_staff()?;
        let transaction_id = transaction_id.trim();
        if transaction_id.is_empty() {
            return Err(ShopError::invalid_field("transaction_id", "This field is required."));
        }
        let now = Utc::now();
        let mut uow = self.store.begin().await?;
        let mut order = uow.lock_order(order_id).await?.ok_or_else(|| ShopError::not_found("Order"))?;
        order.mark_paid(transaction_id.to_string(), payment_method, now)?;
        uow.save_order(&order).await?;
        uow.commit().await?;

        info!(order_number = %order.order_number, transaction_id, "order payment confirmed");
        let event = DomainEvent::OrderPaymentConfirmed {
            order_id: order.id,
            order_number: order.order_number.clone(),
            transaction_id: transaction_id.to_string(),
        };
        dispatch(self.notifier.as_ref(), &[event]).await;
        Ok(order)
    }

    pub async fn update_status(&self, identity: &Identity, order_id: Uuid, update: StatusUpdate) -> Result<Order> {
        identity.require_staff()?;
        let now = Utc::now();
        let mut uow = self.store.begin().await?;
        let mut order = uow.lock_order(order_id).await?.ok_or_else(|| ShopError::not_found("Order"))?;

        let from = order.order_status;
        order.transition(update.status, now)?;
        if let Some(tracking) = update.tracking_number.filter(|t| !t.trim().is_empty()) {
            order.tracking_number = Some(tracking);
        }
        if let Some(notes) = update.admin_notes {
            order.admin_notes = Some(notes);
        }
        if update.status == OrderStatus::Delivered {
            order.delivery_date = Some(now.date_naive());
        }
        uow.save_order(&order).await?;
        uow.commit().await?;

        info!(order_number = %order.order_number, %from, to = %order.order_status, "order status changed");
        let event = DomainEvent::OrderStatusChanged {
            order_id: order.id,
            order_number: order.order_number.clone(),
            from,
            to: order.order_status,
        };
        dispatch(self.notifier.as_ref(), &[event]).await;
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{CatalogVariant, Currency, FxRate, OrderPaymentStatus};
    use crate::notify::{LogNotifier, MockNotifier};
    use crate::store::{MemoryState, MemoryStore};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use testresult::TestResult;

    fn currency(code: &str, base: bool) -> Currency {
        Currency {
            id: Uuid::now_v7(), code: code.into(), name: code.into(), symbol: None,
            exchange_rate: if base { Decimal::ONE } else { Decimal::new(87, 0) },
            is_base_currency: base, is_active: true, decimal_places: 2,
            created_at: Utc::now(), updated_at: Utc::now(),
        }
    }

    fn variant(cents: i64) -> CatalogVariant {
        CatalogVariant {
            id: Uuid::now_v7(), product_name: Some("Dress".into()), sku: None,
            color: Some("Blue".into()), size: Some("M".into()), unit_price: Some(Decimal::new(cents, 2)),
        }
    }

    fn line(variant: &CatalogVariant, qty: i64, discount: i64) -> OrderLineRequest {
        OrderLineRequest {
            variant_id: variant.id,
            quantity: Quantity::new(qty).unwrap(),
            discount_amount: Decimal::new(discount, 0),
        }
    }

    fn request(currency_id: Uuid, items: Vec<OrderLineRequest>) -> PlaceOrder {
        PlaceOrder {
            guest_email: None, currency_id, shipping_address_id: None, billing_address_id: None,
            payment_method: None, admin_notes: None,
            shipping_cost_base: Decimal::new(10, 0), discount_base: Decimal::ZERO, items,
        }
    }

    struct Fixture {
        store: MemoryStore,
        kgs: Currency,
        usd: Currency,
        first: CatalogVariant,
        second: CatalogVariant,
    }

    fn fixture() -> Fixture {
        let (kgs, usd) = (currency("KGS", true), currency("USD", false));
        let (first, second) = (variant(2000), variant(1500));
        let state = MemoryState::default()
            .with_currency(kgs.clone())
            .with_currency(usd.clone())
            .with_variant(first.clone())
            .with_variant(second.clone());
        Fixture { store: MemoryStore::from_state(state), kgs, usd, first, second }
    }

    fn service(store: &MemoryStore) -> OrderService {
        OrderService::new(Arc::new(store.clone()), Arc::new(LogNotifier), CommerceSettings::default())
    }

    #[tokio::test]
    async fn totals_are_computed_server_side() -> TestResult {
        let fx = fixture();
        let items = vec![line(&fx.first, 2, 5), line(&fx.second, 1, 0)];
        let placed = service(&fx.store).place(&Identity::user(Uuid::now_v7()), request(fx.kgs.id, items)).await?;

        assert_eq!(placed.order.subtotal_base, Decimal::new(50, 0));
        assert_eq!(placed.order.total_amount_base, Decimal::new(60, 0));
        assert_eq!(placed.order.order_status, OrderStatus::Pending);
        assert_eq!(placed.order.payment_status, OrderPaymentStatus::Pending);
        assert_eq!(placed.order.fx_rate_to_base, Some(Decimal::ONE));
        assert_eq!(placed.items[0].variant_details, "Blue, M");
        Ok(())
    }

    #[tokio::test]
    async fn unknown_variant_rolls_back_everything() -> TestResult {
        let fx = fixture();
        let mut items = vec![line(&fx.first, 1, 0)];
        items.push(OrderLineRequest { variant_id: Uuid::now_v7(), ..line(&fx.second, 1, 0) });

        let result = service(&fx.store).place(&Identity::user(Uuid::now_v7()), request(fx.kgs.id, items)).await;
        assert!(matches!(result, Err(ShopError::Validation { .. })));
        let state = fx.store.snapshot().await;
        assert!(state.orders.is_empty());
        assert!(state.order_items.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn out_of_range_money_is_a_validation_error() -> TestResult {
        let fx = fixture();
        let svc = service(&fx.store);
        let user = Identity::user(Uuid::now_v7());

        let huge_shipping = PlaceOrder { shipping_cost_base: Decimal::MAX, ..request(fx.kgs.id, vec![line(&fx.first, 1, 0)]) };
        match svc.place(&user, huge_shipping).await {
            Err(ShopError::Validation { fields, .. }) => assert!(fields.contains_key("shipping_cost_base")),
            other => panic!("expected validation error, got {other:?}"),
        }

        let fractional = PlaceOrder { discount_base: Decimal::new(1005, 3), ..request(fx.kgs.id, vec![line(&fx.first, 1, 0)]) };
        assert!(matches!(svc.place(&user, fractional).await, Err(ShopError::Validation { .. })));

        let huge_line = request(fx.kgs.id, vec![line(&fx.first, i64::from(i32::MAX), 0)]);
        match svc.place(&user, huge_line).await {
            Err(ShopError::Validation { fields, .. }) => assert!(fields.contains_key("items")),
            other => panic!("expected validation error, got {other:?}"),
        }

        let state = fx.store.snapshot().await;
        assert!(state.orders.is_empty());
        assert!(state.order_items.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn guest_needs_email() -> TestResult {
        let fx = fixture();
        let svc = service(&fx.store);
        let missing = svc.place(&Identity::default(), request(fx.kgs.id, vec![line(&fx.first, 1, 0)])).await;
        assert!(matches!(missing, Err(ShopError::Validation { .. })));

        let guest = PlaceOrder { guest_email: Some("guest@example.kg".into()), ..request(fx.kgs.id, vec![line(&fx.first, 1, 0)]) };
        let placed = svc.place(&Identity::default(), guest).await?;
        assert_eq!(placed.order.guest_email.as_deref(), Some("guest@example.kg"));
        Ok(())
    }

    #[tokio::test]
    async fn foreign_currency_snapshots_latest_rate() -> TestResult {
        let fx = fixture();
        let rate = FxRate::record(fx.kgs.id, fx.usd.id, Decimal::new(125, 4), Some("nbkr".into()), Utc::now())?;
        fx.store.update(|s| s.fx_rates.push(rate)).await;

        let placed = service(&fx.store)
            .place(&Identity::user(Uuid::now_v7()), request(fx.usd.id, vec![line(&fx.first, 1, 0)]))
            .await?;
        assert_eq!(placed.order.fx_rate_to_base, Some(Decimal::new(80, 0)));
        assert_eq!(placed.order.fx_source.as_deref(), Some("nbkr"));
        Ok(())
    }

    #[tokio::test]
    async fn colliding_numbers_are_retried() -> TestResult {
        let fx = fixture();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let numbers: NumberSource = Arc::new(move |now| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            OrderNumber::from_parts(now, if n < 2 { "AAAAAA" } else { "BBBBBB" })
        });
        let svc = service(&fx.store).with_number_source(numbers);
        let user = Identity::user(Uuid::now_v7());

        let first = svc.place(&user, request(fx.kgs.id, vec![line(&fx.first, 1, 0)])).await?;
        let second = svc.place(&user, request(fx.kgs.id, vec![line(&fx.first, 1, 0)])).await?;
        assert!(first.order.order_number.as_str().ends_with("AAAAAA"));
        assert!(second.order.order_number.as_str().ends_with("BBBBBB"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        Ok(())
    }

    #[tokio::test]
    async fn exhausted_numbers_fail_with_conflict() -> TestResult {
        let fx = fixture();
        let numbers: NumberSource = Arc::new(|now| OrderNumber::from_parts(now, "SAME01"));
        let svc = OrderService::new(
            Arc::new(fx.store.clone()),
            Arc::new(LogNotifier),
            CommerceSettings { order_number_attempts: 3 },
        )
        .with_number_source(numbers);
        let user = Identity::user(Uuid::now_v7());

        svc.place(&user, request(fx.kgs.id, vec![line(&fx.first, 1, 0)])).await?;
        let again = svc.place(&user, request(fx.kgs.id, vec![line(&fx.first, 1, 0)])).await;
        assert!(matches!(again, Err(ShopError::Conflict(_))));
        assert_eq!(fx.store.snapshot().await.orders.len(), 1);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_orders_get_distinct_numbers() -> TestResult {
        let fx = fixture();
        let svc = service(&fx.store);
        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..20 {
            let (svc, req) = (svc.clone(), request(fx.kgs.id, vec![line(&fx.first, 1, 0)]));
            tasks.spawn(async move { svc.place(&Identity::user(Uuid::now_v7()), req).await });
        }
        while let Some(joined) = tasks.join_next().await {
            joined??;
        }

        let state = fx.store.snapshot().await;
        let numbers: std::collections::HashSet<_> = state.orders.iter().map(|o| o.order_number.clone()).collect();
        assert_eq!(numbers.len(), 20);
        Ok(())
    }

    #[tokio::test]
    async fn visibility_is_owner_or_staff() -> TestResult {
        let fx = fixture();
        let svc = service(&fx.store);
        let owner = Identity::user(Uuid::now_v7());
        let placed = svc.place(&owner, request(fx.kgs.id, vec![line(&fx.first, 1, 0)])).await?;

        assert!(svc.get(&owner, placed.order.id).await.is_ok());
        assert!(svc.get(&Identity::staff(Uuid::now_v7()), placed.order.id).await.is_ok());
        let stranger = svc.get(&Identity::user(Uuid::now_v7()), placed.order.id).await;
        assert!(matches!(stranger, Err(ShopError::NotFound(_))));
        assert!(matches!(svc.list(&Identity::default()).await, Err(ShopError::Unauthorized(_))));
        assert!(svc.list(&Identity::user(Uuid::now_v7())).await?.is_empty());
        assert_eq!(svc.list(&Identity::staff(Uuid::now_v7())).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn admin_workflow_emits_events() -> TestResult {
        let fx = fixture();
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(3).returning(|_| Ok(()));
        let svc = OrderService::new(Arc::new(fx.store.clone()), Arc::new(notifier), CommerceSettings::default());
        let staff = Identity::staff(Uuid::now_v7());
        let placed = svc
            .place(&Identity::user(Uuid::now_v7()), request(fx.kgs.id, vec![line(&fx.first, 1, 0)]))
            .await?;

        let denied = svc.confirm_payment(&Identity::user(Uuid::now_v7()), placed.order.id, "tx-1", None).await;
        assert!(matches!(denied, Err(ShopError::PermissionDenied(_))));
        let paid = svc.confirm_payment(&staff, placed.order.id, "tx-1", Some("Card".into())).await?;
        assert_eq!(paid.payment_status, OrderPaymentStatus::Paid);
        let again = svc.confirm_payment(&staff, placed.order.id, "tx-2", None).await;
        assert!(matches!(again, Err(ShopError::InvalidState(_))));

        let update = StatusUpdate { status: OrderStatus::Confirmed, tracking_number: None, admin_notes: Some("rush".into()) };
        let confirmed = svc.update_status(&staff, placed.order.id, update).await?;
        assert_eq!(confirmed.admin_notes.as_deref(), Some("rush"));
        let bad = StatusUpdate { status: OrderStatus::Delivered, tracking_number: None, admin_notes: None };
        assert!(matches!(svc.update_status(&staff, placed.order.id, bad).await, Err(ShopError::InvalidState(_))));
        Ok(())
    }
}

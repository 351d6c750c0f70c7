//! Payment records: customer-side initiation and gateway/admin settlement.

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::domain::aggregates::{Order, Payment, PaymentAttempt, PaymentStatus};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::Identity;
use crate::notify::{dispatch, DynNotifier};
use crate::store::{DynStore, OrderRepository, PaymentRepository};
use crate::{Result, ShopError};

#[derive(Clone, Debug)]
pub struct InitiatePayment {
    pub order_number: String,
    pub guest_email: Option<String>,
    pub amount: Decimal,
    pub currency_id: Uuid,
    pub payment_method: String,
    pub payment_provider: Option<String>,
    pub transaction_id: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ConfirmPayment {
    pub payment_id: Option<Uuid>,
    pub transaction_id: Option<String>,
    pub status: PaymentStatus,
    pub gateway_response: Option<Value>,
}

#[derive(Clone)]
pub struct PaymentService {
    store: DynStore,
    notifier: DynNotifier,
}

/// Authenticated callers must own the order; anonymous callers prove it with the guest e-mail.
fn check_payer(identity: &Identity, order: &Order, guest_email: Option<&str>) -> Result<()> {
    if let Some(principal) = identity.principal {
        if !order.is_owned_by(principal.user_id) {
            return Err(ShopError::PermissionDenied("Not your order.".into()));
        }
        return Ok(());
    }
    let supplied = guest_email.map(str::trim).filter(|e| !e.is_empty());
    match (supplied, order.guest_email.as_deref()) {
        (Some(supplied), Some(stored)) if supplied == stored => Ok(()),
        _ => Err(ShopError::invalid_field("guest_email", "Guest email does not match the order.")),
    }
}

impl PaymentService {
    #[must_use]
    pub fn new(store: DynStore, notifier: DynNotifier) -> Self { Self { store, notifier } }

    /// Opens a Pending payment against an order.
    pub async fn initiate(&self, identity: &Identity, request: InitiatePayment) -> Result<Payment> {
        if request.payment_method.trim().is_empty() {
            return Err(ShopError::invalid_field("payment_method", "This field is required."));
        }
        let now = Utc::now();
        let mut uow = self.store.begin().await?;
        let order = uow
            .order_by_number(request.order_number.trim())
            .await?
            .ok_or_else(|| ShopError::invalid_field("order_number", "Order not found."))?;

        let attempt = PaymentAttempt {
            amount: request.amount,
            currency_id: request.currency_id,
            payment_method: request.payment_method.trim().to_string(),
            payment_provider: request.payment_provider,
            transaction_id: request.transaction_id,
        };
        let payment = Payment::initiate(&order, attempt, now)?;
        check_payer(identity, &order, request.guest_email.as_deref())?;

        uow.insert_payment(&payment).await?;
        uow.commit().await?;

        info!(payment_id = %payment.id, order_number = %order.order_number, amount = %payment.amount, "payment initiated");
        let event = DomainEvent::PaymentInitiated { payment_id: payment.id, order_id: order.id, amount: payment.amount };
        dispatch(self.notifier.as_ref(), &[event]).await;
        Ok(payment)
    }

    /// Records the outcome reported by a gateway webhook or an operator.
    pub async fn confirm(&self, identity: &Identity, request: ConfirmPayment) -> Result<Payment> {
        identity.require_staff()?;
        let transaction_id = request.transaction_id.as_deref().map(str::trim).filter(|t| !t.is_empty());
        let now = Utc::now();
        let mut uow = self.store.begin().await?;

        let found = match (request.payment_id, transaction_id) {
            (Some(id), _) => uow.lock_payment(id).await?,
            (None, Some(tx)) => uow.lock_payment_by_transaction(tx).await?,
            (None, None) => return Err(ShopError::validation("Provide payment_id or transaction_id.")),
        };
        let mut payment = found.ok_or_else(|| ShopError::not_found("Payment"))?;

        let from = payment.status;
        payment.settle(request.status, request.gateway_response, now)?;
        uow.save_payment(&payment).await?;
        uow.commit().await?;

        info!(payment_id = %payment.id, %from, to = %payment.status, "payment settled");
        dispatch(self.notifier.as_ref(), &[DomainEvent::payment_settled(&payment)]).await;
        Ok(payment)
    }

    pub async fn list(&self, identity: &Identity) -> Result<Vec<Payment>> {
        let principal = identity.require_user()?;
        let scope = (!principal.is_staff).then_some(principal.user_id);
        let mut uow = self.store.begin().await?;
        uow.payments(scope).await
    }

    /// Visible to staff and to the owner of the paid order.
    pub async fn get(&self, identity: &Identity, payment_id: Uuid) -> Result<Payment> {
        let principal = identity.require_user()?;
        let mut uow = self.store.begin().await?;
        let payment = uow.payment(payment_id).await?.ok_or_else(|| ShopError::not_found("Payment"))?;
        if principal.is_staff {
            return Ok(payment);
        }
        match uow.order(payment.order_id).await? {
            Some(order) if order.is_owned_by(principal.user_id) => Ok(payment),
            _ => Err(ShopError::not_found("Payment")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{FxSnapshot, OrderDraft};
    use crate::domain::value_objects::OrderNumber;
    use crate::notify::{LogNotifier, MockNotifier};
    use crate::store::{MemoryState, MemoryStore};
    use serde_json::json;
    use std::sync::Arc;
    use testresult::TestResult;

    fn order(user_id: Option<Uuid>, guest_email: Option<&str>, currency_id: Uuid) -> Order {
        let draft = OrderDraft {
            user_id, guest_email: guest_email.map(Into::into), currency_id,
            shipping_address_id: None, billing_address_id: None, payment_method: None, admin_notes: None,
            shipping_cost_base: Decimal::ZERO, discount_base: Decimal::ZERO,
            fx: FxSnapshot { rate_to_base: Decimal::ONE, source: "base".into() },
        };
        let mut order = Order::open(OrderNumber::from_parts(Utc::now(), "PAY001"), &draft, Utc::now());
        order.total_amount_base = Decimal::new(60, 0);
        order
    }

    fn request(order: &Order, guest_email: Option<&str>) -> InitiatePayment {
        InitiatePayment {
            order_number: order.order_number.to_string(),
            guest_email: guest_email.map(Into::into),
            amount: Decimal::new(60, 0),
            currency_id: order.currency_id,
            payment_method: "Card".into(),
            payment_provider: Some(" ".into()),
            transaction_id: Some("tx-77".into()),
        }
    }

    fn setup(order: &Order) -> (MemoryStore, PaymentService) {
        let mut state = MemoryState::default();
        state.orders.push(order.clone());
        let store = MemoryStore::from_state(state);
        (store.clone(), PaymentService::new(Arc::new(store), Arc::new(LogNotifier)))
    }

    #[tokio::test]
    async fn owner_and_matching_guest_may_initiate() -> TestResult {
        let owner = Uuid::now_v7();
        let mine = order(Some(owner), None, Uuid::now_v7());
        let (_, service) = setup(&mine);
        let payment = service.initiate(&Identity::user(owner), request(&mine, None)).await?;
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.payment_provider, None);
        assert_eq!(payment.transaction_id.as_deref(), Some("tx-77"));

        let guest_order = order(None, Some("guest@example.kg"), Uuid::now_v7());
        let (_, service) = setup(&guest_order);
        service.initiate(&Identity::default(), request(&guest_order, Some("guest@example.kg"))).await?;
        Ok(())
    }

    #[tokio::test]
    async fn ownership_guards() -> TestResult {
        let mine = order(Some(Uuid::now_v7()), None, Uuid::now_v7());
        let (store, service) = setup(&mine);
        let stranger = service.initiate(&Identity::user(Uuid::now_v7()), request(&mine, None)).await;
        assert!(matches!(stranger, Err(ShopError::PermissionDenied(_))));

        let guest_order = order(None, Some("guest@example.kg"), Uuid::now_v7());
        let (_, guest_service) = setup(&guest_order);
        for email in [None, Some("other@example.kg")] {
            let result = guest_service.initiate(&Identity::default(), request(&guest_order, email)).await;
            assert!(matches!(result, Err(ShopError::Validation { .. })));
        }

        let mut unknown = request(&mine, None);
        unknown.order_number = "19700101-NOPE00".into();
        match service.initiate(&Identity::default(), unknown).await {
            Err(ShopError::Validation { fields, .. }) => assert!(fields.contains_key("order_number")),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(store.snapshot().await.payments.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn currency_mismatch_fails_even_for_owner() -> TestResult {
        let owner = Uuid::now_v7();
        let mine = order(Some(owner), None, Uuid::now_v7());
        let (_, service) = setup(&mine);

        let mut wrong_currency = request(&mine, None);
        wrong_currency.currency_id = Uuid::now_v7();
        match service.initiate(&Identity::user(owner), wrong_currency).await {
            Err(ShopError::Validation { fields, .. }) => assert!(fields.contains_key("currency")),
            other => panic!("expected validation error, got {other:?}"),
        }
        let mut zero = request(&mine, None);
        zero.amount = Decimal::ZERO;
        assert!(matches!(service.initiate(&Identity::user(owner), zero).await, Err(ShopError::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn confirm_follows_transition_table() -> TestResult {
        let owner = Uuid::now_v7();
        let mine = order(Some(owner), None, Uuid::now_v7());
        let (_, service) = setup(&mine);
        let staff = Identity::staff(Uuid::now_v7());
        let payment = service.initiate(&Identity::user(owner), request(&mine, None)).await?;

        let settle = |status, gateway| ConfirmPayment {
            payment_id: None, transaction_id: Some("tx-77".into()), status, gateway_response: gateway,
        };
        let denied = service.confirm(&Identity::user(owner), settle(PaymentStatus::Completed, None)).await;
        assert!(matches!(denied, Err(ShopError::PermissionDenied(_))));

        let done = service.confirm(&staff, settle(PaymentStatus::Completed, Some(json!({"ok": true})))).await?;
        assert_eq!(done.id, payment.id);
        assert!(done.processed_at.is_some());
        let redelivered = service.confirm(&staff, settle(PaymentStatus::Completed, None)).await?;
        assert_eq!(redelivered.gateway_response, Some(json!({"ok": true})));

        let back = service.confirm(&staff, settle(PaymentStatus::Pending, None)).await;
        assert!(matches!(back, Err(ShopError::InvalidState(_))));
        let neither = ConfirmPayment { payment_id: None, transaction_id: Some(" ".into()), status: PaymentStatus::Failed, gateway_response: None };
        assert!(matches!(service.confirm(&staff, neither).await, Err(ShopError::Validation { .. })));
        let missing = ConfirmPayment { payment_id: Some(Uuid::now_v7()), ..settle(PaymentStatus::Failed, None) };
        assert!(matches!(service.confirm(&staff, missing).await, Err(ShopError::NotFound(_))));
        Ok(())
    }

    #[tokio::test]
    async fn visibility_and_events() -> TestResult {
        let owner = Uuid::now_v7();
        let mine = order(Some(owner), None, Uuid::now_v7());
        let mut state = MemoryState::default();
        state.orders.push(mine.clone());
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|event| event.subject() == "payment.initiated")
            .times(1)
            .returning(|_| Ok(()));
        let service = PaymentService::new(Arc::new(MemoryStore::from_state(state)), Arc::new(notifier));

        let payment = service.initiate(&Identity::user(owner), request(&mine, None)).await?;
        assert_eq!(service.get(&Identity::user(owner), payment.id).await?.id, payment.id);
        let stranger = service.get(&Identity::user(Uuid::now_v7()), payment.id).await;
        assert!(matches!(stranger, Err(ShopError::NotFound(_))));
        assert_eq!(service.list(&Identity::user(owner)).await?.len(), 1);
        assert!(service.list(&Identity::user(Uuid::now_v7())).await?.is_empty());
        assert_eq!(service.list(&Identity::staff(Uuid::now_v7())).await?.len(), 1);
        assert!(matches!(service.list(&Identity::default()).await, Err(ShopError::Unauthorized(_))));
        Ok(())
    }
}

//! Order Aggregate

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::currency::FxSnapshot;
use crate::domain::aggregates::product::CatalogVariant;
use crate::domain::value_objects::{money_max, OrderNumber, Quantity};
use crate::{Result, ShopError};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: OrderNumber,
    pub user_id: Option<Uuid>,
    pub guest_email: Option<String>,
    pub order_date: DateTime<Utc>,
    pub order_status: OrderStatus,
    pub payment_status: OrderPaymentStatus,
    pub payment_method: Option<String>,
    pub payment_transaction_id: Option<String>,
    pub shipping_address_id: Option<Uuid>,
    pub billing_address_id: Option<Uuid>,
    pub delivery_date: Option<NaiveDate>,
    pub tracking_number: Option<String>,
    pub fx_rate_to_base: Option<Decimal>,
    pub fx_source: Option<String>,
    pub subtotal_base: Decimal,
    pub shipping_cost_base: Decimal,
    pub discount_base: Decimal,
    pub total_amount_base: Decimal,
    pub currency_id: Uuid,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Line item with catalog fields copied at placement time so later catalog
/// edits never alter the historical record.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub variant_id: Uuid,
    pub product_name: String,
    pub variant_details: String,
    pub quantity: Quantity,
    pub unit_price: Decimal,
    pub discount_amount: Decimal,
    pub total_price: Decimal,
}

/// Fulfilment workflow. Cancellation is only reachable before shipping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        Self::Pending, Self::Confirmed, Self::Processing, Self::Shipped,
        Self::Delivered, Self::Cancelled, Self::Returned,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Confirmed => "Confirmed",
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
            Self::Returned => "Returned",
        }
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed | Cancelled)
                | (Confirmed, Processing | Shipped | Cancelled)
                | (Processing, Shipped | Cancelled)
                | (Shipped, Delivered | Returned)
                | (Delivered, Returned)
        )
    }
}

/// Payment state as seen from the order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderPaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
    #[serde(rename = "Partially Refunded")]
    PartiallyRefunded,
}

impl OrderPaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Paid => "Paid",
            Self::Failed => "Failed",
            Self::Refunded => "Refunded",
            Self::PartiallyRefunded => "Partially Refunded",
        }
    }

    pub fn can_transition_to(self, next: OrderPaymentStatus) -> bool {
        use OrderPaymentStatus::*;
        matches!(
            (self, next),
            (Pending, Paid | Failed)
                | (Failed, Paid)
                | (Paid, Refunded | PartiallyRefunded)
                | (PartiallyRefunded, Refunded)
        )
    }
}

macro_rules! status_text {
    ($ty:ty, $label:literal, [$($variant:ident),+]) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
        }

        impl FromStr for $ty {
            type Err = ShopError;
            fn from_str(s: &str) -> Result<Self> {
                [$(Self::$variant),+]
                    .into_iter()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
                    .ok_or_else(|| ShopError::invalid_field("status", format!("Unknown {} '{}'.", $label, s)))
            }
        }
    };
}

status_text!(OrderStatus, "order status", [Pending, Confirmed, Processing, Shipped, Delivered, Cancelled, Returned]);
status_text!(OrderPaymentStatus, "payment status", [Pending, Paid, Failed, Refunded, PartiallyRefunded]);

fn out_of_range(field: &str) -> ShopError {
    ShopError::invalid_field(field, "Amount exceeds the largest supported value.")
}

/// A computed amount must still fit a money column.
fn within_range(field: &str, amount: Decimal) -> Result<Decimal> {
    if amount > money_max() {
        return Err(out_of_range(field));
    }
    Ok(amount)
}

/// `unit_price × quantity − discount`, clamped at zero.
pub fn line_total(unit_price: Decimal, quantity: Quantity, discount: Decimal) -> Result<Decimal> {
    let total = unit_price
        .checked_mul(Decimal::from(quantity.value()))
        .and_then(|gross| gross.checked_sub(discount))
        .ok_or_else(|| out_of_range("items"))?;
    within_range("items", total.max(Decimal::ZERO))
}

/// `subtotal + shipping − discount`, clamped at zero.
pub fn order_total(subtotal: Decimal, shipping: Decimal, discount: Decimal) -> Result<Decimal> {
    let total = subtotal
        .checked_add(shipping)
        .and_then(|sum| sum.checked_sub(discount))
        .ok_or_else(|| out_of_range("total_amount_base"))?;
    within_range("total_amount_base", total.max(Decimal::ZERO))
}

/// Everything needed to open an order shell before its lines are priced.
#[derive(Clone, Debug)]
pub struct OrderDraft {
    pub user_id: Option<Uuid>,
    pub guest_email: Option<String>,
    pub currency_id: Uuid,
    pub shipping_address_id: Option<Uuid>,
    pub billing_address_id: Option<Uuid>,
    pub payment_method: Option<String>,
    pub admin_notes: Option<String>,
    pub shipping_cost_base: Decimal,
    pub discount_base: Decimal,
    pub fx: FxSnapshot,
}

impl OrderDraft {
    /// A placed order must belong to a user or carry a guest e-mail.
    pub fn check_identity(&self) -> Result<()> {
        let has_email = self.guest_email.as_deref().is_some_and(|e| !e.trim().is_empty());
        if self.user_id.is_none() && !has_email {
            return Err(ShopError::invalid_field(
                "guest_email",
                "Either authenticated user or guest_email is required.",
            ));
        }
        Ok(())
    }
}

impl Order {
    /// Pending/Pending shell; money fields stay zero until `apply_totals`.
    pub fn open(number: OrderNumber, draft: &OrderDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            order_number: number,
            user_id: draft.user_id,
            guest_email: draft.guest_email.clone().filter(|e| !e.trim().is_empty()),
            order_date: now,
            order_status: OrderStatus::Pending,
            payment_status: OrderPaymentStatus::Pending,
            payment_method: draft.payment_method.clone(),
            payment_transaction_id: None,
            shipping_address_id: draft.shipping_address_id,
            billing_address_id: draft.billing_address_id,
            delivery_date: None,
            tracking_number: None,
            fx_rate_to_base: Some(draft.fx.rate_to_base),
            fx_source: Some(draft.fx.source.clone()),
            subtotal_base: Decimal::ZERO,
            shipping_cost_base: Decimal::ZERO,
            discount_base: Decimal::ZERO,
            total_amount_base: Decimal::ZERO,
            currency_id: draft.currency_id,
            admin_notes: draft.admin_notes.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Snapshot one line from the catalog variant as it is right now.
    pub fn price_line(&self, variant: &CatalogVariant, quantity: Quantity, discount: Decimal) -> Result<OrderItem> {
        let unit_price = variant.require_price()?;
        Ok(OrderItem {
            id: Uuid::now_v7(),
            order_id: self.id,
            variant_id: variant.id,
            product_name: variant.display_name(),
            variant_details: variant.descriptor(),
            quantity,
            unit_price,
            discount_amount: discount,
            total_price: line_total(unit_price, quantity, discount)?,
        })
    }

    pub fn apply_totals(&mut self, items: &[OrderItem], shipping: Decimal, discount: Decimal) -> Result<()> {
        let subtotal = items
            .iter()
            .try_fold(Decimal::ZERO, |sum, item| sum.checked_add(item.total_price))
            .ok_or_else(|| out_of_range("subtotal_base"))?;
        self.subtotal_base = within_range("subtotal_base", subtotal)?;
        self.shipping_cost_base = shipping;
        self.discount_base = discount;
        self.total_amount_base = order_total(self.subtotal_base, shipping, discount)?;
        Ok(())
    }

    pub fn transition(&mut self, next: OrderStatus, now: DateTime<Utc>) -> Result<()> {
        if !self.order_status.can_transition_to(next) {
            return Err(ShopError::InvalidState(format!(
                "Order cannot move from {} to {}.",
                self.order_status, next
            )));
        }
        self.order_status = next;
        self.touch(now);
        Ok(())
    }

    /// Trusted administrative assertion that the order has been paid.
    pub fn mark_paid(&mut self, transaction_id: String, method: Option<String>, now: DateTime<Utc>) -> Result<()> {
        if !self.payment_status.can_transition_to(OrderPaymentStatus::Paid) {
            return Err(ShopError::InvalidState(format!(
                "Order payment is already {}.",
                self.payment_status
            )));
        }
        self.payment_status = OrderPaymentStatus::Paid;
        self.payment_transaction_id = Some(transaction_id);
        if let Some(method) = method.filter(|m| !m.trim().is_empty()) {
            self.payment_method = Some(method);
        }
        self.touch(now);
        Ok(())
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool { self.user_id == Some(user_id) }

    fn touch(&mut self, now: DateTime<Utc>) { self.updated_at = now; }
}

#[derive(Clone, Debug, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qty(n: i64) -> Quantity { Quantity::new(n).unwrap() }

    fn draft(user: Option<Uuid>, email: Option<&str>) -> OrderDraft {
        OrderDraft {
            user_id: user, guest_email: email.map(Into::into), currency_id: Uuid::now_v7(),
            shipping_address_id: None, billing_address_id: None, payment_method: None, admin_notes: None,
            shipping_cost_base: Decimal::ZERO, discount_base: Decimal::ZERO,
            fx: FxSnapshot { rate_to_base: Decimal::ONE, source: "base".into() },
        }
    }

    fn variant(cents: i64) -> CatalogVariant {
        CatalogVariant {
            id: Uuid::now_v7(), product_name: Some("Dress".into()), sku: None,
            color: Some("Red".into()), size: Some("S".into()), unit_price: Some(Decimal::new(cents, 2)),
        }
    }

    #[test]
    fn test_line_total_clamps_at_zero() {
        assert_eq!(line_total(Decimal::new(20, 0), qty(2), Decimal::new(5, 0)).unwrap(), Decimal::new(35, 0));
        assert_eq!(line_total(Decimal::new(1, 0), qty(1), Decimal::new(5, 0)).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_totals_past_money_range_are_rejected() {
        let huge = line_total(money_max(), qty(2), Decimal::ZERO).unwrap_err();
        assert_eq!(huge.code(), crate::ErrorCode::ValidationError);
        assert!(order_total(Decimal::MAX, Decimal::MAX, Decimal::ZERO).is_err());
        assert!(order_total(money_max(), Decimal::ONE, Decimal::ZERO).is_err());
        assert_eq!(order_total(money_max(), Decimal::ONE, Decimal::ONE).unwrap(), money_max());
    }

    #[test]
    fn test_totals_match_worked_example() {
        let d = draft(Some(Uuid::now_v7()), None);
        let mut order = Order::open(OrderNumber::from_stored("20250101-AAAAAA"), &d, Utc::now());
        let items = vec![
            order.price_line(&variant(2000), qty(2), Decimal::new(5, 0)).unwrap(),
            order.price_line(&variant(1500), qty(1), Decimal::ZERO).unwrap(),
        ];
        order.apply_totals(&items, Decimal::new(10, 0), Decimal::ZERO).unwrap();
        assert_eq!(order.subtotal_base, Decimal::new(50, 0));
        assert_eq!(order.total_amount_base, Decimal::new(60, 0));
        assert_eq!(items[0].product_name, "Dress");
        assert_eq!(items[0].variant_details, "Red, S");
    }

    #[test]
    fn test_total_clamped_when_discount_exceeds() {
        assert_eq!(order_total(Decimal::new(10, 0), Decimal::ZERO, Decimal::new(25, 0)).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_identity_required() {
        assert!(draft(None, None).check_identity().is_err());
        assert!(draft(None, Some("  ")).check_identity().is_err());
        assert!(draft(None, Some("a@b.kg")).check_identity().is_ok());
        assert!(draft(Some(Uuid::now_v7()), None).check_identity().is_ok());
    }

    #[test]
    fn test_status_transitions() {
        let mut order = Order::open(OrderNumber::from_stored("x"), &draft(Some(Uuid::now_v7()), None), Utc::now());
        order.transition(OrderStatus::Confirmed, Utc::now()).unwrap();
        order.transition(OrderStatus::Shipped, Utc::now()).unwrap();
        assert!(order.transition(OrderStatus::Cancelled, Utc::now()).is_err());
        order.transition(OrderStatus::Delivered, Utc::now()).unwrap();
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Pending));
        for s in OrderStatus::ALL {
            assert!(!s.can_transition_to(s), "{s} must not loop");
        }
    }

    #[test]
    fn test_mark_paid_once() {
        let mut order = Order::open(OrderNumber::from_stored("x"), &draft(Some(Uuid::now_v7()), None), Utc::now());
        order.mark_paid("tx-1".into(), Some("Card".into()), Utc::now()).unwrap();
        assert_eq!(order.payment_status, OrderPaymentStatus::Paid);
        assert_eq!(order.payment_method.as_deref(), Some("Card"));
        assert!(matches!(order.mark_paid("tx-2".into(), None, Utc::now()), Err(ShopError::InvalidState(_))));
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("shipped".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
        assert_eq!("Partially Refunded".parse::<OrderPaymentStatus>().unwrap(), OrderPaymentStatus::PartiallyRefunded);
        assert!("Lost".parse::<OrderStatus>().is_err());
    }
}

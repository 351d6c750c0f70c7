//! Payment Record

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::order::Order;
use crate::domain::value_objects::check_money;
use crate::{Result, ShopError};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub payment_method: String,
    pub payment_provider: Option<String>,
    pub transaction_id: Option<String>,
    pub amount: Decimal,
    pub currency_id: Uuid,
    pub status: PaymentStatus,
    pub gateway_response: Option<serde_json::Value>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Refunded,
    #[serde(rename = "Partially Refunded")]
    PartiallyRefunded,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::Refunded => "Refunded",
            Self::PartiallyRefunded => "Partially Refunded",
        }
    }

    pub fn is_terminal(self) -> bool { !matches!(self, Self::Pending) }

    /// Re-asserting the current status is allowed so gateway webhooks can be redelivered.
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        self == next && next != Pending
            || matches!(
                (self, next),
                (Pending, Completed | Failed)
                    | (Failed, Completed)
                    | (Completed, Refunded | PartiallyRefunded)
                    | (PartiallyRefunded, Refunded)
            )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for PaymentStatus {
    type Err = ShopError;
    fn from_str(s: &str) -> Result<Self> {
        [Self::Pending, Self::Completed, Self::Failed, Self::Refunded, Self::PartiallyRefunded]
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ShopError::invalid_field("status", format!("Unknown payment status '{s}'.")))
    }
}

/// Caller-declared facts for a new payment attempt.
#[derive(Clone, Debug)]
pub struct PaymentAttempt {
    pub amount: Decimal,
    pub currency_id: Uuid,
    pub payment_method: String,
    pub payment_provider: Option<String>,
    pub transaction_id: Option<String>,
}

impl Payment {
    /// Currency must match the order's and the amount must be positive.
    pub fn initiate(order: &Order, attempt: PaymentAttempt, now: DateTime<Utc>) -> Result<Self> {
        if attempt.currency_id != order.currency_id {
            return Err(ShopError::invalid_field("currency", "Payment currency must match order currency."));
        }
        if attempt.amount <= Decimal::ZERO {
            return Err(ShopError::invalid_field("amount", "Amount must be positive."));
        }
        check_money("amount", attempt.amount)?;
        Ok(Self {
            id: Uuid::now_v7(),
            order_id: order.id,
            payment_method: attempt.payment_method,
            payment_provider: non_blank(attempt.payment_provider),
            transaction_id: non_blank(attempt.transaction_id),
            amount: attempt.amount,
            currency_id: attempt.currency_id,
            status: PaymentStatus::Pending,
            gateway_response: None,
            processed_at: None,
            created_at: now,
        })
    }

    /// The gateway payload is stored verbatim and only replaced when supplied.
    pub fn settle(&mut self, status: PaymentStatus, gateway: Option<serde_json::Value>, now: DateTime<Utc>) -> Result<()> {
        if !self.status.can_transition_to(status) {
            return Err(ShopError::InvalidState(format!(
                "Payment cannot move from {} to {}.",
                self.status, status
            )));
        }
        self.status = status;
        if gateway.is_some() {
            self.gateway_response = gateway;
        }
        if status.is_terminal() {
            self.processed_at = Some(now);
        }
        Ok(())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::currency::FxSnapshot;
    use crate::domain::aggregates::order::OrderDraft;
    use crate::domain::value_objects::OrderNumber;

    fn order(currency_id: Uuid) -> Order {
        let draft = OrderDraft {
            user_id: Some(Uuid::now_v7()), guest_email: None, currency_id,
            shipping_address_id: None, billing_address_id: None, payment_method: None, admin_notes: None,
            shipping_cost_base: Decimal::ZERO, discount_base: Decimal::ZERO,
            fx: FxSnapshot { rate_to_base: Decimal::ONE, source: "base".into() },
        };
        Order::open(OrderNumber::from_stored("20250101-ABCDEF"), &draft, Utc::now())
    }

    fn attempt(currency_id: Uuid, cents: i64) -> PaymentAttempt {
        PaymentAttempt {
            amount: Decimal::new(cents, 2), currency_id, payment_method: "Card".into(),
            payment_provider: Some("  ".into()), transaction_id: None,
        }
    }

    #[test]
    fn test_initiate_rejects_currency_mismatch() {
        let o = order(Uuid::now_v7());
        let err = Payment::initiate(&o, attempt(Uuid::now_v7(), 1000), Utc::now()).unwrap_err();
        assert!(matches!(err, ShopError::Validation { .. }));
    }

    #[test]
    fn test_initiate_rejects_non_positive_amount() {
        let currency = Uuid::now_v7();
        assert!(Payment::initiate(&order(currency), attempt(currency, 0), Utc::now()).is_err());
    }

    #[test]
    fn test_initiate_rejects_amount_outside_money_column() {
        let currency = Uuid::now_v7();
        let fractional = PaymentAttempt { amount: Decimal::new(10_005, 3), ..attempt(currency, 0) };
        assert!(Payment::initiate(&order(currency), fractional, Utc::now()).is_err());
        let huge = PaymentAttempt { amount: Decimal::MAX, ..attempt(currency, 0) };
        assert!(Payment::initiate(&order(currency), huge, Utc::now()).is_err());
    }

    #[test]
    fn test_initiate_creates_pending() {
        let currency = Uuid::now_v7();
        let p = Payment::initiate(&order(currency), attempt(currency, 6000), Utc::now()).unwrap();
        assert_eq!(p.status, PaymentStatus::Pending);
        assert_eq!(p.payment_provider, None);
        assert_eq!(p.processed_at, None);
    }

    #[test]
    fn test_settle_lifecycle() {
        let currency = Uuid::now_v7();
        let mut p = Payment::initiate(&order(currency), attempt(currency, 6000), Utc::now()).unwrap();
        p.settle(PaymentStatus::Completed, Some(serde_json::json!({"ok": true})), Utc::now()).unwrap();
        assert!(p.processed_at.is_some());
        p.settle(PaymentStatus::Completed, None, Utc::now()).unwrap();
        assert_eq!(p.gateway_response, Some(serde_json::json!({"ok": true})));
        assert!(p.settle(PaymentStatus::Failed, None, Utc::now()).is_err());
        p.settle(PaymentStatus::PartiallyRefunded, None, Utc::now()).unwrap();
        p.settle(PaymentStatus::Refunded, None, Utc::now()).unwrap();
        assert!(p.settle(PaymentStatus::Pending, None, Utc::now()).is_err());
    }
}

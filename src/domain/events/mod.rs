//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::{Order, OrderStatus, Payment, PaymentStatus};
use crate::domain::value_objects::OrderNumber;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    OrderPlaced {
        order_id: Uuid,
        order_number: OrderNumber,
        user_id: Option<Uuid>,
        guest_email: Option<String>,
        total_amount_base: Decimal,
    },
    OrderPaymentConfirmed { order_id: Uuid, order_number: OrderNumber, transaction_id: String },
    OrderStatusChanged { order_id: Uuid, order_number: OrderNumber, from: OrderStatus, to: OrderStatus },
    PaymentInitiated { payment_id: Uuid, order_id: Uuid, amount: Decimal },
    PaymentSettled { payment_id: Uuid, order_id: Uuid, status: PaymentStatus },
}

impl DomainEvent {
    /// Subject suffix under which the event is published.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::OrderPlaced { .. } => "order.placed",
            Self::OrderPaymentConfirmed { .. } => "order.payment_confirmed",
            Self::OrderStatusChanged { .. } => "order.status_changed",
            Self::PaymentInitiated { .. } => "payment.initiated",
            Self::PaymentSettled { .. } => "payment.settled",
        }
    }

    pub fn order_placed(order: &Order) -> Self {
        Self::OrderPlaced {
            order_id: order.id,
            order_number: order.order_number.clone(),
            user_id: order.user_id,
            guest_email: order.guest_email.clone(),
            total_amount_base: order.total_amount_base,
        }
    }

    pub fn payment_settled(payment: &Payment) -> Self {
        Self::PaymentSettled { payment_id: payment.id, order_id: payment.order_id, status: payment.status }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_tag() {
        let event = DomainEvent::PaymentInitiated {
            payment_id: Uuid::nil(),
            order_id: Uuid::nil(),
            amount: Decimal::new(6000, 2),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "payment_initiated");
        assert_eq!(event.subject(), "payment.initiated");
    }
}

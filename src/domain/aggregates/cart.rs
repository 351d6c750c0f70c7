//! Cart Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::value_objects::{Owner, Quantity, SessionId};
use crate::Result;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Cart {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub session_id: Option<SessionId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row per distinct variant. `price` is the snapshot taken when the
/// variant first entered this cart and is never re-read.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CartItem {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub variant_id: Uuid,
    pub quantity: Quantity,
    pub price: Decimal,
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    pub fn line_total(&self) -> Decimal { self.price * Decimal::from(self.quantity.value()) }
}

impl Cart {
    pub fn new(owner: &Owner, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: owner.user_id(),
            session_id: owner.session_id().cloned(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn owner(&self) -> Owner {
        match (self.user_id, &self.session_id) {
            (Some(user), _) => Owner::User(user),
            (None, Some(session)) => Owner::Session(session.clone()),
            (None, None) => Owner::Anonymous,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) { self.updated_at = now; }
}

/// A variant arriving in a cart, either from add-to-cart or from a merged guest cart.
#[derive(Clone, Debug, PartialEq)]
pub struct IncomingLine {
    pub variant_id: Uuid,
    pub quantity: Quantity,
    pub price: Decimal,
    pub added_at: DateTime<Utc>,
}

impl IncomingLine {
    pub fn from_guest(item: &CartItem) -> Self {
        Self { variant_id: item.variant_id, quantity: item.quantity, price: item.price, added_at: item.added_at }
    }
}

/// What to write for an incoming line given the (locked) existing row, if any.
#[derive(Clone, Debug, PartialEq)]
pub enum LineMerge {
    /// Existing row keeps its price; quantity becomes the sum.
    Increment { item_id: Uuid, quantity: Quantity },
    Insert(CartItem),
}

pub fn reconcile_line(cart_id: Uuid, existing: Option<&CartItem>, incoming: IncomingLine) -> Result<LineMerge> {
    Ok(match existing {
        Some(item) => LineMerge::Increment { item_id: item.id, quantity: item.quantity.add(incoming.quantity)? },
        None => LineMerge::Insert(CartItem {
            id: Uuid::now_v7(),
            cart_id,
            variant_id: incoming.variant_id,
            quantity: incoming.quantity,
            price: incoming.price,
            added_at: incoming.added_at,
        }),
    })
}

#[derive(Clone, Debug, Serialize)]
pub struct CartView {
    #[serde(flatten)]
    pub cart: Cart,
    pub items: Vec<CartItem>,
    pub item_count: usize,
    pub total_quantity: i64,
    pub subtotal: Decimal,
}

impl CartView {
    pub fn new(cart: Cart, items: Vec<CartItem>) -> Self {
        let subtotal = items.iter().map(CartItem::line_total).sum();
        let total_quantity = items.iter().map(|i| i64::from(i.quantity.value())).sum();
        Self { item_count: items.len(), total_quantity, subtotal, cart, items }
    }

    pub fn quantity_of(&self, variant_id: Uuid) -> i32 {
        self.items.iter().find(|i| i.variant_id == variant_id).map_or(0, |i| i.quantity.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qty(n: i64) -> Quantity { Quantity::new(n).unwrap() }

    fn line(variant_id: Uuid, n: i64, price: Decimal) -> IncomingLine {
        IncomingLine { variant_id, quantity: qty(n), price, added_at: Utc::now() }
    }

    #[test]
    fn test_repeat_add_keeps_first_price() {
        let cart = Cart::new(&Owner::Anonymous, Utc::now());
        let variant = Uuid::now_v7();
        let first = match reconcile_line(cart.id, None, line(variant, 2, Decimal::new(5000, 2))).unwrap() {
            LineMerge::Insert(item) => item,
            other => panic!("expected insert, got {other:?}"),
        };
        let second = reconcile_line(cart.id, Some(&first), line(variant, 3, Decimal::new(6500, 2))).unwrap();
        assert_eq!(second, LineMerge::Increment { item_id: first.id, quantity: qty(5) });
        assert_eq!(first.price, Decimal::new(50, 0));
    }

    #[test]
    fn test_increment_past_quantity_range_is_rejected() {
        let cart = Cart::new(&Owner::Anonymous, Utc::now());
        let variant = Uuid::now_v7();
        let first = match reconcile_line(cart.id, None, line(variant, i64::from(i32::MAX), Decimal::ONE)).unwrap() {
            LineMerge::Insert(item) => item,
            other => panic!("expected insert, got {other:?}"),
        };
        let err = reconcile_line(cart.id, Some(&first), line(variant, 5, Decimal::ONE)).unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::ValidationError);
    }

    #[test]
    fn test_owner_round_trip() {
        let user = Uuid::now_v7();
        assert_eq!(Cart::new(&Owner::User(user), Utc::now()).owner(), Owner::User(user));
        let s = SessionId::parse("S1").unwrap().unwrap();
        let cart = Cart::new(&Owner::Session(s.clone()), Utc::now());
        assert_eq!(cart.owner(), Owner::Session(s));
        assert_eq!(cart.user_id, None);
    }

    #[test]
    fn test_view_totals() {
        let cart = Cart::new(&Owner::Anonymous, Utc::now());
        let items = [(2, 5000), (1, 1550)]
            .into_iter()
            .map(|(n, cents)| CartItem {
                id: Uuid::now_v7(), cart_id: cart.id, variant_id: Uuid::now_v7(),
                quantity: qty(n), price: Decimal::new(cents, 2), added_at: Utc::now(),
            })
            .collect();
        let view = CartView::new(cart, items);
        assert_eq!(view.item_count, 2);
        assert_eq!(view.total_quantity, 3);
        assert_eq!(view.subtotal, Decimal::new(11550, 2));
    }
}

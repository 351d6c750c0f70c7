//! Value Objects for the storefront core

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{Result, ShopError};

/// Strictly positive item quantity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i32")]
pub struct Quantity(i32);

impl Quantity {
    pub fn new(value: i64) -> Result<Self> {
        match i32::try_from(value) {
            Ok(v) if v >= 1 => Ok(Self(v)),
            _ => Err(ShopError::invalid_field("quantity", "Quantity must be a positive integer.")),
        }
    }
    pub fn value(self) -> i32 { self.0 }

    /// Sum of two quantities; a sum past the column range is rejected, never capped.
    pub fn add(self, other: Quantity) -> Result<Self> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or_else(|| ShopError::invalid_field("quantity", "Quantity is too large."))
    }
}

impl TryFrom<i64> for Quantity {
    type Error = ShopError;
    fn try_from(value: i64) -> Result<Self> { Self::new(value) }
}

impl From<Quantity> for i32 {
    fn from(q: Quantity) -> Self { q.0 }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Money columns are `NUMERIC(12, 2)`.
pub const MONEY_SCALE: u32 = 2;

/// Largest amount a money column holds: `9999999999.99`.
pub fn money_max() -> Decimal { Decimal::new(999_999_999_999, MONEY_SCALE) }

/// Caller-supplied money: non-negative, at most two decimal places, within `money_max`.
pub fn check_money(field: &str, amount: Decimal) -> Result<()> {
    if amount < Decimal::ZERO {
        return Err(ShopError::invalid_field(field, "Ensure this value is greater than or equal to 0."));
    }
    if amount.normalize().scale() > MONEY_SCALE {
        return Err(ShopError::invalid_field(field, "Ensure that there are no more than 2 decimal places."));
    }
    if amount > money_max() {
        return Err(ShopError::invalid_field(field, "Ensure that there are no more than 12 digits in total."));
    }
    Ok(())
}

/// Anonymous session token sent by guest clients.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub const MAX_LEN: usize = 255;

    /// Blank input means "no session"; overly long input is rejected.
    pub fn parse(raw: &str) -> Result<Option<Self>> {
        let value = raw.trim();
        if value.is_empty() { return Ok(None); }
        if value.len() > Self::MAX_LEN {
            return Err(ShopError::invalid_field("session_id", "Session id is too long."));
        }
        Ok(Some(Self(value.to_string())))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Human-readable order number: `YYYYMMDD-XXXXXX`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderNumber(String);

impl OrderNumber {
    pub const SUFFIX_LEN: usize = 6;

    pub fn generate(now: DateTime<Utc>) -> Self {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(Self::SUFFIX_LEN)
            .map(|b| char::from(b).to_ascii_uppercase())
            .collect();
        Self::from_parts(now, &suffix)
    }

    pub fn from_parts(now: DateTime<Utc>, suffix: &str) -> Self {
        Self(format!("{}-{}", now.format("%Y%m%d"), suffix))
    }

    pub fn from_stored(value: impl Into<String>) -> Self { Self(value.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Whoever a cart or wishlist belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Owner {
    User(Uuid),
    Session(SessionId),
    /// Neither identity nor session token; only carts accept this.
    Anonymous,
}

impl Owner {
    pub fn user_id(&self) -> Option<Uuid> {
        match self { Self::User(id) => Some(*id), _ => None }
    }
    pub fn session_id(&self) -> Option<&SessionId> {
        match self { Self::Session(s) => Some(s), _ => None }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Session(s) => write!(f, "session:{s}"),
            Self::Anonymous => write!(f, "anonymous"),
        }
    }
}

/// An authenticated caller resolved from a bearer token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub is_staff: bool,
}

/// Who is making a request: an optional principal and an optional guest session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Identity {
    pub principal: Option<Principal>,
    pub session: Option<SessionId>,
}

impl Identity {
    pub fn user(user_id: Uuid) -> Self {
        Self { principal: Some(Principal { user_id, is_staff: false }), session: None }
    }

    pub fn staff(user_id: Uuid) -> Self {
        Self { principal: Some(Principal { user_id, is_staff: true }), session: None }
    }

    pub fn guest(session: Option<SessionId>) -> Self { Self { principal: None, session } }

    /// Authentication wins over any session token sent alongside it.
    pub fn owner(&self) -> Owner {
        match (&self.principal, &self.session) {
            (Some(p), _) => Owner::User(p.user_id),
            (None, Some(s)) => Owner::Session(s.clone()),
            (None, None) => Owner::Anonymous,
        }
    }

    pub fn user_id(&self) -> Option<Uuid> { self.principal.map(|p| p.user_id) }

    pub fn is_staff(&self) -> bool { self.principal.is_some_and(|p| p.is_staff) }

    pub fn require_user(&self) -> Result<Principal> {
        self.principal.ok_or_else(ShopError::unauthorized)
    }

    pub fn require_staff(&self) -> Result<Principal> {
        let principal = self.require_user()?;
        if !principal.is_staff {
            return Err(ShopError::PermissionDenied("Staff access required".into()));
        }
        Ok(principal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_quantity_rejects_non_positive() {
        assert!(Quantity::new(0).is_err());
        assert!(Quantity::new(-3).is_err());
        assert!(Quantity::new(i64::from(i32::MAX) + 1).is_err());
        assert_eq!(Quantity::new(2).unwrap().add(Quantity::new(3).unwrap()).unwrap().value(), 5);
    }

    #[test]
    fn test_quantity_sum_past_range_is_rejected() {
        let max = Quantity::new(i64::from(i32::MAX)).unwrap();
        match max.add(Quantity::new(5).unwrap()) {
            Err(ShopError::Validation { fields, .. }) => assert!(fields.contains_key("quantity")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_money_bounds() {
        assert!(check_money("shipping_cost_base", Decimal::new(1050, 2)).is_ok());
        assert!(check_money("shipping_cost_base", Decimal::new(10500, 3)).is_ok());
        assert!(check_money("shipping_cost_base", money_max()).is_ok());
        assert!(check_money("shipping_cost_base", Decimal::new(-1, 0)).is_err());
        assert!(check_money("shipping_cost_base", Decimal::new(1005, 3)).is_err());
        assert!(check_money("shipping_cost_base", Decimal::MAX).is_err());
    }

    #[test]
    fn test_session_blank_is_absent() {
        assert_eq!(SessionId::parse("   ").unwrap(), None);
        assert_eq!(SessionId::parse(" s1 ").unwrap().unwrap().as_str(), "s1");
        assert!(SessionId::parse(&"x".repeat(256)).is_err());
    }

    #[test]
    fn test_order_number_shape() {
        let now = Utc.with_ymd_and_hms(2025, 9, 13, 10, 0, 0).unwrap();
        let n = OrderNumber::generate(now);
        let (date, suffix) = n.as_str().split_once('-').unwrap();
        assert_eq!(date, "20250913");
        assert_eq!(suffix.len(), OrderNumber::SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_identity_owner_precedence() {
        let user = Uuid::now_v7();
        let session = SessionId::parse("S1").unwrap();
        let both = Identity { principal: Some(Principal { user_id: user, is_staff: false }), session: session.clone() };
        assert_eq!(both.owner(), Owner::User(user));
        assert_eq!(Identity::guest(session.clone()).owner(), Owner::Session(session.unwrap()));
        assert_eq!(Identity::default().owner(), Owner::Anonymous);
    }

    #[test]
    fn test_staff_requirement() {
        assert!(matches!(Identity::default().require_staff(), Err(ShopError::Unauthorized(_))));
        assert!(matches!(Identity::user(Uuid::now_v7()).require_staff(), Err(ShopError::PermissionDenied(_))));
        assert!(Identity::staff(Uuid::now_v7()).require_staff().is_ok());
    }
}

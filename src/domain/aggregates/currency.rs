//! Currency and FX ledger

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::{Result, ShopError};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Currency {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub symbol: Option<String>,
    /// Units of base currency per one unit of this currency.
    pub exchange_rate: Decimal,
    pub is_base_currency: bool,
    pub is_active: bool,
    pub decimal_places: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Currency {
    pub const MAX_DECIMAL_PLACES: i32 = 6;

    /// Uppercases and checks an ISO-4217 style code.
    pub fn normalize_code(raw: &str) -> Result<String> {
        let code = raw.trim().to_ascii_uppercase();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ShopError::invalid_field("code", "Currency code must be three letters."));
        }
        Ok(code)
    }

    pub fn check_figures(exchange_rate: Decimal, decimal_places: i32) -> Result<()> {
        if exchange_rate <= Decimal::ZERO {
            return Err(ShopError::invalid_field("exchange_rate", "Exchange rate must be positive."));
        }
        if !(0..=Self::MAX_DECIMAL_PLACES).contains(&decimal_places) {
            return Err(ShopError::invalid_field("decimal_places", "Decimal places must be between 0 and 6."));
        }
        Ok(())
    }
}

/// `1 base = rate quote`, as recorded at `as_of`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FxRate {
    pub id: Uuid,
    pub base_currency_id: Uuid,
    pub quote_currency_id: Uuid,
    pub rate: Decimal,
    pub source: String,
    pub as_of: DateTime<Utc>,
}

impl FxRate {
    pub const DEFAULT_SOURCE: &'static str = "manual";

    pub fn record(base: Uuid, quote: Uuid, rate: Decimal, source: Option<String>, now: DateTime<Utc>) -> Result<Self> {
        if base == quote {
            return Err(ShopError::invalid_field("quote_currency", "Base and quote currency must differ."));
        }
        if rate <= Decimal::ZERO {
            return Err(ShopError::invalid_field("rate", "Rate must be positive."));
        }
        let source = source.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Ok(Self {
            id: Uuid::now_v7(),
            base_currency_id: base,
            quote_currency_id: quote,
            rate,
            source: source.unwrap_or_else(|| Self::DEFAULT_SOURCE.to_string()),
            as_of: now,
        })
    }
}

/// Conversion rate frozen onto an order when it is placed.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FxSnapshot {
    pub rate_to_base: Decimal,
    pub source: String,
}

impl FxSnapshot {
    pub const SCALE: u32 = 8;

    /// `latest` is the newest base→quote rate for the order currency, if any.
    pub fn resolve(order_currency: &Currency, base: Option<&Currency>, latest: Option<&FxRate>) -> Self {
        if order_currency.is_base_currency || base.is_some_and(|b| b.id == order_currency.id) {
            return Self { rate_to_base: Decimal::ONE, source: "base".into() };
        }
        if let Some(fx) = latest.filter(|fx| !fx.rate.is_zero()) {
            let inverted = (Decimal::ONE / fx.rate).round_dp(Self::SCALE);
            return Self { rate_to_base: inverted, source: fx.source.clone() };
        }
        Self { rate_to_base: order_currency.exchange_rate.round_dp(Self::SCALE), source: "currency_table".into() }
    }
}

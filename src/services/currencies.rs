//! Currency catalogue and FX rate ledger.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::domain::aggregates::{Currency, FxRate};
use crate::domain::value_objects::Identity;
use crate::store::{CurrencyRepository, DynStore};
use crate::{Result, ShopError};

#[derive(Clone, Debug)]
pub struct NewCurrency {
    pub code: String,
    pub name: String,
    pub symbol: Option<String>,
    pub exchange_rate: Decimal,
    pub is_active: bool,
    pub decimal_places: i32,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Clone, Debug, Default)]
pub struct CurrencyChanges {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub exchange_rate: Option<Decimal>,
    pub is_active: Option<bool>,
    pub decimal_places: Option<i32>,
}

#[derive(Clone, Debug)]
pub struct RecordRate {
    pub base_currency: Uuid,
    pub quote_currency: Uuid,
    pub rate: Decimal,
    pub source: Option<String>,
}

#[derive(Clone)]
pub struct CurrencyService {
    store: DynStore,
}

fn required_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ShopError::invalid_field("name", "This field is required."));
    }
    Ok(name.to_string())
}

impl CurrencyService {
    #[must_use]
    pub fn new(store: DynStore) -> Self { Self { store } }

    pub async fn list(&self) -> Result<Vec<Currency>> {
        let mut uow = self.store.begin().await?;
        uow.currencies().await
    }

    pub async fn get(&self, id: Uuid) -> Result<Currency> {
        let mut uow = self.store.begin().await?;
        uow.currency(id).await?.ok_or_else(|| ShopError::not_found("Currency"))
    }

    /// New currencies never start as base; use [`Self::set_base`].
    pub async fn create(&self, identity: &Identity, request: NewCurrency) -> Result<Currency> {
        identity.require_staff()?;
        let code = Currency::normalize_code(&request.code)?;
        let name = required_name(&request.name)?;
        Currency::check_figures(request.exchange_rate, request.decimal_places)?;

        let now = Utc::now();
        let currency = Currency {
            id: Uuid::now_v7(),
            code,
            name,
            symbol: request.symbol.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            exchange_rate: request.exchange_rate,
            is_base_currency: false,
            is_active: request.is_active,
            decimal_places: request.decimal_places,
            created_at: now,
            updated_at: now,
        };

        let mut uow = self.store.begin().await?;
        if uow.currency_by_code(&currency.code).await?.is_some() {
            return Err(ShopError::Conflict(format!("Currency {} already exists.", currency.code)));
        }
        uow.insert_currency(&currency).await?;
        uow.commit().await?;

        info!(code = %currency.code, "currency created");
        Ok(currency)
    }

    pub async fn update(&self, identity: &Identity, id: Uuid, changes: CurrencyChanges) -> Result<Currency> {
        identity.require_staff()?;
        let mut uow = self.store.begin().await?;
        let mut currency = uow.currency(id).await?.ok_or_else(|| ShopError::not_found("Currency"))?;

        if let Some(name) = changes.name {
            currency.name = required_name(&name)?;
        }
        if let Some(symbol) = changes.symbol {
            currency.symbol = Some(symbol.trim().to_string()).filter(|s| !s.is_empty());
        }
        if let Some(rate) = changes.exchange_rate {
            if currency.is_base_currency && rate != Decimal::ONE {
                return Err(ShopError::invalid_field("exchange_rate", "The base currency's rate is fixed at 1."));
            }
            currency.exchange_rate = rate;
        }
        if let Some(active) = changes.is_active {
            if currency.is_base_currency && !active {
                return Err(ShopError::invalid_field("is_active", "The base currency cannot be deactivated."));
            }
            currency.is_active = active;
        }
        if let Some(places) = changes.decimal_places {
            currency.decimal_places = places;
        }
        Currency::check_figures(currency.exchange_rate, currency.decimal_places)?;

        currency.updated_at = Utc::now();
        uow.save_currency(&currency).await?;
        uow.commit().await?;
        Ok(currency)
    }

    /// Moves the base flag onto `id`; exactly one base currency remains.
    pub async fn set_base(&self, identity: &Identity, id: Uuid) -> Result<Currency> {
        identity.require_staff()?;
        let now = Utc::now();
        let mut uow = self.store.begin().await?;
        let mut currency = uow.currency(id).await?.ok_or_else(|| ShopError::not_found("Currency"))?;

        let cleared = uow.clear_base_currency(now).await?;
        currency.is_base_currency = true;
        currency.is_active = true;
        currency.exchange_rate = Decimal::ONE;
        currency.updated_at = now;
        uow.save_currency(&currency).await?;
        uow.commit().await?;

        info!(code = %currency.code, cleared, "base currency changed");
        Ok(currency)
    }

    pub async fn rates(&self) -> Result<Vec<FxRate>> {
        let mut uow = self.store.begin().await?;
        uow.rates().await
    }

    pub async fn record_rate(&self, identity: &Identity, request: RecordRate) -> Result<FxRate> {
        identity.require_staff()?;
        let mut uow = self.store.begin().await?;
        if uow.currency(request.base_currency).await?.is_none() {
            return Err(ShopError::invalid_field("base_currency", "Unknown currency."));
        }
        if uow.currency(request.quote_currency).await?.is_none() {
            return Err(ShopError::invalid_field("quote_currency", "Unknown currency."));
        }
        let rate = FxRate::record(request.base_currency, request.quote_currency, request.rate, request.source, Utc::now())?;
        uow.insert_rate(&rate).await?;
        uow.commit().await?;

        info!(rate = %rate.rate, source = %rate.source, "fx rate recorded");
        Ok(rate)
    }

    pub async fn latest_rate(&self, base: Uuid, quote: Uuid) -> Result<FxRate> {
        let mut uow = self.store.begin().await?;
        uow.latest_rate(base, quote).await?.ok_or_else(|| ShopError::not_found("FX rate"))
    }
}

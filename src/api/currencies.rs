use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::envelope::{created, ok, ApiResult};
use super::{AppState, ValidJson};
use crate::domain::value_objects::Identity;
use crate::services::{CurrencyChanges, NewCurrency, RecordRate};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCurrencyRequest {
    pub code: String,
    #[validate(length(min = 1, max = 50, message = "Provide a name of at most 50 characters."))]
    pub name: String,
    #[validate(length(max = 5, message = "Ensure this field has no more than 5 characters."))]
    pub symbol: Option<String>,
    pub exchange_rate: Decimal,
    #[serde(default = "active")]
    pub is_active: bool,
    #[serde(default = "two")]
    pub decimal_places: i32,
}

fn active() -> bool { true }
fn two() -> i32 { 2 }

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCurrencyRequest {
    #[validate(length(min = 1, max = 50, message = "Provide a name of at most 50 characters."))]
    pub name: Option<String>,
    #[validate(length(max = 5, message = "Ensure this field has no more than 5 characters."))]
    pub symbol: Option<String>,
    pub exchange_rate: Option<Decimal>,
    pub is_active: Option<bool>,
    pub decimal_places: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecordRateRequest {
    pub base_currency: Uuid,
    pub quote_currency: Uuid,
    pub rate: Decimal,
    #[validate(length(max = 50, message = "Ensure this field has no more than 50 characters."))]
    pub source: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PairParams {
    pub base: Uuid,
    pub quote: Uuid,
}

pub async fn list(State(s): State<AppState>) -> ApiResult<impl IntoResponse> {
    let currencies = s.services.currencies.list().await?;
    Ok(ok("Currencies retrieved.", currencies))
}

pub async fn show(State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<impl IntoResponse> {
    let currency = s.services.currencies.get(id).await?;
    Ok(ok("Currency retrieved.", currency))
}

pub async fn create(
    State(s): State<AppState>,
    identity: Identity,
    ValidJson(r): ValidJson<CreateCurrencyRequest>,
) -> ApiResult<impl IntoResponse> {
    let request = NewCurrency {
        code: r.code,
        name: r.name,
        symbol: r.symbol,
        exchange_rate: r.exchange_rate,
        is_active: r.is_active,
        decimal_places: r.decimal_places,
    };
    let currency = s.services.currencies.create(&identity, request).await?;
    Ok(created("Currency created.", currency))
}

pub async fn update(
    State(s): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    ValidJson(r): ValidJson<UpdateCurrencyRequest>,
) -> ApiResult<impl IntoResponse> {
    let changes = CurrencyChanges {
        name: r.name,
        symbol: r.symbol,
        exchange_rate: r.exchange_rate,
        is_active: r.is_active,
        decimal_places: r.decimal_places,
    };
    let currency = s.services.currencies.update(&identity, id, changes).await?;
    Ok(ok("Currency updated.", currency))
}

pub async fn set_base(State(s): State<AppState>, identity: Identity, Path(id): Path<Uuid>) -> ApiResult<impl IntoResponse> {
    let currency = s.services.currencies.set_base(&identity, id).await?;
    Ok(ok("Base currency updated.", currency))
}

pub async fn rates(State(s): State<AppState>) -> ApiResult<impl IntoResponse> {
    let rates = s.services.currencies.rates().await?;
    Ok(ok("FX rates retrieved.", rates))
}

pub async fn record_rate(
    State(s): State<AppState>,
    identity: Identity,
    ValidJson(r): ValidJson<RecordRateRequest>,
) -> ApiResult<impl IntoResponse> {
    let request = RecordRate {
        base_currency: r.base_currency,
        quote_currency: r.quote_currency,
        rate: r.rate,
        source: r.source,
    };
    let rate = s.services.currencies.record_rate(&identity, request).await?;
    Ok(created("FX rate recorded.", rate))
}

pub async fn latest_rate(State(s): State<AppState>, Query(p): Query<PairParams>) -> ApiResult<impl IntoResponse> {
    let rate = s.services.currencies.latest_rate(p.base, p.quote).await?;
    Ok(ok("Latest FX rate.", rate))
}

use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use super::envelope::{created, ok, ApiResult};
use super::{AppState, ValidJson};
use crate::domain::aggregates::PaymentStatus;
use crate::domain::value_objects::Identity;
use crate::services::{ConfirmPayment, InitiatePayment};

#[derive(Debug, Deserialize, Validate)]
pub struct InitiateRequest {
    #[validate(length(min = 1, message = "This field is required."))]
    pub order_number: String,
    pub guest_email: Option<String>,
    pub amount: Decimal,
    #[serde(alias = "currency_id")]
    pub currency: Uuid,
    #[validate(length(min = 1, max = 50, message = "Provide a payment method of at most 50 characters."))]
    pub payment_method: String,
    pub payment_provider: Option<String>,
    pub transaction_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ConfirmRequest {
    pub payment_id: Option<Uuid>,
    pub transaction_id: Option<String>,
    pub status: String,
    pub gateway_response: Option<Value>,
}

pub async fn list(State(s): State<AppState>, identity: Identity) -> ApiResult<impl IntoResponse> {
    let payments = s.services.payments.list(&identity).await?;
    Ok(ok("Payments retrieved.", payments))
}

pub async fn show(State(s): State<AppState>, identity: Identity, Path(id): Path<Uuid>) -> ApiResult<impl IntoResponse> {
    let payment = s.services.payments.get(&identity, id).await?;
    Ok(ok("Payment retrieved.", payment))
}

pub async fn initiate(
    State(s): State<AppState>,
    identity: Identity,
    ValidJson(r): ValidJson<InitiateRequest>,
) -> ApiResult<impl IntoResponse> {
    let request = InitiatePayment {
        order_number: r.order_number,
        guest_email: r.guest_email,
        amount: r.amount,
        currency_id: r.currency,
        payment_method: r.payment_method,
        payment_provider: r.payment_provider,
        transaction_id: r.transaction_id,
    };
    let payment = s.services.payments.initiate(&identity, request).await?;
    Ok(created("Payment initiated.", payment))
}

pub async fn confirm(
    State(s): State<AppState>,
    identity: Identity,
    ValidJson(r): ValidJson<ConfirmRequest>,
) -> ApiResult<impl IntoResponse> {
    let request = ConfirmPayment {
        payment_id: r.payment_id,
        transaction_id: r.transaction_id,
        status: r.status.parse::<PaymentStatus>()?,
        gateway_response: r.gateway_response,
    };
    let payment = s.services.payments.confirm(&identity, request).await?;
    Ok(ok("Payment updated.", payment))
}

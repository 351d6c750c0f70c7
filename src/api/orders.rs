use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::envelope::{created, ok, ApiResult};
use super::{AppState, ValidJson};
use crate::domain::aggregates::OrderStatus;
use crate::domain::value_objects::{Identity, Quantity};
use crate::services::{OrderLineRequest, PlaceOrder, StatusUpdate};
use crate::Result;

#[derive(Debug, Deserialize)]
pub struct OrderLine {
    #[serde(alias = "variant_id")]
    pub variant: Uuid,
    pub quantity: i64,
    #[serde(default)]
    pub discount_amount: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(email(message = "Enter a valid email address."))]
    pub guest_email: Option<String>,
    #[serde(alias = "currency_id")]
    pub currency: Uuid,
    pub shipping_address: Option<Uuid>,
    pub billing_address: Option<Uuid>,
    #[validate(length(max = 50, message = "Ensure this field has no more than 50 characters."))]
    pub payment_method: Option<String>,
    pub admin_notes: Option<String>,
    #[serde(default)]
    pub shipping_cost_base: Decimal,
    #[serde(default)]
    pub discount_base: Decimal,
    #[serde(default)]
    pub items: Vec<OrderLine>,
}

impl CreateOrderRequest {
    fn into_command(self) -> Result<PlaceOrder> {
        let items = self
            .items
            .into_iter()
            .map(|line| {
                Ok(OrderLineRequest {
                    variant_id: line.variant,
                    quantity: Quantity::new(line.quantity)?,
                    discount_amount: line.discount_amount,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(PlaceOrder {
            guest_email: self.guest_email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()),
            currency_id: self.currency,
            shipping_address_id: self.shipping_address,
            billing_address_id: self.billing_address,
            payment_method: self.payment_method,
            admin_notes: self.admin_notes,
            shipping_cost_base: self.shipping_cost_base,
            discount_base: self.discount_base,
            items,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ConfirmPaymentRequest {
    #[serde(default)]
    pub transaction_id: String,
    pub payment_method: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    pub status: String,
    #[validate(length(max = 100, message = "Ensure this field has no more than 100 characters."))]
    pub tracking_number: Option<String>,
    pub admin_notes: Option<String>,
}

pub async fn list(State(s): State<AppState>, identity: Identity) -> ApiResult<impl IntoResponse> {
    let orders = s.services.orders.list(&identity).await?;
    Ok(ok("Orders retrieved.", orders))
}

pub async fn create(
    State(s): State<AppState>,
    identity: Identity,
    ValidJson(r): ValidJson<CreateOrderRequest>,
) -> ApiResult<impl IntoResponse> {
    let order = s.services.orders.place(&identity, r.into_command()?).await?;
    Ok(created("Order created.", order))
}

pub async fn show(State(s): State<AppState>, identity: Identity, Path(id): Path<Uuid>) -> ApiResult<impl IntoResponse> {
    let order = s.services.orders.get(&identity, id).await?;
    Ok(ok("Order retrieved.", order))
}

pub async fn confirm_payment(
    State(s): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    ValidJson(r): ValidJson<ConfirmPaymentRequest>,
) -> ApiResult<impl IntoResponse> {
    let order = s.services.orders.confirm_payment(&identity, id, &r.transaction_id, r.payment_method).await?;
    Ok(ok("Payment confirmed.", order))
}

pub async fn update_status(
    State(s): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    ValidJson(r): ValidJson<UpdateStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let update = StatusUpdate {
        status: r.status.parse::<OrderStatus>()?,
        tracking_number: r.tracking_number,
        admin_notes: r.admin_notes,
    };
    let order = s.services.orders.update_status(&identity, id, update).await?;
    Ok(ok("Order status updated.", order))
}

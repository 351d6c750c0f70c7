use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use super::envelope::{created, ok, ApiResult};
use super::{AppState, ValidJson};
use crate::domain::value_objects::{Identity, Quantity};

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    #[serde(alias = "variant")]
    pub variant_id: Uuid,
    #[serde(default = "one")]
    #[validate(range(min = 1, message = "Quantity must be at least 1."))]
    pub quantity: i64,
}

fn one() -> i64 { 1 }

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateItemRequest {
    pub cart_item_id: Uuid,
    pub quantity: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct QuantityRequest {
    pub quantity: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MergeRequest {
    #[serde(default)]
    pub from_session_id: String,
}

pub async fn show(State(s): State<AppState>, identity: Identity) -> ApiResult<impl IntoResponse> {
    let cart = s.services.carts.current(&identity).await?;
    Ok(ok("Cart retrieved.", cart))
}

pub async fn add_item(
    State(s): State<AppState>,
    identity: Identity,
    ValidJson(r): ValidJson<AddItemRequest>,
) -> ApiResult<impl IntoResponse> {
    let item = s.services.carts.add_item(&identity, r.variant_id, Quantity::new(r.quantity)?).await?;
    Ok(created("Item added to cart.", item))
}

pub async fn update_item(
    State(s): State<AppState>,
    identity: Identity,
    ValidJson(r): ValidJson<UpdateItemRequest>,
) -> ApiResult<impl IntoResponse> {
    let item = s.services.carts.update_quantity(&identity, r.cart_item_id, r.quantity).await?;
    Ok(ok("Cart item updated.", item))
}

pub async fn update_item_by_id(
    State(s): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    ValidJson(r): ValidJson<QuantityRequest>,
) -> ApiResult<impl IntoResponse> {
    let item = s.services.carts.update_quantity(&identity, id, r.quantity).await?;
    Ok(ok("Cart item updated.", item))
}

pub async fn remove_item(
    State(s): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    s.services.carts.remove_item(&identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn clear(State(s): State<AppState>, identity: Identity) -> ApiResult<impl IntoResponse> {
    let removed = s.services.carts.clear(&identity).await?;
    Ok(ok("Cart cleared.", json!({ "removed": removed })))
}

pub async fn merge(
    State(s): State<AppState>,
    identity: Identity,
    ValidJson(r): ValidJson<MergeRequest>,
) -> ApiResult<impl IntoResponse> {
    let merged = s.services.carts.merge(&identity, &r.from_session_id).await?;
    Ok(ok("Carts merged.", merged))
}

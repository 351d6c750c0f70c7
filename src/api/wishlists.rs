use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use super::envelope::{ok, with_status, ApiResult};
use super::{AppState, ValidJson};
use crate::domain::value_objects::Identity;

#[derive(Debug, Deserialize, Validate)]
pub struct AddRequest {
    #[serde(alias = "variant")]
    pub variant_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckRequest {
    pub variants: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MergeRequest {
    #[serde(default)]
    pub from_session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ExistsParams {
    pub variant: Uuid,
}

pub async fn list(State(s): State<AppState>, identity: Identity) -> ApiResult<impl IntoResponse> {
    let items = s.services.wishlists.list(&identity).await?;
    Ok(ok("Wishlist retrieved.", items))
}

pub async fn add(
    State(s): State<AppState>,
    identity: Identity,
    ValidJson(r): ValidJson<AddRequest>,
) -> ApiResult<impl IntoResponse> {
    let (item, created) = s.services.wishlists.add(&identity, r.variant_id).await?;
    Ok(if created {
        with_status(StatusCode::CREATED, "Added to wishlist.", item)
    } else {
        with_status(StatusCode::OK, "Already in wishlist.", item)
    })
}

pub async fn remove(State(s): State<AppState>, identity: Identity, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    s.services.wishlists.remove(&identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_variant(
    State(s): State<AppState>,
    identity: Identity,
    Path(variant_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    s.services.wishlists.remove_variant(&identity, variant_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn count(State(s): State<AppState>, identity: Identity) -> ApiResult<impl IntoResponse> {
    let count = s.services.wishlists.count(&identity).await?;
    Ok(ok("Wishlist count.", json!({ "count": count })))
}

pub async fn exists(
    State(s): State<AppState>,
    identity: Identity,
    Query(p): Query<ExistsParams>,
) -> ApiResult<impl IntoResponse> {
    let exists = s.services.wishlists.exists(&identity, p.variant).await?;
    Ok(ok("Wishlist membership.", json!({ "variant": p.variant, "exists": exists })))
}

pub async fn check(
    State(s): State<AppState>,
    identity: Identity,
    ValidJson(r): ValidJson<CheckRequest>,
) -> ApiResult<impl IntoResponse> {
    let flags = s.services.wishlists.check(&identity, &r.variants).await?;
    Ok(ok("Wishlist membership.", flags))
}

pub async fn merge(
    State(s): State<AppState>,
    identity: Identity,
    ValidJson(r): ValidJson<MergeRequest>,
) -> ApiResult<impl IntoResponse> {
    let items = s.services.wishlists.merge(&identity, &r.from_session_id).await?;
    Ok(ok("Wishlists merged.", items))
}

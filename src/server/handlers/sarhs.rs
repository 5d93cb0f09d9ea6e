//! Handlers for SARH extraction authorizations, keyed by `sarh_id`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::domain::Sarh;
use crate::error::{ApiError, Result};
use crate::observability;
use crate::server::fields;
use crate::server::handlers::{merge_patch, split_payload, Payload};
use crate::server::AppState;
use crate::storage::SarhFilter;
use crate::upsert;

fn not_found() -> ApiError {
    ApiError::NotFound("SARH".to_string())
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    epsa: Option<String>,
    fields: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DetailParams {
    fields: Option<String>,
}

pub async fn list(
    State(app): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>> {
    observability::request("sarhs", "list");
    let filter = SarhFilter { epsa: params.epsa };
    let sarhs = app.storage.list_sarhs(&filter).await?;
    fields::json_body(&sarhs, &params.fields)
}

pub async fn retrieve(
    State(app): State<AppState>,
    Path(sarh_id): Path<String>,
    Query(params): Query<DetailParams>,
) -> Result<Json<Value>> {
    observability::request("sarhs", "retrieve");
    let sarh = app.storage.get_sarh(&sarh_id).await?.ok_or_else(not_found)?;
    fields::json_body(&sarh, &params.fields)
}

pub async fn create(
    State(app): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>)> {
    observability::request("sarhs", "create");
    match split_payload(body) {
        Payload::Bulk(items) => {
            let outcomes = upsert::upsert_sarhs(app.storage.as_ref(), items).await?;
            Ok((StatusCode::CREATED, Json(serde_json::to_value(outcomes)?)))
        }
        Payload::Single(item) => {
            let sarh = upsert::create_or_update_sarh(app.storage.as_ref(), item).await?;
            Ok((StatusCode::CREATED, fields::json_body(&sarh, &None)?))
        }
    }
}

pub async fn update(
    State(app): State<AppState>,
    Path(sarh_id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    observability::request("sarhs", "update");
    app.storage.get_sarh(&sarh_id).await?.ok_or_else(not_found)?;
    let mut sarh: Sarh = serde_json::from_value(body)?;
    sarh.validate().map_err(ApiError::Validation)?;
    app.storage.update_sarh(&sarh_id, &mut sarh).await?;
    let stored = app.storage.get_sarh(&sarh.sarh_id).await?.ok_or_else(not_found)?;
    fields::json_body(&stored, &None)
}

pub async fn partial_update(
    State(app): State<AppState>,
    Path(sarh_id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    observability::request("sarhs", "partial_update");
    let existing = app.storage.get_sarh(&sarh_id).await?.ok_or_else(not_found)?;
    let merged = merge_patch(serde_json::to_value(&existing)?, &body)?;
    let mut sarh: Sarh = serde_json::from_value(merged)?;
    sarh.validate().map_err(ApiError::Validation)?;
    app.storage.update_sarh(&sarh_id, &mut sarh).await?;
    let stored = app.storage.get_sarh(&sarh.sarh_id).await?.ok_or_else(not_found)?;
    fields::json_body(&stored, &None)
}

pub async fn destroy(
    State(app): State<AppState>,
    Path(sarh_id): Path<String>,
) -> Result<StatusCode> {
    observability::request("sarhs", "delete");
    if app.storage.delete_sarh(&sarh_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found())
    }
}

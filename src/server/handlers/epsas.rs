use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::domain::Epsa;
use crate::error::{ApiError, Result};
use crate::observability;
use crate::server::fields;
use crate::server::handlers::{merge_patch, split_payload, Payload};
use crate::server::AppState;
use crate::storage::EpsaFilter;
use crate::upsert;

fn not_found() -> ApiError {
    ApiError::NotFound("EPSA".to_string())
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    code: Option<String>,
    state: Option<String>,
    category: Option<String>,
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
    observability::request("epsas", "list");
    let filter = EpsaFilter {
        code: params.code,
        state: params.state,
        category: params.category,
    };
    let epsas = app.storage.list_epsas(&filter).await?;
    fields::json_body(&epsas, &params.fields)
}

pub async fn retrieve(
    State(app): State<AppState>,
    Path(code): Path<String>,
    Query(params): Query<DetailParams>,
) -> Result<Json<Value>> {
    observability::request("epsas", "retrieve");
    let epsa = app.storage.get_epsa(&code).await?.ok_or_else(not_found)?;
    fields::json_body(&epsa, &params.fields)
}

pub async fn create(
    State(app): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>)> {
    observability::request("epsas", "create");
    match split_payload(body) {
        Payload::Bulk(items) => {
            let outcomes = upsert::upsert_epsas(app.storage.as_ref(), items).await?;
            Ok((StatusCode::CREATED, Json(serde_json::to_value(outcomes)?)))
        }
        Payload::Single(item) => {
            let epsa = upsert::create_or_update_epsa(app.storage.as_ref(), item).await?;
            Ok((StatusCode::CREATED, fields::json_body(&epsa, &None)?))
        }
    }
}

pub async fn update(
    State(app): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    observability::request("epsas", "update");
    app.storage.get_epsa(&code).await?.ok_or_else(not_found)?;
    let mut epsa: Epsa = serde_json::from_value(body)?;
    epsa.validate().map_err(ApiError::Validation)?;
    app.storage.update_epsa(&code, &mut epsa).await?;
    let stored = app.storage.get_epsa(&epsa.code).await?.ok_or_else(not_found)?;
    fields::json_body(&stored, &None)
}

pub async fn partial_update(
    State(app): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    observability::request("epsas", "partial_update");
    let existing = app.storage.get_epsa(&code).await?.ok_or_else(not_found)?;
    let merged = merge_patch(serde_json::to_value(&existing)?, &body)?;
    let mut epsa: Epsa = serde_json::from_value(merged)?;
    epsa.validate().map_err(ApiError::Validation)?;
    app.storage.update_epsa(&code, &mut epsa).await?;
    let stored = app.storage.get_epsa(&epsa.code).await?.ok_or_else(not_found)?;
    fields::json_body(&stored, &None)
}

pub async fn destroy(State(app): State<AppState>, Path(code): Path<String>) -> Result<StatusCode> {
    observability::request("epsas", "delete");
    if app.storage.delete_epsa(&code).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found())
    }
}

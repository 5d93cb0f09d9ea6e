//! Handlers for the planning filings (POAs and PDQ/PTDS plans).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::domain::{Plan, Poa};
use crate::error::{ApiError, Result};
use crate::observability;
use crate::server::fields;
use crate::server::handlers::{merge_patch, split_payload, Payload};
use crate::server::AppState;
use crate::storage::{PlanFilter, PoaFilter};
use crate::upsert;

#[derive(Debug, Deserialize)]
pub struct DetailParams {
    fields: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PoaListParams {
    epsa: Option<String>,
    year: Option<i32>,
    order: Option<i32>,
    fields: Option<String>,
}

pub async fn list_poas(
    State(app): State<AppState>,
    Query(params): Query<PoaListParams>,
) -> Result<Json<Value>> {
    observability::request("poas", "list");
    let filter = PoaFilter { epsa: params.epsa, year: params.year, order: params.order };
    let poas = app.storage.list_poas(&filter).await?;
    fields::json_body(&poas, &params.fields)
}

pub async fn retrieve_poa(
    State(app): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<DetailParams>,
) -> Result<Json<Value>> {
    observability::request("poas", "retrieve");
    let poa = app
        .storage
        .get_poa(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("POA".to_string()))?;
    fields::json_body(&poa, &params.fields)
}

pub async fn create_poa(
    State(app): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>)> {
    observability::request("poas", "create");
    match split_payload(body) {
        Payload::Bulk(items) => {
            let outcomes = upsert::upsert_poas(app.storage.as_ref(), items).await?;
            Ok((StatusCode::CREATED, Json(serde_json::to_value(outcomes)?)))
        }
        Payload::Single(item) => {
            let poa = upsert::create_or_update_poa(app.storage.as_ref(), item).await?;
            Ok((StatusCode::CREATED, fields::json_body(&poa, &None)?))
        }
    }
}

pub async fn update_poa(
    State(app): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    observability::request("poas", "update");
    app.storage
        .get_poa(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("POA".to_string()))?;
    let mut poa: Poa = serde_json::from_value(body)?;
    poa.id = Some(id);
    poa.validate().map_err(ApiError::Validation)?;
    app.storage.update_poa(&mut poa).await?;
    let stored = app
        .storage
        .get_poa(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("POA".to_string()))?;
    fields::json_body(&stored, &None)
}

pub async fn partial_update_poa(
    State(app): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    observability::request("poas", "partial_update");
    let existing = app
        .storage
        .get_poa(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("POA".to_string()))?;
    let merged = merge_patch(serde_json::to_value(&existing)?, &body)?;
    let mut poa: Poa = serde_json::from_value(merged)?;
    poa.id = Some(id);
    poa.validate().map_err(ApiError::Validation)?;
    app.storage.update_poa(&mut poa).await?;
    let stored = app
        .storage
        .get_poa(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("POA".to_string()))?;
    fields::json_body(&stored, &None)
}

pub async fn destroy_poa(State(app): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode> {
    observability::request("poas", "delete");
    if app.storage.delete_poa(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("POA".to_string()))
    }
}

#[derive(Debug, Deserialize)]
pub struct PlanListParams {
    epsa: Option<String>,
    year: Option<i32>,
    plan_type: Option<String>,
    fields: Option<String>,
}

pub async fn list_plans(
    State(app): State<AppState>,
    Query(params): Query<PlanListParams>,
) -> Result<Json<Value>> {
    observability::request("plans", "list");
    let filter =
        PlanFilter { epsa: params.epsa, year: params.year, plan_type: params.plan_type };
    let plans = app.storage.list_plans(&filter).await?;
    fields::json_body(&plans, &params.fields)
}

pub async fn retrieve_plan(
    State(app): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<DetailParams>,
) -> Result<Json<Value>> {
    observability::request("plans", "retrieve");
    let plan = app
        .storage
        .get_plan(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Plan".to_string()))?;
    fields::json_body(&plan, &params.fields)
}

pub async fn create_plan(
    State(app): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>)> {
    observability::request("plans", "create");
    match split_payload(body) {
        Payload::Bulk(items) => {
            let outcomes = upsert::upsert_plans(app.storage.as_ref(), items).await?;
            Ok((StatusCode::CREATED, Json(serde_json::to_value(outcomes)?)))
        }
        Payload::Single(item) => {
            let plan = upsert::create_or_update_plan(app.storage.as_ref(), item).await?;
            Ok((StatusCode::CREATED, fields::json_body(&plan, &None)?))
        }
    }
}

pub async fn update_plan(
    State(app): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    observability::request("plans", "update");
    app.storage
        .get_plan(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Plan".to_string()))?;
    let mut plan: Plan = serde_json::from_value(body)?;
    plan.id = Some(id);
    plan.validate().map_err(ApiError::Validation)?;
    app.storage.update_plan(&mut plan).await?;
    let stored = app
        .storage
        .get_plan(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Plan".to_string()))?;
    fields::json_body(&stored, &None)
}

pub async fn partial_update_plan(
    State(app): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    observability::request("plans", "partial_update");
    let existing = app
        .storage
        .get_plan(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Plan".to_string()))?;
    let merged = merge_patch(serde_json::to_value(&existing)?, &body)?;
    let mut plan: Plan = serde_json::from_value(merged)?;
    plan.id = Some(id);
    plan.validate().map_err(ApiError::Validation)?;
    app.storage.update_plan(&mut plan).await?;
    let stored = app
        .storage
        .get_plan(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Plan".to_string()))?;
    fields::json_body(&stored, &None)
}

pub async fn destroy_plan(State(app): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode> {
    observability::request("plans", "delete");
    if app.storage.delete_plan(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Plan".to_string()))
    }
}

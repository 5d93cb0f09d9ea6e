//! Handlers for the performance catalog (variables and indicators). Both
//! follow the EPSA handler shape, keyed by `code` with a numeric-index
//! filter on the list path.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::domain::{Indicator, Variable};
use crate::error::{ApiError, Result};
use crate::observability;
use crate::server::fields;
use crate::server::handlers::{merge_patch, split_payload, Payload};
use crate::server::AppState;
use crate::storage::{IndicatorFilter, VariableFilter};
use crate::upsert;

#[derive(Debug, Deserialize)]
pub struct DetailParams {
    fields: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VariableListParams {
    code: Option<String>,
    var_id: Option<u32>,
    fields: Option<String>,
}

pub async fn list_variables(
    State(app): State<AppState>,
    Query(params): Query<VariableListParams>,
) -> Result<Json<Value>> {
    observability::request("variables", "list");
    let filter = VariableFilter { code: params.code, var_id: params.var_id };
    let variables = app.storage.list_variables(&filter).await?;
    fields::json_body(&variables, &params.fields)
}

pub async fn retrieve_variable(
    State(app): State<AppState>,
    Path(code): Path<String>,
    Query(params): Query<DetailParams>,
) -> Result<Json<Value>> {
    observability::request("variables", "retrieve");
    let variable = app
        .storage
        .get_variable(&code)
        .await?
        .ok_or_else(|| ApiError::NotFound("Variable".to_string()))?;
    fields::json_body(&variable, &params.fields)
}

pub async fn create_variable(
    State(app): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>)> {
    observability::request("variables", "create");
    match split_payload(body) {
        Payload::Bulk(items) => {
            let outcomes = upsert::upsert_variables(app.storage.as_ref(), items).await?;
            Ok((StatusCode::CREATED, Json(serde_json::to_value(outcomes)?)))
        }
        Payload::Single(item) => {
            let variable = upsert::create_or_update_variable(app.storage.as_ref(), item).await?;
            Ok((StatusCode::CREATED, fields::json_body(&variable, &None)?))
        }
    }
}

pub async fn update_variable(
    State(app): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    observability::request("variables", "update");
    app.storage
        .get_variable(&code)
        .await?
        .ok_or_else(|| ApiError::NotFound("Variable".to_string()))?;
    let mut variable: Variable = serde_json::from_value(body)?;
    variable.validate().map_err(ApiError::Validation)?;
    app.storage.update_variable(&code, &mut variable).await?;
    let stored = app
        .storage
        .get_variable(&variable.code)
        .await?
        .ok_or_else(|| ApiError::NotFound("Variable".to_string()))?;
    fields::json_body(&stored, &None)
}

pub async fn partial_update_variable(
    State(app): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    observability::request("variables", "partial_update");
    let existing = app
        .storage
        .get_variable(&code)
        .await?
        .ok_or_else(|| ApiError::NotFound("Variable".to_string()))?;
    let merged = merge_patch(serde_json::to_value(&existing)?, &body)?;
    let mut variable: Variable = serde_json::from_value(merged)?;
    variable.validate().map_err(ApiError::Validation)?;
    app.storage.update_variable(&code, &mut variable).await?;
    let stored = app
        .storage
        .get_variable(&variable.code)
        .await?
        .ok_or_else(|| ApiError::NotFound("Variable".to_string()))?;
    fields::json_body(&stored, &None)
}

pub async fn destroy_variable(
    State(app): State<AppState>,
    Path(code): Path<String>,
) -> Result<StatusCode> {
    observability::request("variables", "delete");
    if app.storage.delete_variable(&code).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Variable".to_string()))
    }
}

#[derive(Debug, Deserialize)]
pub struct IndicatorListParams {
    code: Option<String>,
    ind_id: Option<u32>,
    fields: Option<String>,
}

pub async fn list_indicators(
    State(app): State<AppState>,
    Query(params): Query<IndicatorListParams>,
) -> Result<Json<Value>> {
    observability::request("indicators", "list");
    let filter = IndicatorFilter { code: params.code, ind_id: params.ind_id };
    let indicators = app.storage.list_indicators(&filter).await?;
    fields::json_body(&indicators, &params.fields)
}

pub async fn retrieve_indicator(
    State(app): State<AppState>,
    Path(code): Path<String>,
    Query(params): Query<DetailParams>,
) -> Result<Json<Value>> {
    observability::request("indicators", "retrieve");
    let indicator = app
        .storage
        .get_indicator(&code)
        .await?
        .ok_or_else(|| ApiError::NotFound("Indicator".to_string()))?;
    fields::json_body(&indicator, &params.fields)
}

pub async fn create_indicator(
    State(app): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>)> {
    observability::request("indicators", "create");
    match split_payload(body) {
        Payload::Bulk(items) => {
            let outcomes = upsert::upsert_indicators(app.storage.as_ref(), items).await?;
            Ok((StatusCode::CREATED, Json(serde_json::to_value(outcomes)?)))
        }
        Payload::Single(item) => {
            let indicator = upsert::create_or_update_indicator(app.storage.as_ref(), item).await?;
            Ok((StatusCode::CREATED, fields::json_body(&indicator, &None)?))
        }
    }
}

pub async fn update_indicator(
    State(app): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    observability::request("indicators", "update");
    app.storage
        .get_indicator(&code)
        .await?
        .ok_or_else(|| ApiError::NotFound("Indicator".to_string()))?;
    let mut indicator: Indicator = serde_json::from_value(body)?;
    indicator.validate().map_err(ApiError::Validation)?;
    app.storage.update_indicator(&code, &mut indicator).await?;
    let stored = app
        .storage
        .get_indicator(&indicator.code)
        .await?
        .ok_or_else(|| ApiError::NotFound("Indicator".to_string()))?;
    fields::json_body(&stored, &None)
}

pub async fn partial_update_indicator(
    State(app): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    observability::request("indicators", "partial_update");
    let existing = app
        .storage
        .get_indicator(&code)
        .await?
        .ok_or_else(|| ApiError::NotFound("Indicator".to_string()))?;
    let merged = merge_patch(serde_json::to_value(&existing)?, &body)?;
    let mut indicator: Indicator = serde_json::from_value(merged)?;
    indicator.validate().map_err(ApiError::Validation)?;
    app.storage.update_indicator(&code, &mut indicator).await?;
    let stored = app
        .storage
        .get_indicator(&indicator.code)
        .await?
        .ok_or_else(|| ApiError::NotFound("Indicator".to_string()))?;
    fields::json_body(&stored, &None)
}

pub async fn destroy_indicator(
    State(app): State<AppState>,
    Path(code): Path<String>,
) -> Result<StatusCode> {
    observability::request("indicators", "delete");
    if app.storage.delete_indicator(&code).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Indicator".to_string()))
    }
}

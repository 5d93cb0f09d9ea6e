//! Handlers for periodic filings (variable reports and indicator
//! measurements). Detail routes use the internal numeric id; the
//! `(epsa, year, month)` tuple reaches the same record through list filters.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::domain::{IndicatorMeasurement, VariableReport};
use crate::error::{ApiError, Result};
use crate::observability;
use crate::server::fields;
use crate::server::handlers::{merge_patch, split_payload, Payload};
use crate::server::AppState;
use crate::storage::ReportFilter;
use crate::upsert;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    epsa: Option<String>,
    year: Option<i32>,
    month: Option<i32>,
    fields: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DetailParams {
    fields: Option<String>,
}

pub async fn list_reports(
    State(app): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>> {
    observability::request("reports", "list");
    let filter = ReportFilter { epsa: params.epsa, year: params.year, month: params.month };
    let reports = app.storage.list_reports(&filter).await?;
    fields::json_body(&reports, &params.fields)
}

pub async fn retrieve_report(
    State(app): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<DetailParams>,
) -> Result<Json<Value>> {
    observability::request("reports", "retrieve");
    let report = app
        .storage
        .get_report(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Variable report".to_string()))?;
    fields::json_body(&report, &params.fields)
}

pub async fn create_report(
    State(app): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>)> {
    observability::request("reports", "create");
    match split_payload(body) {
        Payload::Bulk(items) => {
            let outcomes = upsert::upsert_reports(app.storage.as_ref(), items).await?;
            Ok((StatusCode::CREATED, Json(serde_json::to_value(outcomes)?)))
        }
        Payload::Single(item) => {
            let report = upsert::create_or_update_report(app.storage.as_ref(), item).await?;
            Ok((StatusCode::CREATED, fields::json_body(&report, &None)?))
        }
    }
}

pub async fn update_report(
    State(app): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    observability::request("reports", "update");
    app.storage
        .get_report(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Variable report".to_string()))?;
    let mut report: VariableReport = serde_json::from_value(body)?;
    report.id = Some(id);
    report.validate().map_err(ApiError::Validation)?;
    app.storage.update_report(&mut report).await?;
    let stored = app
        .storage
        .get_report(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Variable report".to_string()))?;
    fields::json_body(&stored, &None)
}

pub async fn partial_update_report(
    State(app): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    observability::request("reports", "partial_update");
    let existing = app
        .storage
        .get_report(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Variable report".to_string()))?;
    let merged = merge_patch(serde_json::to_value(&existing)?, &body)?;
    let mut report: VariableReport = serde_json::from_value(merged)?;
    report.id = Some(id);
    report.validate().map_err(ApiError::Validation)?;
    app.storage.update_report(&mut report).await?;
    let stored = app
        .storage
        .get_report(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Variable report".to_string()))?;
    fields::json_body(&stored, &None)
}

pub async fn destroy_report(State(app): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode> {
    observability::request("reports", "delete");
    if app.storage.delete_report(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Variable report".to_string()))
    }
}

pub async fn list_measurements(
    State(app): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>> {
    observability::request("measurements", "list");
    let filter = ReportFilter { epsa: params.epsa, year: params.year, month: params.month };
    let measurements = app.storage.list_measurements(&filter).await?;
    fields::json_body(&measurements, &params.fields)
}

pub async fn retrieve_measurement(
    State(app): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<DetailParams>,
) -> Result<Json<Value>> {
    observability::request("measurements", "retrieve");
    let measurement = app
        .storage
        .get_measurement(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Indicator measurement".to_string()))?;
    fields::json_body(&measurement, &params.fields)
}

pub async fn create_measurement(
    State(app): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>)> {
    observability::request("measurements", "create");
    match split_payload(body) {
        Payload::Bulk(items) => {
            let outcomes = upsert::upsert_measurements(app.storage.as_ref(), items).await?;
            Ok((StatusCode::CREATED, Json(serde_json::to_value(outcomes)?)))
        }
        Payload::Single(item) => {
            let measurement =
                upsert::create_or_update_measurement(app.storage.as_ref(), item).await?;
            Ok((StatusCode::CREATED, fields::json_body(&measurement, &None)?))
        }
    }
}

pub async fn update_measurement(
    State(app): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    observability::request("measurements", "update");
    app.storage
        .get_measurement(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Indicator measurement".to_string()))?;
    let mut measurement: IndicatorMeasurement = serde_json::from_value(body)?;
    measurement.id = Some(id);
    measurement.validate().map_err(ApiError::Validation)?;
    app.storage.update_measurement(&mut measurement).await?;
    let stored = app
        .storage
        .get_measurement(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Indicator measurement".to_string()))?;
    fields::json_body(&stored, &None)
}

pub async fn partial_update_measurement(
    State(app): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    observability::request("measurements", "partial_update");
    let existing = app
        .storage
        .get_measurement(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Indicator measurement".to_string()))?;
    let merged = merge_patch(serde_json::to_value(&existing)?, &body)?;
    let mut measurement: IndicatorMeasurement = serde_json::from_value(merged)?;
    measurement.id = Some(id);
    measurement.validate().map_err(ApiError::Validation)?;
    app.storage.update_measurement(&mut measurement).await?;
    let stored = app
        .storage
        .get_measurement(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Indicator measurement".to_string()))?;
    fields::json_body(&stored, &None)
}

pub async fn destroy_measurement(
    State(app): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    observability::request("measurements", "delete");
    if app.storage.delete_measurement(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Indicator measurement".to_string()))
    }
}

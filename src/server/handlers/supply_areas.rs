//! Handlers for service-coverage areas. These speak GeoJSON: lists come back
//! as a FeatureCollection, and `POST` accepts a Feature or FeatureCollection
//! whose features are inserted as-is (coverage polygons have no natural key;
//! re-submissions are new rows).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::domain::{Feature, FeatureCollection, Geometry, SupplyArea};
use crate::error::{ApiError, Result};
use crate::observability;
use crate::server::AppState;
use crate::storage::SupplyAreaFilter;

fn not_found() -> ApiError {
    ApiError::NotFound("Supply area".to_string())
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    epsa: Option<String>,
    state: Option<String>,
}

pub async fn list(
    State(app): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>> {
    observability::request("supply_areas", "list");
    let filter = SupplyAreaFilter { epsa: params.epsa, state: params.state };
    let areas = app.storage.list_supply_areas(&filter).await?;
    let collection = FeatureCollection::new(areas.iter().map(SupplyArea::to_feature).collect());
    Ok(Json(serde_json::to_value(collection)?))
}

pub async fn retrieve(State(app): State<AppState>, Path(id): Path<i64>) -> Result<Json<Value>> {
    observability::request("supply_areas", "retrieve");
    let area = app.storage.get_supply_area(id).await?.ok_or_else(not_found)?;
    Ok(Json(serde_json::to_value(area.to_feature())?))
}

fn parse_features(body: &Value) -> Result<Vec<Feature>> {
    match body.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => {
            let collection: FeatureCollection = serde_json::from_value(body.clone())?;
            Ok(collection.features)
        }
        Some("Feature") => Ok(vec![serde_json::from_value(body.clone())?]),
        _ => Err(ApiError::Validation(vec![
            "body must be a GeoJSON Feature or FeatureCollection".to_string(),
        ])),
    }
}

pub async fn create(
    State(app): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>)> {
    observability::request("supply_areas", "create");
    let features = parse_features(&body)?;
    let mut created = Vec::with_capacity(features.len());
    for feature in &features {
        let mut area =
            SupplyArea::from_feature(feature).map_err(|e| ApiError::Validation(vec![e]))?;
        area.validate().map_err(ApiError::Validation)?;
        app.storage.create_supply_area(&mut area).await?;
        created.push(area.to_feature());
    }
    Ok((
        StatusCode::CREATED,
        Json(serde_json::to_value(FeatureCollection::new(created))?),
    ))
}

pub async fn update(
    State(app): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    observability::request("supply_areas", "update");
    app.storage.get_supply_area(id).await?.ok_or_else(not_found)?;
    let feature: Feature = serde_json::from_value(body)?;
    let mut area = SupplyArea::from_feature(&feature).map_err(|e| ApiError::Validation(vec![e]))?;
    area.id = Some(id);
    area.validate().map_err(ApiError::Validation)?;
    app.storage.update_supply_area(&mut area).await?;
    let stored = app.storage.get_supply_area(id).await?.ok_or_else(not_found)?;
    Ok(Json(serde_json::to_value(stored.to_feature())?))
}

/// Partial feature update: a provided `properties.epsa` or `geometry`
/// replaces the stored one.
#[derive(Debug, Deserialize)]
pub struct FeaturePatch {
    #[serde(default)]
    properties: Option<serde_json::Map<String, Value>>,
    #[serde(default)]
    geometry: Option<Geometry>,
}

pub async fn partial_update(
    State(app): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    observability::request("supply_areas", "partial_update");
    let mut area = app.storage.get_supply_area(id).await?.ok_or_else(not_found)?;
    let patch: FeaturePatch = serde_json::from_value(body)?;
    if let Some(properties) = patch.properties {
        if let Some(epsa) = properties.get("epsa").and_then(Value::as_str) {
            area.epsa = epsa.to_string();
        }
    }
    if let Some(geometry) = patch.geometry {
        area.geom = Some(geometry);
    }
    area.validate().map_err(ApiError::Validation)?;
    app.storage.update_supply_area(&mut area).await?;
    let stored = app.storage.get_supply_area(id).await?.ok_or_else(not_found)?;
    Ok(Json(serde_json::to_value(stored.to_feature())?))
}

pub async fn destroy(State(app): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode> {
    observability::request("supply_areas", "delete");
    if app.storage.delete_supply_area(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found())
    }
}

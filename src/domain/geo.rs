//! Minimal GeoJSON support: the two geometry kinds the registries carry
//! (SARH extraction points, supply-area multipolygons) plus the feature
//! wrappers used by the coverage endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A GeoJSON position is `[lon, lat]` with an optional elevation.
pub type Position = Vec<f64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
}

impl Geometry {
    pub fn is_point(&self) -> bool {
        matches!(self, Geometry::Point { .. })
    }

    pub fn is_multi_polygon(&self) -> bool {
        matches!(self, Geometry::MultiPolygon { .. })
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            Geometry::Point { coordinates } => {
                if coordinates.len() < 2 || coordinates.len() > 3 {
                    return Err("Point coordinates must hold [lon, lat] or [lon, lat, z]".into());
                }
            }
            Geometry::MultiPolygon { coordinates } => {
                for polygon in coordinates {
                    for ring in polygon {
                        if ring.len() < 4 {
                            return Err("MultiPolygon rings need at least 4 positions".into());
                        }
                        for position in ring {
                            if position.len() < 2 {
                                return Err("positions must hold at least [lon, lat]".into());
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub feature_type: String,
    #[serde(default)]
    pub properties: serde_json::Map<String, Value>,
    pub geometry: Option<Geometry>,
}

impl Feature {
    pub fn new(properties: serde_json::Map<String, Value>, geometry: Option<Geometry>) -> Self {
        Self { feature_type: "Feature".to_string(), properties, geometry }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub collection_type: String,
    pub features: Vec<Feature>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crs: Option<Value>,
}

impl FeatureCollection {
    /// Wrap features in a collection carrying the EPSG:4326 `crs` link the
    /// coverage consumers expect.
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            collection_type: "FeatureCollection".to_string(),
            features,
            crs: Some(serde_json::json!({
                "type": "link",
                "properties": {
                    "href": "http://spatialreference.org/ref/epsg/4326/",
                    "type": "proj4"
                }
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_round_trips_as_geojson() {
        let geom: Geometry =
            serde_json::from_str(r#"{"type":"Point","coordinates":[-65.73,-19.6]}"#).unwrap();
        assert!(geom.is_point());
        assert!(geom.validate().is_ok());
        let out = serde_json::to_value(&geom).unwrap();
        assert_eq!(out["type"], "Point");
        assert_eq!(out["coordinates"][0], -65.73);
    }

    #[test]
    fn multi_polygon_ring_size_is_checked() {
        let geom = Geometry::MultiPolygon {
            coordinates: vec![vec![vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 0.0]]]],
        };
        assert!(geom.validate().is_err());
    }

    #[test]
    fn unknown_geometry_type_is_rejected() {
        let parsed: Result<Geometry, _> =
            serde_json::from_str(r#"{"type":"LineString","coordinates":[[0,0],[1,1]]}"#);
        assert!(parsed.is_err());
    }
}

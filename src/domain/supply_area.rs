//! Service-coverage polygons. Unlike the other resources these travel as
//! GeoJSON features: the EPSA code (and any extra attributes such as the
//! computed area) ride in `properties` and the multipolygon in `geometry`.

use crate::domain::geo::{Feature, Geometry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyArea {
    pub id: Option<i64>,
    pub epsa: String,
    pub geom: Option<Geometry>,
    pub modified: Option<DateTime<Utc>>,
}

impl SupplyArea {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.epsa.trim().is_empty() {
            errors.push("epsa: must not be blank".to_string());
        }
        if let Some(geom) = &self.geom {
            if !geom.is_multi_polygon() {
                errors.push("geom: must be a GeoJSON MultiPolygon".to_string());
            } else if let Err(e) = geom.validate() {
                errors.push(format!("geom: {e}"));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// The list representation: internal id stays out of the feature.
    pub fn to_feature(&self) -> Feature {
        let mut properties = serde_json::Map::new();
        properties.insert("epsa".to_string(), Value::String(self.epsa.clone()));
        Feature::new(properties, self.geom.clone())
    }

    pub fn from_feature(feature: &Feature) -> Result<Self, String> {
        let epsa = feature
            .properties
            .get("epsa")
            .and_then(Value::as_str)
            .ok_or_else(|| "feature properties must carry an 'epsa' code".to_string())?;
        Ok(Self {
            id: None,
            epsa: epsa.to_string(),
            geom: feature.geometry.clone(),
            modified: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn feature_round_trip_keeps_epsa_and_geometry() {
        let feature: Feature = serde_json::from_value(json!({
            "type": "Feature",
            "properties": { "epsa": "AAPOS", "area": 3243.01 },
            "geometry": {
                "type": "MultiPolygon",
                "coordinates": [[[
                    [-65.737329, -19.606613],
                    [-65.7, -19.6],
                    [-65.72, -19.59],
                    [-65.737329, -19.606613]
                ]]]
            }
        }))
        .unwrap();
        let area = SupplyArea::from_feature(&feature).unwrap();
        assert_eq!(area.epsa, "AAPOS");
        assert!(area.validate().is_ok());
        let out = area.to_feature();
        assert_eq!(out.properties["epsa"], "AAPOS");
        assert!(out.geometry.is_some());
    }

    #[test]
    fn feature_without_epsa_is_invalid() {
        let feature = Feature::new(serde_json::Map::new(), None);
        assert!(SupplyArea::from_feature(&feature).is_err());
    }
}

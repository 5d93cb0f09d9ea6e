//! Self-supply water-extraction authorizations (SARH) and their yearly
//! technical metering children (groundwater and surface variants).

use crate::domain::{check_choice, check_min_year, current_year, Geometry};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const CONDITION_CHOICES: &[&str] = &["ACTIVO", "INACTIVO", "SELLADO"];
pub const SOURCE_KIND_CHOICES: &[&str] = &["SUBTERRANEO", "SUPERFICIAL"];
pub const REG_RENOV_CHOICES: &[&str] = &["REG", "RENOV"];
pub const AUTH_STATE_CHOICES: &[&str] = &["VIGENTE", "VENCIDO", "SELLADO"];
pub const STATE_CHOICES: &[&str] = &[
    "LA PAZ",
    "COCHABAMBA",
    "POTOSI",
    "SANTA CRUZ",
    "CHUQUISACA",
    "ORURO",
    "TARIJA",
    "BENI",
    "PANDO",
];
pub const DISCHARGE_CHOICES: &[&str] =
    &["S.A.S.", "RED DE ALCANTARILLADO", "CUERPO RECEPTOR", "NO DESCARGA"];
pub const METER_CHOICES: &[&str] = &["SI", "NO"];

fn default_year() -> Option<i32> {
    Some(current_year())
}

/// Yearly technical data of a groundwater source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TecnicalDataSub {
    pub detalle: Option<String>,
    #[serde(default = "current_year")]
    pub year: i32,
    pub tiene_medidor: Option<String>,
    pub vol_extraido_promedio: Option<f64>,
    pub aforo: Option<f64>,
    pub nivel_estatico: Option<f64>,
    pub nivel_dinamico: Option<f64>,
    pub caudal_optimo: Option<f64>,
}

impl TecnicalDataSub {
    pub fn validate(&self, errors: &mut Vec<String>, prefix: &str) {
        check_min_year(errors, &format!("{prefix}.year"), self.year, 1800);
        check_choice(
            errors,
            &format!("{prefix}.tiene_medidor"),
            self.tiene_medidor.as_deref(),
            METER_CHOICES,
        );
    }
}

/// Yearly technical data of a surface source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TecnicalDataSup {
    pub detalle: Option<String>,
    #[serde(default = "current_year")]
    pub year: i32,
    pub tiene_medidor: Option<String>,
    pub vol_extraido_promedio: Option<f64>,
    pub caudal_lluvia: Option<f64>,
    pub caudal_estiaje: Option<f64>,
    pub caudal_medio_anual: Option<f64>,
    pub caudal_eco: Option<f64>,
}

impl TecnicalDataSup {
    pub fn validate(&self, errors: &mut Vec<String>, prefix: &str) {
        check_min_year(errors, &format!("{prefix}.year"), self.year, 1800);
        check_choice(
            errors,
            &format!("{prefix}.tiene_medidor"),
            self.tiene_medidor.as_deref(),
            METER_CHOICES,
        );
    }
}

/// An extraction authorization record. `sarh_id` is the natural primary key,
/// derived from the source number. Coordinates are carried twice: raw UTM
/// (`x`/`y`/`z` + `zone`) and WGS84 (`lat`/`lon` + optional GeoJSON point).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sarh {
    pub sarh_id: String,
    pub folder_code: Option<String>,
    pub epsa: Option<String>,
    pub user: Option<String>,
    pub sub_subt: Option<String>,
    pub reg_renov: Option<String>,
    pub rar_aaps_nr: Option<String>,
    pub rar_date: Option<NaiveDate>,
    pub notification_date: Option<NaiveDate>,
    pub user_notification_date: Option<NaiveDate>,
    #[serde(default = "default_year")]
    pub auth_year: Option<i32>,
    #[serde(default = "default_year")]
    pub renovation_alert: Option<i32>,
    pub auth_certificate_state: Option<String>,
    pub state: Option<String>,
    pub municipality: Option<String>,
    pub industry_type: Option<String>,
    pub use_description: Option<String>,
    pub form_extraction_volume: Option<f64>,
    pub authorized_streamflow: Option<f64>,
    pub anual_volume: Option<f64>,
    pub sarh_denom: Option<String>,
    pub active_inactive_sealed: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub zone: Option<String>,
    pub source_nr: Option<String>,
    pub discharge_place: Option<String>,
    pub ph: Option<f64>,
    pub conductivity: Option<f64>,
    pub turbidity: Option<f64>,
    pub iron: Option<f64>,
    pub manganese: Option<f64>,
    pub od: Option<f64>,
    pub langelie: Option<f64>,
    pub observations: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub geom: Option<Geometry>,
    pub tecnical_sub: Option<Vec<TecnicalDataSub>>,
    pub tecnical_sup: Option<Vec<TecnicalDataSup>>,
    pub modified: Option<DateTime<Utc>>,
}

impl Sarh {
    pub const UNIQUE_KEY: &'static [&'static str] = &["sarh_id"];

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.sarh_id.trim().is_empty() {
            errors.push("sarh_id: must not be blank".to_string());
        }
        check_choice(&mut errors, "sub_subt", self.sub_subt.as_deref(), SOURCE_KIND_CHOICES);
        check_choice(&mut errors, "reg_renov", self.reg_renov.as_deref(), REG_RENOV_CHOICES);
        check_choice(
            &mut errors,
            "auth_certificate_state",
            self.auth_certificate_state.as_deref(),
            AUTH_STATE_CHOICES,
        );
        check_choice(&mut errors, "state", self.state.as_deref(), STATE_CHOICES);
        check_choice(
            &mut errors,
            "active_inactive_sealed",
            self.active_inactive_sealed.as_deref(),
            CONDITION_CHOICES,
        );
        check_choice(
            &mut errors,
            "discharge_place",
            self.discharge_place.as_deref(),
            DISCHARGE_CHOICES,
        );
        if let Some(year) = self.auth_year {
            check_min_year(&mut errors, "auth_year", year, 1800);
        }
        if let Some(geom) = &self.geom {
            if !geom.is_point() {
                errors.push("geom: must be a GeoJSON Point".to_string());
            } else if let Err(e) = geom.validate() {
                errors.push(format!("geom: {e}"));
            }
        }
        if let Some(subs) = &self.tecnical_sub {
            for (i, sub) in subs.iter().enumerate() {
                sub.validate(&mut errors, &format!("tecnical_sub[{i}]"));
            }
        }
        if let Some(sups) = &self.tecnical_sup {
            for (i, sup) in sups.iter().enumerate() {
                sup.validate(&mut errors, &format!("tecnical_sup[{i}]"));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_sarh() -> serde_json::Value {
        json!({
            "sarh_id": "00123-00456-1",
            "epsa": "SAGUAPAC",
            "user": "PLANTA INDUSTRIAL NORTE",
            "sub_subt": "SUBTERRANEO",
            "auth_year": 2015,
            "geom": { "type": "Point", "coordinates": [-63.18, -17.78] },
            "tecnical_sub": [
                { "year": 2016, "tiene_medidor": "SI", "aforo": 12.0 }
            ]
        })
    }

    #[test]
    fn valid_record_passes() {
        let sarh: Sarh = serde_json::from_value(base_sarh()).unwrap();
        assert!(sarh.validate().is_ok());
    }

    #[test]
    fn geometry_must_be_a_point() {
        let mut raw = base_sarh();
        raw["geom"] = json!({
            "type": "MultiPolygon",
            "coordinates": [[[[0.0,0.0],[1.0,0.0],[1.0,1.0],[0.0,0.0]]]]
        });
        let sarh: Sarh = serde_json::from_value(raw).unwrap();
        let errors = sarh.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.starts_with("geom:")));
    }

    #[test]
    fn child_meter_flag_is_checked() {
        let mut raw = base_sarh();
        raw["tecnical_sub"][0]["tiene_medidor"] = json!("TAL VEZ");
        let sarh: Sarh = serde_json::from_value(raw).unwrap();
        assert!(sarh.validate().is_err());
    }

    #[test]
    fn auth_year_defaults_to_current() {
        let sarh: Sarh = serde_json::from_value(json!({ "sarh_id": "A-1" })).unwrap();
        assert!(sarh.auth_year.is_some());
    }
}

//! Performance catalog: the variables utilities report and the indicators
//! computed from them. Both are keyed by `code` and carry a unique numeric
//! index used for ordering.

use crate::domain::check_choice;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const VARIABLE_TYPES: &[&str] = &[
    "volumen",
    "capacidad",
    "muestras_calidad",
    "conexiones",
    "poblacion",
    "abastecimiento",
    "balance_general",
    "estado_resultados",
    "inversiones",
    "personal",
    "reclamos",
    "muestras_presion",
    "fallas",
];

pub const INDICATOR_CRITERIA: &[&str] = &[
    "disponibilidad_recurso",
    "calidad_recurso",
    "abastecimiento",
    "alcanse",
    "sostenibilidad_sub",
    "contaminacion",
    "manejo_apropiado_mejora",
    "mantenimiento",
    "razonabilidad_economica",
    "sostenibilidad_mejora",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub code: String,
    pub var_id: u32,
    pub name: Option<String>,
    pub unit: Option<String>,
    pub var_type: Option<String>,
    pub modified: Option<DateTime<Utc>>,
}

impl Variable {
    pub const UNIQUE_KEY: &'static [&'static str] = &["code"];

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.code.trim().is_empty() {
            errors.push("code: must not be blank".to_string());
        }
        check_choice(&mut errors, "var_type", self.var_type.as_deref(), VARIABLE_TYPES);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Indicator thresholds are tracked per EPSA category; the wire format keeps
/// the original upper-case category suffixes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub code: String,
    pub ind_id: u32,
    pub name: Option<String>,
    pub unit: Option<String>,
    pub criteria: Option<String>,
    #[serde(rename = "par_min_A")]
    pub par_min_a: Option<f64>,
    #[serde(rename = "par_min_B")]
    pub par_min_b: Option<f64>,
    #[serde(rename = "par_min_C")]
    pub par_min_c: Option<f64>,
    #[serde(rename = "par_min_D")]
    pub par_min_d: Option<f64>,
    #[serde(rename = "par_max_A")]
    pub par_max_a: Option<f64>,
    #[serde(rename = "par_max_B")]
    pub par_max_b: Option<f64>,
    #[serde(rename = "par_max_C")]
    pub par_max_c: Option<f64>,
    #[serde(rename = "par_max_D")]
    pub par_max_d: Option<f64>,
    pub modified: Option<DateTime<Utc>>,
}

impl Indicator {
    pub const UNIQUE_KEY: &'static [&'static str] = &["code"];

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.code.trim().is_empty() {
            errors.push("code: must not be blank".to_string());
        }
        check_choice(&mut errors, "criteria", self.criteria.as_deref(), INDICATOR_CRITERIA);
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

    #[test]
    fn indicator_thresholds_use_category_suffixes() {
        let ind: Indicator = serde_json::from_value(serde_json::json!({
            "code": "continuidad_corte",
            "ind_id": 7,
            "criteria": "abastecimiento",
            "unit": "%",
            "par_min_A": 95.0,
            "par_min_B": 90.0
        }))
        .unwrap();
        assert!(ind.validate().is_ok());
        let out = serde_json::to_value(&ind).unwrap();
        assert_eq!(out["par_min_A"], 95.0);
        assert!(out.get("par_min_a").is_none());
    }

    #[test]
    fn variable_type_must_be_in_catalog() {
        let var: Variable = serde_json::from_value(serde_json::json!({
            "code": "vol_sup",
            "var_id": 1,
            "var_type": "caudal"
        }))
        .unwrap();
        assert!(var.validate().is_err());
    }
}

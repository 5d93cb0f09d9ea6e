//! Investment planning filings: annual operating budgets (POA) with their
//! expense sheets, and five-year/transitional development plans (PDQ/PTDS)
//! with expansion goals.

use crate::domain::{check_min_year, current_year};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Expense sheet of a cooperative-run EPSA, one per POA at most.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CoopExpense {
    pub costos_operacion: Option<f64>,
    pub costos_mantenimiento: Option<f64>,
    pub gastos_administrativos: Option<f64>,
    pub gastos_comerciales: Option<f64>,
    pub gastos_financieros: Option<f64>,
}

/// Expense sheet of a municipal EPSA, one per POA at most.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MuniExpense {
    pub gastos_empleados_permanentes: Option<f64>,
    pub gastos_empleados_no_permanentes: Option<f64>,
    pub gastos_prevision_social: Option<f64>,
    pub gastos_servicio_no_personales: Option<f64>,
    pub gastos_materiales: Option<f64>,
    pub gastos_activos: Option<f64>,
    pub gastos_deuda_publica: Option<f64>,
    pub gastos_transferencias: Option<f64>,
    pub gastos_impuesto: Option<f64>,
    pub gastos_otros: Option<f64>,
}

fn default_order() -> i32 {
    1
}

/// Annual operating budget of an EPSA. `order` distinguishes the initial
/// filing (1) from reprogrammings (2-5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poa {
    pub id: Option<i64>,
    pub epsa: String,
    #[serde(default = "current_year")]
    pub year: i32,
    #[serde(default = "default_order")]
    pub order: i32,

    // Operating and non-operating income
    pub in_op_ap: Option<f64>,
    pub in_op_alc: Option<f64>,
    pub in_op_alc_pozo: Option<f64>,
    pub in_op_otros: Option<f64>,
    pub in_financieros: Option<f64>,
    pub in_no_op_otros: Option<f64>,

    // Investments
    pub inv_infraestructura_ap: Option<f64>,
    pub inv_infraestructura_alc: Option<f64>,
    pub inv_equipo: Option<f64>,
    pub inv_diseno_estudio: Option<f64>,
    pub inv_otros: Option<f64>,

    // Expansion goals
    pub pob_total: Option<f64>,
    pub pob_ap: Option<f64>,
    pub pob_alc: Option<f64>,
    pub con_ap: Option<f64>,
    pub con_ap_total: Option<f64>,
    pub cob_ap: Option<f64>,
    pub con_alc: Option<f64>,
    pub con_alc_total: Option<f64>,
    pub cob_alc: Option<f64>,
    pub cob_micro: Option<f64>,
    pub anc: Option<f64>,

    pub coop_expense: Option<CoopExpense>,
    pub muni_expense: Option<MuniExpense>,

    pub modified: Option<DateTime<Utc>>,
}

impl Poa {
    pub const UNIQUE_KEY: &'static [&'static str] = &["epsa", "year", "order"];

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.epsa.trim().is_empty() {
            errors.push("epsa: must not be blank".to_string());
        }
        check_min_year(&mut errors, "year", self.year, 1900);
        if !(1..=5).contains(&self.order) {
            errors.push("order: must be between 1 and 5".to_string());
        }
        if self.coop_expense.is_some() && self.muni_expense.is_some() {
            errors.push(
                "a POA cannot carry more than one expense sheet type (cooperative, municipal)"
                    .to_string(),
            );
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    #[default]
    Pdq,
    Ptds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanGoal {
    #[serde(default = "current_year")]
    pub year: i32,
    pub description: String,
    pub value: f64,
    pub val_description: Option<String>,
    pub unit: String,
}

/// A five-year development plan (PDQ) or transitional sustainable
/// development plan (PTDS), one per EPSA and starting year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: Option<i64>,
    pub epsa: String,
    #[serde(default = "current_year")]
    pub year: i32,
    #[serde(default)]
    pub plan_type: PlanType,
    pub goals: Option<Vec<PlanGoal>>,
    pub modified: Option<DateTime<Utc>>,
}

impl Plan {
    pub const UNIQUE_KEY: &'static [&'static str] = &["epsa", "year"];

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.epsa.trim().is_empty() {
            errors.push("epsa: must not be blank".to_string());
        }
        check_min_year(&mut errors, "year", self.year, 1900);
        if let Some(goals) = &self.goals {
            for (i, goal) in goals.iter().enumerate() {
                if goal.description.trim().is_empty() {
                    errors.push(format!("goals[{i}].description: must not be blank"));
                }
                check_min_year(&mut errors, &format!("goals[{i}].year"), goal.year, 1900);
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

    #[test]
    fn poa_rejects_both_expense_sheets() {
        let poa: Poa = serde_json::from_value(json!({
            "epsa": "SAGUAPAC",
            "year": 2019,
            "order": 1,
            "coop_expense": { "costos_operacion": 100.0 },
            "muni_expense": { "gastos_otros": 5.0 }
        }))
        .unwrap();
        let errors = poa.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn poa_order_defaults_to_initial_filing() {
        let poa: Poa = serde_json::from_value(json!({ "epsa": "EPSAS", "year": 2020 })).unwrap();
        assert_eq!(poa.order, 1);
        assert!(poa.validate().is_ok());
    }

    #[test]
    fn plan_type_defaults_to_pdq() {
        let plan: Plan = serde_json::from_value(json!({
            "epsa": "AAPOS",
            "year": 2018,
            "goals": [
                { "year": 2019, "description": "conexiones nuevas", "value": 1500.0, "unit": "conex." }
            ]
        }))
        .unwrap();
        assert_eq!(plan.plan_type, PlanType::Pdq);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn plan_goal_needs_description() {
        let plan: Plan = serde_json::from_value(json!({
            "epsa": "AAPOS",
            "year": 2018,
            "goals": [{ "year": 2019, "description": " ", "value": 1.0, "unit": "%" }]
        }))
        .unwrap();
        assert!(plan.validate().is_err());
    }
}

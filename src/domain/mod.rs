//! Domain records for the regulated-entity registries.
//!
//! Every record carries a `modified` timestamp maintained by the store on
//! write. Fields mirror the public wire format; records with a natural key
//! expose it through `UNIQUE_KEY` for the bulk create-or-update path.

pub mod catalog;
pub mod epsa;
pub mod geo;
pub mod planning;
pub mod report;
pub mod sarh;
pub mod supply_area;

pub use catalog::{Indicator, Variable};
pub use epsa::Epsa;
pub use geo::{Feature, FeatureCollection, Geometry};
pub use planning::{CoopExpense, MuniExpense, Plan, PlanGoal, PlanType, Poa};
pub use report::{IndicatorMeasurement, ValueKind, VariableReport};
pub use sarh::{Sarh, TecnicalDataSub, TecnicalDataSup};
pub use supply_area::SupplyArea;

use chrono::Datelike;

pub(crate) fn current_year() -> i32 {
    chrono::Utc::now().year()
}

/// Push a validation error when an optional field holds a value outside its
/// declared choice list.
pub(crate) fn check_choice(
    errors: &mut Vec<String>,
    field: &str,
    value: Option<&str>,
    allowed: &[&str],
) {
    if let Some(v) = value {
        if !allowed.contains(&v) {
            errors.push(format!("{field}: '{v}' is not a valid choice"));
        }
    }
}

pub(crate) fn check_min_year(errors: &mut Vec<String>, field: &str, year: i32, min: i32) {
    if year < min {
        errors.push(format!("{field}: must be {min} or later"));
    }
}

//! Persistence seam for the registries.
//!
//! Handlers and the upsert path only see the [`Storage`] trait; the
//! production implementation lives in [`sqlite`]. Create/update methods take
//! the record mutably and fill in the store-assigned id and `modified`
//! timestamp.

pub mod sqlite;

use crate::domain::*;
use crate::error::Result;
use async_trait::async_trait;

#[derive(Debug, Clone, Default)]
pub struct EpsaFilter {
    pub code: Option<String>,
    pub state: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct VariableFilter {
    pub code: Option<String>,
    pub var_id: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct IndicatorFilter {
    pub code: Option<String>,
    pub ind_id: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub epsa: Option<String>,
    pub year: Option<i32>,
    pub month: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct PoaFilter {
    pub epsa: Option<String>,
    pub year: Option<i32>,
    pub order: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct PlanFilter {
    pub epsa: Option<String>,
    pub year: Option<i32>,
    pub plan_type: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SarhFilter {
    pub epsa: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SupplyAreaFilter {
    pub epsa: Option<String>,
    /// Department code, resolved through the EPSA registry.
    pub state: Option<String>,
}

#[async_trait]
pub trait Storage: Send + Sync {
    // EPSA registry
    async fn list_epsas(&self, filter: &EpsaFilter) -> Result<Vec<Epsa>>;
    async fn get_epsa(&self, code: &str) -> Result<Option<Epsa>>;
    async fn create_epsa(&self, epsa: &mut Epsa) -> Result<()>;
    async fn update_epsa(&self, code: &str, epsa: &mut Epsa) -> Result<()>;
    async fn delete_epsa(&self, code: &str) -> Result<bool>;

    // Variable catalog
    async fn list_variables(&self, filter: &VariableFilter) -> Result<Vec<Variable>>;
    async fn get_variable(&self, code: &str) -> Result<Option<Variable>>;
    async fn get_variable_by_var_id(&self, var_id: u32) -> Result<Option<Variable>>;
    async fn create_variable(&self, variable: &mut Variable) -> Result<()>;
    async fn update_variable(&self, code: &str, variable: &mut Variable) -> Result<()>;
    async fn delete_variable(&self, code: &str) -> Result<bool>;

    // Indicator catalog
    async fn list_indicators(&self, filter: &IndicatorFilter) -> Result<Vec<Indicator>>;
    async fn get_indicator(&self, code: &str) -> Result<Option<Indicator>>;
    async fn get_indicator_by_ind_id(&self, ind_id: u32) -> Result<Option<Indicator>>;
    async fn create_indicator(&self, indicator: &mut Indicator) -> Result<()>;
    async fn update_indicator(&self, code: &str, indicator: &mut Indicator) -> Result<()>;
    async fn delete_indicator(&self, code: &str) -> Result<bool>;

    // Variable reports
    async fn list_reports(&self, filter: &ReportFilter) -> Result<Vec<VariableReport>>;
    async fn get_report(&self, id: i64) -> Result<Option<VariableReport>>;
    async fn find_report(
        &self,
        epsa: Option<&str>,
        year: i32,
        month: Option<i32>,
    ) -> Result<Option<VariableReport>>;
    async fn create_report(&self, report: &mut VariableReport) -> Result<()>;
    async fn update_report(&self, report: &mut VariableReport) -> Result<()>;
    async fn delete_report(&self, id: i64) -> Result<bool>;

    // Indicator measurements
    async fn list_measurements(&self, filter: &ReportFilter) -> Result<Vec<IndicatorMeasurement>>;
    async fn get_measurement(&self, id: i64) -> Result<Option<IndicatorMeasurement>>;
    async fn find_measurement(
        &self,
        epsa: Option<&str>,
        year: i32,
        month: Option<i32>,
    ) -> Result<Option<IndicatorMeasurement>>;
    async fn create_measurement(&self, measurement: &mut IndicatorMeasurement) -> Result<()>;
    async fn update_measurement(&self, measurement: &mut IndicatorMeasurement) -> Result<()>;
    async fn delete_measurement(&self, id: i64) -> Result<bool>;

    // POAs. A provided expense sheet replaces whatever sheet the POA had
    // (of either type); an absent one leaves the stored sheet untouched.
    async fn list_poas(&self, filter: &PoaFilter) -> Result<Vec<Poa>>;
    async fn get_poa(&self, id: i64) -> Result<Option<Poa>>;
    async fn find_poa(&self, epsa: &str, year: i32, order: i32) -> Result<Option<Poa>>;
    async fn create_poa(&self, poa: &mut Poa) -> Result<()>;
    async fn update_poa(&self, poa: &mut Poa) -> Result<()>;
    async fn delete_poa(&self, id: i64) -> Result<bool>;

    // Plans. Provided goals replace the stored set; absent goals are kept.
    async fn list_plans(&self, filter: &PlanFilter) -> Result<Vec<Plan>>;
    async fn get_plan(&self, id: i64) -> Result<Option<Plan>>;
    async fn find_plan(&self, epsa: &str, year: i32) -> Result<Option<Plan>>;
    async fn create_plan(&self, plan: &mut Plan) -> Result<()>;
    async fn update_plan(&self, plan: &mut Plan) -> Result<()>;
    async fn delete_plan(&self, id: i64) -> Result<bool>;

    // SARH records. Provided tecnical_sub/tecnical_sup lists replace the
    // stored children; absent lists are kept.
    async fn list_sarhs(&self, filter: &SarhFilter) -> Result<Vec<Sarh>>;
    async fn get_sarh(&self, sarh_id: &str) -> Result<Option<Sarh>>;
    async fn create_sarh(&self, sarh: &mut Sarh) -> Result<()>;
    async fn update_sarh(&self, sarh_id: &str, sarh: &mut Sarh) -> Result<()>;
    async fn delete_sarh(&self, sarh_id: &str) -> Result<bool>;

    // Supply areas
    async fn list_supply_areas(&self, filter: &SupplyAreaFilter) -> Result<Vec<SupplyArea>>;
    async fn get_supply_area(&self, id: i64) -> Result<Option<SupplyArea>>;
    async fn create_supply_area(&self, area: &mut SupplyArea) -> Result<()>;
    async fn update_supply_area(&self, area: &mut SupplyArea) -> Result<()>;
    async fn delete_supply_area(&self, id: i64) -> Result<bool>;
}

//! Bulk create-or-update.
//!
//! Each record of a list payload is matched against its resource's natural
//! unique-key tuple: found records are overwritten in place, missing ones are
//! inserted, and nested child collections are replaced when the payload
//! carries them. Records are processed independently and in order; the
//! response tags every record with what happened to it.
//!
//! Records whose key fields are absent or blank are tagged `ignored`.
//! Records that fail decoding or semantic validation are tagged `rejected`
//! with the offending errors instead of being silently dropped.

use crate::domain::*;
use crate::error::{ApiError, Result};
use crate::observability;
use crate::storage::Storage;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// The payload does not carry every key field of the resource.
    MissingKey,
    /// The key fields are present but blank.
    BlankKey,
}

/// Per-record outcome of a bulk write, externally tagged so the response
/// reads `{"created": {...}}`, `{"updated": {...}}`, `{"ignored": {...}}` or
/// `{"rejected": {...}}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Created(Value),
    Updated(Value),
    Ignored { reason: IgnoreReason },
    Rejected { errors: Vec<String> },
}

impl Outcome {
    pub fn tag(&self) -> &'static str {
        match self {
            Outcome::Created(_) => "created",
            Outcome::Updated(_) => "updated",
            Outcome::Ignored { .. } => "ignored",
            Outcome::Rejected { .. } => "rejected",
        }
    }
}

enum KeyRule {
    /// Ignore the record only when every key field is blank.
    AnyNonBlank,
    /// Ignore the record when any key field is blank.
    AllNonBlank,
}

fn value_is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn key_blank(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).map_or(true, value_is_blank)
}

/// Runs the identification checks shared by every resource; `None` means the
/// record may proceed to decoding.
fn key_check(item: &Value, keys: &[&str], rule: KeyRule) -> Option<Outcome> {
    let obj = match item.as_object() {
        Some(obj) => obj,
        None => {
            return Some(Outcome::Rejected {
                errors: vec!["record must be a JSON object".to_string()],
            })
        }
    };
    if keys.iter().any(|k| !obj.contains_key(*k)) {
        return Some(Outcome::Ignored { reason: IgnoreReason::MissingKey });
    }
    let blank = match rule {
        KeyRule::AnyNonBlank => keys.iter().all(|k| key_blank(obj, k)),
        KeyRule::AllNonBlank => keys.iter().any(|k| key_blank(obj, k)),
    };
    if blank {
        return Some(Outcome::Ignored { reason: IgnoreReason::BlankKey });
    }
    None
}

fn decode<T: DeserializeOwned>(item: &Value) -> std::result::Result<T, Outcome> {
    serde_json::from_value(item.clone())
        .map_err(|e| Outcome::Rejected { errors: vec![e.to_string()] })
}

/// Single-object POA/SARH writes register unknown EPSA codes on the fly,
/// mirroring the registry's role as a free-text reference.
pub async fn ensure_epsa(storage: &dyn Storage, code: Option<&str>) -> Result<()> {
    if let Some(code) = code {
        if !code.trim().is_empty() && storage.get_epsa(code).await?.is_none() {
            let mut epsa = Epsa {
                code: code.to_string(),
                name: None,
                state: None,
                category: None,
                modified: None,
            };
            storage.create_epsa(&mut epsa).await?;
        }
    }
    Ok(())
}

pub async fn upsert_epsa(storage: &dyn Storage, item: Value) -> Result<Outcome> {
    if let Some(outcome) = key_check(&item, Epsa::UNIQUE_KEY, KeyRule::AnyNonBlank) {
        return Ok(outcome);
    }
    let mut epsa: Epsa = match decode(&item) {
        Ok(v) => v,
        Err(outcome) => return Ok(outcome),
    };
    if let Err(errors) = epsa.validate() {
        return Ok(Outcome::Rejected { errors });
    }
    let code = epsa.code.clone();
    match storage.get_epsa(&code).await? {
        Some(_) => {
            storage.update_epsa(&code, &mut epsa).await?;
            Ok(Outcome::Updated(item))
        }
        None => {
            storage.create_epsa(&mut epsa).await?;
            Ok(Outcome::Created(item))
        }
    }
}

pub async fn upsert_variable(storage: &dyn Storage, item: Value) -> Result<Outcome> {
    if let Some(outcome) = key_check(&item, Variable::UNIQUE_KEY, KeyRule::AnyNonBlank) {
        return Ok(outcome);
    }
    let mut variable: Variable = match decode(&item) {
        Ok(v) => v,
        Err(outcome) => return Ok(outcome),
    };
    if let Err(errors) = variable.validate() {
        return Ok(Outcome::Rejected { errors });
    }
    if let Some(existing) = storage.get_variable_by_var_id(variable.var_id).await? {
        if existing.code != variable.code {
            return Ok(Outcome::Rejected {
                errors: vec![format!(
                    "var_id: {} is already assigned to variable '{}'",
                    variable.var_id, existing.code
                )],
            });
        }
    }
    let code = variable.code.clone();
    match storage.get_variable(&code).await? {
        Some(_) => {
            storage.update_variable(&code, &mut variable).await?;
            Ok(Outcome::Updated(item))
        }
        None => {
            storage.create_variable(&mut variable).await?;
            Ok(Outcome::Created(item))
        }
    }
}

pub async fn upsert_indicator(storage: &dyn Storage, item: Value) -> Result<Outcome> {
    if let Some(outcome) = key_check(&item, Indicator::UNIQUE_KEY, KeyRule::AnyNonBlank) {
        return Ok(outcome);
    }
    let mut indicator: Indicator = match decode(&item) {
        Ok(v) => v,
        Err(outcome) => return Ok(outcome),
    };
    if let Err(errors) = indicator.validate() {
        return Ok(Outcome::Rejected { errors });
    }
    if let Some(existing) = storage.get_indicator_by_ind_id(indicator.ind_id).await? {
        if existing.code != indicator.code {
            return Ok(Outcome::Rejected {
                errors: vec![format!(
                    "ind_id: {} is already assigned to indicator '{}'",
                    indicator.ind_id, existing.code
                )],
            });
        }
    }
    let code = indicator.code.clone();
    match storage.get_indicator(&code).await? {
        Some(_) => {
            storage.update_indicator(&code, &mut indicator).await?;
            Ok(Outcome::Updated(item))
        }
        None => {
            storage.create_indicator(&mut indicator).await?;
            Ok(Outcome::Created(item))
        }
    }
}

pub async fn upsert_report(storage: &dyn Storage, item: Value) -> Result<Outcome> {
    if let Some(outcome) = key_check(&item, VariableReport::UNIQUE_KEY, KeyRule::AnyNonBlank) {
        return Ok(outcome);
    }
    let mut report: VariableReport = match decode(&item) {
        Ok(v) => v,
        Err(outcome) => return Ok(outcome),
    };
    if let Err(errors) = report.validate() {
        return Ok(Outcome::Rejected { errors });
    }
    match storage.find_report(report.epsa.as_deref(), report.year, report.month).await? {
        Some(existing) => {
            report.id = existing.id;
            storage.update_report(&mut report).await?;
            Ok(Outcome::Updated(item))
        }
        None => {
            storage.create_report(&mut report).await?;
            Ok(Outcome::Created(item))
        }
    }
}

pub async fn upsert_measurement(storage: &dyn Storage, item: Value) -> Result<Outcome> {
    if let Some(outcome) =
        key_check(&item, IndicatorMeasurement::UNIQUE_KEY, KeyRule::AnyNonBlank)
    {
        return Ok(outcome);
    }
    let mut measurement: IndicatorMeasurement = match decode(&item) {
        Ok(v) => v,
        Err(outcome) => return Ok(outcome),
    };
    if let Err(errors) = measurement.validate() {
        return Ok(Outcome::Rejected { errors });
    }
    match storage
        .find_measurement(measurement.epsa.as_deref(), measurement.year, measurement.month)
        .await?
    {
        Some(existing) => {
            measurement.id = existing.id;
            storage.update_measurement(&mut measurement).await?;
            Ok(Outcome::Updated(item))
        }
        None => {
            storage.create_measurement(&mut measurement).await?;
            Ok(Outcome::Created(item))
        }
    }
}

pub async fn upsert_poa(storage: &dyn Storage, item: Value) -> Result<Outcome> {
    if let Some(outcome) = key_check(&item, Poa::UNIQUE_KEY, KeyRule::AllNonBlank) {
        return Ok(outcome);
    }
    let mut poa: Poa = match decode(&item) {
        Ok(v) => v,
        Err(outcome) => return Ok(outcome),
    };
    if let Err(errors) = poa.validate() {
        return Ok(Outcome::Rejected { errors });
    }
    match storage.find_poa(&poa.epsa, poa.year, poa.order).await? {
        Some(existing) => {
            poa.id = existing.id;
            storage.update_poa(&mut poa).await?;
            Ok(Outcome::Updated(item))
        }
        None => {
            storage.create_poa(&mut poa).await?;
            Ok(Outcome::Created(item))
        }
    }
}

pub async fn upsert_plan(storage: &dyn Storage, item: Value) -> Result<Outcome> {
    if let Some(outcome) = key_check(&item, Plan::UNIQUE_KEY, KeyRule::AllNonBlank) {
        return Ok(outcome);
    }
    let mut plan: Plan = match decode(&item) {
        Ok(v) => v,
        Err(outcome) => return Ok(outcome),
    };
    if let Err(errors) = plan.validate() {
        return Ok(Outcome::Rejected { errors });
    }
    match storage.find_plan(&plan.epsa, plan.year).await? {
        Some(existing) => {
            plan.id = existing.id;
            storage.update_plan(&mut plan).await?;
            Ok(Outcome::Updated(item))
        }
        None => {
            storage.create_plan(&mut plan).await?;
            Ok(Outcome::Created(item))
        }
    }
}

pub async fn upsert_sarh(storage: &dyn Storage, item: Value) -> Result<Outcome> {
    if let Some(outcome) = key_check(&item, Sarh::UNIQUE_KEY, KeyRule::AllNonBlank) {
        return Ok(outcome);
    }
    let mut sarh: Sarh = match decode(&item) {
        Ok(v) => v,
        Err(outcome) => return Ok(outcome),
    };
    if let Err(errors) = sarh.validate() {
        return Ok(Outcome::Rejected { errors });
    }
    let sarh_id = sarh.sarh_id.clone();
    match storage.get_sarh(&sarh_id).await? {
        Some(_) => {
            storage.update_sarh(&sarh_id, &mut sarh).await?;
            Ok(Outcome::Updated(item))
        }
        None => {
            storage.create_sarh(&mut sarh).await?;
            Ok(Outcome::Created(item))
        }
    }
}

macro_rules! bulk_driver {
    ($name:ident, $single:ident, $resource:literal) => {
        /// Applies the single-record upsert to every record in order,
        /// recording the outcome tally.
        pub async fn $name(storage: &dyn Storage, items: Vec<Value>) -> Result<Vec<Outcome>> {
            let mut outcomes = Vec::with_capacity(items.len());
            for item in items {
                let outcome = $single(storage, item).await?;
                observability::upsert_outcome($resource, outcome.tag());
                outcomes.push(outcome);
            }
            Ok(outcomes)
        }
    };
}

bulk_driver!(upsert_epsas, upsert_epsa, "epsas");
bulk_driver!(upsert_variables, upsert_variable, "variables");
bulk_driver!(upsert_indicators, upsert_indicator, "indicators");
bulk_driver!(upsert_reports, upsert_report, "reports");
bulk_driver!(upsert_measurements, upsert_measurement, "measurements");
bulk_driver!(upsert_poas, upsert_poa, "poas");
bulk_driver!(upsert_plans, upsert_plan, "plans");
bulk_driver!(upsert_sarhs, upsert_sarh, "sarhs");

/// Single-object create path: same create-or-update semantics as the bulk
/// path, but validation failures surface as a structured 400 instead of a
/// tagged outcome. Returns the stored record.
pub async fn create_or_update_epsa(storage: &dyn Storage, item: Value) -> Result<Epsa> {
    match upsert_epsa(storage, item).await? {
        Outcome::Created(v) | Outcome::Updated(v) => {
            let epsa: Epsa = serde_json::from_value(v)?;
            storage
                .get_epsa(&epsa.code)
                .await?
                .ok_or_else(|| ApiError::NotFound("EPSA".to_string()))
        }
        Outcome::Ignored { .. } => Err(ApiError::MissingField("code".to_string())),
        Outcome::Rejected { errors } => Err(ApiError::Validation(errors)),
    }
}

pub async fn create_or_update_variable(storage: &dyn Storage, item: Value) -> Result<Variable> {
    match upsert_variable(storage, item).await? {
        Outcome::Created(v) | Outcome::Updated(v) => {
            let variable: Variable = serde_json::from_value(v)?;
            storage
                .get_variable(&variable.code)
                .await?
                .ok_or_else(|| ApiError::NotFound("Variable".to_string()))
        }
        Outcome::Ignored { .. } => Err(ApiError::MissingField("code".to_string())),
        Outcome::Rejected { errors } => Err(ApiError::Validation(errors)),
    }
}

pub async fn create_or_update_indicator(storage: &dyn Storage, item: Value) -> Result<Indicator> {
    match upsert_indicator(storage, item).await? {
        Outcome::Created(v) | Outcome::Updated(v) => {
            let indicator: Indicator = serde_json::from_value(v)?;
            storage
                .get_indicator(&indicator.code)
                .await?
                .ok_or_else(|| ApiError::NotFound("Indicator".to_string()))
        }
        Outcome::Ignored { .. } => Err(ApiError::MissingField("code".to_string())),
        Outcome::Rejected { errors } => Err(ApiError::Validation(errors)),
    }
}

pub async fn create_or_update_report(
    storage: &dyn Storage,
    item: Value,
) -> Result<VariableReport> {
    match upsert_report(storage, item).await? {
        Outcome::Created(v) | Outcome::Updated(v) => {
            let report: VariableReport = serde_json::from_value(v)?;
            storage
                .find_report(report.epsa.as_deref(), report.year, report.month)
                .await?
                .ok_or_else(|| ApiError::NotFound("Variable report".to_string()))
        }
        Outcome::Ignored { .. } => {
            Err(ApiError::MissingField("epsa, year, month".to_string()))
        }
        Outcome::Rejected { errors } => Err(ApiError::Validation(errors)),
    }
}

pub async fn create_or_update_measurement(
    storage: &dyn Storage,
    item: Value,
) -> Result<IndicatorMeasurement> {
    match upsert_measurement(storage, item).await? {
        Outcome::Created(v) | Outcome::Updated(v) => {
            let measurement: IndicatorMeasurement = serde_json::from_value(v)?;
            storage
                .find_measurement(measurement.epsa.as_deref(), measurement.year, measurement.month)
                .await?
                .ok_or_else(|| ApiError::NotFound("Indicator measurement".to_string()))
        }
        Outcome::Ignored { .. } => {
            Err(ApiError::MissingField("epsa, year, month".to_string()))
        }
        Outcome::Rejected { errors } => Err(ApiError::Validation(errors)),
    }
}

pub async fn create_or_update_poa(storage: &dyn Storage, item: Value) -> Result<Poa> {
    let epsa_code = item.get("epsa").and_then(Value::as_str).map(str::to_string);
    match upsert_poa(storage, item).await? {
        Outcome::Created(v) | Outcome::Updated(v) => {
            ensure_epsa(storage, epsa_code.as_deref()).await?;
            let poa: Poa = serde_json::from_value(v)?;
            storage
                .find_poa(&poa.epsa, poa.year, poa.order)
                .await?
                .ok_or_else(|| ApiError::NotFound("POA".to_string()))
        }
        Outcome::Ignored { .. } => {
            Err(ApiError::MissingField("epsa, year, order".to_string()))
        }
        Outcome::Rejected { errors } => Err(ApiError::Validation(errors)),
    }
}

pub async fn create_or_update_plan(storage: &dyn Storage, item: Value) -> Result<Plan> {
    match upsert_plan(storage, item).await? {
        Outcome::Created(v) | Outcome::Updated(v) => {
            let plan: Plan = serde_json::from_value(v)?;
            storage
                .find_plan(&plan.epsa, plan.year)
                .await?
                .ok_or_else(|| ApiError::NotFound("Plan".to_string()))
        }
        Outcome::Ignored { .. } => Err(ApiError::MissingField("epsa, year".to_string())),
        Outcome::Rejected { errors } => Err(ApiError::Validation(errors)),
    }
}

pub async fn create_or_update_sarh(storage: &dyn Storage, item: Value) -> Result<Sarh> {
    let epsa_code = item.get("epsa").and_then(Value::as_str).map(str::to_string);
    match upsert_sarh(storage, item).await? {
        Outcome::Created(v) | Outcome::Updated(v) => {
            ensure_epsa(storage, epsa_code.as_deref()).await?;
            let sarh: Sarh = serde_json::from_value(v)?;
            storage
                .get_sarh(&sarh.sarh_id)
                .await?
                .ok_or_else(|| ApiError::NotFound("SARH".to_string()))
        }
        Outcome::Ignored { .. } => Err(ApiError::MissingField("sarh_id".to_string())),
        Outcome::Rejected { errors } => Err(ApiError::Validation(errors)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::sqlite::SqliteStorage;
    use serde_json::json;

    fn storage() -> SqliteStorage {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.run_migrations().unwrap();
        storage
    }

    #[tokio::test]
    async fn creates_then_updates_on_same_key() {
        let st = storage();
        let outcomes = upsert_epsas(
            &st,
            vec![
                json!({ "code": "AAPOS", "category": "A" }),
                json!({ "code": "EPSAS", "category": "A" }),
            ],
        )
        .await
        .unwrap();
        assert_eq!(outcomes.iter().map(Outcome::tag).collect::<Vec<_>>(), ["created", "created"]);

        let outcomes =
            upsert_epsas(&st, vec![json!({ "code": "AAPOS", "category": "B" })]).await.unwrap();
        assert_eq!(outcomes[0].tag(), "updated");
        let epsa = st.get_epsa("AAPOS").await.unwrap().unwrap();
        assert_eq!(epsa.category.as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn missing_and_blank_keys_are_ignored() {
        let st = storage();
        let outcomes = upsert_epsas(
            &st,
            vec![json!({ "name": "no code here" }), json!({ "code": "  " })],
        )
        .await
        .unwrap();
        assert!(matches!(
            outcomes[0],
            Outcome::Ignored { reason: IgnoreReason::MissingKey }
        ));
        assert!(matches!(
            outcomes[1],
            Outcome::Ignored { reason: IgnoreReason::BlankKey }
        ));
    }

    #[tokio::test]
    async fn malformed_records_are_rejected_not_dropped() {
        let st = storage();
        let outcomes = upsert_epsas(
            &st,
            vec![
                json!({ "code": "OK1" }),
                json!({ "code": "BAD", "category": "Z" }),
                json!("not an object"),
            ],
        )
        .await
        .unwrap();
        assert_eq!(
            outcomes.iter().map(Outcome::tag).collect::<Vec<_>>(),
            ["created", "rejected", "rejected"]
        );
        // the bad record did not reach the store
        assert!(st.get_epsa("BAD").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failure_does_not_undo_earlier_records() {
        let st = storage();
        let outcomes = upsert_variables(
            &st,
            vec![
                json!({ "code": "vol_sup", "var_id": 1 }),
                json!({ "code": "vol_sub", "var_id": 1 }),
                json!({ "code": "vol_prod", "var_id": 3 }),
            ],
        )
        .await
        .unwrap();
        assert_eq!(
            outcomes.iter().map(Outcome::tag).collect::<Vec<_>>(),
            ["created", "rejected", "created"]
        );
        assert!(st.get_variable("vol_sup").await.unwrap().is_some());
        assert!(st.get_variable("vol_prod").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn report_upsert_keys_on_epsa_year_month() {
        let st = storage();
        let outcomes = upsert_reports(
            &st,
            vec![json!({ "epsa": "AAPOS", "year": 2017, "month": null, "v1": 10.0 })],
        )
        .await
        .unwrap();
        assert_eq!(outcomes[0].tag(), "created");

        // same tuple -> update; different month -> create
        let outcomes = upsert_reports(
            &st,
            vec![
                json!({ "epsa": "AAPOS", "year": 2017, "month": null, "v1": 20.0 }),
                json!({ "epsa": "AAPOS", "year": 2017, "month": 6, "v1": 30.0 }),
            ],
        )
        .await
        .unwrap();
        assert_eq!(
            outcomes.iter().map(Outcome::tag).collect::<Vec<_>>(),
            ["updated", "created"]
        );
        let annual = st.find_report(Some("AAPOS"), 2017, None).await.unwrap().unwrap();
        assert_eq!(annual.values[0], Some(20.0));
    }

    #[tokio::test]
    async fn report_without_month_key_is_ignored() {
        let st = storage();
        let outcomes =
            upsert_reports(&st, vec![json!({ "epsa": "AAPOS", "year": 2017 })]).await.unwrap();
        assert!(matches!(
            outcomes[0],
            Outcome::Ignored { reason: IgnoreReason::MissingKey }
        ));
    }

    #[tokio::test]
    async fn sarh_children_are_replaced_per_parent() {
        let st = storage();
        upsert_sarhs(
            &st,
            vec![json!({
                "sarh_id": "S-1",
                "tecnical_sub": [
                    { "year": 2015, "aforo": 1.0 },
                    { "year": 2016, "aforo": 2.0 }
                ]
            })],
        )
        .await
        .unwrap();
        let outcomes = upsert_sarhs(
            &st,
            vec![json!({
                "sarh_id": "S-1",
                "tecnical_sub": [ { "year": 2017, "aforo": 3.0 } ]
            })],
        )
        .await
        .unwrap();
        assert_eq!(outcomes[0].tag(), "updated");
        let sarh = st.get_sarh("S-1").await.unwrap().unwrap();
        let subs = sarh.tecnical_sub.unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].year, 2017);
    }

    #[tokio::test]
    async fn sarh_children_survive_update_without_collection() {
        let st = storage();
        upsert_sarhs(
            &st,
            vec![json!({
                "sarh_id": "S-2",
                "tecnical_sup": [ { "year": 2018, "caudal_eco": 0.5 } ]
            })],
        )
        .await
        .unwrap();
        upsert_sarhs(&st, vec![json!({ "sarh_id": "S-2", "municipality": "EL ALTO" })])
            .await
            .unwrap();
        let sarh = st.get_sarh("S-2").await.unwrap().unwrap();
        assert_eq!(sarh.municipality.as_deref(), Some("EL ALTO"));
        assert_eq!(sarh.tecnical_sup.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn poa_with_both_expense_sheets_is_rejected() {
        let st = storage();
        let outcomes = upsert_poas(
            &st,
            vec![json!({
                "epsa": "SAGUAPAC", "year": 2019, "order": 1,
                "coop_expense": { "costos_operacion": 1.0 },
                "muni_expense": { "gastos_otros": 1.0 }
            })],
        )
        .await
        .unwrap();
        assert_eq!(outcomes[0].tag(), "rejected");
    }

    #[tokio::test]
    async fn plan_goals_are_replaced_on_upsert() {
        let st = storage();
        upsert_plans(
            &st,
            vec![json!({
                "epsa": "AAPOS", "year": 2018, "plan_type": "ptds",
                "goals": [
                    { "year": 2019, "description": "cobertura AP", "value": 90.0, "unit": "%" },
                    { "year": 2020, "description": "cobertura AP", "value": 95.0, "unit": "%" }
                ]
            })],
        )
        .await
        .unwrap();
        let outcomes = upsert_plans(
            &st,
            vec![json!({
                "epsa": "AAPOS", "year": 2018,
                "goals": [
                    { "year": 2021, "description": "micromedición", "value": 80.0, "unit": "%" }
                ]
            })],
        )
        .await
        .unwrap();
        assert_eq!(outcomes[0].tag(), "updated");
        let plan = st.find_plan("AAPOS", 2018).await.unwrap().unwrap();
        let goals = plan.goals.unwrap();
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].description, "micromedición");
    }

    #[tokio::test]
    async fn single_create_registers_unknown_epsa() {
        let st = storage();
        let sarh = create_or_update_sarh(
            &st,
            json!({ "sarh_id": "S-9", "epsa": "NUEVA" }),
        )
        .await
        .unwrap();
        assert_eq!(sarh.sarh_id, "S-9");
        assert!(st.get_epsa("NUEVA").await.unwrap().is_some());
    }
}

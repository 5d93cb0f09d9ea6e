//! SQLite-backed [`Storage`] implementation.
//!
//! One connection behind a mutex, schema applied from `migrations/` at
//! startup. Child collections (expense sheets, plan goals, technical data)
//! live in their own tables with `ON DELETE CASCADE` and are written inside
//! the parent's transaction. Report slots are persisted as a compact JSON
//! column.

use crate::domain::*;
use crate::error::{ApiError, Result};
use crate::storage::{
    EpsaFilter, IndicatorFilter, PlanFilter, PoaFilter, ReportFilter, SarhFilter, Storage,
    SupplyAreaFilter, VariableFilter,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(include_str!("../../migrations/001_init.sql"))?;
        info!("Database migrations applied");
        Ok(())
    }
}

fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_ts(raw: String) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw).ok().map(|d| d.with_timezone(&Utc))
}

fn date_str(date: &Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.to_string())
}

fn parse_date(raw: Option<String>) -> Option<NaiveDate> {
    raw.and_then(|s| s.parse().ok())
}

fn geom_str(geom: &Option<Geometry>) -> Result<Option<String>> {
    geom.as_ref().map(serde_json::to_string).transpose().map_err(Into::into)
}

fn parse_geom(raw: Option<String>) -> Option<Geometry> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
}

/// Accumulates `WHERE` clauses and their positional parameters for the
/// filterable list queries.
struct QueryBuilder {
    clauses: Vec<&'static str>,
    params: Vec<SqlValue>,
}

impl QueryBuilder {
    fn new() -> Self {
        Self { clauses: Vec::new(), params: Vec::new() }
    }

    fn push(&mut self, clause: &'static str, value: SqlValue) {
        self.clauses.push(clause);
        self.params.push(value);
    }

    fn text(&mut self, clause: &'static str, value: &Option<String>) {
        if let Some(v) = value {
            self.push(clause, SqlValue::Text(v.clone()));
        }
    }

    fn int(&mut self, clause: &'static str, value: Option<i64>) {
        if let Some(v) = value {
            self.push(clause, SqlValue::Integer(v));
        }
    }

    fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

fn epsa_from_row(row: &Row) -> rusqlite::Result<Epsa> {
    Ok(Epsa {
        code: row.get(0)?,
        name: row.get(1)?,
        state: row.get(2)?,
        category: row.get(3)?,
        modified: parse_ts(row.get::<_, String>(4)?),
    })
}

fn variable_from_row(row: &Row) -> rusqlite::Result<Variable> {
    Ok(Variable {
        code: row.get(0)?,
        var_id: row.get(1)?,
        name: row.get(2)?,
        unit: row.get(3)?,
        var_type: row.get(4)?,
        modified: parse_ts(row.get::<_, String>(5)?),
    })
}

fn indicator_from_row(row: &Row) -> rusqlite::Result<Indicator> {
    Ok(Indicator {
        code: row.get(0)?,
        ind_id: row.get(1)?,
        name: row.get(2)?,
        unit: row.get(3)?,
        criteria: row.get(4)?,
        par_min_a: row.get(5)?,
        par_min_b: row.get(6)?,
        par_min_c: row.get(7)?,
        par_min_d: row.get(8)?,
        par_max_a: row.get(9)?,
        par_max_b: row.get(10)?,
        par_max_c: row.get(11)?,
        par_max_d: row.get(12)?,
        modified: parse_ts(row.get::<_, String>(13)?),
    })
}

fn report_from_row(row: &Row) -> rusqlite::Result<VariableReport> {
    let mut report = VariableReport::default();
    report.id = row.get(0)?;
    report.epsa = row.get(1)?;
    report.year = row.get(2)?;
    report.month = row.get(3)?;
    let slots: String = row.get(4)?;
    if let Ok(value) = serde_json::from_str(&slots) {
        report.apply_slots_json(&value);
    }
    report.modified = parse_ts(row.get::<_, String>(5)?);
    Ok(report)
}

fn measurement_from_row(row: &Row) -> rusqlite::Result<IndicatorMeasurement> {
    let mut measurement = IndicatorMeasurement::default();
    measurement.id = row.get(0)?;
    measurement.epsa = row.get(1)?;
    measurement.year = row.get(2)?;
    measurement.month = row.get(3)?;
    let slots: String = row.get(4)?;
    if let Ok(value) = serde_json::from_str(&slots) {
        measurement.apply_slots_json(&value);
    }
    measurement.modified = parse_ts(row.get::<_, String>(5)?);
    Ok(measurement)
}

const POA_COLUMNS: &str = "id, epsa, year, \"order\", in_op_ap, in_op_alc, in_op_alc_pozo, \
     in_op_otros, in_financieros, in_no_op_otros, inv_infraestructura_ap, \
     inv_infraestructura_alc, inv_equipo, inv_diseno_estudio, inv_otros, pob_total, pob_ap, \
     pob_alc, con_ap, con_ap_total, cob_ap, con_alc, con_alc_total, cob_alc, cob_micro, anc, \
     modified";

fn poa_from_row(row: &Row) -> rusqlite::Result<Poa> {
    Ok(Poa {
        id: row.get(0)?,
        epsa: row.get(1)?,
        year: row.get(2)?,
        order: row.get(3)?,
        in_op_ap: row.get(4)?,
        in_op_alc: row.get(5)?,
        in_op_alc_pozo: row.get(6)?,
        in_op_otros: row.get(7)?,
        in_financieros: row.get(8)?,
        in_no_op_otros: row.get(9)?,
        inv_infraestructura_ap: row.get(10)?,
        inv_infraestructura_alc: row.get(11)?,
        inv_equipo: row.get(12)?,
        inv_diseno_estudio: row.get(13)?,
        inv_otros: row.get(14)?,
        pob_total: row.get(15)?,
        pob_ap: row.get(16)?,
        pob_alc: row.get(17)?,
        con_ap: row.get(18)?,
        con_ap_total: row.get(19)?,
        cob_ap: row.get(20)?,
        con_alc: row.get(21)?,
        con_alc_total: row.get(22)?,
        cob_alc: row.get(23)?,
        cob_micro: row.get(24)?,
        anc: row.get(25)?,
        coop_expense: None,
        muni_expense: None,
        modified: parse_ts(row.get::<_, String>(26)?),
    })
}

fn load_poa_expenses(conn: &Connection, poa: &mut Poa) -> rusqlite::Result<()> {
    let id = match poa.id {
        Some(id) => id,
        None => return Ok(()),
    };
    poa.coop_expense = conn
        .query_row(
            "SELECT costos_operacion, costos_mantenimiento, gastos_administrativos, \
             gastos_comerciales, gastos_financieros FROM poa_coop_expenses WHERE poa_id = ?1",
            params![id],
            |row| {
                Ok(CoopExpense {
                    costos_operacion: row.get(0)?,
                    costos_mantenimiento: row.get(1)?,
                    gastos_administrativos: row.get(2)?,
                    gastos_comerciales: row.get(3)?,
                    gastos_financieros: row.get(4)?,
                })
            },
        )
        .optional()?;
    poa.muni_expense = conn
        .query_row(
            "SELECT gastos_empleados_permanentes, gastos_empleados_no_permanentes, \
             gastos_prevision_social, gastos_servicio_no_personales, gastos_materiales, \
             gastos_activos, gastos_deuda_publica, gastos_transferencias, gastos_impuesto, \
             gastos_otros FROM poa_muni_expenses WHERE poa_id = ?1",
            params![id],
            |row| {
                Ok(MuniExpense {
                    gastos_empleados_permanentes: row.get(0)?,
                    gastos_empleados_no_permanentes: row.get(1)?,
                    gastos_prevision_social: row.get(2)?,
                    gastos_servicio_no_personales: row.get(3)?,
                    gastos_materiales: row.get(4)?,
                    gastos_activos: row.get(5)?,
                    gastos_deuda_publica: row.get(6)?,
                    gastos_transferencias: row.get(7)?,
                    gastos_impuesto: row.get(8)?,
                    gastos_otros: row.get(9)?,
                })
            },
        )
        .optional()?;
    Ok(())
}

fn insert_coop_expense(conn: &Connection, poa_id: i64, e: &CoopExpense) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO poa_coop_expenses (poa_id, costos_operacion, costos_mantenimiento, \
         gastos_administrativos, gastos_comerciales, gastos_financieros) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            poa_id,
            e.costos_operacion,
            e.costos_mantenimiento,
            e.gastos_administrativos,
            e.gastos_comerciales,
            e.gastos_financieros
        ],
    )?;
    Ok(())
}

fn insert_muni_expense(conn: &Connection, poa_id: i64, e: &MuniExpense) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO poa_muni_expenses (poa_id, gastos_empleados_permanentes, \
         gastos_empleados_no_permanentes, gastos_prevision_social, \
         gastos_servicio_no_personales, gastos_materiales, gastos_activos, \
         gastos_deuda_publica, gastos_transferencias, gastos_impuesto, gastos_otros) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            poa_id,
            e.gastos_empleados_permanentes,
            e.gastos_empleados_no_permanentes,
            e.gastos_prevision_social,
            e.gastos_servicio_no_personales,
            e.gastos_materiales,
            e.gastos_activos,
            e.gastos_deuda_publica,
            e.gastos_transferencias,
            e.gastos_impuesto,
            e.gastos_otros
        ],
    )?;
    Ok(())
}

/// Replace whatever expense sheet the POA currently has with the ones the
/// payload carries. A POA switching from one sheet type to the other loses
/// the old sheet.
fn replace_poa_expenses(conn: &Connection, poa_id: i64, poa: &Poa) -> rusqlite::Result<()> {
    if poa.coop_expense.is_none() && poa.muni_expense.is_none() {
        return Ok(());
    }
    conn.execute("DELETE FROM poa_coop_expenses WHERE poa_id = ?1", params![poa_id])?;
    conn.execute("DELETE FROM poa_muni_expenses WHERE poa_id = ?1", params![poa_id])?;
    if let Some(coop) = &poa.coop_expense {
        insert_coop_expense(conn, poa_id, coop)?;
    }
    if let Some(muni) = &poa.muni_expense {
        insert_muni_expense(conn, poa_id, muni)?;
    }
    Ok(())
}

fn plan_from_row(row: &Row) -> rusqlite::Result<Plan> {
    let plan_type: String = row.get(3)?;
    Ok(Plan {
        id: row.get(0)?,
        epsa: row.get(1)?,
        year: row.get(2)?,
        plan_type: if plan_type == "ptds" { PlanType::Ptds } else { PlanType::Pdq },
        goals: None,
        modified: parse_ts(row.get::<_, String>(4)?),
    })
}

fn plan_type_str(plan_type: PlanType) -> &'static str {
    match plan_type {
        PlanType::Pdq => "pdq",
        PlanType::Ptds => "ptds",
    }
}

fn load_plan_goals(conn: &Connection, plan: &mut Plan) -> rusqlite::Result<()> {
    let id = match plan.id {
        Some(id) => id,
        None => return Ok(()),
    };
    let mut stmt = conn.prepare(
        "SELECT year, description, value, val_description, unit FROM plan_goals \
         WHERE plan_id = ?1 ORDER BY id",
    )?;
    let goals = stmt
        .query_map(params![id], |row| {
            Ok(PlanGoal {
                year: row.get(0)?,
                description: row.get(1)?,
                value: row.get(2)?,
                val_description: row.get(3)?,
                unit: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    plan.goals = Some(goals);
    Ok(())
}

fn insert_plan_goals(conn: &Connection, plan_id: i64, goals: &[PlanGoal]) -> rusqlite::Result<()> {
    for goal in goals {
        conn.execute(
            "INSERT INTO plan_goals (plan_id, year, description, value, val_description, unit) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![plan_id, goal.year, goal.description, goal.value, goal.val_description, goal.unit],
        )?;
    }
    Ok(())
}

const SARH_COLUMNS: &str = "sarh_id, folder_code, epsa, user, sub_subt, reg_renov, rar_aaps_nr, \
     rar_date, notification_date, user_notification_date, auth_year, renovation_alert, \
     auth_certificate_state, state, municipality, industry_type, use_description, \
     form_extraction_volume, authorized_streamflow, anual_volume, sarh_denom, \
     active_inactive_sealed, x, y, z, zone, source_nr, discharge_place, ph, conductivity, \
     turbidity, iron, manganese, od, langelie, observations, lat, lon, geom, modified";

fn sarh_from_row(row: &Row) -> rusqlite::Result<Sarh> {
    Ok(Sarh {
        sarh_id: row.get(0)?,
        folder_code: row.get(1)?,
        epsa: row.get(2)?,
        user: row.get(3)?,
        sub_subt: row.get(4)?,
        reg_renov: row.get(5)?,
        rar_aaps_nr: row.get(6)?,
        rar_date: parse_date(row.get(7)?),
        notification_date: parse_date(row.get(8)?),
        user_notification_date: parse_date(row.get(9)?),
        auth_year: row.get(10)?,
        renovation_alert: row.get(11)?,
        auth_certificate_state: row.get(12)?,
        state: row.get(13)?,
        municipality: row.get(14)?,
        industry_type: row.get(15)?,
        use_description: row.get(16)?,
        form_extraction_volume: row.get(17)?,
        authorized_streamflow: row.get(18)?,
        anual_volume: row.get(19)?,
        sarh_denom: row.get(20)?,
        active_inactive_sealed: row.get(21)?,
        x: row.get(22)?,
        y: row.get(23)?,
        z: row.get(24)?,
        zone: row.get(25)?,
        source_nr: row.get(26)?,
        discharge_place: row.get(27)?,
        ph: row.get(28)?,
        conductivity: row.get(29)?,
        turbidity: row.get(30)?,
        iron: row.get(31)?,
        manganese: row.get(32)?,
        od: row.get(33)?,
        langelie: row.get(34)?,
        observations: row.get(35)?,
        lat: row.get(36)?,
        lon: row.get(37)?,
        geom: parse_geom(row.get(38)?),
        tecnical_sub: None,
        tecnical_sup: None,
        modified: parse_ts(row.get::<_, String>(39)?),
    })
}

fn load_sarh_children(conn: &Connection, sarh: &mut Sarh) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(
        "SELECT detalle, year, tiene_medidor, vol_extraido_promedio, aforo, nivel_estatico, \
         nivel_dinamico, caudal_optimo FROM sarh_tecnical_sub WHERE sarh_id = ?1 ORDER BY id",
    )?;
    let subs = stmt
        .query_map(params![sarh.sarh_id], |row| {
            Ok(TecnicalDataSub {
                detalle: row.get(0)?,
                year: row.get(1)?,
                tiene_medidor: row.get(2)?,
                vol_extraido_promedio: row.get(3)?,
                aforo: row.get(4)?,
                nivel_estatico: row.get(5)?,
                nivel_dinamico: row.get(6)?,
                caudal_optimo: row.get(7)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    sarh.tecnical_sub = Some(subs);

    let mut stmt = conn.prepare(
        "SELECT detalle, year, tiene_medidor, vol_extraido_promedio, caudal_lluvia, \
         caudal_estiaje, caudal_medio_anual, caudal_eco FROM sarh_tecnical_sup \
         WHERE sarh_id = ?1 ORDER BY id",
    )?;
    let sups = stmt
        .query_map(params![sarh.sarh_id], |row| {
            Ok(TecnicalDataSup {
                detalle: row.get(0)?,
                year: row.get(1)?,
                tiene_medidor: row.get(2)?,
                vol_extraido_promedio: row.get(3)?,
                caudal_lluvia: row.get(4)?,
                caudal_estiaje: row.get(5)?,
                caudal_medio_anual: row.get(6)?,
                caudal_eco: row.get(7)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    sarh.tecnical_sup = Some(sups);
    Ok(())
}

fn replace_sarh_children(conn: &Connection, sarh: &Sarh) -> rusqlite::Result<()> {
    if let Some(subs) = &sarh.tecnical_sub {
        conn.execute("DELETE FROM sarh_tecnical_sub WHERE sarh_id = ?1", params![sarh.sarh_id])?;
        for sub in subs {
            conn.execute(
                "INSERT INTO sarh_tecnical_sub (sarh_id, detalle, year, tiene_medidor, \
                 vol_extraido_promedio, aforo, nivel_estatico, nivel_dinamico, caudal_optimo) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    sarh.sarh_id,
                    sub.detalle,
                    sub.year,
                    sub.tiene_medidor,
                    sub.vol_extraido_promedio,
                    sub.aforo,
                    sub.nivel_estatico,
                    sub.nivel_dinamico,
                    sub.caudal_optimo
                ],
            )?;
        }
    }
    if let Some(sups) = &sarh.tecnical_sup {
        conn.execute("DELETE FROM sarh_tecnical_sup WHERE sarh_id = ?1", params![sarh.sarh_id])?;
        for sup in sups {
            conn.execute(
                "INSERT INTO sarh_tecnical_sup (sarh_id, detalle, year, tiene_medidor, \
                 vol_extraido_promedio, caudal_lluvia, caudal_estiaje, caudal_medio_anual, \
                 caudal_eco) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    sarh.sarh_id,
                    sup.detalle,
                    sup.year,
                    sup.tiene_medidor,
                    sup.vol_extraido_promedio,
                    sup.caudal_lluvia,
                    sup.caudal_estiaje,
                    sup.caudal_medio_anual,
                    sup.caudal_eco
                ],
            )?;
        }
    }
    Ok(())
}

fn supply_area_from_row(row: &Row) -> rusqlite::Result<SupplyArea> {
    Ok(SupplyArea {
        id: row.get(0)?,
        epsa: row.get(1)?,
        geom: parse_geom(row.get(2)?),
        modified: parse_ts(row.get::<_, String>(3)?),
    })
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn list_epsas(&self, filter: &EpsaFilter) -> Result<Vec<Epsa>> {
        let conn = self.conn.lock().unwrap();
        let mut qb = QueryBuilder::new();
        qb.text("code = ?", &filter.code);
        qb.text("state = ?", &filter.state);
        qb.text("category = ?", &filter.category);
        let sql = format!(
            "SELECT code, name, state, category, modified FROM epsas{} ORDER BY category, code",
            qb.where_clause()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(qb.params), epsa_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    async fn get_epsa(&self, code: &str) -> Result<Option<Epsa>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                "SELECT code, name, state, category, modified FROM epsas WHERE code = ?1",
                params![code],
                epsa_from_row,
            )
            .optional()?)
    }

    async fn create_epsa(&self, epsa: &mut Epsa) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let modified = Utc::now();
        conn.execute(
            "INSERT INTO epsas (code, name, state, category, modified) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![epsa.code, epsa.name, epsa.state, epsa.category, ts(&modified)],
        )?;
        epsa.modified = Some(modified);
        Ok(())
    }

    async fn update_epsa(&self, code: &str, epsa: &mut Epsa) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let modified = Utc::now();
        let affected = conn.execute(
            "UPDATE epsas SET code = ?1, name = ?2, state = ?3, category = ?4, modified = ?5 \
             WHERE code = ?6",
            params![epsa.code, epsa.name, epsa.state, epsa.category, ts(&modified), code],
        )?;
        if affected == 0 {
            return Err(ApiError::NotFound("EPSA".to_string()));
        }
        epsa.modified = Some(modified);
        Ok(())
    }

    async fn delete_epsa(&self, code: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.execute("DELETE FROM epsas WHERE code = ?1", params![code])? > 0)
    }

    async fn list_variables(&self, filter: &VariableFilter) -> Result<Vec<Variable>> {
        let conn = self.conn.lock().unwrap();
        let mut qb = QueryBuilder::new();
        qb.text("code = ?", &filter.code);
        qb.int("var_id = ?", filter.var_id.map(i64::from));
        let sql = format!(
            "SELECT code, var_id, name, unit, var_type, modified FROM variables{} ORDER BY var_id",
            qb.where_clause()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(qb.params), variable_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    async fn get_variable(&self, code: &str) -> Result<Option<Variable>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                "SELECT code, var_id, name, unit, var_type, modified FROM variables \
                 WHERE code = ?1",
                params![code],
                variable_from_row,
            )
            .optional()?)
    }

    async fn get_variable_by_var_id(&self, var_id: u32) -> Result<Option<Variable>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                "SELECT code, var_id, name, unit, var_type, modified FROM variables \
                 WHERE var_id = ?1",
                params![var_id],
                variable_from_row,
            )
            .optional()?)
    }

    async fn create_variable(&self, variable: &mut Variable) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let modified = Utc::now();
        conn.execute(
            "INSERT INTO variables (code, var_id, name, unit, var_type, modified) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                variable.code,
                variable.var_id,
                variable.name,
                variable.unit,
                variable.var_type,
                ts(&modified)
            ],
        )?;
        variable.modified = Some(modified);
        Ok(())
    }

    async fn update_variable(&self, code: &str, variable: &mut Variable) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let modified = Utc::now();
        let affected = conn.execute(
            "UPDATE variables SET code = ?1, var_id = ?2, name = ?3, unit = ?4, var_type = ?5, \
             modified = ?6 WHERE code = ?7",
            params![
                variable.code,
                variable.var_id,
                variable.name,
                variable.unit,
                variable.var_type,
                ts(&modified),
                code
            ],
        )?;
        if affected == 0 {
            return Err(ApiError::NotFound("Variable".to_string()));
        }
        variable.modified = Some(modified);
        Ok(())
    }

    async fn delete_variable(&self, code: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.execute("DELETE FROM variables WHERE code = ?1", params![code])? > 0)
    }

    async fn list_indicators(&self, filter: &IndicatorFilter) -> Result<Vec<Indicator>> {
        let conn = self.conn.lock().unwrap();
        let mut qb = QueryBuilder::new();
        qb.text("code = ?", &filter.code);
        qb.int("ind_id = ?", filter.ind_id.map(i64::from));
        let sql = format!(
            "SELECT code, ind_id, name, unit, criteria, par_min_a, par_min_b, par_min_c, \
             par_min_d, par_max_a, par_max_b, par_max_c, par_max_d, modified FROM indicators{} \
             ORDER BY ind_id",
            qb.where_clause()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(qb.params), indicator_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    async fn get_indicator(&self, code: &str) -> Result<Option<Indicator>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                "SELECT code, ind_id, name, unit, criteria, par_min_a, par_min_b, par_min_c, \
                 par_min_d, par_max_a, par_max_b, par_max_c, par_max_d, modified \
                 FROM indicators WHERE code = ?1",
                params![code],
                indicator_from_row,
            )
            .optional()?)
    }

    async fn get_indicator_by_ind_id(&self, ind_id: u32) -> Result<Option<Indicator>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                "SELECT code, ind_id, name, unit, criteria, par_min_a, par_min_b, par_min_c, \
                 par_min_d, par_max_a, par_max_b, par_max_c, par_max_d, modified \
                 FROM indicators WHERE ind_id = ?1",
                params![ind_id],
                indicator_from_row,
            )
            .optional()?)
    }

    async fn create_indicator(&self, indicator: &mut Indicator) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let modified = Utc::now();
        conn.execute(
            "INSERT INTO indicators (code, ind_id, name, unit, criteria, par_min_a, par_min_b, \
             par_min_c, par_min_d, par_max_a, par_max_b, par_max_c, par_max_d, modified) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                indicator.code,
                indicator.ind_id,
                indicator.name,
                indicator.unit,
                indicator.criteria,
                indicator.par_min_a,
                indicator.par_min_b,
                indicator.par_min_c,
                indicator.par_min_d,
                indicator.par_max_a,
                indicator.par_max_b,
                indicator.par_max_c,
                indicator.par_max_d,
                ts(&modified)
            ],
        )?;
        indicator.modified = Some(modified);
        Ok(())
    }

    async fn update_indicator(&self, code: &str, indicator: &mut Indicator) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let modified = Utc::now();
        let affected = conn.execute(
            "UPDATE indicators SET code = ?1, ind_id = ?2, name = ?3, unit = ?4, criteria = ?5, \
             par_min_a = ?6, par_min_b = ?7, par_min_c = ?8, par_min_d = ?9, par_max_a = ?10, \
             par_max_b = ?11, par_max_c = ?12, par_max_d = ?13, modified = ?14 WHERE code = ?15",
            params![
                indicator.code,
                indicator.ind_id,
                indicator.name,
                indicator.unit,
                indicator.criteria,
                indicator.par_min_a,
                indicator.par_min_b,
                indicator.par_min_c,
                indicator.par_min_d,
                indicator.par_max_a,
                indicator.par_max_b,
                indicator.par_max_c,
                indicator.par_max_d,
                ts(&modified),
                code
            ],
        )?;
        if affected == 0 {
            return Err(ApiError::NotFound("Indicator".to_string()));
        }
        indicator.modified = Some(modified);
        Ok(())
    }

    async fn delete_indicator(&self, code: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.execute("DELETE FROM indicators WHERE code = ?1", params![code])? > 0)
    }

    async fn list_reports(&self, filter: &ReportFilter) -> Result<Vec<VariableReport>> {
        let conn = self.conn.lock().unwrap();
        let mut qb = QueryBuilder::new();
        qb.text("epsa = ?", &filter.epsa);
        qb.int("year = ?", filter.year.map(i64::from));
        qb.int("month = ?", filter.month.map(i64::from));
        let sql = format!(
            "SELECT id, epsa, year, month, slots, modified FROM variable_reports{} \
             ORDER BY epsa, year, month",
            qb.where_clause()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(qb.params), report_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    async fn get_report(&self, id: i64) -> Result<Option<VariableReport>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                "SELECT id, epsa, year, month, slots, modified FROM variable_reports \
                 WHERE id = ?1",
                params![id],
                report_from_row,
            )
            .optional()?)
    }

    async fn find_report(
        &self,
        epsa: Option<&str>,
        year: i32,
        month: Option<i32>,
    ) -> Result<Option<VariableReport>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                "SELECT id, epsa, year, month, slots, modified FROM variable_reports \
                 WHERE epsa IS ?1 AND year = ?2 AND month IS ?3",
                params![epsa, year, month],
                report_from_row,
            )
            .optional()?)
    }

    async fn create_report(&self, report: &mut VariableReport) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let modified = Utc::now();
        conn.execute(
            "INSERT INTO variable_reports (epsa, year, month, slots, modified) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                report.epsa,
                report.year,
                report.month,
                report.slots_to_json().to_string(),
                ts(&modified)
            ],
        )?;
        report.id = Some(conn.last_insert_rowid());
        report.modified = Some(modified);
        Ok(())
    }

    async fn update_report(&self, report: &mut VariableReport) -> Result<()> {
        let id = report.id.ok_or_else(|| ApiError::MissingField("id".to_string()))?;
        let conn = self.conn.lock().unwrap();
        let modified = Utc::now();
        let affected = conn.execute(
            "UPDATE variable_reports SET epsa = ?1, year = ?2, month = ?3, slots = ?4, \
             modified = ?5 WHERE id = ?6",
            params![
                report.epsa,
                report.year,
                report.month,
                report.slots_to_json().to_string(),
                ts(&modified),
                id
            ],
        )?;
        if affected == 0 {
            return Err(ApiError::NotFound("Variable report".to_string()));
        }
        report.modified = Some(modified);
        Ok(())
    }

    async fn delete_report(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.execute("DELETE FROM variable_reports WHERE id = ?1", params![id])? > 0)
    }

    async fn list_measurements(&self, filter: &ReportFilter) -> Result<Vec<IndicatorMeasurement>> {
        let conn = self.conn.lock().unwrap();
        let mut qb = QueryBuilder::new();
        qb.text("epsa = ?", &filter.epsa);
        qb.int("year = ?", filter.year.map(i64::from));
        qb.int("month = ?", filter.month.map(i64::from));
        let sql = format!(
            "SELECT id, epsa, year, month, slots, modified FROM indicator_measurements{} \
             ORDER BY epsa, year, month",
            qb.where_clause()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(qb.params), measurement_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    async fn get_measurement(&self, id: i64) -> Result<Option<IndicatorMeasurement>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                "SELECT id, epsa, year, month, slots, modified FROM indicator_measurements \
                 WHERE id = ?1",
                params![id],
                measurement_from_row,
            )
            .optional()?)
    }

    async fn find_measurement(
        &self,
        epsa: Option<&str>,
        year: i32,
        month: Option<i32>,
    ) -> Result<Option<IndicatorMeasurement>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                "SELECT id, epsa, year, month, slots, modified FROM indicator_measurements \
                 WHERE epsa IS ?1 AND year = ?2 AND month IS ?3",
                params![epsa, year, month],
                measurement_from_row,
            )
            .optional()?)
    }

    async fn create_measurement(&self, measurement: &mut IndicatorMeasurement) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let modified = Utc::now();
        conn.execute(
            "INSERT INTO indicator_measurements (epsa, year, month, slots, modified) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                measurement.epsa,
                measurement.year,
                measurement.month,
                measurement.slots_to_json().to_string(),
                ts(&modified)
            ],
        )?;
        measurement.id = Some(conn.last_insert_rowid());
        measurement.modified = Some(modified);
        Ok(())
    }

    async fn update_measurement(&self, measurement: &mut IndicatorMeasurement) -> Result<()> {
        let id = measurement.id.ok_or_else(|| ApiError::MissingField("id".to_string()))?;
        let conn = self.conn.lock().unwrap();
        let modified = Utc::now();
        let affected = conn.execute(
            "UPDATE indicator_measurements SET epsa = ?1, year = ?2, month = ?3, slots = ?4, \
             modified = ?5 WHERE id = ?6",
            params![
                measurement.epsa,
                measurement.year,
                measurement.month,
                measurement.slots_to_json().to_string(),
                ts(&modified),
                id
            ],
        )?;
        if affected == 0 {
            return Err(ApiError::NotFound("Indicator measurement".to_string()));
        }
        measurement.modified = Some(modified);
        Ok(())
    }

    async fn delete_measurement(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.execute("DELETE FROM indicator_measurements WHERE id = ?1", params![id])? > 0)
    }

    async fn list_poas(&self, filter: &PoaFilter) -> Result<Vec<Poa>> {
        let conn = self.conn.lock().unwrap();
        let mut qb = QueryBuilder::new();
        qb.text("epsa = ?", &filter.epsa);
        qb.int("year = ?", filter.year.map(i64::from));
        qb.int("\"order\" = ?", filter.order.map(i64::from));
        let sql = format!(
            "SELECT {POA_COLUMNS} FROM poas{} ORDER BY epsa, year, \"order\"",
            qb.where_clause()
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut poas = stmt
            .query_map(params_from_iter(qb.params), poa_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for poa in &mut poas {
            load_poa_expenses(&conn, poa)?;
        }
        Ok(poas)
    }

    async fn get_poa(&self, id: i64) -> Result<Option<Poa>> {
        let conn = self.conn.lock().unwrap();
        let poa = conn
            .query_row(
                &format!("SELECT {POA_COLUMNS} FROM poas WHERE id = ?1"),
                params![id],
                poa_from_row,
            )
            .optional()?;
        match poa {
            Some(mut poa) => {
                load_poa_expenses(&conn, &mut poa)?;
                Ok(Some(poa))
            }
            None => Ok(None),
        }
    }

    async fn find_poa(&self, epsa: &str, year: i32, order: i32) -> Result<Option<Poa>> {
        let conn = self.conn.lock().unwrap();
        let poa = conn
            .query_row(
                &format!(
                    "SELECT {POA_COLUMNS} FROM poas WHERE epsa = ?1 AND year = ?2 \
                     AND \"order\" = ?3"
                ),
                params![epsa, year, order],
                poa_from_row,
            )
            .optional()?;
        match poa {
            Some(mut poa) => {
                load_poa_expenses(&conn, &mut poa)?;
                Ok(Some(poa))
            }
            None => Ok(None),
        }
    }

    async fn create_poa(&self, poa: &mut Poa) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let modified = Utc::now();
        tx.execute(
            "INSERT INTO poas (epsa, year, \"order\", in_op_ap, in_op_alc, in_op_alc_pozo, \
             in_op_otros, in_financieros, in_no_op_otros, inv_infraestructura_ap, \
             inv_infraestructura_alc, inv_equipo, inv_diseno_estudio, inv_otros, pob_total, \
             pob_ap, pob_alc, con_ap, con_ap_total, cob_ap, con_alc, con_alc_total, cob_alc, \
             cob_micro, anc, modified) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, \
             ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26)",
            params![
                poa.epsa,
                poa.year,
                poa.order,
                poa.in_op_ap,
                poa.in_op_alc,
                poa.in_op_alc_pozo,
                poa.in_op_otros,
                poa.in_financieros,
                poa.in_no_op_otros,
                poa.inv_infraestructura_ap,
                poa.inv_infraestructura_alc,
                poa.inv_equipo,
                poa.inv_diseno_estudio,
                poa.inv_otros,
                poa.pob_total,
                poa.pob_ap,
                poa.pob_alc,
                poa.con_ap,
                poa.con_ap_total,
                poa.cob_ap,
                poa.con_alc,
                poa.con_alc_total,
                poa.cob_alc,
                poa.cob_micro,
                poa.anc,
                ts(&modified)
            ],
        )?;
        let id = tx.last_insert_rowid();
        replace_poa_expenses(&tx, id, poa)?;
        tx.commit()?;
        poa.id = Some(id);
        poa.modified = Some(modified);
        Ok(())
    }

    async fn update_poa(&self, poa: &mut Poa) -> Result<()> {
        let id = poa.id.ok_or_else(|| ApiError::MissingField("id".to_string()))?;
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let modified = Utc::now();
        let affected = tx.execute(
            "UPDATE poas SET epsa = ?1, year = ?2, \"order\" = ?3, in_op_ap = ?4, \
             in_op_alc = ?5, in_op_alc_pozo = ?6, in_op_otros = ?7, in_financieros = ?8, \
             in_no_op_otros = ?9, inv_infraestructura_ap = ?10, inv_infraestructura_alc = ?11, \
             inv_equipo = ?12, inv_diseno_estudio = ?13, inv_otros = ?14, pob_total = ?15, \
             pob_ap = ?16, pob_alc = ?17, con_ap = ?18, con_ap_total = ?19, cob_ap = ?20, \
             con_alc = ?21, con_alc_total = ?22, cob_alc = ?23, cob_micro = ?24, anc = ?25, \
             modified = ?26 WHERE id = ?27",
            params![
                poa.epsa,
                poa.year,
                poa.order,
                poa.in_op_ap,
                poa.in_op_alc,
                poa.in_op_alc_pozo,
                poa.in_op_otros,
                poa.in_financieros,
                poa.in_no_op_otros,
                poa.inv_infraestructura_ap,
                poa.inv_infraestructura_alc,
                poa.inv_equipo,
                poa.inv_diseno_estudio,
                poa.inv_otros,
                poa.pob_total,
                poa.pob_ap,
                poa.pob_alc,
                poa.con_ap,
                poa.con_ap_total,
                poa.cob_ap,
                poa.con_alc,
                poa.con_alc_total,
                poa.cob_alc,
                poa.cob_micro,
                poa.anc,
                ts(&modified),
                id
            ],
        )?;
        if affected == 0 {
            return Err(ApiError::NotFound("POA".to_string()));
        }
        replace_poa_expenses(&tx, id, poa)?;
        tx.commit()?;
        poa.modified = Some(modified);
        Ok(())
    }

    async fn delete_poa(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.execute("DELETE FROM poas WHERE id = ?1", params![id])? > 0)
    }

    async fn list_plans(&self, filter: &PlanFilter) -> Result<Vec<Plan>> {
        let conn = self.conn.lock().unwrap();
        let mut qb = QueryBuilder::new();
        qb.text("epsa = ?", &filter.epsa);
        qb.int("year = ?", filter.year.map(i64::from));
        qb.text("plan_type = ?", &filter.plan_type);
        let sql = format!(
            "SELECT id, epsa, year, plan_type, modified FROM plans{} ORDER BY epsa, year",
            qb.where_clause()
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut plans = stmt
            .query_map(params_from_iter(qb.params), plan_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for plan in &mut plans {
            load_plan_goals(&conn, plan)?;
        }
        Ok(plans)
    }

    async fn get_plan(&self, id: i64) -> Result<Option<Plan>> {
        let conn = self.conn.lock().unwrap();
        let plan = conn
            .query_row(
                "SELECT id, epsa, year, plan_type, modified FROM plans WHERE id = ?1",
                params![id],
                plan_from_row,
            )
            .optional()?;
        match plan {
            Some(mut plan) => {
                load_plan_goals(&conn, &mut plan)?;
                Ok(Some(plan))
            }
            None => Ok(None),
        }
    }

    async fn find_plan(&self, epsa: &str, year: i32) -> Result<Option<Plan>> {
        let conn = self.conn.lock().unwrap();
        let plan = conn
            .query_row(
                "SELECT id, epsa, year, plan_type, modified FROM plans \
                 WHERE epsa = ?1 AND year = ?2",
                params![epsa, year],
                plan_from_row,
            )
            .optional()?;
        match plan {
            Some(mut plan) => {
                load_plan_goals(&conn, &mut plan)?;
                Ok(Some(plan))
            }
            None => Ok(None),
        }
    }

    async fn create_plan(&self, plan: &mut Plan) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let modified = Utc::now();
        tx.execute(
            "INSERT INTO plans (epsa, year, plan_type, modified) VALUES (?1, ?2, ?3, ?4)",
            params![plan.epsa, plan.year, plan_type_str(plan.plan_type), ts(&modified)],
        )?;
        let id = tx.last_insert_rowid();
        if let Some(goals) = &plan.goals {
            insert_plan_goals(&tx, id, goals)?;
        }
        tx.commit()?;
        plan.id = Some(id);
        plan.modified = Some(modified);
        Ok(())
    }

    async fn update_plan(&self, plan: &mut Plan) -> Result<()> {
        let id = plan.id.ok_or_else(|| ApiError::MissingField("id".to_string()))?;
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let modified = Utc::now();
        let affected = tx.execute(
            "UPDATE plans SET epsa = ?1, year = ?2, plan_type = ?3, modified = ?4 WHERE id = ?5",
            params![plan.epsa, plan.year, plan_type_str(plan.plan_type), ts(&modified), id],
        )?;
        if affected == 0 {
            return Err(ApiError::NotFound("Plan".to_string()));
        }
        if let Some(goals) = &plan.goals {
            tx.execute("DELETE FROM plan_goals WHERE plan_id = ?1", params![id])?;
            insert_plan_goals(&tx, id, goals)?;
        }
        tx.commit()?;
        plan.modified = Some(modified);
        Ok(())
    }

    async fn delete_plan(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.execute("DELETE FROM plans WHERE id = ?1", params![id])? > 0)
    }

    async fn list_sarhs(&self, filter: &SarhFilter) -> Result<Vec<Sarh>> {
        let conn = self.conn.lock().unwrap();
        let mut qb = QueryBuilder::new();
        qb.text("epsa = ?", &filter.epsa);
        let sql = format!(
            "SELECT {SARH_COLUMNS} FROM sarhs{} ORDER BY epsa, user",
            qb.where_clause()
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut sarhs = stmt
            .query_map(params_from_iter(qb.params), sarh_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for sarh in &mut sarhs {
            load_sarh_children(&conn, sarh)?;
        }
        Ok(sarhs)
    }

    async fn get_sarh(&self, sarh_id: &str) -> Result<Option<Sarh>> {
        let conn = self.conn.lock().unwrap();
        let sarh = conn
            .query_row(
                &format!("SELECT {SARH_COLUMNS} FROM sarhs WHERE sarh_id = ?1"),
                params![sarh_id],
                sarh_from_row,
            )
            .optional()?;
        match sarh {
            Some(mut sarh) => {
                load_sarh_children(&conn, &mut sarh)?;
                Ok(Some(sarh))
            }
            None => Ok(None),
        }
    }

    async fn create_sarh(&self, sarh: &mut Sarh) -> Result<()> {
        let geom = geom_str(&sarh.geom)?;
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let modified = Utc::now();
        tx.execute(
            "INSERT INTO sarhs (sarh_id, folder_code, epsa, user, sub_subt, reg_renov, \
             rar_aaps_nr, rar_date, notification_date, user_notification_date, auth_year, \
             renovation_alert, auth_certificate_state, state, municipality, industry_type, \
             use_description, form_extraction_volume, authorized_streamflow, anual_volume, \
             sarh_denom, active_inactive_sealed, x, y, z, zone, source_nr, discharge_place, \
             ph, conductivity, turbidity, iron, manganese, od, langelie, observations, lat, \
             lon, geom, modified) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, \
             ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, \
             ?29, ?30, ?31, ?32, ?33, ?34, ?35, ?36, ?37, ?38, ?39, ?40)",
            params![
                sarh.sarh_id,
                sarh.folder_code,
                sarh.epsa,
                sarh.user,
                sarh.sub_subt,
                sarh.reg_renov,
                sarh.rar_aaps_nr,
                date_str(&sarh.rar_date),
                date_str(&sarh.notification_date),
                date_str(&sarh.user_notification_date),
                sarh.auth_year,
                sarh.renovation_alert,
                sarh.auth_certificate_state,
                sarh.state,
                sarh.municipality,
                sarh.industry_type,
                sarh.use_description,
                sarh.form_extraction_volume,
                sarh.authorized_streamflow,
                sarh.anual_volume,
                sarh.sarh_denom,
                sarh.active_inactive_sealed,
                sarh.x,
                sarh.y,
                sarh.z,
                sarh.zone,
                sarh.source_nr,
                sarh.discharge_place,
                sarh.ph,
                sarh.conductivity,
                sarh.turbidity,
                sarh.iron,
                sarh.manganese,
                sarh.od,
                sarh.langelie,
                sarh.observations,
                sarh.lat,
                sarh.lon,
                geom,
                ts(&modified)
            ],
        )?;
        replace_sarh_children(&tx, sarh)?;
        tx.commit()?;
        sarh.modified = Some(modified);
        Ok(())
    }

    async fn update_sarh(&self, sarh_id: &str, sarh: &mut Sarh) -> Result<()> {
        let geom = geom_str(&sarh.geom)?;
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let modified = Utc::now();
        let affected = tx.execute(
            "UPDATE sarhs SET sarh_id = ?1, folder_code = ?2, epsa = ?3, user = ?4, \
             sub_subt = ?5, reg_renov = ?6, rar_aaps_nr = ?7, rar_date = ?8, \
             notification_date = ?9, user_notification_date = ?10, auth_year = ?11, \
             renovation_alert = ?12, auth_certificate_state = ?13, state = ?14, \
             municipality = ?15, industry_type = ?16, use_description = ?17, \
             form_extraction_volume = ?18, authorized_streamflow = ?19, anual_volume = ?20, \
             sarh_denom = ?21, active_inactive_sealed = ?22, x = ?23, y = ?24, z = ?25, \
             zone = ?26, source_nr = ?27, discharge_place = ?28, ph = ?29, conductivity = ?30, \
             turbidity = ?31, iron = ?32, manganese = ?33, od = ?34, langelie = ?35, \
             observations = ?36, lat = ?37, lon = ?38, geom = ?39, modified = ?40 \
             WHERE sarh_id = ?41",
            params![
                sarh.sarh_id,
                sarh.folder_code,
                sarh.epsa,
                sarh.user,
                sarh.sub_subt,
                sarh.reg_renov,
                sarh.rar_aaps_nr,
                date_str(&sarh.rar_date),
                date_str(&sarh.notification_date),
                date_str(&sarh.user_notification_date),
                sarh.auth_year,
                sarh.renovation_alert,
                sarh.auth_certificate_state,
                sarh.state,
                sarh.municipality,
                sarh.industry_type,
                sarh.use_description,
                sarh.form_extraction_volume,
                sarh.authorized_streamflow,
                sarh.anual_volume,
                sarh.sarh_denom,
                sarh.active_inactive_sealed,
                sarh.x,
                sarh.y,
                sarh.z,
                sarh.zone,
                sarh.source_nr,
                sarh.discharge_place,
                sarh.ph,
                sarh.conductivity,
                sarh.turbidity,
                sarh.iron,
                sarh.manganese,
                sarh.od,
                sarh.langelie,
                sarh.observations,
                sarh.lat,
                sarh.lon,
                geom,
                ts(&modified),
                sarh_id
            ],
        )?;
        if affected == 0 {
            return Err(ApiError::NotFound("SARH".to_string()));
        }
        replace_sarh_children(&tx, sarh)?;
        tx.commit()?;
        sarh.modified = Some(modified);
        Ok(())
    }

    async fn delete_sarh(&self, sarh_id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.execute("DELETE FROM sarhs WHERE sarh_id = ?1", params![sarh_id])? > 0)
    }

    async fn list_supply_areas(&self, filter: &SupplyAreaFilter) -> Result<Vec<SupplyArea>> {
        let conn = self.conn.lock().unwrap();
        let mut qb = QueryBuilder::new();
        qb.text("sa.epsa = ?", &filter.epsa);
        qb.text("e.state = ?", &filter.state);
        let join = if filter.state.is_some() { " JOIN epsas e ON e.code = sa.epsa" } else { "" };
        let sql = format!(
            "SELECT sa.id, sa.epsa, sa.geom, sa.modified FROM supply_areas sa{join}{} \
             ORDER BY sa.epsa",
            qb.where_clause()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(qb.params), supply_area_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    async fn get_supply_area(&self, id: i64) -> Result<Option<SupplyArea>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                "SELECT id, epsa, geom, modified FROM supply_areas WHERE id = ?1",
                params![id],
                supply_area_from_row,
            )
            .optional()?)
    }

    async fn create_supply_area(&self, area: &mut SupplyArea) -> Result<()> {
        let geom = geom_str(&area.geom)?;
        let conn = self.conn.lock().unwrap();
        let modified = Utc::now();
        conn.execute(
            "INSERT INTO supply_areas (epsa, geom, modified) VALUES (?1, ?2, ?3)",
            params![area.epsa, geom, ts(&modified)],
        )?;
        area.id = Some(conn.last_insert_rowid());
        area.modified = Some(modified);
        Ok(())
    }

    async fn update_supply_area(&self, area: &mut SupplyArea) -> Result<()> {
        let id = area.id.ok_or_else(|| ApiError::MissingField("id".to_string()))?;
        let geom = geom_str(&area.geom)?;
        let conn = self.conn.lock().unwrap();
        let modified = Utc::now();
        let affected = conn.execute(
            "UPDATE supply_areas SET epsa = ?1, geom = ?2, modified = ?3 WHERE id = ?4",
            params![area.epsa, geom, ts(&modified), id],
        )?;
        if affected == 0 {
            return Err(ApiError::NotFound("Supply area".to_string()));
        }
        area.modified = Some(modified);
        Ok(())
    }

    async fn delete_supply_area(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.execute("DELETE FROM supply_areas WHERE id = ?1", params![id])? > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn storage() -> SqliteStorage {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.run_migrations().unwrap();
        storage
    }

    #[tokio::test]
    async fn epsa_crud_round_trip() {
        let st = storage();
        let mut epsa: Epsa = serde_json::from_value(json!({
            "code": "AAPOS", "name": "AAPOS Potosí", "state": "PO", "category": "A"
        }))
        .unwrap();
        st.create_epsa(&mut epsa).await.unwrap();
        assert!(epsa.modified.is_some());

        let fetched = st.get_epsa("AAPOS").await.unwrap().unwrap();
        assert_eq!(fetched.state.as_deref(), Some("PO"));

        let mut updated = fetched.clone();
        updated.category = Some("B".to_string());
        st.update_epsa("AAPOS", &mut updated).await.unwrap();
        let fetched = st.get_epsa("AAPOS").await.unwrap().unwrap();
        assert_eq!(fetched.category.as_deref(), Some("B"));

        assert!(st.delete_epsa("AAPOS").await.unwrap());
        assert!(st.get_epsa("AAPOS").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn epsa_list_filters_by_state_and_category() {
        let st = storage();
        for (code, state, cat) in [("A1", "LP", "A"), ("B1", "SC", "B"), ("B2", "SC", "A")] {
            let mut epsa: Epsa = serde_json::from_value(json!({
                "code": code, "state": state, "category": cat
            }))
            .unwrap();
            st.create_epsa(&mut epsa).await.unwrap();
        }
        let filter = EpsaFilter { state: Some("SC".to_string()), ..Default::default() };
        assert_eq!(st.list_epsas(&filter).await.unwrap().len(), 2);
        let filter = EpsaFilter {
            state: Some("SC".to_string()),
            category: Some("A".to_string()),
            ..Default::default()
        };
        let found = st.list_epsas(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].code, "B2");
    }

    #[tokio::test]
    async fn report_slots_survive_storage() {
        let st = storage();
        let mut report: VariableReport = serde_json::from_value(json!({
            "epsa": "AAPOS", "year": 2017, "month": null,
            "v1": 790840.0, "v2_type": "NR"
        }))
        .unwrap();
        st.create_report(&mut report).await.unwrap();
        let id = report.id.unwrap();

        let fetched = st.get_report(id).await.unwrap().unwrap();
        assert_eq!(fetched.values[0], Some(790840.0));
        assert_eq!(fetched.value_kinds[1], ValueKind::NR);
        assert_eq!(fetched.month, None);

        let by_key = st.find_report(Some("AAPOS"), 2017, None).await.unwrap();
        assert_eq!(by_key.unwrap().id, Some(id));
        assert!(st.find_report(Some("AAPOS"), 2017, Some(6)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn poa_expense_sheet_is_replaced_not_duplicated() {
        let st = storage();
        let mut poa: Poa = serde_json::from_value(json!({
            "epsa": "SAGUAPAC", "year": 2019, "order": 1,
            "coop_expense": { "costos_operacion": 10.0 }
        }))
        .unwrap();
        st.create_poa(&mut poa).await.unwrap();
        let id = poa.id.unwrap();

        // switch the POA to a municipal sheet
        let mut switched = st.get_poa(id).await.unwrap().unwrap();
        switched.coop_expense = None;
        switched.muni_expense = Some(MuniExpense {
            gastos_otros: Some(5.0),
            ..Default::default()
        });
        st.update_poa(&mut switched).await.unwrap();

        let fetched = st.get_poa(id).await.unwrap().unwrap();
        assert!(fetched.coop_expense.is_none());
        assert_eq!(fetched.muni_expense.unwrap().gastos_otros, Some(5.0));
    }

    #[tokio::test]
    async fn sarh_children_cascade_on_delete() {
        let st = storage();
        let mut sarh: Sarh = serde_json::from_value(json!({
            "sarh_id": "00123-00456-1",
            "epsa": "SAGUAPAC",
            "tecnical_sub": [ { "year": 2016, "aforo": 12.0 } ]
        }))
        .unwrap();
        st.create_sarh(&mut sarh).await.unwrap();

        let fetched = st.get_sarh("00123-00456-1").await.unwrap().unwrap();
        assert_eq!(fetched.tecnical_sub.as_ref().unwrap().len(), 1);

        assert!(st.delete_sarh("00123-00456-1").await.unwrap());
        let conn = st.conn.lock().unwrap();
        let orphans: i64 = conn
            .query_row("SELECT COUNT(*) FROM sarh_tecnical_sub", [], |row| row.get(0))
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[tokio::test]
    async fn supply_area_state_filter_joins_epsa_registry() {
        let st = storage();
        let mut epsa: Epsa =
            serde_json::from_value(json!({ "code": "AAPOS", "state": "PO" })).unwrap();
        st.create_epsa(&mut epsa).await.unwrap();
        let mut area: SupplyArea = serde_json::from_value(json!({
            "epsa": "AAPOS",
            "geom": {
                "type": "MultiPolygon",
                "coordinates": [[[[0.0,0.0],[1.0,0.0],[1.0,1.0],[0.0,0.0]]]]
            }
        }))
        .unwrap();
        st.create_supply_area(&mut area).await.unwrap();

        let filter = SupplyAreaFilter { state: Some("PO".to_string()), ..Default::default() };
        assert_eq!(st.list_supply_areas(&filter).await.unwrap().len(), 1);
        let filter = SupplyAreaFilter { state: Some("LP".to_string()), ..Default::default() };
        assert!(st.list_supply_areas(&filter).await.unwrap().is_empty());
    }
}

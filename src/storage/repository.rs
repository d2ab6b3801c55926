use chrono::Weekday;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::date_util::date_key_from_iso;
use crate::import::records::{
    CentreRecord, DivisionRecord, DoctorRecord, OtcSaleRecord, PatientRecord, VisitRecord,
};
use crate::metrics::types::ReportSettings;

pub const EXCLUDED_WEEKDAY_KEY: &str = "excluded_weekday";
pub const OTC_MIN_AMOUNT_KEY: &str = "otc_min_amount";

// ── Organisation ──────────────────────────────────────────────────

pub fn upsert_division(conn: &Connection, d: &DivisionRecord) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO divisions (division_id, name, is_active, is_reporting, cached_at)
         VALUES (?1, ?2, ?3, ?4, datetime('now'))
         ON CONFLICT(division_id) DO UPDATE SET
           name = excluded.name,
           is_active = excluded.is_active,
           is_reporting = excluded.is_reporting,
           cached_at = excluded.cached_at",
        params![d.id, d.name.trim(), d.is_active as i32, d.is_reporting as i32],
    )?;
    Ok(())
}

pub fn upsert_centre(conn: &Connection, c: &CentreRecord) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO centres (centre_id, village, division_id, is_reporting, cached_at)
         VALUES (?1, ?2, ?3, ?4, datetime('now'))
         ON CONFLICT(centre_id) DO UPDATE SET
           village = excluded.village,
           division_id = excluded.division_id,
           is_reporting = excluded.is_reporting,
           cached_at = excluded.cached_at",
        params![c.id, c.village.trim(), c.division_id, c.is_reporting as i32],
    )?;
    Ok(())
}

pub fn upsert_doctor(conn: &Connection, d: &DoctorRecord) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO doctors (doctor_id, name, speciality, cached_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT(doctor_id) DO UPDATE SET
           name = excluded.name,
           speciality = excluded.speciality,
           cached_at = excluded.cached_at",
        params![d.id, d.name, d.speciality],
    )?;
    Ok(())
}

pub fn upsert_patient(conn: &Connection, p: &PatientRecord) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO patients (patient_id, centre_id, sex, cached_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT(patient_id) DO UPDATE SET
           centre_id = excluded.centre_id,
           sex = COALESCE(excluded.sex, patients.sex),
           cached_at = excluded.cached_at",
        params![p.id, p.centre_id, p.sex],
    )?;
    Ok(())
}

// ── Facts ─────────────────────────────────────────────────────────

pub fn upsert_visit(conn: &Connection, v: &VisitRecord) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO fact_visits (
            visit_id, patient_id, doctor_id, created_at, created_date_key, status,
            cost, consultation, medicine, diagnostics, poc, eye, cached_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, datetime('now'))",
        params![
            v.id,
            v.patient_id,
            v.doctor_id,
            v.created_at,
            date_key_from_iso(&v.created_at),
            v.status.trim(),
            v.cost,
            v.consultation,
            v.medicine,
            v.diagnostics,
            v.poc,
            v.eye,
        ],
    )?;
    Ok(())
}

pub fn upsert_otc_sale(conn: &Connection, s: &OtcSaleRecord) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO fact_otc_sales (
            sale_id, patient_id, created_at, created_date_key,
            cost, paid_amount, medicine, diagnostics, poc, cached_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, datetime('now'))",
        params![
            s.id,
            s.patient_id,
            s.created_at,
            date_key_from_iso(&s.created_at),
            s.cost,
            s.paid_amount,
            s.medicine,
            s.diagnostics,
            s.poc,
        ],
    )?;
    Ok(())
}

// ── Lookups ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct DivisionRow {
    pub division_id: i64,
    pub name: String,
    pub is_active: bool,
    pub is_reporting: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CentreRow {
    pub centre_id: i64,
    pub village: String,
    pub division_id: i64,
    pub division_name: String,
    pub is_reporting: bool,
}

pub fn list_divisions(conn: &Connection) -> Result<Vec<DivisionRow>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT division_id, name, is_active, is_reporting FROM divisions ORDER BY name",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(DivisionRow {
            division_id: row.get(0)?,
            name: row.get(1)?,
            is_active: row.get::<_, i32>(2)? != 0,
            is_reporting: row.get::<_, i32>(3)? != 0,
        })
    })?;
    rows.collect()
}

fn map_centre(row: &rusqlite::Row<'_>) -> Result<CentreRow, rusqlite::Error> {
    Ok(CentreRow {
        centre_id: row.get(0)?,
        village: row.get(1)?,
        division_id: row.get(2)?,
        division_name: row.get(3)?,
        is_reporting: row.get::<_, i32>(4)? != 0,
    })
}

/// Centres ordered by village, optionally within one division (by name).
pub fn list_centres(
    conn: &Connection,
    division: Option<&str>,
) -> Result<Vec<CentreRow>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT c.centre_id, c.village, c.division_id, d.name, c.is_reporting
         FROM centres c
         JOIN divisions d ON d.division_id = c.division_id
         WHERE ?1 IS NULL OR d.name = ?1
         ORDER BY c.village, c.centre_id",
    )?;
    let rows = stmt.query_map(params![division], map_centre)?;
    rows.collect()
}

/// Reporting centres in active, reporting divisions.
pub fn list_reporting_centres(conn: &Connection) -> Result<Vec<CentreRow>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT c.centre_id, c.village, c.division_id, d.name, c.is_reporting
         FROM centres c
         JOIN divisions d ON d.division_id = c.division_id
         WHERE c.is_reporting = 1 AND d.is_active = 1 AND d.is_reporting = 1
         ORDER BY d.name, c.village, c.centre_id",
    )?;
    let rows = stmt.query_map([], map_centre)?;
    rows.collect()
}

// ── Config ────────────────────────────────────────────────────────

pub fn get_config(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM app_config WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_config(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO app_config (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))",
        params![key, value],
    )?;
    Ok(())
}

pub fn list_config(conn: &Connection) -> Result<Vec<(String, String)>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT key, value FROM app_config ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

/// Parse an `excluded_weekday` value. `none` disables the exclusion;
/// `None` means the value is not a weekday at all.
pub fn parse_weekday_setting(value: &str) -> Option<Option<Weekday>> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("none") {
        return Some(None);
    }
    value.parse::<Weekday>().ok().map(Some)
}

/// Read report tunables, falling back to defaults for unset or unreadable
/// values.
pub fn load_settings(conn: &Connection) -> Result<ReportSettings, rusqlite::Error> {
    let mut settings = ReportSettings::default();

    if let Some(raw) = get_config(conn, EXCLUDED_WEEKDAY_KEY)? {
        match parse_weekday_setting(&raw) {
            Some(weekday) => settings.excluded_weekday = weekday,
            None => log::warn!("Ignoring invalid {EXCLUDED_WEEKDAY_KEY} value {raw:?}"),
        }
    }

    if let Some(raw) = get_config(conn, OTC_MIN_AMOUNT_KEY)? {
        match raw.trim().parse::<f64>() {
            Ok(n) if n.is_finite() && n >= 0.0 => settings.otc_min_amount = n,
            _ => log::warn!("Ignoring invalid {OTC_MIN_AMOUNT_KEY} value {raw:?}"),
        }
    }

    Ok(settings)
}

// ── Targets ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct TargetRow {
    pub metric: String,
    pub month_key: String,
    pub target: f64,
    pub updated_at: String,
}

pub fn get_target(
    conn: &Connection,
    metric: &str,
    month_key: &str,
) -> Result<Option<f64>, rusqlite::Error> {
    conn.query_row(
        "SELECT target FROM monthly_targets WHERE metric = ?1 AND month_key = ?2",
        params![metric, month_key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_target(
    conn: &Connection,
    metric: &str,
    month_key: &str,
    target: f64,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO monthly_targets (metric, month_key, target, updated_at)
         VALUES (?1, ?2, ?3, datetime('now'))",
        params![metric, month_key, target],
    )?;
    Ok(())
}

pub fn list_targets(
    conn: &Connection,
    metric: Option<&str>,
) -> Result<Vec<TargetRow>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT metric, month_key, target, updated_at FROM monthly_targets
         WHERE ?1 IS NULL OR metric = ?1
         ORDER BY month_key DESC, metric",
    )?;
    let rows = stmt.query_map(params![metric], |row| {
        Ok(TargetRow {
            metric: row.get(0)?,
            month_key: row.get(1)?,
            target: row.get(2)?,
            updated_at: row.get(3)?,
        })
    })?;
    rows.collect()
}

// ── Status ────────────────────────────────────────────────────────

const COUNTED_TABLES: [&str; 8] = [
    "divisions",
    "centres",
    "doctors",
    "patients",
    "fact_visits",
    "fact_otc_sales",
    "app_config",
    "monthly_targets",
];

pub fn table_counts(conn: &Connection) -> Result<Vec<(String, i64)>, rusqlite::Error> {
    COUNTED_TABLES
        .iter()
        .map(|table| {
            let count: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok((table.to_string(), count))
        })
        .collect()
}

pub mod records;

#[cfg(test)]
pub(crate) mod fixtures;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::date_util::{date_key_from_iso, parse_date_key};
use crate::error::{Error, Result};
use crate::storage::{repository, Database};

use records::{
    CentreRecord, DivisionRecord, DoctorRecord, OtcSaleRecord, PatientRecord, VisitRecord,
};

/// A JSON snapshot of source records. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportBundle {
    #[serde(default)]
    pub divisions: Vec<DivisionRecord>,
    #[serde(default)]
    pub centres: Vec<CentreRecord>,
    #[serde(default)]
    pub doctors: Vec<DoctorRecord>,
    #[serde(default)]
    pub patients: Vec<PatientRecord>,
    #[serde(default)]
    pub visits: Vec<VisitRecord>,
    #[serde(default)]
    pub otc_sales: Vec<OtcSaleRecord>,
}

/// Rows written per section, plus facts skipped for unreadable dates.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub divisions: usize,
    pub centres: usize,
    pub doctors: usize,
    pub patients: usize,
    pub visits: usize,
    pub otc_sales: usize,
    pub skipped: usize,
}

pub fn parse_bundle(json: &str) -> Result<ImportBundle> {
    Ok(serde_json::from_str(json)?)
}

pub fn load_bundle(path: impl AsRef<Path>) -> Result<ImportBundle> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)
        .map_err(|e| Error::Import(format!("cannot read {}: {e}", path.display())))?;
    parse_bundle(&json)
}

fn has_valid_date(created_at: &str) -> bool {
    parse_date_key(&date_key_from_iso(created_at)).is_some()
}

/// Write a bundle in one transaction, parents before facts. Any constraint
/// failure rolls the whole bundle back.
pub async fn import_bundle(db: &Database, bundle: ImportBundle) -> Result<ImportReport> {
    let report = db
        .writer()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let mut report = ImportReport::default();

            for d in &bundle.divisions {
                repository::upsert_division(&tx, d)?;
                report.divisions += 1;
            }
            for c in &bundle.centres {
                repository::upsert_centre(&tx, c)?;
                report.centres += 1;
            }
            for d in &bundle.doctors {
                repository::upsert_doctor(&tx, d)?;
                report.doctors += 1;
            }
            for p in &bundle.patients {
                repository::upsert_patient(&tx, p)?;
                report.patients += 1;
            }
            for v in &bundle.visits {
                if !has_valid_date(&v.created_at) {
                    log::warn!("Skipping visit {}: bad created_at {:?}", v.id, v.created_at);
                    report.skipped += 1;
                    continue;
                }
                repository::upsert_visit(&tx, v)?;
                report.visits += 1;
            }
            for s in &bundle.otc_sales {
                if !has_valid_date(&s.created_at) {
                    log::warn!("Skipping OTC sale {}: bad created_at {:?}", s.id, s.created_at);
                    report.skipped += 1;
                    continue;
                }
                repository::upsert_otc_sale(&tx, s)?;
                report.otc_sales += 1;
            }

            tx.commit()?;
            Ok::<ImportReport, rusqlite::Error>(report)
        })
        .await?;

    log::info!(
        "Imported {} visits and {} OTC sales ({} skipped)",
        report.visits,
        report.otc_sales,
        report.skipped
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_import_fixture() {
        let db = Database::open_memory().await.unwrap();
        let bundle = parse_bundle(fixtures::BUNDLE_JSON).unwrap();
        let report = import_bundle(&db, bundle).await.unwrap();

        assert_eq!(report.divisions, 4);
        assert_eq!(report.centres, 6);
        assert_eq!(report.visits, 14);
        assert_eq!(report.otc_sales, 3);
        assert_eq!(report.skipped, 0);
    }

    #[tokio::test]
    async fn test_import_skips_bad_dates() {
        let db = Database::open_memory().await.unwrap();
        let bundle = parse_bundle(
            r#"{
                "divisions": [{"id": 1, "name": "North"}],
                "centres": [{"id": 10, "village": "Amla", "division_id": 1}],
                "patients": [{"id": 100, "centre_id": 10}],
                "visits": [
                    {"id": 1, "patient_id": 100, "created_at": "2025-09-01 09:00:00"},
                    {"id": 2, "patient_id": 100, "created_at": "yesterday"}
                ]
            }"#,
        )
        .unwrap();
        let report = import_bundle(&db, bundle).await.unwrap();
        assert_eq!(report.visits, 1);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn test_import_skips_non_ascii_dates_and_keeps_connection() {
        let db = Database::open_memory().await.unwrap();
        let bundle = parse_bundle(
            r#"{
                "divisions": [{"id": 1, "name": "North"}],
                "centres": [{"id": 10, "village": "Amla", "division_id": 1}],
                "patients": [{"id": 100, "centre_id": 10}],
                "visits": [
                    {"id": 1, "patient_id": 100, "created_at": "2025-09-0é 09:00"},
                    {"id": 2, "patient_id": 100, "created_at": "2025-09-02 09:00:00"}
                ],
                "otc_sales": [
                    {"id": 1, "patient_id": 100, "created_at": "२०२५-०९-०१", "cost": 80}
                ]
            }"#,
        )
        .unwrap();
        let report = import_bundle(&db, bundle).await.unwrap();
        assert_eq!(report.visits, 1);
        assert_eq!(report.otc_sales, 0);
        assert_eq!(report.skipped, 2);

        let counts = db
            .reader()
            .call(|conn| repository::table_counts(conn))
            .await
            .unwrap();
        let visits = counts.iter().find(|(t, _)| t == "fact_visits").unwrap();
        assert_eq!(visits.1, 1);
    }

    #[tokio::test]
    async fn test_import_rolls_back_on_missing_parent() {
        let db = Database::open_memory().await.unwrap();
        let bundle = parse_bundle(
            r#"{
                "divisions": [{"id": 1, "name": "North"}],
                "centres": [{"id": 10, "village": "Amla", "division_id": 99}]
            }"#,
        )
        .unwrap();
        assert!(import_bundle(&db, bundle).await.is_err());

        let divisions = db
            .reader()
            .call(|conn| repository::list_divisions(conn))
            .await
            .unwrap();
        assert!(divisions.is_empty());
    }

    #[test]
    fn test_load_bundle_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        std::fs::write(&path, r#"{"doctors": [{"id": 1, "name": "Dr. Rao"}]}"#).unwrap();

        let bundle = load_bundle(&path).unwrap();
        assert_eq!(bundle.doctors.len(), 1);
        assert!(bundle.visits.is_empty());

        assert!(matches!(
            load_bundle(dir.path().join("missing.json")),
            Err(Error::Import(_))
        ));
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(load_bundle(&path), Err(Error::Json(_))));
    }
}

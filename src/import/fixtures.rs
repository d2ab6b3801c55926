//! Sample warehouse contents shared by report tests.
//!
//! Divisions: North and South report; Field Ops is active but not
//! reporting; Closed is reporting but inactive. Dhar is a non-reporting
//! centre inside South.

use crate::storage::Database;

pub const BUNDLE_JSON: &str = r#"{
  "divisions": [
    {"id": 1, "name": "North"},
    {"id": 2, "name": "South"},
    {"id": 3, "name": "Field Ops", "is_reporting": false},
    {"id": 4, "name": "Closed", "is_active": false}
  ],
  "centres": [
    {"id": 10, "village": "Amla", "division_id": 1},
    {"id": 11, "village": "Bela", "division_id": 1},
    {"id": 20, "village": "Chara", "division_id": 2},
    {"id": 21, "village": "Dhar", "division_id": 2, "is_reporting": false},
    {"id": 30, "village": "Camp", "division_id": 3},
    {"id": 40, "village": "Old Town", "division_id": 4}
  ],
  "doctors": [
    {"id": 1, "name": "Dr. Iyer", "speciality": "General Medicine"},
    {"id": 2, "name": "Dr. Sen", "speciality": " Eye "},
    {"id": 3, "name": "Dr. Khan"}
  ],
  "patients": [
    {"id": 100, "centre_id": 10},
    {"id": 101, "centre_id": 11},
    {"id": 200, "centre_id": 20},
    {"id": 201, "centre_id": 21},
    {"id": 300, "centre_id": 30},
    {"id": 400, "centre_id": 40}
  ],
  "visits": [
    {"id": 1, "patient_id": 100, "doctor_id": 1, "created_at": "2025-09-01 09:00:00",
     "cost": 500, "consultation": 200, "medicine": 300},
    {"id": 2, "patient_id": 101, "doctor_id": 2, "created_at": "2025-09-01 10:00:00",
     "cost": "300", "consultation": 100, "eye": 200},
    {"id": 3, "patient_id": 200, "doctor_id": 3, "created_at": "2025-09-02 09:30:00",
     "cost": 200, "consultation": 200},
    {"id": 4, "patient_id": 100, "doctor_id": 1, "created_at": "2025-09-02 12:00:00",
     "status": "C", "cost": 0},
    {"id": 5, "patient_id": 300, "doctor_id": 1, "created_at": "2025-09-03 09:00:00",
     "cost": "1,000"},
    {"id": 6, "patient_id": 201, "doctor_id": 1, "created_at": "2025-09-03 10:00:00",
     "cost": 150},
    {"id": 7, "patient_id": 400, "doctor_id": 1, "created_at": "2025-09-03 11:00:00",
     "cost": 70},
    {"id": 8, "patient_id": 100, "doctor_id": 1, "created_at": "2025-08-15 09:00:00",
     "cost": 400},
    {"id": 9, "patient_id": 200, "doctor_id": 1, "created_at": "2025-08-15 10:00:00",
     "cost": 100},
    {"id": 10, "patient_id": 100, "doctor_id": 1, "created_at": "2024-09-10 09:00:00",
     "cost": 250},
    {"id": 11, "patient_id": 101, "doctor_id": 2, "created_at": "2025-06-20 09:00:00",
     "cost": 600},
    {"id": 12, "patient_id": 100, "doctor_id": 1, "created_at": "2025-07-05 09:00:00",
     "cost": 300},
    {"id": 13, "patient_id": 100, "doctor_id": 1, "created_at": "2024-07-01 09:00:00",
     "cost": 100},
    {"id": 14, "patient_id": 100, "doctor_id": 1, "created_at": "2024-08-20 09:00:00",
     "cost": 100}
  ],
  "otc_sales": [
    {"id": 1, "patient_id": 100, "created_at": "2025-09-01 11:00:00",
     "cost": 120, "paid_amount": 100, "medicine": 40},
    {"id": 2, "patient_id": 101, "created_at": "2025-09-02 11:00:00",
     "cost": 50},
    {"id": 3, "patient_id": 300, "created_at": "2025-09-02 15:00:00",
     "cost": 80}
  ]
}"#;

/// An in-memory warehouse loaded with [`BUNDLE_JSON`].
pub async fn seeded_db() -> Database {
    let db = Database::open_memory().await.unwrap();
    let bundle = super::parse_bundle(BUNDLE_JSON).unwrap();
    super::import_bundle(&db, bundle).await.unwrap();
    db
}

use serde::{Deserialize, Deserializer, Serialize};

use crate::date_util::{non_negative, parse_amount};

fn default_true() -> bool {
    true
}

fn default_status() -> String {
    "A".to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Number(f64),
    Text(String),
}

/// Amounts arrive as numbers or as strings like `"1,200.50"`.
fn amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(optional_amount(deserializer)?.unwrap_or(0.0))
}

fn optional_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let raw = Option::<RawAmount>::deserialize(deserializer)?;
    Ok(raw.map(|r| match r {
        RawAmount::Number(n) => non_negative(n),
        RawAmount::Text(s) => non_negative(parse_amount(&s)),
    }))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DivisionRecord {
    pub id: i64,
    pub name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Non-reporting divisions are left out of roll-ups unless named.
    #[serde(default = "default_true")]
    pub is_reporting: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CentreRecord {
    pub id: i64,
    pub village: String,
    pub division_id: i64,
    #[serde(default = "default_true")]
    pub is_reporting: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorRecord {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub speciality: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: i64,
    pub centre_id: i64,
    #[serde(default)]
    pub sex: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitRecord {
    pub id: i64,
    pub patient_id: i64,
    #[serde(default)]
    pub doctor_id: Option<i64>,
    /// ISO or SQL datetime; the first ten characters are the day.
    pub created_at: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default, deserialize_with = "amount")]
    pub cost: f64,
    #[serde(default, deserialize_with = "amount")]
    pub consultation: f64,
    #[serde(default, deserialize_with = "amount")]
    pub medicine: f64,
    #[serde(default, deserialize_with = "amount")]
    pub diagnostics: f64,
    #[serde(default, deserialize_with = "amount")]
    pub poc: f64,
    #[serde(default, deserialize_with = "amount")]
    pub eye: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtcSaleRecord {
    pub id: i64,
    pub patient_id: i64,
    pub created_at: String,
    #[serde(default, deserialize_with = "amount")]
    pub cost: f64,
    #[serde(default, deserialize_with = "optional_amount")]
    pub paid_amount: Option<f64>,
    #[serde(default, deserialize_with = "amount")]
    pub medicine: f64,
    #[serde(default, deserialize_with = "amount")]
    pub diagnostics: f64,
    #[serde(default, deserialize_with = "amount")]
    pub poc: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visit_defaults_and_string_amounts() {
        let v: VisitRecord = serde_json::from_str(
            r#"{"id": 1, "patient_id": 2, "created_at": "2025-09-01 10:00:00",
                "cost": "1,200.50", "medicine": 300, "eye": null}"#,
        )
        .unwrap();
        assert_eq!(v.status, "A");
        assert_eq!(v.doctor_id, None);
        assert_eq!(v.cost, 1200.5);
        assert_eq!(v.medicine, 300.0);
        assert_eq!(v.eye, 0.0);
        assert_eq!(v.consultation, 0.0);
    }

    #[test]
    fn test_otc_paid_amount_optional() {
        let s: OtcSaleRecord = serde_json::from_str(
            r#"{"id": 5, "patient_id": 2, "created_at": "2025-09-01", "cost": 80}"#,
        )
        .unwrap();
        assert_eq!(s.paid_amount, None);

        let s: OtcSaleRecord = serde_json::from_str(
            r#"{"id": 5, "patient_id": 2, "created_at": "2025-09-01", "paid_amount": "-4"}"#,
        )
        .unwrap();
        assert_eq!(s.paid_amount, Some(0.0));
    }

    #[test]
    fn test_division_flags_default_true() {
        let d: DivisionRecord = serde_json::from_str(r#"{"id": 1, "name": "North"}"#).unwrap();
        assert!(d.is_active);
        assert!(d.is_reporting);
    }
}

use std::str::FromStr;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::query::period::PeriodWindow;

/// Which revenue streams a report includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RevenueSource {
    Otc,
    Patient,
    #[default]
    Combined,
}

impl RevenueSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevenueSource::Otc => "otc",
            RevenueSource::Patient => "patient",
            RevenueSource::Combined => "combined",
        }
    }

    pub fn includes_visits(&self) -> bool {
        matches!(self, RevenueSource::Patient | RevenueSource::Combined)
    }

    pub fn includes_otc(&self) -> bool {
        matches!(self, RevenueSource::Otc | RevenueSource::Combined)
    }
}

impl FromStr for RevenueSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "otc" => Ok(RevenueSource::Otc),
            "patient" | "patients" | "visit" | "visits" => Ok(RevenueSource::Patient),
            "combined" | "all" | "" => Ok(RevenueSource::Combined),
            other => Err(Error::Other(format!(
                "unknown revenue source {other:?} (expected otc, patient or combined)"
            ))),
        }
    }
}

/// The fact table a scoped query reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactTable {
    Visits,
    OtcSales,
}

impl FactTable {
    /// `FROM` clause joining the fact (`f`) through patient (`p`) and
    /// centre (`c`) to division (`d`).
    pub fn from_clause(&self) -> &'static str {
        match self {
            FactTable::Visits => {
                "FROM fact_visits f
                 JOIN patients p ON p.patient_id = f.patient_id
                 JOIN centres c ON c.centre_id = p.centre_id
                 JOIN divisions d ON d.division_id = c.division_id
                 LEFT JOIN doctors doc ON doc.doctor_id = f.doctor_id"
            }
            FactTable::OtcSales => {
                "FROM fact_otc_sales f
                 JOIN patients p ON p.patient_id = f.patient_id
                 JOIN centres c ON c.centre_id = p.centre_id
                 JOIN divisions d ON d.division_id = c.division_id"
            }
        }
    }
}

/// Which divisions a query may draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DivisionScope {
    /// Active, reporting divisions only.
    Reporting,
    /// Reporting divisions, unless the filter names a division explicitly.
    ReportingUnlessNamed,
    Any,
}

/// Builder for the entity filters shared by every report.
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    division: Option<String>,
    centre_id: Option<i64>,
    source: RevenueSource,
}

impl ReportFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to a division by name. Blank names are ignored.
    pub fn division(mut self, name: &str) -> Self {
        let name = name.trim();
        self.division = if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        };
        self
    }

    pub fn centre(mut self, centre_id: i64) -> Self {
        self.centre_id = Some(centre_id);
        self
    }

    pub fn source(mut self, source: RevenueSource) -> Self {
        self.source = source;
        self
    }

    pub fn division_name(&self) -> Option<&str> {
        self.division.as_deref()
    }

    pub fn centre_id(&self) -> Option<i64> {
        self.centre_id
    }

    pub fn revenue_source(&self) -> RevenueSource {
        self.source
    }

    /// Build the `WHERE` clause for one fact table over one window.
    /// The window bounds are always `?1` and `?2`.
    pub(crate) fn build_where(
        &self,
        window: &PeriodWindow,
        scope: DivisionScope,
    ) -> (String, Vec<Box<dyn rusqlite::types::ToSql>>) {
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        let mut wheres = vec!["f.created_date_key BETWEEN ?1 AND ?2".to_string()];
        params.push(Box::new(window.from_key()));
        params.push(Box::new(window.to_key()));
        let mut param_idx = 3;

        match scope {
            DivisionScope::Reporting => {
                wheres.push("d.is_active = 1 AND d.is_reporting = 1".to_string());
            }
            DivisionScope::ReportingUnlessNamed if self.division.is_none() => {
                wheres.push("d.is_reporting = 1".to_string());
            }
            _ => {}
        }

        if let Some(ref name) = self.division {
            wheres.push(format!("d.name = ?{param_idx}"));
            params.push(Box::new(name.clone()));
            param_idx += 1;
        }

        if let Some(id) = self.centre_id {
            wheres.push(format!("c.centre_id = ?{param_idx}"));
            params.push(Box::new(id));
        }

        (format!("WHERE {}", wheres.join(" AND ")), params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::period::resolve_month;

    #[test]
    fn test_build_where_default() {
        let w = resolve_month("2025-01").unwrap();
        let (sql, params) = ReportFilter::new().build_where(&w, DivisionScope::Any);
        assert_eq!(sql, "WHERE f.created_date_key BETWEEN ?1 AND ?2");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_build_where_with_filters() {
        let w = resolve_month("2025-01").unwrap();
        let filter = ReportFilter::new().division("North").centre(7);
        let (sql, params) = filter.build_where(&w, DivisionScope::Reporting);
        assert!(sql.contains("d.is_active = 1 AND d.is_reporting = 1"));
        assert!(sql.contains("d.name = ?3"));
        assert!(sql.contains("c.centre_id = ?4"));
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn test_reporting_unless_named() {
        let w = resolve_month("2025-01").unwrap();
        let (sql, _) = ReportFilter::new().build_where(&w, DivisionScope::ReportingUnlessNamed);
        assert!(sql.contains("d.is_reporting = 1"));

        let (sql, _) = ReportFilter::new()
            .division("Field")
            .build_where(&w, DivisionScope::ReportingUnlessNamed);
        assert!(!sql.contains("is_reporting"));
        assert!(sql.contains("d.name = ?3"));
    }

    #[test]
    fn test_blank_division_ignored() {
        let filter = ReportFilter::new().division("   ");
        assert!(filter.division_name().is_none());
    }

    #[test]
    fn test_revenue_source_parse() {
        assert_eq!("otc".parse::<RevenueSource>().unwrap(), RevenueSource::Otc);
        assert_eq!("Patient".parse::<RevenueSource>().unwrap(), RevenueSource::Patient);
        assert_eq!("combined".parse::<RevenueSource>().unwrap(), RevenueSource::Combined);
        assert!("pharmacy".parse::<RevenueSource>().is_err());
        assert!(RevenueSource::Combined.includes_visits());
        assert!(RevenueSource::Combined.includes_otc());
        assert!(!RevenueSource::Otc.includes_visits());
    }
}

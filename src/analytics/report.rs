//! Google Analytics Data API report rows and the dashboard summary built from them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DIMENSIONS: [&str; 4] = ["country", "deviceCategory", "city", "pagePath"];
pub const METRICS: [&str; 4] = [
    "activeUsers",
    "newUsers",
    "averageSessionDuration",
    "totalUsers",
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReportResponse {
    #[serde(default)]
    pub rows: Vec<ReportRow>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    #[serde(default)]
    pub dimension_values: Vec<ReportValue>,
    #[serde(default)]
    pub metric_values: Vec<ReportValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportValue {
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub new_users: i64,
    pub returning_users: i64,
    pub geo: BTreeMap<String, i64>,
    pub devices: BTreeMap<String, i64>,
    pub cities: BTreeMap<String, i64>,
    pub exit_pages: BTreeMap<String, i64>,
    pub avg_session_duration: f64,
}

impl AnalyticsSummary {
    /// Reshape the report in one pass. Metrics are positional, in `METRICS` order.
    pub fn from_rows(rows: &[ReportRow]) -> Result<Self> {
        let mut summary = Self::default();
        if rows.is_empty() {
            return Ok(summary);
        }

        let mut total_duration = 0.0;
        for (index, row) in rows.iter().enumerate() {
            let active = int_metric(row, 0).with_context(|| format!("row {}", index))?;
            let new = int_metric(row, 1).with_context(|| format!("row {}", index))?;
            total_duration += float_metric(row, 2).with_context(|| format!("row {}", index))?;

            summary.new_users += new;
            summary.returning_users += active - new;
            for (slot, tally) in [
                &mut summary.geo,
                &mut summary.devices,
                &mut summary.cities,
                &mut summary.exit_pages,
            ]
            .into_iter()
            .enumerate()
            {
                let key = dimension(row, slot).with_context(|| format!("row {}", index))?;
                *tally.entry(key.to_string()).or_insert(0) += active;
            }
        }
        summary.avg_session_duration = total_duration / rows.len() as f64;

        Ok(summary)
    }
}

fn dimension(row: &ReportRow, slot: usize) -> Result<&str> {
    row.dimension_values
        .get(slot)
        .map(|v| v.value.as_str())
        .with_context(|| format!("missing dimension {}", DIMENSIONS[slot]))
}

fn metric(row: &ReportRow, slot: usize) -> Result<&str> {
    row.metric_values
        .get(slot)
        .map(|v| v.value.trim())
        .with_context(|| format!("missing metric {}", METRICS[slot]))
}

fn int_metric(row: &ReportRow, slot: usize) -> Result<i64> {
    let raw = metric(row, slot)?;
    raw.parse::<i64>()
        .with_context(|| format!("{} is not an integer: {:?}", METRICS[slot], raw))
}

fn float_metric(row: &ReportRow, slot: usize) -> Result<f64> {
    let raw = metric(row, slot)?;
    raw.parse::<f64>()
        .with_context(|| format!("{} is not a number: {:?}", METRICS[slot], raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report(value: serde_json::Value) -> RunReportResponse {
        serde_json::from_value(value).unwrap()
    }

    fn row(dims: [&str; 4], metrics: [&str; 4]) -> serde_json::Value {
        json!({
            "dimensionValues": dims.iter().map(|d| json!({"value": d})).collect::<Vec<_>>(),
            "metricValues": metrics.iter().map(|m| json!({"value": m})).collect::<Vec<_>>(),
        })
    }

    #[test]
    fn test_empty_report_is_all_zero() {
        let summary = AnalyticsSummary::from_rows(&report(json!({})).rows).unwrap();
        assert_eq!(summary, AnalyticsSummary::default());
        assert_eq!(
            serde_json::to_value(&summary).unwrap(),
            json!({
                "newUsers": 0,
                "returningUsers": 0,
                "geo": {},
                "devices": {},
                "cities": {},
                "exitPages": {},
                "avgSessionDuration": 0.0,
            })
        );
    }

    #[test]
    fn test_rows_are_tallied_by_dimension() {
        let response = report(json!({
            "rows": [
                row(["Bangladesh", "mobile", "Dhaka", "/"], ["10", "4", "30.0", "12"]),
                row(["Bangladesh", "desktop", "Chittagong", "/blog"], ["5", "5", "60.0", "5"]),
                row(["Germany", "mobile", "Berlin", "/"], ["3", "1", "90.0", "3"]),
            ]
        }));
        let summary = AnalyticsSummary::from_rows(&response.rows).unwrap();

        assert_eq!(summary.new_users, 10);
        assert_eq!(summary.returning_users, 8);
        assert_eq!(summary.geo["Bangladesh"], 15);
        assert_eq!(summary.geo["Germany"], 3);
        assert_eq!(summary.devices["mobile"], 13);
        assert_eq!(summary.cities["Berlin"], 3);
        assert_eq!(summary.exit_pages["/"], 13);
        assert!((summary.avg_session_duration - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unparsable_metric_is_an_error() {
        let response = report(json!({
            "rows": [row(["BD", "mobile", "Dhaka", "/"], ["many", "1", "2.0", "1"])]
        }));
        assert!(AnalyticsSummary::from_rows(&response.rows).is_err());
    }
}

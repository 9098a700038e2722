use serde::{Deserialize, Serialize};

use super::record::deserialize_decimal;

/// Aggregated trip statistics from `/dashboard/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct DashboardData {
    #[serde(rename = "totalMiles", default, deserialize_with = "deserialize_decimal")]
    pub total_miles: f64,
    #[serde(rename = "totalPay", default, deserialize_with = "deserialize_decimal")]
    pub total_pay: f64,
    #[serde(rename = "recordCount", default)]
    pub record_count: u64,
    #[serde(rename = "recentRecords", default)]
    pub recent_records: Vec<RecordSummary>,
    #[serde(rename = "monthlyData", default)]
    pub monthly_data: Vec<MonthlySummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct RecordSummary {
    pub id: i64,
    pub date: String,
    #[serde(default)]
    pub po_number: String,
    #[serde(default, deserialize_with = "deserialize_decimal")]
    pub miles: f64,
    #[serde(default, deserialize_with = "deserialize_decimal")]
    pub pay: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct MonthlySummary {
    pub month: String,
    #[serde(default, deserialize_with = "deserialize_decimal")]
    pub miles: f64,
    #[serde(default, deserialize_with = "deserialize_decimal")]
    pub pay: f64,
}

impl DashboardData {
    /// Average pay per loaded mile, or None with no miles logged
    pub fn pay_per_mile(&self) -> Option<f64> {
        if self.total_miles > 0.0 {
            Some(self.total_pay / self.total_miles)
        } else {
            None
        }
    }

    /// Month with the most miles
    pub fn busiest_month(&self) -> Option<&MonthlySummary> {
        self.monthly_data
            .iter()
            .max_by(|a, b| a.miles.total_cmp(&b.miles))
    }
}

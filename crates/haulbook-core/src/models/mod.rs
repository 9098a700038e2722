//! Data models for the records API.
//!
//! - `TransportRecord`, `RecordInput`: a single trip and its editable fields
//! - `DashboardData`: aggregated totals, recent trips and monthly figures
//! - Sorting and search helpers used by record listings

pub mod dashboard;
pub mod record;

pub use dashboard::{DashboardData, MonthlySummary, RecordSummary};
pub use record::{filter_records, sort_records, RecordInput, RecordSortColumn, TransportRecord};

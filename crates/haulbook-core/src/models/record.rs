use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One trip as stored by the records API.
/// Decimal fields arrive as strings (`"123.45"`) or numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct TransportRecord {
    pub id: i64,
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub date: NaiveDate,
    #[serde(default)]
    pub po_number: String,
    #[serde(default)]
    pub location_from: String,
    #[serde(default)]
    pub location_to: String,
    #[serde(default, deserialize_with = "deserialize_decimal")]
    pub dh_miles: f64,
    #[serde(default, deserialize_with = "deserialize_decimal")]
    pub miles: f64,
    #[serde(default, deserialize_with = "deserialize_decimal")]
    pub fuel: f64,
    #[serde(default, deserialize_with = "deserialize_decimal")]
    pub food: f64,
    #[serde(default, deserialize_with = "deserialize_decimal")]
    pub lumper: f64,
    #[serde(default, deserialize_with = "deserialize_decimal")]
    pub pay: f64,
}

/// Body for creating or updating a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct RecordInput {
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub date: NaiveDate,
    pub po_number: String,
    pub location_from: String,
    pub location_to: String,
    pub dh_miles: f64,
    pub miles: f64,
    pub fuel: f64,
    pub food: f64,
    pub lumper: f64,
    pub pay: f64,
}

impl TransportRecord {
    /// Loaded plus deadhead miles
    pub fn total_miles(&self) -> f64 {
        self.miles + self.dh_miles
    }

    pub fn expenses(&self) -> f64 {
        self.fuel + self.food + self.lumper
    }

    /// Pay after trip expenses
    pub fn net_pay(&self) -> f64 {
        self.pay - self.expenses()
    }

    /// Editable copy of this record, for the update form
    pub fn to_input(&self) -> RecordInput {
        RecordInput {
            date: self.date,
            po_number: self.po_number.clone(),
            location_from: self.location_from.clone(),
            location_to: self.location_to.clone(),
            dh_miles: self.dh_miles,
            miles: self.miles,
            fuel: self.fuel,
            food: self.food,
            lumper: self.lumper,
            pay: self.pay,
        }
    }
}

// ============================================================================
// Sorting and search
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordSortColumn {
    #[default]
    Date,
    PoNumber,
    From,
    To,
    Miles,
    Pay,
}

impl RecordSortColumn {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "date" => Some(RecordSortColumn::Date),
            "po" | "po_number" => Some(RecordSortColumn::PoNumber),
            "from" => Some(RecordSortColumn::From),
            "to" => Some(RecordSortColumn::To),
            "miles" => Some(RecordSortColumn::Miles),
            "pay" => Some(RecordSortColumn::Pay),
            _ => None,
        }
    }

    fn compare(self, a: &TransportRecord, b: &TransportRecord) -> Ordering {
        match self {
            RecordSortColumn::Date => a.date.cmp(&b.date),
            RecordSortColumn::PoNumber => a.po_number.cmp(&b.po_number),
            RecordSortColumn::From => cmp_ignore_case(&a.location_from, &b.location_from),
            RecordSortColumn::To => cmp_ignore_case(&a.location_to, &b.location_to),
            RecordSortColumn::Miles => a.miles.total_cmp(&b.miles),
            RecordSortColumn::Pay => a.pay.total_cmp(&b.pay),
        }
    }
}

fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

/// Sort in place. Ties keep their original order.
pub fn sort_records(records: &mut [TransportRecord], column: RecordSortColumn, ascending: bool) {
    records.sort_by(|a, b| {
        let ord = column.compare(a, b);
        if ascending {
            ord
        } else {
            ord.reverse()
        }
    });
}

/// Records whose PO number, locations or date contain `query` (case-insensitive).
/// An empty query matches everything.
pub fn filter_records<'a>(records: &'a [TransportRecord], query: &str) -> Vec<&'a TransportRecord> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return records.iter().collect();
    }
    records
        .iter()
        .filter(|r| {
            r.po_number.to_lowercase().contains(&needle)
                || r.location_from.to_lowercase().contains(&needle)
                || r.location_to.to_lowercase().contains(&needle)
                || r.date.to_string().contains(&needle)
        })
        .collect()
}

// Helper to deserialize decimal strings or numbers as f64
pub(crate) fn deserialize_decimal<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de;

    struct DecimalVisitor;

    impl<'de> de::Visitor<'de> for DecimalVisitor {
        type Value = f64;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a number or decimal string")
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
            Ok(v)
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
            Ok(v as f64)
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
            Ok(v as f64)
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                return Ok(0.0);
            }
            trimmed
                .parse()
                .map_err(|_| E::custom(format!("invalid decimal: {}", v)))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E> {
            Ok(0.0)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(0.0)
        }
    }

    deserializer.deserialize_any(DecimalVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, date: &str, po: &str, from: &str, pay: f64) -> TransportRecord {
        TransportRecord {
            id,
            date: date.parse().unwrap(),
            po_number: po.to_string(),
            location_from: from.to_string(),
            location_to: "Dallas, TX".to_string(),
            dh_miles: 0.0,
            miles: 100.0,
            fuel: 0.0,
            food: 0.0,
            lumper: 0.0,
            pay,
        }
    }

    #[test]
    fn test_decimal_strings_and_numbers() {
        let json = r#"{
            "id": 3,
            "date": "2024-03-01",
            "po_number": "PO-77",
            "location_from": "Tulsa, OK",
            "location_to": "Austin, TX",
            "dh_miles": "12.50",
            "miles": 431,
            "fuel": "210.00",
            "food": "",
            "lumper": null,
            "pay": "1250.75"
        }"#;
        let r: TransportRecord = serde_json::from_str(json).unwrap();
        assert_eq!(r.dh_miles, 12.5);
        assert_eq!(r.miles, 431.0);
        assert_eq!(r.food, 0.0);
        assert_eq!(r.lumper, 0.0);
        assert_eq!(r.total_miles(), 443.5);
        assert!((r.net_pay() - 1040.75).abs() < 1e-9);
    }

    #[test]
    fn test_bad_decimal_is_rejected() {
        let json = r#"{"id": 1, "date": "2024-03-01", "pay": "lots"}"#;
        assert!(serde_json::from_str::<TransportRecord>(json).is_err());
    }

    #[test]
    fn test_sort_by_date_descending() {
        let mut records = vec![
            record(1, "2024-01-05", "A", "Tulsa", 10.0),
            record(2, "2024-03-01", "B", "Austin", 30.0),
            record(3, "2024-02-10", "C", "boise", 20.0),
        ];
        sort_records(&mut records, RecordSortColumn::Date, false);
        let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);

        sort_records(&mut records, RecordSortColumn::From, true);
        let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_filter_records_case_insensitive() {
        let records = vec![
            record(1, "2024-01-05", "PO-100", "Tulsa, OK", 10.0),
            record(2, "2024-03-01", "PO-200", "Austin, TX", 30.0),
        ];
        let hits = filter_records(&records, "tulsa");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 1);
        assert_eq!(filter_records(&records, "po-2")[0].id, 2);
        assert_eq!(filter_records(&records, "  ").len(), 2);
        assert!(filter_records(&records, "reno").is_empty());
    }

    #[test]
    fn test_sort_column_parse() {
        assert_eq!(RecordSortColumn::parse("PAY"), Some(RecordSortColumn::Pay));
        assert_eq!(RecordSortColumn::parse("po"), Some(RecordSortColumn::PoNumber));
        assert_eq!(RecordSortColumn::parse("weight"), None);
    }
}

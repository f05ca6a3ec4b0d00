//! Source-row to backend-record mapping
//!
//! Every backend consumes the same typed [`Record`]s, produced from raw rows by
//! one static [`SchemaMapping`]. Missing and null source values are replaced by
//! the field's default, which keeps the comparison fair: float columns become
//! `0.0`, count-like integer columns become `1`, text and timestamps stay null.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::ConversionError;

/// A row as handed over by the external dataset loader
pub type RawRow = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Int,
    Float,
    Timestamp,
}

impl FieldType {
    fn name(self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Timestamp => "timestamp",
        }
    }

    fn accepts(self, value: &FieldValue) -> bool {
        matches!(
            (self, value),
            (_, FieldValue::Null)
                | (FieldType::Text, FieldValue::Text(_))
                | (FieldType::Int, FieldValue::Int(_))
                | (FieldType::Float, FieldValue::Float(_))
                | (FieldType::Timestamp, FieldValue::Timestamp(_))
        )
    }
}

/// Typed column value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Text(String),
    Int(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(f) => Some(*f),
            FieldValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Null => write!(f, "null"),
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// One row of the static mapping table
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMapping {
    pub target: &'static str,
    /// Source column names, first match wins
    pub sources: &'static [&'static str],
    pub ty: FieldType,
    pub default: FieldValue,
}

impl FieldMapping {
    const fn new(
        target: &'static str,
        sources: &'static [&'static str],
        ty: FieldType,
        default: FieldValue,
    ) -> Self {
        Self {
            target,
            sources,
            ty,
            default,
        }
    }

    fn text(target: &'static str, sources: &'static [&'static str]) -> Self {
        Self::new(target, sources, FieldType::Text, FieldValue::Null)
    }

    fn timestamp(target: &'static str, sources: &'static [&'static str]) -> Self {
        Self::new(target, sources, FieldType::Timestamp, FieldValue::Null)
    }

    fn count(target: &'static str, sources: &'static [&'static str]) -> Self {
        Self::new(target, sources, FieldType::Int, FieldValue::Int(1))
    }

    fn amount(target: &'static str, sources: &'static [&'static str]) -> Self {
        Self::new(target, sources, FieldType::Float, FieldValue::Float(0.0))
    }
}

/// A mapped, typed record ready for a backend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    values: BTreeMap<&'static str, FieldValue>,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Static table describing one backend table and how source rows fill it
#[derive(Debug, Clone)]
pub struct SchemaMapping {
    pub table: &'static str,
    pub partition_key: &'static str,
    pub clustering_keys: &'static [&'static str],
    pub fields: Vec<FieldMapping>,
}

impl SchemaMapping {
    /// NYC yellow taxi trips, the workload both backends are compared on
    pub fn taxi_trips() -> Self {
        Self {
            table: "yellow_taxi_trips",
            partition_key: "vendor_id",
            clustering_keys: &["pickup_datetime", "dropoff_datetime"],
            fields: vec![
                FieldMapping::text("vendor_id", &["VendorID", "vendor_id"]),
                FieldMapping::timestamp(
                    "pickup_datetime",
                    &["tpep_pickup_datetime", "pickup_datetime"],
                ),
                FieldMapping::timestamp(
                    "dropoff_datetime",
                    &["tpep_dropoff_datetime", "dropoff_datetime"],
                ),
                FieldMapping::count("passenger_count", &["passenger_count"]),
                FieldMapping::amount("trip_distance", &["trip_distance"]),
                FieldMapping::count("rate_code_id", &["RatecodeID", "rate_code_id"]),
                FieldMapping::text("store_and_fwd_flag", &["store_and_fwd_flag"]),
                FieldMapping::text("payment_type", &["payment_type"]),
                FieldMapping::amount("fare_amount", &["fare_amount"]),
                FieldMapping::amount("extra", &["extra"]),
                FieldMapping::amount("mta_tax", &["mta_tax"]),
                FieldMapping::amount("tip_amount", &["tip_amount"]),
                FieldMapping::amount("tolls_amount", &["tolls_amount"]),
                FieldMapping::amount("improvement_surcharge", &["improvement_surcharge"]),
                FieldMapping::amount("total_amount", &["total_amount"]),
                FieldMapping::amount("congestion_surcharge", &["congestion_surcharge"]),
                FieldMapping::amount("airport_fee", &["Airport_fee", "airport_fee"]),
            ],
        }
    }

    /// Check the table once, before any row goes through it
    pub fn validate(&self) -> Result<(), ConversionError> {
        let invalid = |reason: String| ConversionError::InvalidMapping { reason };

        let mut targets = HashSet::new();
        let mut sources = HashSet::new();

        for field in &self.fields {
            if field.target.is_empty() {
                return Err(invalid("empty target field name".to_string()));
            }
            if !targets.insert(field.target) {
                return Err(invalid(format!("duplicate target field {}", field.target)));
            }
            if field.sources.is_empty() {
                return Err(invalid(format!("{} has no source column", field.target)));
            }
            for source in field.sources {
                if !sources.insert(*source) {
                    return Err(invalid(format!("source column {} mapped twice", source)));
                }
            }
            if !field.ty.accepts(&field.default) {
                return Err(invalid(format!(
                    "default for {} is not a {} value",
                    field.target,
                    field.ty.name()
                )));
            }
        }

        for key in std::iter::once(&self.partition_key).chain(self.clustering_keys) {
            if !targets.contains(key) {
                return Err(invalid(format!("key column {} is not mapped", key)));
            }
        }

        Ok(())
    }

    /// Map a batch of raw rows
    ///
    /// `first_row` is the dataset index of `rows[0]`; errors report dataset
    /// indexes so a failing row can be found in the source.
    pub fn prepare(
        &self,
        rows: &[RawRow],
        first_row: usize,
    ) -> Result<Vec<Record>, ConversionError> {
        rows.iter()
            .enumerate()
            .map(|(index, row)| self.prepare_row(first_row + index, row))
            .collect()
    }

    pub fn prepare_row(&self, row_index: usize, row: &RawRow) -> Result<Record, ConversionError> {
        let mut values = BTreeMap::new();

        for field in &self.fields {
            let raw = field
                .sources
                .iter()
                .find_map(|source| row.get(*source))
                .filter(|value| !value.is_null());

            let value = match raw {
                Some(raw) => convert(row_index, field, raw)?,
                None => field.default.clone(),
            };
            values.insert(field.target, value);
        }

        Ok(Record { values })
    }
}

fn convert(row: usize, field: &FieldMapping, raw: &Value) -> Result<FieldValue, ConversionError> {
    let mismatch = || ConversionError::TypeMismatch {
        row,
        field: field.target.to_string(),
        expected: field.ty.name(),
        value: raw.to_string(),
    };

    match field.ty {
        FieldType::Text => match raw {
            Value::String(s) => Ok(FieldValue::Text(s.clone())),
            Value::Number(n) => Ok(FieldValue::Text(match n.as_f64() {
                Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => {
                    format!("{}", f as i64)
                }
                _ => n.to_string(),
            })),
            Value::Bool(b) => Ok(FieldValue::Text(b.to_string())),
            _ => Err(mismatch()),
        },
        FieldType::Int => match raw {
            Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => Ok(FieldValue::Int(i)),
                (None, Some(f)) if f.is_finite() => Ok(FieldValue::Int(f.trunc() as i64)),
                _ => Err(mismatch()),
            },
            Value::String(s) => {
                let s = s.trim();
                if let Ok(i) = s.parse::<i64>() {
                    Ok(FieldValue::Int(i))
                } else {
                    match s.parse::<f64>() {
                        Ok(f) if f.is_finite() => Ok(FieldValue::Int(f.trunc() as i64)),
                        _ => Err(mismatch()),
                    }
                }
            }
            _ => Err(mismatch()),
        },
        FieldType::Float => match raw {
            Value::Number(n) => n.as_f64().map(FieldValue::Float).ok_or_else(mismatch),
            Value::String(s) => match s.trim().parse::<f64>() {
                Ok(f) if f.is_finite() => Ok(FieldValue::Float(f)),
                _ => Err(mismatch()),
            },
            _ => Err(mismatch()),
        },
        FieldType::Timestamp => {
            let invalid = || ConversionError::InvalidTimestamp {
                row,
                field: field.target.to_string(),
                value: raw.to_string(),
            };
            match raw {
                Value::String(s) => parse_timestamp(s).map(FieldValue::Timestamp).ok_or_else(invalid),
                // Epoch milliseconds, as columnar exports write them
                Value::Number(n) => n
                    .as_i64()
                    .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                    .map(FieldValue::Timestamp)
                    .ok_or_else(invalid),
                _ => Err(invalid()),
            }
        }
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

//! Decodes CSV or JSON station datasets into typed rows.
//!
//! Decoding itself is left to `csv` and `serde_json`; this module maps each
//! record's fields onto [`Row`] or [`WeatherRow`]. A record that cannot be
//! mapped is logged and skipped so one bad line never hides the rest of a
//! dataset.

use crate::analyzers::types::{HOURS_PER_DAY, Row, WeatherRow};
use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

/// Why a single record was rejected.
#[derive(Debug, Error, PartialEq)]
pub enum RowError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("unparseable date `{0}`")]
    InvalidDate(String),
    #[error("field `{field}` is not a number: `{value}`")]
    InvalidNumber { field: String, value: String },
    #[error("field `{field}` is negative: {value}")]
    Negative { field: String, value: f64 },
    #[error("row carries no measured days")]
    NoMeasurements,
    #[error("implausible NumMeasures: {0}")]
    ImplausibleMeasures(f64),
}

/// Upper bound for `NumMeasures`: a pre-aggregated row covers at most one year.
pub const MAX_NUM_MEASURES: f64 = 366.0;

/// Decoded rows plus the number of records that were skipped.
#[derive(Debug)]
pub struct ParseOutcome<T> {
    pub rows: Vec<T>,
    pub skipped: usize,
}

/// One decoded record as field name to text value.
#[derive(Debug, Default, Clone)]
pub struct RawRecord {
    fields: HashMap<String, String>,
}

impl RawRecord {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        RawRecord {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.trim().to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Non-empty, trimmed value of `field`.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Finite number, `None` when the field is absent or blank.
    pub fn number(&self, field: &str) -> Result<Option<f64>, RowError> {
        let Some(raw) = self.get(field) else {
            return Ok(None);
        };
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(RowError::InvalidNumber {
                field: field.to_string(),
                value: raw.to_string(),
            }),
        }
    }

    /// Like [`number`](Self::number) but rejects negative values.
    pub fn count(&self, field: &str) -> Result<Option<f64>, RowError> {
        match self.number(field)? {
            Some(value) if value < 0.0 => Err(RowError::Negative {
                field: field.to_string(),
                value,
            }),
            other => Ok(other),
        }
    }
}

/// Accepts epoch milliseconds, RFC 3339, ISO date-times, ISO dates and
/// `dd.mm.yyyy`. Offsets are dropped in favour of the local wall time.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, RowError> {
    let raw = raw.trim();
    let invalid = || RowError::InvalidDate(raw.to_string());

    let digits = raw.strip_prefix('-').unwrap_or(raw);
    if digits.len() > 8 && digits.bytes().all(|b| b.is_ascii_digit()) {
        let ms: i64 = raw.parse().map_err(|_| invalid())?;
        return DateTime::from_timestamp_millis(ms)
            .map(|t| t.naive_utc())
            .ok_or_else(invalid);
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Ok(t.naive_local());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(t);
        }
    }
    for format in ["%Y-%m-%d", "%d.%m.%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(raw, format) {
            return Ok(d.and_time(NaiveTime::MIN));
        }
    }
    Err(invalid())
}

fn record_timestamp(rec: &RawRecord) -> Result<NaiveDateTime, RowError> {
    if let Some(raw) = rec.get("DateTimeFrom").or_else(|| rec.get("Date")) {
        return parse_timestamp(raw);
    }

    // Pre-aggregated rows only carry Year and an optional Month
    let year = rec.number("Year")?.ok_or(RowError::MissingField("Date"))?;
    let month = rec.number("Month")?.unwrap_or(1.0);
    NaiveDate::from_ymd_opt(year as i32, month as u32, 1)
        .map(|d| d.and_time(NaiveTime::MIN))
        .ok_or_else(|| RowError::InvalidDate(format!("{year}-{month}")))
}

impl TryFrom<&RawRecord> for Row {
    type Error = RowError;

    fn try_from(rec: &RawRecord) -> Result<Self, Self::Error> {
        let timestamp = record_timestamp(rec)?;
        let direction_name = rec
            .fields
            .get("DirectionName")
            .ok_or(RowError::MissingField("DirectionName"))?
            .trim()
            .to_string();

        let mut hours = [None; HOURS_PER_DAY];
        for (h, slot) in hours.iter_mut().enumerate() {
            *slot = rec.count(&h.to_string())?;
        }

        let num_measures = match rec.count("NumMeasures")? {
            Some(n) if n < 1.0 => return Err(RowError::NoMeasurements),
            Some(n) if n > MAX_NUM_MEASURES => return Err(RowError::ImplausibleMeasures(n)),
            Some(n) => Some(n.round() as u32),
            None => None,
        };

        let total = match rec.count("Total")? {
            Some(total) => total,
            None if hours.iter().any(Option::is_some) => hours.iter().flatten().sum(),
            None => return Err(RowError::MissingField("Total")),
        };

        Ok(Row {
            timestamp,
            direction_name,
            total,
            hours,
            num_measures,
        })
    }
}

impl TryFrom<&RawRecord> for WeatherRow {
    type Error = RowError;

    fn try_from(rec: &RawRecord) -> Result<Self, Self::Error> {
        let raw = rec.get("Date").ok_or(RowError::MissingField("Date"))?;
        Ok(WeatherRow {
            date: parse_timestamp(raw)?.date(),
            temperature_max: rec.number("TempMax")?,
            temperature_min: rec.number("TempMin")?,
            precipitation: rec.count("Precipitation")?,
        })
    }
}

fn looks_like_json(bytes: &[u8]) -> bool {
    matches!(
        bytes.iter().find(|b| !b.is_ascii_whitespace()),
        Some(b'[') | Some(b'{')
    )
}

fn csv_records(bytes: &[u8]) -> Result<ParseOutcome<RawRecord>> {
    // Swiss open-data exports are usually semicolon separated
    let header_line = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
    let delimiter = if header_line.contains(&b';') { b';' } else { b',' };

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(bytes);
    let headers: Vec<String> = rdr
        .byte_headers()?
        .iter()
        .map(|h| String::from_utf8_lossy(h).into_owned())
        .collect();

    let mut rows = Vec::new();
    let mut skipped = 0;
    for result in rdr.byte_records() {
        let record = result?;
        // Latin-1 exports are skipped per record, not for the whole file
        let fields: Result<Vec<&str>, _> = record.iter().map(std::str::from_utf8).collect();
        match fields {
            Ok(fields) => rows.push(RawRecord::from_pairs(
                headers.iter().map(String::as_str).zip(fields),
            )),
            Err(e) => {
                let line = record.position().map(|p| p.line());
                warn!(line = ?line, error = %e, "Skipping record with invalid UTF-8");
                skipped += 1;
            }
        }
    }
    Ok(ParseOutcome { rows, skipped })
}

fn json_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn json_records(bytes: &[u8]) -> Result<ParseOutcome<RawRecord>> {
    let value: Value = serde_json::from_slice(bytes)?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("results") {
            Some(Value::Array(items)) => items,
            _ => bail!("JSON dataset must be an array or an object with a `results` array"),
        },
        _ => bail!("JSON dataset must be an array or an object with a `results` array"),
    };

    let mut rows = Vec::with_capacity(items.len());
    let mut skipped = 0;
    for (index, item) in items.iter().enumerate() {
        let Some(obj) = item.as_object() else {
            warn!(record = index + 1, "Skipping JSON item that is not an object");
            skipped += 1;
            continue;
        };
        rows.push(RawRecord {
            fields: obj
                .iter()
                .filter_map(|(k, v)| json_scalar(v).map(|v| (k.clone(), v)))
                .collect(),
        });
    }
    Ok(ParseOutcome { rows, skipped })
}

/// Splits a CSV or JSON payload into raw records. The format is detected from
/// the first non-whitespace byte. `skipped` counts records that could not even
/// be split into fields.
pub fn parse_records(bytes: &[u8]) -> Result<ParseOutcome<RawRecord>> {
    if looks_like_json(bytes) {
        json_records(bytes)
    } else {
        csv_records(bytes)
    }
}

fn convert<T>(records: ParseOutcome<RawRecord>) -> ParseOutcome<T>
where
    T: for<'a> TryFrom<&'a RawRecord, Error = RowError>,
{
    let ParseOutcome {
        rows: records,
        mut skipped,
    } = records;
    let mut rows = Vec::with_capacity(records.len());

    for (line, rec) in records.iter().enumerate() {
        match T::try_from(rec) {
            Ok(row) => rows.push(row),
            Err(e) => {
                warn!(record = line + 1, error = %e, "Skipping malformed record");
                skipped += 1;
            }
        }
    }

    debug!(rows = rows.len(), skipped, "Records decoded");
    ParseOutcome { rows, skipped }
}

/// Decodes traffic-count rows.
///
/// # Errors
///
/// Fails only when the payload as a whole is not valid CSV or JSON;
/// individual bad records are skipped.
pub fn parse_rows(bytes: &[u8]) -> Result<ParseOutcome<Row>> {
    Ok(convert(parse_records(bytes)?))
}

/// Decodes daily weather rows.
pub fn parse_weather(bytes: &[u8]) -> Result<ParseOutcome<WeatherRow>> {
    Ok(convert(parse_records(bytes)?))
}

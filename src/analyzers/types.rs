//! Data types used by the aggregation pipeline.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

/// Number of hour columns carried by a full-day hourly row.
pub const HOURS_PER_DAY: usize = 24;

const WEEKDAY_LABELS: [&str; 7] = ["Mo", "Di", "Mi", "Do", "Fr", "Sa", "So"];
const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mär", "Apr", "Mai", "Jun", "Jul", "Aug", "Sep", "Okt", "Nov", "Dez",
];

/// A single traffic-count observation for one direction of a counting station.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub timestamp: NaiveDateTime,
    pub direction_name: String,
    pub total: f64,
    /// Hour columns `0..=23`; `None` means the hour was not measured.
    pub hours: [Option<f64>; HOURS_PER_DAY],
    /// Measured days represented by a pre-aggregated (monthly/yearly) row.
    pub num_measures: Option<u32>,
}

impl Row {
    /// Builds a plain daily row without hour columns.
    pub fn daily(timestamp: NaiveDateTime, direction_name: &str, total: f64) -> Self {
        Row {
            timestamp,
            direction_name: direction_name.to_string(),
            total,
            hours: [None; HOURS_PER_DAY],
            num_measures: None,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// Day of week, `0 = Monday .. 6 = Sunday`.
    pub fn weekday(&self) -> u8 {
        self.timestamp.weekday().num_days_from_monday() as u8
    }

    /// Epoch milliseconds of the naive timestamp read as UTC.
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.and_utc().timestamp_millis()
    }

    pub fn has_hours(&self) -> bool {
        self.hours.iter().any(Option::is_some)
    }
}

/// One day of weather measurements, joined onto daily traffic series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherRow {
    pub date: NaiveDate,
    pub temperature_max: Option<f64>,
    pub temperature_min: Option<f64>,
    pub precipitation: Option<f64>,
}

/// Time-unit grouping key produced by a [`TimeUnit`](super::aggregate::TimeUnit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum Bucket {
    Hour(u8),
    /// `0 = Monday .. 6 = Sunday`.
    Weekday(u8),
    /// `0 = January .. 11 = December`.
    Month(u8),
    Year(i32),
    Date(NaiveDate),
}

impl Bucket {
    /// Axis label shown by the presentation layer.
    pub fn label(&self) -> String {
        match *self {
            Bucket::Hour(h) => format!("{:02}:00", h),
            Bucket::Weekday(d) => WEEKDAY_LABELS
                .get(d as usize)
                .map_or_else(|| d.to_string(), |l| l.to_string()),
            Bucket::Month(m) => MONTH_LABELS
                .get(m as usize)
                .map_or_else(|| m.to_string(), |l| l.to_string()),
            Bucket::Year(y) => y.to_string(),
            Bucket::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Summed traffic for one `(unit, direction)` pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregate {
    pub unit: Bucket,
    pub direction_name: String,
    pub total: f64,
    /// Distinct measured days behind `total`; the DTV denominator.
    pub number_of_days: u32,
}

/// Per-axis DTV table consumed by charts and grids.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DenseTable {
    pub axis: String,
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dtv_ri1: Option<Vec<Option<f64>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dtv_ri2: Option<Vec<Option<f64>>>,
    pub dtv_total: Vec<Option<f64>>,
    pub dtv_abweichung: Vec<Option<f64>>,
    pub average_dtv_total: Option<f64>,
    pub is_single_direction: bool,
}

/// Box-plot statistics of one bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiveNumberSummary {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

/// Five-number summary as emitted to charts; all `None` for an empty bucket.
pub type BoxPlotPoint = [Option<f64>; 5];

impl FiveNumberSummary {
    pub fn to_point(self) -> BoxPlotPoint {
        [
            Some(self.min),
            Some(self.q1),
            Some(self.median),
            Some(self.q3),
            Some(self.max),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxPlotSeries {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: Vec<BoxPlotPoint>,
}

/// `[timestamp_ms, value]` pair of a time series.
pub type SeriesPoint = (i64, Option<f64>);

/// Daily series joined with the weather of the same date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyWeatherPoint {
    pub timestamp: i64,
    pub date: NaiveDate,
    pub traffic: Option<f64>,
    pub temperature_max: Option<f64>,
    pub temperature_min: Option<f64>,
    pub precipitation: Option<f64>,
}

/// Day-level series of the daily view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySeries {
    pub total: Vec<SeriesPoint>,
    pub by_direction: Vec<DirectionSeries>,
    pub rolling_average: Vec<SeriesPoint>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub weather: Vec<DailyWeatherPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectionSeries {
    pub name: String,
    pub data: Vec<SeriesPoint>,
}

/// Time axis a dashboard view aggregates along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// Complete result for one dashboard view, serialized as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct ViewReport {
    pub granularity: Granularity,
    pub generated_at: DateTime<Utc>,
    pub row_count: usize,
    pub direction_names: Vec<String>,
    pub is_single_direction: bool,
    pub aggregated_data: Vec<Aggregate>,
    pub table: DenseTable,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub box_plots: Vec<BoxPlotSeries>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily: Option<DailySeries>,
}

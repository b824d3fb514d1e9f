use crate::analyzers::types::{DailyWeatherPoint, SeriesPoint, WeatherRow};
use chrono::{DateTime, NaiveDate};
use std::collections::HashMap;
use tracing::warn;

/// Pairs each daily traffic point with the weather of its date.
///
/// Weather fields stay `None` for dates without a weather row. When the
/// weather source repeats a date, the last row wins.
pub fn join_weather(series: &[SeriesPoint], weather: &[WeatherRow]) -> Vec<DailyWeatherPoint> {
    let by_date: HashMap<NaiveDate, &WeatherRow> = weather.iter().map(|w| (w.date, w)).collect();

    series
        .iter()
        .filter_map(|&(timestamp, traffic)| {
            let Some(date) = DateTime::from_timestamp_millis(timestamp).map(|t| t.date_naive())
            else {
                warn!(timestamp, "Timestamp out of range, dropping point");
                return None;
            };
            let w = by_date.get(&date);
            Some(DailyWeatherPoint {
                timestamp,
                date,
                traffic,
                temperature_max: w.and_then(|w| w.temperature_max),
                temperature_min: w.and_then(|w| w.temperature_min),
                precipitation: w.and_then(|w| w.precipitation),
            })
        })
        .collect()
}

use crate::analyzers::aggregate::{Aggregation, DayMask, TimeUnit, aggregate};
use crate::analyzers::dense::{build_dense_table, direction_columns};
use crate::analyzers::distribution::box_plot_series;
use crate::analyzers::filter::{TimeRange, filter_time_range};
use crate::analyzers::rolling::rolling_average;
use crate::analyzers::types::{
    Bucket, DailySeries, DirectionSeries, Granularity, Row, SeriesPoint, ViewReport, WeatherRow,
};
use crate::analyzers::utility::sum_present;
use crate::analyzers::weather::join_weather;
use chrono::{NaiveTime, Utc};
use tracing::{info, warn};

/// Series name of the all-directions box plot.
pub const TOTAL_SERIES_NAME: &str = "Total";

impl Granularity {
    pub fn time_unit(self) -> TimeUnit {
        match self {
            Granularity::Hourly => TimeUnit::Hour,
            Granularity::Daily => TimeUnit::Date,
            Granularity::Weekly => TimeUnit::Weekday,
            Granularity::Monthly => TimeUnit::Month,
            Granularity::Yearly => TimeUnit::Year,
        }
    }

    /// Box plots only exist on fixed-length axes.
    pub fn has_box_plots(self) -> bool {
        self.time_unit().fixed_axis().is_some()
    }
}

/// Selection a dashboard view is computed for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewRequest {
    pub granularity: Granularity,
    pub range: Option<TimeRange>,
    pub day_mask: DayMask,
}

impl ViewRequest {
    pub fn new(granularity: Granularity) -> Self {
        ViewRequest {
            granularity,
            range: None,
            day_mask: DayMask::ALL,
        }
    }

    pub fn with_range(mut self, range: Option<TimeRange>) -> Self {
        self.range = range;
        self
    }

    pub fn with_day_mask(mut self, day_mask: DayMask) -> Self {
        self.day_mask = day_mask;
        self
    }
}

/// Computes every structure a dashboard view needs from raw rows.
///
/// Filters by the request's time range, aggregates along the granularity's
/// time unit, then derives the dense DTV table, box plots (hour, weekday and
/// month axes) and, for the daily view, the day series with its rolling
/// average.
#[tracing::instrument(skip(rows, request), fields(rows = rows.len(), granularity = ?request.granularity))]
pub fn analyze_view(rows: &[Row], request: &ViewRequest) -> ViewReport {
    let filtered;
    let rows = match request.range {
        Some(range) => {
            filtered = filter_time_range(rows, range);
            filtered.as_slice()
        }
        None => rows,
    };

    let aggregation = aggregate(rows, request.granularity.time_unit(), request.day_mask);
    let table = build_dense_table(&aggregation);

    let box_plots = if request.granularity.has_box_plots() {
        box_plot_series(&aggregation, TOTAL_SERIES_NAME)
    } else {
        Vec::new()
    };

    let daily = (request.granularity == Granularity::Daily).then(|| daily_series(&aggregation));

    info!(
        row_count = rows.len(),
        directions = aggregation.direction_names.len(),
        buckets = table.labels.len(),
        average_dtv_total = ?table.average_dtv_total,
        "View computed"
    );

    ViewReport {
        granularity: request.granularity,
        generated_at: Utc::now(),
        row_count: rows.len(),
        is_single_direction: aggregation.is_single_direction(),
        direction_names: aggregation.direction_names,
        aggregated_data: aggregation.aggregated_data,
        table,
        box_plots,
        daily,
    }
}

fn bucket_timestamp(bucket: &Bucket) -> Option<i64> {
    match bucket {
        Bucket::Date(d) => Some(d.and_time(NaiveTime::MIN).and_utc().timestamp_millis()),
        _ => None,
    }
}

/// Per-date series of a date-bucketed aggregation: daily totals, one series
/// per direction, and the rolling average of the totals.
pub fn daily_series(aggregation: &Aggregation) -> DailySeries {
    let axis: Vec<Bucket> = aggregation
        .axis()
        .into_iter()
        .filter(|b| matches!(b, Bucket::Date(_)))
        .collect();
    let timestamps: Vec<i64> = axis.iter().filter_map(bucket_timestamp).collect();
    let columns = direction_columns(aggregation, &axis);

    let total: Vec<SeriesPoint> = timestamps
        .iter()
        .enumerate()
        .map(|(i, ts)| (*ts, sum_present(columns.iter().map(|c| c[i]))))
        .collect();

    let by_direction = aggregation
        .direction_names
        .iter()
        .zip(columns)
        .map(|(name, column)| DirectionSeries {
            name: name.clone(),
            data: timestamps.iter().copied().zip(column).collect(),
        })
        .collect();

    let rolling_average = rolling_average(&total);

    DailySeries {
        total,
        by_direction,
        rolling_average,
        weather: Vec::new(),
    }
}

impl ViewReport {
    /// Attaches weather to the daily series. Other views are returned unchanged.
    pub fn with_weather(mut self, weather: &[WeatherRow]) -> Self {
        match self.daily.as_mut() {
            Some(daily) => daily.weather = join_weather(&daily.total, weather),
            None => warn!(
                granularity = ?self.granularity,
                "Weather is only joined onto the daily view"
            ),
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn sample_rows() -> Vec<Row> {
        (1..=10)
            .flat_map(|d| {
                [
                    Row::daily(at(2024, 1, d), "1 Richtung X", 100.0 + d as f64),
                    Row::daily(at(2024, 1, d), "2 Richtung Y", 50.0),
                ]
            })
            .collect()
    }

    #[test]
    fn test_weekly_view_has_box_plots() {
        let report = analyze_view(&sample_rows(), &ViewRequest::new(Granularity::Weekly));

        assert_eq!(report.row_count, 20);
        assert_eq!(report.direction_names.len(), 2);
        assert!(!report.is_single_direction);
        assert_eq!(report.table.labels.len(), 7);
        assert_eq!(report.box_plots.len(), 3);
        assert!(report.daily.is_none());
    }

    #[test]
    fn test_daily_view_series() {
        let report = analyze_view(&sample_rows(), &ViewRequest::new(Granularity::Daily));
        let daily = report.daily.unwrap();

        assert!(report.box_plots.is_empty());
        assert_eq!(daily.total.len(), 10);
        assert_eq!(daily.total[0].1, Some(151.0));
        assert_eq!(daily.by_direction.len(), 2);
        assert_eq!(daily.by_direction[1].data[0].1, Some(50.0));
        assert_eq!(daily.rolling_average.len(), 10);
        // first point averages only itself
        assert_eq!(daily.rolling_average[0].1, Some(151.0));
        // day 7 averages days 1..=7: 150 + mean(1..=7)
        assert_eq!(daily.rolling_average[6].1, Some(154.0));
    }

    #[test]
    fn test_range_and_mask_are_applied() {
        let range = TimeRange::from_dates(
            Some(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
            Some(NaiveDate::from_ymd_opt(2024, 1, 7).unwrap()),
        );
        let request = ViewRequest::new(Granularity::Weekly)
            .with_range(range)
            .with_day_mask(DayMask::WEEKDAYS);

        let report = analyze_view(&sample_rows(), &request);

        assert_eq!(report.row_count, 14);
        assert!(report.table.dtv_total[..5].iter().all(Option::is_some));
        assert_eq!(report.table.dtv_total[5], None);
        assert_eq!(report.table.dtv_total[6], None);
    }

    #[test]
    fn test_yearly_view() {
        let mut row = Row::daily(at(2021, 6, 1), "1", 3000.0);
        row.num_measures = Some(30);
        let report = analyze_view(&[row], &ViewRequest::new(Granularity::Yearly));

        assert!(report.box_plots.is_empty());
        assert_eq!(report.table.labels, vec!["2021"]);
        assert_eq!(report.table.dtv_total, vec![Some(100.0)]);
        assert!(report.table.is_single_direction);
    }

    #[test]
    fn test_with_weather_only_touches_daily() {
        let weather = vec![WeatherRow {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            temperature_max: Some(4.0),
            temperature_min: Some(-2.0),
            precipitation: Some(1.2),
        }];

        let daily = analyze_view(&sample_rows(), &ViewRequest::new(Granularity::Daily))
            .with_weather(&weather);
        let points = daily.daily.unwrap().weather;
        assert_eq!(points.len(), 10);
        assert_eq!(points[1].temperature_min, Some(-2.0));
        assert_eq!(points[0].temperature_min, None);

        let monthly = analyze_view(&sample_rows(), &ViewRequest::new(Granularity::Monthly))
            .with_weather(&weather);
        assert!(monthly.daily.is_none());
    }

    #[test]
    fn test_empty_rows() {
        let report = analyze_view(&[], &ViewRequest::new(Granularity::Hourly));

        assert_eq!(report.row_count, 0);
        assert_eq!(report.table.dtv_total, vec![None; 24]);
        assert!(report.aggregated_data.is_empty());
        assert!(report.box_plots.iter().all(|s| s.data.iter().all(|p| *p == [None; 5])));
    }
}

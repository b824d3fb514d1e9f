//! Dense per-axis DTV tables.
//!
//! Turns the sparse output of [`aggregate`](super::aggregate::aggregate) into
//! fixed columns: one daily average per direction, their sum, and each
//! bucket's deviation from the mean of that sum.

use crate::analyzers::aggregate::Aggregation;
use crate::analyzers::types::{Bucket, DenseTable};
use crate::analyzers::utility::{deviation_pct, mean_present, safe_div, sum_present};
use std::collections::HashMap;

/// Daily-average column per direction over `axis`, `None` where a direction
/// has no data.
pub fn direction_columns(aggregation: &Aggregation, axis: &[Bucket]) -> Vec<Vec<Option<f64>>> {
    let positions: HashMap<Bucket, usize> =
        axis.iter().enumerate().map(|(i, b)| (*b, i)).collect();
    let mut columns = vec![vec![None; axis.len()]; aggregation.direction_names.len()];

    for agg in &aggregation.aggregated_data {
        let (Some(&i), Some(d)) = (
            positions.get(&agg.unit),
            aggregation.direction_index(&agg.direction_name),
        ) else {
            continue;
        };
        columns[d][i] = safe_div(agg.total, agg.number_of_days as f64);
    }

    columns
}

/// Builds the dense DTV table on the aggregation's own axis.
pub fn build_dense_table(aggregation: &Aggregation) -> DenseTable {
    let axis = aggregation.axis();
    let columns = direction_columns(aggregation, &axis);

    let dtv_total: Vec<Option<f64>> = (0..axis.len())
        .map(|i| sum_present(columns.iter().map(|c| c[i])))
        .collect();
    let average_dtv_total = mean_present(&dtv_total);
    let dtv_abweichung = dtv_total
        .iter()
        .map(|t| match (t, average_dtv_total) {
            (Some(t), Some(avg)) => deviation_pct(*t, avg),
            _ => None,
        })
        .collect();

    let is_single_direction = aggregation.is_single_direction();
    let mut columns = columns.into_iter();
    let (dtv_ri1, dtv_ri2) = if is_single_direction {
        (None, None)
    } else {
        (columns.next(), columns.next())
    };

    DenseTable {
        axis: aggregation.time_unit.axis_name().to_string(),
        labels: axis.iter().map(Bucket::label).collect(),
        dtv_ri1,
        dtv_ri2,
        dtv_total,
        dtv_abweichung,
        average_dtv_total,
        is_single_direction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::aggregate::{DayMask, TimeUnit, aggregate};
    use crate::analyzers::types::{HOURS_PER_DAY, Row};
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_hourly_daily_average() {
        let mut monday = Row::daily(at(2024, 1, 1), "1", 100.0);
        monday.hours = [Some(0.0); HOURS_PER_DAY];
        monday.hours[8] = Some(100.0);
        let mut next_monday = Row::daily(at(2024, 1, 8), "1", 50.0);
        next_monday.hours = [Some(0.0); HOURS_PER_DAY];
        next_monday.hours[8] = Some(50.0);
        // Two directions so the per-direction column is emitted
        let mut other = Row::daily(at(2024, 1, 1), "2", 0.0);
        other.hours = [Some(0.0); HOURS_PER_DAY];

        let agg = aggregate(&[monday, next_monday, other], TimeUnit::Hour, DayMask::WEEKDAYS);
        let table = build_dense_table(&agg);

        assert_eq!(table.labels.len(), 24);
        assert_eq!(table.dtv_ri1.as_ref().unwrap()[8], Some(75.0));
        assert_eq!(table.dtv_total[8], Some(75.0));
        assert_eq!(table.dtv_total[9], Some(0.0));
    }

    // Same station as `test_hourly_view_single_direction` in the integration
    // tests: one direction, so the hour-8 average is carried by `dtv_total`.
    #[test]
    fn test_hourly_single_direction_average_in_total() {
        let mut monday = Row::daily(at(2024, 1, 1), "1", 100.0);
        monday.hours = [Some(0.0); HOURS_PER_DAY];
        monday.hours[8] = Some(100.0);
        let mut next_monday = Row::daily(at(2024, 1, 8), "1", 50.0);
        next_monday.hours = [Some(0.0); HOURS_PER_DAY];
        next_monday.hours[8] = Some(50.0);

        let agg = aggregate(&[monday, next_monday], TimeUnit::Hour, DayMask::WEEKDAYS);
        let table = build_dense_table(&agg);

        assert!(table.is_single_direction);
        assert!(table.dtv_ri1.is_none());
        assert_eq!(table.dtv_total[8], Some(75.0));
        assert_eq!(table.average_dtv_total, Some(75.0 / 24.0));
    }

    #[test]
    fn test_single_direction_collapse() {
        let rows = vec![
            Row::daily(at(2024, 1, 1), "1 Richtung X", 10.0),
            Row::daily(at(2024, 2, 1), "1 Richtung X", 30.0),
        ];

        let agg = aggregate(&rows, TimeUnit::Month, DayMask::ALL);
        assert_eq!(agg.direction_names.len(), 1);

        let table = build_dense_table(&agg);
        assert!(table.is_single_direction);
        assert!(table.dtv_ri1.is_none());
        assert!(table.dtv_ri2.is_none());
        assert_eq!(table.dtv_total[0], Some(10.0));

        let json = serde_json::to_value(&table).unwrap();
        assert!(json.get("dtv_ri2").is_none());
        assert!(json.get("dtv_total").is_some());
    }

    #[test]
    fn test_empty_month_is_null_and_excluded_from_average() {
        let rows = vec![
            Row::daily(at(2024, 1, 1), "1", 100.0),
            Row::daily(at(2024, 1, 1), "2", 100.0),
            Row::daily(at(2024, 3, 1), "1", 50.0),
            Row::daily(at(2024, 3, 1), "2", 50.0),
        ];

        let agg = aggregate(&rows, TimeUnit::Month, DayMask::ALL);
        let table = build_dense_table(&agg);

        assert_eq!(table.dtv_total.len(), 12);
        assert_eq!(table.dtv_total[0], Some(200.0));
        assert_eq!(table.dtv_total[1], None);
        assert_eq!(table.dtv_total[2], Some(100.0));
        assert_eq!(table.average_dtv_total, Some(150.0));
        assert_eq!(table.dtv_abweichung[1], None);
        assert_eq!(table.dtv_abweichung[11], None);
        let dev0 = table.dtv_abweichung[0].unwrap();
        assert!((dev0 - 133.333_333).abs() < 1e-4);
    }

    #[test]
    fn test_deviation_recovers_average() {
        let rows: Vec<Row> = (1..=7)
            .map(|d| Row::daily(at(2024, 1, d), "1", (d * 10) as f64))
            .collect();

        let agg = aggregate(&rows, TimeUnit::Weekday, DayMask::ALL);
        let table = build_dense_table(&agg);
        let avg = table.average_dtv_total.unwrap();

        let deviation_sum: f64 = table.dtv_abweichung.iter().flatten().sum();
        assert!((deviation_sum - 700.0).abs() < 1e-9);

        for (total, dev) in table.dtv_total.iter().zip(&table.dtv_abweichung) {
            let recovered = total.unwrap() / (dev.unwrap() / 100.0);
            assert!((recovered - avg).abs() < 1e-9);
        }
    }

    #[test]
    fn test_zero_average_yields_null_deviation() {
        let rows = vec![Row::daily(at(2024, 1, 1), "1", 0.0)];

        let agg = aggregate(&rows, TimeUnit::Weekday, DayMask::ALL);
        let table = build_dense_table(&agg);

        assert_eq!(table.dtv_total[0], Some(0.0));
        assert_eq!(table.average_dtv_total, Some(0.0));
        assert!(table.dtv_abweichung.iter().all(Option::is_none));
    }

    #[test]
    fn test_empty_input_is_null_filled() {
        let agg = aggregate(&[], TimeUnit::Hour, DayMask::ALL);
        let table = build_dense_table(&agg);

        assert_eq!(table.dtv_total, vec![None; 24]);
        assert_eq!(table.dtv_abweichung, vec![None; 24]);
        assert_eq!(table.average_dtv_total, None);
        assert!(table.is_single_direction);
    }
}

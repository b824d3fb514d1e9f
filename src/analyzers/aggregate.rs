use crate::analyzers::types::{Aggregate, Bucket, HOURS_PER_DAY, Row};
use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Counting stations report at most two directions.
pub const MAX_DIRECTIONS: usize = 2;

/// Bucketing strategy of the aggregation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    /// Hour of day; expands each row into its hour columns.
    Hour,
    Weekday,
    Month,
    Year,
    /// The calendar date itself.
    Date,
}

impl TimeUnit {
    /// Splits a row into the `(bucket, value)` observations it contributes.
    pub fn observations(self, row: &Row) -> Vec<(Bucket, f64)> {
        match self {
            TimeUnit::Hour => row
                .hours
                .iter()
                .enumerate()
                .filter_map(|(h, v)| v.map(|v| (Bucket::Hour(h as u8), v)))
                .collect(),
            TimeUnit::Weekday => vec![(Bucket::Weekday(row.weekday()), row.total)],
            TimeUnit::Month => vec![(Bucket::Month(row.timestamp.month0() as u8), row.total)],
            TimeUnit::Year => vec![(Bucket::Year(row.timestamp.year()), row.total)],
            TimeUnit::Date => vec![(Bucket::Date(row.date()), row.total)],
        }
    }

    /// Fixed-length axis for hour, weekday and month units.
    pub fn fixed_axis(self) -> Option<Vec<Bucket>> {
        match self {
            TimeUnit::Hour => Some((0..HOURS_PER_DAY as u8).map(Bucket::Hour).collect()),
            TimeUnit::Weekday => Some((0..7).map(Bucket::Weekday).collect()),
            TimeUnit::Month => Some((0..12).map(Bucket::Month).collect()),
            TimeUnit::Year | TimeUnit::Date => None,
        }
    }

    /// Dense axis covering `observed`: the fixed axis, every year between the
    /// first and last observed year, or the observed dates in order.
    pub fn axis(self, observed: impl IntoIterator<Item = Bucket>) -> Vec<Bucket> {
        if let Some(axis) = self.fixed_axis() {
            return axis;
        }
        let observed: BTreeSet<Bucket> = observed.into_iter().collect();
        match self {
            TimeUnit::Year => {
                let years = observed.iter().filter_map(|b| match b {
                    Bucket::Year(y) => Some(*y),
                    _ => None,
                });
                let (first, last) = years.fold((i32::MAX, i32::MIN), |(lo, hi), y| {
                    (lo.min(y), hi.max(y))
                });
                if first > last {
                    Vec::new()
                } else {
                    (first..=last).map(Bucket::Year).collect()
                }
            }
            _ => observed.into_iter().collect(),
        }
    }

    pub fn axis_name(self) -> &'static str {
        match self {
            TimeUnit::Hour => "hour",
            TimeUnit::Weekday => "weekday",
            TimeUnit::Month => "month",
            TimeUnit::Year => "year",
            TimeUnit::Date => "date",
        }
    }
}

/// Which days of the week contribute to an aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayMask {
    /// Monday to Friday.
    pub weekdays: bool,
    /// Saturday and Sunday.
    pub weekends: bool,
}

impl DayMask {
    pub const ALL: DayMask = DayMask {
        weekdays: true,
        weekends: true,
    };
    pub const WEEKDAYS: DayMask = DayMask {
        weekdays: true,
        weekends: false,
    };
    pub const WEEKENDS: DayMask = DayMask {
        weekdays: false,
        weekends: true,
    };

    /// `weekday` uses `0 = Monday .. 6 = Sunday`.
    pub fn includes(&self, weekday: u8) -> bool {
        if weekday <= 4 {
            self.weekdays
        } else {
            self.weekends
        }
    }
}

impl Default for DayMask {
    fn default() -> Self {
        DayMask::ALL
    }
}

/// Direction names of a station in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectionSet {
    names: Vec<String>,
}

impl DirectionSet {
    /// Index of `name`, registering it if there is room. Blank names and
    /// names beyond [`MAX_DIRECTIONS`] are unrecognized.
    pub fn resolve(&mut self, name: &str) -> Option<usize> {
        if name.trim().is_empty() {
            return None;
        }
        if let Some(i) = self.names.iter().position(|n| n == name) {
            return Some(i);
        }
        if self.names.len() >= MAX_DIRECTIONS {
            return None;
        }
        self.names.push(name.to_string());
        Some(self.names.len() - 1)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_single_direction(&self) -> bool {
        self.names.len() <= 1
    }

    pub fn into_names(self) -> Vec<String> {
        self.names
    }
}

/// Output of [`aggregate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub time_unit: TimeUnit,
    /// Sparse; one entry per populated `(unit, direction)` pair.
    pub aggregated_data: Vec<Aggregate>,
    pub direction_names: Vec<String>,
    /// Raw observations per direction (aligned with `direction_names`), per bucket.
    pub raw_values_by_bucket_by_direction: Vec<BTreeMap<Bucket, Vec<f64>>>,
    /// Per bucket, one value per contributing date: the sum over directions.
    pub raw_values_by_bucket_total: BTreeMap<Bucket, Vec<f64>>,
    /// Rows dropped for an unrecognized direction.
    pub skipped_rows: usize,
}

impl Aggregation {
    pub fn is_single_direction(&self) -> bool {
        self.direction_names.len() <= 1
    }

    /// Dense axis for this aggregation's time unit.
    pub fn axis(&self) -> Vec<Bucket> {
        self.time_unit
            .axis(self.aggregated_data.iter().map(|a| a.unit))
    }

    pub fn direction_index(&self, name: &str) -> Option<usize> {
        self.direction_names.iter().position(|n| n == name)
    }
}

#[derive(Default)]
struct Cell {
    total: f64,
    /// Measured days per contributing date.
    days: BTreeMap<NaiveDate, u32>,
}

/// Groups rows by `time_unit` bucket and direction.
///
/// Rows on days excluded by `day_mask` are ignored. Each cell sums the
/// observed values and records the dates it was measured on; a row carrying
/// `num_measures` counts that many days for its date. Rows with a blank or a
/// third direction name are logged and skipped.
pub fn aggregate(rows: &[Row], time_unit: TimeUnit, day_mask: DayMask) -> Aggregation {
    let mut directions = DirectionSet::default();
    let mut cells: BTreeMap<(Bucket, usize), Cell> = BTreeMap::new();
    let mut raw_by_direction: Vec<BTreeMap<Bucket, Vec<f64>>> = Vec::new();
    let mut total_by_bucket_date: BTreeMap<(Bucket, NaiveDate), f64> = BTreeMap::new();
    let mut skipped_rows = 0;

    for row in rows {
        let Some(direction) = directions.resolve(&row.direction_name) else {
            warn!(
                direction = %row.direction_name,
                timestamp = %row.timestamp,
                "Unrecognized direction, skipping row"
            );
            skipped_rows += 1;
            continue;
        };
        if raw_by_direction.len() <= direction {
            raw_by_direction.resize_with(direction + 1, BTreeMap::new);
        }

        if !day_mask.includes(row.weekday()) {
            continue;
        }

        let date = row.date();
        let day_weight = row.num_measures.unwrap_or(1);

        for (bucket, value) in time_unit.observations(row) {
            let cell = cells.entry((bucket, direction)).or_default();
            cell.total += value;
            cell.days.insert(date, day_weight);

            raw_by_direction[direction]
                .entry(bucket)
                .or_default()
                .push(value);
            *total_by_bucket_date.entry((bucket, date)).or_insert(0.0) += value;
        }
    }

    let direction_names = directions.into_names();

    let aggregated_data: Vec<Aggregate> = cells
        .into_iter()
        .map(|((unit, direction), cell)| Aggregate {
            unit,
            direction_name: direction_names[direction].clone(),
            total: cell.total,
            number_of_days: cell
                .days
                .values()
                .fold(0u32, |days, d| days.saturating_add(*d)),
        })
        .collect();

    let mut raw_values_by_bucket_total: BTreeMap<Bucket, Vec<f64>> = BTreeMap::new();
    for ((bucket, _date), value) in total_by_bucket_date {
        raw_values_by_bucket_total
            .entry(bucket)
            .or_default()
            .push(value);
    }

    debug!(
        unit = time_unit.axis_name(),
        rows = rows.len(),
        cells = aggregated_data.len(),
        directions = direction_names.len(),
        skipped_rows,
        "Aggregation complete"
    );

    Aggregation {
        time_unit,
        aggregated_data,
        direction_names,
        raw_values_by_bucket_by_direction: raw_by_direction,
        raw_values_by_bucket_total,
        skipped_rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn hourly(ts: NaiveDateTime, direction: &str, hour: usize, value: f64) -> Row {
        let mut row = Row::daily(ts, direction, value);
        row.hours = [Some(0.0); HOURS_PER_DAY];
        row.hours[hour] = Some(value);
        row
    }

    #[test]
    fn test_hourly_two_mondays() {
        // 2024-01-01 and 2024-01-08 are Mondays
        let rows = vec![
            hourly(at(2024, 1, 1), "1", 8, 100.0),
            hourly(at(2024, 1, 8), "1", 8, 50.0),
        ];

        let agg = aggregate(&rows, TimeUnit::Hour, DayMask::WEEKDAYS);
        let cell = agg
            .aggregated_data
            .iter()
            .find(|a| a.unit == Bucket::Hour(8) && a.direction_name == "1")
            .unwrap();

        assert_eq!(cell.total, 150.0);
        assert_eq!(cell.number_of_days, 2);
        assert_eq!(agg.aggregated_data.len(), 24);
    }

    #[test]
    fn test_day_mask_excludes_weekend_rows() {
        let rows = vec![
            Row::daily(at(2024, 1, 5), "1", 10.0), // Friday
            Row::daily(at(2024, 1, 6), "1", 20.0), // Saturday
            Row::daily(at(2024, 1, 7), "1", 30.0), // Sunday
        ];

        let weekdays = aggregate(&rows, TimeUnit::Weekday, DayMask::WEEKDAYS);
        assert_eq!(weekdays.aggregated_data.len(), 1);
        assert_eq!(weekdays.aggregated_data[0].unit, Bucket::Weekday(4));

        let weekends = aggregate(&rows, TimeUnit::Weekday, DayMask::WEEKENDS);
        let units: Vec<_> = weekends.aggregated_data.iter().map(|a| a.unit).collect();
        assert_eq!(units, vec![Bucket::Weekday(5), Bucket::Weekday(6)]);

        let none = aggregate(
            &rows,
            TimeUnit::Weekday,
            DayMask {
                weekdays: false,
                weekends: false,
            },
        );
        assert!(none.aggregated_data.is_empty());
    }

    #[test]
    fn test_directions_keep_first_seen_order() {
        let rows = vec![
            Row::daily(at(2024, 1, 1), "2 Richtung Y", 5.0),
            Row::daily(at(2024, 1, 1), "1 Richtung X", 7.0),
            Row::daily(at(2024, 1, 2), "2 Richtung Y", 5.0),
        ];

        let agg = aggregate(&rows, TimeUnit::Month, DayMask::ALL);
        assert_eq!(agg.direction_names, vec!["2 Richtung Y", "1 Richtung X"]);
        assert!(!agg.is_single_direction());
    }

    #[test]
    fn test_unrecognized_directions_are_skipped() {
        let rows = vec![
            Row::daily(at(2024, 1, 1), "1", 5.0),
            Row::daily(at(2024, 1, 1), "2", 7.0),
            Row::daily(at(2024, 1, 1), "3", 100.0),
            Row::daily(at(2024, 1, 1), "  ", 100.0),
        ];

        let agg = aggregate(&rows, TimeUnit::Date, DayMask::ALL);
        assert_eq!(agg.skipped_rows, 2);
        assert_eq!(agg.direction_names.len(), 2);

        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(agg.raw_values_by_bucket_total[&Bucket::Date(day)], vec![12.0]);
    }

    #[test]
    fn test_number_of_days_counts_distinct_dates() {
        let rows = vec![
            Row::daily(at(2024, 3, 4), "1", 10.0),
            Row::daily(at(2024, 3, 4), "2", 20.0),
            Row::daily(at(2024, 3, 5), "1", 30.0),
        ];

        let agg = aggregate(&rows, TimeUnit::Month, DayMask::ALL);
        let ri1 = &agg.aggregated_data[0];
        assert_eq!(ri1.direction_name, "1");
        assert_eq!(ri1.total, 40.0);
        assert_eq!(ri1.number_of_days, 2);
        let ri2 = &agg.aggregated_data[1];
        assert_eq!(ri2.number_of_days, 1);
    }

    #[test]
    fn test_num_measures_weights_days() {
        let mut jan = Row::daily(at(2022, 1, 1), "1", 3100.0);
        jan.num_measures = Some(31);
        let mut feb = Row::daily(at(2022, 2, 1), "1", 1400.0);
        feb.num_measures = Some(14);

        let agg = aggregate(&[jan, feb], TimeUnit::Year, DayMask::ALL);
        assert_eq!(agg.aggregated_data.len(), 1);
        assert_eq!(agg.aggregated_data[0].total, 4500.0);
        assert_eq!(agg.aggregated_data[0].number_of_days, 45);
    }

    #[test]
    fn test_num_measures_day_count_saturates() {
        let mut jan = Row::daily(at(2022, 1, 1), "1", 3100.0);
        jan.num_measures = Some(u32::MAX);
        let mut feb = Row::daily(at(2022, 2, 1), "1", 1400.0);
        feb.num_measures = Some(u32::MAX);

        let agg = aggregate(&[jan, feb], TimeUnit::Year, DayMask::ALL);
        assert_eq!(agg.aggregated_data[0].number_of_days, u32::MAX);
        assert_eq!(agg.aggregated_data[0].total, 4500.0);
    }

    #[test]
    fn test_raw_values_by_direction_and_total() {
        let rows = vec![
            Row::daily(at(2024, 1, 1), "1", 10.0),
            Row::daily(at(2024, 1, 1), "2", 20.0),
            Row::daily(at(2024, 1, 8), "1", 30.0),
        ];

        let agg = aggregate(&rows, TimeUnit::Weekday, DayMask::ALL);
        let monday = Bucket::Weekday(0);
        assert_eq!(agg.raw_values_by_bucket_by_direction[0][&monday], vec![10.0, 30.0]);
        assert_eq!(agg.raw_values_by_bucket_by_direction[1][&monday], vec![20.0]);
        assert_eq!(agg.raw_values_by_bucket_total[&monday], vec![30.0, 30.0]);
    }

    #[test]
    fn test_missing_hours_do_not_count_as_days() {
        let mut row = Row::daily(at(2024, 1, 1), "1", 0.0);
        row.hours[3] = Some(0.0);

        let agg = aggregate(&[row], TimeUnit::Hour, DayMask::ALL);
        assert_eq!(agg.aggregated_data.len(), 1);
        assert_eq!(agg.aggregated_data[0].unit, Bucket::Hour(3));
        assert_eq!(agg.aggregated_data[0].total, 0.0);
    }

    #[test]
    fn test_empty_input() {
        let agg = aggregate(&[], TimeUnit::Month, DayMask::ALL);
        assert!(agg.aggregated_data.is_empty());
        assert!(agg.direction_names.is_empty());
        assert_eq!(agg.axis().len(), 12);
        assert!(aggregate(&[], TimeUnit::Year, DayMask::ALL).axis().is_empty());
    }

    #[test]
    fn test_year_axis_fills_gaps() {
        let axis = TimeUnit::Year.axis([Bucket::Year(2020), Bucket::Year(2023)]);
        assert_eq!(
            axis,
            vec![
                Bucket::Year(2020),
                Bucket::Year(2021),
                Bucket::Year(2022),
                Bucket::Year(2023)
            ]
        );
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let rows = vec![
            Row::daily(at(2024, 5, 1), "1", 10.0),
            Row::daily(at(2024, 5, 2), "2", 20.0),
            Row::daily(at(2024, 6, 1), "1", 30.0),
        ];

        let first = aggregate(&rows, TimeUnit::Month, DayMask::ALL);
        let second = aggregate(&rows, TimeUnit::Month, DayMask::ALL);
        assert_eq!(first, second);
        assert!(
            first
                .aggregated_data
                .iter()
                .all(|a| a.total >= 0.0 && a.number_of_days >= 1)
        );
    }
}

//! Box-plot statistics per bucket.

use crate::analyzers::aggregate::Aggregation;
use crate::analyzers::types::{BoxPlotPoint, BoxPlotSeries, Bucket, FiveNumberSummary};
use std::collections::BTreeMap;

/// Linear-interpolation percentile of an ascending slice, `p` in `0..=100`.
/// A non-finite `p` yields `None`.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() || !p.is_finite() {
        return None;
    }
    let index = p.clamp(0.0, 100.0) / 100.0 * (sorted.len() - 1) as f64;
    let lower = index.floor() as usize;
    let fraction = index - lower as f64;
    if fraction == 0.0 || lower + 1 >= sorted.len() {
        return Some(sorted[lower]);
    }
    Some(sorted[lower] + (sorted[lower + 1] - sorted[lower]) * fraction)
}

/// Min, quartiles and max of `values`. Sorts a copy; non-finite values are
/// ignored. `None` when nothing is left.
pub fn quartiles(values: &[f64]) -> Option<FiveNumberSummary> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);

    Some(FiveNumberSummary {
        min: *sorted.first()?,
        q1: percentile(&sorted, 25.0)?,
        median: percentile(&sorted, 50.0)?,
        q3: percentile(&sorted, 75.0)?,
        max: *sorted.last()?,
    })
}

fn dense_points(values: &BTreeMap<Bucket, Vec<f64>>, axis: &[Bucket]) -> Vec<BoxPlotPoint> {
    axis.iter()
        .map(|bucket| {
            values
                .get(bucket)
                .and_then(|v| quartiles(v))
                .map_or([None; 5], FiveNumberSummary::to_point)
        })
        .collect()
}

/// One box-plot series per direction, then one named `total_label` over the
/// per-date totals. Every series spans the aggregation's full axis.
pub fn box_plot_series(aggregation: &Aggregation, total_label: &str) -> Vec<BoxPlotSeries> {
    let axis = aggregation.axis();

    let mut series: Vec<BoxPlotSeries> = aggregation
        .direction_names
        .iter()
        .zip(&aggregation.raw_values_by_bucket_by_direction)
        .map(|(name, values)| BoxPlotSeries {
            name: name.clone(),
            kind: "boxplot",
            data: dense_points(values, &axis),
        })
        .collect();

    series.push(BoxPlotSeries {
        name: total_label.to_string(),
        kind: "boxplot",
        data: dense_points(&aggregation.raw_values_by_bucket_total, &axis),
    });

    series
}

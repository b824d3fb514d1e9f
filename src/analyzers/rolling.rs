use crate::analyzers::types::SeriesPoint;
use crate::analyzers::utility::mean;
use std::collections::VecDeque;
use tracing::debug;

/// Points in the trailing window of [`rolling_average`].
pub const DEFAULT_WINDOW: usize = 7;

/// Trailing 7-point average of a time series.
///
/// See [`rolling_average_with_window`].
pub fn rolling_average(series: &[SeriesPoint]) -> Vec<SeriesPoint> {
    rolling_average_with_window(series, DEFAULT_WINDOW)
}

/// Trailing average over up to `window` points.
///
/// Works on a copy sorted by timestamp. Each output point averages the
/// non-null values among itself and the preceding `window - 1` points and is
/// `None` when all of them are null. The window counts points, not calendar
/// days, so gaps in the input stretch it.
pub fn rolling_average_with_window(series: &[SeriesPoint], window: usize) -> Vec<SeriesPoint> {
    let window = window.max(1);
    let mut sorted = series.to_vec();
    sorted.sort_by_key(|(ts, _)| *ts);

    let mut trailing: VecDeque<Option<f64>> = VecDeque::with_capacity(window);
    let mut out = Vec::with_capacity(sorted.len());

    for (ts, value) in sorted {
        trailing.push_back(value);
        if trailing.len() > window {
            trailing.pop_front();
        }
        let present: Vec<f64> = trailing.iter().flatten().copied().collect();
        out.push((ts, mean(&present)));
    }

    debug!(points = out.len(), window, "Computed rolling average");
    out
}

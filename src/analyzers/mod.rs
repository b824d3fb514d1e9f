//! Traffic-count aggregation and summary statistics.
//!
//! This module groups raw station rows into time buckets per direction,
//! turns bucket sums into daily averages (DTV) and deviations, and computes
//! rolling averages and box-plot distributions for the dashboard views.

pub mod aggregate;
pub mod analyzer;
pub mod dense;
pub mod distribution;
pub mod filter;
pub mod rolling;
pub mod types;
pub mod utility;
pub mod weather;

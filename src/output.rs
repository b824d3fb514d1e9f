//! Output formatting and persistence for view reports.
//!
//! Supports pretty-printing, JSON serialization, and CSV export of DTV tables.

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use crate::analyzers::types::DenseTable;
use csv::WriterBuilder;
use std::fs::File;
use std::io::Write;

/// Logs a value using Rust's debug pretty-print format.
pub fn print_pretty<T: std::fmt::Debug>(value: &T) {
    debug!("{:#?}", value);
}

/// Serializes `value` as JSON into `writer`.
pub fn write_json<W: Write, T: Serialize>(mut writer: W, value: &T, pretty: bool) -> Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut writer, value)?;
    } else {
        serde_json::to_writer(&mut writer, value)?;
    }
    writeln!(writer)?;
    Ok(())
}

/// Writes `value` as JSON to `path`, or to stdout when no path is given.
pub fn emit_json<T: Serialize>(path: Option<&str>, value: &T, pretty: bool) -> Result<()> {
    match path {
        Some(path) => {
            write_json(File::create(path)?, value, pretty)?;
            info!(path, "Report written");
        }
        None => write_json(std::io::stdout().lock(), value, pretty)?,
    }
    Ok(())
}

#[derive(Serialize)]
struct TableRecord<'a> {
    label: &'a str,
    dtv_ri1: Option<f64>,
    dtv_ri2: Option<f64>,
    dtv_total: Option<f64>,
    dtv_abweichung: Option<f64>,
}

/// Writes a [`DenseTable`] as CSV, one line per axis label.
///
/// Per-direction columns stay empty for single-direction stations.
pub fn write_table_csv(path: &str, table: &DenseTable) -> Result<()> {
    debug!(path, rows = table.labels.len(), "Writing DTV table CSV");

    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);

    let column = |c: &Option<Vec<Option<f64>>>, i: usize| {
        c.as_ref().and_then(|c| c.get(i).copied().flatten())
    };

    for (i, label) in table.labels.iter().enumerate() {
        writer.serialize(TableRecord {
            label,
            dtv_ri1: column(&table.dtv_ri1, i),
            dtv_ri2: column(&table.dtv_ri2, i),
            dtv_total: table.dtv_total.get(i).copied().flatten(),
            dtv_abweichung: table.dtv_abweichung.get(i).copied().flatten(),
        })?;
    }
    writer.flush()?;

    Ok(())
}

//! CLI entry point for the traffic DTV tool.
//!
//! Loads a counting station's dataset from a file, a URL or the station
//! catalog, computes one dashboard view (hourly, daily, weekly, monthly or
//! yearly) and writes it as JSON or as a CSV table.

use anyhow::{Result, bail};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::ffi::OsStr;
use std::path::Path;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use traffic_dtv::{
    analyzers::{
        aggregate::DayMask,
        analyzer::{ViewRequest, analyze_view},
        filter::TimeRange,
        types::{Granularity, ViewReport},
    },
    config::StationCatalog,
    output::{emit_json, print_pretty, write_table_csv},
    source::{DatasetSource, load_rows, load_weather},
};

#[derive(Parser)]
#[command(name = "traffic_dtv")]
#[command(about = "Aggregates traffic counting station data into dashboard views", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct ViewArgs {
    /// Path, URL, or `station:<id>` looked up in the station catalog
    #[arg(value_name = "SOURCE")]
    source: String,

    /// Time axis to aggregate along
    #[arg(short, long, value_enum, default_value_t = Granularity::Weekly)]
    granularity: Granularity,

    /// First day to include (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Leave out Monday to Friday
    #[arg(long, default_value_t = false)]
    no_weekdays: bool,

    /// Leave out Saturday and Sunday
    #[arg(long, default_value_t = false)]
    no_weekends: bool,

    /// Station catalog file (defaults to $STATION_CATALOG, then stations.json)
    #[arg(long)]
    catalog: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a dashboard view and print it as JSON
    View {
        #[command(flatten)]
        args: ViewArgs,

        /// Weather dataset joined onto the daily view
        #[arg(long)]
        weather: Option<String>,

        /// File to write the JSON report to (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Pretty-print the JSON
        #[arg(long, default_value_t = false)]
        pretty: bool,
    },
    /// Print the box-plot series of an hourly, weekly or monthly view
    Boxplot {
        #[command(flatten)]
        args: ViewArgs,

        /// File to write the JSON series to (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Pretty-print the JSON
        #[arg(long, default_value_t = false)]
        pretty: bool,
    },
    /// Export the DTV table of a view as CSV
    ExportCsv {
        #[command(flatten)]
        args: ViewArgs,

        /// CSV file to write
        #[arg(short, long, default_value = "dtv.csv")]
        output: String,
    },
    /// List the stations of the catalog
    ListStations {
        /// Station catalog file (defaults to $STATION_CATALOG, then stations.json)
        #[arg(long)]
        catalog: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/traffic_dtv.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("traffic_dtv.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::View {
            args,
            weather,
            output,
            pretty,
        } => {
            let report = build_report(&args, weather.as_deref()).await?;
            print_pretty(&report);
            emit_json(output.as_deref(), &report, pretty)?;
        }
        Commands::Boxplot {
            args,
            output,
            pretty,
        } => {
            if !args.granularity.has_box_plots() {
                bail!("box plots need an hourly, weekly or monthly granularity");
            }
            let report = build_report(&args, None).await?;
            emit_json(output.as_deref(), &report.box_plots, pretty)?;
        }
        Commands::ExportCsv { args, output } => {
            let report = build_report(&args, None).await?;
            write_table_csv(&output, &report.table)?;
            info!(path = %output, rows = report.table.labels.len(), "DTV table exported");
        }
        Commands::ListStations { catalog } => {
            let catalog = load_catalog(catalog.as_deref())?;

            info!(total = catalog.len(), "Station catalog loaded");

            for (id, station) in catalog.iter() {
                info!(
                    station_id = id,
                    station_name = %station.name,
                    remote = DatasetSource::new(&station.counts).is_remote(),
                    has_weather = station.weather.is_some(),
                    "Station"
                );
            }
        }
    }

    Ok(())
}

fn load_catalog(path: Option<&str>) -> Result<StationCatalog> {
    match path {
        Some(path) => StationCatalog::load(path),
        None => StationCatalog::load_from_env(),
    }
}

/// Resolves the traffic and weather datasets a view reads from.
///
/// `station:<id>` goes through the catalog; the catalog's weather dataset is
/// used for daily views unless `--weather` overrides it.
fn resolve_sources(
    args: &ViewArgs,
    weather: Option<&str>,
) -> Result<(DatasetSource, Option<DatasetSource>)> {
    let Some(station_id) = args.source.strip_prefix("station:") else {
        return Ok((
            DatasetSource::new(&args.source),
            weather.map(DatasetSource::new),
        ));
    };

    let catalog = load_catalog(args.catalog.as_deref())?;
    let counts = catalog.counts_source(station_id)?;
    let weather = match weather {
        Some(w) => Some(DatasetSource::new(w)),
        None if args.granularity == Granularity::Daily => catalog.weather_source(station_id)?,
        None => None,
    };
    Ok((counts, weather))
}

/// Loads rows and computes the view selected by `args`.
#[tracing::instrument(skip(args, weather), fields(source = %args.source, granularity = ?args.granularity))]
async fn build_report(args: &ViewArgs, weather: Option<&str>) -> Result<ViewReport> {
    if let (Some(from), Some(to)) = (args.from, args.to) {
        if from > to {
            bail!("--from {from} is after --to {to}");
        }
    }

    let (counts, weather) = resolve_sources(args, weather)?;
    let rows = load_rows(&counts).await?;

    let request = ViewRequest::new(args.granularity)
        .with_range(TimeRange::from_dates(args.from, args.to))
        .with_day_mask(DayMask {
            weekdays: !args.no_weekdays,
            weekends: !args.no_weekends,
        });
    let report = analyze_view(&rows, &request);

    match weather {
        Some(source) => {
            let weather = load_weather(&source).await?;
            Ok(report.with_weather(&weather))
        }
        None => Ok(report),
    }
}

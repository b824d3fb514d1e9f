//! Loads station datasets from local files or HTTP URLs.

use crate::analyzers::types::{Row, WeatherRow};
use crate::fetch::{ApiKey, BasicClient, fetch_bytes};
use crate::parser::{ParseOutcome, parse_rows, parse_weather};
use anyhow::{Context, Result};
use tracing::{info, warn};

/// Location of one dataset plus the API key needed to download it.
#[derive(Debug, Clone)]
pub struct DatasetSource {
    pub location: String,
    api_key: Option<String>,
}

impl DatasetSource {
    pub fn new(location: &str) -> Self {
        DatasetSource {
            location: location.to_string(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    /// Reads the API key from the environment variable `var`, if given.
    pub fn with_key_from_env(self, var: Option<&str>) -> Result<Self> {
        match var {
            Some(var) => {
                let key = std::env::var(var)
                    .with_context(|| format!("API key variable `{var}` is not set"))?;
                Ok(self.with_api_key(&key))
            }
            None => Ok(self),
        }
    }

    pub fn is_remote(&self) -> bool {
        self.location.starts_with("http://") || self.location.starts_with("https://")
    }
}

/// Reads a dataset from disk or downloads it.
#[tracing::instrument(skip(source), fields(source = %source.location))]
pub async fn load_bytes(source: &DatasetSource) -> Result<Vec<u8>> {
    if !source.is_remote() {
        return std::fs::read(&source.location)
            .with_context(|| format!("failed to read `{}`", source.location));
    }

    let client = BasicClient::new()?;
    match source.api_key.as_deref() {
        Some(key) => fetch_bytes(&ApiKey::portal(client, key)?, &source.location).await,
        None => fetch_bytes(&client, &source.location).await,
    }
}

fn report<T>(kind: &str, source: &DatasetSource, outcome: ParseOutcome<T>) -> Vec<T> {
    if outcome.skipped > 0 {
        warn!(
            source = %source.location,
            skipped = outcome.skipped,
            kept = outcome.rows.len(),
            "Some {kind} records were malformed and skipped"
        );
    }
    info!(source = %source.location, rows = outcome.rows.len(), "Loaded {kind} rows");
    outcome.rows
}

/// Loads and decodes traffic-count rows.
pub async fn load_rows(source: &DatasetSource) -> Result<Vec<Row>> {
    let bytes = load_bytes(source).await?;
    Ok(report("traffic", source, parse_rows(&bytes)?))
}

/// Loads and decodes weather rows.
pub async fn load_weather(source: &DatasetSource) -> Result<Vec<WeatherRow>> {
    let bytes = load_bytes(source).await?;
    Ok(report("weather", source, parse_weather(&bytes)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    #[test]
    fn test_is_remote() {
        assert!(DatasetSource::new("https://data.example/x.csv").is_remote());
        assert!(!DatasetSource::new("data/x.csv").is_remote());
    }

    #[tokio::test]
    async fn test_load_rows_from_file() {
        let path = temp_path("traffic_dtv_test_source.csv");
        fs::write(&path, "Date,DirectionName,Total\n2024-01-01,1,10\nbad,1,1\n").unwrap();

        let rows = load_rows(&DatasetSource::new(&path)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total, 10.0);

        fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let source = DatasetSource::new(&temp_path("traffic_dtv_does_not_exist.csv"));
        assert!(load_bytes(&source).await.is_err());
    }
}

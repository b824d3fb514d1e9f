use crate::source::DatasetSource;
use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Environment variable naming the catalog file.
pub const CATALOG_ENV: &str = "STATION_CATALOG";
pub const DEFAULT_CATALOG_PATH: &str = "stations.json";

/// Where a counting station's datasets live.
#[derive(Debug, Clone, Deserialize)]
pub struct StationEntry {
    pub name: String,
    /// Path or URL of the traffic-count dataset.
    pub counts: String,
    /// Path or URL of the matching weather dataset.
    #[serde(default)]
    pub weather: Option<String>,
    /// Environment variable holding the portal API key, if the portal needs one.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

/// Maps station ids to their datasets.
///
/// Stored as a plain JSON object on disk:
/// ```json
/// {
///   "404": { "name": "Dreirosenbrücke", "counts": "data/404_MIV.csv" },
///   "802": {
///     "name": "Elisabethenanlage",
///     "counts": "https://data.bs.ch/api/explore/v2.1/catalog/datasets/100013/exports/csv",
///     "weather": "data/weather.csv",
///     "api_key_env": "BS_OPENDATA_KEY"
///   }
/// }
/// ```
#[derive(Debug, Default)]
pub struct StationCatalog {
    entries: BTreeMap<String, StationEntry>,
}

impl StationCatalog {
    /// Loads the catalog from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read station catalog `{path}`"))?;
        Self::from_json(&content)
    }

    /// Loads the catalog named by `STATION_CATALOG`, or `stations.json`.
    pub fn load_from_env() -> Result<Self> {
        let path = std::env::var(CATALOG_ENV).unwrap_or_else(|_| DEFAULT_CATALOG_PATH.to_string());
        Self::load(&path)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let entries: BTreeMap<String, StationEntry> = serde_json::from_str(content)?;
        Ok(Self { entries })
    }

    pub fn get(&self, station_id: &str) -> Option<&StationEntry> {
        self.entries.get(station_id)
    }

    /// Iterates over all `(station_id, entry)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &StationEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, station_id: &str) -> Result<&StationEntry> {
        self.get(station_id)
            .ok_or_else(|| anyhow!("station `{station_id}` is not in the catalog"))
    }

    /// Traffic-count dataset of a station, with its API key resolved.
    pub fn counts_source(&self, station_id: &str) -> Result<DatasetSource> {
        let entry = self.entry(station_id)?;
        DatasetSource::new(&entry.counts).with_key_from_env(entry.api_key_env.as_deref())
    }

    /// Weather dataset of a station, if one is configured.
    pub fn weather_source(&self, station_id: &str) -> Result<Option<DatasetSource>> {
        let entry = self.entry(station_id)?;
        entry
            .weather
            .as_deref()
            .map(|w| DatasetSource::new(w).with_key_from_env(entry.api_key_env.as_deref()))
            .transpose()
    }
}

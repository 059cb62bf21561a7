use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rentscope_core::{CityRecord, Dataset, DatasetMeta, NeighbourhoodRecord, PropertyType};
use tracing::warn;

const REMOTE_FETCH_TIMEOUT: Duration = Duration::from_secs(3);

/// Normalized lookup key: trimmed, title-cased per word.
pub fn city_key(city: &str) -> String {
    city.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Snapshot access layer. The dataset is loaded once at construction and
/// owned by this instance, so tests get a fresh cache per provider instead
/// of a process-wide global.
#[derive(Clone)]
pub struct DatasetProvider {
    dataset: Arc<Dataset>,
    live_mode: bool,
    source_path: PathBuf,
}

impl DatasetProvider {
    pub fn from_local(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed reading snapshot at {}", path.display()))?;
        let dataset: Dataset = serde_json::from_str(&raw)
            .with_context(|| format!("malformed snapshot at {}", path.display()))?;

        Ok(Self {
            dataset: Arc::new(dataset),
            live_mode: false,
            source_path: path.to_path_buf(),
        })
    }

    /// Live mode: fetch the snapshot from a remote URL, falling back to the
    /// local file on any failure. The fallback is silent toward the caller;
    /// the system must always answer from some snapshot if the local file
    /// is well-formed.
    pub async fn from_remote_or_local(url: &str, local_path: impl AsRef<Path>) -> Result<Self> {
        match fetch_remote(url).await {
            Ok(dataset) => Ok(Self {
                dataset: Arc::new(dataset),
                live_mode: true,
                source_path: local_path.as_ref().to_path_buf(),
            }),
            Err(error) => {
                warn!(%url, %error, "remote snapshot fetch failed, falling back to local");
                Self::from_local(local_path)
            }
        }
    }

    pub fn meta(&self) -> &DatasetMeta {
        &self.dataset.meta
    }

    pub fn live_mode(&self) -> bool {
        self.live_mode
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn city_names(&self) -> Vec<String> {
        self.dataset.cities.keys().cloned().collect()
    }

    pub fn get_city(&self, name: &str) -> Option<&CityRecord> {
        self.dataset.cities.get(&city_key(name))
    }

    pub fn city_median(&self, name: &str, property_type: PropertyType) -> Option<f64> {
        self.get_city(name)?.median_for(property_type)
    }

    /// Ordered neighbourhood rows; empty if the city is absent.
    pub fn list_neighbourhoods(&self, name: &str) -> &[NeighbourhoodRecord] {
        self.get_city(name)
            .map(|city| city.neighbourhoods.as_slice())
            .unwrap_or(&[])
    }

    pub fn neighbourhood_median(
        &self,
        row: &NeighbourhoodRecord,
        property_type: PropertyType,
    ) -> Option<f64> {
        row.median_for(property_type)
    }

    pub fn neighbourhood_transit(&self, row: &NeighbourhoodRecord, default: u8) -> u8 {
        row.transit_score().unwrap_or_else(|| default.min(100))
    }
}

async fn fetch_remote(url: &str) -> Result<Dataset> {
    let client = reqwest::Client::builder()
        .timeout(REMOTE_FETCH_TIMEOUT)
        .build()
        .context("failed building snapshot http client")?;

    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("snapshot fetch failed for {url}"))?;

    if !response.status().is_success() {
        anyhow::bail!("snapshot fetch returned HTTP {}", response.status());
    }

    response
        .json::<Dataset>()
        .await
        .context("snapshot payload was not valid dataset JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn snapshot_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{
              "meta": {{ "currency": "CAD/month", "snapshot_month": "2025-06", "version": "static_json_v1", "property_types": ["studio", "1bed", "2bed", "3bed"] }},
              "cities": {{
                "Toronto": {{
                  "medians": {{ "1bed": 2500, "2bed": 3100 }},
                  "neighbourhoods": [
                    {{ "name": "Weston", "median": {{ "1bed": 1850 }}, "transit": 70, "distance_km": 11.0 }},
                    {{ "name": "Casa Loma", "median": {{ "2bed": 3400 }}, "transit": 84, "distance_km": 3.2 }}
                  ]
                }}
              }}
            }}"#
        )
        .expect("write snapshot");
        file
    }

    #[test]
    fn city_key_normalizes_case_and_whitespace() {
        assert_eq!(city_key("  toronto "), "Toronto");
        assert_eq!(city_key("quebec   city"), "Quebec City");
        assert_eq!(city_key("MONTREAL"), "Montreal");
    }

    #[test]
    fn lookups_resolve_through_the_normalized_key() {
        let file = snapshot_file();
        let provider = DatasetProvider::from_local(file.path()).unwrap();

        assert!(provider.get_city("toronto").is_some());
        assert_eq!(provider.city_median("TORONTO", PropertyType::OneBed), Some(2500.0));
        assert_eq!(provider.city_median("Toronto", PropertyType::ThreeBed), None);
        assert!(provider.get_city("Atlantis").is_none());
        assert!(provider.list_neighbourhoods("Atlantis").is_empty());
    }

    #[test]
    fn neighbourhood_median_absent_for_missing_property_type() {
        let file = snapshot_file();
        let provider = DatasetProvider::from_local(file.path()).unwrap();

        let rows = provider.list_neighbourhoods("Toronto");
        let casa_loma = rows.iter().find(|row| row.name == "Casa Loma").unwrap();
        assert_eq!(provider.neighbourhood_median(casa_loma, PropertyType::OneBed), None);
        assert_eq!(
            provider.neighbourhood_median(casa_loma, PropertyType::TwoBed),
            Some(3400.0)
        );
    }

    #[tokio::test]
    async fn remote_failure_falls_back_to_local() {
        let file = snapshot_file();
        let provider =
            DatasetProvider::from_remote_or_local("http://127.0.0.1:1/snapshot.json", file.path())
                .await
                .unwrap();

        assert!(!provider.live_mode());
        assert_eq!(provider.city_median("Toronto", PropertyType::OneBed), Some(2500.0));
    }
}

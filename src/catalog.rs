use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use tracing::debug;

use crate::domain::{Period, Tier};
use crate::error::DatasetError;

const DATASET_COLUMN: &str = "Dataset";

/// Source of the CSV export of one sheet of the dataset spreadsheet.
pub trait SheetSource: Send + Sync {
    fn fetch_csv(&self, spreadsheet_id: &str, period: Period) -> Result<String, DatasetError>;
}

#[derive(Clone)]
pub struct GoogleSheetClient {
    client: Client,
    base_url: String,
}

impl GoogleSheetClient {
    pub fn new() -> Result<Self, DatasetError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("stops-datasets/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| DatasetError::SourceUnavailable(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| DatasetError::SourceUnavailable(err.to_string()))?;
        Ok(Self {
            client,
            base_url: "https://docs.google.com/spreadsheets/d".to_string(),
        })
    }

    pub fn export_url(&self, spreadsheet_id: &str, period: Period) -> String {
        format!(
            "{}/{spreadsheet_id}/export?format=csv&sheet={period}",
            self.base_url
        )
    }
}

impl SheetSource for GoogleSheetClient {
    fn fetch_csv(&self, spreadsheet_id: &str, period: Period) -> Result<String, DatasetError> {
        let url = self.export_url(spreadsheet_id, period);
        debug!(%url, "fetching dataset spreadsheet");
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| DatasetError::SourceUnavailable(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "spreadsheet export failed".to_string());
            return Err(DatasetError::SourceStatus { status, message });
        }
        response
            .text()
            .map_err(|err| DatasetError::SourceUnavailable(err.to_string()))
    }
}

/// Resolver keys of one dataset, at most one per tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatasetEntry {
    keys: BTreeMap<Tier, String>,
}

impl DatasetEntry {
    pub fn key(&self, tier: Tier) -> Option<&str> {
        self.keys.get(&tier).map(String::as_str)
    }

    pub fn tiers(&self) -> impl Iterator<Item = Tier> + '_ {
        self.keys.keys().copied()
    }
}

/// Dataset name to per-tier resolver key, for one data-taking period.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogTable {
    period: Period,
    datasets: BTreeMap<String, DatasetEntry>,
}

impl CatalogTable {
    pub fn load<S: SheetSource + ?Sized>(
        source: &S,
        spreadsheet_id: &str,
        period: Period,
    ) -> Result<Self, DatasetError> {
        let data = source.fetch_csv(spreadsheet_id, period)?;
        let table = Self::from_csv(period, &data)?;
        debug!(%period, datasets = table.len(), "loaded dataset catalog");
        Ok(table)
    }

    pub fn from_csv(period: Period, data: &str) -> Result<Self, DatasetError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(data.as_bytes());
        let headers = reader
            .headers()
            .map_err(|err| DatasetError::MalformedSource(err.to_string()))?
            .clone();

        let column = |name: &str| headers.iter().position(|header| header.trim() == name);
        let tier_columns = Tier::ALL
            .into_iter()
            .map(|tier| (tier, column(tier.as_str())))
            .collect::<Vec<_>>();
        let missing_tiers = tier_columns
            .iter()
            .filter(|(_, index)| index.is_none())
            .map(|(tier, _)| tier.as_str());

        let dataset_column = match column(DATASET_COLUMN) {
            Some(index) => index,
            None => {
                let missing = std::iter::once(DATASET_COLUMN)
                    .chain(missing_tiers)
                    .collect::<Vec<_>>();
                return Err(missing_columns(&missing));
            }
        };
        let missing = missing_tiers.collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(missing_columns(&missing));
        }

        let mut datasets = BTreeMap::<String, DatasetEntry>::new();
        for record in reader.records() {
            let record = record.map_err(|err| DatasetError::MalformedSource(err.to_string()))?;
            let name = record.get(dataset_column).unwrap_or("").trim();
            if name.is_empty() {
                continue;
            }
            for (tier, index) in &tier_columns {
                let value = index
                    .and_then(|index| record.get(index))
                    .unwrap_or("")
                    .trim();
                if value.is_empty() {
                    continue;
                }
                datasets
                    .entry(name.to_string())
                    .or_default()
                    .keys
                    .insert(*tier, value.to_string());
            }
        }

        Ok(Self { period, datasets })
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &DatasetEntry)> {
        self.datasets
            .iter()
            .map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn resolver_key_for(&self, dataset: &str, tier: Tier) -> Option<&str> {
        self.datasets.get(dataset).and_then(|entry| entry.key(tier))
    }

    /// Like `resolver_key_for`, but an absent key is an error.
    pub fn require_key(&self, dataset: &str, tier: Tier) -> Result<&str, DatasetError> {
        self.resolver_key_for(dataset, tier)
            .ok_or_else(|| DatasetError::UnknownDatasetOrTier {
                dataset: dataset.to_string(),
                tier: tier.to_string(),
            })
    }
}

fn missing_columns(missing: &[&str]) -> DatasetError {
    DatasetError::MalformedSource(format!("missing columns: {}", missing.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_url_uses_sheet_name() {
        let client = GoogleSheetClient::new().unwrap();
        assert_eq!(
            client.export_url("abc", Period::Run2016postVFP),
            "https://docs.google.com/spreadsheets/d/abc/export?format=csv&sheet=Run2016postVFP"
        );
    }

    #[test]
    fn blank_cells_are_absent() {
        let data = "Dataset,MiniAOD,NanoAOD,ReNanoAOD,NTuple\nFoo, /A/B/C ,,,bar/v1\n";
        let table = CatalogTable::from_csv(Period::Run2018, data).unwrap();
        assert_eq!(table.resolver_key_for("Foo", Tier::MiniAod), Some("/A/B/C"));
        assert_eq!(table.resolver_key_for("Foo", Tier::NanoAod), None);
        assert_eq!(table.resolver_key_for("Foo", Tier::NTuple), Some("bar/v1"));
    }
}

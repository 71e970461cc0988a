use serde::Serialize;
use tracing::info;

use crate::catalog::{CatalogTable, SheetSource};
use crate::config::Settings;
use crate::das::MetadataQuery;
use crate::domain::{Period, Tier};
use crate::error::DatasetError;
use crate::resolver::LocationResolver;
use crate::staging::{Copier, StagingEngine, StagingPool, plan_jobs};
use crate::store::Store;

#[derive(Debug, Clone, Serialize)]
pub struct ListResult {
    pub dataset: String,
    pub period: Period,
    pub tier: Tier,
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageResult {
    pub dataset: String,
    pub period: Period,
    pub tier: Tier,
    pub paths: Vec<String>,
    pub copied: usize,
    pub skipped: usize,
    pub staged_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogResult {
    pub period: Period,
    pub datasets: Vec<CatalogListing>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogListing {
    pub name: String,
    pub tiers: Vec<Tier>,
}

#[derive(Debug, Clone)]
pub struct StageOptions {
    /// Stage at most this many files; 0 stages all of them.
    pub max_files: usize,
}

pub struct App<S: SheetSource, Q: MetadataQuery, C: Copier> {
    settings: Settings,
    store: Store,
    sheet: S,
    resolver: LocationResolver<Q>,
    engine: StagingEngine<C>,
}

impl<S: SheetSource, Q: MetadataQuery, C: Copier> App<S, Q, C> {
    pub fn new(settings: Settings, sheet: S, query: Q, copier: C) -> Self {
        let store = Store::new(settings.cache_root.clone());
        let resolver = LocationResolver::from_settings(query, &settings);
        let engine = StagingEngine::new(
            copier,
            StagingPool::new(settings.max_copies),
            settings.copy_retries,
        );
        Self {
            settings,
            store,
            sheet,
            resolver,
            engine,
        }
    }

    pub fn load_catalog(&self, period: Period) -> Result<CatalogTable, DatasetError> {
        CatalogTable::load(&self.sheet, &self.settings.spreadsheet_id, period)
    }

    pub fn catalog(&self, period: Period) -> Result<CatalogResult, DatasetError> {
        let table = self.load_catalog(period)?;
        let datasets = table
            .entries()
            .map(|(name, entry)| CatalogListing {
                name: name.to_string(),
                tiers: entry.tiers().collect(),
            })
            .collect();
        Ok(CatalogResult { period, datasets })
    }

    pub fn list(&self, dataset: &str, period: Period, tier: Tier) -> Result<ListResult, DatasetError> {
        let table = self.load_catalog(period)?;
        let urls = self.resolve(&table, dataset, tier)?;
        Ok(ListResult {
            dataset: dataset.to_string(),
            period,
            tier,
            urls,
        })
    }

    pub fn stage(
        &self,
        dataset: &str,
        period: Period,
        tier: Tier,
        options: StageOptions,
    ) -> Result<StageResult, DatasetError> {
        let table = self.load_catalog(period)?;
        let urls = self.resolve(&table, dataset, tier)?;
        let jobs = plan_jobs(&self.store, &urls, options.max_files)?;
        info!(dataset, %tier, files = jobs.len(), cache = %self.store.cache_root(), "staging dataset");

        self.store.ensure_cache_root()?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|err| DatasetError::Runtime(err.to_string()))?;
        let report = runtime.block_on(self.engine.stage_all_report(&jobs))?;

        Ok(StageResult {
            dataset: dataset.to_string(),
            period,
            tier,
            paths: report.paths.iter().map(|path| path.to_string()).collect(),
            copied: report.copied,
            skipped: report.skipped,
            staged_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    fn resolve(
        &self,
        table: &CatalogTable,
        dataset: &str,
        tier: Tier,
    ) -> Result<Vec<String>, DatasetError> {
        let key = table.require_key(dataset, tier)?;
        self.resolver.resolve(dataset, key, tier)
    }
}

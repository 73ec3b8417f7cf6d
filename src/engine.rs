//! Engine facade.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::codec::Number;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::partition::PartitionKey;
use crate::pool::WorkerPool;
use crate::query::{QueryRequest, QueryService, Sample};
use crate::reduce::Reducer;
use crate::series::{SeriesDefinition, SeriesFile};
use crate::service::{PartitionService, SeriesService};
use crate::storage::open_store;
use crate::write::{InsertReport, InsertService};

/// A storage engine opened from an [`EngineConfig`].
///
/// All methods take `&self`; share the engine behind an `Arc` to use it from
/// several threads.
pub struct Engine {
    config: EngineConfig,
    series: Arc<SeriesService>,
    partitions: Arc<PartitionService>,
    inserts: InsertService,
    queries: QueryService,
}

impl Engine {
    pub fn open(config: EngineConfig) -> Result<Self> {
        let store = open_store(&config.root, config.read_only)?;
        let series = Arc::new(SeriesService::load(store)?);
        let partitions = Arc::new(PartitionService::new(
            series.clone(),
            config.cache_capacity,
            Duration::from_secs(config.cache_idle_secs),
        ));
        let pool = Arc::new(WorkerPool::new(config.worker_threads)?);
        let inserts = InsertService::new(
            partitions.clone(),
            pool.clone(),
            config.max_batch_size,
            config.create_on_insert.clone(),
        );
        let queries = QueryService::new(partitions.clone(), pool, config.max_query_samples);
        log::info!("engine open at {} with {} series", config.root, series.list().len());
        Ok(Self {
            config,
            series,
            partitions,
            inserts,
            queries,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_read_only(&self) -> bool {
        self.series.is_read_only()
    }

    pub fn create_series(&self, definition: SeriesDefinition) -> Result<Arc<SeriesFile>> {
        self.series.create(definition)
    }

    pub fn series(&self, id: &str) -> Result<Arc<SeriesFile>> {
        self.series.get(id)
    }

    pub fn list_series(&self) -> Vec<Arc<SeriesFile>> {
        self.series.list()
    }

    pub fn update_metadata(
        &self,
        id: &str,
        metadata: BTreeMap<String, String>,
    ) -> Result<Arc<SeriesFile>> {
        self.series.update_metadata(id, metadata)
    }

    pub fn delete_series(&self, id: &str) -> Result<()> {
        self.series.delete(id)?;
        self.partitions.invalidate_series(id);
        Ok(())
    }

    /// Keys of the stored partitions of `id`, in time order.
    pub fn partitions(&self, id: &str) -> Result<Vec<PartitionKey>> {
        let index = self.partitions.range_map(id)?;
        Ok(index.iter().map(|span| span.key.clone()).collect())
    }

    pub fn insert(
        &self,
        series_id: &str,
        batch: &[(i64, Option<Number>)],
        reducer: Option<Reducer>,
    ) -> Result<InsertReport> {
        self.inserts.insert(series_id, batch, reducer)
    }

    pub fn get(&self, series_id: &str, timestamp_ms: i64) -> Result<Option<Number>> {
        self.queries.get(series_id, timestamp_ms)
    }

    pub fn query(&self, series_id: &str, request: &QueryRequest) -> Result<Vec<Sample>> {
        self.queries.query(series_id, request)
    }

    pub fn query_many(
        &self,
        series_ids: &[String],
        request: &QueryRequest,
    ) -> Vec<(String, Result<Vec<Sample>>)> {
        self.queries.query_many(series_ids, request)
    }

    /// Drops idle partition descriptors; returns how many were evicted.
    pub fn evict_idle(&self) -> usize {
        self.partitions.evict_idle()
    }

    pub fn cached_partitions(&self) -> usize {
        self.partitions.cache_len()
    }
}

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::partition::PartitionKey;
use crate::series::{validate_series_id, SeriesFile};
use crate::storage::{validate_key, AccessMode, PartitionBuffer, PersistenceAdapter};

type Bytes = Arc<RwLock<Vec<u8>>>;

/// Process-local store for ephemeral deployments and tests.
#[derive(Default)]
pub struct MemoryStore {
    series: RwLock<BTreeMap<String, SeriesFile>>,
    partitions: RwLock<BTreeMap<PartitionKey, Bytes>>,
    read_only: bool,
}

impl MemoryStore {
    pub fn new(read_only: bool) -> Self {
        Self {
            read_only,
            ..Self::default()
        }
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(Error::ReadOnly);
        }
        Ok(())
    }
}

impl PersistenceAdapter for MemoryStore {
    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn list_series(&self) -> Result<Vec<SeriesFile>> {
        Ok(self.series.read().values().cloned().collect())
    }

    fn save_series(&self, series: &SeriesFile) -> Result<()> {
        self.ensure_writable()?;
        validate_series_id(series.id())?;
        self.series
            .write()
            .insert(series.id().to_string(), series.clone());
        Ok(())
    }

    fn delete_series(&self, id: &str) -> Result<()> {
        self.ensure_writable()?;
        if self.series.write().remove(id).is_none() {
            return Err(Error::SeriesNotFound(id.to_string()));
        }
        self.partitions.write().retain(|key, _| key.series_id != id);
        Ok(())
    }

    fn list_partitions(&self, series: &SeriesFile) -> Result<Vec<PartitionKey>> {
        if !self.series.read().contains_key(series.id()) {
            return Err(Error::SeriesNotFound(series.id().to_string()));
        }
        let period = series.definition.partition;
        Ok(self
            .partitions
            .read()
            .keys()
            .filter(|key| key.series_id == series.id() && period.matches(&key.partition_id))
            .cloned()
            .collect())
    }

    fn create_partition(&self, key: &PartitionKey, size_bytes: usize) -> Result<bool> {
        self.ensure_writable()?;
        validate_key(key)?;
        if !self.series.read().contains_key(&key.series_id) {
            return Err(Error::SeriesNotFound(key.series_id.clone()));
        }
        let mut partitions = self.partitions.write();
        if partitions.contains_key(key) {
            return Ok(false);
        }
        partitions.insert(key.clone(), Arc::new(RwLock::new(vec![0u8; size_bytes])));
        Ok(true)
    }

    fn open_partition(&self, key: &PartitionKey, mode: AccessMode) -> Result<PartitionBuffer> {
        if mode == AccessMode::ReadWrite {
            self.ensure_writable()?;
        }
        let bytes = self
            .partitions
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::PartitionNotFound(key.clone()))?;
        Ok(match mode {
            AccessMode::Read => PartitionBuffer::memory_read(bytes.read_arc()),
            AccessMode::ReadWrite => PartitionBuffer::memory_write(bytes.write_arc()),
        })
    }
}

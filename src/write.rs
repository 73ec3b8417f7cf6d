//! Write path.

use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;

use crate::codec::{Number, PartitionAdapter};
use crate::config::SeriesTemplate;
use crate::error::{Error, Result};
use crate::partition::PartitionKey;
use crate::pool::WorkerPool;
use crate::reduce::Reducer;
use crate::series::{validate_series_id, SeriesFile};
use crate::service::PartitionService;
use crate::storage::AccessMode;

/// Outcome of one insert batch.
///
/// Partitions are written independently: a failure in one group leaves the
/// others applied.
#[derive(Debug, Default)]
pub struct InsertReport {
    /// Values written by the successful groups.
    pub written: usize,
    pub succeeded: Vec<PartitionKey>,
    pub failed: Vec<(PartitionKey, Error)>,
}

impl InsertReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct InsertService {
    partitions: Arc<PartitionService>,
    pool: Arc<WorkerPool>,
    max_batch_size: usize,
    create_on_insert: Option<SeriesTemplate>,
}

impl InsertService {
    pub fn new(
        partitions: Arc<PartitionService>,
        pool: Arc<WorkerPool>,
        max_batch_size: usize,
        create_on_insert: Option<SeriesTemplate>,
    ) -> Self {
        Self {
            partitions,
            pool,
            max_batch_size,
            create_on_insert,
        }
    }

    /// Writes `batch` into `series_id`.
    ///
    /// Values are grouped by partition and each group is applied under that
    /// partition's write lock. With a `reducer`, each value is merged with
    /// the one already stored at its slot; otherwise it overwrites.
    pub fn insert(
        &self,
        series_id: &str,
        batch: &[(i64, Option<Number>)],
        reducer: Option<Reducer>,
    ) -> Result<InsertReport> {
        if batch.len() > self.max_batch_size {
            return Err(Error::BatchTooLarge {
                len: batch.len(),
                limit: self.max_batch_size,
            });
        }
        validate_series_id(series_id)?;
        let file = self.series_for_insert(series_id)?;
        if self.partitions.series().is_read_only() {
            return Err(Error::ReadOnly);
        }

        let mut groups: BTreeMap<PartitionKey, Vec<(i64, Option<Number>)>> = BTreeMap::new();
        for &(timestamp, value) in batch {
            let key = PartitionKey::for_timestamp(series_id, file.definition.partition, timestamp)?;
            groups.entry(key).or_default().push((timestamp, value));
        }

        let groups: Vec<_> = groups.into_iter().collect();
        let keys: Vec<PartitionKey> = groups.iter().map(|(key, _)| key.clone()).collect();
        let results = self
            .pool
            .run(groups, |(key, writes)| self.write_group(&key, &writes, reducer));

        let mut report = InsertReport::default();
        for (key, result) in keys.into_iter().zip(results) {
            match result {
                Ok(written) => {
                    report.written += written;
                    report.succeeded.push(key);
                }
                Err(err) => {
                    log::warn!("insert into {key} failed: {err}");
                    report.failed.push((key, err));
                }
            }
        }
        Ok(report)
    }

    fn series_for_insert(&self, series_id: &str) -> Result<Arc<SeriesFile>> {
        let series = self.partitions.series();
        match (series.get(series_id), &self.create_on_insert) {
            (Err(Error::SeriesNotFound(_)), Some(template)) => {
                series.create(template.definition(series_id))
            }
            (result, _) => result,
        }
    }

    fn write_group(
        &self,
        key: &PartitionKey,
        writes: &[(i64, Option<Number>)],
        reducer: Option<Reducer>,
    ) -> Result<usize> {
        let range = self.partitions.range(key)?;
        let store = self.partitions.series().store();
        let _guard = range.write();

        let created = store.create_partition(key, range.byte_size())?;
        let mut buffer = store.open_partition(key, AccessMode::ReadWrite)?;
        if buffer.len() != range.byte_size() {
            log::error!(
                "partition {key} holds {} bytes, expected {}",
                buffer.len(),
                range.byte_size()
            );
            return Err(Error::Storage(io::Error::new(
                io::ErrorKind::InvalidData,
                "partition size mismatch",
            )));
        }

        let codec = range.codec();
        let bytes = buffer.as_mut_slice()?;
        if created {
            codec.fill_absent(bytes);
        }
        for &(timestamp, value) in writes {
            let offset = range
                .byte_offset(timestamp)
                .ok_or(Error::InvalidTimestamp(timestamp))?;
            let value = match reducer {
                Some(reducer) => reducer.combine(codec.get(bytes, offset), value),
                None => value,
            };
            codec.put(bytes, offset, value);
        }
        buffer.flush()?;
        drop(buffer);

        if created {
            self.partitions.mark_partition_created(key);
        }
        Ok(writes.len())
    }
}

//! Read path.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::codec::{Number, PartitionAdapter};
use crate::error::{Error, Result};
use crate::partition::PartitionRange;
use crate::pool::WorkerPool;
use crate::reduce::{Accumulator, Reducer};
use crate::service::PartitionService;
use crate::storage::AccessMode;

/// One output sample; `value` is `None` when nothing was stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: i64,
    pub value: Option<Number>,
}

/// Time range query over one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Inclusive start, aligned down to the series interval.
    pub from: i64,
    /// Inclusive end.
    pub to: i64,
    /// Output cadence in milliseconds; defaults to the series interval.
    #[serde(default)]
    pub granularity: Option<i64>,
    #[serde(default = "default_reducer")]
    pub reducer: Reducer,
    /// Replace an absent bucket with the previous present one.
    #[serde(default)]
    pub carry_forward: bool,
    /// Leave absent buckets out of the result.
    #[serde(default)]
    pub skip_absent: bool,
}

fn default_reducer() -> Reducer {
    Reducer::Average
}

impl QueryRequest {
    pub fn new(from: i64, to: i64) -> Self {
        Self {
            from,
            to,
            granularity: None,
            reducer: default_reducer(),
            carry_forward: false,
            skip_absent: false,
        }
    }

    pub fn granularity(mut self, granularity: i64) -> Self {
        self.granularity = Some(granularity);
        self
    }

    pub fn reducer(mut self, reducer: Reducer) -> Self {
        self.reducer = reducer;
        self
    }

    pub fn carry_forward(mut self, on: bool) -> Self {
        self.carry_forward = on;
        self
    }

    pub fn skip_absent(mut self, on: bool) -> Self {
        self.skip_absent = on;
        self
    }
}

/// Bucket layout of one query after validation.
#[derive(Debug, Clone, Copy)]
struct Buckets {
    start: i64,
    to: i64,
    width: i64,
    count: usize,
}

impl Buckets {
    fn index(&self, timestamp_ms: i64) -> usize {
        ((timestamp_ms - self.start) / self.width) as usize
    }

    fn timestamp(&self, index: usize) -> i64 {
        self.start + index as i64 * self.width
    }
}

pub struct QueryService {
    partitions: Arc<PartitionService>,
    pool: Arc<WorkerPool>,
    max_samples: usize,
}

impl QueryService {
    pub fn new(partitions: Arc<PartitionService>, pool: Arc<WorkerPool>, max_samples: usize) -> Self {
        Self {
            partitions,
            pool,
            max_samples,
        }
    }

    /// Value stored for `series_id` at `timestamp_ms`.
    pub fn get(&self, series_id: &str, timestamp_ms: i64) -> Result<Option<Number>> {
        let range = self.partitions.range_at(series_id, timestamp_ms)?;
        let _guard = range.read();
        let buffer = match self
            .partitions
            .series()
            .store()
            .open_partition(range.key(), AccessMode::Read)
        {
            Ok(buffer) => buffer,
            Err(Error::PartitionNotFound(_)) => return Ok(None),
            Err(err) => return Err(err),
        };
        let offset = range
            .byte_offset(timestamp_ms)
            .ok_or(Error::InvalidTimestamp(timestamp_ms))?;
        if offset + range.codec().type_size() > buffer.len() {
            return Err(short_partition(&range, buffer.len()));
        }
        Ok(range.codec().get(buffer.as_slice(), offset))
    }

    /// Reduces the samples of `series_id` in `[from, to]` into buckets of `granularity`.
    pub fn query(&self, series_id: &str, request: &QueryRequest) -> Result<Vec<Sample>> {
        let buckets = self.buckets(series_id, request)?;
        let index = self.partitions.range_map(series_id)?;
        let spans = index.overlapping(buckets.start, buckets.to).to_vec();

        let partials = self.pool.run(spans, |span| {
            let range = self.partitions.range(&span.key)?;
            self.scan(&range, &buckets, request.reducer)
        });
        let mut accumulators: Vec<Accumulator> =
            (0..buckets.count).map(|_| request.reducer.accumulator()).collect();
        for partial in partials {
            for (bucket, acc) in partial? {
                accumulators[bucket].merge(acc);
            }
        }

        let mut samples = Vec::with_capacity(buckets.count);
        let mut previous = None;
        for (i, acc) in accumulators.into_iter().enumerate() {
            let mut value = acc.finish();
            if value.is_some() {
                previous = value;
            } else if request.carry_forward {
                value = previous;
            }
            if value.is_none() && request.skip_absent {
                continue;
            }
            samples.push(Sample {
                timestamp: buckets.timestamp(i),
                value,
            });
        }
        Ok(samples)
    }

    /// Runs `request` against each series, one pool task per series.
    pub fn query_many(
        &self,
        series_ids: &[String],
        request: &QueryRequest,
    ) -> Vec<(String, Result<Vec<Sample>>)> {
        let results = self
            .pool
            .run(series_ids.to_vec(), |id| self.query(&id, request));
        series_ids.iter().cloned().zip(results).collect()
    }

    fn buckets(&self, series_id: &str, request: &QueryRequest) -> Result<Buckets> {
        if request.from > request.to {
            return Err(Error::InvalidQuery(format!(
                "from {} is after to {}",
                request.from, request.to
            )));
        }
        let file = self.partitions.series().get(series_id)?;
        let interval = file.definition.interval;
        let width = request.granularity.unwrap_or(interval);
        if width <= 0 || width % interval != 0 {
            return Err(Error::InvalidQuery(format!(
                "granularity {width}ms is not a positive multiple of the {interval}ms interval"
            )));
        }
        let start = request.from.div_euclid(interval) * interval;
        let count = (request.to as i128 - start as i128) / width as i128 + 1;
        if count > self.max_samples as i128 {
            return Err(Error::QueryTooLarge {
                len: usize::try_from(count).unwrap_or(usize::MAX),
                limit: self.max_samples,
            });
        }
        Ok(Buckets {
            start,
            to: request.to,
            width,
            count: count as usize,
        })
    }

    /// Partial accumulators of the buckets touched by one partition.
    fn scan(
        &self,
        range: &PartitionRange,
        buckets: &Buckets,
        reducer: Reducer,
    ) -> Result<Vec<(usize, Accumulator)>> {
        let _guard = range.read();
        let buffer = match self
            .partitions
            .series()
            .store()
            .open_partition(range.key(), AccessMode::Read)
        {
            Ok(buffer) => buffer,
            Err(Error::PartitionNotFound(_)) => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        if buffer.len() < range.byte_size() {
            return Err(short_partition(range, buffer.len()));
        }

        let codec = range.codec();
        let bytes = buffer.as_slice();
        let (Some(first), Some(last)) = (
            range.index(buckets.start.max(range.start())),
            range.index(buckets.to.min(range.end())),
        ) else {
            return Ok(Vec::new());
        };

        let mut partial: Vec<(usize, Accumulator)> = Vec::new();
        for slot in first..=last {
            let timestamp = range.timestamp_at(slot);
            let bucket = buckets.index(timestamp);
            if partial.last().map(|(b, _)| *b) != Some(bucket) {
                partial.push((bucket, reducer.accumulator()));
            }
            if let Some((_, acc)) = partial.last_mut() {
                acc.push(codec.get(bytes, slot * codec.type_size()));
            }
        }
        Ok(partial)
    }
}

fn short_partition(range: &PartitionRange, len: usize) -> Error {
    log::error!(
        "partition {} holds {len} bytes, expected {}",
        range.key(),
        range.byte_size()
    );
    Error::Storage(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        "partition size mismatch",
    ))
}

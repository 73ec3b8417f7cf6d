use std::fmt;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::codec::{Codec, NumberType, PartitionAdapter};
use crate::error::Result;
use crate::partition::{PartitionKey, PartitionPeriod};
use crate::series::SeriesDefinition;

/// Resolved descriptor of one partition file.
///
/// Covers `[start, end]` inclusive, one slot per `interval`. Immutable once
/// built; the embedded lock serialises access to the file's bytes. Readers
/// take it shared for a whole scan and writers exclusive for a whole batch
/// group. There is no acquisition timeout, so a stalled writer stalls readers
/// of the same partition.
pub struct PartitionRange {
    key: PartitionKey,
    period: PartitionPeriod,
    start: i64,
    end: i64,
    interval: i64,
    number_type: NumberType,
    codec: Codec,
    lock: RwLock<()>,
}

impl PartitionRange {
    /// Resolves `partition_id` of the series described by `definition`.
    pub fn new(definition: &SeriesDefinition, partition_id: &str) -> Result<Self> {
        let period = definition.partition;
        let start = period.parse_start(partition_id)?;
        let end = period.next_start(start)? - 1;
        Ok(Self {
            key: PartitionKey::new(definition.id.clone(), partition_id),
            period,
            start,
            end,
            interval: definition.interval,
            number_type: definition.number_type,
            codec: definition.codec()?,
            lock: RwLock::new(()),
        })
    }

    pub fn key(&self) -> &PartitionKey {
        &self.key
    }

    pub fn period(&self) -> PartitionPeriod {
        self.period
    }

    /// First millisecond covered.
    pub fn start(&self) -> i64 {
        self.start
    }

    /// Last millisecond covered.
    pub fn end(&self) -> i64 {
        self.end
    }

    pub fn interval(&self) -> i64 {
        self.interval
    }

    pub fn number_type(&self) -> NumberType {
        self.number_type
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    /// Number of slots.
    pub fn size(&self) -> usize {
        ((self.end - self.start + 1) / self.interval) as usize
    }

    /// Exact file length in bytes.
    pub fn byte_size(&self) -> usize {
        self.size() * self.codec.type_size()
    }

    pub fn contains(&self, timestamp_ms: i64) -> bool {
        (self.start..=self.end).contains(&timestamp_ms)
    }

    /// Slot index of `timestamp_ms`, or `None` outside the range.
    pub fn index(&self, timestamp_ms: i64) -> Option<usize> {
        self.contains(timestamp_ms)
            .then(|| ((timestamp_ms - self.start) / self.interval) as usize)
    }

    pub fn byte_offset(&self, timestamp_ms: i64) -> Option<usize> {
        self.index(timestamp_ms).map(|i| i * self.codec.type_size())
    }

    /// Timestamp of the first millisecond of slot `index`.
    pub fn timestamp_at(&self, index: usize) -> i64 {
        self.start + index as i64 * self.interval
    }

    pub fn overlaps(&self, from: i64, to: i64) -> bool {
        self.start <= to && self.end >= from
    }

    pub fn read(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, ()> {
        self.lock.write()
    }
}

impl fmt::Debug for PartitionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionRange")
            .field("key", &self.key)
            .field("start", &self.start)
            .field("end", &self.end)
            .field("interval", &self.interval)
            .field("number_type", &self.number_type)
            .finish()
    }
}

use crate::error::Result;
use crate::partition::{PartitionKey, PartitionPeriod};

/// Key and covered time range of one stored partition.
///
/// Holds no lock and no codec; descriptors are resolved through the partition
/// cache when the partition is actually read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSpan {
    pub key: PartitionKey,
    /// First millisecond covered.
    pub start: i64,
    /// Last millisecond covered.
    pub end: i64,
}

impl PartitionSpan {
    pub fn new(key: PartitionKey, period: PartitionPeriod) -> Result<Self> {
        let start = period.parse_start(&key.partition_id)?;
        let end = period.next_start(start)? - 1;
        Ok(Self { key, start, end })
    }
}

/// Partitions of one series ordered by start time.
///
/// Partitions of a series never overlap, so both `start` and `end` are
/// monotone and an overlap query is two binary searches.
#[derive(Debug, Default, Clone)]
pub struct IntervalIndex {
    spans: Vec<PartitionSpan>,
}

impl IntervalIndex {
    pub fn new(mut spans: Vec<PartitionSpan>) -> Self {
        spans.sort_by_key(|s| s.start);
        spans.dedup_by(|a, b| a.start == b.start);
        Self { spans }
    }

    /// Partitions intersecting `[from, to]`, in time order.
    pub fn overlapping(&self, from: i64, to: i64) -> &[PartitionSpan] {
        if from > to {
            return &[];
        }
        let first = self.spans.partition_point(|s| s.end < from);
        let last = self.spans.partition_point(|s| s.start <= to);
        if first >= last {
            return &[];
        }
        &self.spans[first..last]
    }

    /// Partition containing `timestamp_ms`, if it exists.
    pub fn find(&self, timestamp_ms: i64) -> Option<&PartitionSpan> {
        self.overlapping(timestamp_ms, timestamp_ms).first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PartitionSpan> {
        self.spans.iter()
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::DAY_MS;

    fn index(ids: &[&str]) -> IntervalIndex {
        IntervalIndex::new(
            ids.iter()
                .map(|id| PartitionSpan::new(PartitionKey::new("s", *id), PartitionPeriod::Day).unwrap())
                .collect(),
        )
    }

    fn ids(spans: &[PartitionSpan]) -> Vec<&str> {
        spans.iter().map(|s| s.key.partition_id.as_str()).collect()
    }

    #[test]
    fn overlapping_returns_time_ordered_slice() {
        let idx = index(&["20240105", "20240101", "20240103", "20240102"]);
        let jan2 = PartitionPeriod::Day.parse_start("20240102").unwrap();
        assert_eq!(ids(idx.overlapping(jan2, jan2 + 2 * DAY_MS)), ["20240102", "20240103"]);
        assert_eq!(ids(idx.overlapping(jan2 - 1, jan2)), ["20240101", "20240102"]);
        assert_eq!(idx.len(), 4);
    }

    #[test]
    fn gaps_and_empty_queries() {
        let idx = index(&["20240101", "20240105"]);
        let jan3 = PartitionPeriod::Day.parse_start("20240103").unwrap();
        assert!(idx.overlapping(jan3, jan3 + DAY_MS - 1).is_empty());
        assert!(idx.overlapping(jan3, jan3 - 1).is_empty());
        assert!(idx.find(jan3).is_none());
        assert_eq!(
            idx.find(jan3 + 2 * DAY_MS).map(|s| s.key.partition_id.as_str()),
            Some("20240105")
        );
        assert!(IntervalIndex::default().overlapping(0, i64::MAX).is_empty());
    }

    #[test]
    fn span_covers_whole_period() {
        let span = PartitionSpan::new(PartitionKey::new("s", "202402"), PartitionPeriod::Month).unwrap();
        assert_eq!(span.end - span.start + 1, 29 * DAY_MS);
        assert!(PartitionSpan::new(PartitionKey::new("s", "2024"), PartitionPeriod::Day).is_err());
    }
}

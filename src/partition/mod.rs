//! Partition indexing.
//!
//! A partition is one period's worth of fixed-width slots for one series. This
//! module names partitions ([`PartitionKey`]), resolves them into time ranges
//! with byte offsets ([`PartitionRange`]) and orders them for range lookups
//! ([`IntervalIndex`]).

mod index;
mod period;
mod range;

pub use index::{IntervalIndex, PartitionSpan};
pub use period::{PartitionPeriod, DAY_MS, HOUR_MS, MINUTE_MS, SECOND_MS};
pub use range::PartitionRange;

use std::fmt;

use crate::error::Result;

/// `(series id, partition id)`; the partition id doubles as the file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey {
    pub series_id: String,
    pub partition_id: String,
}

impl PartitionKey {
    pub fn new(series_id: impl Into<String>, partition_id: impl Into<String>) -> Self {
        Self {
            series_id: series_id.into(),
            partition_id: partition_id.into(),
        }
    }

    /// Key of the partition of `series_id` holding `timestamp_ms`.
    pub fn for_timestamp(series_id: &str, period: PartitionPeriod, timestamp_ms: i64) -> Result<Self> {
        Ok(Self::new(series_id, period.filename(timestamp_ms)?))
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.series_id, self.partition_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_for_timestamp() {
        // 2024-02-29T10:00:00Z
        let t = 1_709_164_800_000 + 10 * HOUR_MS;
        let key = PartitionKey::for_timestamp("a.b", PartitionPeriod::Day, t).unwrap();
        assert_eq!(key, PartitionKey::new("a.b", "20240229"));
        let key = PartitionKey::for_timestamp("a.b", PartitionPeriod::Month, t).unwrap();
        assert_eq!(key.partition_id, "202402");
        assert_eq!(key.to_string(), "a.b/202402");
    }

    #[test]
    fn keys_order_by_series_then_time() {
        let mut keys = vec![
            PartitionKey::new("b", "20240101"),
            PartitionKey::new("a", "20240102"),
            PartitionKey::new("a", "20240101"),
        ];
        keys.sort();
        assert_eq!(keys[0], PartitionKey::new("a", "20240101"));
        assert_eq!(keys[2], PartitionKey::new("b", "20240101"));
    }
}

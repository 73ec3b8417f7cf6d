//! Long-lived shared state: the series registry and the partition descriptor cache.

mod partition;
mod series;

pub use partition::PartitionService;
pub use series::SeriesService;

//! Persistence adapters.
//!
//! A store holds series definitions and raw partition bytes. It knows nothing
//! about codecs: partitions are opened as plain byte regions and interpreted
//! by the caller.
//!
//! Layout shared by the directory and archive stores:
//!
//! ```text
//! <root>/<series-id>/series.json
//! <root>/<series-id>/<partition-id>     sampleCount * typeSize bytes, no header
//! ```

mod archive;
mod directory;
mod memory;
mod mmap;

pub use archive::ArchiveStore;
pub use directory::DirectoryStore;
pub use memory::MemoryStore;
pub use mmap::{AccessMode, MmapFile, PartitionBuffer, ReadOnlyMmap, TempCopyMmap};

use std::sync::Arc;

use crate::config::StorageRoot;
use crate::error::{Error, Result};
use crate::partition::{PartitionKey, PartitionPeriod};
use crate::series::{validate_series_id, SeriesFile};

pub const SERIES_FILENAME: &str = "series.json";

/// Backing store for series definitions and partition files.
pub trait PersistenceAdapter: Send + Sync {
    /// True when every mutating call is rejected.
    fn is_read_only(&self) -> bool;

    fn list_series(&self) -> Result<Vec<SeriesFile>>;

    /// Creates or replaces the stored definition and metadata of a series.
    fn save_series(&self, series: &SeriesFile) -> Result<()>;

    /// Removes a series together with all of its partitions.
    fn delete_series(&self, id: &str) -> Result<()>;

    /// Keys of the partitions stored for `series`, in time order.
    fn list_partitions(&self, series: &SeriesFile) -> Result<Vec<PartitionKey>>;

    /// Creates a partition of `size_bytes` bytes. Returns `false` when it already existed.
    fn create_partition(&self, key: &PartitionKey, size_bytes: usize) -> Result<bool>;

    /// Opens the raw bytes of an existing partition.
    fn open_partition(&self, key: &PartitionKey, mode: AccessMode) -> Result<PartitionBuffer>;
}

/// Builds the store selected by `root`.
pub fn open_store(root: &StorageRoot, read_only: bool) -> Result<Arc<dyn PersistenceAdapter>> {
    let store: Arc<dyn PersistenceAdapter> = match root {
        StorageRoot::Directory(path) => Arc::new(DirectoryStore::open(path, read_only)?),
        StorageRoot::Archive(path) => Arc::new(ArchiveStore::open(path)?),
        StorageRoot::Memory => Arc::new(MemoryStore::new(read_only)),
    };
    log::info!(
        "opened {} store (read-only: {})",
        root.kind(),
        store.is_read_only()
    );
    Ok(store)
}

/// Rejects keys that could escape the series directory.
pub(crate) fn validate_key(key: &PartitionKey) -> Result<()> {
    validate_series_id(&key.series_id)?;
    let digits = !key.partition_id.is_empty() && key.partition_id.bytes().all(|b| b.is_ascii_digit());
    if !digits {
        return Err(Error::InvalidPartitionId {
            value: key.partition_id.clone(),
            period: "any",
        });
    }
    Ok(())
}

/// Keeps names that belong to `period`, sorted, as keys of `series_id`.
pub(crate) fn partition_keys<'a>(
    series_id: &str,
    period: PartitionPeriod,
    names: impl Iterator<Item = &'a str>,
) -> Vec<PartitionKey> {
    let mut keys: Vec<PartitionKey> = names
        .filter(|name| period.matches(name))
        .map(|name| PartitionKey::new(series_id, name))
        .collect();
    keys.sort();
    keys
}

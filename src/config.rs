//! Engine configuration.
//!
//! Defines where data lives, cache sizing, request limits and the template
//! used to create series on first insert.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::codec::NumberType;
use crate::error::{Error, Result};
use crate::partition::{PartitionPeriod, MINUTE_MS};
use crate::series::SeriesDefinition;

/// Sentinel root selecting the in-memory store.
pub const MEMORY_ROOT: &str = ":memory:";

/// Database root: a directory, a zip archive, or process memory.
///
/// Serialised as a single string: `":memory:"`, a path ending in `.zip`, or
/// any other path (a directory).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StorageRoot {
    Directory(PathBuf),
    Archive(PathBuf),
    Memory,
}

impl StorageRoot {
    pub fn parse(root: &str) -> Self {
        if root == MEMORY_ROOT {
            return StorageRoot::Memory;
        }
        let path = PathBuf::from(root);
        let is_zip = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
        if is_zip {
            StorageRoot::Archive(path)
        } else {
            StorageRoot::Directory(path)
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StorageRoot::Directory(_) => "directory",
            StorageRoot::Archive(_) => "archive",
            StorageRoot::Memory => "memory",
        }
    }
}

impl From<String> for StorageRoot {
    fn from(root: String) -> Self {
        StorageRoot::parse(&root)
    }
}

impl From<StorageRoot> for String {
    fn from(root: StorageRoot) -> Self {
        root.to_string()
    }
}

impl fmt::Display for StorageRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageRoot::Directory(path) | StorageRoot::Archive(path) => {
                write!(f, "{}", path.display())
            }
            StorageRoot::Memory => f.write_str(MEMORY_ROOT),
        }
    }
}

/// Definition applied to unknown series on first insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesTemplate {
    #[serde(rename = "type")]
    pub number_type: NumberType,
    /// Sampling period in milliseconds.
    pub interval: i64,
    pub partition: PartitionPeriod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl SeriesTemplate {
    /// Definition of series `id` built from this template.
    pub fn definition(&self, id: &str) -> SeriesDefinition {
        SeriesDefinition {
            id: id.to_string(),
            number_type: self.number_type,
            interval: self.interval,
            partition: self.partition,
            min: self.min,
            max: self.max,
        }
    }
}

impl Default for SeriesTemplate {
    fn default() -> Self {
        Self {
            number_type: NumberType::Float8,
            interval: MINUTE_MS,
            partition: PartitionPeriod::Day,
            min: None,
            max: None,
        }
    }
}

/// Configuration for an [`Engine`](crate::Engine).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Database root.
    /// Default: in-memory
    pub root: StorageRoot,

    /// Reject every mutating call. Archive roots are always read-only.
    /// Default: false
    pub read_only: bool,

    /// Maximum number of cached partition descriptors.
    /// Default: 1024
    pub cache_capacity: usize,

    /// Seconds without access after which a cached descriptor is evicted.
    /// Default: 600
    pub cache_idle_secs: u64,

    /// Maximum number of values in one insert batch.
    /// Default: 100 000
    pub max_batch_size: usize,

    /// Maximum number of output samples of one query.
    /// Default: 1 000 000
    pub max_query_samples: usize,

    /// Worker threads used for batch fan-out.
    /// Default: available parallelism
    pub worker_threads: usize,

    /// Create unknown series on first insert using this template.
    /// Default: disabled
    pub create_on_insert: Option<SeriesTemplate>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            root: StorageRoot::Memory,
            read_only: false,
            cache_capacity: 1024,
            cache_idle_secs: 600,
            max_batch_size: 100_000,
            max_query_samples: 1_000_000,
            worker_threads: std::thread::available_parallelism().map_or(1, |n| n.get()),
            create_on_insert: None,
        }
    }
}

impl EngineConfig {
    /// Default configuration rooted at `root`.
    pub fn with_root(root: StorageRoot) -> Self {
        Self {
            root,
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|err| {
            log::error!("invalid engine config: {err}");
            Error::InvalidConfig(err.to_string())
        })
    }

    /// Reads a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(Error::io("read config", path))?;
        Self::from_json_str(&json)
    }
}

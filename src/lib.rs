//! Fixed-interval time-series storage on memory-mapped partition files.
//!
//! Each series samples at a fixed interval. Its values live in one flat file
//! per day, month or year, one fixed-width slot per sample, so a timestamp
//! maps straight to a byte offset. Compact lossy codecs (linear and curved
//! range mapping, 3-byte and half floats) keep the slots small.
//!
//! ```no_run
//! use chronoslot::{Engine, EngineConfig, NumberType, PartitionPeriod, SeriesDefinition, StorageRoot};
//!
//! let engine = Engine::open(EngineConfig::with_root(StorageRoot::parse("/var/lib/chronoslot")))?;
//! engine.create_series(SeriesDefinition::new("boiler.temp", NumberType::Float4, 60_000, PartitionPeriod::Day))?;
//! engine.insert("boiler.temp", &[(1_731_283_200_000, Some(71.5.into()))], None)?;
//! assert_eq!(engine.get("boiler.temp", 1_731_283_200_000)?.map(|v| v.as_f64()), Some(71.5));
//! # Ok::<(), chronoslot::Error>(())
//! ```

pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod partition;
pub mod pool;
pub mod query;
pub mod reduce;
pub mod series;
pub mod service;
pub mod storage;
pub mod write;

pub use codec::{Codec, Number, NumberType, PartitionAdapter};
pub use config::{EngineConfig, SeriesTemplate, StorageRoot};
pub use engine::Engine;
pub use error::{Error, Result};
pub use partition::{PartitionKey, PartitionPeriod, PartitionRange};
pub use query::{QueryRequest, Sample};
pub use reduce::{Accumulator, Reducer};
pub use series::{SeriesDefinition, SeriesFile};
pub use storage::PersistenceAdapter;
pub use write::InsertReport;

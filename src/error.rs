use std::path::Path;

use crate::partition::PartitionKey;

/// Errors surfaced by the storage engine.
///
/// Storage failures display a generic message; the offending path and OS error
/// are logged where the failure is first observed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid series id: {0:?}")]
    InvalidSeriesId(String),
    #[error("invalid definition for series '{id}': {reason}")]
    InvalidDefinition { id: String, reason: String },
    #[error("invalid partition id '{value}' for {period} partitioning")]
    InvalidPartitionId { value: String, period: &'static str },
    #[error("timestamp {0} is outside the supported range")]
    InvalidTimestamp(i64),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("batch of {len} values exceeds the limit of {limit}")]
    BatchTooLarge { len: usize, limit: usize },
    #[error("query spans {len} samples, exceeding the limit of {limit}")]
    QueryTooLarge { len: usize, limit: usize },
    #[error("series not found: {0}")]
    SeriesNotFound(String),
    #[error("partition not found: {0}")]
    PartitionNotFound(PartitionKey),
    #[error("series '{0}' already exists with a different definition")]
    SeriesConflict(String),
    #[error("storage is read-only")]
    ReadOnly,
    #[error("storage failure")]
    Storage(#[source] std::io::Error),
    #[error("archive failure")]
    Archive(#[source] zip::result::ZipError),
    #[error("corrupt metadata for series '{0}'")]
    CorruptMetadata(String),
    #[error("worker task panicked")]
    Worker,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Maps an I/O failure on `path`, logging the detail that `Display` hides.
    pub(crate) fn io<'a>(op: &'static str, path: &'a Path) -> impl FnOnce(std::io::Error) -> Error + 'a {
        move |err| {
            log::error!("{op} failed for {}: {err}", path.display());
            Error::Storage(err)
        }
    }

    pub(crate) fn archive<'a>(
        op: &'static str,
        entry: &'a str,
    ) -> impl FnOnce(zip::result::ZipError) -> Error + 'a {
        move |err| {
            log::error!("{op} failed for archive entry {entry}: {err}");
            Error::Archive(err)
        }
    }

    /// True for the not-found family (series or partition).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::SeriesNotFound(_) | Error::PartitionNotFound(_))
    }
}

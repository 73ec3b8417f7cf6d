use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tempfile::NamedTempFile;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::partition::PartitionKey;
use crate::series::{validate_series_id, SeriesFile};
use crate::storage::{
    partition_keys, validate_key, AccessMode, PartitionBuffer, PersistenceAdapter, TempCopyMmap,
    SERIES_FILENAME,
};

/// Read-only store backed by a single zip archive.
///
/// Entries follow the directory layout (`<series-id>/series.json`,
/// `<series-id>/<partition-id>`). Partitions are copied into private temp
/// files before mapping so the archive is never touched; the copy is removed
/// when the returned buffer is dropped.
pub struct ArchiveStore {
    path: PathBuf,
    archive: Mutex<ZipArchive<File>>,
    entries: BTreeSet<String>,
}

impl ArchiveStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(Error::io("open archive", &path))?;
        let archive = ZipArchive::new(file).map_err(|err| {
            log::error!("cannot read archive {}: {err}", path.display());
            Error::Archive(err)
        })?;
        let entries = archive
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .map(str::to_string)
            .collect();
        Ok(Self {
            path,
            archive: Mutex::new(archive),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copies entry `name` into `out`.
    fn copy_entry(&self, name: &str, out: &mut impl Write) -> Result<u64> {
        let mut archive = self.archive.lock();
        let mut entry = archive.by_name(name).map_err(Error::archive("read", name))?;
        io::copy(&mut entry, out).map_err(|err| {
            log::error!("copy of archive entry {name} failed: {err}");
            Error::Storage(err)
        })
    }

    fn read_entry(&self, name: &str) -> Result<Vec<u8>> {
        let mut archive = self.archive.lock();
        let mut entry = archive.by_name(name).map_err(Error::archive("read", name))?;
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes).map_err(|err| {
            log::error!("read of archive entry {name} failed: {err}");
            Error::Storage(err)
        })?;
        Ok(bytes)
    }
}

impl PersistenceAdapter for ArchiveStore {
    fn is_read_only(&self) -> bool {
        true
    }

    fn list_series(&self) -> Result<Vec<SeriesFile>> {
        let suffix = format!("/{SERIES_FILENAME}");
        let mut series = Vec::new();
        for name in &self.entries {
            let Some(id) = name.strip_suffix(&suffix) else { continue };
            if validate_series_id(id).is_err() {
                continue;
            }
            series.push(SeriesFile::from_json(id, &self.read_entry(name)?)?);
        }
        Ok(series)
    }

    fn save_series(&self, _series: &SeriesFile) -> Result<()> {
        Err(Error::ReadOnly)
    }

    fn delete_series(&self, _id: &str) -> Result<()> {
        Err(Error::ReadOnly)
    }

    fn list_partitions(&self, series: &SeriesFile) -> Result<Vec<PartitionKey>> {
        let prefix = format!("{}/", series.id());
        if !self.entries.contains(&format!("{prefix}{SERIES_FILENAME}")) {
            return Err(Error::SeriesNotFound(series.id().to_string()));
        }
        let names = self
            .entries
            .iter()
            .filter_map(|name| name.strip_prefix(&prefix));
        Ok(partition_keys(series.id(), series.definition.partition, names))
    }

    fn create_partition(&self, _key: &PartitionKey, _size_bytes: usize) -> Result<bool> {
        Err(Error::ReadOnly)
    }

    fn open_partition(&self, key: &PartitionKey, mode: AccessMode) -> Result<PartitionBuffer> {
        if mode == AccessMode::ReadWrite {
            return Err(Error::ReadOnly);
        }
        validate_key(key)?;
        let name = format!("{}/{}", key.series_id, key.partition_id);
        if !self.entries.contains(&name) {
            return Err(Error::PartitionNotFound(key.clone()));
        }

        let mut temp = NamedTempFile::new().map_err(|err| {
            log::error!("cannot create temp copy for {key}: {err}");
            Error::Storage(err)
        })?;
        match self.copy_entry(&name, &mut temp) {
            Ok(_) => {}
            Err(Error::Archive(ZipError::FileNotFound)) => {
                return Err(Error::PartitionNotFound(key.clone()))
            }
            Err(err) => return Err(err),
        }
        temp.flush().map_err(Error::io("flush temp copy", temp.path()))?;
        Ok(PartitionBuffer::temp_copy(TempCopyMmap::new(temp)?))
    }
}

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::partition::PartitionKey;
use crate::series::{validate_series_id, SeriesFile};
use crate::storage::{
    partition_keys, validate_key, AccessMode, MmapFile, PartitionBuffer, PersistenceAdapter,
    ReadOnlyMmap, SERIES_FILENAME,
};

/// Store rooted at a writable directory, one subdirectory per series.
#[derive(Debug)]
pub struct DirectoryStore {
    root: PathBuf,
    read_only: bool,
}

impl DirectoryStore {
    /// Opens `root`, creating it unless `read_only`.
    pub fn open(root: impl AsRef<Path>, read_only: bool) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if read_only {
            if !root.is_dir() {
                log::error!("read-only store root {} is not a directory", root.display());
                return Err(Error::Storage(std::io::Error::new(
                    ErrorKind::NotFound,
                    "store root missing",
                )));
            }
        } else {
            fs::create_dir_all(&root).map_err(Error::io("create store root", &root))?;
        }
        Ok(Self { root, read_only })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn series_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    fn series_path(&self, id: &str) -> PathBuf {
        self.series_dir(id).join(SERIES_FILENAME)
    }

    fn partition_path(&self, key: &PartitionKey) -> PathBuf {
        self.series_dir(&key.series_id).join(&key.partition_id)
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(Error::ReadOnly);
        }
        Ok(())
    }

    fn load_series(&self, id: &str) -> Result<SeriesFile> {
        let path = self.series_path(id);
        let bytes = fs::read(&path).map_err(Error::io("read series", &path))?;
        SeriesFile::from_json(id, &bytes)
    }
}

impl PersistenceAdapter for DirectoryStore {
    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn list_series(&self) -> Result<Vec<SeriesFile>> {
        let entries = fs::read_dir(&self.root).map_err(Error::io("list series", &self.root))?;
        let mut series = Vec::new();
        for entry in entries {
            let entry = entry.map_err(Error::io("list series", &self.root))?;
            let name = entry.file_name();
            let Some(id) = name.to_str() else { continue };
            if validate_series_id(id).is_err() || !entry.path().is_dir() {
                continue;
            }
            if !self.series_path(id).exists() {
                log::warn!("skipping {}: no {SERIES_FILENAME}", entry.path().display());
                continue;
            }
            series.push(self.load_series(id)?);
        }
        series.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(series)
    }

    fn save_series(&self, series: &SeriesFile) -> Result<()> {
        self.ensure_writable()?;
        validate_series_id(series.id())?;
        let dir = self.series_dir(series.id());
        fs::create_dir_all(&dir).map_err(Error::io("create series dir", &dir))?;

        let path = self.series_path(series.id());
        let tmp = path.with_extension("json.tmp");
        let data = series.to_json()?;
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)
            .map_err(Error::io("write series", &tmp))?;
        file.write_all(&data).map_err(Error::io("write series", &tmp))?;
        file.sync_all().map_err(Error::io("sync series", &tmp))?;
        fs::rename(&tmp, &path).map_err(Error::io("publish series", &path))?;
        Ok(())
    }

    fn delete_series(&self, id: &str) -> Result<()> {
        self.ensure_writable()?;
        validate_series_id(id)?;
        let dir = self.series_dir(id);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(Error::SeriesNotFound(id.to_string())),
            Err(err) => Err(Error::io("delete series", &dir)(err)),
        }
    }

    fn list_partitions(&self, series: &SeriesFile) -> Result<Vec<PartitionKey>> {
        let dir = self.series_dir(series.id());
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(Error::SeriesNotFound(series.id().to_string()))
            }
            Err(err) => return Err(Error::io("list partitions", &dir)(err)),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(Error::io("list partitions", &dir))?;
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        Ok(partition_keys(
            series.id(),
            series.definition.partition,
            names.iter().map(String::as_str),
        ))
    }

    fn create_partition(&self, key: &PartitionKey, size_bytes: usize) -> Result<bool> {
        self.ensure_writable()?;
        validate_key(key)?;
        if !self.series_path(&key.series_id).exists() {
            return Err(Error::SeriesNotFound(key.series_id.clone()));
        }
        let path = self.partition_path(key);
        let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                let len = fs::metadata(&path).map_err(Error::io("stat partition", &path))?.len();
                if len != size_bytes as u64 {
                    log::warn!(
                        "partition {key} is {len} bytes, expected {size_bytes}"
                    );
                }
                return Ok(false);
            }
            Err(err) => return Err(Error::io("create partition", &path)(err)),
        };
        file.set_len(size_bytes as u64)
            .map_err(Error::io("size partition", &path))?;
        log::debug!("created partition {key} ({size_bytes} bytes)");
        Ok(true)
    }

    fn open_partition(&self, key: &PartitionKey, mode: AccessMode) -> Result<PartitionBuffer> {
        validate_key(key)?;
        if mode == AccessMode::ReadWrite {
            self.ensure_writable()?;
        }
        let path = self.partition_path(key);
        if !path.is_file() {
            return Err(Error::PartitionNotFound(key.clone()));
        }
        match mode {
            AccessMode::Read => Ok(PartitionBuffer::read_only(ReadOnlyMmap::open(&path)?)),
            AccessMode::ReadWrite => Ok(PartitionBuffer::mapped(MmapFile::open(&path)?)),
        }
    }
}

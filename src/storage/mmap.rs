use std::fs::{File, OpenOptions};
use std::path::Path;

use memmap2::{Mmap, MmapMut, MmapOptions};
use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::RawRwLock;
use tempfile::NamedTempFile;

use crate::error::{Error, Result};

/// How a partition is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    ReadWrite,
}

/// Writable mapping of a partition file.
pub struct MmapFile {
    map: MmapMut,
    _file: File,
}

impl MmapFile {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(Error::io("open partition", path))?;
        let len = file_len(&file, path)?;
        let map = unsafe { MmapOptions::new().len(len).map_mut(&file) }
            .map_err(Error::io("map partition", path))?;
        Ok(Self { map, _file: file })
    }
}

/// Read-only mapping of a partition file.
pub struct ReadOnlyMmap {
    map: Mmap,
    _file: File,
}

impl ReadOnlyMmap {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(Error::io("open partition", path))?;
        let len = file_len(&file, path)?;
        let map = unsafe { MmapOptions::new().len(len).map(&file) }
            .map_err(Error::io("map partition", path))?;
        Ok(Self { map, _file: file })
    }
}

/// Read-only mapping of a private copy that is deleted when dropped.
///
/// Field order matters: the map is released before the temp file is removed.
pub struct TempCopyMmap {
    map: Mmap,
    _file: File,
    _temp: NamedTempFile,
}

impl TempCopyMmap {
    pub fn new(temp: NamedTempFile) -> Result<Self> {
        let path = temp.path().to_path_buf();
        let file = File::open(&path).map_err(Error::io("open temp copy", &path))?;
        let len = file_len(&file, &path)?;
        let map = unsafe { MmapOptions::new().len(len).map(&file) }
            .map_err(Error::io("map temp copy", &path))?;
        Ok(Self {
            map,
            _file: file,
            _temp: temp,
        })
    }
}

fn file_len(file: &File, path: &Path) -> Result<usize> {
    let len = file.metadata().map_err(Error::io("stat partition", path))?.len() as usize;
    if len == 0 {
        log::error!("partition {} is empty", path.display());
        return Err(Error::Storage(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "empty partition file",
        )));
    }
    Ok(len)
}

enum Backing {
    Mapped(MmapFile),
    ReadOnly(ReadOnlyMmap),
    TempCopy(TempCopyMmap),
    MemoryRead(ArcRwLockReadGuard<RawRwLock, Vec<u8>>),
    MemoryWrite(ArcRwLockWriteGuard<RawRwLock, Vec<u8>>),
}

/// Scoped handle over the raw bytes of one partition.
///
/// Dropping the handle unmaps the file (and removes a temp copy, if any) on
/// every exit path. Handles are never cached between operations.
pub struct PartitionBuffer {
    backing: Backing,
}

impl PartitionBuffer {
    pub fn mapped(file: MmapFile) -> Self {
        Self { backing: Backing::Mapped(file) }
    }

    pub fn read_only(file: ReadOnlyMmap) -> Self {
        Self { backing: Backing::ReadOnly(file) }
    }

    pub fn temp_copy(file: TempCopyMmap) -> Self {
        Self { backing: Backing::TempCopy(file) }
    }

    pub fn memory_read(guard: ArcRwLockReadGuard<RawRwLock, Vec<u8>>) -> Self {
        Self { backing: Backing::MemoryRead(guard) }
    }

    pub fn memory_write(guard: ArcRwLockWriteGuard<RawRwLock, Vec<u8>>) -> Self {
        Self { backing: Backing::MemoryWrite(guard) }
    }

    pub fn as_slice(&self) -> &[u8] {
        match &self.backing {
            Backing::Mapped(f) => &f.map[..],
            Backing::ReadOnly(f) => &f.map[..],
            Backing::TempCopy(f) => &f.map[..],
            Backing::MemoryRead(g) => g.as_slice(),
            Backing::MemoryWrite(g) => g.as_slice(),
        }
    }

    /// Mutable bytes; fails for handles opened with [`AccessMode::Read`].
    pub fn as_mut_slice(&mut self) -> Result<&mut [u8]> {
        match &mut self.backing {
            Backing::Mapped(f) => Ok(&mut f.map[..]),
            Backing::MemoryWrite(g) => Ok(g.as_mut_slice()),
            _ => Err(Error::ReadOnly),
        }
    }

    pub fn is_writable(&self) -> bool {
        matches!(self.backing, Backing::Mapped(_) | Backing::MemoryWrite(_))
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Schedules dirty pages for write-back.
    pub fn flush(&self) -> Result<()> {
        if let Backing::Mapped(f) = &self.backing {
            f.map.flush_async().map_err(|err| {
                log::error!("partition flush failed: {err}");
                Error::Storage(err)
            })?;
        }
        Ok(())
    }
}

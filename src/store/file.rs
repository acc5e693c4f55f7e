//! A file handle that remembers its path for error reporting.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{JamError, Result};

/// One of the four backing files of a base.
#[derive(Debug)]
pub(crate) struct StoreFile {
    path: PathBuf,
    file: File,
}

impl StoreFile {
    /// Create (or truncate) the file.
    pub fn create(path: PathBuf) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| JamError::io(&path, e))?;
        Ok(Self { path, file })
    }

    /// Open an existing file for reading and writing, optionally creating it.
    pub fn open(path: PathBuf, create_missing: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(create_missing)
            .truncate(false)
            .open(&path)
            .map_err(|e| JamError::io(&path, e))?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn handle(&self) -> &File {
        &self.file
    }

    /// Current file length in bytes.
    pub fn len(&self) -> Result<u64> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(|e| JamError::io(&self.path, e))
    }

    /// Fill `buf` from `offset`. Short files are an I/O error.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| JamError::io(&self.path, e))?;
        self.file
            .read_exact(buf)
            .map_err(|e| JamError::io(&self.path, e))
    }

    /// Read the whole file.
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|e| JamError::io(&self.path, e))?;
        let mut buf = Vec::new();
        self.file
            .read_to_end(&mut buf)
            .map_err(|e| JamError::io(&self.path, e))?;
        Ok(buf)
    }

    /// Overwrite bytes at `offset`.
    pub fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| JamError::io(&self.path, e))?;
        self.file
            .write_all(bytes)
            .map_err(|e| JamError::io(&self.path, e))?;
        self.file.flush().map_err(|e| JamError::io(&self.path, e))
    }

    /// Append at end of file and return the offset the bytes landed at.
    pub fn append(&mut self, bytes: &[u8]) -> Result<u64> {
        let offset = self
            .file
            .seek(SeekFrom::End(0))
            .map_err(|e| JamError::io(&self.path, e))?;
        self.file
            .write_all(bytes)
            .map_err(|e| JamError::io(&self.path, e))?;
        self.file.flush().map_err(|e| JamError::io(&self.path, e))?;
        Ok(offset)
    }

    /// Push written data to the device.
    pub fn sync(&self) -> std::io::Result<()> {
        self.file.sync_data()
    }
}

/// Convert a byte offset to the format's 32-bit field.
pub(crate) fn offset_u32(offset: u64, path: &Path) -> Result<u32> {
    u32::try_from(offset).map_err(|_| JamError::TooLarge {
        path: path.to_path_buf(),
    })
}

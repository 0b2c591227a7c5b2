//! Byte-addressable storage backing a container

use crate::error::{ContainerError, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Offset-addressed byte store
///
/// Every read and write is explicit; implementations must not assume the
/// caller buffers anything.
pub trait Storage {
    /// Read exactly `len` bytes starting at `offset`
    fn read_bytes(&mut self, offset: u64, len: usize) -> Result<Vec<u8>>;

    /// Write `bytes` starting at `offset`
    fn write_bytes(&mut self, bytes: &[u8], offset: u64) -> Result<()>;

    /// Flush buffered writes to the underlying medium
    fn sync(&mut self) -> Result<()>;

    /// Current length of the store in bytes
    fn len(&self) -> Result<u64>;

    /// Grow or shrink the store to `len` bytes (new bytes read as zero)
    fn set_len(&mut self, len: u64) -> Result<()>;
}

/// Disk-backed container storage
pub struct ContainerFile {
    file: File,
    path: PathBuf,
}

impl ContainerFile {
    /// Create a new container file, failing if it already exists
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => ContainerError::AlreadyExists(format!(
                    "container file {}",
                    path.as_ref().display()
                )),
                _ => ContainerError::Io(e),
            })?;

        Ok(ContainerFile {
            file,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Open an existing container file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ContainerError::NotFound(format!(
                    "container file {}",
                    path.as_ref().display()
                )),
                _ => ContainerError::Io(e),
            })?;

        Ok(ContainerFile {
            file,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Get file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Storage for ContainerFile {
    fn read_bytes(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; len];
        self.file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn write_bytes(&mut self, bytes: &[u8], offset: u64) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(bytes)?;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn set_len(&mut self, len: u64) -> Result<()> {
        self.file.set_len(len)?;
        Ok(())
    }
}

/// In-memory storage, used for scratch containers and tests
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    bytes: Vec<u8>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage::default()
    }

    /// Wrap an existing image (for example a copy of a container file)
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        MemoryStorage { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl Storage for MemoryStorage {
    fn read_bytes(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let start = offset as usize;
        self.bytes
            .get(start..start + len)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| {
                ContainerError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!(
                        "read of {} bytes at offset {} past end of {}-byte store",
                        len,
                        offset,
                        self.bytes.len()
                    ),
                ))
            })
    }

    fn write_bytes(&mut self, bytes: &[u8], offset: u64) -> Result<()> {
        let start = offset as usize;
        let end = start + bytes.len();
        if end > self.bytes.len() {
            self.bytes.resize(end, 0);
        }
        self.bytes[start..end].copy_from_slice(bytes);
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }

    fn len(&self) -> Result<u64> {
        Ok(self.bytes.len() as u64)
    }

    fn set_len(&mut self, len: u64) -> Result<()> {
        self.bytes.resize(len as usize, 0);
        Ok(())
    }
}

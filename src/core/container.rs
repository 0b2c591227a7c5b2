//! Main Container API
//!
//! Path-based file and directory operations on top of the block engine.

use crate::config::ContainerConfig;
use crate::descriptor::ContainerDescriptor;
use crate::engine::BlockEngine;
use crate::error::{ContainerError, Result};
use crate::inode::Inode;
use crate::io::{ContainerFile, MemoryStorage, Storage};
use crate::listing::{ContainedDir, ContainedFile, ContainerStats};
use crate::path::ContainerPath;
use std::path::Path;
use tracing::{debug, info};

/// A container filesystem
///
/// Directories and files live inside one flat store, by default a host
/// file. Every operation reads and writes the store directly; only the
/// allocation table is held in memory and written back on [`flush`],
/// [`close`] or drop.
///
/// [`flush`]: Container::flush
/// [`close`]: Container::close
pub struct Container<S: Storage = ContainerFile> {
    engine: BlockEngine<S>,
    closed: bool,
}

impl Container<ContainerFile> {
    /// Create a new container file at `path`
    ///
    /// Fails with `AlreadyExists` if the file is already there.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use cdfs::{Container, ContainerConfig};
    ///
    /// # fn main() -> cdfs::Result<()> {
    /// let mut container = Container::create("data.cdfs", &ContainerConfig::with_size_mib(4))?;
    /// container.create_dir("/docs")?;
    /// container.create_file("/docs/hello.txt", b"Hello")?;
    /// container.close()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn create<P: AsRef<Path>>(path: P, config: &ContainerConfig) -> Result<Self> {
        let path = path.as_ref();
        let descriptor = config.descriptor()?;

        if path.exists() {
            return Err(ContainerError::AlreadyExists(format!(
                "container file {}",
                path.display()
            )));
        }

        if config.create_parent_dirs {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    debug!("Creating host directory {}", parent.display());
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        let file = ContainerFile::create(path)?;
        let container = Self::with_engine(BlockEngine::format(file, descriptor)?);

        info!(
            "Created container {} ({} MiB, {} blocks)",
            path.display(),
            config.size_mib,
            descriptor.block_count
        );

        Ok(container)
    }

    /// Open an existing container file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = ContainerFile::open(path)?;
        let container = Self::with_engine(BlockEngine::load(file)?);

        info!(
            "Opened container {} ({} blocks, {} free)",
            path.display(),
            container.descriptor().block_count,
            container.stats().free_blocks
        );

        Ok(container)
    }
}

impl Container<MemoryStorage> {
    /// Scratch container held entirely in memory
    pub fn in_memory(config: &ContainerConfig) -> Result<Self> {
        Self::format(MemoryStorage::new(), config)
    }
}

impl<S: Storage> Container<S> {
    fn with_engine(engine: BlockEngine<S>) -> Self {
        Container {
            engine,
            closed: false,
        }
    }

    /// Format `storage` as an empty container
    pub fn format(storage: S, config: &ContainerConfig) -> Result<Self> {
        let descriptor = config.descriptor()?;
        Ok(Self::with_engine(BlockEngine::format(storage, descriptor)?))
    }

    /// Load a container previously written to `storage`
    pub fn load(storage: S) -> Result<Self> {
        Ok(Self::with_engine(BlockEngine::load(storage)?))
    }

    /// Create an empty directory
    pub fn create_dir(&mut self, path: &str) -> Result<()> {
        let path = ContainerPath::parse(path);
        debug!("create_dir {}", path);
        self.engine.create_entity(&path, true, &[])?;
        Ok(())
    }

    /// Create a file holding `data`
    pub fn create_file(&mut self, path: &str, data: &[u8]) -> Result<()> {
        let path = ContainerPath::parse(path);
        debug!("create_file {} ({} bytes)", path, data.len());
        self.engine.create_entity(&path, false, data)?;
        Ok(())
    }

    /// Replace a file's content
    pub fn write(&mut self, path: &str, data: &[u8]) -> Result<()> {
        let path = ContainerPath::parse(path);
        debug!("write {} ({} bytes)", path, data.len());
        let inode = self.resolve_file(&path)?;
        self.engine.write_content(inode.block, data)
    }

    /// Append to a file's content
    pub fn append(&mut self, path: &str, data: &[u8]) -> Result<()> {
        let path = ContainerPath::parse(path);
        debug!("append {} ({} bytes)", path, data.len());
        let inode = self.resolve_file(&path)?;
        self.engine.append_content(inode.block, data)
    }

    /// Read a whole file
    pub fn read(&self, path: &str) -> Result<ContainedFile> {
        let path = ContainerPath::parse(path);
        debug!("read {}", path);
        let inode = self.resolve_file(&path)?;
        let (meta, data) = self.engine.read_all(inode.block)?;

        Ok(ContainedFile {
            name: meta.name,
            path: parent_string(&path),
            data,
        })
    }

    /// List a directory's subdirectories and files, in insertion order
    pub fn list_dir(&self, path: &str) -> Result<ContainedDir> {
        let path = ContainerPath::parse(path);
        debug!("list_dir {}", path);
        let inode = self.engine.resolve_dir(&path)?;

        let (sub_dirs, files): (Vec<Inode>, Vec<Inode>) = self
            .engine
            .read_inodes(inode.block)?
            .into_iter()
            .partition(|child| child.is_dir);

        Ok(ContainedDir {
            name: path.name().to_string(),
            path: parent_string(&path),
            sub_dirs: sub_dirs.into_iter().map(|child| child.name).collect(),
            files: files.into_iter().map(|child| child.name).collect(),
        })
    }

    /// Delete a file
    pub fn delete(&mut self, path: &str) -> Result<()> {
        let path = ContainerPath::parse(path);
        debug!("delete {}", path);
        self.resolve_file(&path)?;
        self.engine.delete_entity(&path, false)?;
        Ok(())
    }

    /// Delete a directory; a non-empty one only with `recursive`
    pub fn delete_dir(&mut self, path: &str, recursive: bool) -> Result<()> {
        let path = ContainerPath::parse(path);
        debug!("delete_dir {} (recursive: {})", path, recursive);
        self.engine.resolve_dir(&path)?;
        self.engine.delete_entity(&path, recursive)?;
        Ok(())
    }

    /// Rename a file or directory in place
    pub fn rename(&mut self, path: &str, new_name: &str) -> Result<()> {
        let path = ContainerPath::parse(path);
        debug!("rename {} -> {}", path, new_name);
        self.engine.rename(&path, new_name)
    }

    /// Move a file or directory into another directory
    pub fn move_entry(&mut self, from: &str, to_dir: &str) -> Result<()> {
        let from = ContainerPath::parse(from);
        let to_dir = ContainerPath::parse(to_dir);
        debug!("move {} -> {}", from, to_dir);
        self.engine.move_entry(&from, &to_dir)
    }

    pub fn exists(&self, path: &str) -> Result<bool> {
        match self.engine.resolve(&ContainerPath::parse(path)) {
            Ok(_) => Ok(true),
            Err(ContainerError::NotFound(_)) | Err(ContainerError::NotADirectory(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn is_dir(&self, path: &str) -> Result<bool> {
        Ok(self.engine.resolve(&ContainerPath::parse(path))?.is_dir)
    }

    pub fn stats(&self) -> ContainerStats {
        self.engine.stats()
    }

    pub fn descriptor(&self) -> &ContainerDescriptor {
        self.engine.descriptor()
    }

    /// Write the allocation table back to storage
    pub fn flush(&mut self) -> Result<()> {
        self.engine.flush()?;
        info!("Flushed container ({} blocks used)", self.stats().used_blocks);
        Ok(())
    }

    /// Flush and release the container
    pub fn close(mut self) -> Result<()> {
        self.engine.flush()?;
        self.closed = true;
        info!("Closed container");
        Ok(())
    }

    fn resolve_file(&self, path: &ContainerPath) -> Result<Inode> {
        let inode = self.engine.resolve(path)?;
        if inode.is_dir {
            return Err(ContainerError::NotAFile(path.to_string()));
        }
        Ok(inode)
    }
}

impl<S: Storage> Drop for Container<S> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.engine.flush() {
            tracing::warn!("Failed to flush container on drop: {}", e);
        }
    }
}

/// Rendered parent of `path`; the root is its own parent
fn parent_string(path: &ContainerPath) -> String {
    path.parent()
        .map(|parent| parent.to_string())
        .unwrap_or_else(|| path.to_string())
}

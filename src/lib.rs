//! # cdfs - Container Filesystem
//!
//! `cdfs` stores a hierarchy of directories and files inside one flat host
//! file. The file is carved into fixed 4 KiB blocks tracked by a bitmap
//! allocation table; every file and directory is a chain of blocks headed by
//! a metadata block, and directories hold fixed-size entries pointing at
//! their children's head blocks.
//!
//! - **Single host file** with a 12-byte descriptor and a bit-packed table
//! - **Block chains** that grow and shrink in place
//! - **Cheap moves and renames** (only directory entries change)
//! - **Recursive delete** that returns every block to the table
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cdfs::{Container, ContainerConfig, Result};
//!
//! # fn main() -> Result<()> {
//! let mut container = Container::create("data.cdfs", &ContainerConfig::with_size_mib(8))?;
//!
//! container.create_dir("/documents")?;
//! container.create_file("/documents/report.txt", b"Hello, World!")?;
//! container.append("/documents/report.txt", b" More text.")?;
//!
//! let file = container.read("/documents/report.txt")?;
//! assert_eq!(file.data, b"Hello, World! More text.");
//!
//! let listing = container.list_dir("/documents")?;
//! assert_eq!(listing.files, vec!["report.txt"]);
//!
//! container.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Builder
//!
//! ```rust,no_run
//! use cdfs::{ContainerBuilder, Result};
//!
//! # fn main() -> Result<()> {
//! let container = ContainerBuilder::new()
//!     .path("/data/archive.cdfs")
//!     .config_file("cdfs.toml")
//!     .size_mib(64)
//!     .create()?;
//! # Ok(())
//! # }
//! ```

pub mod core;

// Re-export core modules internally so crate:: paths in core still work
#[allow(unused_imports)]
pub(crate) use crate::core::{
    allocator, block, codec, config, container, descriptor, engine, error, inode, io, listing,
    path,
};

pub use crate::core::{
    allocator::{bitmap::AllocationTable, BlockAllocator},
    config::ContainerConfig,
    container::Container,
    descriptor::{ContainerDescriptor, BLOCK_SIZE, SIGNATURE},
    error::{ContainerError, Result},
    io::{ContainerFile, MemoryStorage, Storage},
    listing::{ContainedDir, ContainedFile, ContainerStats},
    path::ContainerPath,
};

use std::path::PathBuf;
use tracing::info;

/// Builder for creating or opening a container
///
/// Settings are taken, in increasing precedence, from the defaults, a
/// [`ContainerConfig`] or a config file, and the individual setters.
///
/// # Examples
///
/// ```rust,no_run
/// use cdfs::ContainerBuilder;
///
/// # fn main() -> cdfs::Result<()> {
/// let container = ContainerBuilder::new()
///     .path("scratch.cdfs")
///     .size_mib(4)
///     .create()?;
/// # Ok(())
/// # }
/// ```
pub struct ContainerBuilder {
    path: Option<PathBuf>,
    config: Option<ContainerConfig>,
    config_file: Option<PathBuf>,
    size_mib: Option<u32>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        ContainerBuilder {
            path: None,
            config: None,
            config_file: None,
            size_mib: None,
        }
    }

    /// Set the host file path (required)
    pub fn path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the container size in MiB
    pub fn size_mib(mut self, size_mib: u32) -> Self {
        self.size_mib = Some(size_mib);
        self
    }

    /// Use explicit settings
    pub fn config(mut self, config: ContainerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load settings from a TOML (or `.json`) file
    pub fn config_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config_file = Some(path.into());
        self
    }

    fn resolve_path(&self) -> Result<PathBuf> {
        self.path
            .clone()
            .ok_or_else(|| ContainerError::InvalidArgument("path must be set".to_string()))
    }

    /// Effective settings for a new container
    pub fn build_config(&self) -> Result<ContainerConfig> {
        let mut config = match (&self.config_file, &self.config) {
            (Some(file), _) => ContainerConfig::from_file(file)?,
            (None, Some(config)) => config.clone(),
            (None, None) => ContainerConfig::default(),
        };

        if let Some(size_mib) = self.size_mib {
            config.size_mib = size_mib;
        }

        config.validate()?;
        Ok(config)
    }

    /// Create a new container file
    pub fn create(self) -> Result<Container> {
        let path = self.resolve_path()?;
        let config = self.build_config()?;

        info!("Building container at {}", path.display());
        Container::create(&path, &config)
    }

    /// Open an existing container file
    pub fn open(self) -> Result<Container> {
        let path = self.resolve_path()?;
        Container::open(&path)
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_create_and_open() -> Result<()> {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("builder.cdfs");

        let mut container = ContainerBuilder::new().path(&path).size_mib(2).create()?;
        container.create_file("/a.txt", b"hello")?;
        container.close()?;

        let container = ContainerBuilder::new().path(&path).open()?;
        assert_eq!(container.descriptor().block_count, 512);
        assert_eq!(container.read("/a.txt")?.data, b"hello");

        Ok(())
    }

    #[test]
    fn test_builder_requires_path() {
        let result = ContainerBuilder::new().size_mib(1).create();
        assert!(matches!(result, Err(ContainerError::InvalidArgument(_))));
    }

    #[test]
    fn test_builder_config_file() -> Result<()> {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("cdfs.toml");
        std::fs::write(&config_path, "size_mib = 3\n")?;

        let config = ContainerBuilder::new()
            .config_file(&config_path)
            .build_config()?;
        assert_eq!(config.size_mib, 3);

        let overridden = ContainerBuilder::new()
            .config_file(&config_path)
            .size_mib(5)
            .build_config()?;
        assert_eq!(overridden.size_mib, 5);

        Ok(())
    }

    #[test]
    fn test_builder_creates_parent_dirs() -> Result<()> {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/deeper/c.cdfs");

        let container = ContainerBuilder::new().path(&path).size_mib(1).create()?;
        drop(container);

        assert!(path.exists());
        Ok(())
    }
}

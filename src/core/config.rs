//! Container creation settings
//!
//! Settings can be built in code, or loaded from a TOML or JSON file:
//!
//! ```toml
//! size_mib = 64
//! block_size = 4096
//! create_parent_dirs = true
//! ```

use crate::descriptor::{ContainerDescriptor, BLOCK_SIZE};
use crate::error::{ContainerError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_SIZE_MIB: u32 = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Requested container size in mebibytes
    pub size_mib: u32,

    /// Bytes per block (only 4096 is supported)
    pub block_size: u32,

    /// Create missing host directories when creating the container file
    pub create_parent_dirs: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        ContainerConfig {
            size_mib: DEFAULT_SIZE_MIB,
            block_size: BLOCK_SIZE as u32,
            create_parent_dirs: true,
        }
    }
}

impl ContainerConfig {
    /// Default settings with a custom size
    pub fn with_size_mib(size_mib: u32) -> Self {
        ContainerConfig {
            size_mib,
            ..Default::default()
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ContainerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: ContainerConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load settings from a file; `.json` files are parsed as JSON, anything
    /// else as TOML
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    /// Check the settings describe a container this crate can build
    pub fn validate(&self) -> Result<()> {
        if self.block_size != BLOCK_SIZE as u32 {
            return Err(ContainerError::Config(format!(
                "block size {} is not supported (only {})",
                self.block_size, BLOCK_SIZE
            )));
        }

        ContainerDescriptor::new(self.size_mib).map(|_| ())
    }

    /// Descriptor for a container built from these settings
    pub fn descriptor(&self) -> Result<ContainerDescriptor> {
        self.validate()?;
        ContainerDescriptor::new(self.size_mib)
    }
}

//! Container filesystem core
//!
//! A hierarchy of directories and files stored in one flat host file,
//! addressed through fixed-size blocks:
//!
//! - [`error`] - Error types for container operations
//! - [`codec`] - Big-endian integers, block pointers and name fields
//! - [`descriptor`] - The 12-byte container header and block geometry
//! - [`allocator`] - Block allocation:
//!   - [`allocator::bitmap`] - One-bit-per-block allocation table
//! - [`block`] - Metadata (head) and data (continuation) block layouts
//! - [`inode`] - Directory entry records
//! - [`path`] - Delimiter-agnostic container paths
//! - [`io`] - Storage backends (host file, memory)
//! - [`engine`] - Chain traversal and every structural mutation
//! - [`container`] - Path-based public API
//! - [`config`] - Creation settings
//! - [`listing`] - Listing and read results
//!
//! ## Layout
//!
//! ```text
//! [descriptor (12)][allocation table (block_count / 8)][block 0][block 1]...
//! ```
//!
//! Block 0 always holds the root directory.

pub mod allocator;
pub mod block;
pub mod codec;
pub mod config;
pub mod container;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod inode;
pub mod io;
pub mod listing;
pub mod path;

pub use container::Container;
pub use error::{ContainerError, Result};

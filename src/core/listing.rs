//! Result types returned by the container API

use serde::{Deserialize, Serialize};

/// A directory listing
///
/// `path` is the parent directory's path; the root lists itself as the
/// root path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainedDir {
    pub name: String,
    pub path: String,
    /// Subdirectory names, in insertion order
    pub sub_dirs: Vec<String>,
    /// File names, in insertion order
    pub files: Vec<String>,
}

impl ContainedDir {
    pub fn is_empty(&self) -> bool {
        self.sub_dirs.is_empty() && self.files.is_empty()
    }

    /// Number of direct children
    pub fn len(&self) -> usize {
        self.sub_dirs.len() + self.files.len()
    }
}

/// A file read result; `path` is the parent directory's path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainedFile {
    pub name: String,
    pub path: String,
    pub data: Vec<u8>,
}

impl ContainedFile {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Container statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStats {
    pub block_size: u32,
    pub total_blocks: u32,
    pub used_blocks: u32,
    pub free_blocks: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dir_counts() {
        let dir = ContainedDir {
            name: "docs".to_string(),
            path: "/".to_string(),
            sub_dirs: vec!["a".to_string()],
            files: vec!["b".to_string(), "c".to_string()],
        };
        assert_eq!(dir.len(), 3);
        assert!(!dir.is_empty());
    }

    #[test]
    fn test_listing_serializes() {
        let file = ContainedFile {
            name: "x".to_string(),
            path: "/".to_string(),
            data: vec![1, 2],
        };
        let json = serde_json::to_string(&file).unwrap();
        assert_eq!(json, r#"{"name":"x","path":"/","data":[1,2]}"#);
    }
}

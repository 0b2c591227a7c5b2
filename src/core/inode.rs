//! Directory entries
//!
//! A directory's content is the flat concatenation of its children's
//! inode records, in insertion order:
//!
//! ```text
//! [name (256, zero padded)][head block (4)][is_dir (1)]   = 261 bytes
//! ```

use crate::codec::{self, NAME_LEN};
use crate::error::{ContainerError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    pub name: String,
    /// Index of the child's head metadata block
    pub block: u32,
    pub is_dir: bool,
}

impl Inode {
    pub const SIZE: usize = NAME_LEN + 4 + 1;

    pub fn new(name: impl Into<String>, block: u32, is_dir: bool) -> Self {
        Inode {
            name: name.into(),
            block,
            is_dir,
        }
    }

    fn write_into(&self, buf: &mut [u8]) {
        codec::put_name(buf, 0, &self.name);
        codec::put_u32(buf, NAME_LEN, self.block);
        codec::put_bool(buf, NAME_LEN + 4, self.is_dir);
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Inode {
            name: codec::get_name(bytes, 0)?,
            block: codec::get_u32(bytes, NAME_LEN)?,
            is_dir: codec::get_bool(bytes, NAME_LEN + 4)?,
        })
    }
}

/// Serialize a directory's entries into its content bytes
pub fn encode_inodes(inodes: &[Inode]) -> Vec<u8> {
    let mut bytes = vec![0u8; inodes.len() * Inode::SIZE];
    for (inode, record) in inodes.iter().zip(bytes.chunks_exact_mut(Inode::SIZE)) {
        inode.write_into(record);
    }
    bytes
}

/// Parse a directory's content bytes back into entries
pub fn decode_inodes(bytes: &[u8]) -> Result<Vec<Inode>> {
    if bytes.len() % Inode::SIZE != 0 {
        return Err(ContainerError::InvalidFormat(format!(
            "directory content of {} bytes is not a whole number of {}-byte entries",
            bytes.len(),
            Inode::SIZE
        )));
    }

    bytes.chunks_exact(Inode::SIZE).map(Inode::from_bytes).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inode_record_size() {
        assert_eq!(Inode::SIZE, 261);
    }

    #[test]
    fn test_empty_directory_content() {
        assert!(encode_inodes(&[]).is_empty());
        assert!(decode_inodes(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_inode_list_preserves_order() {
        let inodes = vec![
            Inode::new("zeta", 5, false),
            Inode::new("alpha", 2, true),
            Inode::new("mid", 9, false),
        ];

        let bytes = encode_inodes(&inodes);
        assert_eq!(bytes.len(), 3 * Inode::SIZE);
        assert_eq!(decode_inodes(&bytes).unwrap(), inodes);
    }

    #[test]
    fn test_inode_record_layout() {
        let bytes = encode_inodes(&[Inode::new("d", 0x0A0B, true)]);
        assert_eq!(bytes[0], b'd');
        assert_eq!(&bytes[256..260], &[0, 0, 0x0A, 0x0B]);
        assert_eq!(bytes[260], 1);
    }

    #[test]
    fn test_ragged_content_rejected() {
        let mut bytes = encode_inodes(&[Inode::new("a", 1, false)]);
        bytes.push(0);
        assert!(matches!(
            decode_inodes(&bytes),
            Err(ContainerError::InvalidFormat(_))
        ));
    }
}

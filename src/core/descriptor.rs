use crate::codec;
use crate::error::{ContainerError, Result};

/// Container signature: "cdfs"
pub const SIGNATURE: [u8; 4] = *b"cdfs";

/// Bytes per block (the only supported block size)
pub const BLOCK_SIZE: usize = 4096;

/// One mebibyte, the unit of requested container sizes
pub const MIB: u64 = 1024 * 1024;

/// Largest block count whose indices stay clear of the "none" pointer
pub const MAX_BLOCK_COUNT: u32 = i32::MAX as u32;

/// Container descriptor (offset 0)
///
/// Fixed 12-byte header defining the container's geometry:
///
/// ```text
/// [signature (4)][block_size (4)][block_count (4)]
/// ```
///
/// Written once at creation and never modified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerDescriptor {
    pub signature: [u8; 4],
    pub block_size: u32,
    pub block_count: u32,
}

impl ContainerDescriptor {
    pub const SIZE: usize = 12;

    /// Descriptor for a container of `size_mib` mebibytes
    pub fn new(size_mib: u32) -> Result<Self> {
        if size_mib < 1 {
            return Err(ContainerError::InvalidArgument(
                "container size must be at least 1 MiB".to_string(),
            ));
        }

        let block_count = size_mib as u64 * MIB / BLOCK_SIZE as u64;
        if block_count > MAX_BLOCK_COUNT as u64 {
            return Err(ContainerError::Config(format!(
                "{} MiB needs {} blocks (max {})",
                size_mib, block_count, MAX_BLOCK_COUNT
            )));
        }

        Ok(ContainerDescriptor {
            signature: SIGNATURE,
            block_size: BLOCK_SIZE as u32,
            block_count: block_count as u32,
        })
    }

    /// Check signature and geometry
    pub fn validate(&self) -> Result<()> {
        if self.signature != SIGNATURE {
            return Err(ContainerError::InvalidFormat(format!(
                "bad signature {:02x?}",
                self.signature
            )));
        }

        if self.block_size != BLOCK_SIZE as u32 {
            return Err(ContainerError::InvalidFormat(format!(
                "unsupported block size {}",
                self.block_size
            )));
        }

        if self.block_count == 0
            || self.block_count % 8 != 0
            || self.block_count > MAX_BLOCK_COUNT
        {
            return Err(ContainerError::InvalidFormat(format!(
                "invalid block count {}",
                self.block_count
            )));
        }

        Ok(())
    }

    /// Size of the allocation table in bytes
    pub fn table_size(&self) -> usize {
        self.block_count as usize / 8
    }

    /// Offset of block 0 (descriptor plus allocation table)
    pub fn data_offset(&self) -> u64 {
        (Self::SIZE + self.table_size()) as u64
    }

    /// Byte offset of block `index`
    pub fn block_offset(&self, index: u32) -> u64 {
        self.data_offset() + index as u64 * self.block_size as u64
    }

    /// Total length of the container file
    pub fn container_len(&self) -> u64 {
        self.block_offset(self.block_count)
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[..4].copy_from_slice(&self.signature);
        codec::put_u32(&mut bytes, 4, self.block_size);
        codec::put_u32(&mut bytes, 8, self.block_count);
        bytes
    }

    /// Decode and validate a descriptor
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(ContainerError::InvalidFormat(format!(
                "descriptor needs {} bytes, got {}",
                Self::SIZE,
                bytes.len()
            )));
        }

        let mut signature = [0u8; 4];
        signature.copy_from_slice(&bytes[..4]);

        let descriptor = ContainerDescriptor {
            signature,
            block_size: codec::get_u32(bytes, 4)?,
            block_count: codec::get_u32(bytes, 8)?,
        };
        descriptor.validate()?;

        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_geometry() {
        let descriptor = ContainerDescriptor::new(1).unwrap();
        assert_eq!(descriptor.signature, SIGNATURE);
        assert_eq!(descriptor.block_size, 4096);
        assert_eq!(descriptor.block_count, 256);
        assert_eq!(descriptor.table_size(), 32);
        assert_eq!(descriptor.data_offset(), 44);
        assert_eq!(descriptor.block_offset(2), 44 + 2 * 4096);
        assert_eq!(descriptor.container_len(), 44 + 256 * 4096);
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(matches!(
            ContainerDescriptor::new(0),
            Err(ContainerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_descriptor_serialization() {
        let descriptor = ContainerDescriptor::new(4).unwrap();
        let bytes = descriptor.to_bytes();
        assert_eq!(&bytes[..4], b"cdfs");
        assert_eq!(&bytes[4..8], &[0, 0, 0x10, 0]);
        assert_eq!(ContainerDescriptor::from_bytes(&bytes).unwrap(), descriptor);
    }

    #[test]
    fn test_bad_signature() {
        let mut bytes = ContainerDescriptor::new(1).unwrap().to_bytes();
        bytes[0] = b'x';
        assert!(matches!(
            ContainerDescriptor::from_bytes(&bytes),
            Err(ContainerError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_bad_block_size() {
        let mut descriptor = ContainerDescriptor::new(1).unwrap();
        descriptor.block_size = 8192;
        assert!(matches!(
            ContainerDescriptor::from_bytes(&descriptor.to_bytes()),
            Err(ContainerError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_truncated_descriptor() {
        assert!(matches!(
            ContainerDescriptor::from_bytes(&[0u8; 5]),
            Err(ContainerError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_all_zero_descriptor() {
        assert!(ContainerDescriptor::from_bytes(&[0u8; 12]).is_err());
    }
}

use crate::codec::{self, NAME_LEN};
use crate::error::{ContainerError, Result};

/// Chain pointers shared by every block (the "continuation" header)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainLink {
    /// Previous block in the chain (always `None` for a head block)
    pub prev: Option<u32>,
    /// Following block in the chain
    pub next: Option<u32>,
}

impl ChainLink {
    /// Size of the encoded link plus payload length: prev + next + data_size
    pub const fn size() -> usize {
        4 + 4 + 4
    }

    pub fn new(prev: Option<u32>, next: Option<u32>) -> Self {
        ChainLink { prev, next }
    }

    /// Decode the link and the payload length that follows it
    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, usize)> {
        let prev = codec::get_link(bytes, 0)?;
        let next = codec::get_link(bytes, 4)?;
        let data_size = codec::get_u32(bytes, 8)? as usize;
        Ok((ChainLink { prev, next }, data_size))
    }
}

/// A continuation block: chain link followed by payload
///
/// Layout: `[prev (4)][next (4)][data_size (4)][payload]`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataBlock {
    pub link: ChainLink,
    pub data: Vec<u8>,
}

impl DataBlock {
    pub const HEADER_SIZE: usize = ChainLink::size();

    pub fn new(prev: Option<u32>, next: Option<u32>, data: Vec<u8>) -> Self {
        DataBlock {
            link: ChainLink::new(prev, next),
            data,
        }
    }

    /// Payload bytes held by this block
    pub fn data_size(&self) -> usize {
        self.data.len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; Self::HEADER_SIZE + self.data.len()];
        self.write_into(&mut bytes);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (link, data_size) = ChainLink::from_bytes(bytes)?;
        let data = bytes
            .get(Self::HEADER_SIZE..Self::HEADER_SIZE + data_size)
            .ok_or_else(|| {
                ContainerError::InvalidFormat(format!(
                    "block payload of {} bytes overruns a {}-byte buffer",
                    data_size,
                    bytes.len()
                ))
            })?
            .to_vec();

        Ok(DataBlock { link, data })
    }

    /// Encode link, payload length and payload into the front of `buf`
    fn write_into(&self, buf: &mut [u8]) {
        codec::put_link(buf, 0, self.link.prev);
        codec::put_link(buf, 4, self.link.next);
        codec::put_u32(buf, 8, self.data.len() as u32);
        buf[Self::HEADER_SIZE..Self::HEADER_SIZE + self.data.len()].copy_from_slice(&self.data);
    }
}

/// Head block of every file or directory
///
/// Layout: `[name (256)][full_size (4)][is_dir (1)][DataBlock]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaDataBlock {
    /// Entity name (empty for the root directory)
    pub name: String,

    /// Logical size of the whole entity content, across the chain
    pub full_size: u32,

    pub is_dir: bool,

    /// Embedded chain link and the head's share of the payload
    pub block: DataBlock,
}

impl MetaDataBlock {
    pub const HEADER_SIZE: usize = NAME_LEN + 4 + 1 + DataBlock::HEADER_SIZE;

    /// Empty directory head
    pub fn directory(name: impl Into<String>) -> Self {
        MetaDataBlock {
            name: name.into(),
            full_size: 0,
            is_dir: true,
            block: DataBlock::default(),
        }
    }

    /// File head holding the first slice of `full_size` bytes
    pub fn file(name: impl Into<String>, full_size: u32, next: Option<u32>, data: Vec<u8>) -> Self {
        MetaDataBlock {
            name: name.into(),
            full_size,
            is_dir: false,
            block: DataBlock::new(None, next, data),
        }
    }

    pub fn data_size(&self) -> usize {
        self.block.data_size()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; Self::HEADER_SIZE + self.block.data.len()];
        codec::put_name(&mut bytes, 0, &self.name);
        codec::put_u32(&mut bytes, NAME_LEN, self.full_size);
        codec::put_bool(&mut bytes, NAME_LEN + 4, self.is_dir);
        self.block.write_into(&mut bytes[NAME_LEN + 5..]);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let name = codec::get_name(bytes, 0)?;
        let full_size = codec::get_u32(bytes, NAME_LEN)?;
        let is_dir = codec::get_bool(bytes, NAME_LEN + 4)?;
        let block = DataBlock::from_bytes(&bytes[NAME_LEN + 5..])?;

        Ok(MetaDataBlock {
            name,
            full_size,
            is_dir,
            block,
        })
    }
}

/// Any block in a chain: the head is always `Meta`, the rest are `Data`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Meta(MetaDataBlock),
    Data(DataBlock),
}

impl Block {
    pub fn header_size(&self) -> usize {
        match self {
            Block::Meta(_) => MetaDataBlock::HEADER_SIZE,
            Block::Data(_) => DataBlock::HEADER_SIZE,
        }
    }

    /// Payload bytes this block can hold in a `block_size`-byte slot
    pub fn capacity(&self, block_size: usize) -> usize {
        block_size - self.header_size()
    }

    fn inner(&self) -> &DataBlock {
        match self {
            Block::Meta(meta) => &meta.block,
            Block::Data(data) => data,
        }
    }

    fn inner_mut(&mut self) -> &mut DataBlock {
        match self {
            Block::Meta(meta) => &mut meta.block,
            Block::Data(data) => data,
        }
    }

    pub fn next(&self) -> Option<u32> {
        self.inner().link.next
    }

    pub fn set_next(&mut self, next: Option<u32>) {
        self.inner_mut().link.next = next;
    }

    pub fn data(&self) -> &[u8] {
        &self.inner().data
    }

    pub fn set_data(&mut self, data: Vec<u8>) {
        self.inner_mut().data = data;
    }

    pub fn extend_data(&mut self, bytes: &[u8]) {
        self.inner_mut().data.extend_from_slice(bytes);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Block::Meta(meta) => meta.to_bytes(),
            Block::Data(data) => data.to_bytes(),
        }
    }
}

//! Block engine
//!
//! Owns the descriptor, the allocation table and the storage handle, and
//! implements every structural mutation in terms of block chains:
//!
//! - a chain starts with one [`MetaDataBlock`] and continues with
//!   [`DataBlock`]s linked through `prev`/`next`
//! - a directory's content is its encoded [`Inode`] list
//! - block 0 holds the root directory and is never freed
//!
//! Free indices are always requested from the table before any block is
//! written, so `OutOfSpace` leaves existing chains untouched. Marking the
//! new blocks and linking the entry into its parent are separate writes;
//! a failure between them leaves occupied blocks that nothing references.

use crate::allocator::{bitmap::AllocationTable, BlockAllocator};
use crate::block::{Block, ChainLink, DataBlock, MetaDataBlock};
use crate::codec;
use crate::descriptor::ContainerDescriptor;
use crate::error::{ContainerError, Result};
use crate::inode::{decode_inodes, encode_inodes, Inode};
use crate::io::Storage;
use crate::listing::ContainerStats;
use crate::path::ContainerPath;
use parking_lot::Mutex;
use tracing::debug;

/// Index of the root directory's head block
pub const ROOT_BLOCK: u32 = 0;

pub struct BlockEngine<S: Storage> {
    descriptor: ContainerDescriptor,
    table: AllocationTable,
    /// Locked only so read paths can take `&self`
    storage: Mutex<S>,
}

impl<S: Storage> BlockEngine<S> {
    /// Lay out a fresh container on `storage`
    ///
    /// Writes the descriptor, an allocation table with block 0 marked, and
    /// an empty root directory, then sizes the store to the full container
    /// length.
    pub fn format(mut storage: S, descriptor: ContainerDescriptor) -> Result<Self> {
        descriptor.validate()?;

        storage.set_len(descriptor.container_len())?;
        storage.write_bytes(&descriptor.to_bytes(), 0)?;

        let mut table = AllocationTable::new(descriptor.block_count as usize);
        table.allocate(&[ROOT_BLOCK])?;

        let mut engine = BlockEngine {
            descriptor,
            table,
            storage: Mutex::new(storage),
        };

        engine.write_block(ROOT_BLOCK, &Block::Meta(MetaDataBlock::directory("")))?;
        engine.flush()?;

        debug!(
            "Formatted container: {} blocks of {} bytes",
            descriptor.block_count, descriptor.block_size
        );

        Ok(engine)
    }

    /// Load an existing container from `storage`
    pub fn load(mut storage: S) -> Result<Self> {
        let len = storage.len()?;
        if len < ContainerDescriptor::SIZE as u64 {
            return Err(ContainerError::InvalidFormat(format!(
                "{}-byte store is too short for a container descriptor",
                len
            )));
        }

        let header = storage.read_bytes(0, ContainerDescriptor::SIZE)?;
        let descriptor = ContainerDescriptor::from_bytes(&header)?;

        if len < descriptor.data_offset() {
            return Err(ContainerError::InvalidFormat(format!(
                "allocation table truncated ({} of {} bytes present)",
                len.saturating_sub(ContainerDescriptor::SIZE as u64),
                descriptor.table_size()
            )));
        }

        if len < descriptor.container_len() {
            tracing::warn!(
                "Container is {} bytes, expected {}; trailing blocks are unreadable",
                len,
                descriptor.container_len()
            );
        }

        let table_bytes =
            storage.read_bytes(ContainerDescriptor::SIZE as u64, descriptor.table_size())?;
        let table = AllocationTable::from_bytes(&table_bytes);

        if !table.is_allocated(ROOT_BLOCK) {
            return Err(ContainerError::InvalidFormat(
                "root block is not marked occupied".to_string(),
            ));
        }

        let engine = BlockEngine {
            descriptor,
            table,
            storage: Mutex::new(storage),
        };

        if !engine.read_meta(ROOT_BLOCK)?.is_dir {
            return Err(ContainerError::InvalidFormat(
                "root block is not a directory".to_string(),
            ));
        }

        Ok(engine)
    }

    pub fn descriptor(&self) -> &ContainerDescriptor {
        &self.descriptor
    }

    pub fn table(&self) -> &AllocationTable {
        &self.table
    }

    pub fn into_storage(self) -> S {
        self.storage.into_inner()
    }

    pub fn stats(&self) -> ContainerStats {
        ContainerStats {
            block_size: self.descriptor.block_size,
            total_blocks: self.descriptor.block_count,
            used_blocks: self.table.occupied_blocks() as u32,
            free_blocks: self.table.free_blocks() as u32,
        }
    }

    /// Persist the allocation table and sync the store
    pub fn flush(&mut self) -> Result<()> {
        let bytes = self.table.to_bytes();
        let storage = self.storage.get_mut();
        storage.write_bytes(&bytes, ContainerDescriptor::SIZE as u64)?;
        storage.sync()
    }

    fn block_size(&self) -> usize {
        self.descriptor.block_size as usize
    }

    /// Payload bytes a head block can hold
    pub fn head_capacity(&self) -> usize {
        self.block_size() - MetaDataBlock::HEADER_SIZE
    }

    /// Payload bytes a continuation block can hold
    pub fn tail_capacity(&self) -> usize {
        self.block_size() - DataBlock::HEADER_SIZE
    }

    /// Number of blocks a chain holding `total` bytes occupies
    pub fn blocks_needed(&self, total: usize) -> usize {
        let head = self.head_capacity();
        if total <= head {
            return 1;
        }
        1 + (total - head).div_ceil(self.tail_capacity())
    }

    // Block I/O

    fn check_index(&self, index: u32) -> Result<()> {
        if index >= self.descriptor.block_count {
            return Err(ContainerError::InvalidBlockId(index));
        }
        Ok(())
    }

    fn read_slot(&self, index: u32, len: usize) -> Result<Vec<u8>> {
        self.check_index(index)?;
        let offset = self.descriptor.block_offset(index);
        self.storage.lock().read_bytes(offset, len)
    }

    pub fn read_meta(&self, index: u32) -> Result<MetaDataBlock> {
        MetaDataBlock::from_bytes(&self.read_slot(index, self.block_size())?)
    }

    pub fn read_data_block(&self, index: u32) -> Result<DataBlock> {
        DataBlock::from_bytes(&self.read_slot(index, self.block_size())?)
    }

    /// Read only the chain header of a continuation block
    pub fn read_link(&self, index: u32) -> Result<ChainLink> {
        let (link, _) = ChainLink::from_bytes(&self.read_slot(index, ChainLink::size())?)?;
        Ok(link)
    }

    fn write_block(&mut self, index: u32, block: &Block) -> Result<()> {
        self.check_index(index)?;

        let bytes = block.to_bytes();
        if bytes.len() > self.block_size() {
            return Err(ContainerError::InvalidArgument(format!(
                "encoded block of {} bytes exceeds block size {}",
                bytes.len(),
                self.block_size()
            )));
        }

        let offset = self.descriptor.block_offset(index);
        self.storage.get_mut().write_bytes(&bytes, offset)
    }

    // Chain traversal

    fn cycle_error(&self, index: u32) -> ContainerError {
        ContainerError::InvalidFormat(format!(
            "block chain cycle at block {} (longer than {} blocks)",
            index, self.descriptor.block_count
        ))
    }

    /// Indices of a chain, head first, following `next` from `first_next`
    fn chain_from(&self, head: u32, first_next: Option<u32>) -> Result<Vec<u32>> {
        let limit = self.descriptor.block_count as usize;
        let mut chain = vec![head];
        let mut next = first_next;

        while let Some(index) = next {
            if chain.len() >= limit {
                return Err(self.cycle_error(index));
            }
            chain.push(index);
            next = self.read_link(index)?.next;
        }

        Ok(chain)
    }

    /// Every block index of the chain starting at `head`
    pub fn collect_chain(&self, head: u32) -> Result<Vec<u32>> {
        let meta = self.read_meta(head)?;
        self.chain_from(head, meta.block.link.next)
    }

    /// Read a head block and the full content of its chain
    pub fn read_all(&self, head: u32) -> Result<(MetaDataBlock, Vec<u8>)> {
        let meta = self.read_meta(head)?;
        let full_size = meta.full_size as usize;
        let limit = self.descriptor.block_count as usize;

        let mut content = meta.block.data.clone();

        let mut next = meta.block.link.next;
        let mut steps = 1;
        while let Some(index) = next {
            if steps >= limit {
                return Err(self.cycle_error(index));
            }
            let block = self.read_data_block(index)?;
            content.extend_from_slice(&block.data);
            next = block.link.next;
            steps += 1;
        }

        if content.len() != full_size {
            return Err(ContainerError::InvalidFormat(format!(
                "chain at block {} holds {} bytes, head records {}",
                head,
                content.len(),
                full_size
            )));
        }

        Ok((meta, content))
    }

    /// Entries of the directory whose head is `dir`
    pub fn read_inodes(&self, dir: u32) -> Result<Vec<Inode>> {
        let (meta, content) = self.read_all(dir)?;
        if !meta.is_dir {
            return Err(ContainerError::NotADirectory(format!(
                "'{}' (block {})",
                meta.name, dir
            )));
        }
        decode_inodes(&content)
    }

    /// Look up `name` among the entries of directory `parent`
    pub fn child_block(&self, parent: u32, name: &str) -> Result<Option<Inode>> {
        Ok(self
            .read_inodes(parent)?
            .into_iter()
            .find(|inode| inode.name == name))
    }

    /// Follow `path` from the root directory
    pub fn resolve(&self, path: &ContainerPath) -> Result<Inode> {
        let mut current = Inode::new("", ROOT_BLOCK, true);
        let mut walked = ContainerPath::root();

        for component in path.components() {
            if !current.is_dir {
                return Err(ContainerError::NotADirectory(walked.to_string()));
            }
            walked = walked.join(component);
            current = self
                .child_block(current.block, component)?
                .ok_or_else(|| ContainerError::NotFound(path.to_string()))?;
        }

        Ok(current)
    }

    /// Resolve `path` and require a directory
    pub fn resolve_dir(&self, path: &ContainerPath) -> Result<Inode> {
        let inode = self.resolve(path)?;
        if !inode.is_dir {
            return Err(ContainerError::NotADirectory(path.to_string()));
        }
        Ok(inode)
    }

    /// Resolve the directory containing `path`; `None` for the root
    pub fn resolve_parent(&self, path: &ContainerPath) -> Result<Option<Inode>> {
        match path.parent() {
            Some(parent) => self.resolve_dir(&parent).map(Some),
            None => Ok(None),
        }
    }

    // Writing chains

    fn check_content_len(len: usize) -> Result<u32> {
        u32::try_from(len).map_err(|_| {
            ContainerError::InvalidArgument(format!("content of {} bytes is too large", len))
        })
    }

    /// Write `data` across `chain`, head first, each block filled to capacity
    ///
    /// `chain` must hold exactly `blocks_needed(data.len())` indices.
    fn write_chain(&mut self, chain: &[u32], mut head: MetaDataBlock, data: &[u8]) -> Result<()> {
        let (&head_index, _) = chain
            .split_first()
            .ok_or_else(|| ContainerError::InvalidArgument("empty block chain".to_string()))?;

        let (head_data, mut rest) = data.split_at(data.len().min(self.head_capacity()));
        head.full_size = Self::check_content_len(data.len())?;
        head.block = DataBlock::new(None, chain.get(1).copied(), head_data.to_vec());
        self.write_block(head_index, &Block::Meta(head))?;

        let tail_capacity = self.tail_capacity();
        for position in 1..chain.len() {
            let (piece, remaining) = rest.split_at(rest.len().min(tail_capacity));
            rest = remaining;

            let block = DataBlock::new(
                Some(chain[position - 1]),
                chain.get(position + 1).copied(),
                piece.to_vec(),
            );
            self.write_block(chain[position], &Block::Data(block))?;
        }

        Ok(())
    }

    /// Replace the content of the chain at `head_index`, growing or
    /// shrinking it as needed
    fn rewrite_chain(&mut self, head_index: u32, head: MetaDataBlock, data: &[u8]) -> Result<()> {
        Self::check_content_len(data.len())?;

        let old_chain = self.chain_from(head_index, head.block.link.next)?;
        let needed = self.blocks_needed(data.len());

        let fresh = if needed > old_chain.len() {
            self.table.available_blocks(needed - old_chain.len())?
        } else {
            Vec::new()
        };
        let orphans = old_chain.get(needed..).unwrap_or_default().to_vec();

        let chain: Vec<u32> = old_chain
            .iter()
            .take(needed)
            .chain(fresh.iter())
            .copied()
            .collect();

        self.write_chain(&chain, head, data)?;

        if !fresh.is_empty() {
            debug!("Chain at block {} grew by {:?}", head_index, fresh);
            self.table.allocate(&fresh)?;
        }
        if !orphans.is_empty() {
            debug!("Chain at block {} released {:?}", head_index, orphans);
            self.table.free(&orphans)?;
        }

        Ok(())
    }

    /// Replace the content of the entity at `head_index`
    pub fn write_content(&mut self, head_index: u32, data: &[u8]) -> Result<()> {
        let head = self.read_meta(head_index)?;
        let old_size = head.full_size as usize;

        if data.len() >= old_size {
            debug!(
                "Growing block {} content: {} -> {} bytes",
                head_index,
                old_size,
                data.len()
            );
        } else {
            debug!(
                "Shrinking block {} content: {} -> {} bytes",
                head_index,
                old_size,
                data.len()
            );
        }

        self.rewrite_chain(head_index, head, data)
    }

    fn write_dir(&mut self, dir: u32, inodes: &[Inode]) -> Result<()> {
        let head = self.read_meta(dir)?;
        self.rewrite_chain(dir, head, &encode_inodes(inodes))
    }

    /// Append `data` to the entity at `head_index`
    ///
    /// Writes only the head, the old last block and any new blocks.
    pub fn append_content(&mut self, head_index: u32, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        let mut head = self.read_meta(head_index)?;
        let new_size = Self::check_content_len(head.full_size as usize + data.len())?;

        let chain = self.chain_from(head_index, head.block.link.next)?;
        let last_index = chain.last().copied().unwrap_or(head_index);

        let mut last = if last_index == head_index {
            None
        } else {
            Some(Block::Data(self.read_data_block(last_index)?))
        };

        let room = match &last {
            Some(block) => block
                .capacity(self.block_size())
                .saturating_sub(block.data().len()),
            None => self.head_capacity().saturating_sub(head.data_size()),
        };
        let (fits, rest) = data.split_at(room.min(data.len()));

        let tail_capacity = self.tail_capacity();
        let fresh = if rest.is_empty() {
            Vec::new()
        } else {
            self.table
                .available_blocks(rest.len().div_ceil(tail_capacity))?
        };

        match last.as_mut() {
            Some(block) => {
                block.extend_data(fits);
                block.set_next(fresh.first().copied());
            }
            None => {
                head.block.data.extend_from_slice(fits);
                head.block.link.next = fresh.first().copied();
            }
        }
        head.full_size = new_size;

        self.write_block(head_index, &Block::Meta(head))?;
        if let Some(block) = &last {
            self.write_block(last_index, block)?;
        }

        for (position, (&index, piece)) in fresh.iter().zip(rest.chunks(tail_capacity)).enumerate()
        {
            let prev = if position == 0 {
                last_index
            } else {
                fresh[position - 1]
            };
            let block = DataBlock::new(Some(prev), fresh.get(position + 1).copied(), piece.to_vec());
            self.write_block(index, &Block::Data(block))?;
        }

        if !fresh.is_empty() {
            debug!("Append to block {} allocated {:?}", head_index, fresh);
            self.table.allocate(&fresh)?;
        }

        Ok(())
    }

    // Structural mutations

    /// Create a file or directory at `path`, returning its head block
    pub fn create_entity(&mut self, path: &ContainerPath, is_dir: bool, data: &[u8]) -> Result<u32> {
        let parent = self
            .resolve_parent(path)?
            .ok_or_else(|| ContainerError::AlreadyExists(path.to_string()))?;

        let name = path.name();
        codec::validate_name(name)?;
        Self::check_content_len(data.len())?;

        let mut inodes = self.read_inodes(parent.block)?;
        if inodes.iter().any(|inode| inode.name == name) {
            return Err(ContainerError::AlreadyExists(path.to_string()));
        }

        let needed = if is_dir { 1 } else { self.blocks_needed(data.len()) };
        let blocks = self.table.available_blocks(needed)?;

        let head = if is_dir {
            MetaDataBlock::directory(name)
        } else {
            MetaDataBlock::file(name, 0, None, Vec::new())
        };
        let content: &[u8] = if is_dir { &[] } else { data };
        self.write_chain(&blocks, head, content)?;

        debug!("Allocating {:?} for {}", blocks, path);
        self.table.allocate(&blocks)?;

        inodes.push(Inode::new(name, blocks[0], is_dir));
        self.write_dir(parent.block, &inodes)?;

        Ok(blocks[0])
    }

    /// Remove the entity at `path`, returning its directory entry
    ///
    /// A non-empty directory is only removed with `recursive`, in which
    /// case every descendant chain is freed first.
    pub fn delete_entity(&mut self, path: &ContainerPath, recursive: bool) -> Result<Inode> {
        let parent = self.resolve_parent(path)?.ok_or_else(|| {
            ContainerError::InvalidArgument("the root directory cannot be deleted".to_string())
        })?;

        let mut inodes = self.read_inodes(parent.block)?;
        let position = inodes
            .iter()
            .position(|inode| inode.name == path.name())
            .ok_or_else(|| ContainerError::NotFound(path.to_string()))?;
        let target = inodes[position].clone();

        if target.is_dir {
            let children = self.read_inodes(target.block)?;
            if !children.is_empty() {
                if !recursive {
                    return Err(ContainerError::NotEmpty(path.to_string()));
                }
                self.free_descendants(children)?;
            }
        }

        inodes.remove(position);
        self.write_dir(parent.block, &inodes)?;

        let chain = self.collect_chain(target.block)?;
        debug!("Freeing {:?} for {}", chain, path);
        self.table.free(&chain)?;

        Ok(target)
    }

    /// Free every chain below a directory, children before their parents
    fn free_descendants(&mut self, children: Vec<Inode>) -> Result<usize> {
        let limit = self.descriptor.block_count as usize;
        let mut stack: Vec<(Inode, bool)> = children.into_iter().map(|c| (c, false)).collect();
        let mut expanded_dirs = 0;
        let mut freed = 0;

        while let Some((inode, expanded)) = stack.pop() {
            if inode.is_dir && !expanded {
                expanded_dirs += 1;
                if expanded_dirs > limit {
                    return Err(ContainerError::InvalidFormat(format!(
                        "directory cycle through block {}",
                        inode.block
                    )));
                }

                let grandchildren = self.read_inodes(inode.block)?;
                stack.push((inode, true));
                stack.extend(grandchildren.into_iter().map(|c| (c, false)));
                continue;
            }

            let chain = self.collect_chain(inode.block)?;
            self.table.free(&chain)?;
            freed += chain.len();
        }

        debug!("Recursive delete freed {} blocks", freed);
        Ok(freed)
    }

    /// Rename the entity at `path` within its directory
    pub fn rename(&mut self, path: &ContainerPath, new_name: &str) -> Result<()> {
        let parent = self.resolve_parent(path)?.ok_or_else(|| {
            ContainerError::InvalidArgument("the root directory cannot be renamed".to_string())
        })?;
        codec::validate_name(new_name)?;

        let mut inodes = self.read_inodes(parent.block)?;
        let position = inodes
            .iter()
            .position(|inode| inode.name == path.name())
            .ok_or_else(|| ContainerError::NotFound(path.to_string()))?;

        if inodes[position].name == new_name {
            return Ok(());
        }
        if inodes.iter().any(|inode| inode.name == new_name) {
            return Err(ContainerError::AlreadyExists(
                path.parent()
                    .unwrap_or_else(ContainerPath::root)
                    .join(new_name).to_string(),
            ));
        }

        inodes[position].name = new_name.to_string();
        let target = inodes[position].block;
        self.write_dir(parent.block, &inodes)?;

        let mut head = self.read_meta(target)?;
        head.name = new_name.to_string();
        self.write_block(target, &Block::Meta(head))
    }

    /// Move the entity at `from` into the directory `to_dir`
    ///
    /// Only directory entries change; the moved chain stays where it is.
    pub fn move_entry(&mut self, from: &ContainerPath, to_dir: &ContainerPath) -> Result<()> {
        if from.is_root() {
            return Err(ContainerError::InvalidArgument(
                "the root directory cannot be moved".to_string(),
            ));
        }
        if to_dir.starts_with(from) {
            return Err(ContainerError::InvalidArgument(format!(
                "cannot move {} into {}",
                from, to_dir
            )));
        }

        let destination = self.resolve_dir(to_dir)?;
        let source = self
            .resolve_parent(from)?
            .ok_or_else(|| ContainerError::InvalidArgument(from.to_string()))?;

        let mut source_inodes = self.read_inodes(source.block)?;
        let position = source_inodes
            .iter()
            .position(|inode| inode.name == from.name())
            .ok_or_else(|| ContainerError::NotFound(from.to_string()))?;

        if source.block == destination.block {
            return Ok(());
        }

        let mut destination_inodes = self.read_inodes(destination.block)?;
        if destination_inodes
            .iter()
            .any(|inode| inode.name == from.name())
        {
            return Err(ContainerError::AlreadyExists(
                to_dir.join(from.name()).to_string(),
            ));
        }

        let entry = source_inodes.remove(position);
        destination_inodes.push(entry);

        self.write_dir(destination.block, &destination_inodes)?;
        self.write_dir(source.block, &source_inodes)
    }
}

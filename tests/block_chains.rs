//! Block chain growth, shrink and append through the engine

use cdfs::core::engine::BlockEngine;
use cdfs::{BlockAllocator, ContainerDescriptor, ContainerFile, ContainerPath, MemoryStorage};
use tempfile::TempDir;

fn engine(size_mib: u32) -> BlockEngine<MemoryStorage> {
    let descriptor = ContainerDescriptor::new(size_mib).unwrap();
    BlockEngine::format(MemoryStorage::new(), descriptor).unwrap()
}

/// Sum of payload sizes across a chain
fn payload_total<S: cdfs::Storage>(engine: &BlockEngine<S>, head: u32) -> usize {
    let chain = engine.collect_chain(head).unwrap();
    let mut total = engine.read_meta(head).unwrap().data_size();
    for &index in &chain[1..] {
        total += engine.read_data_block(index).unwrap().data_size();
    }
    total
}

#[test]
fn test_head_capacity_boundary() {
    let mut engine = engine(1);
    let exact = vec![0xAB; engine.head_capacity()];

    let head = engine
        .create_entity(&ContainerPath::parse("/exact"), false, &exact)
        .unwrap();
    assert_eq!(engine.collect_chain(head).unwrap(), vec![head]);
    assert_eq!(engine.read_meta(head).unwrap().block.link.next, None);
}

#[test]
fn test_grow_by_one_block_then_shrink() {
    let mut engine = engine(1);
    let path = ContainerPath::parse("/f");
    let head = engine.create_entity(&path, false, b"seed").unwrap();
    let used = engine.table().occupied_blocks();

    let grown = vec![0x11; engine.head_capacity() + 1];
    engine.write_content(head, &grown).unwrap();

    let chain = engine.collect_chain(head).unwrap();
    assert_eq!(chain.len(), 2);
    assert_eq!(engine.table().occupied_blocks(), used + 1);
    assert!(engine.table().is_allocated(chain[1]));

    let tail = engine.read_data_block(chain[1]).unwrap();
    assert_eq!(tail.link.prev, Some(head));
    assert_eq!(tail.link.next, None);
    assert_eq!(tail.data, vec![0x11]);

    engine.write_content(head, b"seed").unwrap();
    assert_eq!(engine.table().occupied_blocks(), used);
    assert!(!engine.table().is_allocated(chain[1]));
    assert_eq!(engine.read_meta(head).unwrap().block.link.next, None);
}

#[test]
fn test_payloads_sum_to_full_size() {
    let mut engine = engine(2);
    let sizes = [0usize, 1, 3823, 3824, 7907, 7908, 50_000];

    for (i, &size) in sizes.iter().enumerate() {
        let data: Vec<u8> = (0..size).map(|b| (b % 253) as u8).collect();
        let head = engine
            .create_entity(&ContainerPath::parse(&format!("/f{}", i)), false, &data)
            .unwrap();

        let (meta, content) = engine.read_all(head).unwrap();
        assert_eq!(meta.full_size as usize, size);
        assert_eq!(content, data);
        assert_eq!(payload_total(&engine, head), size);
        assert_eq!(
            engine.collect_chain(head).unwrap().len(),
            engine.blocks_needed(size)
        );
    }
}

#[test]
fn test_shrink_across_several_blocks() {
    let mut engine = engine(1);
    let big = vec![7u8; 30_000];
    let head = engine
        .create_entity(&ContainerPath::parse("/f"), false, &big)
        .unwrap();
    let before = engine.collect_chain(head).unwrap();
    assert_eq!(before.len(), engine.blocks_needed(30_000));

    engine.write_content(head, &big[..5_000]).unwrap();

    let after = engine.collect_chain(head).unwrap();
    assert_eq!(after.len(), 2);
    assert_eq!(&before[..2], &after[..]);
    for &orphan in &before[2..] {
        assert!(!engine.table().is_allocated(orphan));
    }
    assert_eq!(engine.read_all(head).unwrap().1, &big[..5_000]);
}

#[test]
fn test_repeated_appends_match_single_write() {
    let mut engine = engine(1);
    let head = engine
        .create_entity(&ContainerPath::parse("/log"), false, b"")
        .unwrap();

    let mut expected = Vec::new();
    for round in 0..40u8 {
        let chunk = vec![round; 517];
        engine.append_content(head, &chunk).unwrap();
        expected.extend_from_slice(&chunk);
    }

    assert_eq!(engine.read_all(head).unwrap().1, expected);
    assert_eq!(payload_total(&engine, head), expected.len());
    assert_eq!(
        engine.collect_chain(head).unwrap().len(),
        engine.blocks_needed(expected.len())
    );
}

#[test]
fn test_append_persists_on_disk() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("append.cdfs");
    let descriptor = ContainerDescriptor::new(1).unwrap();

    let head = {
        let file = ContainerFile::create(&path).unwrap();
        let mut engine = BlockEngine::format(file, descriptor).unwrap();
        let head = engine
            .create_entity(&ContainerPath::parse("/f"), false, &vec![1u8; 3000])
            .unwrap();
        engine.append_content(head, &vec![2u8; 3000]).unwrap();
        engine.flush().unwrap();
        head
    };

    let engine = BlockEngine::load(ContainerFile::open(&path).unwrap()).unwrap();
    let content = engine.read_all(head).unwrap().1;
    assert_eq!(content.len(), 6000);
    assert!(content[..3000].iter().all(|&b| b == 1));
    assert!(content[3000..].iter().all(|&b| b == 2));
}

#[test]
fn test_out_of_space_on_create() {
    let mut engine = engine(1);
    let used = engine.table().occupied_blocks();

    let result = engine.create_entity(&ContainerPath::parse("/huge"), false, &vec![0u8; 2 << 20]);
    assert!(matches!(
        result,
        Err(cdfs::ContainerError::OutOfSpace { .. })
    ));
    assert_eq!(engine.table().occupied_blocks(), used);
    assert!(engine.read_inodes(0).unwrap().is_empty());
}

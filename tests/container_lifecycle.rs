//! Container create/open/close behaviour against real host files

use cdfs::{Container, ContainerConfig, ContainerError};
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::TempDir;

fn config(size_mib: u32) -> ContainerConfig {
    ContainerConfig::with_size_mib(size_mib)
}

/// Helper: overwrite bytes at an absolute offset
fn corrupt_at(path: &Path, offset: u64, bytes: &[u8]) {
    let mut file = OpenOptions::new().write(true).open(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
}

#[test]
fn test_create_sizes_host_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("sized.cdfs");

    let container = Container::create(&path, &config(1)).unwrap();
    assert_eq!(container.descriptor().block_count, 256);
    container.close().unwrap();

    let len = std::fs::metadata(&path).unwrap().len();
    assert_eq!(len, 12 + 32 + 256 * 4096);
}

#[test]
fn test_round_trip_through_reopen() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("round.cdfs");

    {
        let mut container = Container::create(&path, &config(2)).unwrap();
        container.create_dir("/home").unwrap();
        container.create_dir("/home/user").unwrap();
        container
            .create_file("/home/user/notes.txt", b"remember the milk")
            .unwrap();
        container.create_file("/blob.bin", &vec![42u8; 20_000]).unwrap();
        container.close().unwrap();
    }

    let container = Container::open(&path).unwrap();
    assert_eq!(
        container.read("/home/user/notes.txt").unwrap().data,
        b"remember the milk"
    );

    let blob = container.read("/blob.bin").unwrap();
    assert_eq!(blob.data.len(), 20_000);
    assert!(blob.data.iter().all(|&b| b == 42));

    let root = container.list_dir("/").unwrap();
    assert_eq!(root.sub_dirs, vec!["home"]);
    assert_eq!(root.files, vec!["blob.bin"]);
}

#[test]
fn test_stats_persist_across_reopen() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("stats.cdfs");

    let before = {
        let mut container = Container::create(&path, &config(1)).unwrap();
        container.create_file("/a", &vec![1u8; 10_000]).unwrap();
        let stats = container.stats();
        container.close().unwrap();
        stats
    };

    let container = Container::open(&path).unwrap();
    assert_eq!(container.stats(), before);
    assert_eq!(before.used_blocks, 1 + 3);
}

#[test]
fn test_drop_flushes_allocation_table() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("drop.cdfs");

    {
        let mut container = Container::create(&path, &config(1)).unwrap();
        container.create_file("/kept", b"data").unwrap();
        // dropped without close
    }

    let mut container = Container::open(&path).unwrap();
    assert_eq!(container.stats().used_blocks, 2);

    // A new file must not land on the block that "/kept" occupies
    container.create_file("/next", b"other").unwrap();
    assert_eq!(container.read("/kept").unwrap().data, b"data");
    assert_eq!(container.read("/next").unwrap().data, b"other");
}

#[test]
fn test_create_existing_file_fails() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("exists.cdfs");
    std::fs::write(&path, b"occupied").unwrap();

    assert!(matches!(
        Container::create(&path, &config(1)),
        Err(ContainerError::AlreadyExists(_))
    ));
}

#[test]
fn test_create_zero_size_fails() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("zero.cdfs");

    assert!(matches!(
        Container::create(&path, &config(0)),
        Err(ContainerError::InvalidArgument(_))
    ));
    assert!(!path.exists());
}

#[test]
fn test_open_missing_file() {
    let temp = TempDir::new().unwrap();
    assert!(matches!(
        Container::open(temp.path().join("missing.cdfs")),
        Err(ContainerError::NotFound(_))
    ));
}

#[test]
fn test_open_corrupted_signature() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("corrupt.cdfs");
    Container::create(&path, &config(1)).unwrap().close().unwrap();

    corrupt_at(&path, 0, b"xxxx");

    assert!(matches!(
        Container::open(&path),
        Err(ContainerError::InvalidFormat(_))
    ));
}

#[test]
fn test_open_foreign_file() {
    let temp = TempDir::new().unwrap();

    let empty = temp.path().join("empty.cdfs");
    std::fs::write(&empty, b"").unwrap();
    assert!(matches!(
        Container::open(&empty),
        Err(ContainerError::InvalidFormat(_))
    ));

    let text = temp.path().join("text.cdfs");
    std::fs::write(&text, b"this is not a container at all").unwrap();
    assert!(matches!(
        Container::open(&text),
        Err(ContainerError::InvalidFormat(_))
    ));
}

#[test]
fn test_open_truncated_table() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("truncated.cdfs");
    Container::create(&path, &config(1)).unwrap().close().unwrap();

    let file = OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(20).unwrap();

    assert!(matches!(
        Container::open(&path),
        Err(ContainerError::InvalidFormat(_))
    ));
}

#[test]
fn test_open_corrupted_block_count() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("count.cdfs");
    Container::create(&path, &config(1)).unwrap().close().unwrap();

    // Not a multiple of 8
    corrupt_at(&path, 8, &13u32.to_be_bytes());

    assert!(matches!(
        Container::open(&path),
        Err(ContainerError::InvalidFormat(_))
    ));
}

#![no_main]
use cdfs::core::block::{DataBlock, MetaDataBlock};
use cdfs::core::inode::decode_inodes;
use cdfs::{Container, ContainerDescriptor, MemoryStorage};
use libfuzzer_sys::fuzz_target;

// Decoders and container loading must reject malformed bytes without panicking
fuzz_target!(|data: &[u8]| {
    let _ = ContainerDescriptor::from_bytes(data);
    let _ = MetaDataBlock::from_bytes(data);
    let _ = DataBlock::from_bytes(data);
    let _ = decode_inodes(data);

    if let Ok(container) = Container::load(MemoryStorage::from_bytes(data.to_vec())) {
        if let Ok(root) = container.list_dir("/") {
            for name in root.files.iter().take(16) {
                let _ = container.read(&format!("/{}", name));
            }
            for name in root.sub_dirs.iter().take(16) {
                let _ = container.list_dir(&format!("/{}", name));
            }
        }
    }
});

#![no_main]
use arbitrary::Arbitrary;
use cdfs::{Container, ContainerConfig};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
enum Op {
    CreateDir(u8),
    CreateFile(u8, Vec<u8>),
    Write(u8, Vec<u8>),
    Append(u8, Vec<u8>),
    Delete(u8),
    DeleteDir(u8, bool),
    Rename(u8, u8),
    Move(u8, u8),
}

// Paths come from a small fixed namespace so operations collide often
fn path(selector: u8) -> String {
    const PATHS: [&str; 8] = ["/a", "/b", "/a/c", "/a/d", "/b/e", "/a/c/f", "/g", "/b/e/h"];
    PATHS[selector as usize % PATHS.len()].to_string()
}

fn name(selector: u8) -> &'static str {
    const NAMES: [&str; 4] = ["a", "b", "x", "y"];
    NAMES[selector as usize % NAMES.len()]
}

fuzz_target!(|ops: Vec<Op>| {
    let Ok(mut container) = Container::in_memory(&ContainerConfig::with_size_mib(1)) else {
        return;
    };

    for op in ops.into_iter().take(64) {
        let _ = match op {
            Op::CreateDir(p) => container.create_dir(&path(p)),
            Op::CreateFile(p, data) => container.create_file(&path(p), &data),
            Op::Write(p, data) => container.write(&path(p), &data),
            Op::Append(p, data) => container.append(&path(p), &data),
            Op::Delete(p) => container.delete(&path(p)),
            Op::DeleteDir(p, recursive) => container.delete_dir(&path(p), recursive),
            Op::Rename(p, n) => container.rename(&path(p), name(n)),
            Op::Move(from, to) => container.move_entry(&path(from), &path(to)),
        };
    }

    // Every listed file must still read back in full
    if let Ok(root) = container.list_dir("/") {
        for file in &root.files {
            container.read(&format!("/{}", file)).unwrap();
        }
    }
});

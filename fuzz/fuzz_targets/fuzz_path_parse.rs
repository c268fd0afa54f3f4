#![no_main]

use libfuzzer_sys::fuzz_target;
use strata_vfs::{is_safe_path, VfsPath};

const MAX_INPUT_SIZE: usize = 4 * 1024;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(&data[..data.len().min(MAX_INPUT_SIZE)]) else {
        return;
    };
    let Ok(path) = VfsPath::parse(input) else {
        return;
    };

    // Display must parse back to the same path.
    let reparsed = VfsPath::parse(&path.to_string()).expect("display output must parse");
    assert_eq!(reparsed, path);

    let _ = is_safe_path(&path);

    if let Some(parent) = path.parent() {
        let suffix = path.relative_to(&parent).expect("path is under its parent");
        assert_eq!(parent.join(&suffix), path);
    }
});

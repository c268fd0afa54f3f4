#![no_main]

use std::io::{Read, Write};

use libfuzzer_sys::fuzz_target;
use strata_vfs::{ContentSource, PackSource, VfsPath};

// Keep temp files small and bounded regardless of the input.
const MAX_INPUT_SIZE: usize = 256 * 1024;

fuzz_target!(|data: &[u8]| {
    let data = &data[..data.len().min(MAX_INPUT_SIZE)];

    let mut tmp = tempfile::Builder::new()
        .prefix("fuzz_pack_read")
        .suffix(".zip")
        .tempfile()
        .expect("failed to create tempfile");

    // Potentially-invalid zip bytes. Only asserting that opening and reading
    // never panics or hangs.
    tmp.write_all(data).expect("failed to write pack bytes");
    tmp.flush().expect("failed to flush pack bytes");

    let mut source = PackSource::new(tmp.path());
    if source.mount().is_err() {
        return;
    }

    let listed: Vec<VfsPath> = source
        .find_files(&VfsPath::empty())
        .filter_map(Result::ok)
        .take(64)
        .collect();
    for path in &listed {
        if let Ok(Some(mut stream)) = source.try_get_file(path) {
            let mut buf = Vec::new();
            let _ = stream.by_ref().take(1 << 20).read_to_end(&mut buf);
        }
    }
    let _ = source.try_get_file(&VfsPath::parse("missing.bin").expect("static path"));
});

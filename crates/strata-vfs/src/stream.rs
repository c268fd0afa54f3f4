use std::io::Cursor;
use std::sync::Arc;

use crate::error::Result;
use crate::path::VfsPath;
use crate::source::{ContentSource, FileIter, FileStream};

/// Content source holding exactly one in-memory file.
///
/// The buffer is shared; every read gets its own cursor over it.
#[derive(Debug, Clone)]
pub struct StreamSource {
    path: VfsPath,
    data: Arc<[u8]>,
}

impl StreamSource {
    /// `path` is relative to the mount prefix.
    pub fn new(path: VfsPath, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            path,
            data: data.into(),
        }
    }

    pub fn path(&self) -> &VfsPath {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl ContentSource for StreamSource {
    fn kind(&self) -> &'static str {
        "stream"
    }

    fn origin(&self) -> String {
        format!("<memory: {} bytes>", self.data.len())
    }

    fn try_get_file(&self, path: &VfsPath) -> Result<Option<FileStream>> {
        if *path != self.path {
            return Ok(None);
        }
        Ok(Some(Box::new(Cursor::new(Arc::clone(&self.data)))))
    }

    fn contains(&self, path: &VfsPath) -> Result<bool> {
        Ok(*path == self.path)
    }

    fn find_files<'a>(&'a self, dir: &VfsPath) -> FileIter<'a> {
        let found: Option<Result<VfsPath>> =
            self.path.starts_with(dir).then(|| Ok(self.path.clone()));
        Box::new(found.into_iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Read;

    fn p(s: &str) -> VfsPath {
        VfsPath::parse(s).unwrap()
    }

    #[test]
    fn serves_only_its_own_path() {
        let source = StreamSource::new(p("beep.ogg"), b"OggS".to_vec());

        let mut buf = Vec::new();
        source
            .try_get_file(&p("beep.ogg"))
            .unwrap()
            .unwrap()
            .read_to_end(&mut buf)
            .unwrap();
        assert_eq!(buf, b"OggS");

        assert!(source.try_get_file(&p("Beep.ogg")).unwrap().is_none());
        assert!(source.try_get_file(&p("other.ogg")).unwrap().is_none());
    }

    #[test]
    fn every_read_starts_at_the_beginning() {
        let source = StreamSource::new(p("data.bin"), vec![1u8, 2, 3]);
        for _ in 0..2 {
            let mut buf = Vec::new();
            source
                .try_get_file(&p("data.bin"))
                .unwrap()
                .unwrap()
                .read_to_end(&mut buf)
                .unwrap();
            assert_eq!(buf, [1, 2, 3]);
        }
    }

    #[test]
    fn find_files_yields_the_path_when_under_the_query() {
        let source = StreamSource::new(p("sfx/beep.ogg"), Vec::new());
        let hits = |dir: &str| source.find_files(&p(dir)).count();

        assert_eq!(hits(""), 1);
        assert_eq!(hits("sfx"), 1);
        assert_eq!(hits("sfx/beep.ogg"), 1);
        assert_eq!(hits("sfx/other"), 0);
        assert_eq!(hits("music"), 0);
    }
}

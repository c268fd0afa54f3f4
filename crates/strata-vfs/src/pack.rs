use std::io::Cursor;
use std::path::{Path, PathBuf};

use strata_archive::PackArchive;

use crate::error::Result;
use crate::path::VfsPath;
use crate::source::{ContentSource, FileIter, FileStream};

/// Content source backed by a zip asset pack.
///
/// The archive is opened by [`ContentSource::mount`]; before that the source
/// behaves as if it were empty.
#[derive(Debug)]
pub struct PackSource {
    path: PathBuf,
    archive: Option<PackArchive>,
}

impl PackSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            archive: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn entry_name(path: &VfsPath) -> String {
        path.segments().collect::<Vec<_>>().join("/")
    }
}

impl ContentSource for PackSource {
    fn kind(&self) -> &'static str {
        "pack"
    }

    fn origin(&self) -> String {
        self.path.display().to_string()
    }

    fn mount(&mut self) -> Result<()> {
        self.archive = Some(PackArchive::open(&self.path)?);
        Ok(())
    }

    fn try_get_file(&self, path: &VfsPath) -> Result<Option<FileStream>> {
        let Some(archive) = &self.archive else {
            return Ok(None);
        };
        let bytes = archive.read(&Self::entry_name(path))?;
        Ok(bytes.map(|bytes| Box::new(Cursor::new(bytes)) as FileStream))
    }

    fn contains(&self, path: &VfsPath) -> Result<bool> {
        Ok(self
            .archive
            .as_ref()
            .is_some_and(|archive| archive.contains(&Self::entry_name(path))))
    }

    fn find_files<'a>(&'a self, dir: &VfsPath) -> FileIter<'a> {
        let Some(archive) = &self.archive else {
            return Box::new(std::iter::empty());
        };

        let entries = archive.entries_under(&Self::entry_name(dir));
        Box::new(entries.filter_map(move |name| -> Option<Result<VfsPath>> {
            match VfsPath::parse(name) {
                Ok(path) => Some(Ok(path)),
                Err(err) => {
                    tracing::debug!(
                        target = "strata.vfs",
                        pack = %self.path.display(),
                        entry = name,
                        error = %err,
                        "skipping pack entry that has no VFS spelling"
                    );
                    None
                }
            }
        }))
    }
}

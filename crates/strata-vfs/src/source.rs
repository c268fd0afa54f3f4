use std::fmt;
use std::io::Read;
use std::path::PathBuf;

use crate::error::Result;
use crate::path::VfsPath;

/// A readable file handed out by the VFS.
pub type FileStream = Box<dyn Read + Send>;

/// Lazy listing of relative paths produced by [`ContentSource::find_files`].
pub type FileIter<'a> = Box<dyn Iterator<Item = Result<VfsPath>> + Send + 'a>;

/// Backing store for one mount.
///
/// All paths a source sees are relative to its own root; the [`crate::Vfs`]
/// strips the mount prefix before calling in. "Not found" is never an error:
/// lookups return `Ok(None)` and listings of missing directories are empty.
/// `Err` is reserved for real failures (permissions, corrupt archives).
///
/// Implementations must be safe to read from several threads at once.
pub trait ContentSource: Send + Sync + fmt::Debug {
    /// Short label for logs and mount listings (`directory`, `pack`, ...).
    fn kind(&self) -> &'static str;

    /// Human-readable origin, e.g. the host path the source was opened from.
    fn origin(&self) -> String;

    /// One-time setup, called by the VFS before the source is added to the
    /// mount list. A failure aborts the mount.
    fn mount(&mut self) -> Result<()> {
        Ok(())
    }

    /// Opens `path` for reading, or returns `None` if this source has no such
    /// file.
    fn try_get_file(&self, path: &VfsPath) -> Result<Option<FileStream>>;

    /// Returns whether `path` names a file in this source.
    ///
    /// The default opens the file; sources that can answer from an index
    /// should override it.
    fn contains(&self, path: &VfsPath) -> Result<bool> {
        Ok(self.try_get_file(path)?.is_some())
    }

    /// Recursively lists files at or below `dir`.
    ///
    /// Every call starts a fresh walk.
    fn find_files<'a>(&'a self, dir: &VfsPath) -> FileIter<'a>;

    /// Host file system path of `path`, for sources backed by real files.
    ///
    /// Returns `None` when the file does not exist on disk or the source has
    /// no native representation.
    fn native_path(&self, _path: &VfsPath) -> Option<PathBuf> {
        None
    }
}

impl<S: ContentSource + ?Sized> ContentSource for Box<S> {
    fn kind(&self) -> &'static str {
        (**self).kind()
    }

    fn origin(&self) -> String {
        (**self).origin()
    }

    fn mount(&mut self) -> Result<()> {
        (**self).mount()
    }

    fn try_get_file(&self, path: &VfsPath) -> Result<Option<FileStream>> {
        (**self).try_get_file(path)
    }

    fn contains(&self, path: &VfsPath) -> Result<bool> {
        (**self).contains(path)
    }

    fn find_files<'a>(&'a self, dir: &VfsPath) -> FileIter<'a> {
        (**self).find_files(dir)
    }

    fn native_path(&self, path: &VfsPath) -> Option<PathBuf> {
        (**self).native_path(path)
    }
}

use std::io;
use std::path::PathBuf;

use strata_archive::ArchiveError;
use thiserror::Error;

use crate::path::{PathError, VfsPath};
use crate::validation::UnsafePath;

pub type Result<T, E = VfsError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum VfsError {
    /// A relative path was passed where the public surface requires a rooted
    /// one. Always a caller bug.
    #[error("expected a rooted path, got `{0}`")]
    NotRooted(VfsPath),
    #[error(transparent)]
    UnsafePath(#[from] UnsafePath),
    #[error("file not found: {0}")]
    NotFound(VfsPath),
    #[error("mount target {} does not exist", .0.display())]
    MountTargetMissing(PathBuf),
    #[error("mount target {} is not a {expected}", path.display())]
    MountTargetKind {
        path: PathBuf,
        expected: &'static str,
    },
    #[error("cannot mount a single file at `{0}`")]
    InvalidMountPoint(VfsPath),
    #[error("failed to mount {origin}: {source}")]
    Mount {
        origin: String,
        #[source]
        source: Box<VfsError>,
    },
    #[error("failed to read {path}: {source}")]
    Read {
        path: VfsPath,
        #[source]
        source: io::Error,
    },
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Path(#[from] PathError),
}

impl VfsError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        VfsError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, VfsError::NotFound(_))
    }
}

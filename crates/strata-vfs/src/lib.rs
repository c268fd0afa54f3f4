//! Layered virtual file system for game assets.
//!
//! The VFS is responsible for:
//! - Presenting directories, zip asset packs and in-memory files under one
//!   rooted namespace (`/textures/grass.png`).
//! - Resolving each path against an ordered list of mounts; the first mount
//!   that has the file wins.
//! - Listing files across all mounts without duplicates.
//! - Rejecting asset names that could not exist on stricter platforms, and
//!   warning (in the background) about names whose case differs from disk.

mod config;
mod diagnostics;
mod directory;
mod error;
mod pack;
mod path;
mod source;
mod stream;
mod validation;
mod vfs;

pub use diagnostics::{check_case, CaseDiagnostics, CaseMismatch};
pub use directory::DirectorySource;
pub use error::{Result, VfsError};
pub use pack::PackSource;
pub use path::{PathError, VfsPath};
pub use source::{ContentSource, FileIter, FileStream};
pub use stream::StreamSource;
pub use validation::{is_safe_path, validate_path, UnsafePath, UnsafeReason};
pub use vfs::{FindFiles, MountInfo, Vfs};

pub use strata_archive::ArchiveError;
pub use strata_config::VfsConfig;

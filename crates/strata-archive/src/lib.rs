//! Read access to asset packs (zip containers).
//!
//! A [`PackArchive`] is opened once; its central directory is scanned into an
//! in-memory index so lookups and listings never touch the file again. Entry
//! reads share a single `ZipArchive` handle and are serialized behind a lock,
//! so concurrent readers never observe each other's cursor.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;
use zip::result::ZipError;
use zip::ZipArchive;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to open archive {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read zip {}: {source}", path.display())]
    Zip {
        path: PathBuf,
        #[source]
        source: ZipError,
    },
    #[error("failed to read {name} from {}: {source}", path.display())]
    Entry {
        path: PathBuf,
        name: String,
        #[source]
        source: io::Error,
    },
}

pub struct PackArchive {
    path: PathBuf,
    /// Normalized entry name -> index in the zip central directory.
    entries: BTreeMap<String, usize>,
    zip: Mutex<ZipArchive<File>>,
}

impl std::fmt::Debug for PackArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackArchive")
            .field("path", &self.path)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl PackArchive {
    /// Opens the archive at `path` and indexes its file entries.
    ///
    /// Directory entries are not indexed; their existence is implied by the
    /// files below them.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ArchiveError> {
        let path = path.into();
        let file = File::open(&path).map_err(|source| ArchiveError::Io {
            path: path.clone(),
            source,
        })?;
        let mut zip = ZipArchive::new(file).map_err(|source| ArchiveError::Zip {
            path: path.clone(),
            source,
        })?;

        let mut entries = BTreeMap::new();
        for index in 0..zip.len() {
            let entry = zip.by_index_raw(index).map_err(|source| ArchiveError::Zip {
                path: path.clone(),
                source,
            })?;
            if entry.is_dir() {
                continue;
            }
            let name = normalize_entry_name(entry.name());
            if name.is_empty() {
                continue;
            }
            if entries.insert(name.clone(), index).is_some() {
                tracing::debug!(
                    target = "strata.archive",
                    archive = %path.display(),
                    entry = %name,
                    "duplicate archive entry; keeping the last one"
                );
            }
        }

        tracing::debug!(
            target = "strata.archive",
            archive = %path.display(),
            entries = entries.len(),
            "indexed archive"
        );

        Ok(Self {
            path,
            entries,
            zip: Mutex::new(zip),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Read a file from the archive.
    ///
    /// Returns `Ok(None)` when the file isn't present.
    pub fn read(&self, name: &str) -> Result<Option<Vec<u8>>, ArchiveError> {
        let Some(&index) = self.entries.get(name) else {
            return Ok(None);
        };

        let mut zip = self.zip.lock();
        let mut entry = zip.by_index(index).map_err(|source| ArchiveError::Zip {
            path: self.path.clone(),
            source,
        })?;
        let mut buf = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        entry
            .read_to_end(&mut buf)
            .map_err(|source| ArchiveError::Entry {
                path: self.path.clone(),
                name: name.to_owned(),
                source,
            })?;
        Ok(Some(buf))
    }

    /// All indexed file names, sorted.
    pub fn entries(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    /// File names equal to `dir` or nested below it, sorted.
    ///
    /// An empty `dir` lists the whole archive.
    pub fn entries_under<'a>(&'a self, dir: &str) -> Box<dyn Iterator<Item = &'a str> + Send + 'a> {
        let dir = dir.trim_matches('/');
        if dir.is_empty() {
            return Box::new(self.entries());
        }

        let exact = self.entries.get_key_value(dir).map(|(name, _)| name.as_str());
        let prefix = format!("{dir}/");
        let nested = self
            .entries
            .range(prefix.clone()..)
            .map(|(name, _)| name.as_str())
            .take_while(move |name| name.starts_with(&prefix));
        Box::new(exact.into_iter().chain(nested))
    }
}

/// Zip entry names are `/`-separated, but some writers emit `\` or a leading
/// slash.
fn normalize_entry_name(name: &str) -> String {
    let name = name.trim_start_matches(['/', '\\']);
    if name.contains('\\') {
        name.replace('\\', "/")
    } else {
        name.to_owned()
    }
}

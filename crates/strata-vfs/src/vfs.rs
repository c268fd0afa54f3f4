use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::slice;
use std::sync::Arc;

use serde::Serialize;

use crate::diagnostics::CaseDiagnostics;
use crate::directory::DirectorySource;
use crate::error::{Result, VfsError};
use crate::pack::PackSource;
use crate::path::VfsPath;
use crate::source::{ContentSource, FileIter, FileStream};
use crate::stream::StreamSource;
use crate::validation::validate_path;

struct Mount {
    prefix: VfsPath,
    source: Box<dyn ContentSource>,
}

/// Description of one entry in the mount list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MountInfo {
    pub prefix: VfsPath,
    pub kind: &'static str,
    pub origin: String,
}

/// Layered, read-only view over directories, asset packs and in-memory files.
///
/// Sources are consulted in the order they were mounted: the first mount that
/// covers a path and has the file wins. Mounts are append-only and can only be
/// added through `&mut self`, so the list is frozen once the `Vfs` is shared
/// between reader threads.
///
/// Every path on this API must be rooted (`/textures/grass.png`); relative
/// paths are rejected with [`VfsError::NotRooted`].
pub struct Vfs {
    base_dir: PathBuf,
    strict: bool,
    case_diagnostics: Option<CaseDiagnostics>,
    mounts: Vec<Mount>,
}

impl Vfs {
    /// Creates an empty VFS whose relative mount paths resolve against the
    /// directory of the running executable.
    pub fn new() -> Result<Self> {
        let exe = std::env::current_exe().map_err(|err| VfsError::io("<current exe>", err))?;
        let base_dir = exe.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(Self::with_base_dir(base_dir))
    }

    /// Creates an empty VFS whose relative mount paths resolve against
    /// `base_dir`.
    ///
    /// Strict path validation is on. Case diagnostics are on in debug builds.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            strict: true,
            case_diagnostics: cfg!(debug_assertions).then(CaseDiagnostics::new),
            mounts: Vec::new(),
        }
    }

    /// Toggles path-safety validation on reads and listings.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Sets the case checker handed to directory sources.
    ///
    /// Only affects directories mounted afterwards.
    pub fn with_case_diagnostics(mut self, diagnostics: Option<CaseDiagnostics>) -> Self {
        self.case_diagnostics = diagnostics;
        self
    }

    pub fn case_diagnostics(&self) -> Option<&CaseDiagnostics> {
        self.case_diagnostics.as_ref()
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Mounts the host directory `host` under `prefix`.
    pub fn mount_directory(&mut self, host: impl AsRef<Path>, prefix: &VfsPath) -> Result<()> {
        require_rooted(prefix)?;
        let root = self.base_dir.join(host.as_ref());
        require_target(&root, "directory", |metadata| metadata.is_dir())?;

        let mut source = DirectorySource::new(root);
        if let Some(diagnostics) = &self.case_diagnostics {
            source = source.with_case_check(diagnostics.clone());
        }
        self.mount_source(prefix, source)
    }

    /// Mounts the zip pack at `host` under `prefix`.
    pub fn mount_pack(&mut self, host: impl AsRef<Path>, prefix: &VfsPath) -> Result<()> {
        require_rooted(prefix)?;
        let path = self.base_dir.join(host.as_ref());
        require_target(&path, "pack file", |metadata| metadata.is_file())?;
        self.mount_source(prefix, PackSource::new(path))
    }

    /// Mounts a single in-memory file at the rooted `path`.
    pub fn mount_stream(&mut self, data: impl Into<Arc<[u8]>>, path: &VfsPath) -> Result<()> {
        require_rooted(path)?;
        let (Some(prefix), Some(name)) = (path.parent(), path.file_name()) else {
            return Err(VfsError::InvalidMountPoint(path.clone()));
        };
        let relative = VfsPath::relative([name])?;
        self.mount_source(&prefix, StreamSource::new(relative, data))
    }

    /// Mounts a caller-provided source under `prefix`.
    ///
    /// The source's [`ContentSource::mount`] hook runs first; if it fails the
    /// mount list is left untouched.
    pub fn mount_source<S>(&mut self, prefix: &VfsPath, mut source: S) -> Result<()>
    where
        S: ContentSource + 'static,
    {
        require_rooted(prefix)?;
        source.mount().map_err(|err| VfsError::Mount {
            origin: format!("{} {}", source.kind(), source.origin()),
            source: Box::new(err),
        })?;

        tracing::info!(
            target = "strata.vfs",
            prefix = %prefix,
            kind = source.kind(),
            origin = %source.origin(),
            priority = self.mounts.len(),
            "mounted content source"
        );
        self.mounts.push(Mount {
            prefix: prefix.clone(),
            source: Box::new(source),
        });
        Ok(())
    }

    /// Mounts in priority order.
    pub fn mounts(&self) -> impl ExactSizeIterator<Item = MountInfo> + '_ {
        self.mounts.iter().map(|mount| MountInfo {
            prefix: mount.prefix.clone(),
            kind: mount.source.kind(),
            origin: mount.source.origin(),
        })
    }

    /// Opens the highest-priority file at `path`.
    ///
    /// Fails with [`VfsError::NotFound`] if no mount has it and, in strict
    /// mode, with [`VfsError::UnsafePath`] for non-portable names.
    pub fn read(&self, path: &VfsPath) -> Result<FileStream> {
        self.check_path(path)?;
        self.resolve(path)?
            .ok_or_else(|| VfsError::NotFound(path.clone()))
    }

    /// Like [`Vfs::read`], but a missing file is `Ok(None)`.
    ///
    /// In strict mode a non-portable path is treated as missing.
    pub fn try_read(&self, path: &VfsPath) -> Result<Option<FileStream>> {
        if !self.admits(path)? {
            return Ok(None);
        }
        self.resolve(path)
    }

    /// Reads the whole file at `path`.
    pub fn read_bytes(&self, path: &VfsPath) -> Result<Vec<u8>> {
        let mut stream = self.read(path)?;
        let mut buf = Vec::new();
        stream
            .read_to_end(&mut buf)
            .map_err(|source| VfsError::Read {
                path: path.clone(),
                source,
            })?;
        Ok(buf)
    }

    /// Reads the whole file at `path` as UTF-8.
    pub fn read_to_string(&self, path: &VfsPath) -> Result<String> {
        let bytes = self.read_bytes(path)?;
        String::from_utf8(bytes).map_err(|err| VfsError::Read {
            path: path.clone(),
            source: io::Error::new(io::ErrorKind::InvalidData, err),
        })
    }

    /// Returns whether any mount has a file at `path`.
    pub fn exists(&self, path: &VfsPath) -> Result<bool> {
        if !self.admits(path)? {
            return Ok(false);
        }
        for mount in &self.mounts {
            let Some(relative) = path.relative_to(&mount.prefix) else {
                continue;
            };
            if mount.source.contains(&relative)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Lists every file at or below `path` across all mounts.
    ///
    /// In strict mode, files whose names would be rejected by [`Vfs::read`]
    /// are skipped with a warning. Each rooted path is yielded once, in mount priority order and then in
    /// each source's own enumeration order. Mounts whose prefix lies below
    /// `path` contribute their whole content. The listing is lazy; sources are
    /// only walked as the iterator is advanced.
    pub fn find(&self, path: &VfsPath) -> Result<FindFiles<'_>> {
        self.check_path(path)?;
        Ok(FindFiles {
            query: path.clone(),
            strict: self.strict,
            mounts: self.mounts.iter(),
            current: None,
            seen: HashSet::new(),
        })
    }

    /// Host path of the highest-priority on-disk copy of `path`.
    ///
    /// Only sources backed by real files can answer; packs and in-memory
    /// files are skipped. Meant for integrations that cannot consume a
    /// stream.
    pub fn get_disk_path(&self, path: &VfsPath) -> Result<Option<PathBuf>> {
        if !self.admits(path)? {
            return Ok(None);
        }
        Ok(self.mounts.iter().find_map(|mount| {
            let relative = path.relative_to(&mount.prefix)?;
            mount.source.native_path(&relative)
        }))
    }

    fn resolve(&self, path: &VfsPath) -> Result<Option<FileStream>> {
        for (priority, mount) in self.mounts.iter().enumerate() {
            let Some(relative) = path.relative_to(&mount.prefix) else {
                continue;
            };
            if let Some(stream) = mount.source.try_get_file(&relative)? {
                tracing::trace!(
                    target = "strata.vfs",
                    path = %path,
                    prefix = %mount.prefix,
                    kind = mount.source.kind(),
                    priority,
                    "resolved file"
                );
                return Ok(Some(stream));
            }
        }
        Ok(None)
    }

    /// Rooted check plus, in strict mode, path-safety validation.
    fn check_path(&self, path: &VfsPath) -> Result<()> {
        require_rooted(path)?;
        if self.strict {
            validate_path(path)?;
        }
        Ok(())
    }

    /// Like [`Vfs::check_path`], but an unsafe path is `Ok(false)`.
    fn admits(&self, path: &VfsPath) -> Result<bool> {
        match self.check_path(path) {
            Ok(()) => Ok(true),
            Err(VfsError::UnsafePath(err)) => {
                tracing::warn!(
                    target = "strata.vfs",
                    path = %err.path,
                    reason = %err.reason,
                    "rejecting non-portable path"
                );
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }
}

impl fmt::Debug for Vfs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vfs")
            .field("base_dir", &self.base_dir)
            .field("strict", &self.strict)
            .field("case_diagnostics", &self.case_diagnostics.is_some())
            .field("mounts", &self.mounts().collect::<Vec<_>>())
            .finish()
    }
}

fn require_rooted(path: &VfsPath) -> Result<()> {
    if path.is_rooted() {
        Ok(())
    } else {
        Err(VfsError::NotRooted(path.clone()))
    }
}

fn require_target(
    path: &Path,
    expected: &'static str,
    is_expected: impl FnOnce(&fs::Metadata) -> bool,
) -> Result<()> {
    match fs::metadata(path) {
        Ok(metadata) if is_expected(&metadata) => Ok(()),
        Ok(_) => Err(VfsError::MountTargetKind {
            path: path.to_path_buf(),
            expected,
        }),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            Err(VfsError::MountTargetMissing(path.to_path_buf()))
        }
        Err(err) => Err(VfsError::io(path, err)),
    }
}

struct MountWalk<'a> {
    prefix: &'a VfsPath,
    files: FileIter<'a>,
}

/// Iterator returned by [`Vfs::find`].
pub struct FindFiles<'a> {
    query: VfsPath,
    strict: bool,
    mounts: slice::Iter<'a, Mount>,
    current: Option<MountWalk<'a>>,
    seen: HashSet<VfsPath>,
}

impl<'a> FindFiles<'a> {
    fn next_walk(&mut self) -> Option<MountWalk<'a>> {
        for mount in self.mounts.by_ref() {
            let dir = match self.query.relative_to(&mount.prefix) {
                Some(relative) => relative,
                None if mount.prefix.starts_with(&self.query) => VfsPath::empty(),
                None => continue,
            };
            return Some(MountWalk {
                prefix: &mount.prefix,
                files: mount.source.find_files(&dir),
            });
        }
        None
    }
}

impl Iterator for FindFiles<'_> {
    type Item = Result<VfsPath>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(walk) = self.current.as_mut() {
                match walk.files.next() {
                    Some(Ok(relative)) => {
                        let rooted = walk.prefix.join(&relative);
                        if !self.seen.insert(rooted.clone()) {
                            continue;
                        }
                        if self.strict {
                            if let Err(err) = validate_path(&rooted) {
                                tracing::warn!(
                                    target = "strata.vfs",
                                    path = %err.path,
                                    reason = %err.reason,
                                    "skipping non-portable path in listing"
                                );
                                continue;
                            }
                        }
                        return Some(Ok(rooted));
                    }
                    Some(Err(err)) => return Some(Err(err)),
                    None => {}
                }
            }
            self.current = Some(self.next_walk()?);
        }
    }
}

impl fmt::Debug for FindFiles<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FindFiles")
            .field("query", &self.query)
            .field("strict", &self.strict)
            .field("remaining_mounts", &self.mounts.len())
            .field("seen", &self.seen.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> VfsPath {
        VfsPath::parse(s).unwrap()
    }

    fn read_string(vfs: &Vfs, path: &str) -> String {
        vfs.read_to_string(&p(path)).unwrap()
    }

    fn quiet_vfs() -> Vfs {
        Vfs::with_base_dir(".").with_case_diagnostics(None)
    }

    #[test]
    fn vfs_is_shareable_between_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Vfs>();
    }

    #[test]
    fn earlier_stream_mount_wins() {
        let mut vfs = quiet_vfs();
        vfs.mount_stream(b"first".to_vec(), &p("/a/b.txt")).unwrap();
        vfs.mount_stream(b"second".to_vec(), &p("/a/b.txt")).unwrap();

        assert_eq!(read_string(&vfs, "/a/b.txt"), "first");
        assert_eq!(vfs.find(&p("/")).unwrap().count(), 1);
    }

    #[test]
    fn stream_mount_is_visible_at_its_path_only() {
        let mut vfs = quiet_vfs();
        vfs.mount_stream(b"beep".to_vec(), &p("/audio/beep.ogg")).unwrap();

        assert!(vfs.exists(&p("/audio/beep.ogg")).unwrap());
        assert!(!vfs.exists(&p("/audio/boop.ogg")).unwrap());
        assert_eq!(vfs.find(&p("/audio/other")).unwrap().count(), 0);

        let listed: Vec<_> = vfs.find(&p("/")).unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(listed, vec![p("/audio/beep.ogg")]);
    }

    #[test]
    fn stream_cannot_be_mounted_at_root() {
        let mut vfs = quiet_vfs();
        let err = vfs.mount_stream(b"x".to_vec(), &VfsPath::root()).unwrap_err();
        assert!(matches!(err, VfsError::InvalidMountPoint(_)));
        assert_eq!(vfs.mounts().len(), 0);
    }

    #[test]
    fn relative_paths_are_rejected_everywhere() {
        let mut vfs = quiet_vfs();
        vfs.mount_stream(b"x".to_vec(), &p("/a.txt")).unwrap();
        let relative = p("a.txt");

        assert!(matches!(vfs.read(&relative), Err(VfsError::NotRooted(_))));
        assert!(matches!(vfs.try_read(&relative), Err(VfsError::NotRooted(_))));
        assert!(matches!(vfs.exists(&relative), Err(VfsError::NotRooted(_))));
        assert!(matches!(vfs.find(&relative), Err(VfsError::NotRooted(_))));
        assert!(matches!(
            vfs.get_disk_path(&relative),
            Err(VfsError::NotRooted(_))
        ));
        assert!(matches!(
            vfs.mount_stream(b"y".to_vec(), &relative),
            Err(VfsError::NotRooted(_))
        ));
    }

    #[test]
    fn missing_files() {
        let vfs = quiet_vfs();
        assert!(vfs.try_read(&p("/nope.txt")).unwrap().is_none());
        assert!(!vfs.exists(&p("/nope.txt")).unwrap());
        assert!(vfs.read(&p("/nope.txt")).err().unwrap().is_not_found());
        assert_eq!(vfs.get_disk_path(&p("/nope.txt")).unwrap(), None);
    }

    #[test]
    fn strict_mode_rejects_unsafe_paths() {
        let mut vfs = quiet_vfs();
        vfs.mount_stream(b"x".to_vec(), &p("/sfx/aux.ogg")).unwrap();
        let unsafe_path = p("/sfx/aux.ogg");

        assert!(matches!(
            vfs.read(&unsafe_path),
            Err(VfsError::UnsafePath(_))
        ));
        assert!(vfs.try_read(&unsafe_path).unwrap().is_none());
        assert!(!vfs.exists(&unsafe_path).unwrap());
        assert!(matches!(
            vfs.find(&p("/sfx/CON")),
            Err(VfsError::UnsafePath(_))
        ));
    }

    #[test]
    fn lenient_mode_serves_unsafe_paths() {
        let mut vfs = quiet_vfs().strict(false);
        vfs.mount_stream(b"x".to_vec(), &p("/sfx/aux.ogg")).unwrap();
        assert_eq!(read_string(&vfs, "/sfx/aux.ogg"), "x");
    }

    #[test]
    fn find_dedups_across_overlapping_mounts() {
        let mut vfs = quiet_vfs();
        for body in ["one", "two", "three"] {
            vfs.mount_stream(body.as_bytes().to_vec(), &p("/a/x.txt")).unwrap();
        }
        vfs.mount_stream(b"y".to_vec(), &p("/a/y.txt")).unwrap();

        let found: Vec<_> = vfs.find(&p("/a")).unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(found, vec![p("/a/x.txt"), p("/a/y.txt")]);
    }

    #[test]
    fn failed_source_mount_leaves_list_untouched() {
        #[derive(Debug)]
        struct Broken;

        impl ContentSource for Broken {
            fn kind(&self) -> &'static str {
                "broken"
            }

            fn origin(&self) -> String {
                "nowhere".to_owned()
            }

            fn mount(&mut self) -> Result<()> {
                Err(VfsError::io(
                    "nowhere",
                    io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
                ))
            }

            fn try_get_file(&self, _path: &VfsPath) -> Result<Option<FileStream>> {
                unreachable!("never mounted")
            }

            fn find_files<'a>(&'a self, _dir: &VfsPath) -> FileIter<'a> {
                unreachable!("never mounted")
            }
        }

        let mut vfs = quiet_vfs();
        let err = vfs.mount_source(&VfsPath::root(), Broken).unwrap_err();
        match err {
            VfsError::Mount { origin, source } => {
                assert_eq!(origin, "broken nowhere");
                assert!(matches!(*source, VfsError::Io { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(vfs.mounts().len(), 0);
    }

    #[test]
    fn source_errors_propagate_from_reads() {
        #[derive(Debug)]
        struct Failing;

        impl ContentSource for Failing {
            fn kind(&self) -> &'static str {
                "failing"
            }

            fn origin(&self) -> String {
                "test".to_owned()
            }

            fn try_get_file(&self, _path: &VfsPath) -> Result<Option<FileStream>> {
                Err(VfsError::io(
                    "test",
                    io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
                ))
            }

            fn find_files<'a>(&'a self, _dir: &VfsPath) -> FileIter<'a> {
                Box::new(std::iter::once(Err::<VfsPath, _>(VfsError::io(
                    "test",
                    io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
                ))))
            }
        }

        let mut vfs = quiet_vfs();
        vfs.mount_source(&VfsPath::root(), Failing).unwrap();

        assert!(matches!(vfs.read(&p("/a")), Err(VfsError::Io { .. })));
        assert!(matches!(vfs.try_read(&p("/a")), Err(VfsError::Io { .. })));
        let first = vfs.find(&VfsPath::root()).unwrap().next().unwrap();
        assert!(matches!(first, Err(VfsError::Io { .. })));
    }

    #[test]
    fn mount_listing_preserves_order() {
        let mut vfs = quiet_vfs();
        vfs.mount_stream(b"1".to_vec(), &p("/b/one.txt")).unwrap();
        vfs.mount_stream(b"22".to_vec(), &p("/a/two.txt")).unwrap();

        let mounts: Vec<_> = vfs.mounts().collect();
        assert_eq!(mounts[0].prefix, p("/b"));
        assert_eq!(mounts[0].kind, "stream");
        assert_eq!(mounts[1].prefix, p("/a"));
        assert_eq!(mounts[1].origin, "<memory: 2 bytes>");
    }
}

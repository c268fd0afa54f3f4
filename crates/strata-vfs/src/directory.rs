use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::diagnostics::CaseDiagnostics;
use crate::error::{Result, VfsError};
use crate::path::VfsPath;
use crate::source::{ContentSource, FileIter, FileStream};

/// Content source backed by a host directory.
#[derive(Debug)]
pub struct DirectorySource {
    root: PathBuf,
    case_check: Option<CaseDiagnostics>,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            case_check: None,
        }
    }

    /// Submit every lookup to `diagnostics` for a background case check.
    pub fn with_case_check(mut self, diagnostics: CaseDiagnostics) -> Self {
        self.case_check = Some(diagnostics);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn host_path(&self, path: &VfsPath) -> PathBuf {
        // `VfsPath` segments are never `..`, so the join stays below `root`.
        self.root.join(path.to_native())
    }

    /// Metadata lookup where a missing file (or a file used as a directory
    /// somewhere along the path) is `None` rather than an error.
    fn file_metadata(&self, host: &Path) -> Result<Option<fs::Metadata>> {
        match fs::metadata(host) {
            Ok(metadata) if metadata.is_file() => Ok(Some(metadata)),
            Ok(_) => Ok(None),
            Err(err) if is_missing(&err) => Ok(None),
            Err(err) => Err(VfsError::io(host, err)),
        }
    }

    fn submit_case_check(&self, path: &VfsPath) {
        if let Some(diagnostics) = &self.case_check {
            diagnostics.submit(&self.root, path);
        }
    }
}

fn is_missing(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

impl ContentSource for DirectorySource {
    fn kind(&self) -> &'static str {
        "directory"
    }

    fn origin(&self) -> String {
        self.root.display().to_string()
    }

    fn mount(&mut self) -> Result<()> {
        let metadata = fs::metadata(&self.root).map_err(|err| {
            if is_missing(&err) {
                VfsError::MountTargetMissing(self.root.clone())
            } else {
                VfsError::io(&self.root, err)
            }
        })?;
        if !metadata.is_dir() {
            return Err(VfsError::MountTargetKind {
                path: self.root.clone(),
                expected: "directory",
            });
        }
        // Fail now, not on first read, if the directory is not listable.
        fs::read_dir(&self.root).map_err(|err| VfsError::io(&self.root, err))?;
        Ok(())
    }

    fn try_get_file(&self, path: &VfsPath) -> Result<Option<FileStream>> {
        self.submit_case_check(path);

        let host = self.host_path(path);
        if self.file_metadata(&host)?.is_none() {
            return Ok(None);
        }
        match File::open(&host) {
            Ok(file) => Ok(Some(Box::new(file))),
            // Removed between the metadata check and the open.
            Err(err) if is_missing(&err) => Ok(None),
            Err(err) => Err(VfsError::io(host, err)),
        }
    }

    fn contains(&self, path: &VfsPath) -> Result<bool> {
        self.submit_case_check(path);
        Ok(self.file_metadata(&self.host_path(path))?.is_some())
    }

    fn find_files<'a>(&'a self, dir: &VfsPath) -> FileIter<'a> {
        let base = self.host_path(dir);
        let walk = WalkDir::new(base)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter();

        Box::new(walk.filter_map(move |entry| match entry {
            Ok(entry) => {
                if !entry.file_type().is_file() {
                    return None;
                }
                let relative = entry.path().strip_prefix(&self.root).ok()?;
                match VfsPath::from_native(relative) {
                    Ok(path) => Some(Ok(path)),
                    Err(err) => {
                        tracing::debug!(
                            target = "strata.vfs",
                            root = %self.root.display(),
                            error = %err,
                            "skipping file that has no VFS spelling"
                        );
                        None
                    }
                }
            }
            Err(err) => {
                let path = err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.root.clone());
                match err.into_io_error() {
                    // Missing directory, or an entry deleted mid-walk.
                    Some(io) if is_missing(&io) => None,
                    Some(io) => Some(Err(VfsError::io(path, io))),
                    None => Some(Err(VfsError::io(
                        path,
                        io::Error::other("file system loop detected"),
                    ))),
                }
            }
        }))
    }

    fn native_path(&self, path: &VfsPath) -> Option<PathBuf> {
        let host = self.host_path(path);
        host.is_file().then_some(host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Read;
    use std::time::Duration;

    fn p(s: &str) -> VfsPath {
        VfsPath::parse(s).unwrap()
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("textures/ui")).unwrap();
        fs::write(dir.path().join("textures/grass.png"), b"grass").unwrap();
        fs::write(dir.path().join("textures/ui/button.png"), b"button").unwrap();
        fs::write(dir.path().join("readme.txt"), b"readme").unwrap();
        dir
    }

    fn mounted(dir: &Path) -> DirectorySource {
        let mut source = DirectorySource::new(dir);
        source.mount().unwrap();
        source
    }

    fn read_all(mut stream: FileStream) -> Vec<u8> {
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).unwrap();
        buf
    }

    #[test]
    fn mount_requires_an_existing_directory() {
        let dir = fixture();

        let mut missing = DirectorySource::new(dir.path().join("nope"));
        assert!(matches!(
            missing.mount(),
            Err(VfsError::MountTargetMissing(_))
        ));

        let mut file = DirectorySource::new(dir.path().join("readme.txt"));
        assert!(matches!(
            file.mount(),
            Err(VfsError::MountTargetKind { expected: "directory", .. })
        ));
    }

    #[test]
    fn reads_files_below_the_root() {
        let dir = fixture();
        let source = mounted(dir.path());

        let stream = source.try_get_file(&p("textures/grass.png")).unwrap().unwrap();
        assert_eq!(read_all(stream), b"grass");
        assert!(source.contains(&p("readme.txt")).unwrap());
    }

    #[test]
    fn missing_files_and_directories_are_not_errors() {
        let dir = fixture();
        let source = mounted(dir.path());

        assert!(source.try_get_file(&p("missing.png")).unwrap().is_none());
        // A directory is not a file.
        assert!(source.try_get_file(&p("textures")).unwrap().is_none());
        // A file used as a directory.
        assert!(source.try_get_file(&p("readme.txt/inner")).unwrap().is_none());
        assert!(!source.contains(&p("textures/ui")).unwrap());
    }

    #[test]
    fn find_files_walks_recursively_in_name_order() {
        let dir = fixture();
        let source = mounted(dir.path());

        let all: Vec<_> = source
            .find_files(&VfsPath::empty())
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(
            all,
            vec![
                p("readme.txt"),
                p("textures/grass.png"),
                p("textures/ui/button.png"),
            ]
        );

        let ui: Vec<_> = source
            .find_files(&p("textures/ui"))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(ui, vec![p("textures/ui/button.png")]);
    }

    #[test]
    fn find_files_of_missing_directory_is_empty() {
        let dir = fixture();
        let source = mounted(dir.path());
        assert_eq!(source.find_files(&p("sounds")).count(), 0);
    }

    #[test]
    fn find_files_is_restartable() {
        let dir = fixture();
        let source = mounted(dir.path());
        let dir_path = p("textures");

        assert_eq!(source.find_files(&dir_path).count(), 2);
        fs::write(dir.path().join("textures/dirt.png"), b"dirt").unwrap();
        assert_eq!(source.find_files(&dir_path).count(), 3);
    }

    #[test]
    fn native_path_only_for_existing_files() {
        let dir = fixture();
        let source = mounted(dir.path());

        assert_eq!(
            source.native_path(&p("textures/grass.png")),
            Some(dir.path().join("textures").join("grass.png"))
        );
        assert_eq!(source.native_path(&p("textures")), None);
        assert_eq!(source.native_path(&p("missing.png")), None);
    }

    #[test]
    fn lookups_are_submitted_for_case_checks() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Icon.PNG"), b"png").unwrap();

        let diagnostics = CaseDiagnostics::new();
        let rx = diagnostics.subscribe();
        let source = DirectorySource::new(dir.path()).with_case_check(diagnostics);

        // Whether the open itself succeeds depends on the host file system.
        let _ = source.try_get_file(&p("Icon.png")).unwrap();

        let mismatch = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(mismatch.requested, p("Icon.png"));
        assert_eq!(mismatch.on_disk, p("Icon.PNG"));
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_subdirectory_is_an_error_not_absence() {
        use std::os::unix::fs::PermissionsExt;

        let dir = fixture();
        let locked = dir.path().join("locked");
        fs::create_dir_all(&locked).unwrap();
        fs::write(locked.join("secret.png"), b"secret").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Root ignores permission bits; nothing to observe there.
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let source = mounted(dir.path());
        let results: Vec<_> = source.find_files(&VfsPath::empty()).collect();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(
            results
                .iter()
                .any(|result| matches!(result, Err(VfsError::Io { .. }))),
            "{results:?}"
        );
        let listed: Vec<_> = results.into_iter().filter_map(|result| result.ok()).collect();
        assert!(listed.contains(&p("textures/grass.png")));
    }
}

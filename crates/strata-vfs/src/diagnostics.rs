//! Background detection of case mismatches between requested paths and the
//! names actually stored on disk.
//!
//! On a case-insensitive file system `/Icon.png` happily opens `Icon.PNG`, and
//! the asset only breaks once the game ships on a case-sensitive one. The
//! directory source submits every lookup here; a worker walks the path
//! against real directory listings and warns when the spelling differs. The
//! outcome never reaches the read that triggered the check.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::path::VfsPath;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaseMismatch {
    /// Host directory the path was resolved against.
    pub root: PathBuf,
    /// Path as requested by the caller.
    pub requested: VfsPath,
    /// Path as spelled on disk.
    pub on_disk: VfsPath,
}

impl fmt::Display for CaseMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "requested `{}` but the file on disk is `{}` (in {})",
            self.requested,
            self.on_disk,
            self.root.display()
        )
    }
}

/// Walks `path` below `root` one segment at a time.
///
/// Exact name matches win; otherwise a case-insensitive match is followed.
/// Returns the on-disk spelling if any segment differed. A segment that does
/// not exist at all (including a file removed mid-walk) ends the check with
/// nothing to report.
pub fn check_case(root: &Path, path: &VfsPath) -> Option<CaseMismatch> {
    let mut dir = root.to_path_buf();
    let mut on_disk = VfsPath::empty();
    let mut mismatched = false;

    for segment in path.segments() {
        let entries = fs::read_dir(&dir).ok()?;
        let wanted = segment.to_lowercase();
        let mut folded = None;
        let mut exact = false;

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name == segment {
                exact = true;
                break;
            }
            if folded.is_none() && name.to_lowercase() == wanted {
                folded = Some(name.to_owned());
            }
        }

        let actual = if exact {
            segment.to_owned()
        } else {
            mismatched = true;
            folded?
        };
        dir.push(&actual);
        on_disk.push(actual).ok()?;
    }

    if !mismatched {
        return None;
    }

    let on_disk = if path.is_rooted() {
        on_disk.to_rooted()
    } else {
        on_disk
    };
    Some(CaseMismatch {
        root: root.to_path_buf(),
        requested: path.clone(),
        on_disk,
    })
}

/// Fire-and-forget case checker.
///
/// Cloning is cheap; clones share the worker and the subscriber list.
#[derive(Clone)]
pub struct CaseDiagnostics {
    /// `None` when a dedicated pool could not be built; jobs then go to the
    /// global rayon pool.
    pool: Option<Arc<rayon::ThreadPool>>,
    subscribers: Arc<Mutex<Vec<Sender<CaseMismatch>>>>,
}

impl CaseDiagnostics {
    pub fn new() -> Self {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(1)
            .thread_name(|idx| format!("strata-case-check-{idx}"))
            .build();
        let pool = match pool {
            Ok(pool) => Some(Arc::new(pool)),
            Err(err) => {
                tracing::debug!(
                    target = "strata.vfs",
                    error = %err,
                    "failed to start case-check worker; using the global pool"
                );
                None
            }
        };

        Self {
            pool,
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns a receiver that gets every mismatch found from now on.
    pub fn subscribe(&self) -> Receiver<CaseMismatch> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Queues a check of `path` below `root` and returns immediately.
    pub fn submit(&self, root: &Path, path: &VfsPath) {
        let root = root.to_path_buf();
        let path = path.clone();
        let subscribers = Arc::clone(&self.subscribers);
        let job = move || {
            if let Some(mismatch) = check_case(&root, &path) {
                report(&subscribers, mismatch);
            }
        };

        match &self.pool {
            Some(pool) => pool.spawn(job),
            None => rayon::spawn(job),
        }
    }
}

impl Default for CaseDiagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CaseDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaseDiagnostics")
            .field("dedicated_pool", &self.pool.is_some())
            .field("subscribers", &self.subscribers.lock().len())
            .finish()
    }
}

fn report(subscribers: &Mutex<Vec<Sender<CaseMismatch>>>, mismatch: CaseMismatch) {
    tracing::warn!(
        target = "strata.vfs",
        root = %mismatch.root.display(),
        requested = %mismatch.requested,
        on_disk = %mismatch.on_disk,
        "path case does not match the file on disk; this will fail on case-sensitive file systems"
    );

    let mut subscribers = subscribers.lock();
    subscribers.retain(|tx| tx.send(mismatch.clone()).is_ok());
}

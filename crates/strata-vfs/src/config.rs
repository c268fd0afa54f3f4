use std::path::PathBuf;

use strata_config::{MountKind, VfsConfig};

use crate::diagnostics::CaseDiagnostics;
use crate::error::Result;
use crate::path::VfsPath;
use crate::vfs::Vfs;

impl Vfs {
    /// Builds a VFS from `config`, resolving relative mount paths against the
    /// executable's directory.
    pub fn from_config(config: &VfsConfig) -> Result<Self> {
        Self::new()?.apply_config(config)
    }

    /// Builds a VFS from `config`, resolving relative mount paths against
    /// `base_dir`.
    pub fn from_config_with_base_dir(
        config: &VfsConfig,
        base_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        Self::with_base_dir(base_dir).apply_config(config)
    }

    fn apply_config(self, config: &VfsConfig) -> Result<Self> {
        // Diagnostics must be in place before any directory is mounted.
        let mut vfs = self
            .strict(config.strict_paths)
            .with_case_diagnostics(config.effective_case_check().then(CaseDiagnostics::new));

        for mount in &config.mounts {
            let prefix = VfsPath::parse(&mount.prefix)?;
            match mount.kind {
                MountKind::Directory => vfs.mount_directory(&mount.path, &prefix)?,
                MountKind::Pack => vfs.mount_pack(&mount.path, &prefix)?,
            }
        }
        Ok(vfs)
    }
}

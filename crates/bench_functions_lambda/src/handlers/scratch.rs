use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::runtime::contract::{FunctionKind, SizeLabel};
use crate::runtime::storage_keys::{scratch_file_name, BlobRole};

/// Per-invocation staging directory under the configured bench home.
///
/// The directory and everything in it is removed when the workspace is dropped,
/// on the success path and on every early return alike.
#[derive(Debug)]
pub struct ScratchWorkspace {
    dir: TempDir,
    size: SizeLabel,
}

impl ScratchWorkspace {
    pub fn acquire(
        bench_home: &Path,
        function: FunctionKind,
        size: SizeLabel,
    ) -> std::io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-{}-", function.namespace(), size.as_str()))
            .tempdir_in(bench_home)?;
        Ok(Self { dir, size })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn file_for(&self, role: BlobRole) -> PathBuf {
        self.dir.path().join(scratch_file_name(self.size, role))
    }

    /// Removes the directory now, reporting failures that drop would swallow.
    pub fn close(self) -> std::io::Result<()> {
        self.dir.close()
    }
}

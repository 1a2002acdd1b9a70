//! Local image store boundary.
//!
//! The pipeline only requires `save(key, source_path) -> ack`; the store's
//! wire format is opaque. `FilesystemImageStore` is the default backend:
//! an append-only keyed blob directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

/// Keyed blob store for delivered source images.
pub trait ImageStore: Send {
    /// Persist the file at `source` under `key`. An error here is
    /// propagated to the caller; the store is expected to be reliable.
    fn save(&mut self, key: &str, source: &Path) -> Result<()>;
}

/// Filesystem-backed store writing `<root>/<key>.jpg`.
pub struct FilesystemImageStore {
    root: PathBuf,
}

impl FilesystemImageStore {
    pub fn new(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)
            .with_context(|| format!("create image store directory {}", root.display()))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ImageStore for FilesystemImageStore {
    fn save(&mut self, key: &str, source: &Path) -> Result<()> {
        if key.is_empty() || key.contains(std::path::is_separator) {
            return Err(anyhow!("invalid image store key {:?}", key));
        }
        let dest = self.root.join(format!("{key}.jpg"));
        fs::copy(source, &dest).with_context(|| {
            format!("store {} as {}", source.display(), dest.display())
        })?;
        Ok(())
    }
}

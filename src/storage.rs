//! Asset persistence under the output root
//!
//! [`Layout`] derives every path the pipeline touches; [`AssetStore`] is the only
//! component that creates or deletes them.
//!
//! ```text
//! <root>/<manga>/<unit>/<unit>_<page>.jpg
//! <root>/<manga>/<manga>-<kind>-<label>.<ext>
//! ```

use crate::config::Config;
use crate::error::Result;
use crate::types::{DownloadLocation, UnitKind};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extension of persisted page images
pub const PAGE_EXTENSION: &str = "jpg";

/// Deterministic path derivation under the output root
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
    archive_extension: String,
}

impl Layout {
    /// Layout rooted at `root`, writing archives with `archive_extension`
    pub fn new(root: impl Into<PathBuf>, archive_extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            archive_extension: archive_extension.into(),
        }
    }

    /// Layout described by a configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.output_dir, &config.archive.extension)
    }

    /// Output root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of one series
    pub fn manga_dir(&self, manga: &str) -> PathBuf {
        self.root.join(manga)
    }

    /// Directory holding the pages of one unit
    pub fn unit_dir(&self, manga: &str, unit: &str) -> DownloadLocation {
        DownloadLocation(self.manga_dir(manga).join(unit))
    }

    /// File name of a page (`10_3.jpg`)
    pub fn page_file_name(unit: &str, page: u32) -> String {
        format!("{unit}_{page}.{PAGE_EXTENSION}")
    }

    /// Path of a page
    pub fn page_path(&self, manga: &str, unit: &str, page: u32) -> PathBuf {
        self.unit_dir(manga, unit)
            .0
            .join(Self::page_file_name(unit, page))
    }

    /// Path of an archive (`<root>/one-piece/one-piece-volume-1-3.cbr`)
    pub fn archive_path(&self, manga: &str, kind: UnitKind, label: &str) -> PathBuf {
        self.manga_dir(manga).join(format!(
            "{manga}-{}-{label}.{}",
            kind.label(),
            self.archive_extension
        ))
    }
}

/// Filesystem capability used by the pipeline
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Create every missing segment of `path`; succeeds if it already exists
    async fn ensure_dir(&self, path: &Path) -> Result<()>;

    /// Whether `path` exists
    async fn exists(&self, path: &Path) -> bool;

    /// Write one page, creating its directory if needed; overwrites an existing file
    async fn write_page(&self, path: &Path, bytes: &[u8]) -> Result<()>;

    /// Recursively delete a directory; a missing directory is not an error
    async fn remove(&self, path: &Path) -> Result<()>;
}

/// [`AssetStore`] backed by the local filesystem
#[derive(Clone, Copy, Debug, Default)]
pub struct FsAssetStore;

#[async_trait]
impl AssetStore for FsAssetStore {
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(path).await?;
        Ok(())
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn write_page(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "page written");
        Ok(())
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "directory removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

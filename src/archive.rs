//! Archive packaging of unit directories
//!
//! Every file of every source directory is written into one deflate-compressed zip
//! container, flattened to its file name. Page names carry their unit number, so
//! directories of one series never collide.

use crate::error::{ArchiveError, Result};
use crate::types::{ArchiveResult, DownloadLocation};
use async_trait::async_trait;
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::CompressionMethod;
use zip::write::FileOptions;

/// Archive-building capability used by the pipeline
#[async_trait]
pub trait Archiver: Send + Sync {
    /// Compress the contents of `sources` into `output`
    ///
    /// Sources that do not exist are skipped; if none exist the build fails with
    /// [`ArchiveError::NoSources`]. Sources are never modified.
    async fn build(&self, sources: &[DownloadLocation], output: &Path) -> Result<ArchiveResult>;
}

/// [`Archiver`] writing zip containers
#[derive(Clone, Copy, Debug)]
pub struct ZipArchiver {
    compression_level: i32,
}

impl ZipArchiver {
    /// Archiver compressing at `compression_level` (0..=9)
    pub fn new(compression_level: i32) -> Self {
        Self { compression_level }
    }
}

impl Default for ZipArchiver {
    fn default() -> Self {
        Self::new(9)
    }
}

#[async_trait]
impl Archiver for ZipArchiver {
    async fn build(&self, sources: &[DownloadLocation], output: &Path) -> Result<ArchiveResult> {
        let sources: Vec<PathBuf> = sources.iter().map(|s| s.0.clone()).collect();
        let output = output.to_path_buf();
        let level = self.compression_level;

        let result = tokio::task::spawn_blocking({
            let output = output.clone();
            move || write_zip(&sources, &output, level)
        })
        .await
        .map_err(|e| ArchiveError::Write {
            output: output.clone(),
            reason: format!("archive task failed: {e}"),
        })??;

        info!(
            path = %result.output_path.display(),
            size_bytes = result.byte_size,
            "archive created"
        );
        Ok(result)
    }
}

fn write_zip(sources: &[PathBuf], output: &Path, level: i32) -> Result<ArchiveResult> {
    let write_err = |reason: String| ArchiveError::Write {
        output: output.to_path_buf(),
        reason,
    };

    let existing: Vec<&PathBuf> = sources.iter().filter(|s| s.is_dir()).collect();
    for missing in sources.iter().filter(|s| !s.is_dir()) {
        warn!(path = %missing.display(), "archive source does not exist, skipping");
    }
    if existing.is_empty() {
        return Err(ArchiveError::NoSources {
            output: output.to_path_buf(),
            requested: sources.len(),
        }
        .into());
    }

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| write_err(format!("failed to create parent directory: {e}")))?;
    }
    let file = File::create(output).map_err(|e| write_err(format!("failed to create file: {e}")))?;
    let mut zip = zip::ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(level));

    let mut names = HashSet::new();
    for dir in existing {
        for path in files_under(dir).map_err(|e| write_err(format!("failed to read {}: {e}", dir.display())))? {
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            if !names.insert(name.clone()) {
                warn!(entry = %name, source = %path.display(), "duplicate archive entry, skipping");
                continue;
            }
            let bytes = std::fs::read(&path)
                .map_err(|e| write_err(format!("failed to read {}: {e}", path.display())))?;
            zip.start_file(name.as_str(), options)
                .map_err(|e| write_err(e.to_string()))?;
            zip.write_all(&bytes).map_err(|e| write_err(e.to_string()))?;
            debug!(entry = %name, "added to archive");
        }
    }

    zip.finish().map_err(|e| write_err(e.to_string()))?;
    let byte_size = std::fs::metadata(output)
        .map_err(|e| write_err(e.to_string()))?
        .len();

    Ok(ArchiveResult {
        output_path: output.to_path_buf(),
        byte_size,
    })
}

/// Every regular file below `dir`, sorted by path
fn files_under(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

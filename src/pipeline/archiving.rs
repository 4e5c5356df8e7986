//! Archiving of persisted units.
//!
//! Two entry points share the archiver: [`Pipeline::archive_unit`], where the archive
//! is the requested result and failures are returned, and the post-download step,
//! where failures are reported and swallowed so persisted pages are never lost.

use crate::error::{ArchiveError, Error, Result};
use crate::range::parse_token;
use crate::types::{ArchiveResult, DownloadLocation, Event, Selector, UnitKind, format_number};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::Pipeline;

impl Pipeline {
    /// Build the archive of units already persisted on disk
    ///
    /// A chapter is archived from its directory; a volume from the directories of the
    /// chapters the catalog lists for it. Ranges produce one archive named after the
    /// range (`<manga>-chapter-1-5.cbr`). Directories missing on disk are skipped with a
    /// warning; if none exist the call fails with [`ArchiveError::NoSources`].
    pub async fn archive_unit(
        &self,
        name: &str,
        kind: UnitKind,
        selector: &str,
    ) -> Result<ArchiveResult> {
        self.ensure_accepting()?;
        let token = parse_token(selector)?;
        let early = Self::resolve_without_catalog(kind, token, selector)?;

        let stats = self.resolve_canonical(name).await?;
        let manga = stats.canonical_name.clone();
        let resolved = match early {
            Some(resolved) => resolved,
            None => token.resolve_with(stats.last_of(kind))?,
        };

        let sources: Vec<DownloadLocation> = match (kind, resolved) {
            (UnitKind::Chapter, Selector::Single { number }) => {
                vec![self.layout.unit_dir(&manga, &format_number(number))]
            }
            (UnitKind::Chapter, Selector::Range { range }) => self
                .catalog
                .chapters_in(&manga, &range)
                .await?
                .iter()
                .map(|link| self.layout.unit_dir(&manga, link.unit()))
                .collect(),
            (UnitKind::Volume, Selector::Single { number }) => {
                // whole number, checked by resolve_without_catalog
                let listing = self.catalog.listing(&manga).await?;
                listing
                    .volume_chapters(number as u32)?
                    .iter()
                    .map(|link| self.layout.unit_dir(&manga, link.unit()))
                    .collect()
            }
            (UnitKind::Volume, Selector::Range { range }) => {
                let listing = self.catalog.listing(&manga).await?;
                let mut sources = Vec::new();
                for volume in range.whole_numbers() {
                    sources.extend(
                        listing
                            .volume_chapters(volume)?
                            .iter()
                            .map(|link| self.layout.unit_dir(&manga, link.unit())),
                    );
                }
                sources
            }
        };

        let output = self.layout.archive_path(&manga, kind, &resolved.label());
        let existing = self.existing_sources(&sources).await;
        if existing.is_empty() {
            return Err(ArchiveError::NoSources {
                output,
                requested: sources.len(),
            }
            .into());
        }

        let result = self.build_archive(&existing, &output).await;
        match &result {
            Ok(archive) => self.emit_event(Event::ArchiveCreated {
                path: archive.output_path.clone(),
                size_bytes: archive.byte_size,
            }),
            Err(e) => self.emit_event(Event::ArchiveFailed {
                path: output,
                error: e.to_string(),
            }),
        }
        result
    }

    /// Archive freshly downloaded units; failures are reported, never raised
    ///
    /// Sources are removed only once the archive was written and `delete_sources` is
    /// set. Only cancellation is propagated.
    pub(crate) async fn archive_after_download(
        &self,
        sources: &[DownloadLocation],
        output: &Path,
        delete_sources: bool,
    ) -> Result<Option<ArchiveResult>> {
        match self.build_archive(sources, output).await {
            Ok(archive) => {
                self.emit_event(Event::ArchiveCreated {
                    path: archive.output_path.clone(),
                    size_bytes: archive.byte_size,
                });
                if delete_sources {
                    self.remove_sources(sources).await;
                }
                Ok(Some(archive))
            }
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(e) => {
                warn!(
                    output = %output.display(),
                    error = %e,
                    "archive could not be created, downloaded pages are kept"
                );
                self.emit_event(Event::ArchiveFailed {
                    path: output.to_path_buf(),
                    error: e.to_string(),
                });
                Ok(None)
            }
        }
    }

    async fn build_archive(
        &self,
        sources: &[DownloadLocation],
        output: &Path,
    ) -> Result<ArchiveResult> {
        step!(self, output = %output.display(), sources = sources.len(), "building archive");
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            result = self.archiver.build(sources, output) => result,
        }
    }

    async fn existing_sources(&self, sources: &[DownloadLocation]) -> Vec<DownloadLocation> {
        let mut existing = Vec::with_capacity(sources.len());
        for source in sources {
            if self.store.exists(source.path()).await {
                existing.push(source.clone());
            } else {
                warn!(location = %source, "directory does not exist, leaving it out of the archive");
            }
        }
        existing
    }

    /// Delete unit directories, continuing past failures
    async fn remove_sources(&self, sources: &[DownloadLocation]) {
        let mut removed: Vec<PathBuf> = Vec::with_capacity(sources.len());
        for source in sources {
            match self.store.remove(source.path()).await {
                Ok(()) => removed.push(source.0.clone()),
                Err(e) => warn!(location = %source, error = %e, "failed to remove directory"),
            }
        }
        if !removed.is_empty() {
            info!(count = removed.len(), "unit directories removed after archiving");
            self.emit_event(Event::SourcesRemoved { paths: removed });
        }
    }
}

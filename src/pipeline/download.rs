//! Unit downloads.
//!
//! Structural problems (options, selector, order) are raised before any renderer call.
//! A single unit already on disk is reused without touching the renderer at all.

use crate::error::{CatalogError, Error, RangeError, Result};
use crate::range::{Token, parse_token};
use crate::render::{CatalogListing, UnitLink};
use crate::types::{
    CatalogStats, DownloadLocation, DownloadOptions, Event, Range, Selector, UnitKind,
    format_number,
};
use tracing::{info, warn};

use super::Pipeline;

impl Pipeline {
    /// Download one unit or a range of units of `name`
    ///
    /// `selector` is a unit number (`10`, `1000.5`) or a range (`1-50`, `debut-fin`).
    /// Chapters are archived one by one; a volume is archived as a whole once every
    /// chapter it lists was fetched. Returns the directory of every fetched chapter,
    /// in enumeration order.
    ///
    /// # Errors
    ///
    /// - [`Error::ConflictingOptions`] when deleting sources without archiving them
    /// - [`Error::Range`] for malformed or reversed selectors
    /// - [`Error::AlreadyExists`] when a single unit is already archived and `force`
    ///   is not set
    /// - [`Error::Catalog`] when the entry, its listing or a volume does not exist
    /// - [`Error::FetchExhausted`] when a page could not be fetched within the retry budget
    ///
    /// Archive failures are reported through [`Event::ArchiveFailed`] instead.
    ///
    /// A single unit is first looked up under `name` as typed, before the catalog is
    /// asked for the canonical name, so that a unit already on disk costs no renderer
    /// call. A directory left under an alias is therefore reused as is. Once resolved,
    /// every path uses the canonical name.
    pub async fn download_unit(
        &self,
        name: &str,
        kind: UnitKind,
        selector: &str,
        options: DownloadOptions,
    ) -> Result<Vec<DownloadLocation>> {
        self.ensure_accepting()?;
        options.validate()?;
        let token = parse_token(selector)?;
        let early = Self::resolve_without_catalog(kind, token, selector)?;

        // looked up under the requested name: the canonical one costs a listing
        if let Some(Selector::Single { number }) = early {
            if let Some(found) = self.already_present(name, kind, number, options).await? {
                return Ok(found);
            }
        }

        let stats = self.resolve_canonical(name).await?;
        let manga = stats.canonical_name.clone();
        let resolved = match early {
            Some(resolved) => resolved,
            None => token.resolve_with(stats.last_of(kind))?,
        };

        match (kind, resolved) {
            (UnitKind::Chapter, Selector::Single { number }) => {
                if manga != name {
                    if let Some(found) = self.already_present(&manga, kind, number, options).await? {
                        return Ok(found);
                    }
                }
                info!(manga = %manga, chapter = number, "downloading chapter");
                let link = UnitLink::chapter(&self.config.website, &manga, number)?;
                Ok(vec![self.download_chapter(link, options).await?])
            }
            (UnitKind::Chapter, Selector::Range { range }) => {
                self.download_chapters(&manga, &range, options).await
            }
            (UnitKind::Volume, Selector::Single { number }) => {
                let volume = whole_volume(number, selector)?;
                if manga != name {
                    if let Some(found) = self.already_present(&manga, kind, number, options).await? {
                        return Ok(found);
                    }
                }
                let listing = self.catalog.listing(&manga).await?;
                self.download_volume(&manga, volume, &listing, options).await
            }
            (UnitKind::Volume, Selector::Range { range }) => {
                self.download_volumes(&stats, &range, options).await
            }
        }
    }

    /// Resolve a token that needs no catalog totals, validating volume numbers too
    pub(crate) fn resolve_without_catalog(
        kind: UnitKind,
        token: Token,
        selector: &str,
    ) -> Result<Option<Selector>> {
        if token.needs_totals() {
            return Ok(None);
        }
        // no `fin` bound: the totals are never read
        let resolved = token.resolve_with(f64::NAN)?;
        if let (UnitKind::Volume, Selector::Single { number }) = (kind, resolved) {
            whole_volume(number, selector)?;
        }
        Ok(Some(resolved))
    }

    /// Existing single unit, reused without any renderer call
    ///
    /// A chapter directory on disk is returned as is (and archived if its archive is
    /// missing). An archive on disk without its sources is [`Error::AlreadyExists`].
    /// `manga` is used verbatim; it is not resolved here.
    async fn already_present(
        &self,
        manga: &str,
        kind: UnitKind,
        number: f64,
        options: DownloadOptions,
    ) -> Result<Option<Vec<DownloadLocation>>> {
        if options.force {
            return Ok(None);
        }
        let label = format_number(number);
        let archive = self.layout.archive_path(manga, kind, &label);

        if kind == UnitKind::Chapter {
            let location = self.layout.unit_dir(manga, &label);
            if self.store.exists(location.path()).await {
                info!(manga, chapter = %label, location = %location, "chapter already downloaded, skipping");
                self.emit_event(Event::UnitSkipped {
                    manga: manga.to_string(),
                    unit: label,
                    location: location.0.clone(),
                });
                if options.compress && !self.store.exists(&archive).await {
                    self.archive_after_download(
                        std::slice::from_ref(&location),
                        &archive,
                        options.delete_after_archive,
                    )
                    .await?;
                }
                return Ok(Some(vec![location]));
            }
        }

        if self.store.exists(&archive).await {
            return Err(Error::AlreadyExists {
                what: format!("{kind} {label} archive"),
                path: archive,
            });
        }
        Ok(None)
    }

    /// Fetch one chapter and archive it on its own
    async fn download_chapter(
        &self,
        link: UnitLink,
        options: DownloadOptions,
    ) -> Result<DownloadLocation> {
        let report = self.fetch_unit(&link, options.force).await?;
        if options.compress {
            let archive =
                self.layout
                    .archive_path(link.manga(), UnitKind::Chapter, link.unit());
            if report.skipped && self.store.exists(&archive).await {
                return Ok(report.location);
            }
            self.archive_after_download(
                std::slice::from_ref(&report.location),
                &archive,
                options.delete_after_archive,
            )
            .await?;
        }
        Ok(report.location)
    }

    async fn download_chapters(
        &self,
        manga: &str,
        range: &Range,
        options: DownloadOptions,
    ) -> Result<Vec<DownloadLocation>> {
        info!(manga, range = %range.label(), "downloading chapters");
        let links = self.catalog.chapters_in(manga, range).await?;
        if links.is_empty() {
            warn!(manga, range = %range.label(), "no chapter of the listing falls in range");
            return Ok(Vec::new());
        }
        let units: Vec<&str> = links.iter().map(UnitLink::unit).collect();
        step!(self, manga, units = ?units, "chapters to download");

        self.schedule(links, |link| self.download_chapter(link, options))
            .await
    }

    /// Fetch every chapter of one volume, then archive them together
    async fn download_volume(
        &self,
        manga: &str,
        volume: u32,
        listing: &CatalogListing,
        options: DownloadOptions,
    ) -> Result<Vec<DownloadLocation>> {
        info!(manga, volume, "downloading volume");
        let links = listing.volume_chapters(volume)?;
        step!(self, manga, volume, chapters = links.len(), "volume chapters listed");

        let locations = self
            .schedule(links, |link| async move {
                Ok::<_, Error>(self.fetch_unit(&link, options.force).await?.location)
            })
            .await?;

        if options.compress {
            let archive = self
                .layout
                .archive_path(manga, UnitKind::Volume, &volume.to_string());
            self.archive_after_download(&locations, &archive, options.delete_after_archive)
                .await?;
        }
        Ok(locations)
    }

    async fn download_volumes(
        &self,
        stats: &CatalogStats,
        range: &Range,
        options: DownloadOptions,
    ) -> Result<Vec<DownloadLocation>> {
        let manga = stats.canonical_name.as_str();
        let wanted = range.whole_numbers();
        // bounds are checked before collecting: the range may span all of u32
        if !wanted.is_empty() {
            let out_of_range = if *wanted.start() == 0 {
                Some(0)
            } else if *wanted.end() > stats.volume_count {
                Some((*wanted.start()).max(stats.volume_count.saturating_add(1)))
            } else {
                None
            };
            if let Some(volume) = out_of_range {
                return Err(CatalogError::VolumeOutOfRange {
                    name: manga.to_string(),
                    volume,
                    volume_count: stats.volume_count,
                }
                .into());
            }
        }
        let volumes: Vec<u32> = wanted.collect();
        if volumes.is_empty() {
            warn!(manga, range = %range.label(), "no whole volume number in range");
            return Ok(Vec::new());
        }

        info!(manga, range = %range.label(), "downloading volumes");
        let listing = self.catalog.listing(manga).await?;
        let total = volumes.len();
        let mut locations = Vec::new();

        for (index, volume) in volumes.into_iter().enumerate() {
            let archive = self
                .layout
                .archive_path(manga, UnitKind::Volume, &volume.to_string());
            if !options.force && self.store.exists(&archive).await {
                info!(manga, volume, archive = %archive.display(), "volume already archived, skipping");
            } else {
                locations.extend(self.download_volume(manga, volume, &listing, options).await?);
            }
            self.emit_event(Event::VolumeProgress {
                manga: manga.to_string(),
                volume,
                current: index + 1,
                total,
            });
        }
        Ok(locations)
    }
}

/// Volumes are whole, positive numbers
fn whole_volume(number: f64, selector: &str) -> Result<u32> {
    if number < 1.0 || number.fract() != 0.0 || number > f64::from(u32::MAX) {
        return Err(RangeError::Parse {
            bound: selector.to_string(),
        }
        .into());
    }
    Ok(number as u32)
}

//! Fetching every page of one unit.

use crate::error::{Error, Result};
use crate::render::{PageFetch, UnitLink};
use crate::types::{Event, UnitReport};
use tracing::{info, warn};

use super::Pipeline;

impl Pipeline {
    /// Fetch and persist every page of the unit behind `link`
    ///
    /// An existing unit directory short-circuits the fetch unless `force` is set. Pages
    /// the renderer classifies as not found are recorded and skipped; the unit still
    /// completes. Transport failures that outlive the retry budget abort the unit with
    /// [`Error::FetchExhausted`], leaving already persisted pages on disk.
    pub(crate) async fn fetch_unit(&self, link: &UnitLink, force: bool) -> Result<UnitReport> {
        let manga = link.manga();
        let unit = link.unit();
        let location = self.layout.unit_dir(manga, unit);

        if !force && self.store.exists(location.path()).await {
            info!(manga, unit, location = %location, "unit already downloaded, skipping");
            self.emit_event(Event::UnitSkipped {
                manga: manga.to_string(),
                unit: unit.to_string(),
                location: location.0.clone(),
            });
            return Ok(UnitReport {
                location,
                pages: 0,
                missing_pages: Vec::new(),
                skipped: true,
            });
        }

        step!(self, manga, unit, link = %link, "fetching page count");
        let total = self.navigator.probe_unit(link).await?.page_count;
        self.store.ensure_dir(location.path()).await?;

        self.emit_event(Event::PageProgress {
            manga: manga.to_string(),
            unit: unit.to_string(),
            current: 0,
            total,
        });

        let mut missing_pages = Vec::new();
        for page in 1..=total {
            step!(self, manga, unit, page, total, "downloading page");
            match self.navigator.fetch_page(link, page).await? {
                PageFetch::Image(bytes) => {
                    let path = self.layout.page_path(manga, unit, page);
                    self.store.write_page(&path, &bytes).await?;
                }
                PageFetch::NotFound => {
                    let unavailable = Error::PageUnavailable {
                        link: link.page_url(page),
                        page,
                    };
                    warn!(error = %unavailable, "page skipped");
                    missing_pages.push(page);
                }
            }
            self.emit_event(Event::PageProgress {
                manga: manga.to_string(),
                unit: unit.to_string(),
                current: page,
                total,
            });
        }

        if !missing_pages.is_empty() {
            let links: Vec<String> = missing_pages.iter().map(|p| link.page_url(*p)).collect();
            warn!(
                manga,
                unit,
                missing = missing_pages.len(),
                links = ?links,
                "some pages could not be downloaded, they may have no image"
            );
        }

        info!(manga, unit, pages = total, location = %location, "unit downloaded");
        self.emit_event(Event::UnitComplete {
            manga: manga.to_string(),
            unit: unit.to_string(),
            location: location.0.clone(),
            missing_pages: missing_pages.clone(),
        });

        Ok(UnitReport {
            location,
            pages: total,
            missing_pages,
            skipped: false,
        })
    }
}

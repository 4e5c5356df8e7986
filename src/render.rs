//! Content renderer contract and catalog links
//!
//! The renderer is the browser-backed collaborator that turns links into page counts,
//! page images and unit listings. The pipeline never talks to the network itself; it
//! goes through a [`ContentRenderer`] wrapped in a [`Navigator`], which applies the
//! navigation timeout, bounded retry and cancellation to every call.

use crate::config::{Config, RetryConfig};
use crate::error::{CatalogError, Error, Result};
use crate::retry::navigate;
use crate::types::{CatalogStats, Range, format_number};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Path segment under which units are read online
const READER_SEGMENT: &str = "lecture-en-ligne";
/// Path segment under which catalog entries live
const CATALOG_SEGMENT: &str = "manga";
/// Marker of volume-only links inside a chapter listing
const VOLUME_MARKER: &str = "volume-";

/// Link to a catalog entry: `<website>/manga/<name>/`
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogLink {
    url: String,
    name: String,
}

impl CatalogLink {
    /// Build the catalog link of `name` under `website`
    pub fn new(website: &str, name: &str) -> Result<Self> {
        let url = build_url(website, &[CATALOG_SEGMENT, name])?;
        Ok(Self {
            url,
            name: name.to_string(),
        })
    }

    /// Parse a catalog link, typically the location the catalog page resolved to
    pub fn parse(link: &str) -> Result<Self> {
        let name = segment(link, CATALOG_SEGMENT, 1)?;
        Ok(Self {
            url: link.to_string(),
            name,
        })
    }

    /// Full URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Entry name carried by the link
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for CatalogLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Link to one unit: `<website>/lecture-en-ligne/<manga>/<unit>/`
///
/// The unit segment is a chapter number (`10`, `1000.5`) or, for volume-only
/// releases, `volume-<n>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitLink {
    url: String,
    manga: String,
    unit: String,
}

impl UnitLink {
    /// Build the link of chapter `number` of `manga`
    ///
    /// # Examples
    ///
    /// ```
    /// use japdl::render::UnitLink;
    ///
    /// let link = UnitLink::chapter("https://www.japscan.ws", "one-piece", 1000.5).unwrap();
    /// assert_eq!(link.url(), "https://www.japscan.ws/lecture-en-ligne/one-piece/1000.5/");
    /// assert_eq!(link.page_url(3), "https://www.japscan.ws/lecture-en-ligne/one-piece/1000.5/3.html");
    /// ```
    pub fn chapter(website: &str, manga: &str, number: f64) -> Result<Self> {
        let unit = format_number(number);
        let url = build_url(website, &[READER_SEGMENT, manga, &unit])?;
        Ok(Self {
            url,
            manga: manga.to_string(),
            unit,
        })
    }

    /// Parse a unit link found in a listing
    pub fn parse(link: &str) -> Result<Self> {
        let manga = segment(link, READER_SEGMENT, 1)?;
        let unit = segment(link, READER_SEGMENT, 2)?;
        Ok(Self {
            url: link.to_string(),
            manga,
            unit,
        })
    }

    /// Full URL, always ending with `/`
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Series name carried by the link
    pub fn manga(&self) -> &str {
        &self.manga
    }

    /// Unit segment, also used as the unit's directory name
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Link of the 1-based page `page`
    pub fn page_url(&self, page: u32) -> String {
        if self.url.ends_with('/') {
            format!("{}{page}.html", self.url)
        } else {
            format!("{}/{page}.html", self.url)
        }
    }

    /// Whether the link points at a volume-only release rather than a chapter
    pub fn is_volume_only(&self) -> bool {
        self.unit.contains(VOLUME_MARKER)
    }

    /// Chapter number of the link, if its segment is numeric
    pub fn chapter_number(&self) -> Option<f64> {
        if self.is_volume_only() {
            return None;
        }
        self.unit.parse::<f64>().ok().filter(|n| n.is_finite())
    }
}

impl fmt::Display for UnitLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Build `<website>/<segments...>/` with every segment percent-encoded
fn build_url(website: &str, segments: &[&str]) -> Result<String> {
    let invalid = |reason: String| Error::InvalidLink {
        link: website.to_string(),
        reason,
    };
    let mut url = Url::parse(website).map_err(|e| invalid(e.to_string()))?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| invalid("website cannot be a base URL".to_string()))?;
        path.pop_if_empty();
        for segment in segments {
            if segment.is_empty() {
                return Err(invalid("empty path segment".to_string()));
            }
            path.push(segment);
        }
        // trailing slash
        path.push("");
    }
    Ok(url.to_string())
}

/// Decoded path segment found `offset` segments after `anchor`
fn segment(link: &str, anchor: &str, offset: usize) -> Result<String> {
    let invalid = |reason: &str| Error::InvalidLink {
        link: link.to_string(),
        reason: reason.to_string(),
    };
    let url = Url::parse(link).map_err(|e| invalid(&e.to_string()))?;
    let segments: Vec<&str> = url
        .path_segments()
        .ok_or_else(|| invalid("link has no path"))?
        .collect();
    let anchor_at = segments
        .iter()
        .position(|s| *s == anchor)
        .ok_or_else(|| invalid("unexpected link layout"))?;
    let raw = segments
        .get(anchor_at + offset)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| invalid("missing path segment"))?;
    let decoded = urlencoding::decode(raw).map_err(|e| invalid(&e.to_string()))?;
    Ok(decoded.into_owned())
}

/// One grouping of the unit listing, usually a volume
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingGroup {
    /// Heading shown by the catalog ("Volume 2", ...)
    pub title: String,
    /// Unit links, newest first
    pub links: Vec<UnitLink>,
}

/// Unit listing of a catalog entry, newest group first
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogListing {
    /// Catalog link the entry resolved to; carries the canonical name
    pub location: CatalogLink,
    /// Volume groupings, newest first
    pub groups: Vec<ListingGroup>,
}

impl CatalogListing {
    /// Name the catalog itself uses for the entry
    pub fn canonical_name(&self) -> &str {
        self.location.name()
    }

    /// Totals of the listing
    ///
    /// The last chapter number is the highest chapter number of the newest group.
    pub fn stats(&self) -> Result<CatalogStats> {
        let newest = self
            .groups
            .first()
            .filter(|g| !g.links.is_empty())
            .ok_or_else(|| CatalogError::NotFound {
                name: self.canonical_name().to_string(),
            })?;
        let last_chapter_number = newest
            .links
            .iter()
            .filter_map(UnitLink::chapter_number)
            .fold(0.0_f64, f64::max);

        Ok(CatalogStats {
            canonical_name: self.canonical_name().to_string(),
            volume_count: u32::try_from(self.groups.len()).unwrap_or(u32::MAX),
            last_chapter_number,
        })
    }

    /// Chapter links of volume `volume` in chronological order
    pub fn volume_chapters(&self, volume: u32) -> Result<Vec<UnitLink>> {
        let volume_count = u32::try_from(self.groups.len()).unwrap_or(u32::MAX);
        if volume == 0 || volume > volume_count {
            return Err(CatalogError::VolumeOutOfRange {
                name: self.canonical_name().to_string(),
                volume,
                volume_count,
            }
            .into());
        }
        // groups are newest first: volume 1 is the last group
        let group = &self.groups[self.groups.len() - volume as usize];
        Ok(group.links.iter().rev().cloned().collect())
    }

    /// Chapter links inside `range`, chronological, volume-only links excluded
    pub fn chapters_in(&self, range: &Range) -> Vec<UnitLink> {
        let mut links: Vec<UnitLink> = self
            .groups
            .iter()
            .flat_map(|g| g.links.iter())
            .filter(|l| l.chapter_number().is_some_and(|n| range.contains(n)))
            .cloned()
            .collect();
        links.reverse();
        links
    }
}

/// Result of probing a unit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitProbe {
    /// Number of pages in the unit
    pub page_count: u32,
}

/// Result of fetching one page
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageFetch {
    /// Raster image of the page
    Image(Vec<u8>),
    /// The page exists in the unit but carries no content
    NotFound,
}

/// Browser-backed collaborator rendering catalog and unit pages
///
/// Implementations report transient failures (timeouts, resets) as
/// [`Error::Navigation`], which the [`Navigator`] retries; any other error is final.
#[async_trait]
pub trait ContentRenderer: Send + Sync {
    /// Read the unit listing of a catalog entry
    ///
    /// Returns [`CatalogError::NotFound`] when the entry does not exist and
    /// [`CatalogError::ListUnavailable`] when its listing cannot be read.
    async fn list_units(&self, catalog: &CatalogLink) -> Result<CatalogListing>;

    /// Totals of a catalog entry, derived from its listing unless overridden
    async fn probe_catalog(&self, catalog: &CatalogLink) -> Result<CatalogStats> {
        self.list_units(catalog).await?.stats()
    }

    /// Page count of a unit
    async fn probe_unit(&self, link: &UnitLink) -> Result<UnitProbe>;

    /// Raster image of the 1-based page `page` of a unit
    async fn fetch_page(&self, link: &UnitLink, page: u32) -> Result<PageFetch>;

    /// Signal fired when the underlying session disconnects
    fn disconnected(&self) -> Option<CancellationToken> {
        None
    }

    /// Close every outstanding page context
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// A [`ContentRenderer`] guarded by timeout, bounded retry and cancellation
#[derive(Clone)]
pub struct Navigator {
    renderer: Arc<dyn ContentRenderer>,
    retry: RetryConfig,
    timeout: Duration,
    cancel: CancellationToken,
}

impl Navigator {
    /// Wrap a renderer with the policy of `config`
    pub fn new(
        renderer: Arc<dyn ContentRenderer>,
        config: &Config,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            renderer,
            retry: config.retry.clone(),
            timeout: config.navigation_timeout,
            cancel,
        }
    }

    /// The wrapped renderer
    pub fn renderer(&self) -> &Arc<dyn ContentRenderer> {
        &self.renderer
    }

    /// Guarded [`ContentRenderer::list_units`]
    pub async fn list_units(&self, catalog: &CatalogLink) -> Result<CatalogListing> {
        navigate(
            &self.retry,
            self.timeout,
            &self.cancel,
            &format!("listing of {catalog}"),
            || self.renderer.list_units(catalog),
        )
        .await
    }

    /// Guarded [`ContentRenderer::probe_catalog`]
    pub async fn probe_catalog(&self, catalog: &CatalogLink) -> Result<CatalogStats> {
        navigate(
            &self.retry,
            self.timeout,
            &self.cancel,
            &format!("totals of {catalog}"),
            || self.renderer.probe_catalog(catalog),
        )
        .await
    }

    /// Guarded [`ContentRenderer::probe_unit`]
    pub async fn probe_unit(&self, link: &UnitLink) -> Result<UnitProbe> {
        navigate(
            &self.retry,
            self.timeout,
            &self.cancel,
            &format!("page count of {link}"),
            || self.renderer.probe_unit(link),
        )
        .await
    }

    /// Guarded [`ContentRenderer::fetch_page`]
    pub async fn fetch_page(&self, link: &UnitLink, page: u32) -> Result<PageFetch> {
        navigate(
            &self.retry,
            self.timeout,
            &self.cancel,
            &link.page_url(page),
            || self.renderer.fetch_page(link, page),
        )
        .await
    }
}

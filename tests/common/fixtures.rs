//! In-memory catalog site used as the renderer in integration tests

use async_trait::async_trait;
use japdl::render::ListingGroup;
use japdl::{
    CatalogError, CatalogLink, CatalogListing, ContentRenderer, PageFetch, Result, UnitLink,
    UnitProbe,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio_util::sync::CancellationToken;

/// Website every fixture link points at
pub const SITE: &str = "https://www.japscan.ws";

/// A catalog site serving generated pages
///
/// Each entry is a list of volumes, oldest first, each volume listing its chapter
/// segments in chronological order. Page `i` of chapter `c` of `m` is the bytes
/// `"m/c/i"`.
pub struct SiteRenderer {
    entries: HashMap<String, Vec<Vec<String>>>,
    aliases: HashMap<String, String>,
    pages_per_unit: u32,
    disconnect: CancellationToken,
    pub page_fetches: AtomicU32,
    pub closed: AtomicBool,
}

impl SiteRenderer {
    pub fn new(pages_per_unit: u32) -> Self {
        Self {
            entries: HashMap::new(),
            aliases: HashMap::new(),
            pages_per_unit,
            disconnect: CancellationToken::new(),
            page_fetches: AtomicU32::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Add an entry whose volume `v` holds `volumes[v - 1]`
    pub fn with_series(mut self, name: &str, volumes: &[&[&str]]) -> Self {
        let volumes = volumes
            .iter()
            .map(|units| units.iter().map(|u| u.to_string()).collect())
            .collect();
        self.entries.insert(name.to_string(), volumes);
        self
    }

    pub fn with_alias(mut self, alias: &str, canonical: &str) -> Self {
        self.aliases.insert(alias.to_string(), canonical.to_string());
        self
    }

    pub fn disconnect(&self) {
        self.disconnect.cancel();
    }
}

/// Page payload the site serves for page `page` of `unit`
pub fn page_bytes(manga: &str, unit: &str, page: u32) -> Vec<u8> {
    format!("{manga}/{unit}/{page}").into_bytes()
}

/// Chapter segments `first..=last` as owned strings
pub fn chapters(first: u32, last: u32) -> Vec<String> {
    (first..=last).map(|n| n.to_string()).collect()
}

/// `demo-series`: volume 1 holds chapters 1-25, volume 2 holds 26-50, 3 pages each
pub fn demo_site() -> SiteRenderer {
    let first = chapters(1, 25);
    let second = chapters(26, 50);
    let first: Vec<&str> = first.iter().map(String::as_str).collect();
    let second: Vec<&str> = second.iter().map(String::as_str).collect();
    SiteRenderer::new(3).with_series("demo-series", &[&first, &second])
}

#[async_trait]
impl ContentRenderer for SiteRenderer {
    async fn list_units(&self, catalog: &CatalogLink) -> Result<CatalogListing> {
        let name = self
            .aliases
            .get(catalog.name())
            .cloned()
            .unwrap_or_else(|| catalog.name().to_string());
        let volumes = self
            .entries
            .get(&name)
            .ok_or_else(|| CatalogError::NotFound {
                name: catalog.name().to_string(),
            })?;

        let mut groups = Vec::new();
        for (index, units) in volumes.iter().enumerate().rev() {
            let links = units
                .iter()
                .rev()
                .map(|unit| UnitLink::parse(&format!("{SITE}/lecture-en-ligne/{name}/{unit}/")))
                .collect::<Result<Vec<_>>>()?;
            groups.push(ListingGroup {
                title: format!("Volume {}", index + 1),
                links,
            });
        }
        Ok(CatalogListing {
            location: CatalogLink::new(SITE, &name)?,
            groups,
        })
    }

    async fn probe_unit(&self, link: &UnitLink) -> Result<UnitProbe> {
        let listed = self
            .entries
            .get(link.manga())
            .is_some_and(|volumes| volumes.iter().flatten().any(|u| u == link.unit()));
        if !listed {
            return Err(CatalogError::UnitNotFound {
                link: link.url().to_string(),
            }
            .into());
        }
        Ok(UnitProbe {
            page_count: self.pages_per_unit,
        })
    }

    async fn fetch_page(&self, link: &UnitLink, page: u32) -> Result<PageFetch> {
        self.page_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(PageFetch::Image(page_bytes(link.manga(), link.unit(), page)))
    }

    fn disconnected(&self) -> Option<CancellationToken> {
        Some(self.disconnect.clone())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

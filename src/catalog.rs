//! Catalog resolution
//!
//! Resolves a user-supplied name to the catalog's canonical name and totals, and
//! enumerates the unit links of volumes and chapter ranges. Every renderer call goes
//! through the [`Navigator`], so lookups share the pipeline's retry and cancellation.

use crate::error::Result;
use crate::render::{CatalogLink, CatalogListing, Navigator, UnitLink};
use crate::types::{CatalogEntry, CatalogStats, Range};
use tracing::debug;

/// Name to canonical-name and totals resolution
#[derive(Clone)]
pub struct CatalogResolver {
    navigator: Navigator,
    website: String,
}

impl CatalogResolver {
    /// Resolver querying catalog entries of `website`
    pub fn new(navigator: Navigator, website: impl Into<String>) -> Self {
        Self {
            navigator,
            website: website.into(),
        }
    }

    /// Catalog link of `name`
    pub fn catalog_link(&self, name: &str) -> Result<CatalogLink> {
        CatalogLink::new(&self.website, name)
    }

    /// Canonical name and totals of `name`
    pub async fn resolve(&self, name: &str) -> Result<CatalogStats> {
        let catalog = self.catalog_link(name)?;
        let stats = self.navigator.probe_catalog(&catalog).await?;
        debug!(
            requested = name,
            canonical = %stats.canonical_name,
            volumes = stats.volume_count,
            last_chapter = stats.last_chapter_number,
            "catalog entry resolved"
        );
        Ok(stats)
    }

    /// Requested name paired with its canonical name
    pub async fn entry(&self, name: &str) -> Result<CatalogEntry> {
        let stats = self.resolve(name).await?;
        Ok(CatalogEntry {
            requested_name: name.to_string(),
            canonical_name: stats.canonical_name,
        })
    }

    /// Full unit listing of `name`
    pub async fn listing(&self, name: &str) -> Result<CatalogListing> {
        let catalog = self.catalog_link(name)?;
        self.navigator.list_units(&catalog).await
    }

    /// Chapter links of one volume, chronological
    pub async fn volume_chapters(&self, name: &str, volume: u32) -> Result<Vec<UnitLink>> {
        self.listing(name).await?.volume_chapters(volume)
    }

    /// Chapter links inside `range`, chronological
    pub async fn chapters_in(&self, name: &str, range: &Range) -> Result<Vec<UnitLink>> {
        let links = self.listing(name).await?.chapters_in(range);
        debug!(
            manga = name,
            range = %range.label(),
            count = links.len(),
            "chapters enumerated"
        );
        Ok(links)
    }
}

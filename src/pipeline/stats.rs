//! Catalog totals.

use crate::error::Result;
use crate::types::{CatalogStats, Event};
use tracing::info;

use super::Pipeline;

impl Pipeline {
    /// Canonical name, volume count and last chapter number of a catalog entry
    pub async fn fetch_stats(&self, name: &str) -> Result<CatalogStats> {
        self.ensure_accepting()?;
        step!(self, manga = name, "fetching catalog totals");
        self.catalog.resolve(name).await
    }

    /// Resolve `name`, announcing a canonical name that differs from it
    pub(crate) async fn resolve_canonical(&self, name: &str) -> Result<CatalogStats> {
        let stats = self.catalog.resolve(name).await?;
        if stats.canonical_name != name {
            info!(
                requested = name,
                canonical = %stats.canonical_name,
                "entry is known under another name, using the catalog's name"
            );
            self.emit_event(Event::NameResolved {
                requested: name.to_string(),
                canonical: stats.canonical_name.clone(),
            });
        }
        Ok(stats)
    }
}

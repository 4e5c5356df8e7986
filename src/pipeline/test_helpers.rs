//! Shared test helpers: an in-memory renderer and pipeline constructors.

use crate::archive::Archiver;
use crate::config::{Config, RetryConfig};
use crate::error::{CatalogError, Error, Result};
use crate::pipeline::Pipeline;
use crate::render::{
    CatalogLink, CatalogListing, ContentRenderer, ListingGroup, PageFetch, UnitLink, UnitProbe,
};
use crate::storage::FsAssetStore;
use crate::types::{ArchiveResult, DownloadLocation, Event};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

pub(crate) const SITE: &str = "https://www.japscan.ws";

/// Renderer serving fixture catalog entries from memory
///
/// Units are keyed by their segment (`"10"`), so one fixture should not list the
/// same segment under two entries.
pub(crate) struct FixtureRenderer {
    entries: HashMap<String, Vec<Vec<String>>>,
    aliases: HashMap<String, String>,
    unreadable: HashSet<String>,
    pages_per_unit: u32,
    missing_pages: HashSet<(String, u32)>,
    flaky_pages: Mutex<HashMap<(String, u32), u32>>,
    broken_pages: HashSet<(String, u32)>,
    delays: HashMap<String, Duration>,
    disconnect: CancellationToken,
    in_flight: AtomicU32,
    pub(crate) max_in_flight: AtomicU32,
    pub(crate) listings: AtomicU32,
    pub(crate) probes: AtomicU32,
    pub(crate) fetches: AtomicU32,
    pub(crate) completed: Mutex<Vec<String>>,
    pub(crate) closed: AtomicBool,
}

impl FixtureRenderer {
    pub(crate) fn new(pages_per_unit: u32) -> Self {
        Self {
            entries: HashMap::new(),
            aliases: HashMap::new(),
            unreadable: HashSet::new(),
            pages_per_unit,
            missing_pages: HashSet::new(),
            flaky_pages: Mutex::new(HashMap::new()),
            broken_pages: HashSet::new(),
            delays: HashMap::new(),
            disconnect: CancellationToken::new(),
            in_flight: AtomicU32::new(0),
            max_in_flight: AtomicU32::new(0),
            listings: AtomicU32::new(0),
            probes: AtomicU32::new(0),
            fetches: AtomicU32::new(0),
            completed: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Add an entry; `groups` are newest first, units newest first within a group
    pub(crate) fn with_entry(mut self, name: &str, groups: Vec<Vec<String>>) -> Self {
        self.entries.insert(name.to_string(), groups);
        self
    }

    pub(crate) fn with_alias(mut self, alias: &str, canonical: &str) -> Self {
        self.aliases.insert(alias.to_string(), canonical.to_string());
        self
    }

    pub(crate) fn with_unreadable_listing(mut self, name: &str) -> Self {
        self.unreadable.insert(name.to_string());
        self
    }

    pub(crate) fn with_missing_page(mut self, unit: &str, page: u32) -> Self {
        self.missing_pages.insert((unit.to_string(), page));
        self
    }

    /// Fail `page` with a navigation error `failures` times before serving it
    pub(crate) fn with_flaky_page(self, unit: &str, page: u32, failures: u32) -> Self {
        if let Ok(mut flaky) = self.flaky_pages.lock() {
            flaky.insert((unit.to_string(), page), failures);
        }
        self
    }

    /// Fail `page` with a navigation error forever
    pub(crate) fn with_broken_page(mut self, unit: &str, page: u32) -> Self {
        self.broken_pages.insert((unit.to_string(), page));
        self
    }

    /// Delay the probe of `unit`
    pub(crate) fn with_delay(mut self, unit: &str, delay: Duration) -> Self {
        self.delays.insert(unit.to_string(), delay);
        self
    }

    pub(crate) fn disconnect(&self) {
        self.disconnect.cancel();
    }

    /// Renderer calls of any kind
    pub(crate) fn total_calls(&self) -> u32 {
        self.listings.load(Ordering::SeqCst)
            + self.probes.load(Ordering::SeqCst)
            + self.fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn completed(&self) -> Vec<String> {
        self.completed.lock().map(|c| c.clone()).unwrap_or_default()
    }


    fn canonical(&self, name: &str) -> String {
        self.aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    fn mark_completed(&self, unit: &str) {
        if let Ok(mut completed) = self.completed.lock() {
            completed.push(unit.to_string());
        }
    }

    fn navigation_error(link: &UnitLink, page: u32) -> Error {
        Error::Navigation {
            link: link.page_url(page),
            reason: "net::ERR_CONNECTION_RESET".to_string(),
        }
    }
}

#[async_trait]
impl ContentRenderer for FixtureRenderer {
    async fn list_units(&self, catalog: &CatalogLink) -> Result<CatalogListing> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        let canonical = self.canonical(catalog.name());
        if self.unreadable.contains(&canonical) {
            return Err(CatalogError::ListUnavailable {
                name: catalog.name().to_string(),
            }
            .into());
        }
        let groups = self
            .entries
            .get(&canonical)
            .ok_or_else(|| CatalogError::NotFound {
                name: catalog.name().to_string(),
            })?;

        let mut listing = CatalogListing {
            location: CatalogLink::new(SITE, &canonical)?,
            groups: Vec::with_capacity(groups.len()),
        };
        for (index, units) in groups.iter().enumerate() {
            let mut links = Vec::with_capacity(units.len());
            for unit in units {
                links.push(UnitLink::parse(&format!(
                    "{SITE}/lecture-en-ligne/{canonical}/{unit}/"
                ))?);
            }
            listing.groups.push(ListingGroup {
                title: format!("Volume {}", groups.len() - index),
                links,
            });
        }
        Ok(listing)
    }

    async fn probe_unit(&self, link: &UnitLink) -> Result<UnitProbe> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let listed = self
            .entries
            .get(link.manga())
            .is_some_and(|groups| groups.iter().flatten().any(|u| u == link.unit()));
        if !listed {
            return Err(CatalogError::UnitNotFound {
                link: link.url().to_string(),
            }
            .into());
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(link.unit()) {
            tokio::time::sleep(*delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let page_count = self.pages_per_unit;
        if page_count == 0 {
            self.mark_completed(link.unit());
        }
        Ok(UnitProbe { page_count })
    }

    async fn fetch_page(&self, link: &UnitLink, page: u32) -> Result<PageFetch> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let key = (link.unit().to_string(), page);

        if self.broken_pages.contains(&key) {
            return Err(Self::navigation_error(link, page));
        }
        let flaky = match self.flaky_pages.lock() {
            Ok(mut flaky) => match flaky.get_mut(&key) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            },
            Err(_) => false,
        };
        if flaky {
            return Err(Self::navigation_error(link, page));
        }

        if page == self.pages_per_unit {
            self.mark_completed(link.unit());
        }
        if self.missing_pages.contains(&key) {
            return Ok(PageFetch::NotFound);
        }
        Ok(PageFetch::Image(
            format!("{}:{}:{page}", link.manga(), link.unit()).into_bytes(),
        ))
    }

    fn disconnected(&self) -> Option<CancellationToken> {
        Some(self.disconnect.clone())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Unit segments `first..=last`, newest first
pub(crate) fn units(first: u32, last: u32) -> Vec<String> {
    (first..=last).rev().map(|n| n.to_string()).collect()
}

/// `demo-series`: volume 1 lists chapters 1-25, volume 2 lists 26-50, 3 pages each
pub(crate) fn demo_renderer() -> FixtureRenderer {
    FixtureRenderer::new(3).with_entry("demo-series", vec![units(26, 50), units(1, 25)])
}

/// `mini`: volume 1 lists chapters 1-3, volume 2 lists 4-5, 2 pages each
pub(crate) fn mini_renderer() -> FixtureRenderer {
    FixtureRenderer::new(2).with_entry("mini", vec![units(4, 5), units(1, 3)])
}

/// Configuration writing under `root` with a near-instant retry policy
pub(crate) fn test_config(root: &Path) -> Config {
    Config {
        output_dir: root.join("manga"),
        website: SITE.to_string(),
        navigation_timeout: Duration::from_secs(5),
        retry: RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            jitter: false,
        },
        ..Config::default()
    }
}

/// Pipeline over `renderer` writing into a fresh temp dir (which must be kept alive)
pub(crate) fn create_test_pipeline(
    renderer: Arc<FixtureRenderer>,
    fast: bool,
) -> (Pipeline, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    config.fast = fast;
    let pipeline = Pipeline::new(config, renderer).unwrap();
    (pipeline, temp_dir)
}

/// Pipeline whose archiver always fails
pub(crate) fn create_pipeline_with_failing_archiver(
    renderer: Arc<FixtureRenderer>,
) -> (Pipeline, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::with_capabilities(
        test_config(temp_dir.path()),
        renderer,
        Arc::new(FsAssetStore),
        Arc::new(FailingArchiver),
    )
    .unwrap();
    (pipeline, temp_dir)
}

pub(crate) struct FailingArchiver;

#[async_trait]
impl Archiver for FailingArchiver {
    async fn build(&self, _sources: &[DownloadLocation], output: &Path) -> Result<ArchiveResult> {
        Err(crate::error::ArchiveError::Write {
            output: output.to_path_buf(),
            reason: "disk full".to_string(),
        }
        .into())
    }
}

/// Every event currently buffered in `rx`
pub(crate) fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

//! Acquisition pipeline split into focused submodules.
//!
//! The [`Pipeline`] struct composes the injected capabilities and its methods are
//! organized by operation:
//! - [`stats`] - Catalog totals (`fetch_stats`)
//! - [`download`] - Unit downloads (`download_unit`)
//! - [`archiving`] - Archiving of already persisted units (`archive_unit`)
//! - [`unit`] - Fetching every page of one unit
//! - [`schedule`] - Sequential and bounded fast scheduling of unit fetches
//! - [`lifecycle`] - Admission control and shutdown

use crate::archive::{Archiver, ZipArchiver};
use crate::catalog::CatalogResolver;
use crate::config::Config;
use crate::error::Result;
use crate::render::{ContentRenderer, Navigator};
use crate::storage::{AssetStore, FsAssetStore, Layout};
use crate::types::Event;
use futures::Stream;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;

/// Log a pipeline step at `info` when verbose, `debug` otherwise
macro_rules! step {
    ($pipeline:expr, $($arg:tt)+) => {
        if $pipeline.config.verbose {
            tracing::info!($($arg)+)
        } else {
            tracing::debug!($($arg)+)
        }
    };
}

mod archiving;
mod download;
mod lifecycle;
mod schedule;
mod stats;
mod unit;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

/// Acquisition pipeline: the composition root of renderer, storage and archiver
///
/// Cloning is cheap; every clone shares the same event channel, cancellation token
/// and admission flag.
#[derive(Clone)]
pub struct Pipeline {
    /// Configuration (wrapped in Arc for sharing with spawned units)
    pub(crate) config: Arc<Config>,
    /// Path derivation under the output root
    pub(crate) layout: Layout,
    /// Renderer guarded by timeout, retry and cancellation
    pub(crate) navigator: Navigator,
    /// Name resolution and unit enumeration
    pub(crate) catalog: CatalogResolver,
    /// Filesystem capability
    pub(crate) store: Arc<dyn AssetStore>,
    /// Archive-building capability
    pub(crate) archiver: Arc<dyn Archiver>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Child of the renderer's disconnect signal, cancelled on shutdown
    pub(crate) cancel: CancellationToken,
    /// Whether new operations are admitted
    pub(crate) accepting: Arc<AtomicBool>,
}

impl Pipeline {
    /// Create a pipeline persisting to the local filesystem and writing zip archives
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use japdl::{Pipeline, config::Config, render::ContentRenderer};
    /// # use std::sync::Arc;
    /// # async fn example(renderer: Arc<dyn ContentRenderer>) -> japdl::Result<()> {
    /// let pipeline = Pipeline::new(Config::default(), renderer)?;
    /// let stats = pipeline.fetch_stats("one-piece").await?;
    /// println!("{} has {} volumes", stats.canonical_name, stats.volume_count);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: Config, renderer: Arc<dyn ContentRenderer>) -> Result<Self> {
        let archiver = Arc::new(ZipArchiver::new(config.archive.compression_level));
        Self::with_capabilities(config, renderer, Arc::new(FsAssetStore), archiver)
    }

    /// Create a pipeline from explicit capabilities
    pub fn with_capabilities(
        config: Config,
        renderer: Arc<dyn ContentRenderer>,
        store: Arc<dyn AssetStore>,
        archiver: Arc<dyn Archiver>,
    ) -> Result<Self> {
        config.validate()?;

        let cancel = match renderer.disconnected() {
            Some(disconnected) => disconnected.child_token(),
            None => CancellationToken::new(),
        };
        let navigator = Navigator::new(renderer, &config, cancel.clone());
        let catalog = CatalogResolver::new(navigator.clone(), config.website.clone());
        let layout = Layout::from_config(&config);
        let (event_tx, _rx) = broadcast::channel(config.event_buffer);

        if config.fast {
            tracing::warn!(
                max_concurrent_units = config.max_concurrent_units,
                "fast mode enabled: page completeness depends on connection quality"
            );
        }

        Ok(Self {
            config: Arc::new(config),
            layout,
            navigator,
            catalog,
            store,
            archiver,
            event_tx,
            cancel,
            accepting: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Subscribe to pipeline events
    ///
    /// Events are dropped when nobody listens; a slow subscriber may observe
    /// `RecvError::Lagged` once `event_buffer` events pile up.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Pipeline events as a stream, skipping notifications lost to lag
    pub fn event_stream(&self) -> impl Stream<Item = Event> + Send + 'static {
        BroadcastStream::new(self.event_tx.subscribe()).filter_map(|event| event.ok())
    }

    /// Current configuration
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Path derivation used by this pipeline
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Token cancelled on disconnection or shutdown
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub(crate) fn emit_event(&self, event: Event) {
        // no receivers is fine
        self.event_tx.send(event).ok();
    }
}

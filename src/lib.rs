//! # japdl
//!
//! Acquisition pipeline for paginated series published on a catalog website: resolve a
//! series name, enumerate its chapters and volumes, fetch every page through a
//! browser-backed renderer, persist the images and package them into `.cbr` archives.
//!
//! ## Design Philosophy
//!
//! japdl is designed to be:
//! - **Library-first** - No binary and no UI; the embedding application supplies the
//!   renderer and a presentation layer
//! - **Event-driven** - Progress at page, unit and volume granularity is broadcast as
//!   [`Event`]s
//! - **Cancellable** - A renderer disconnection or [`Pipeline::shutdown`] stops every
//!   in-flight fetch
//!
//! ## Quick Start
//!
//! ```no_run
//! use japdl::{Config, ContentRenderer, DownloadOptions, Pipeline, UnitKind};
//! use std::sync::Arc;
//!
//! async fn run(renderer: Arc<dyn ContentRenderer>) -> japdl::Result<()> {
//!     let pipeline = Pipeline::new(Config::default(), renderer)?;
//!
//!     let mut events = pipeline.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let stats = pipeline.fetch_stats("one-piece").await?;
//!     println!("{} volumes", stats.volume_count);
//!
//!     pipeline
//!         .download_unit("one-piece", UnitKind::Volume, "99", DownloadOptions::default())
//!         .await?;
//!     pipeline.shutdown().await
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Archive building
pub mod archive;
/// Catalog lookups
pub mod catalog;
/// Command registry and shell
pub mod command;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// The acquisition pipeline (decomposed into focused submodules)
pub mod pipeline;
/// Unit number and range parsing
pub mod range;
/// Renderer capability and catalog links
pub mod render;
/// Retry logic with exponential backoff
pub mod retry;
/// Output layout and page persistence
pub mod storage;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use archive::{Archiver, ZipArchiver};
pub use command::{Command, Shell};
pub use config::{ArchiveConfig, Config, RetryConfig};
pub use error::{ArchiveError, CatalogError, Error, RangeError, Result};
pub use pipeline::Pipeline;
pub use render::{CatalogLink, CatalogListing, ContentRenderer, PageFetch, UnitLink, UnitProbe};
pub use storage::{AssetStore, FsAssetStore, Layout};
pub use types::{
    ArchiveResult, CatalogStats, DownloadLocation, DownloadOptions, Event, Range, Selector,
    UnitKind, UnitReport,
};

/// Helper function to run the pipeline with graceful signal handling.
///
/// Waits for a termination signal or for the renderer to disconnect, then calls the
/// pipeline's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use japdl::{Config, ContentRenderer, Pipeline, run_with_shutdown};
/// use std::sync::Arc;
///
/// async fn serve(renderer: Arc<dyn ContentRenderer>) -> japdl::Result<()> {
///     let pipeline = Pipeline::new(Config::default(), renderer)?;
///
///     // Commands run on clones of the pipeline while this waits
///     run_with_shutdown(pipeline).await
/// }
/// ```
pub async fn run_with_shutdown(pipeline: Pipeline) -> Result<()> {
    run_until(pipeline, wait_for_signal()).await
}

/// Wait for `trigger` or for the renderer to disconnect, then shut `pipeline` down
///
/// [`run_with_shutdown`] is this with termination signals as the trigger; embedders
/// with their own stop condition (a closed window, a finished batch) pass it here.
pub async fn run_until<F>(pipeline: Pipeline, trigger: F) -> Result<()>
where
    F: std::future::Future<Output = ()>,
{
    let disconnected = pipeline.cancellation_token();
    tokio::select! {
        _ = trigger => {}
        _ = disconnected.cancelled() => {
            tracing::info!("renderer disconnected");
        }
    }
    pipeline.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // registration may fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("received SIGTERM"),
                _ = sigint.recv() => tracing::info!("received SIGINT"),
            }
        }
        (Ok(mut only), Err(e)) | (Err(e), Ok(mut only)) => {
            tracing::warn!(error = %e, "could not register both signal handlers, waiting on the other one");
            only.recv().await;
            tracing::info!("received termination signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "could not register any signal handler, falling back to ctrl_c");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl_c");
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received ctrl_c"),
        Err(e) => tracing::error!(error = %e, "failed to listen for ctrl_c"),
    }
}

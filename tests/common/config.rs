//! Pipeline construction for integration tests

use super::fixtures::{SITE, SiteRenderer};
use japdl::{Config, Pipeline, RetryConfig};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Configuration writing under `root` with a near-instant retry policy
pub fn test_config(root: &Path) -> Config {
    Config {
        output_dir: root.join("manga"),
        website: SITE.to_string(),
        navigation_timeout: Duration::from_secs(5),
        retry: RetryConfig {
            max_attempts: 1,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            backoff_multiplier: 2.0,
            jitter: false,
        },
        ..Config::default()
    }
}

/// A pipeline over `renderer` and the temp dir holding its output
///
/// The temp dir is deleted when dropped, so keep it alive for the whole test.
pub fn create_pipeline(renderer: Arc<SiteRenderer>, fast: bool) -> (Pipeline, TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut config = test_config(temp_dir.path());
    config.fast = fast;
    let pipeline = Pipeline::new(config, renderer).expect("Failed to create pipeline");
    (pipeline, temp_dir)
}

//! Admission control and shutdown coordination.

use crate::error::{Error, Result};
use crate::types::Event;
use std::sync::atomic::Ordering;

use super::Pipeline;

impl Pipeline {
    /// Whether the pipeline still admits new operations
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst) && !self.cancel.is_cancelled()
    }

    /// Reject new work once shutdown started or the renderer disconnected
    pub(crate) fn ensure_accepting(&self) -> Result<()> {
        if self.is_accepting() {
            Ok(())
        } else {
            Err(Error::ShuttingDown)
        }
    }

    /// Shut the pipeline down
    ///
    /// 1. Stops admitting new operations
    /// 2. Cancels in-flight work (partial unit directories stay on disk and are picked
    ///    up by the existence check of a later run)
    /// 3. Closes the renderer's outstanding page contexts
    /// 4. Emits [`Event::Shutdown`]
    ///
    /// Calling it again is a no-op.
    pub async fn shutdown(&self) -> Result<()> {
        if !self.accepting.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!("initiating shutdown");

        self.cancel.cancel();
        tracing::info!("in-flight fetches cancelled");

        if let Err(e) = self.navigator.renderer().close().await {
            tracing::warn!(error = %e, "failed to close renderer");
        }

        self.emit_event(Event::Shutdown);
        tracing::info!("shutdown complete");
        Ok(())
    }
}

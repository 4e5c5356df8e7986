//! Sequential and bounded fast scheduling of unit fetches.
//!
//! Both modes return results in enumeration order. Sequential mode finishes one unit
//! before starting the next; fast mode keeps up to `max_concurrent_units` units in
//! flight, so page progress of different units interleaves.

use crate::error::Result;
use crate::render::UnitLink;
use crate::types::Event;
use futures::StreamExt;
use futures::stream;
use std::future::Future;

use super::Pipeline;

impl Pipeline {
    /// Run `fetch` for every link, emitting unit progress as results arrive in order
    ///
    /// The first error stops scheduling; in fast mode, units still in flight are
    /// dropped, which cancels them at their next suspension point.
    pub(crate) async fn schedule<T, F, Fut>(&self, links: Vec<UnitLink>, fetch: F) -> Result<Vec<T>>
    where
        F: Fn(UnitLink) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let total = links.len();
        let mut results = Vec::with_capacity(total);

        if self.config.fast {
            step!(self, units = total, ceiling = self.config.max_concurrent_units, "scheduling units concurrently");
            let mut pending = stream::iter(links.into_iter().map(|link| {
                let tag = (link.manga().to_string(), link.unit().to_string());
                let fut = fetch(link);
                async move { (tag, fut.await) }
            }))
            .buffered(self.config.max_concurrent_units);

            while let Some(((manga, unit), result)) = pending.next().await {
                results.push(result?);
                self.unit_progress(manga, unit, results.len(), total);
            }
        } else {
            for link in links {
                let (manga, unit) = (link.manga().to_string(), link.unit().to_string());
                results.push(fetch(link).await?);
                self.unit_progress(manga, unit, results.len(), total);
            }
        }

        Ok(results)
    }

    fn unit_progress(&self, manga: String, unit: String, current: usize, total: usize) {
        step!(self, manga = %manga, unit = %unit, current, total, "unit done");
        self.emit_event(Event::UnitProgress {
            manga,
            unit,
            current,
            total,
        });
    }
}

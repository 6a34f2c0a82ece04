// src/crawl/mod.rs
// =============================================================================
// This module is where URLs to analyze come from.
//
// A CrawlSource publishes every discovered URL into a bounded channel. The
// orchestrator on the other end consumes them; when it is busy the channel
// fills up and the source waits on `send`, which is how backpressure
// reaches the crawl.
//
// Implementations:
// - SiteCrawler: breadth-first crawl of a single host (queue.rs)
// - UrlList: a fixed list of URLs, e.g. read from a file (list.rs)
// =============================================================================

mod list;
mod queue;

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

use crate::error::DiscoveryError;

pub use list::UrlList;
pub use queue::SiteCrawler;

/// Producer of URLs for one pipeline run.
#[async_trait]
pub trait CrawlSource: Send + Sync {
    /// Publishes every discovered URL into `sink` and returns once discovery
    /// is exhausted. A closed `sink` means nobody listens any more; the
    /// source should stop and return `Ok(())`.
    async fn discover(&self, sink: mpsc::Sender<Url>) -> Result<(), DiscoveryError>;

    /// Asks the source to stop and release its resources. Idempotent.
    fn request_shutdown(&self);
}

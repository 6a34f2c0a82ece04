// src/crawl/list.rs
// =============================================================================
// A crawl source that publishes a fixed list of URLs.
//
// Used by `analyze --url-file` to skip crawling, and handy in tests.
// List files hold one URL per line; blank lines and lines starting with '#'
// are ignored.
// =============================================================================

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

use super::CrawlSource;
use crate::error::DiscoveryError;

pub struct UrlList {
    urls: Vec<Url>,
    stopped: AtomicBool,
}

impl UrlList {
    pub fn new(urls: Vec<Url>) -> Self {
        Self {
            urls,
            stopped: AtomicBool::new(false),
        }
    }

    pub async fn from_file(path: &Path) -> Result<Self, DiscoveryError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| DiscoveryError::UrlList {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self::new(parse_list(&content)))
    }

    pub fn urls(&self) -> &[Url] {
        &self.urls
    }
}

#[async_trait]
impl CrawlSource for UrlList {
    async fn discover(&self, sink: mpsc::Sender<Url>) -> Result<(), DiscoveryError> {
        for url in &self.urls {
            if self.stopped.load(Ordering::SeqCst) {
                break;
            }
            if sink.send(url.clone()).await.is_err() {
                debug!("URL receiver closed, ending list");
                break;
            }
        }
        Ok(())
    }

    fn request_shutdown(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

fn parse_list(content: &str) -> Vec<Url> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| match Url::parse(line) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(line, error = %e, "Skipping invalid URL in list");
                None
            }
        })
        .collect()
}

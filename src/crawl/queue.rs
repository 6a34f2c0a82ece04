// src/crawl/queue.rs
// =============================================================================
// Breadth-first crawl of a single host.
//
// How it works:
// 1. Start with the initial URL in a queue
// 2. Fetch the page HTML
// 3. Publish the page URL to the pipeline
// 4. Add same-host links to the queue (if not visited, within depth limit
//    and allowed by the follow / no-follow path rules). Links to images,
//    stylesheets, scripts, archives and other downloads are skipped, and a
//    response that is not HTML is never published
// 5. Repeat until the queue is empty, the depth limit is reached or a
//    shutdown was requested
//
// Politeness:
// - A configurable delay between requests
// - Only the start URL's host is crawled
// =============================================================================

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use scraper::{Html, Selector};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use super::CrawlSource;
use crate::config::CrawlConfig;
use crate::error::DiscoveryError;

// Extensions of links that never lead to a page worth analyzing
const NON_PAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "ico", "webp", "bmp", "pdf", "zip", "gz", "tgz", "rar",
    "css", "js", "json", "xml", "txt", "mp3", "mp4", "avi", "mov", "woff", "woff2", "ttf", "eot",
];

// Represents a page in the crawl queue
#[derive(Debug, Clone)]
struct CrawlItem {
    url: Url,
    depth: usize, // How many levels deep from the starting URL
}

/// Crawls one host starting from `CrawlConfig::start_url`.
pub struct SiteCrawler {
    config: CrawlConfig,
    client: Client,
    stopped: AtomicBool,
}

impl SiteCrawler {
    pub fn new(config: CrawlConfig) -> Result<Self, DiscoveryError> {
        if config.start_url.host_str().is_none() {
            return Err(DiscoveryError::MissingHost(config.start_url.clone()));
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| DiscoveryError::InvalidHeader(name.clone()))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|_| DiscoveryError::InvalidHeader(format!("{}: {}", name, value)))?;
            headers.insert(header_name, header_value);
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            config,
            client,
            stopped: AtomicBool::new(false),
        })
    }

    pub fn is_shut_down(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    // Applies the follow / no-follow path rules to a candidate link
    fn is_allowed_path(&self, url: &Url) -> bool {
        let path = url.path();

        if let Some(prefix) = self.config.follow_path.as_deref() {
            if !prefix.is_empty() && !path.starts_with(prefix) {
                return false;
            }
        }

        match self.config.no_follow_path.as_deref() {
            Some(prefix) if !prefix.is_empty() => !path.starts_with(prefix),
            _ => true,
        }
    }
}

#[async_trait]
impl CrawlSource for SiteCrawler {
    async fn discover(&self, sink: mpsc::Sender<Url>) -> Result<(), DiscoveryError> {
        let start = normalize(self.config.start_url.clone());
        let max_depth = self.config.max_depth;

        // Queue of pages to crawl
        let mut queue = VecDeque::new();
        queue.push_back(CrawlItem {
            url: start.clone(),
            depth: 1,
        });

        // Track visited URLs to avoid crawling the same page twice
        let mut visited = HashSet::new();
        let mut published = 0usize;

        while let Some(item) = queue.pop_front() {
            if self.is_shut_down() {
                info!(remaining = queue.len() + 1, "Crawl stopped on request");
                break;
            }

            if !visited.insert(item.url.clone()) {
                continue;
            }

            // Last level without verification: report the URL, don't fetch it
            if !self.config.verify_urls && item.depth == max_depth && item.depth > 1 {
                if sink.send(item.url).await.is_err() {
                    debug!("URL receiver closed, ending crawl");
                    return Ok(());
                }
                published += 1;
                continue;
            }

            debug!(depth = item.depth, url = %item.url, "Crawling");

            match fetch_page(&self.client, &item.url).await {
                Ok(html) => {
                    let links = if item.depth < max_depth {
                        extract_same_host_links(&html, &item.url, &start)
                    } else {
                        Vec::new()
                    };

                    if sink.send(item.url.clone()).await.is_err() {
                        debug!("URL receiver closed, ending crawl");
                        return Ok(());
                    }
                    published += 1;

                    for link in links {
                        if !visited.contains(&link) && self.is_allowed_path(&link) {
                            queue.push_back(CrawlItem {
                                url: link,
                                depth: item.depth + 1,
                            });
                        }
                    }

                    if !self.config.delay.is_zero() {
                        tokio::time::sleep(self.config.delay).await;
                    }
                }
                Err(e) => {
                    warn!(url = %item.url, error = %e, "Failed to fetch page");
                }
            }
        }

        info!(pages = published, start = %start, "Crawl finished");
        Ok(())
    }

    fn request_shutdown(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            debug!(start = %self.config.start_url, "Crawler shutdown requested");
        }
    }
}

// Fetches a web page and returns its HTML content
async fn fetch_page(client: &Client, url: &Url) -> anyhow::Result<String> {
    let response = client.get(url.clone()).send().await?;

    if !response.status().is_success() {
        return Err(anyhow!("HTTP {}", response.status()));
    }

    // A missing Content-Type is given the benefit of the doubt
    if let Some(content_type) = response.headers().get(CONTENT_TYPE) {
        let content_type = content_type.to_str().unwrap_or_default();
        if !content_type.contains("html") {
            return Err(anyhow!("Not an HTML page ({})", content_type));
        }
    }

    let html = response.text().await?;
    Ok(html)
}

// Extracts links from HTML that point at the same host (and port) as `start`
//
// Returns: absolute, fragment-free URLs
fn extract_same_host_links(html: &str, page_url: &Url, start: &Url) -> Vec<Url> {
    let mut links = Vec::new();

    let selector = match Selector::parse("a[href]") {
        Ok(selector) => selector,
        Err(_) => return links,
    };

    let document = Html::parse_document(html);

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let Some(url) = resolve_link(page_url, href) else {
            continue;
        };

        if (url.scheme() == "http" || url.scheme() == "https")
            && url.host_str() == start.host_str()
            && url.port_or_known_default() == start.port_or_known_default()
            && looks_like_page(&url)
        {
            links.push(url);
        }
    }

    links
}

// Resolves a link (possibly relative) to an absolute URL
fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    // Skip anchors and special protocols
    if href.starts_with('#')
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("javascript:")
    {
        return None;
    }

    base.join(href).ok().map(normalize)
}

// False for links whose last path segment ends in a known non-page extension
fn looks_like_page(url: &Url) -> bool {
    let last_segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();

    match last_segment.rsplit_once('.') {
        Some((_, extension)) => !NON_PAGE_EXTENSIONS
            .iter()
            .any(|known| extension.eq_ignore_ascii_case(known)),
        None => true,
    }
}

// "page#top" and "page" are the same report
fn normalize(mut url: Url) -> Url {
    url.set_fragment(None);
    url
}

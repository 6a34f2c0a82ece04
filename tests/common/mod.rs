// tests/common/mod.rs
// =============================================================================
// Stub collaborators for the pipeline tests.
//
// - StubCrawler: publishes a fixed URL list, can fail at the end, and
//   records how and when it was asked to shut down
// - StubAnalyzer: builds a document from the URL; `?doc=N` picks the
//   document, some paths fail, "/explode" panics and each call can be slowed
// - page_renderer(): a TemplateRenderer with a tiny deterministic template
// - PanickingRenderer: page_renderer() that panics on "/boom"
// =============================================================================

#![allow(dead_code)]

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;
use url::Url;

use sitespeed_reporter::{
    AnalysisError, Analyzer, CrawlSource, DiscoveryError, Document, RenderError, Renderer,
    TemplateRenderer,
};

pub const TEMPLATE: &str = "stub.html";

pub fn url(raw: &str) -> Url {
    Url::parse(raw).unwrap()
}

pub fn localhost(paths: &[&str]) -> Vec<Url> {
    paths
        .iter()
        .map(|path| url(&format!("http://localhost{}", path)))
        .collect()
}

pub struct StubCrawler {
    urls: Vec<Url>,
    fail: bool,
    discovery_done: AtomicBool,
    shutdowns: AtomicUsize,
    shutdown_before_done: AtomicBool,
}

impl StubCrawler {
    pub fn new(urls: Vec<Url>) -> Self {
        Self {
            urls,
            fail: false,
            discovery_done: AtomicBool::new(false),
            shutdowns: AtomicUsize::new(0),
            shutdown_before_done: AtomicBool::new(false),
        }
    }

    /// Publishes every URL, then reports a discovery failure.
    pub fn failing(urls: Vec<Url>) -> Self {
        Self {
            fail: true,
            ..Self::new(urls)
        }
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    /// True if request_shutdown() ever ran while discover() was still going.
    pub fn shut_down_early(&self) -> bool {
        self.shutdown_before_done.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CrawlSource for StubCrawler {
    async fn discover(&self, sink: mpsc::Sender<Url>) -> Result<(), DiscoveryError> {
        for url in &self.urls {
            if sink.send(url.clone()).await.is_err() {
                break;
            }
        }
        self.discovery_done.store(true, Ordering::SeqCst);

        if self.fail {
            return Err(DiscoveryError::Aborted("stub crawler failure".to_string()));
        }
        Ok(())
    }

    fn request_shutdown(&self) {
        if !self.discovery_done.load(Ordering::SeqCst) {
            self.shutdown_before_done.store(true, Ordering::SeqCst);
        }
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct StubAnalyzer {
    failing: HashSet<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StubAnalyzer {
    pub fn new() -> Self {
        Self {
            failing: HashSet::new(),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Every analysis takes at least `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Analyses of these paths fail.
    pub fn failing_on(paths: &[&str]) -> Self {
        Self {
            failing: paths.iter().map(|p| p.to_string()).collect(),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Analyzer for StubAnalyzer {
    async fn analyze(&self, url: &Url) -> Result<Document, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }

        if url.path() == "/explode" {
            panic!("analyzer exploded on {}", url);
        }
        if self.failing.contains(url.path()) {
            return Err(AnalysisError::NoOutput { url: url.clone() });
        }

        let doc = url
            .query_pairs()
            .find(|(key, _)| key == "doc")
            .map(|(_, value)| value.into_owned())
            .unwrap_or_else(|| "0".to_string());

        Ok(Document::new(url.clone(), json!({ "doc": doc, "o": 90 })))
    }
}

pub fn page_renderer() -> TemplateRenderer {
    TemplateRenderer::new().with_template(TEMPLATE, "{{ url }} doc={{ document.doc }}\n")
}

pub struct PanickingRenderer {
    inner: TemplateRenderer,
}

impl PanickingRenderer {
    pub fn new() -> Self {
        Self {
            inner: page_renderer(),
        }
    }
}

impl Renderer for PanickingRenderer {
    fn render(
        &self,
        document: &Document,
        template: &str,
        sink: &mut dyn Write,
    ) -> Result<(), RenderError> {
        if document.url().path() == "/boom" {
            write!(sink, "partial")?;
            panic!("renderer exploded on {}", document.url());
        }
        self.inner.render(document, template, sink)
    }
}

/// Names of the files in `dir`, sorted.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

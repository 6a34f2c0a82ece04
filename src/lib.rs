// src/lib.rs
// =============================================================================
// sitespeed-reporter: crawl a site, analyze every page with YSlow and write
// one HTML report per page.
//
// Layout:
// - crawl:    where URLs come from (site crawler, fixed URL list)
// - analyzer: turns a URL into a Document (PhantomJS + YSlow)
// - report:   turns a Document into a file (templates, file names, assets)
// - pipeline: the bounded worker pools and the orchestrators wiring it all
// =============================================================================

pub mod analyzer;
pub mod config;
pub mod crawl;
pub mod error;
pub mod pipeline;
pub mod report;

pub use analyzer::{Analyzer, Document, YSlowAnalyzer};
pub use config::{AnalyzerConfig, CrawlConfig, PipelineConfig, PoolConfig};
pub use crawl::{CrawlSource, SiteCrawler, UrlList};
pub use error::{
    AnalysisError, DiscoveryError, PipelineError, PoolError, RenderError, ReportError,
};
pub use pipeline::{Orchestrator, ReportOutcome, RunSummary, SequentialOrchestrator};
pub use report::{AssetExporter, Renderer, TemplateRenderer};

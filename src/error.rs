// src/error.rs
// =============================================================================
// Error types for the whole pipeline.
//
// There are two kinds of failures:
// - Per-URL failures (AnalysisError, RenderError, ReportError). They are
//   logged, recorded in the run summary and never stop other URLs.
// - Run-level failures (DiscoveryError, PoolError, PipelineError). They
//   abort the run and are returned from Orchestrator::run().
// =============================================================================

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Failure of the crawl source. Fatal for the run.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Invalid start URL '{url}': {source}")]
    InvalidStartUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Start URL has no host: {0}")]
    MissingHost(Url),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Invalid request header '{0}'")]
    InvalidHeader(String),

    #[error("Failed to read URL list {path}: {source}")]
    UrlList {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Crawl task ended abnormally: {0}")]
    Aborted(String),
}

/// Failure to analyze a single URL.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Analyzer exited with status {status} for {url}: {stderr}")]
    ExitStatus {
        url: Url,
        status: i32,
        stderr: String,
    },

    #[error("Analyzer produced no JSON document for {url}")]
    NoOutput { url: Url },

    #[error("Malformed analyzer output for {url}: {source}")]
    Malformed {
        url: Url,
        #[source]
        source: serde_json::Error,
    },

    #[error("Analysis of {url} timed out after {after:?}")]
    TimedOut { url: Url, after: Duration },

    #[error("Analysis of {url} was abandoned before producing a result")]
    Abandoned { url: Url },
}

/// Failure to merge a document into a template.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Unknown template '{0}'")]
    UnknownTemplate(String),

    #[error("Failed to load template {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write rendered output: {0}")]
    Write(#[from] io::Error),
}

/// Failure of one report task. Carried in the run summary.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Report sink {path}: {source}")]
    Sink {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Report task panicked: {0}")]
    Panicked(String),

    #[error("Report file {file} is already claimed by {existing}")]
    Collision { file: String, existing: Url },

    #[error("URL has no host to name a report after: {0}")]
    NoHost(Url),
}

/// Worker pool misconfiguration or shutdown failure.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Invalid {pool} pool configuration: {reason}")]
    InvalidConfig { pool: &'static str, reason: String },

    #[error("{pool} pool did not drain within {after:?}, {pending} worker(s) aborted")]
    DrainTimeout {
        pool: &'static str,
        after: Duration,
        pending: usize,
    },
}

/// Fatal failure of a whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("Failed to export static assets: {0}")]
    Assets(#[source] io::Error),
}

// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Two subcommands:
// - analyze: crawl a site (or read a URL list), run YSlow on every page and
//   write one HTML report per page
// - crawl: only crawl, and print the URLs that would be analyzed
//
// The parsed arguments are turned into the plain config structs from
// src/config.rs here, so main.rs never looks at raw flags.
// =============================================================================

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use url::Url;

use sitespeed_reporter::config::{AnalyzerConfig, CrawlConfig, PipelineConfig, PoolConfig};
use sitespeed_reporter::report::DEFAULT_TEMPLATE;

// This struct represents our entire CLI application
#[derive(Parser, Debug)]
#[command(
    name = "sitespeed-reporter",
    version,
    about = "Crawl a site, analyze every page with YSlow and write an HTML report per page",
    long_about = "sitespeed-reporter crawls a website, runs PhantomJS + YSlow on every page it finds \
                  and writes one HTML report per page into an output directory."
)]
pub struct Cli {
    /// Log at debug level (RUST_LOG overrides this)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze a site and write the reports
    ///
    /// Example: sitespeed-reporter analyze https://example.com --depth 2
    Analyze(AnalyzeArgs),

    /// Crawl a site and print the pages found
    ///
    /// Example: sitespeed-reporter crawl https://example.com --json
    Crawl(CrawlArgs),
}

/// Options controlling the site crawler, shared by both subcommands.
#[derive(Args, Debug, Clone)]
pub struct CrawlOptions {
    /// How many levels to crawl: 1 = only the start page
    #[arg(long, default_value_t = 2)]
    pub depth: usize,

    /// Only follow links whose path starts with this prefix
    #[arg(long)]
    pub follow_path: Option<String>,

    /// Never follow links whose path starts with this prefix
    #[arg(long)]
    pub no_follow_path: Option<String>,

    /// Extra request header, "Name: Value" (repeatable)
    #[arg(long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Report pages on the last level without fetching them first
    #[arg(long)]
    pub no_verify: bool,

    /// Pause between two page fetches, in milliseconds
    #[arg(long, default_value_t = 100)]
    pub delay_ms: u64,
}

impl CrawlOptions {
    pub fn crawl_config(&self, start_url: Url) -> CrawlConfig {
        let mut config = CrawlConfig::new(start_url)
            .with_max_depth(self.depth)
            .with_verify_urls(!self.no_verify)
            .with_delay(Duration::from_millis(self.delay_ms));

        if let Some(prefix) = &self.follow_path {
            config = config.with_follow_path(prefix);
        }
        if let Some(prefix) = &self.no_follow_path {
            config = config.with_no_follow_path(prefix);
        }
        for (name, value) in &self.headers {
            config = config.with_header(name, value);
        }
        config
    }
}

#[derive(Args, Debug)]
pub struct CrawlArgs {
    /// Page to start crawling from
    pub start_url: Url,

    #[command(flatten)]
    pub crawl: CrawlOptions,

    /// Print the URLs as JSON instead of one per line
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Page to start crawling from
    #[arg(required_unless_present = "url_file")]
    pub start_url: Option<Url>,

    /// Analyze the URLs listed in this file (one per line) instead of crawling
    #[arg(long, conflicts_with = "start_url")]
    pub url_file: Option<PathBuf>,

    #[command(flatten)]
    pub crawl: CrawlOptions,

    /// Directory receiving the reports
    #[arg(long, short, default_value = "sitespeed-result")]
    pub output_dir: PathBuf,

    /// PhantomJS executable
    #[arg(long, default_value = "phantomjs")]
    pub phantomjs: PathBuf,

    /// The yslow.js script run by PhantomJS
    #[arg(long, default_value = "yslow.js")]
    pub yslow: PathBuf,

    /// Proxy used by PhantomJS, host:port
    #[arg(long)]
    pub proxy_host: Option<String>,

    /// Proxy type (http, socks5, none)
    #[arg(long, requires = "proxy_host")]
    pub proxy_type: Option<String>,

    /// YSlow ruleset
    #[arg(long, default_value = "ydefault")]
    pub ruleset: String,

    /// User agent PhantomJS sends
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Viewport, e.g. 1280x800
    #[arg(long)]
    pub viewport: Option<String>,

    /// Directory of extra templates (file name = template id)
    #[arg(long)]
    pub template_dir: Option<PathBuf>,

    /// Template used for every page
    #[arg(long, default_value = DEFAULT_TEMPLATE)]
    pub template: String,

    /// Value available to templates as {{ key }}, "key=value" (repeatable)
    #[arg(long = "define", value_parser = parse_define)]
    pub defines: Vec<(String, String)>,

    /// css/js/img directory copied next to the reports
    #[arg(long)]
    pub assets_dir: Option<PathBuf>,

    /// Maximum number of concurrent analyses
    #[arg(long, default_value_t = 2)]
    pub analysis_workers: usize,

    /// Maximum number of concurrent report tasks
    #[arg(long, default_value_t = 2)]
    pub report_workers: usize,

    /// Backlog size of each pool
    #[arg(long, default_value_t = 1)]
    pub queue_capacity: usize,

    /// Seconds a single analysis may take
    #[arg(long, default_value_t = 120)]
    pub analysis_timeout: u64,

    /// Seconds to wait for all reports once crawling is done
    #[arg(long, default_value_t = 1800)]
    pub completion_timeout: u64,

    /// Analyze and report one page at a time
    #[arg(long)]
    pub single_threaded: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

impl AnalyzeArgs {
    pub fn analyzer_config(&self) -> AnalyzerConfig {
        let mut config = AnalyzerConfig::new(&self.phantomjs, &self.yslow)
            .with_ruleset(&self.ruleset)
            .with_timeout(Duration::from_secs(self.analysis_timeout));

        if let Some(host) = &self.proxy_host {
            config = config.with_proxy(host, self.proxy_type.clone());
        }
        if let Some(user_agent) = &self.user_agent {
            config = config.with_user_agent(user_agent);
        }
        if let Some(viewport) = &self.viewport {
            config = config.with_viewport(viewport);
        }
        config
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        let analysis_pool = PoolConfig::new(1, self.analysis_workers.max(1), self.queue_capacity);
        let report_pool = PoolConfig::new(1, self.report_workers.max(1), self.queue_capacity);

        // The analyzer kills its process at --analysis-timeout; the pipeline
        // deadline only catches an analyzer stuck past that
        let analysis_deadline =
            Duration::from_secs(self.analysis_timeout) + Duration::from_secs(30);

        let mut config = PipelineConfig::new(&self.output_dir)
            .with_template(&self.template)
            .with_analysis_pool(analysis_pool)
            .with_report_pool(report_pool)
            .with_analysis_timeout(analysis_deadline)
            .with_completion_timeout(Duration::from_secs(self.completion_timeout));

        if let Some(dir) = &self.assets_dir {
            config = config.with_assets_dir(dir);
        }
        config
    }
}

// Parses "Name: Value"
fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected \"Name: Value\", got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in '{}'", raw));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

// Parses "key=value"
fn parse_define(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", raw));
    }
    Ok((key.to_string(), value.to_string()))
}


// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why `#[command(flatten)]`?
//    - Both subcommands crawl, so the crawl flags live in one struct
//    - flatten splices its fields into the subcommand as if written inline
//
// 2. How does `start_url: Url` get parsed?
//    - clap calls Url's FromStr implementation
//    - an invalid URL is reported as a usage error before run() starts
//
// 3. What does `value_parser = parse_header` do?
//    - clap hands each raw `--header` value to our function
//    - returning Err(String) makes clap print a usage error
// -----------------------------------------------------------------------------

// src/config.rs
// =============================================================================
// Plain configuration structs handed to component constructors.
//
// The CLI (src/cli.rs) builds these; tests build them directly with the
// `with_*` helpers. Nothing here reads the environment or global state.
// =============================================================================

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::PoolError;
use crate::report::DEFAULT_TEMPLATE;

/// Sizing of one bounded worker pool.
///
/// Semantics follow a classic bounded thread pool with a caller-runs
/// rejection policy: up to `core_workers` long-lived workers, then a
/// backlog of `queue_capacity` jobs, then extra workers up to
/// `max_workers`, then the submitter runs the job itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub core_workers: usize,
    pub max_workers: usize,
    pub queue_capacity: usize,
    /// Idle time after which a worker above `core_workers` exits.
    pub keep_alive: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            core_workers: 1,
            max_workers: 2,
            queue_capacity: 1,
            keep_alive: Duration::from_millis(1),
        }
    }
}

impl PoolConfig {
    pub fn new(core_workers: usize, max_workers: usize, queue_capacity: usize) -> Self {
        Self {
            core_workers,
            max_workers,
            queue_capacity,
            ..Self::default()
        }
    }

    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn validate(&self, pool: &'static str) -> Result<(), PoolError> {
        let invalid = |reason: String| PoolError::InvalidConfig { pool, reason };

        if self.core_workers == 0 {
            return Err(invalid("core_workers must be at least 1".to_string()));
        }
        if self.max_workers < self.core_workers {
            return Err(invalid(format!(
                "max_workers ({}) is smaller than core_workers ({})",
                self.max_workers, self.core_workers
            )));
        }
        if self.queue_capacity == 0 {
            return Err(invalid("queue_capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Everything the orchestrators need besides their collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory receiving one report file per URL.
    pub output_dir: PathBuf,
    /// Template id handed to the renderer for every page.
    pub template: String,
    pub analysis_pool: PoolConfig,
    pub report_pool: PoolConfig,
    /// Capacity of the channel between the crawl source and the orchestrator.
    pub discovery_buffer: usize,
    /// How long a single analysis may run, counted from when a worker
    /// starts it. Time spent in the backlog does not count.
    pub analysis_timeout: Duration,
    /// Upper bound for the wait on all outstanding report tasks.
    pub completion_timeout: Duration,
    /// Upper bound for draining each pool at the end of the run.
    pub shutdown_timeout: Duration,
    /// Source of the css/js/img files copied next to the reports.
    pub assets_dir: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            template: DEFAULT_TEMPLATE.to_string(),
            analysis_pool: PoolConfig::default(),
            report_pool: PoolConfig::default(),
            discovery_buffer: 16,
            analysis_timeout: Duration::from_secs(300),
            completion_timeout: Duration::from_secs(1800),
            shutdown_timeout: Duration::from_secs(10),
            assets_dir: None,
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn with_analysis_pool(mut self, pool: PoolConfig) -> Self {
        self.analysis_pool = pool;
        self
    }

    pub fn with_report_pool(mut self, pool: PoolConfig) -> Self {
        self.report_pool = pool;
        self
    }

    pub fn with_discovery_buffer(mut self, capacity: usize) -> Self {
        self.discovery_buffer = capacity.max(1);
        self
    }

    pub fn with_analysis_timeout(mut self, timeout: Duration) -> Self {
        self.analysis_timeout = timeout;
        self
    }

    pub fn with_completion_timeout(mut self, timeout: Duration) -> Self {
        self.completion_timeout = timeout;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn with_assets_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.assets_dir = Some(dir.into());
        self
    }
}

/// Traversal policy of the site crawler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    pub start_url: Url,
    /// 1 = only the start page, 2 = start page + the pages it links to, ...
    pub max_depth: usize,
    /// Only follow links whose path starts with this prefix.
    pub follow_path: Option<String>,
    /// Never follow links whose path starts with this prefix.
    pub no_follow_path: Option<String>,
    /// Extra headers sent with every request.
    pub headers: Vec<(String, String)>,
    /// When false, pages on the last level are reported without being fetched.
    pub verify_urls: bool,
    pub request_timeout: Duration,
    /// Pause between two page fetches.
    pub delay: Duration,
}

impl CrawlConfig {
    pub fn new(start_url: Url) -> Self {
        Self {
            start_url,
            max_depth: 2,
            follow_path: None,
            no_follow_path: None,
            headers: Vec::new(),
            verify_urls: true,
            request_timeout: Duration::from_secs(10),
            delay: Duration::from_millis(100),
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth.max(1);
        self
    }

    pub fn with_follow_path(mut self, prefix: impl Into<String>) -> Self {
        self.follow_path = Some(prefix.into());
        self
    }

    pub fn with_no_follow_path(mut self, prefix: impl Into<String>) -> Self {
        self.no_follow_path = Some(prefix.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_verify_urls(mut self, verify: bool) -> Self {
        self.verify_urls = verify;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// How to invoke PhantomJS + YSlow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    pub phantomjs: PathBuf,
    pub yslow: PathBuf,
    pub proxy_host: Option<String>,
    pub proxy_type: Option<String>,
    pub ruleset: String,
    pub user_agent: Option<String>,
    pub viewport: Option<String>,
    pub timeout: Duration,
}

impl AnalyzerConfig {
    pub fn new(phantomjs: impl Into<PathBuf>, yslow: impl Into<PathBuf>) -> Self {
        Self {
            phantomjs: phantomjs.into(),
            yslow: yslow.into(),
            proxy_host: None,
            proxy_type: None,
            ruleset: "ydefault".to_string(),
            user_agent: None,
            viewport: None,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_proxy(mut self, host: impl Into<String>, kind: Option<String>) -> Self {
        self.proxy_host = Some(host.into());
        self.proxy_type = kind;
        self
    }

    pub fn with_ruleset(mut self, ruleset: impl Into<String>) -> Self {
        self.ruleset = ruleset.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_viewport(mut self, viewport: impl Into<String>) -> Self {
        self.viewport = Some(viewport.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

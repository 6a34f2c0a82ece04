// src/pipeline/orchestrator.rs
// =============================================================================
// The concurrent pipeline.
//
// How it works:
// 1. The crawl source runs in its own task and sends URLs on a bounded
//    channel. It waits on `send` whenever we are slow.
// 2. For every URL we claim a report file, submit the analysis and hand the
//    matching report task (holding the analysis future) to the report pool.
//    Both pools may run a job on this task when saturated, which is what
//    slows the crawler down.
// 3. Once discovery is over the crawl source is told to shut down, once.
// 4. The completion barrier collects one outcome per report task, then both
//    pools are drained.
//
// Only setup, discovery, pool configuration and asset export failures make
// run() return an error. Anything that goes wrong with a single URL ends up
// in the RunSummary instead.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use url::Url;

use super::analysis::AnalysisPool;
use super::registry::{Claim, OutputRegistry};
use super::report_task::{ReportContext, ReportPool, ReportTask};
use super::summary::{CompletionBarrier, ReportOutcome, RunSummary};
use super::{export_assets, log_summary, prepare_output_dir};
use crate::analyzer::Analyzer;
use crate::config::PipelineConfig;
use crate::crawl::CrawlSource;
use crate::error::{DiscoveryError, PipelineError};
use crate::report::Renderer;

pub struct Orchestrator {
    config: PipelineConfig,
    crawl_source: Arc<dyn CrawlSource>,
    analyzer: Arc<dyn Analyzer>,
    renderer: Arc<dyn Renderer>,
}

impl Orchestrator {
    pub fn new(
        config: PipelineConfig,
        crawl_source: Arc<dyn CrawlSource>,
        analyzer: Arc<dyn Analyzer>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            config,
            crawl_source,
            analyzer,
            renderer,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Crawls, analyzes and reports every discovered URL.
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let config = &self.config;
        debug!(config = ?config, "Starting concurrent run");

        prepare_output_dir(&config.output_dir).await?;

        let analyzer = Arc::clone(&self.analyzer);
        let mut analysis = AnalysisPool::new(
            config.analysis_pool.clone(),
            analyzer,
            config.analysis_timeout,
        )?;
        let mut reports = ReportPool::new(config.report_pool.clone())?;
        let context = Arc::new(ReportContext::new(
            Arc::clone(&self.renderer),
            config.template.clone(),
        ));

        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel::<ReportOutcome>();
        let mut barrier = CompletionBarrier::new(outcome_rx);
        let mut registry = OutputRegistry::new(&config.output_dir);
        let mut summary = RunSummary::default();

        let (url_tx, mut url_rx) = mpsc::channel::<Url>(config.discovery_buffer);
        let source = Arc::clone(&self.crawl_source);
        let discovery = tokio::spawn(async move { source.discover(url_tx).await });

        while let Some(url) = url_rx.recv().await {
            let path = match registry.claim(&url) {
                Claim::Fresh(path) => path,
                Claim::Duplicate => {
                    summary.record_duplicate();
                    continue;
                }
                Claim::Rejected(e) => {
                    error!(url = %url, error = %e, "Report failed");
                    summary.record(ReportOutcome::new(url, Err(e)));
                    continue;
                }
            };

            let future = analysis.submit(url.clone()).await;
            let task = ReportTask::new(url, path, future, Arc::clone(&context), outcome_tx.clone());
            reports.execute(task).await;
            barrier.expect_one();
        }

        // Only report tasks hold senders from here on
        drop(outcome_tx);

        let discovered = match discovery.await {
            Ok(result) => result,
            Err(e) => Err(DiscoveryError::Aborted(e.to_string())),
        };
        self.crawl_source.request_shutdown();
        info!(urls = barrier.expected(), "Discovery finished");

        if let Err(e) = discovered {
            error!(error = %e, "Discovery failed, aborting run");
            drain(analysis, reports, config.shutdown_timeout).await;
            return Err(e.into());
        }

        let assets = export_assets(config).await;

        let (outcomes, unfinished) = barrier.wait(config.completion_timeout).await;
        summary.extend(outcomes);
        summary.set_unfinished(unfinished);

        drain(analysis, reports, config.shutdown_timeout).await;
        assets?;

        log_summary(&summary);
        Ok(summary)
    }
}

// Shuts both pools down; a pool that will not drain is logged and aborted
async fn drain(analysis: AnalysisPool, reports: ReportPool, timeout: Duration) {
    let (analysis, reports) = tokio::join!(analysis.shutdown(timeout), reports.shutdown(timeout));
    for result in [analysis, reports] {
        if let Err(e) = result {
            warn!(error = %e, "Pool shutdown");
        }
    }
}

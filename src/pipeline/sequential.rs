// src/pipeline/sequential.rs
// =============================================================================
// The pipeline without pools: one URL is analyzed and reported before the
// next one is received. The discovery channel holds a single URL, so the
// crawler never runs far ahead.
//
// Report files, failures and the summary are the same as with Orchestrator.
// =============================================================================

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info};
use url::Url;

use super::analysis::AnalysisFuture;
use super::registry::{Claim, OutputRegistry};
use super::report_task::{ReportContext, ReportTask};
use super::summary::{CompletionBarrier, ReportOutcome, RunSummary};
use super::{export_assets, log_summary, prepare_output_dir};
use crate::analyzer::Analyzer;
use crate::config::PipelineConfig;
use crate::crawl::CrawlSource;
use crate::error::{AnalysisError, DiscoveryError, PipelineError};
use crate::report::Renderer;

pub struct SequentialOrchestrator {
    config: PipelineConfig,
    crawl_source: Arc<dyn CrawlSource>,
    analyzer: Arc<dyn Analyzer>,
    renderer: Arc<dyn Renderer>,
}

impl SequentialOrchestrator {
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

    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let config = &self.config;
        debug!(config = ?config, "Starting single-threaded run");

        prepare_output_dir(&config.output_dir).await?;

        let context = Arc::new(ReportContext::new(
            Arc::clone(&self.renderer),
            config.template.clone(),
        ));
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel::<ReportOutcome>();
        let mut barrier = CompletionBarrier::new(outcome_rx);
        let mut registry = OutputRegistry::new(&config.output_dir);
        let mut summary = RunSummary::default();

        let (url_tx, mut url_rx) = mpsc::channel::<Url>(1);
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

            info!(url = %url, "Received URL to analyze");
            let analyzed = self.analyzer.analyze(&url);
            let result = match tokio::time::timeout(config.analysis_timeout, analyzed).await {
                Ok(result) => result,
                Err(_) => Err(AnalysisError::TimedOut {
                    url: url.clone(),
                    after: config.analysis_timeout,
                }),
            };

            let analysis = AnalysisFuture::ready(url.clone(), result);
            ReportTask::new(url, path, analysis, Arc::clone(&context), outcome_tx.clone())
                .run()
                .await;
            barrier.expect_one();
        }
        drop(outcome_tx);

        let discovered = match discovery.await {
            Ok(result) => result,
            Err(e) => Err(DiscoveryError::Aborted(e.to_string())),
        };
        self.crawl_source.request_shutdown();

        if let Err(e) = discovered {
            error!(error = %e, "Discovery failed, aborting run");
            return Err(e.into());
        }

        export_assets(config).await?;

        // Every task already ran, so this only collects
        let (outcomes, unfinished) = barrier.wait(config.completion_timeout).await;
        summary.extend(outcomes);
        summary.set_unfinished(unfinished);

        log_summary(&summary);
        Ok(summary)
    }
}

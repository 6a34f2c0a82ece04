// src/pipeline/analysis.rs
// =============================================================================
// The analysis side of the pipeline.
//
// Every submitted URL gets a oneshot promise. The analysis job fulfils it;
// the paired report task holds the receiving half (AnalysisFuture) and
// waits on it. Nothing polls.
//
// The analysis deadline starts when a worker picks the job up, so a URL
// waiting in the backlog behind slow pages is not failed for it.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::oneshot;
use tracing::{debug, info, trace};
use url::Url;

use super::pool::WorkerPool;
use crate::analyzer::{Analyzer, Document};
use crate::config::PoolConfig;
use crate::error::{AnalysisError, PoolError};

type AnalysisResult = Result<Document, AnalysisError>;

/// The pending result of one analysis.
#[derive(Debug)]
pub struct AnalysisFuture {
    url: Url,
    receiver: oneshot::Receiver<AnalysisResult>,
}

impl AnalysisFuture {
    /// A promise / future pair for `url`.
    pub fn channel(url: Url) -> (oneshot::Sender<AnalysisResult>, Self) {
        let (sender, receiver) = oneshot::channel();
        (sender, Self { url, receiver })
    }

    /// A future that is already resolved, for callers that analyzed inline.
    pub fn ready(url: Url, result: AnalysisResult) -> Self {
        let (sender, future) = Self::channel(url);
        let _ = sender.send(result);
        future
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Waits for the analysis. A job that vanished without answering (panic,
    /// aborted pool) resolves to `AnalysisError::Abandoned`.
    pub async fn resolve(self) -> AnalysisResult {
        match self.receiver.await {
            Ok(result) => result,
            Err(_) => Err(AnalysisError::Abandoned { url: self.url }),
        }
    }
}

/// Bounded pool running `Analyzer::analyze`.
pub struct AnalysisPool {
    pool: WorkerPool,
    analyzer: Arc<dyn Analyzer>,
    timeout: Duration,
}

impl AnalysisPool {
    pub fn new(
        config: PoolConfig,
        analyzer: Arc<dyn Analyzer>,
        timeout: Duration,
    ) -> Result<Self, PoolError> {
        Ok(Self {
            pool: WorkerPool::new("analysis", config)?,
            analyzer,
            timeout,
        })
    }

    /// Schedules the analysis of `url` and returns its future. Under
    /// saturation the analysis runs before this returns.
    pub async fn submit(&mut self, url: Url) -> AnalysisFuture {
        let (sender, future) = AnalysisFuture::channel(url.clone());
        let analyzer = Arc::clone(&self.analyzer);
        let timeout = self.timeout;
        let job_url = url.clone();

        let job = async move {
            info!(url = %job_url, "Received URL to analyze");
            let result = match tokio::time::timeout(timeout, analyzer.analyze(&job_url)).await {
                Ok(result) => result,
                Err(_) => Err(AnalysisError::TimedOut {
                    url: job_url.clone(),
                    after: timeout,
                }),
            };
            if let Err(e) = &result {
                debug!(url = %job_url, error = %e, "Analysis failed");
            }
            // The report task may have given up already
            let _ = sender.send(result);
        }
        .boxed();

        let dispatch = self.pool.execute(job).await;
        trace!(url = %url, ?dispatch, "Analysis submitted");

        future
    }

    pub async fn shutdown(self, timeout: Duration) -> Result<(), PoolError> {
        self.pool.shutdown(timeout).await
    }
}

// src/pipeline/report_task.rs
// =============================================================================
// One report per URL.
//
// A report task walks through these states and always reaches Closed:
//
//   Pending --open sink--> Awaiting --analysis ok--> Rendering --> Closed(ok)
//      |                      |                          |
//      +----------------------+--------------------------+-----> Closed(err)
//
// The sink (the report file) is created before waiting on the analysis and
// is closed on every path. When the task fails, the half-written file is
// removed, so a failed URL leaves no report behind.
//
// The wait on the analysis has no deadline of its own: the analysis job
// enforces one, and the run's completion timeout bounds everything else.
// Rendering runs on the blocking thread pool; a renderer that panics fails
// the task like any other render error.
// =============================================================================

use std::io;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use super::analysis::AnalysisFuture;
use super::pool::{panic_message, Dispatch, WorkerPool};
use super::summary::ReportOutcome;
use crate::analyzer::Document;
use crate::config::PoolConfig;
use crate::error::{PoolError, RenderError, ReportError};
use crate::report::Renderer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportState {
    Pending,
    Awaiting,
    Rendering,
    Closed { success: bool },
}

/// Settings shared by every report task of a run.
pub struct ReportContext {
    renderer: Arc<dyn Renderer>,
    template: String,
}

impl ReportContext {
    pub fn new(renderer: Arc<dyn Renderer>, template: impl Into<String>) -> Self {
        Self {
            renderer,
            template: template.into(),
        }
    }
}

pub struct ReportTask {
    url: Url,
    path: PathBuf,
    analysis: AnalysisFuture,
    context: Arc<ReportContext>,
    outcomes: mpsc::UnboundedSender<ReportOutcome>,
}

impl ReportTask {
    pub fn new(
        url: Url,
        path: PathBuf,
        analysis: AnalysisFuture,
        context: Arc<ReportContext>,
        outcomes: mpsc::UnboundedSender<ReportOutcome>,
    ) -> Self {
        Self {
            url,
            path,
            analysis,
            context,
            outcomes,
        }
    }

    /// Runs the task to completion and publishes its outcome. Never fails:
    /// errors end up in the outcome and in the log.
    pub async fn run(self) {
        let Self {
            url,
            path,
            analysis,
            context,
            outcomes,
        } = self;

        let mut state = ReportState::Pending;
        let executed = AssertUnwindSafe(execute(&url, &path, analysis, &context, &mut state))
            .catch_unwind()
            .await;
        let result = match executed {
            Ok(result) => result,
            Err(panic) => Err(ReportError::Panicked(panic_message(&*panic))),
        };
        enter(&url, &mut state, ReportState::Closed { success: result.is_ok() });

        match &result {
            Ok(path) => info!(url = %url, file = %path.display(), "Report written"),
            Err(e) => error!(url = %url, error = %e, "Report failed"),
        }

        // The barrier may have stopped listening after a timeout
        let _ = outcomes.send(ReportOutcome::new(url, result));
    }
}

async fn execute(
    url: &Url,
    path: &Path,
    analysis: AnalysisFuture,
    context: &ReportContext,
    state: &mut ReportState,
) -> Result<PathBuf, ReportError> {
    let sink = ReportSink::create(path).await?;

    enter(url, state, ReportState::Awaiting);
    let document = match analysis.resolve().await {
        Ok(document) => document,
        Err(e) => {
            sink.discard().await;
            return Err(e.into());
        }
    };

    enter(url, state, ReportState::Rendering);
    info!(url = %url, "Creating report");
    trace!(url = %url, document = %document.pretty(), "Document to report");

    let rendered = match render(context, document).await {
        Ok(bytes) => bytes,
        Err(e) => {
            sink.discard().await;
            return Err(e);
        }
    };

    sink.commit(&rendered).await
}

// Renders off the async workers; a panicking renderer becomes an error
async fn render(context: &ReportContext, document: Document) -> Result<Vec<u8>, ReportError> {
    let renderer = Arc::clone(&context.renderer);
    let template = context.template.clone();

    let rendered = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, RenderError> {
        let mut bytes = Vec::new();
        renderer.render(&document, &template, &mut bytes)?;
        Ok(bytes)
    })
    .await;

    match rendered {
        Ok(result) => Ok(result?),
        Err(e) if e.is_panic() => Err(ReportError::Panicked(panic_message(&*e.into_panic()))),
        Err(e) => Err(ReportError::Panicked(e.to_string())),
    }
}

fn enter(url: &Url, state: &mut ReportState, next: ReportState) {
    debug!(url = %url, from = ?state, to = ?next, "Report state");
    *state = next;
}

// The report file, open for the lifetime of the task
struct ReportSink {
    path: PathBuf,
    file: fs::File,
}

impl ReportSink {
    async fn create(path: &Path) -> Result<Self, ReportError> {
        let sink_error = |source: io::Error| ReportError::Sink {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(sink_error)?;
        }
        let file = fs::File::create(path).await.map_err(sink_error)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    async fn commit(mut self, bytes: &[u8]) -> Result<PathBuf, ReportError> {
        let written = async {
            self.file.write_all(bytes).await?;
            self.file.flush().await
        }
        .await;

        match written {
            Ok(()) => Ok(self.path),
            Err(source) => {
                let path = self.path.clone();
                self.discard().await;
                Err(ReportError::Sink { path, source })
            }
        }
    }

    async fn discard(self) {
        let Self { path, file } = self;
        drop(file);

        if let Err(e) = fs::remove_file(&path).await {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(file = %path.display(), error = %e, "Could not remove failed report");
            }
        }
    }
}

/// Bounded pool running report tasks.
pub struct ReportPool {
    pool: WorkerPool,
}

impl ReportPool {
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        Ok(Self {
            pool: WorkerPool::new("report", config)?,
        })
    }

    pub async fn execute(&mut self, task: ReportTask) -> Dispatch {
        self.pool.execute(task.run().boxed()).await
    }

    pub async fn shutdown(self, timeout: Duration) -> Result<(), PoolError> {
        self.pool.shutdown(timeout).await
    }
}

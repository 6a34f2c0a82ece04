// src/pipeline/mod.rs
// =============================================================================
// This module wires crawl, analysis and reporting together.
//
// Submodules:
// - pool: the bounded worker pool both stages run on
// - analysis: analysis jobs and the promise each one fulfils
// - report_task: the per-URL report state machine and its pool
// - registry: URL -> report file claims
// - summary: per-URL outcomes, run totals and the completion barrier
// - orchestrator: the concurrent pipeline
// - sequential: the same pipeline, one URL at a time
// =============================================================================

mod analysis;
mod orchestrator;
mod pool;
mod registry;
mod report_task;
mod sequential;
mod summary;

use std::path::Path;

use tokio::fs;
use tracing::info;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::report::AssetExporter;

pub use analysis::{AnalysisFuture, AnalysisPool};
pub use orchestrator::Orchestrator;
pub use pool::{Dispatch, Job, WorkerPool};
pub use registry::{Claim, OutputRegistry};
pub use report_task::{ReportContext, ReportPool, ReportState, ReportTask};
pub use sequential::SequentialOrchestrator;
pub use summary::{OutcomeRecord, ReportOutcome, RunSummary};

// Creates the output directory (and parents) when it does not exist yet
async fn prepare_output_dir(dir: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(dir)
        .await
        .map_err(|source| PipelineError::OutputDir {
            path: dir.to_path_buf(),
            source,
        })
}

// Copies the report assets next to the reports, when configured
async fn export_assets(config: &PipelineConfig) -> Result<(), PipelineError> {
    let Some(assets_dir) = &config.assets_dir else {
        return Ok(());
    };

    AssetExporter::new(assets_dir)
        .export(&config.output_dir)
        .await
        .map(|_| ())
        .map_err(PipelineError::Assets)
}

fn log_summary(summary: &RunSummary) {
    info!(
        succeeded = summary.succeeded(),
        failed = summary.failed(),
        duplicates = summary.duplicates(),
        unfinished = summary.unfinished(),
        "Run finished"
    );
}

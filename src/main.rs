// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap and set up logging
// 2. Build the collaborators (crawler, analyzer, renderer) from the flags
// 3. Run the pipeline (or just the crawler) and print the results
// 4. Exit with proper code (0 = every page reported, 1 = some page failed,
//    2 = error)
//
// Logs go to stderr, results to stdout, so `--json` output can be piped.
// =============================================================================

mod cli;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use url::Url;

use cli::{AnalyzeArgs, Cli, Commands, CrawlArgs};
use sitespeed_reporter::pipeline::OutcomeRecord;
use sitespeed_reporter::{
    Analyzer, CrawlSource, Orchestrator, Renderer, RunSummary, SequentialOrchestrator,
    SiteCrawler, TemplateRenderer, UrlList, YSlowAnalyzer,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            // {:#} prints the whole context chain on one line
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// RUST_LOG wins; otherwise info, or debug with --verbose
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// Returns:
//   Ok(0) = every page was reported
//   Ok(1) = at least one page failed or never finished
//   Err   = the run itself failed
async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Analyze(args) => handle_analyze(args).await,
        Commands::Crawl(args) => handle_crawl(args).await,
    }
}

// Handles the 'analyze' subcommand
async fn handle_analyze(args: AnalyzeArgs) -> Result<i32> {
    let crawl_source: Arc<dyn CrawlSource> = match (&args.url_file, &args.start_url) {
        (Some(path), _) => {
            let list = UrlList::from_file(path)
                .await
                .with_context(|| format!("Failed to load URL list {}", path.display()))?;
            info!(urls = list.urls().len(), file = %path.display(), "Analyzing URL list");
            Arc::new(list)
        }
        (None, Some(url)) => {
            info!(url = %url, depth = args.crawl.depth, "Analyzing site");
            let config = args.crawl.crawl_config(url.clone());
            Arc::new(SiteCrawler::new(config).context("Failed to set up the crawler")?)
        }
        // clap refuses this combination
        (None, None) => anyhow::bail!("Either a start URL or --url-file is required"),
    };

    let analyzer: Arc<dyn Analyzer> = Arc::new(YSlowAnalyzer::new(args.analyzer_config()));
    let renderer: Arc<dyn Renderer> = Arc::new(build_renderer(&args)?);

    let config = args.pipeline_config();
    debug!(config = %serde_json::to_string(&config)?, "Pipeline configuration");

    let summary = if args.single_threaded {
        SequentialOrchestrator::new(config, crawl_source, analyzer, renderer)
            .run()
            .await?
    } else {
        Orchestrator::new(config, crawl_source, analyzer, renderer)
            .run()
            .await?
    };

    print_summary(&summary, args.json)?;

    if summary.is_success() {
        Ok(0)
    } else {
        Ok(1)
    }
}

fn build_renderer(args: &AnalyzeArgs) -> Result<TemplateRenderer> {
    let mut renderer = match &args.template_dir {
        Some(dir) => TemplateRenderer::from_dir(dir)
            .with_context(|| format!("Failed to load templates from {}", dir.display()))?,
        None => TemplateRenderer::new(),
    };

    if !renderer.has_template(&args.template) {
        anyhow::bail!("Unknown template '{}'", args.template);
    }

    for (key, value) in &args.defines {
        renderer = renderer.with_global(key, value);
    }
    Ok(renderer)
}

// Handles the 'crawl' subcommand: runs the crawler alone and prints what it finds
async fn handle_crawl(args: CrawlArgs) -> Result<i32> {
    let crawler = Arc::new(
        SiteCrawler::new(args.crawl.crawl_config(args.start_url.clone()))
            .context("Failed to set up the crawler")?,
    );

    let (tx, mut rx) = mpsc::channel::<Url>(16);
    let source = Arc::clone(&crawler);
    let discovery = tokio::spawn(async move { source.discover(tx).await });

    let mut urls = Vec::new();
    while let Some(url) = rx.recv().await {
        if !args.json {
            println!("{}", url);
        }
        urls.push(url);
    }

    let discovered = discovery.await.context("Crawl task ended abnormally")?;
    crawler.request_shutdown();
    discovered?;

    if args.json {
        let json_output = serde_json::to_string_pretty(&urls)?;
        println!("{}", json_output);
    } else {
        eprintln!("{} page(s) found", urls.len());
    }
    Ok(0)
}

// Prints the per-URL outcomes either as a table or JSON
fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    let records = summary.records();

    if json {
        let json_output = serde_json::to_string_pretty(&records)?;
        println!("{}", json_output);
    } else {
        print_table(&records);
        println!();
        println!("Summary:");
        println!("   Reported:   {}", summary.succeeded());
        println!("   Failed:     {}", summary.failed());
        println!("   Duplicates: {}", summary.duplicates());
        println!("   Unfinished: {}", summary.unfinished());
    }
    Ok(())
}

fn print_table(records: &[OutcomeRecord]) {
    println!("{:<60} {:<8} {}", "URL", "STATUS", "REPORT / ERROR");
    println!("{}", "=".repeat(110));

    for record in records {
        // Truncate URL if too long for display
        let url_display = if record.url.chars().count() > 57 {
            format!("{}...", record.url.chars().take(57).collect::<String>())
        } else {
            record.url.clone()
        };

        let (status, detail) = match (&record.file, &record.error) {
            (Some(file), _) => ("OK", file.as_str()),
            (None, Some(error)) => ("FAILED", error.as_str()),
            (None, None) => ("FAILED", ""),
        };

        println!("{:<60} {:<8} {}", url_display, status, detail);
    }
}

// tests/pipeline.rs
// =============================================================================
// End-to-end runs of both orchestrators against stub collaborators.
// =============================================================================

mod common;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use common::{
    file_names, localhost, page_renderer, url, PanickingRenderer, StubAnalyzer, StubCrawler,
    TEMPLATE,
};
use sitespeed_reporter::{
    AnalysisError, Orchestrator, PipelineConfig, PipelineError, PoolConfig, ReportError,
    RunSummary, SequentialOrchestrator, UrlList,
};
use url::Url;

fn config(dir: &Path) -> PipelineConfig {
    PipelineConfig::new(dir).with_template(TEMPLATE)
}

async fn run_concurrent(dir: &Path, crawler: Arc<StubCrawler>, analyzer: StubAnalyzer) -> RunSummary {
    Orchestrator::new(config(dir), crawler, Arc::new(analyzer), Arc::new(page_renderer()))
        .run()
        .await
        .unwrap()
}

async fn run_sequential(dir: &Path, crawler: Arc<StubCrawler>, analyzer: StubAnalyzer) -> RunSummary {
    SequentialOrchestrator::new(config(dir), crawler, Arc::new(analyzer), Arc::new(page_renderer()))
        .run()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_two_localhost_pages_give_two_reports() {
    let dir = tempfile::tempdir().unwrap();
    let crawler = Arc::new(StubCrawler::new(localhost(&["/test1.html", "/test2.html"])));

    let summary = run_concurrent(dir.path(), crawler, StubAnalyzer::new()).await;

    assert!(summary.is_success());
    assert_eq!(summary.succeeded(), 2);
    assert_eq!(
        file_names(dir.path()),
        vec!["localhost.test1.html", "localhost.test2.html"]
    );
    assert_eq!(
        std::fs::read_to_string(dir.path().join("localhost.test1.html")).unwrap(),
        "http://localhost/test1.html doc=0\n"
    );
}

#[tokio::test]
async fn test_one_report_per_url() {
    let dir = tempfile::tempdir().unwrap();
    let urls: Vec<Url> = (0..25)
        .map(|i| url(&format!("http://localhost/page{}.html", i)))
        .collect();
    let crawler = Arc::new(StubCrawler::new(urls));
    let analyzer = StubAnalyzer::new();

    let summary = run_concurrent(dir.path(), crawler, analyzer).await;

    assert_eq!(summary.succeeded(), 25);
    assert_eq!(summary.failed(), 0);
    assert_eq!(file_names(dir.path()).len(), 25);
}

#[tokio::test]
async fn test_failed_analysis_does_not_stop_the_others() {
    let dir = tempfile::tempdir().unwrap();
    let crawler = Arc::new(StubCrawler::new(localhost(&["/a", "/broken", "/c"])));

    let summary = run_concurrent(dir.path(), crawler, StubAnalyzer::failing_on(&["/broken"])).await;

    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.failed(), 1);
    assert!(!summary.is_success());
    assert_eq!(file_names(dir.path()), vec!["localhost.a.html", "localhost.c.html"]);

    let failed = summary
        .outcomes()
        .iter()
        .find(|o| !o.is_success())
        .unwrap();
    assert_eq!(failed.url().path(), "/broken");
    assert!(matches!(
        failed.error(),
        Some(ReportError::Analysis(AnalysisError::NoOutput { .. }))
    ));
}

#[tokio::test]
async fn test_panicking_analysis_is_a_per_url_failure() {
    let dir = tempfile::tempdir().unwrap();
    let crawler = Arc::new(StubCrawler::new(localhost(&["/a", "/explode", "/c"])));

    let summary = run_concurrent(dir.path(), crawler, StubAnalyzer::new()).await;

    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.unfinished(), 0);
    assert!(!dir.path().join("localhost.explode.html").exists());
}

#[tokio::test]
async fn test_colliding_urls_are_reported_once() {
    let dir = tempfile::tempdir().unwrap();
    let crawler = Arc::new(StubCrawler::new(vec![
        url("http://localhost/search?q=1"),
        url("http://localhost/search?q=2"),
    ]));

    let summary = run_concurrent(dir.path(), crawler, StubAnalyzer::new()).await;

    assert_eq!(summary.succeeded(), 1);
    assert_eq!(summary.failed(), 1);
    assert_eq!(file_names(dir.path()), vec!["localhost.search.html"]);

    let collision = summary
        .outcomes()
        .iter()
        .find_map(|o| o.error())
        .unwrap();
    assert!(matches!(collision, ReportError::Collision { .. }));

    // The first URL owns the file
    assert!(std::fs::read_to_string(dir.path().join("localhost.search.html"))
        .unwrap()
        .starts_with("http://localhost/search?q=1 "));
}

#[tokio::test]
async fn test_duplicate_urls_are_analyzed_once() {
    let dir = tempfile::tempdir().unwrap();
    let crawler = Arc::new(StubCrawler::new(localhost(&["/a", "/a", "/b"])));
    let analyzer = Arc::new(StubAnalyzer::new());

    let summary = Orchestrator::new(
        config(dir.path()),
        crawler,
        analyzer.clone(),
        Arc::new(page_renderer()),
    )
    .run()
    .await
    .unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.duplicates(), 1);
    assert_eq!(analyzer.calls(), 2);
}

#[tokio::test]
async fn test_runs_are_reproducible() {
    let urls = localhost(&["/", "/docs/", "/a.html", "/b?doc=2"]);
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();

    run_concurrent(first.path(), Arc::new(StubCrawler::new(urls.clone())), StubAnalyzer::new()).await;
    run_concurrent(second.path(), Arc::new(StubCrawler::new(urls)), StubAnalyzer::new()).await;

    let names = file_names(first.path());
    assert_eq!(names, file_names(second.path()));
    assert_eq!(names.len(), 4);
    for name in names {
        assert_eq!(
            std::fs::read(first.path().join(&name)).unwrap(),
            std::fs::read(second.path().join(&name)).unwrap(),
            "{} differs between runs",
            name
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_thousand_urls_through_small_pools() {
    let dir = tempfile::tempdir().unwrap();
    let urls: Vec<Url> = (0..1000)
        .map(|i| url(&format!("http://localhost/page{}.html?doc={}", i, i % 3)))
        .collect();
    let crawler = Arc::new(StubCrawler::new(urls));

    let config = config(dir.path())
        .with_analysis_pool(PoolConfig::new(1, 2, 1))
        .with_report_pool(PoolConfig::new(1, 2, 1));
    let summary = Orchestrator::new(
        config,
        crawler.clone(),
        Arc::new(StubAnalyzer::new()),
        Arc::new(page_renderer()),
    )
    .run()
    .await
    .unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.succeeded(), 1000);
    assert_eq!(crawler.shutdowns(), 1);

    let names = file_names(dir.path());
    assert_eq!(names.len(), 1000);

    let mut per_doc: HashMap<String, usize> = HashMap::new();
    for name in names {
        let content = std::fs::read_to_string(dir.path().join(name)).unwrap();
        let doc = content.trim_end().rsplit("doc=").next().unwrap().to_string();
        *per_doc.entry(doc).or_default() += 1;
    }
    assert_eq!(per_doc.len(), 3);
    for (doc, count) in per_doc {
        assert!(count >= 333, "document {} reported {} times", doc, count);
    }
}

#[tokio::test]
async fn test_sequential_run_matches_concurrent_run() {
    let urls = localhost(&["/test1.html", "/broken", "/test2.html", "/test1.html"]);
    let concurrent = tempfile::tempdir().unwrap();
    let sequential = tempfile::tempdir().unwrap();

    let a = run_concurrent(
        concurrent.path(),
        Arc::new(StubCrawler::new(urls.clone())),
        StubAnalyzer::failing_on(&["/broken"]),
    )
    .await;
    let crawler = Arc::new(StubCrawler::new(urls));
    let b = run_sequential(
        sequential.path(),
        crawler.clone(),
        StubAnalyzer::failing_on(&["/broken"]),
    )
    .await;

    assert_eq!(a.records().len(), b.records().len());
    assert_eq!(b.succeeded(), 2);
    assert_eq!(b.failed(), 1);
    assert_eq!(b.duplicates(), 1);
    assert_eq!(crawler.shutdowns(), 1);
    assert_eq!(file_names(concurrent.path()), file_names(sequential.path()));
}

#[tokio::test]
async fn test_crawl_source_is_shut_down_once_after_discovery() {
    let dir = tempfile::tempdir().unwrap();
    let crawler = Arc::new(StubCrawler::new(localhost(&["/a", "/b", "/c", "/d"])));

    run_concurrent(dir.path(), crawler.clone(), StubAnalyzer::new()).await;

    assert_eq!(crawler.shutdowns(), 1);
    assert!(!crawler.shut_down_early());
}

#[tokio::test]
async fn test_discovery_failure_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let crawler = Arc::new(StubCrawler::failing(localhost(&["/a"])));

    let result = Orchestrator::new(
        config(dir.path()),
        crawler.clone(),
        Arc::new(StubAnalyzer::new()),
        Arc::new(page_renderer()),
    )
    .run()
    .await;

    assert!(matches!(result, Err(PipelineError::Discovery(_))));
    assert_eq!(crawler.shutdowns(), 1);
}

#[tokio::test]
async fn test_unusable_output_dir_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "file").unwrap();

    let result = Orchestrator::new(
        config(&blocker.join("reports")),
        Arc::new(StubCrawler::new(localhost(&["/a"]))),
        Arc::new(StubAnalyzer::new()),
        Arc::new(page_renderer()),
    )
    .run()
    .await;

    assert!(matches!(result, Err(PipelineError::OutputDir { .. })));
}

#[tokio::test]
async fn test_invalid_pool_config_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path()).with_report_pool(PoolConfig::new(2, 1, 1));

    let result = Orchestrator::new(
        config,
        Arc::new(StubCrawler::new(localhost(&["/a"]))),
        Arc::new(StubAnalyzer::new()),
        Arc::new(page_renderer()),
    )
    .run()
    .await;

    assert!(matches!(result, Err(PipelineError::Pool(_))));
}

#[tokio::test]
async fn test_assets_are_exported_next_to_reports() {
    let assets = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(assets.path().join("css")).unwrap();
    std::fs::write(assets.path().join("css/site.css"), "body{}").unwrap();

    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path()).with_assets_dir(assets.path());

    let summary = Orchestrator::new(
        config,
        Arc::new(StubCrawler::new(localhost(&["/a"]))),
        Arc::new(StubAnalyzer::new()),
        Arc::new(page_renderer()),
    )
    .run()
    .await
    .unwrap();

    assert!(summary.is_success());
    assert_eq!(
        std::fs::read_to_string(dir.path().join("css/styles.css")).unwrap(),
        "body{}"
    );
}

#[tokio::test]
async fn test_url_list_source() {
    let dir = tempfile::tempdir().unwrap();
    let list = Arc::new(UrlList::new(localhost(&["/x", "/y"])));

    let summary = Orchestrator::new(
        config(dir.path()),
        list,
        Arc::new(StubAnalyzer::new()),
        Arc::new(page_renderer()),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.succeeded(), 2);
    assert_eq!(file_names(dir.path()), vec!["localhost.x.html", "localhost.y.html"]);
}

#[tokio::test]
async fn test_queued_analyses_are_not_timed_out_while_waiting() {
    let dir = tempfile::tempdir().unwrap();
    let urls = localhost(&["/1", "/2", "/3", "/4", "/5", "/6", "/7", "/8"]);
    let crawler = Arc::new(StubCrawler::new(urls));

    // One analysis at a time: the last one starts long after the deadline
    // would have passed had it been counted from submission
    let config = config(dir.path())
        .with_analysis_pool(PoolConfig::new(1, 1, 1))
        .with_report_pool(PoolConfig::new(2, 2, 8))
        .with_analysis_timeout(Duration::from_millis(200));
    let analyzer = StubAnalyzer::new().with_delay(Duration::from_millis(50));

    let summary = Orchestrator::new(config, crawler, Arc::new(analyzer), Arc::new(page_renderer()))
        .run()
        .await
        .unwrap();

    assert!(summary.is_success(), "{:?}", summary.records());
    assert_eq!(summary.succeeded(), 8);
    assert_eq!(file_names(dir.path()).len(), 8);
}

#[tokio::test]
async fn test_stuck_analysis_times_out_without_a_report() {
    let dir = tempfile::tempdir().unwrap();
    let crawler = Arc::new(StubCrawler::new(localhost(&["/a"])));

    let config = config(dir.path()).with_analysis_timeout(Duration::from_millis(20));
    let analyzer = StubAnalyzer::new().with_delay(Duration::from_secs(5));

    let summary = Orchestrator::new(config, crawler, Arc::new(analyzer), Arc::new(page_renderer()))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.failed(), 1);
    assert!(matches!(
        summary.outcomes()[0].error(),
        Some(ReportError::Analysis(AnalysisError::TimedOut { .. }))
    ));
    assert!(file_names(dir.path()).is_empty());
}

#[tokio::test]
async fn test_panicking_renderer_is_a_per_url_failure() {
    let dir = tempfile::tempdir().unwrap();
    let crawler = Arc::new(StubCrawler::new(localhost(&["/a", "/boom", "/c"])));

    let summary = Orchestrator::new(
        config(dir.path()),
        crawler,
        Arc::new(StubAnalyzer::new()),
        Arc::new(PanickingRenderer::new()),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.unfinished(), 0);
    assert_eq!(file_names(dir.path()), vec!["localhost.a.html", "localhost.c.html"]);

    let boom = summary
        .outcomes()
        .iter()
        .find(|o| o.url().path() == "/boom")
        .unwrap();
    assert!(matches!(boom.error(), Some(ReportError::Panicked(_))));
}

#[tokio::test]
async fn test_unwritable_report_is_a_per_url_failure() {
    let dir = tempfile::tempdir().unwrap();
    // A directory already occupies the report file name of /b
    std::fs::create_dir(dir.path().join("localhost.b.html")).unwrap();
    let crawler = Arc::new(StubCrawler::new(localhost(&["/a", "/b", "/c"])));

    let summary = run_concurrent(dir.path(), crawler, StubAnalyzer::new()).await;

    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.failed(), 1);
    assert!(dir.path().join("localhost.a.html").is_file());
    assert!(dir.path().join("localhost.b.html").is_dir());
    assert!(dir.path().join("localhost.c.html").is_file());

    let b = summary
        .outcomes()
        .iter()
        .find(|o| o.url().path() == "/b")
        .unwrap();
    assert!(matches!(b.error(), Some(ReportError::Sink { .. })));
}

//! Integration tests for the crawl pipeline.
//!
//! These tests run whole crawls against mock HTTP servers and a temporary
//! output directory.

mod support;

use std::sync::Arc;
use std::time::Duration;

use scraping_by::crawl::{CrawlError, ItemError, Outcome, StopReason, UniqueTokens};
use scraping_by::{CrawlOptions, CrawlOrchestrator, CrawlTarget, HttpClient, RetryPolicy};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use support::{detail_page, files_in, hanging_download_server, toc_page, truncating_download_server};

const TOC_PATH: &str = "/pubdms/search/hitlist.cfm";
const DETAIL_PATH: &str = "/pubdms/search/document.cfm";

fn toc_url(server: &MockServer) -> Url {
    Url::parse(&format!("{}{TOC_PATH}?docketID=55219", server.uri())).expect("valid TOC URL")
}

fn fast_options() -> CrawlOptions {
    CrawlOptions {
        retry_policy: RetryPolicy::no_retry(),
        ..CrawlOptions::default()
    }
}

fn crawler(server: &MockServer, dir: &TempDir, options: CrawlOptions) -> CrawlOrchestrator {
    let target = CrawlTarget::new(toc_url(server), "document.cfm", dir.path());
    CrawlOrchestrator::new(Arc::new(HttpClient::new()), target, options)
        .expect("valid options")
        .with_tokens(UniqueTokens::starting_at(1000))
}

async fn mount_toc(server: &MockServer, anchors: &[(&str, &str)]) {
    Mock::given(method("GET"))
        .and(path(TOC_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(toc_page(anchors)))
        .mount(server)
        .await;
}

async fn mount_detail(server: &MockServer, id: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(DETAIL_PATH))
        .and(query_param("id", id))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_crawl_mixed_outcomes_reports_each_anchor() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("failed to create temp dir");

    mount_toc(
        &server,
        &[
            ("document.cfm?docketID=55219&id=1", "Cover Letter"),
            ("/help.cfm", "Help"),
            ("document.cfm?docketID=55219&id=2", "Factual Report: Operations"),
            ("document.cfm?docketID=55219&id=3", "Broken Exhibit"),
        ],
    )
    .await;
    mount_detail(&server, "1", detail_page(None)).await;
    mount_detail(&server, "2", detail_page(Some("%2Fdocs%2Ffactual%20report.pdf"))).await;
    mount_detail(&server, "3", detail_page(Some("%2Fdocs%2Fbroken.pdf"))).await;
    Mock::given(method("GET"))
        .and(path("/docs/factual%20report.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4 factual".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/broken.pdf"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let report = crawler(&server, &dir, fast_options())
        .run()
        .await
        .expect("TOC fetch should succeed");

    let counts = report.counts();
    assert_eq!(
        (counts.found, counts.success, counts.skipped, counts.failed),
        (3, 1, 1, 1)
    );
    assert_eq!(report.stopped, None);

    let (failed, error) = report.failures().next().expect("one failure");
    assert_eq!(failed.task.anchor.display_text, "Broken Exhibit");
    assert!(error.to_string().contains("HTTP 500"), "got: {error}");

    let (skipped, reason) = report.skipped().next().expect("one skip");
    assert_eq!(skipped.task.anchor.display_text, "Cover Letter");
    assert_eq!(reason, "no download pointer");

    let success = report.successes().next().expect("one success");
    let saved = success.path().expect("success has a path");
    let name = saved
        .file_name()
        .and_then(|n| n.to_str())
        .expect("utf-8 file name")
        .to_string();
    assert!(name.starts_with("FactualReportOperations-10"), "got {name}");
    assert!(name.ends_with(".pdf"), "got {name}");
    assert_eq!(std::fs::read(saved).expect("read saved file"), b"%PDF-1.4 factual");

    assert_eq!(files_in(dir.path()), vec![name]);
}

#[tokio::test]
async fn test_crawl_toc_connection_error_is_fatal() {
    // Bind then drop a listener so nothing is accepting on the port.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);

    let dir = TempDir::new().expect("failed to create temp dir");
    let toc = Url::parse(&format!("http://127.0.0.1:{port}{TOC_PATH}")).expect("url");
    let target = CrawlTarget::new(toc, "document.cfm", dir.path().join("out"));
    let crawler = CrawlOrchestrator::new(Arc::new(HttpClient::new()), target, fast_options())
        .expect("valid options");

    let err = crawler.run().await.expect_err("TOC fetch must fail");

    match err {
        CrawlError::TocFetch { attempts, .. } => assert_eq!(attempts, 1),
        other => panic!("expected TocFetch, got {other}"),
    }
    assert!(files_in(&dir.path().join("out")).is_empty());
}

#[tokio::test]
async fn test_crawl_toc_http_error_is_fatal() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("failed to create temp dir");
    Mock::given(method("GET"))
        .and(path(TOC_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = crawler(&server, &dir, fast_options())
        .run()
        .await
        .expect_err("TOC fetch must fail");
    assert!(matches!(err, CrawlError::TocFetch { .. }), "got {err}");
}

#[tokio::test]
async fn test_crawl_zero_matches_is_empty_report() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("failed to create temp dir");
    mount_toc(&server, &[("/help.cfm", "Help"), ("/about.cfm", "About")]).await;

    let report = crawler(&server, &dir, fast_options())
        .run()
        .await
        .expect("empty TOC is not an error");

    assert_eq!(report.found, 0);
    assert!(report.results.is_empty());
}

#[tokio::test]
async fn test_crawl_identical_titles_get_distinct_files() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("failed to create temp dir");

    mount_toc(
        &server,
        &[
            ("document.cfm?id=1", "Docket Item"),
            ("document.cfm?id=2", "Docket Item"),
            ("document.cfm?id=3", "Docket Item"),
        ],
    )
    .await;
    for id in ["1", "2", "3"] {
        mount_detail(&server, id, detail_page(Some(&format!("%2Fdocs%2F{id}.pdf")))).await;
    }
    Mock::given(method("GET"))
        .and(path_regex(r"^/docs/\d\.pdf$"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF".to_vec()))
        .expect(3)
        .mount(&server)
        .await;

    let options = CrawlOptions {
        concurrency: None,
        ..fast_options()
    };
    let report = crawler(&server, &dir, options).run().await.expect("run");

    assert_eq!(report.counts().success, 3);
    let files = files_in(dir.path());
    assert_eq!(files.len(), 3, "files: {files:?}");
    for name in &files {
        assert!(name.starts_with("DocketItem-"), "unexpected name {name}");
        assert!(name.ends_with(".pdf"), "unexpected name {name}");
    }
}

#[tokio::test]
async fn test_crawl_missing_pointer_never_downloads() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("failed to create temp dir");

    mount_toc(&server, &[("document.cfm?id=1", "Notice of Hearing")]).await;
    mount_detail(&server, "1", detail_page(None)).await;
    Mock::given(method("GET"))
        .and(path_regex("^/docs/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let report = crawler(&server, &dir, fast_options()).run().await.expect("run");

    assert_eq!(report.results.len(), 1);
    assert!(
        matches!(&report.results[0].outcome, Outcome::Skipped { .. }),
        "got {:?}",
        report.results[0].outcome
    );
    assert!(files_in(dir.path()).is_empty());
}

#[tokio::test]
async fn test_crawl_follows_redirects_for_pages_and_downloads() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("failed to create temp dir");

    mount_toc(&server, &[("document.cfm?id=1", "Moved Document")]).await;
    mount_detail(&server, "1", detail_page(Some("%2Fdocs%2Fold.pdf"))).await;
    Mock::given(method("GET"))
        .and(path("/docs/old.pdf"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", "/archive/new.pdf"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/archive/new.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF moved".to_vec()))
        .mount(&server)
        .await;

    let report = crawler(&server, &dir, fast_options()).run().await.expect("run");

    match &report.results[0].outcome {
        Outcome::Success { path, bytes, .. } => {
            assert_eq!(*bytes, 10);
            assert_eq!(std::fs::read(path).expect("read"), b"%PDF moved");
        }
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test]
async fn test_crawl_interrupted_download_leaves_no_file() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("failed to create temp dir");
    let download = truncating_download_server().await;

    mount_toc(&server, &[("document.cfm?id=1", "Truncated Transcript")]).await;
    let pointer = urlencoding::encode(&format!("http://{download}/transcript.pdf")).into_owned();
    mount_detail(&server, "1", detail_page(Some(&pointer))).await;

    let report = crawler(&server, &dir, fast_options()).run().await.expect("run");

    assert_eq!(report.counts().failed, 1);
    assert!(
        matches!(
            &report.results[0].outcome,
            Outcome::Failed {
                error: ItemError::Fetch { .. }
            }
        ),
        "got {:?}",
        report.results[0].outcome
    );
    assert!(files_in(dir.path()).is_empty(), "no final or partial file may remain");
}

#[tokio::test]
async fn test_crawl_cancel_accounts_for_every_anchor() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("failed to create temp dir");
    let download = hanging_download_server().await;

    mount_toc(
        &server,
        &[
            ("document.cfm?id=1", "Streaming Forever"),
            ("document.cfm?id=2", "Slow Detail"),
        ],
    )
    .await;
    let pointer = urlencoding::encode(&format!("http://{download}/big.pdf")).into_owned();
    mount_detail(&server, "1", detail_page(Some(&pointer))).await;
    Mock::given(method("GET"))
        .and(path(DETAIL_PATH))
        .and(query_param("id", "2"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(60)))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    let report = crawler(&server, &dir, fast_options())
        .run_with_cancel(cancel)
        .await
        .expect("TOC fetched before cancel");

    assert_eq!(report.stopped, Some(StopReason::Cancelled));
    assert_eq!(report.found, 2);
    assert_eq!(report.results.len(), 2);
    for result in &report.results {
        assert!(
            matches!(
                &result.outcome,
                Outcome::Failed {
                    error: ItemError::Cancelled
                }
            ),
            "got {:?}",
            result.outcome
        );
    }
    assert!(report.elapsed < Duration::from_secs(10));
    assert!(files_in(dir.path()).is_empty(), "partial download must be removed");
}

#[tokio::test]
async fn test_crawl_timeout_stops_run() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("failed to create temp dir");

    mount_toc(
        &server,
        &[("document.cfm?id=1", "Slow One"), ("document.cfm?id=2", "Slow Two")],
    )
    .await;
    Mock::given(method("GET"))
        .and(path(DETAIL_PATH))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(60)))
        .mount(&server)
        .await;

    let options = CrawlOptions {
        timeout: Some(Duration::from_millis(500)),
        ..fast_options()
    };
    let report = crawler(&server, &dir, options).run().await.expect("run");

    assert_eq!(report.stopped, Some(StopReason::TimedOut));
    assert_eq!(report.counts().failed, 2);
    assert!(report.elapsed < Duration::from_secs(10));
}

#[tokio::test]
async fn test_crawl_retries_transient_detail_failure() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("failed to create temp dir");

    mount_toc(&server, &[("document.cfm?id=1", "Flaky")]).await;
    // First request fails, later ones fall through to the next mock.
    Mock::given(method("GET"))
        .and(path(DETAIL_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_detail(&server, "1", detail_page(None)).await;

    let options = CrawlOptions {
        retry_policy: RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(50)),
        ..CrawlOptions::default()
    };
    let report = crawler(&server, &dir, options).run().await.expect("run");

    assert_eq!(report.counts().skipped, 1);
}

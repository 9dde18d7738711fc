//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run the full
//! mirror cycle end-to-end into a temporary output root.

use site_mirror::config::Config;
use site_mirror::output::{ANALYSIS_FILE, ARCHIVE_FILE, SITEMAP_FILE};
use site_mirror::url::host_dir_name;
use site_mirror::{Crawler, MirrorError, ResourceStatus, RunStatus};
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration seeded at the mock server's root
fn create_test_config(base_url: &str, output_root: &Path, max_depth: u32) -> Config {
    let mut config = Config::default();
    config.crawler.seed_url = format!("{}/", base_url);
    config.crawler.max_depth = max_depth;
    config.crawler.max_retries = 3;
    config.crawler.max_concurrency = 4;
    config.crawler.request_timeout_secs = 5;
    config.retry.base_delay_ms = 5;
    config.retry.max_delay_ms = 20;
    config.retry.jitter_ms = 5;
    config.user_agent.crawler_name = "TestBot".to_string();
    config.output.output_root = output_root.to_string_lossy().to_string();
    config
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html")
}

async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_depth_zero_mirrors_seed_only() {
    let mock_server = MockServer::start().await;
    let output = tempfile::tempdir().unwrap();

    mount_page(
        &mock_server,
        "/",
        r#"<html><body><a href="/next">Next</a></body></html>"#,
    )
    .await;

    // Never requested at depth 0
    Mock::given(method("GET"))
        .and(path("/next"))
        .respond_with(html("<p>next</p>"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), output.path(), 0);
    let outcome = Crawler::new(config, None).unwrap().run().await.unwrap();

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.report.sitemap, vec![format!("{}/", mock_server.uri())]);

    let sitemap = std::fs::read_to_string(outcome.run_dir.join(SITEMAP_FILE)).unwrap();
    assert_eq!(sitemap.lines().count(), 1);
}

#[tokio::test]
async fn test_internal_and_external_links() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let output = tempfile::tempdir().unwrap();

    mount_page(
        &mock_server,
        "/",
        r#"<html><head><title>Home</title></head><body>
            <a href="/page1">Page 1</a>
            <a href="/page2">Page 2</a>
            <a href="/page3">Page 3</a>
            <a href="https://external-one.invalid/">External 1</a>
            <a href="https://external-two.invalid/about">External 2</a>
        </body></html>"#,
    )
    .await;
    for route in ["/page1", "/page2", "/page3"] {
        mount_page(
            &mock_server,
            route,
            r#"<html><body><a href="/deeper">Too deep</a></body></html>"#,
        )
        .await;
    }

    Mock::given(method("GET"))
        .and(path("/deeper"))
        .respond_with(html("<p>deeper</p>"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&base_url, output.path(), 1);
    let outcome = Crawler::new(config, None).unwrap().run().await.unwrap();

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(
        outcome.report.sitemap,
        vec![
            format!("{}/", base_url),
            format!("{}/page1", base_url),
            format!("{}/page2", base_url),
            format!("{}/page3", base_url),
        ]
    );

    let externals: Vec<&str> = outcome
        .report
        .analysis
        .external_links
        .iter()
        .map(|link| link.url.as_str())
        .collect();
    assert_eq!(externals.len(), 2);
    assert!(externals.contains(&"https://external-one.invalid/"));
    assert!(externals.contains(&"https://external-two.invalid/about"));
}

#[tokio::test]
async fn test_missing_asset_recorded_as_client_error() {
    let mock_server = MockServer::start().await;
    let output = tempfile::tempdir().unwrap();

    mount_page(
        &mock_server,
        "/",
        r#"<html><body><img src="/missing.png"></body></html>"#,
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), output.path(), 1);
    let outcome = Crawler::new(config, None).unwrap().run().await.unwrap();

    assert_eq!(outcome.status, RunStatus::Completed);
    let missing = outcome
        .report
        .entries
        .iter()
        .find(|e| e.source_url.ends_with("/missing.png"))
        .expect("entry for the missing asset");
    assert_eq!(missing.status, ResourceStatus::ClientError(404));
    assert_eq!(missing.attempts, 1);
    assert!(missing.local_path.is_none());
    assert_eq!(
        outcome.report.analysis.failures_by_status.get("client_error"),
        Some(&1)
    );
}

#[tokio::test]
async fn test_self_link_not_fetched_twice() {
    let mock_server = MockServer::start().await;
    let output = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r##"<html><body>
                <a href="./">Home</a>
                <a href="/#top">Top</a>
                <a href="/?utm_source=newsletter">Tracked</a>
            </body></html>"##,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), output.path(), 2);
    let outcome = Crawler::new(config, None).unwrap().run().await.unwrap();

    assert_eq!(outcome.report.sitemap.len(), 1);
    assert_eq!(outcome.report.entries.len(), 1);
}

#[tokio::test]
async fn test_redirect_to_linked_page_fetched_once() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let output = tempfile::tempdir().unwrap();

    mount_page(
        &mock_server,
        "/",
        r#"<html><body><a href="/old">Old</a><a href="/new">New</a></body></html>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(html("<html><body>Moved here</body></html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&base_url, output.path(), 1);
    config.crawler.max_concurrency = 1;
    let outcome = Crawler::new(config, None).unwrap().run().await.unwrap();

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(
        outcome.report.sitemap,
        vec![format!("{}/", base_url), format!("{}/new", base_url)]
    );

    // One file per mirrored resource
    let paths: Vec<_> = outcome
        .report
        .entries
        .iter()
        .filter_map(|e| e.local_path.clone())
        .collect();
    let unique: std::collections::HashSet<_> = paths.iter().collect();
    assert_eq!(paths.len(), 2);
    assert_eq!(unique.len(), 2);

    let old = outcome
        .report
        .entries
        .iter()
        .find(|e| e.source_url == format!("{}/old", base_url))
        .unwrap();
    assert_eq!(old.status, ResourceStatus::Redirect(format!("{}/new", base_url)));
    assert!(old.local_path.is_none());
    assert!(outcome
        .report
        .analysis
        .redirects
        .iter()
        .any(|r| r.from == format!("{}/old", base_url) && r.to == format!("{}/new", base_url)));

    // Both links point at the single mirrored copy
    let host = host_dir_name(&url::Url::parse(&base_url).unwrap()).unwrap();
    let browsable =
        std::fs::read_to_string(outcome.run_dir.join("src").join(&host).join("index.html")).unwrap();
    assert_eq!(browsable.matches(r#"href="new/index.html""#).count(), 2);
}

#[tokio::test]
async fn test_unwritable_output_root_fails_without_fetching() {
    let mock_server = MockServer::start().await;
    let scratch = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .respond_with(html("<p>never</p>"))
        .expect(0)
        .mount(&mock_server)
        .await;

    // A regular file cannot hold run directories
    let blocker = scratch.path().join("not-a-directory");
    std::fs::write(&blocker, "x").unwrap();

    let config = create_test_config(&mock_server.uri(), &blocker, 1);
    let crawler = Crawler::new(config, None).unwrap();
    let handle = crawler.handle();

    let result = crawler.run().await;
    assert!(matches!(result, Err(MirrorError::OutputUnwritable { .. })));
    assert_eq!(handle.status(), RunStatus::Failed);
}

#[tokio::test]
async fn test_retry_only_transient_failures() {
    let mock_server = MockServer::start().await;
    let output = tempfile::tempdir().unwrap();

    mount_page(
        &mock_server,
        "/",
        r#"<html><head>
            <link rel="stylesheet" href="/flaky.css">
            <script src="/gone.js"></script>
        </head></html>"#,
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/flaky.css"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/gone.js"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), output.path(), 1);
    let outcome = Crawler::new(config, None).unwrap().run().await.unwrap();

    let flaky = outcome
        .report
        .entries
        .iter()
        .find(|e| e.source_url.ends_with("/flaky.css"))
        .unwrap();
    assert_eq!(flaky.status, ResourceStatus::ServerError(503));
    assert_eq!(flaky.attempts, 3);
    assert_eq!(outcome.report.analysis.totals.failed, 2);
}

#[tokio::test]
async fn test_run_directory_layout() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let output = tempfile::tempdir().unwrap();

    mount_page(
        &mock_server,
        "/",
        r#"<html><head><link rel="stylesheet" href="/css/site.css"></head>
        <body><a href="/page1">Page 1</a><img src="/img/logo.png"></body></html>"#,
    )
    .await;
    mount_page(&mock_server, "/page1", "<html><body>Page one</body></html>").await;

    Mock::given(method("GET"))
        .and(path("/css/site.css"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(b"body { color : red ; }".to_vec(), "text/css"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/img/logo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0x89, b'P', b'N', b'G'], "image/png"))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&base_url, output.path(), 1);
    let mut crawler = Crawler::new(config, Some("cafebabe".to_string())).unwrap();
    let mut events = crawler.subscribe().unwrap();
    let outcome = crawler.run().await.unwrap();

    let host = host_dir_name(&url::Url::parse(&base_url).unwrap()).unwrap();
    let run = &outcome.run_dir;

    // Browsable and categorized copies
    assert!(run.join("src").join(&host).join("index.html").is_file());
    assert!(run.join("src").join(&host).join("page1/index.html").is_file());
    assert!(run.join(&host).join("html/index.html").is_file());
    assert!(run.join(&host).join("css/css/site.css").is_file());
    assert_eq!(
        std::fs::read(run.join(&host).join("img/img/logo.png")).unwrap(),
        vec![0x89, b'P', b'N', b'G']
    );

    // Links rewritten in src/ only
    let browsable = std::fs::read_to_string(run.join("src").join(&host).join("index.html")).unwrap();
    assert!(browsable.contains(r#"href="page1/index.html""#));
    let categorized = std::fs::read_to_string(run.join(&host).join("html/index.html")).unwrap();
    assert!(categorized.contains(r#"href="/page1""#));

    // Processing outputs and artifacts
    assert!(run
        .join("processed")
        .join(&host)
        .join("css/css/site.minified.css")
        .is_file());
    assert!(run.join(SITEMAP_FILE).is_file());
    assert!(run.join(ARCHIVE_FILE).is_file());

    let analysis: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(run.join(ANALYSIS_FILE)).unwrap()).unwrap();
    assert_eq!(analysis["run"]["status"], "completed");
    assert_eq!(analysis["run"]["config_hash"], "cafebabe");
    assert_eq!(analysis["counts_by_kind"]["page"], 2);

    // The channel saw the run start and finish
    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    assert!(received.iter().any(|e| e.message.starts_with("Starting mirror")));
    assert!(received.iter().any(|e| e.message.starts_with("Mirror completed")));
}

#[tokio::test]
async fn test_stop_cancels_run() {
    let mock_server = MockServer::start().await;
    let output = tempfile::tempdir().unwrap();

    let links: String = (1..=6)
        .map(|i| format!(r#"<a href="/slow{}">Slow {}</a>"#, i, i))
        .collect();
    mount_page(&mock_server, "/", &format!("<html><body>{}</body></html>", links)).await;

    Mock::given(method("GET"))
        .respond_with(html("<p>slow</p>").set_delay(Duration::from_millis(300)))
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&mock_server.uri(), output.path(), 1);
    config.crawler.max_concurrency = 1;
    let crawler = Crawler::new(config, None).unwrap();
    let handle = crawler.handle();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.stop();
    });

    let outcome = crawler.run().await.unwrap();

    assert_eq!(outcome.status, RunStatus::Cancelled);
    assert!(outcome.report.sitemap.len() < 7);
    assert!(outcome.run_dir.join(ANALYSIS_FILE).is_file());
    assert!(!outcome.run_dir.join(ARCHIVE_FILE).exists());
}

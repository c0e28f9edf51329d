//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end. `example.com` is pinned to the mock
//! server and resolved to a public address by a static resolver, so the
//! host guard treats it as an ordinary public site. `localhost` resolves to
//! loopback and is not pinned.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use sumi_audit::config::Config;
use sumi_audit::state::{PageState, ReasonCode};
use sumi_audit::url::StaticResolver;
use sumi_audit::{AuditError, CrawlOutput, Crawler};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a fast test configuration for the given seed
fn create_test_config(seed: &str) -> Config {
    let mut config = Config::default();
    config.crawler.target_url = Some(seed.to_string());
    config.crawler.delay_ms = 0;
    config.crawler.min_words = 20;
    config.crawler.workers = 2;
    config.user_agent.crawler_name = "TestBot".to_string();
    config.fetch.retry_backoff_ms = 10;
    config.fetch.max_attempts = 2;
    config
}

/// Returns the seed URL for the mock server
fn seed_url(server: &MockServer) -> String {
    format!("http://example.com:{}/", server.address().port())
}

async fn run_crawl(server: &MockServer, config: Config) -> CrawlOutput {
    run_crawl_with_token(server, config, CancellationToken::new()).await
}

async fn run_crawl_with_token(
    server: &MockServer,
    config: Config,
    cancel: CancellationToken,
) -> CrawlOutput {
    run_crawl_with(server, config, test_resolver(), &["example.com"], cancel).await
}

fn test_resolver() -> StaticResolver {
    let public: IpAddr = "93.184.216.34".parse().unwrap();
    let loopback: IpAddr = "127.0.0.1".parse().unwrap();
    StaticResolver::new()
        .with_host("example.com", [public])
        .with_host("localhost", [loopback])
}

/// Runs a crawl with `pinned` hosts sent to the mock server
async fn run_crawl_with(
    server: &MockServer,
    config: Config,
    resolver: StaticResolver,
    pinned: &[&str],
    cancel: CancellationToken,
) -> CrawlOutput {
    let mut builder = Crawler::builder(config).resolver(Arc::new(resolver));
    for host in pinned {
        builder = builder.pin_host(host, *server.address());
    }

    builder
        .build()
        .expect("crawler should build")
        .run(cancel)
        .await
        .expect("crawl should run")
}

/// An HTML page with enough words to pass the thin filter
fn page(title: &str, links: &[&str]) -> ResponseTemplate {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{}">link</a>"#, href))
        .collect();
    let body = format!(
        r#"<html><head><title>{title}</title></head><body>
        <nav>{anchors}</nav>
        <main><h1>{title}</h1>
        <p>This page has plenty of words so that it clears the configured thin content threshold easily.</p>
        <p>A second paragraph adds even more words for good measure and keeps the page comfortably long.</p>
        </main></body></html>"#
    );
    ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8")
}

async fn mount_robots(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
        .mount(server)
        .await;
}

fn assert_counter_invariant(output: &CrawlOutput) {
    let stats = &output.stats;
    assert_eq!(stats.crawled, stats.status_200_html + stats.fetch_error);
    assert_eq!(
        stats.status_200_html,
        stats.skipped_noindex + stats.filtered_thin + stats.final_kept
    );
}

#[tokio::test]
async fn test_crawl_follows_same_site_links_once() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /").await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page("Home", &["/b", "/c", "https://other.org/d", "/b#section"]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(page("B", &["/", "/c"]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(page("C", &["/b"]))
        .expect(1)
        .mount(&server)
        .await;

    let seed = seed_url(&server);
    let output = run_crawl(&server, create_test_config(&seed)).await;

    assert_eq!(output.pages.len(), 3);
    assert_eq!(output.stats.final_kept, 3);
    assert_eq!(output.stats.crawled, 3);
    assert!(output.stats.robots.to_string().starts_with("loaded"));
    assert!(output.pages.keys().all(|url| !url.contains("other.org")));

    let home = &output.pages[&seed];
    assert_eq!(home.depth, 0);
    assert_eq!(home.title, "Home");
    assert!(!home.links.iter().any(|link| link.contains("other.org")));

    let b = &output.pages[&format!("{}b", seed)];
    assert_eq!(b.depth, 1);
    assert_counter_invariant(&output);
}

#[tokio::test]
async fn test_page_budget_is_respected() {
    let server = MockServer::start().await;
    mount_robots(&server, "").await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page("Home", &["/1", "/2", "/3", "/4", "/5"]))
        .mount(&server)
        .await;
    for n in 1..=5 {
        Mock::given(method("GET"))
            .and(path(format!("/{}", n)))
            .respond_with(page("Child", &[]))
            .mount(&server)
            .await;
    }

    let mut config = create_test_config(&seed_url(&server));
    config.crawler.max_pages = 3;
    let output = run_crawl(&server, config).await;

    assert_eq!(output.stats.processed(), 3);
    assert_eq!(output.pages.len(), 3);
}

#[tokio::test]
async fn test_thin_pages_are_filtered() {
    let server = MockServer::start().await;
    mount_robots(&server, "").await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html><body><p>Too short.</p></body></html>", "text/html"),
        )
        .mount(&server)
        .await;

    let output = run_crawl(&server, create_test_config(&seed_url(&server))).await;
    assert_eq!(output.stats.filtered_thin, 1);
    assert_eq!(output.stats.final_kept, 0);
    assert!(output.pages.is_empty());

    let mut config = create_test_config(&seed_url(&server));
    config.crawler.include_thin = true;
    let output = run_crawl(&server, config).await;
    assert_eq!(output.stats.final_kept, 1);
    assert_eq!(output.pages.values().next().unwrap().word_count, 2);
}

#[tokio::test]
async fn test_robots_disallowed_urls_are_never_fetched() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nDisallow: /private/").await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page("Home", &["/private/secret", "/public"]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/public"))
        .respond_with(page("Public", &[]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/private/secret"))
        .respond_with(page("Secret", &[]))
        .expect(0)
        .mount(&server)
        .await;

    let output = run_crawl(&server, create_test_config(&seed_url(&server))).await;

    assert_eq!(output.stats.robots_denied, 1);
    assert_eq!(output.stats.crawled, 2);
    let denied = output
        .outcomes
        .iter()
        .find(|o| o.reason == ReasonCode::RobotsDisallowed)
        .unwrap();
    assert_eq!(denied.status, 451);
    assert_eq!(denied.state(), PageState::Denied);
    assert_counter_invariant(&output);
}

#[tokio::test]
async fn test_missing_robots_allows_all() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page("Home", &[]))
        .mount(&server)
        .await;

    let output = run_crawl(&server, create_test_config(&seed_url(&server))).await;
    assert!(output.stats.robots.is_fail_open());
    assert_eq!(output.stats.final_kept, 1);
}

#[tokio::test]
async fn test_oversize_body_is_a_fetch_error() {
    let server = MockServer::start().await;
    mount_robots(&server, "").await;

    let huge = format!("<html><body>{}</body></html>", "word ".repeat(2_000));
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(huge, "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = create_test_config(&seed_url(&server));
    config.fetch.max_body_bytes = 2048;
    let output = run_crawl(&server, config).await;

    assert_eq!(output.stats.fetch_error, 1);
    assert_eq!(output.stats.fail_samples.len(), 1);
    assert!(output.stats.fail_samples[0]
        .reason
        .starts_with("body_too_large"));
    assert_eq!(output.outcomes[0].reason, ReasonCode::BodyTooLarge);
    assert_counter_invariant(&output);
}

#[tokio::test]
async fn test_redirect_to_loopback_is_refused() {
    let server = MockServer::start().await;
    mount_robots(&server, "").await;

    let admin = format!("http://127.0.0.1:{}/admin", server.address().port());
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", admin.as_str()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin"))
        .respond_with(page("Admin", &[]))
        .expect(0)
        .mount(&server)
        .await;

    let output = run_crawl(&server, create_test_config(&seed_url(&server))).await;

    assert_eq!(output.stats.fetch_error, 1);
    assert!(output.pages.is_empty());
    let outcome = &output.outcomes[0];
    assert_eq!(outcome.status, 451);
    assert_eq!(outcome.reason, ReasonCode::RedirectUnsafeHost);
    assert_eq!(outcome.state(), PageState::Denied);
    assert_counter_invariant(&output);
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;
    mount_robots(&server, "").await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let output = run_crawl(&server, create_test_config(&seed_url(&server))).await;

    assert_eq!(output.stats.fetch_error, 1);
    assert_eq!(output.outcomes[0].status, 503);
    assert_eq!(output.outcomes[0].reason, ReasonCode::HttpStatus);
}

#[tokio::test]
async fn test_noindex_pages_are_skipped() {
    let server = MockServer::start().await;
    mount_robots(&server, "").await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page("Home", &["/meta", "/header"]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/meta"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<html><head><meta name="robots" content="noindex"></head><body><a href="/hidden">x</a></body></html>"#,
            "text/html",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/header"))
        .respond_with(page("Header", &["/hidden"]).insert_header("x-robots-tag", "noindex"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/hidden"))
        .respond_with(page("Hidden", &[]))
        .expect(0)
        .mount(&server)
        .await;

    let output = run_crawl(&server, create_test_config(&seed_url(&server))).await;

    assert_eq!(output.stats.skipped_noindex, 2);
    assert_eq!(output.stats.final_kept, 1);
    assert!(output
        .outcomes
        .iter()
        .all(|o| o.reason == ReasonCode::MetaNoindex));
    assert_counter_invariant(&output);
}

#[tokio::test]
async fn test_non_html_is_a_fetch_error() {
    let server = MockServer::start().await;
    mount_robots(&server, "").await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{}", "application/json"))
        .mount(&server)
        .await;

    let output = run_crawl(&server, create_test_config(&seed_url(&server))).await;
    assert_eq!(output.stats.fetch_error, 1);
    assert_eq!(output.outcomes[0].reason, ReasonCode::NonHtml);
    assert!(!output.stats.fail_samples[0].is_html);
}

#[tokio::test]
async fn test_cancelled_crawl_returns_partial_output() {
    let server = MockServer::start().await;
    mount_robots(&server, "").await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page("Home", &[]))
        .expect(0)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let output =
        run_crawl_with_token(&server, create_test_config(&seed_url(&server)), cancel).await;

    assert!(output.stats.cancelled);
    assert_eq!(output.stats.crawled, 0);
    assert!(output.stats.finished_at.is_some());
}

#[tokio::test]
async fn test_cancel_during_fetch_finishes_in_flight_work() {
    let server = MockServer::start().await;
    mount_robots(&server, "").await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(page("Home", &["/a", "/b"]).set_delay(Duration::from_millis(500)))
        .expect(1)
        .mount(&server)
        .await;
    for child in ["/a", "/b"] {
        Mock::given(method("GET"))
            .and(path(child))
            .respond_with(page("Child", &[]))
            .expect(0)
            .mount(&server)
            .await;
    }

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        trigger.cancel();
    });

    let output =
        run_crawl_with_token(&server, create_test_config(&seed_url(&server)), cancel).await;

    assert!(output.stats.cancelled);
    assert_eq!(output.stats.crawled, 1);
    assert_eq!(output.pages.len(), 1);
    assert_counter_invariant(&output);
}

#[tokio::test]
async fn test_redirect_to_private_hostname_is_never_contacted() {
    let server = MockServer::start().await;
    mount_robots(&server, "").await;

    let admin = format!("http://localhost:{}/admin", server.address().port());
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", admin.as_str()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin"))
        .respond_with(page("Admin", &[]))
        .expect(0)
        .mount(&server)
        .await;

    let output = run_crawl(&server, create_test_config(&seed_url(&server))).await;

    assert_eq!(output.stats.fetch_error, 1);
    assert_eq!(output.stats.redirected, 1);
    assert!(output.pages.is_empty());
    let outcome = &output.outcomes[0];
    assert_eq!(outcome.status, 451);
    assert_eq!(outcome.reason, ReasonCode::RedirectUnsafeHost);
    assert!(output.stats.fail_samples[0].final_url.contains("localhost"));
    assert_counter_invariant(&output);
}

#[tokio::test]
async fn test_final_host_resolving_privately_is_refused() {
    let server = MockServer::start().await;
    mount_robots(&server, "").await;

    // Pinned, so the connection succeeds and only the final check can refuse it
    let landing = format!("http://intranet.example.com:{}/landing", server.address().port());
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", landing.as_str()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/landing"))
        .respond_with(page("Landing", &["/inside"]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/inside"))
        .respond_with(page("Inside", &[]))
        .expect(0)
        .mount(&server)
        .await;

    let private: IpAddr = "10.0.0.5".parse().unwrap();
    let resolver = test_resolver().with_host("intranet.example.com", [private]);
    let output = run_crawl_with(
        &server,
        create_test_config(&seed_url(&server)),
        resolver,
        &["example.com", "intranet.example.com"],
        CancellationToken::new(),
    )
    .await;

    assert!(output.pages.is_empty());
    assert_eq!(output.stats.fetch_error, 1);
    let outcome = &output.outcomes[0];
    assert_eq!(outcome.status, 451);
    assert_eq!(outcome.reason, ReasonCode::RedirectUnsafeHost);
    assert_eq!(outcome.state(), PageState::Denied);
    assert!(output.stats.fail_samples[0]
        .final_url
        .starts_with("http://intranet.example.com"));
    assert_counter_invariant(&output);
}

#[tokio::test]
async fn test_unsafe_seed_fails_the_run() {
    let config = create_test_config("http://127.0.0.1/");
    let result = Crawler::builder(config)
        .build()
        .expect("crawler should build")
        .run(CancellationToken::new())
        .await;
    assert!(matches!(result, Err(AuditError::UnsafeSeed { .. })));
}

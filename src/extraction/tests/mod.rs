use crate::config::ExtractionConfig;
use crate::error::{Error, Result};
use crate::extraction::*;
use crate::session;
use crate::types::{DiscoveryMethod, RawCandidate, StrategyKind};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Resolver returning a fixed result, standing in for yt-dlp
struct StaticResolver(ResolvedMedia);

#[async_trait]
impl MediaResolver for StaticResolver {
    async fn resolve(&self, _url: &str) -> Result<ResolvedMedia> {
        Ok(self.0.clone())
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Strategy that always errors
struct FailingStrategy;

#[async_trait]
impl Strategy for FailingStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Platform
    }

    async fn probe(&self, _page: &Page) -> Result<Vec<RawCandidate>> {
        Err(Error::Other("boom".into()))
    }
}

fn test_config() -> ExtractionConfig {
    ExtractionConfig {
        page_timeout: Duration::from_secs(5),
        iframe_timeout: Duration::from_secs(5),
        api_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

fn client(config: &ExtractionConfig) -> reqwest::Client {
    session::build_clients(config, Duration::from_secs(5))
        .unwrap()
        .page
}

fn pipeline_with(resolver: Arc<dyn MediaResolver>) -> ExtractionPipeline {
    let config = test_config();
    ExtractionPipeline::with_resolver(client(&config), &config, resolver)
}

fn pipeline() -> ExtractionPipeline {
    pipeline_with(Arc::new(NoOpResolver))
}

async fn serve_page(server: &MockServer, page_path: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

fn urls_by(found: &[RawCandidate], method: DiscoveryMethod) -> Vec<String> {
    found
        .iter()
        .filter(|c| c.method == method)
        .map(|c| c.url.clone())
        .collect()
}

// ---------------------------------------------------------------------------
// Pipeline behaviour
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_page_without_media_yields_empty_vector() {
    let server = MockServer::start().await;
    serve_page(
        &server,
        "/plain",
        "<html><head><title>About</title></head><body><p>No media here.</p>\
         <a href=\"/contact\">Contact</a><img src=\"/logo.png\"></body></html>",
    )
    .await;

    let found = pipeline()
        .extract(&format!("{}/plain", server.uri()))
        .await
        .unwrap();
    assert!(found.is_empty(), "unexpected candidates: {found:?}");
}

#[tokio::test]
async fn test_invalid_url_is_the_only_error() {
    let result = pipeline().extract("javascript:alert(1)").await;
    assert!(matches!(result, Err(Error::InvalidUrl(_))));
}

#[tokio::test]
async fn test_failed_page_fetch_still_runs_url_strategies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let media: ResolvedMedia =
        serde_json::from_str(r#"{"title": "Clip", "url": "https://cdn.example/direct.mp4", "ext": "mp4"}"#)
            .unwrap();
    let found = pipeline_with(Arc::new(StaticResolver(media)))
        .extract(&format!("{}/broken", server.uri()))
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].method, DiscoveryMethod::YtDlp);
    assert_eq!(found[0].title, "Clip");
}

#[tokio::test]
async fn test_outputs_follow_strategy_priority_order() {
    let server = MockServer::start().await;
    serve_page(
        &server,
        "/watch",
        r#"<html><script>var clip = "https://cdn.example/js_480p.mp4";</script>
           <video src="https://cdn.example/element_720p.webm"></video></html>"#,
    )
    .await;

    let media: ResolvedMedia = serde_json::from_str(
        r#"{"formats": [{"url": "https://cdn.example/yt_1080.mp4", "height": 1080, "vcodec": "avc1"}]}"#,
    )
    .unwrap();
    let found = pipeline_with(Arc::new(StaticResolver(media)))
        .extract(&format!("{}/watch", server.uri()))
        .await
        .unwrap();

    let kinds: Vec<StrategyKind> = found.iter().map(|c| c.method.strategy()).collect();
    let mut sorted = kinds.clone();
    sorted.sort();
    assert_eq!(kinds, sorted, "strategy blocks out of order");
    assert_eq!(kinds.first(), Some(&StrategyKind::PageWalk));
    assert!(kinds.contains(&StrategyKind::Delegated));
    assert!(kinds.contains(&StrategyKind::PageScan));
}

#[tokio::test]
async fn test_failing_strategy_is_swallowed() {
    let server = MockServer::start().await;
    serve_page(
        &server,
        "/watch",
        r#"<a href="https://cdn.example/only.mp4">download</a>"#,
    )
    .await;

    let config = test_config();
    let pipeline = ExtractionPipeline::with_strategies(
        client(&config),
        config.page_timeout,
        vec![Box::new(FailingStrategy), Box::new(PageScanStrategy::new())],
    );
    assert_eq!(
        pipeline.strategy_kinds(),
        vec![StrategyKind::PageScan, StrategyKind::Platform]
    );

    let found = pipeline
        .extract(&format!("{}/watch", server.uri()))
        .await
        .unwrap();
    assert_eq!(
        urls_by(&found, DiscoveryMethod::DirectPattern),
        vec!["https://cdn.example/only.mp4"]
    );
}

// ---------------------------------------------------------------------------
// Page walk over HTTP
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_iframe_followed_with_referer_one_level_only() {
    let server = MockServer::start().await;
    let page_url = format!("{}/watch", server.uri());

    serve_page(
        &server,
        "/watch",
        r#"<html><iframe src="/embed/77" allowfullscreen></iframe></html>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/embed/77"))
        .and(header("referer", page_url.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<script>player({"file": "/media/inner_720p.mp4"});</script>
               <iframe src="/embed/nested-player"></iframe>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/embed/nested-player"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#""file": "/deep.mp4""#))
        .expect(0)
        .mount(&server)
        .await;

    let found = pipeline().extract(&page_url).await.unwrap();

    assert_eq!(
        urls_by(&found, DiscoveryMethod::IframeExtraction),
        vec![format!("{}/media/inner_720p.mp4", server.uri())]
    );
    let inner = found
        .iter()
        .find(|c| c.method == DiscoveryMethod::IframeExtraction)
        .unwrap();
    assert_eq!(inner.quality, 720);
}

#[tokio::test]
async fn test_ajax_endpoint_probed_as_xhr() {
    let server = MockServer::start().await;
    let page_url = format!("{}/watch", server.uri());

    serve_page(
        &server,
        "/watch",
        r#"<script>fetch("/api/video/9").then(r => r.json()).then(play);</script>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/api/video/9"))
        .and(header("x-requested-with", "XMLHttpRequest"))
        .and(header("referer", page_url.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"data": {"src": "https:\/\/cdn.example\/api\/stream_1080p.m3u8"}}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let found = pipeline().extract(&page_url).await.unwrap();

    let api = urls_by(&found, DiscoveryMethod::ApiExtraction);
    assert_eq!(api, vec!["https://cdn.example/api/stream_1080p.m3u8"]);
}

#[tokio::test]
async fn test_api_probing_can_be_disabled() {
    let server = MockServer::start().await;
    serve_page(&server, "/watch", r#"<script>fetch("/api/video/9");</script>"#).await;
    Mock::given(method("GET"))
        .and(path("/api/video/9"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(0)
        .mount(&server)
        .await;

    let config = ExtractionConfig {
        probe_api_endpoints: false,
        follow_iframes: false,
        ..test_config()
    };
    let pipeline =
        ExtractionPipeline::with_resolver(client(&config), &config, Arc::new(NoOpResolver));
    let found = pipeline
        .extract(&format!("{}/watch", server.uri()))
        .await
        .unwrap();
    assert!(found.is_empty());
}

#[tokio::test]
async fn test_generic_hosting_keys_on_unregistered_host() {
    let server = MockServer::start().await;
    serve_page(
        &server,
        "/watch",
        r#"<script>setup({file: '/files/host_360p.mkv'});</script>"#,
    )
    .await;

    let found = pipeline()
        .extract(&format!("{}/watch", server.uri()))
        .await
        .unwrap();

    assert_eq!(
        urls_by(&found, DiscoveryMethod::GenericHosting),
        vec![format!("{}/files/host_360p.mkv", server.uri())]
    );
}

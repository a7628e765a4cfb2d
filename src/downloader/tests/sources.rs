use super::*;
use crate::types::DiscoveryMethod;

#[tokio::test]
async fn test_extract_ranks_page_sources() {
    let server = MockServer::start().await;
    let uri = server.uri();
    Mock::given(method("GET"))
        .and(path("/watch"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<html><body>
               <video src="{uri}/media/clip_480p.mp4"></video>
               <a href="{uri}/media/clip_1080p.mp4">HD</a>
               <a href="{uri}/media/clip_480p.mp4">again</a>
               </body></html>"#
        )))
        .mount(&server)
        .await;

    let (downloader, _temp_dir) = create_test_downloader().await;
    let ranked = downloader.extract(&format!("{uri}/watch")).await.unwrap();

    let urls: Vec<&str> = ranked.iter().map(|s| s.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            format!("{uri}/media/clip_1080p.mp4"),
            format!("{uri}/media/clip_480p.mp4")
        ]
    );
    assert_eq!(ranked[0].quality, 1080);
    // the page walk sees the absolute URLs first; later duplicates collapse
    assert_eq!(ranked[0].method, DiscoveryMethod::StreamingPattern);
}

#[tokio::test]
async fn test_extract_empty_page_is_no_sources() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>Nothing to see</p>"))
        .mount(&server)
        .await;

    let (downloader, _temp_dir) = create_test_downloader().await;
    let page = format!("{}/about", server.uri());
    match downloader.extract(&page).await {
        Err(Error::NoSources(url)) => assert_eq!(url, page),
        other => panic!("expected NoSources, got {other:?}"),
    }
    assert!(matches!(
        downloader.select_and_start(&page, None).await,
        Err(Error::NoSources(_))
    ));
    assert!(downloader.list_jobs().await.is_empty());
}

#[tokio::test]
async fn test_select_and_start_downloads_target_quality_with_referer() {
    let server = MockServer::start().await;
    let uri = server.uri();
    let page = format!("{uri}/watch");
    Mock::given(method("GET"))
        .and(path("/watch"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<video src="{uri}/media/clip_1080p.mp4"></video>
               <video src="{uri}/media/clip_720p.mp4"></video>
               <video src="{uri}/media/clip_360p.mp4"></video>"#
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/media/clip_720p.mp4"))
        .and(header("referer", page.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(MEDIA))
        .expect(1)
        .mount(&server)
        .await;

    let (downloader, _temp_dir) = create_test_downloader().await;
    let started = downloader
        .select_and_start(&page, Some("720p"))
        .await
        .unwrap();

    assert_eq!(started.selected_source.quality, 720);
    assert_eq!(started.total_sources_found, 3);
    assert_eq!(started.valid_sources_found, 3);

    let job = wait_for_terminal(&downloader, started.job_id).await;
    assert_eq!(job.status, JobStatus::Completed, "message: {}", job.message);
    assert_eq!(job.source, started.selected_source);
    assert_eq!(
        downloader.location(started.job_id).await.unwrap(),
        job.output_path
    );
}

#[tokio::test]
async fn test_select_and_start_rejects_malformed_sources() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/watch"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<video src="https://a.io/v.mp4"></video>"#),
        )
        .mount(&server)
        .await;

    let (downloader, _temp_dir) = create_test_downloader().await;
    let page = format!("{}/watch", server.uri());
    match downloader.select_and_start(&page, Some("best")).await {
        Err(Error::NoValidSources { url, extracted }) => {
            assert_eq!(url, page);
            assert_eq!(extracted, 1);
        }
        other => panic!("expected NoValidSources, got {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_page_url() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    assert!(matches!(
        downloader.extract("ftp://files.example/clip").await,
        Err(Error::InvalidUrl(_))
    ));
}

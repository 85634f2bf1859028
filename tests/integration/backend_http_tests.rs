/*!
 * HTTP client tests against a canned local server
 */

use anyhow::Result;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use subchain::errors::ServiceError;
use subchain::models::{ClipReference, CorpusSelection};
use subchain::services::http::HttpBackend;
use subchain::services::{CatalogService, ClipMerger, ClipRenderer, DialogueResponder, SentenceSearch};

use crate::common;

/// Serve one request with `status` and `body`, returning the raw request
async fn serve_once(status: u16, body: &'static str) -> Result<(String, JoinHandle<String>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let endpoint = format!("http://{}", listener.local_addr()?);

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut request = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let read = socket.read(&mut chunk).await.expect("read");
            if read == 0 {
                break;
            }
            request.extend_from_slice(&chunk[..read]);
            if request_complete(&request) {
                break;
            }
        }

        let response = format!(
            "HTTP/1.1 {} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.expect("write");
        socket.shutdown().await.ok();
        String::from_utf8_lossy(&request).into_owned()
    });

    Ok((endpoint, handle))
}

fn request_complete(request: &[u8]) -> bool {
    let text = String::from_utf8_lossy(request);
    let Some(header_end) = text.find("\r\n\r\n") else {
        return false;
    };
    let content_length = text[..header_end]
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    request.len() >= header_end + 4 + content_length
}

#[tokio::test]
async fn test_search_anchored_shouldSendRegexFlagAndDecode() -> Result<()> {
    let (endpoint, server) = serve_once(
        200,
        r#"{"results": [{"drama_id": "lurk", "episode": "潜伏E01", "text": "走吧", "start_seconds": 9.0, "end_seconds": 11.5}], "count": 1}"#,
    )
    .await?;
    let backend = HttpBackend::new(&endpoint, 5)?;

    let results = backend.search("^走", true, &common::all_corpora()).await?;
    let request = server.await?;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].text, "走吧");
    assert!(request.starts_with("GET /api/search?"));
    assert!(request.contains("regex=true"));
    assert!(request.contains("drama_ids=lurk%2Czhenhuan"));
    Ok(())
}

#[tokio::test]
async fn test_search_plain_shouldOmitRegexFlag() -> Result<()> {
    let (endpoint, server) = serve_once(200, r#"{"results": [], "count": 0}"#).await?;
    let backend = HttpBackend::new(&endpoint, 5)?;

    let results = backend.search("走", false, &common::lurk_only()).await?;
    let request = server.await?;

    assert!(results.is_empty());
    assert!(!request.contains("regex="));
    Ok(())
}

/// Plain queries reach the backend as literals, even with pattern metacharacters
#[tokio::test]
async fn test_search_plain_shouldEscapeMetacharacters() -> Result<()> {
    let (endpoint, server) = serve_once(200, r#"{"results": [], "count": 0}"#).await?;
    let backend = HttpBackend::new(&endpoint, 5)?;

    let results = backend.search("?", false, &common::lurk_only()).await?;
    let request = server.await?;

    assert!(results.is_empty());
    assert!(request.starts_with("GET /api/search?query=%5C%3F&drama_ids=lurk"));
    Ok(())
}

#[tokio::test]
async fn test_search_anchored_shouldSendPatternUnchanged() -> Result<()> {
    let (endpoint, server) = serve_once(200, r#"{"results": [], "count": 0}"#).await?;
    let backend = HttpBackend::new(&endpoint, 5)?;

    backend.search("^走", true, &common::lurk_only()).await?;
    let request = server.await?;

    assert!(request.contains("query=%5E%E8%B5%B0"));
    Ok(())
}

#[tokio::test]
async fn test_renderClip_shouldPostContextAndResolveUrl() -> Result<()> {
    let (endpoint, server) = serve_once(
        200,
        r#"{"clip_url": "/api/clips/lurk_1.mp4", "filename": "lurk_1.mp4"}"#,
    )
    .await?;
    let backend = HttpBackend::new(&endpoint, 5)?;

    let clip = backend.render_clip("lurk", "潜伏E01", 9.0, 11.5, 2.0).await?;
    let request = server.await?;

    assert_eq!(clip.as_str(), format!("{}/api/clips/lurk_1.mp4", endpoint));
    assert!(request.starts_with("POST /api/generate_clip"));
    assert!(request.contains(r#""drama_id":"lurk""#));
    assert!(request.contains(r#""context_seconds":2.0"#));
    Ok(())
}

#[tokio::test]
async fn test_dialogueResponses_shouldPostSentenceAndCorpora() -> Result<()> {
    let (endpoint, server) = serve_once(
        200,
        r#"{"results": [{"drama_id": "lurk", "episode": "潜伏E01", "text": "走吧", "start_seconds": 9, "end_seconds": 11, "match_score": 0.8}]}"#,
    )
    .await?;
    let backend = HttpBackend::new(&endpoint, 5)?;
    let corpora: CorpusSelection = ["lurk"].into_iter().collect();

    let answers = backend
        .find_dialogue_responses("你好吗", "lurk", "潜伏E02", &corpora)
        .await?;
    let request = server.await?;

    assert_eq!(answers[0].match_score, Some(0.8));
    assert!(request.contains(r#""sentence_text":"你好吗""#));
    assert!(request.contains(r#""drama_ids":"lurk""#));
    Ok(())
}

#[tokio::test]
async fn test_mergeClips_withErrorBody_shouldReturnApiError() -> Result<()> {
    let (endpoint, server) = serve_once(400, r#"{"error": "至少需要两个视频片段URL"}"#).await?;
    let backend = HttpBackend::new(&endpoint, 5)?;

    let result = backend.merge_clips(&[ClipReference::new("http://x/a.mp4")]).await;
    server.await?;

    assert!(matches!(
        result,
        Err(ServiceError::ApiError { status_code: 400, ref message }) if message == "至少需要两个视频片段URL"
    ));
    Ok(())
}

#[tokio::test]
async fn test_catalogStatus_shouldDecode() -> Result<()> {
    let (endpoint, server) = serve_once(
        200,
        r#"{"status": "ok", "dramas": [{"id": "lurk", "name": "潜伏"}], "drama_stats": {}, "total_episodes": 30, "total_subtitles": 100}"#,
    )
    .await?;
    let backend = HttpBackend::new(&endpoint, 5)?;

    let catalog = backend.catalog_status().await?;
    let request = server.await?;

    assert!(request.starts_with("GET /api/status"));
    assert_eq!(catalog.corpus_name("lurk"), "潜伏");
    assert_eq!(catalog.total_episodes, 30);
    Ok(())
}

#[tokio::test]
async fn test_download_shouldWriteFile() -> Result<()> {
    let (endpoint, server) = serve_once(200, "fake-mp4-bytes").await?;
    let backend = HttpBackend::new(&endpoint, 5)?;
    let temp_dir = common::create_temp_dir()?;
    let target = temp_dir.path().join("接龙视频.mp4");

    let written = backend
        .download(&ClipReference::new(format!("{}/api/clips/merged.mp4", endpoint)), &target)
        .await?;
    let request = server.await?;

    assert_eq!(written, 14);
    assert_eq!(std::fs::read(&target)?, b"fake-mp4-bytes");
    assert!(request.starts_with("GET /api/clips/merged.mp4"));
    Ok(())
}

#[tokio::test]
async fn test_unreachableBackend_shouldReturnConnectionError() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let endpoint = format!("http://{}", listener.local_addr()?);
    drop(listener);
    let backend = HttpBackend::new(&endpoint, 5)?;

    let result = backend.catalog_status().await;

    assert!(matches!(result, Err(ServiceError::ConnectionError(_))));
    Ok(())
}

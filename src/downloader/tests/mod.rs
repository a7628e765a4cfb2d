use super::test_helpers::{create_test_downloader, ranked_source, wait_for_terminal};
use super::transfer::{GENERIC_USER_AGENT, MOBILE_USER_AGENT};
use super::*;
use crate::types::{Event, JobId, JobStatus};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod sources;

/// Media body served by the fixtures
const MEDIA: &[u8] = b"\x00\x00\x00\x18ftypmp42 fake media payload for transfer tests";

/// Serve `MEDIA` at `media_path` for any request
async fn serve_media(server: &MockServer, media_path: &str) {
    Mock::given(method("GET"))
        .and(path(media_path))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(MEDIA))
        .mount(server)
        .await;
}

/// Answer every request for `media_path` with `status`
async fn refuse_media(server: &MockServer, media_path: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(media_path))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// A body long enough to split, with no repeating 256-byte period
fn media_body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// One scripted answer of [`raw_server`]
///
/// wiremock always sends whole bodies, so broken and stalled transfers need a
/// hand-written HTTP/1.1 peer.
enum Reply {
    /// A complete response: status line, extra header lines and body
    Full {
        status: &'static str,
        headers: Vec<String>,
        body: Vec<u8>,
    },
    /// Declare `declared` bytes, send `body`, then hang up
    Truncated { declared: usize, body: Vec<u8> },
    /// Declare `declared` bytes, send `body`, then go quiet
    Stalled { declared: usize, body: Vec<u8> },
}

/// Answer one connection per reply, in order
///
/// Returns the base URL and the lowercased request heads as they arrive.
async fn raw_server(replies: Vec<Reply>) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&requests);

    tokio::spawn(async move {
        for reply in replies {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let head = read_head(&mut stream).await;
            seen.lock().unwrap().push(head.to_lowercase());

            match reply {
                Reply::Full {
                    status,
                    headers,
                    body,
                } => {
                    write_head(&mut stream, status, body.len(), &headers).await;
                    stream.write_all(&body).await.ok();
                    stream.shutdown().await.ok();
                }
                Reply::Truncated { declared, body } => {
                    write_head(&mut stream, "200 OK", declared, &[]).await;
                    stream.write_all(&body).await.ok();
                    stream.flush().await.ok();
                    // let the client consume the bytes before the connection drops
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
                Reply::Stalled { declared, body } => {
                    write_head(&mut stream, "200 OK", declared, &[]).await;
                    stream.write_all(&body).await.ok();
                    stream.flush().await.ok();
                    tokio::spawn(async move {
                        tokio::time::sleep(Duration::from_secs(30)).await;
                        drop(stream);
                    });
                }
            }
        }
    });

    (base, requests)
}

async fn read_head(stream: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}

async fn write_head(stream: &mut TcpStream, status: &str, length: usize, headers: &[String]) {
    let mut head = format!(
        "HTTP/1.1 {status}\r\nContent-Type: video/mp4\r\nContent-Length: {length}\r\nConnection: close\r\n"
    );
    for line in headers {
        head.push_str(line);
        head.push_str("\r\n");
    }
    head.push_str("\r\n");
    stream.write_all(head.as_bytes()).await.ok();
}

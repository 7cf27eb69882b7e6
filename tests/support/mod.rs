//! Shared fixtures for crawl integration tests: HTML pages, raw download
//! servers that misbehave mid-body, and output directory inspection.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Renders a TOC page with one table row per `(href, text)` anchor.
pub fn toc_page(anchors: &[(&str, &str)]) -> String {
    let rows: String = anchors
        .iter()
        .map(|(href, text)| {
            format!(
                "<tr><td><a href=\"{}\">{text}</a></td></tr>\n",
                href.replace('&', "&amp;")
            )
        })
        .collect();
    format!("<html><body><h1>Docket 55219</h1><table>\n{rows}</table></body></html>")
}

/// Renders a detail page, with a hidden `src` field when `pointer` is given.
pub fn detail_page(pointer: Option<&str>) -> String {
    let field = pointer
        .map(|value| format!("<input type=\"hidden\" name=\"src\" value=\"{value}\">"))
        .unwrap_or_default();
    format!(
        "<html><body><form action=\"/view\"><input type=\"text\" name=\"q\">{field}</form></body></html>"
    )
}

/// Sorted names of the entries in `dir`; empty if it does not exist.
pub fn files_in(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

const PARTIAL_RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\n\
Content-Type: application/pdf\r\n\
Content-Length: 1048576\r\n\
\r\n\
%PDF-1.4 only the first few bytes";

/// Serves a response that promises 1 MiB and closes after a few bytes.
pub async fn truncating_download_server() -> SocketAddr {
    serve_partial(None).await
}

/// Serves a response that promises 1 MiB, sends a few bytes, then stalls.
pub async fn hanging_download_server() -> SocketAddr {
    serve_partial(Some(Duration::from_secs(300))).await
}

async fn serve_partial(stall: Option<Duration>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind download server");
    let addr = listener.local_addr().expect("download server addr");

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = [0u8; 4096];
                let _ = socket.read(&mut request).await;
                if socket.write_all(PARTIAL_RESPONSE).await.is_err() {
                    return;
                }
                let _ = socket.flush().await;
                if let Some(stall) = stall {
                    tokio::time::sleep(stall).await;
                }
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

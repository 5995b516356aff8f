//! Minimal HTTP responder for `/healthz` and `/metrics`.

use std::sync::Arc;
use std::time::Duration;

use du_exporter_core::MetricsRegistry;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

const MAX_REQUEST_HEAD: usize = 8 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// A response ready to be written to the socket.
#[derive(Debug, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub reason: &'static str,
    pub content_type: &'static str,
    pub body: String,
}

impl Response {
    fn text(status: u16, reason: &'static str, body: impl Into<String>) -> Self {
        Self {
            status,
            reason,
            content_type: "text/plain; charset=utf-8",
            body: body.into(),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        let head = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.status,
            self.reason,
            self.content_type,
            self.body.len()
        );
        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(self.body.as_bytes());
        bytes
    }
}

/// Route a request line to a response.
pub fn route(request_line: &str, registry: &MetricsRegistry) -> Response {
    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
        return Response::text(400, "Bad Request", "bad request\n");
    };
    let path = target.split('?').next().unwrap_or(target);

    match (method, path) {
        ("GET", "/healthz") => Response::text(200, "OK", "OK\n"),
        ("GET", "/metrics") => Response {
            status: 200,
            reason: "OK",
            content_type: EXPOSITION_CONTENT_TYPE,
            body: registry.render(),
        },
        ("GET", _) => Response::text(404, "Not Found", "not found\n"),
        _ => Response::text(405, "Method Not Allowed", "method not allowed\n"),
    }
}

/// Accept connections until the listener fails.
pub async fn serve(listener: TcpListener, registry: Arc<MetricsRegistry>) -> std::io::Result<()> {
    serve_with_timeout(listener, registry, REQUEST_TIMEOUT).await
}

/// Accept connections, dropping clients that take longer than
/// `request_timeout` to send their request head.
pub async fn serve_with_timeout(
    listener: TcpListener,
    registry: Arc<MetricsRegistry>,
    request_timeout: Duration,
) -> std::io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let registry = registry.clone();
        tokio::spawn(async move {
            if let Err(err) = handle(stream, &registry, request_timeout).await {
                debug!(%peer, error = %err, "connection closed with error");
            }
        });
    }
}

async fn handle(
    mut stream: TcpStream,
    registry: &MetricsRegistry,
    request_timeout: Duration,
) -> std::io::Result<()> {
    let response = match tokio::time::timeout(request_timeout, read_head(&mut stream)).await {
        Ok(Ok(Some(head))) => {
            let head = String::from_utf8_lossy(&head);
            let request_line = head.lines().next().unwrap_or_default();
            let response = route(request_line, registry);
            debug!(request = request_line, status = response.status, "http request");
            response
        }
        Ok(Ok(None)) => {
            warn!("request head too large, dropping connection");
            Response::text(431, "Request Header Fields Too Large", "")
        }
        Ok(Err(err)) => return Err(err),
        Err(_) => {
            debug!("timed out waiting for request head");
            Response::text(408, "Request Timeout", "")
        }
    };

    stream.write_all(&response.to_bytes()).await?;
    stream.shutdown().await
}

/// Read up to the end of the request head. `None` if it exceeds the cap.
async fn read_head(stream: &mut TcpStream) -> std::io::Result<Option<Vec<u8>>> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        if buf.len() >= MAX_REQUEST_HEAD {
            return Ok(None);
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    Ok(Some(buf))
}
